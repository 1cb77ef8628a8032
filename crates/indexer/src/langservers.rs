use crate::config::WorkerConfig;
use crate::policy::{classify_lang_server_error, settle, FailureClass};
use crate::services::LanguageServerControl;
use std::sync::Arc;
use xref_protocol::Inventory;

/// Outcome of one enablement pass. Informational only; the pass itself never
/// fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnablementReport {
    /// Management is disallowed for this deployment; nothing was attempted.
    pub skipped: bool,
    pub enabled: Vec<String>,
    /// Refused in an expected way (see `classify_lang_server_error`).
    pub suppressed: Vec<String>,
    pub failed: Vec<String>,
}

impl EnablementReport {
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.enabled.len() + self.suppressed.len() + self.failed.len()
    }
}

/// Turns on language servers for the languages found in a repository.
#[derive(Clone)]
pub struct LanguageServerManager {
    control: Arc<dyn LanguageServerControl>,
    managed: bool,
}

impl LanguageServerManager {
    pub fn new(control: Arc<dyn LanguageServerControl>, config: &WorkerConfig) -> Self {
        Self {
            control,
            managed: config.manages_lang_servers(),
        }
    }

    /// Best-effort: every language is attempted regardless of earlier
    /// failures, and nothing is returned as an error.
    pub async fn enable_for_inventory(&self, inventory: &Inventory) -> EnablementReport {
        let mut report = EnablementReport::default();
        if !self.managed {
            report.skipped = true;
            return report;
        }

        for name in inventory.language_names() {
            let language = name.to_lowercase();
            match self.control.enable_language(&language).await {
                Ok(()) => report.enabled.push(language),
                Err(err) => {
                    let class = classify_lang_server_error(&err);
                    let escalated = settle(classify_lang_server_error, err, || {
                        format!("failed to automatically enable language server language={language}")
                    });
                    if let Some(err) = escalated {
                        log::error!(
                            "failed to automatically enable language server language={language}: {err}"
                        );
                    }
                    if class == FailureClass::Suppress {
                        report.suppressed.push(language);
                    } else {
                        report.failed.push(language);
                    }
                }
            }
        }
        report
    }
}
