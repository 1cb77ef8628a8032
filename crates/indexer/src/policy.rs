//! Failure classification for best-effort fan-outs.
//!
//! Expected failure shapes are recognised by error variant, never by message
//! text.

use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Expected outcome; not worth a log line.
    Suppress,
    LogAndContinue,
    Propagate,
}

pub type FailurePolicy = fn(&ServiceError) -> FailureClass;

/// Enabling a language server as a non-admin is refused with
/// `NotAuthenticated` when an admin disabled a built-in language or when the
/// language is not built in. Both mean "leave it alone".
#[must_use]
pub fn classify_lang_server_error(err: &ServiceError) -> FailureClass {
    match err {
        ServiceError::NotAuthenticated(_) => FailureClass::Suppress,
        _ => FailureClass::LogAndContinue,
    }
}

/// Individual discovery queries never fail the batch.
#[must_use]
pub fn classify_discovery_error(_err: &ServiceError) -> FailureClass {
    FailureClass::LogAndContinue
}

/// A discovered repository the store does not know is skipped.
#[must_use]
pub fn classify_repo_lookup_error(_err: &ServiceError) -> FailureClass {
    FailureClass::LogAndContinue
}

/// Apply `policy` to `err`. Logs `LogAndContinue` failures with the context
/// produced by `what`; only `Propagate` hands the error back.
pub fn settle<F>(policy: FailurePolicy, err: ServiceError, what: F) -> Option<ServiceError>
where
    F: FnOnce() -> String,
{
    match policy(&err) {
        FailureClass::Suppress => {
            log::debug!("{} (suppressed): {err}", what());
            None
        }
        FailureClass::LogAndContinue => {
            log::warn!("{}: {err}", what());
            None
        }
        FailureClass::Propagate => Some(err),
    }
}
