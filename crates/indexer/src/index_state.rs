use serde::Serialize;
use xref_protocol::CommitId;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CurrentReason {
    /// Watermark is pinned by the freeze flag.
    Frozen,
    UpToDate,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StaleReason {
    NeverIndexed,
    CommitChanged,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum Freshness {
    Current(CurrentReason),
    Stale(StaleReason),
}

impl Freshness {
    #[must_use]
    pub const fn is_current(self) -> bool {
        matches!(self, Self::Current(_))
    }
}

/// Decide whether a repository needs indexing at `resolved`.
///
/// A frozen repository without a watermark has never been indexed and is
/// stale; once indexed, the freeze flag pins it.
#[must_use]
pub fn assess_freshness(
    watermark: Option<&CommitId>,
    frozen: bool,
    resolved: &CommitId,
) -> Freshness {
    match watermark {
        None => Freshness::Stale(StaleReason::NeverIndexed),
        Some(_) if frozen => Freshness::Current(CurrentReason::Frozen),
        Some(mark) if mark == resolved => Freshness::Current(CurrentReason::UpToDate),
        Some(_) => Freshness::Stale(StaleReason::CommitChanged),
    }
}
