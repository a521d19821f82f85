// ── Severity filter ──
//
// Pure projection over the reconciled view. Switching filters never
// touches stored state.

use std::sync::Arc;

use alertdeck_api::{Alert, Severity};

/// Which alerts the dashboard shows.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AlertFilter {
    #[default]
    All,
    Critical,
    Normal,
}

impl AlertFilter {
    pub fn matches(self, alert: &Alert) -> bool {
        match self {
            Self::All => true,
            Self::Critical => alert.severity == Severity::Critical,
            Self::Normal => alert.severity == Severity::Normal,
        }
    }

    /// Keep matching alerts, preserving order.
    pub fn apply(self, view: &[Arc<Alert>]) -> Vec<Arc<Alert>> {
        view.iter().filter(|a| self.matches(a)).cloned().collect()
    }

    /// Server-side equivalent for `GET /alerts/?severity=`.
    pub fn severity(self) -> Option<Severity> {
        match self {
            Self::All => None,
            Self::Critical => Some(Severity::Critical),
            Self::Normal => Some(Severity::Normal),
        }
    }
}
