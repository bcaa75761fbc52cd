// Per-family presence: disabled in config, enabled without data, or sampled.

use serde::{Deserialize, Serialize};

/// One metric family inside a snapshot.
///
/// Serializes as `{"status": "disabled"}`, `{"status": "noData"}` or
/// `{"status": "sampled", "value": ...}` so a consumer can tell a family that
/// is switched off apart from one whose read failed this tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum Metric<T> {
    Disabled,
    NoData,
    Sampled(T),
}

impl<T> Default for Metric<T> {
    fn default() -> Self {
        Metric::NoData
    }
}

impl<T> Metric<T> {
    pub fn is_disabled(&self) -> bool {
        matches!(self, Metric::Disabled)
    }

    pub fn is_sampled(&self) -> bool {
        matches!(self, Metric::Sampled(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Metric::Sampled(v) => Some(v),
            _ => None,
        }
    }
}
