// Load average and CPU time models

use serde::{Deserialize, Serialize};

/// 1/5/15-minute load averages from `/proc/loadavg`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadAverage {
    pub one_minute: f64,
    pub five_minutes: f64,
    pub fifteen_minutes: f64,
}

/// Aggregate CPU time from the first line of `/proc/stat`.
///
/// Values are cumulative clock ticks since boot, not a rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuUsage {
    /// user + nice
    pub user_mode: f64,
    pub system_mode: f64,
    pub idle: f64,
}
