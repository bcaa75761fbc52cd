// Error taxonomy: sampling, resolution, streaming, request validation.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// A kernel interface could not be read or did not have the expected shape.
///
/// Contained to the metric family that produced it: the family is reported
/// as `noData` for that tick.
#[derive(Error, Debug)]
pub enum SampleError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("sampling task failed: {0}")]
    Task(String),
}

impl SampleError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<tokio::task::JoinError> for SampleError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

/// Socket-to-process or uid-to-user lookup failed. Always degraded to
/// sentinel values by the caller, never surfaced.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no process holds socket inode {0}")]
    ProcessNotFound(u64),

    #[error("no user with uid {0}")]
    UserNotFound(u32),

    #[error("no Uid line in {}", .0.display())]
    MissingUid(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Delivering a snapshot to a subscriber failed; ends that subscription only.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("send to subscriber failed: {0}")]
    Send(String),

    #[error("send to subscriber timed out")]
    Timeout,

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("subscriber went away")]
    Closed,
}

/// Invalid subscription parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("period must be at least 1 second")]
    ZeroPeriod,

    #[error("averaging must be at least 1 second")]
    ZeroAveraging,

    #[error("averaging must be at most {max} seconds, got {got}")]
    AveragingTooLong { max: u64, got: u64 },

    #[error("report interval ({report}s) must not be shorter than the period ({period}s)")]
    ReportShorterThanPeriod { report: u64, period: u64 },
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (StatusCode::BAD_REQUEST, body).into_response()
    }
}
