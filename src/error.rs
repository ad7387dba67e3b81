//! Error types used by the orchestrator and its collaborators.
//!
//! This module defines three error enums:
//!
//! - [`RemoteError`] failures reported by the transport boundary (the remote generation API).
//! - [`PollError`] failures of the polling mechanism itself.
//! - [`OrchestratorError`] errors surfaced by the caller-facing API.
//!
//! All of them provide `as_label` for logging/metrics. [`RemoteError`] additionally
//! carries the default retry classification ([`RemoteError::is_retryable`]).
//!
//! A job that the remote service reports as failed is **not** an error at this level:
//! it is returned as data ([`JobState::Failed`](crate::JobState::Failed)) and callers
//! decide whether to surface it.

use std::time::Duration;
use thiserror::Error;

/// Low-level transport condition observed before any HTTP status was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// The request timed out.
    Timeout,
    /// The peer reset the connection.
    ConnectionReset,
    /// The connection was aborted locally or by an intermediary.
    ConnectionAborted,
}

/// # Errors produced at the transport boundary.
///
/// The transport layer maps whatever its HTTP client reports into one of these
/// closed kinds, so retry classification is a pattern match instead of shape probing.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network-level failure (timeout, reset, abort).
    #[error("transport failure ({kind:?}): {message}")]
    Transport {
        /// The classified transport condition.
        kind: TransportKind,
        /// The underlying error message.
        message: String,
    },

    /// The request was sent but no response arrived.
    #[error("no response from remote: {message}")]
    NoResponse {
        /// The underlying error message.
        message: String,
    },

    /// The remote answered with a non-success HTTP status.
    #[error("remote responded with status {code}: {message}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The remote answered, but the payload could not be understood.
    #[error("invalid response from remote: {message}")]
    InvalidResponse {
        /// Description of what was wrong with the payload.
        message: String,
    },
}

impl RemoteError {
    /// Shorthand for a [`RemoteError::Status`].
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        RemoteError::Status {
            code,
            message: message.into(),
        }
    }

    /// Shorthand for a [`RemoteError::Transport`].
    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        RemoteError::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use jobvisor::RemoteError;
    ///
    /// assert_eq!(RemoteError::status(429, "slow down").as_label(), "remote_rate_limited");
    /// assert_eq!(RemoteError::status(401, "nope").as_label(), "remote_client_error");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RemoteError::Transport { .. } => "remote_transport",
            RemoteError::NoResponse { .. } => "remote_no_response",
            RemoteError::Status { code: 429, .. } => "remote_rate_limited",
            RemoteError::Status { code, .. } if (400..500).contains(code) => "remote_client_error",
            RemoteError::Status { code, .. } if (500..600).contains(code) => "remote_server_error",
            RemoteError::Status { .. } => "remote_unexpected_status",
            RemoteError::InvalidResponse { .. } => "remote_invalid_response",
        }
    }

    /// Default retry classification.
    ///
    /// Retryable: transport timeouts/resets/aborts, requests without a response,
    /// `5xx` and `429`. Every other `4xx` is final, and anything unrecognized
    /// defaults to **not** retryable.
    ///
    /// # Example
    /// ```
    /// use jobvisor::{RemoteError, TransportKind};
    ///
    /// assert!(RemoteError::status(503, "unavailable").is_retryable());
    /// assert!(RemoteError::transport(TransportKind::ConnectionReset, "reset").is_retryable());
    /// assert!(!RemoteError::status(404, "missing").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Transport { .. } | RemoteError::NoResponse { .. } => true,
            RemoteError::Status { code, .. } => *code == 429 || (500..600).contains(code),
            RemoteError::InvalidResponse { .. } => false,
        }
    }
}

/// # Errors produced by the status poller.
///
/// Only failures of the polling *mechanism* land here. A job that finished with
/// a failure is returned as a normal [`JobStatus`](crate::JobStatus).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    /// Malformed input; rejected before any check is issued.
    #[error("invalid poll request: {reason}")]
    Validation {
        /// What was wrong with the input.
        reason: String,
    },

    /// The poll budget was exhausted.
    #[error("polling timed out after {}", human(.elapsed))]
    Timeout {
        /// Time spent polling when the budget ran out.
        elapsed: Duration,
    },

    /// Polling was cancelled via its cancellation token.
    #[error("polling cancelled")]
    Canceled,

    /// A status check failed and the retry executor gave up.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl PollError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PollError::Validation { .. } => "poll_validation",
            PollError::Timeout { .. } => "poll_timeout",
            PollError::Canceled => "poll_canceled",
            PollError::Remote(e) => e.as_label(),
        }
    }
}

/// # Errors surfaced by the caller-facing [`Orchestrator`](crate::Orchestrator).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    /// Malformed caller input.
    #[error("invalid request: {reason}")]
    Validation {
        /// What was wrong with the input.
        reason: String,
    },

    /// A remote call failed (after retries, when retryable).
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The poll budget was exhausted before the job reached a terminal state.
    #[error("job {job_id} did not finish: polling timed out after {}", human(.elapsed))]
    Timeout {
        /// The job that was being polled.
        job_id: String,
        /// Time spent polling.
        elapsed: Duration,
    },

    /// Waiting was cancelled by the caller.
    #[error("job {job_id}: waiting cancelled")]
    Canceled {
        /// The job that was being polled.
        job_id: String,
    },

    /// The remote service reported that the job itself failed.
    #[error("job {job_id} failed: {reason}")]
    JobFailed {
        /// The failed job.
        job_id: String,
        /// Failure reason reported by the remote service.
        reason: String,
    },
}

impl OrchestratorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            OrchestratorError::Validation { .. } => "orchestrator_validation",
            OrchestratorError::Remote(e) => e.as_label(),
            OrchestratorError::Timeout { .. } => "orchestrator_timeout",
            OrchestratorError::Canceled { .. } => "orchestrator_canceled",
            OrchestratorError::JobFailed { .. } => "orchestrator_job_failed",
        }
    }

    /// Lifts a poll failure for `job_id` into the caller-facing error.
    pub(crate) fn from_poll(job_id: &str, err: PollError) -> Self {
        match err {
            PollError::Validation { reason } => OrchestratorError::Validation { reason },
            PollError::Timeout { elapsed } => OrchestratorError::Timeout {
                job_id: job_id.to_string(),
                elapsed,
            },
            PollError::Canceled => OrchestratorError::Canceled {
                job_id: job_id.to_string(),
            },
            PollError::Remote(e) => OrchestratorError::Remote(e),
        }
    }
}

fn human(d: &Duration) -> String {
    format_duration(*d)
}

/// Formats a duration for humans: seconds below one minute, minutes above.
///
/// Values are rounded to one decimal place and trailing `.0` is dropped.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use jobvisor::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(1000)), "1 second");
/// assert_eq!(format_duration(Duration::from_millis(500)), "0.5 seconds");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1.5 minutes");
/// ```
pub fn format_duration(d: Duration) -> String {
    let secs = round_tenths(d.as_secs_f64());
    let (rounded, unit) = if secs < 60.0 {
        (secs, "second")
    } else {
        (round_tenths(secs / 60.0), "minute")
    };
    let plural = if rounded == 1.0 { "" } else { "s" };
    if rounded.fract() == 0.0 {
        format!("{} {unit}{plural}", rounded as u64)
    } else {
        format!("{rounded:.1} {unit}{plural}")
    }
}

fn round_tenths(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
