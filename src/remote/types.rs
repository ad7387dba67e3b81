//! # Data exchanged with the remote generation service.
//!
//! These types are the boundary between the orchestrator and the transport layer.
//! Wire formats are the transport's business; the orchestrator only needs:
//! - [`GenerationParams`] what the caller asked for,
//! - [`Submission`] what a successful submit hands back,
//! - [`JobStatus`] one status observation.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque job identifier assigned by the remote service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Wraps a remote identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The caller's generation request. Immutable once submitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Text prompt.
    pub prompt: String,
    /// Number of outputs requested.
    pub count: u32,
    /// Model name as understood by the remote service.
    pub model: String,
    /// Any additional vendor-specific parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl GenerationParams {
    /// Creates parameters with no extra fields.
    pub fn new(prompt: impl Into<String>, count: u32, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            count,
            model: model.into(),
            extra: BTreeMap::new(),
        }
    }
}

/// Handle to a resource uploaded while submitting (e.g. a reference image).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Remote identifier of the uploaded resource.
    pub id: String,
    /// Where the resource can be fetched from.
    pub uri: String,
}

/// Everything needed to extend a submission without re-deriving it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    /// Submit id of the original request.
    pub submit_id: String,
    /// Serialized draft content sent with the original request.
    pub draft_content: String,
    /// Extra metrics blob sent with the original request.
    pub metrics_extra: String,
    /// Root model the request was issued against.
    pub root_model: String,
}

/// Result of a successful submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    /// Identifier assigned by the remote service.
    pub job_id: JobId,
    /// Resources uploaded while submitting.
    pub uploaded_resources: Vec<ResourceRef>,
    /// Snapshot used for a continuation, if one is ever needed.
    pub snapshot: RequestSnapshot,
}

/// Remote-side job state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Accepted, nothing produced yet.
    Pending,
    /// Some output produced.
    Processing,
    /// Finished.
    Completed,
    /// Finished with an error.
    Failed,
}

impl JobState {
    /// Lowercase name, as used in events.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

/// One generated output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputItem {
    /// Download URL of the output.
    pub url: String,
}

impl OutputItem {
    /// Creates an item pointing at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// A single status observation of a job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Remote state.
    pub state: JobState,
    /// Completion percentage, `0..=100`.
    pub progress: u8,
    /// Outputs available so far.
    pub output_items: Vec<OutputItem>,
    /// More output is outstanding beyond what this request can produce.
    pub needs_continuation: bool,
    /// Failure reason when `state == Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Informational note for the caller (e.g. "query again").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JobStatus {
    /// Status of a job that has produced `finished` of `total` outputs.
    ///
    /// The state is `Pending` while nothing finished and `Processing` afterwards.
    pub fn from_counts(finished: u32, total: u32) -> Self {
        Self {
            state: if finished == 0 {
                JobState::Pending
            } else {
                JobState::Processing
            },
            progress: progress_percent(finished, total),
            output_items: Vec::new(),
            needs_continuation: false,
            error: None,
            message: None,
        }
    }

    /// A completed job with the given outputs.
    pub fn completed(items: Vec<OutputItem>) -> Self {
        Self {
            state: JobState::Completed,
            progress: 100,
            output_items: items,
            needs_continuation: false,
            error: None,
            message: None,
        }
    }

    /// A failed job.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            state: JobState::Failed,
            progress: 0,
            output_items: Vec::new(),
            needs_continuation: false,
            error: Some(reason.into()),
            message: None,
        }
    }

    /// Marks that more output is outstanding.
    #[must_use]
    pub fn with_continuation(mut self) -> Self {
        self.needs_continuation = true;
        self
    }

    /// Replaces the output items.
    #[must_use]
    pub fn with_items(mut self, items: Vec<OutputItem>) -> Self {
        self.output_items = items;
        self
    }

    /// `Failed`, or `Completed` with nothing outstanding.
    pub fn is_terminal(&self) -> bool {
        match self.state {
            JobState::Failed => true,
            JobState::Completed => !self.needs_continuation,
            JobState::Pending | JobState::Processing => false,
        }
    }
}

/// `round(finished / total × 100)`, clamped to `100`; `0` when `total == 0`.
pub fn progress_percent(finished: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (f64::from(finished) / f64::from(total) * 100.0).round();
    pct.min(100.0) as u8
}
