//! # Remote generation service contract.
//!
//! [`RemoteGenerationApi`] is implemented by the transport layer (HTTP client,
//! request signing, image upload). The orchestrator treats all three operations as
//! fallible network calls and wraps each of them in the retry executor.
//!
//! Implementations must map whatever their client reports into the closed
//! [`RemoteError`] kinds; the retry classifier only pattern-matches on them.

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::remote::types::{GenerationParams, JobId, JobStatus, RequestSnapshot, Submission};

/// Operations offered by the remote generation service.
///
/// # Example
/// ```rust
/// use async_trait::async_trait;
/// use jobvisor::{
///     GenerationParams, JobId, JobStatus, OutputItem, RemoteError, RemoteGenerationApi,
///     RequestSnapshot, Submission,
/// };
///
/// struct AlwaysDone;
///
/// #[async_trait]
/// impl RemoteGenerationApi for AlwaysDone {
///     async fn submit(&self, _params: &GenerationParams) -> Result<Submission, RemoteError> {
///         Ok(Submission {
///             job_id: JobId::new("job-1"),
///             uploaded_resources: Vec::new(),
///             snapshot: RequestSnapshot::default(),
///         })
///     }
///
///     async fn check_status(&self, _job_id: &JobId) -> Result<JobStatus, RemoteError> {
///         Ok(JobStatus::completed(vec![OutputItem::new("https://cdn.example/1.png")]))
///     }
///
///     async fn continue_job(&self, _job_id: &JobId, _snapshot: &RequestSnapshot) -> Result<(), RemoteError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait RemoteGenerationApi: Send + Sync + 'static {
    /// Submits a new generation request.
    async fn submit(&self, params: &GenerationParams) -> Result<Submission, RemoteError>;

    /// Reads the current status of a job.
    async fn check_status(&self, job_id: &JobId) -> Result<JobStatus, RemoteError>;

    /// Extends an existing job so it produces the rest of the requested outputs.
    async fn continue_job(
        &self,
        job_id: &JobId,
        snapshot: &RequestSnapshot,
    ) -> Result<(), RemoteError>;
}
