//! Boundary with the remote generation service.

mod api;
mod types;

pub use api::RemoteGenerationApi;
pub use types::{
    progress_percent, GenerationParams, JobId, JobState, JobStatus, OutputItem, RequestSnapshot,
    ResourceRef, Submission,
};
