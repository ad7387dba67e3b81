//! # Cached job record.
//!
//! A [`TaskEntry`] holds everything the orchestrator needs to act on a job after
//! submission: the caller's parameters, resources uploaded while submitting, and
//! the request snapshot a continuation is issued with.
//!
//! Everything except `state` and `continuation_sent` is immutable after creation.
//! Both mutable fields are atomics, so entries are shared as `Arc<TaskEntry>`
//! without any lock.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tokio::time::Instant;

use crate::remote::{GenerationParams, JobId, RequestSnapshot, ResourceRef};

/// Lifecycle of a cached entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum EntryState {
    /// Stored, no status observed yet.
    Created = 0,
    /// At least one non-terminal status observed.
    Active = 1,
    /// A terminal status was observed.
    Completed = 2,
}

impl EntryState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => EntryState::Created,
            1 => EntryState::Active,
            _ => EntryState::Completed,
        }
    }

    /// Lowercase name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryState::Created => "created",
            EntryState::Active => "active",
            EntryState::Completed => "completed",
        }
    }
}

/// Caller-provided part of an entry; the cache stamps the rest.
#[derive(Clone, Debug)]
pub struct TaskFields {
    /// The original request.
    pub params: GenerationParams,
    /// Resources uploaded while submitting.
    pub uploaded_resources: Vec<ResourceRef>,
    /// Snapshot used to issue a continuation.
    pub snapshot: RequestSnapshot,
}

impl TaskFields {
    /// Bundles the fields of a new entry.
    pub fn new(
        params: GenerationParams,
        uploaded_resources: Vec<ResourceRef>,
        snapshot: RequestSnapshot,
    ) -> Self {
        Self {
            params,
            uploaded_resources,
            snapshot,
        }
    }
}

/// One tracked job.
#[derive(Debug)]
pub struct TaskEntry {
    id: JobId,
    fields: TaskFields,
    continuation_sent: AtomicBool,
    state: AtomicU8,
    created_at: Instant,
    expires_at: Instant,
}

impl TaskEntry {
    pub(crate) fn new(id: JobId, fields: TaskFields, created_at: Instant, expires_at: Instant) -> Self {
        Self {
            id,
            fields,
            continuation_sent: AtomicBool::new(false),
            state: AtomicU8::new(EntryState::Created as u8),
            created_at,
            expires_at,
        }
    }

    /// Job id.
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// The original request.
    pub fn params(&self) -> &GenerationParams {
        &self.fields.params
    }

    /// Resources uploaded while submitting.
    pub fn uploaded_resources(&self) -> &[ResourceRef] {
        &self.fields.uploaded_resources
    }

    /// Snapshot used to issue a continuation.
    pub fn snapshot(&self) -> &RequestSnapshot {
        &self.fields.snapshot
    }

    /// When the entry was stored.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// When the entry stops being visible.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// True once `now` is strictly past `expires_at`.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    /// Whether the continuation for this job was already claimed.
    pub fn continuation_sent(&self) -> bool {
        self.continuation_sent.load(Ordering::Acquire)
    }

    /// Claims the single continuation for this job.
    ///
    /// Returns `true` for exactly one caller over the entry's lifetime.
    pub fn try_claim_continuation(&self) -> bool {
        self.continuation_sent
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EntryState {
        EntryState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves the entry forward. `Completed` is sticky.
    pub fn set_state(&self, next: EntryState) {
        self.state.fetch_max(next as u8, Ordering::AcqRel);
    }

    /// Rough heap footprint in bytes, for cache statistics only.
    pub(crate) fn approx_size(&self) -> usize {
        let params = serde_json::to_vec(&self.fields.params).map_or(0, |v| v.len());
        let snapshot = serde_json::to_vec(&self.fields.snapshot).map_or(0, |v| v.len());
        let resources = serde_json::to_vec(&self.fields.uploaded_resources).map_or(0, |v| v.len());
        std::mem::size_of::<Self>() + self.id.as_str().len() + params + snapshot + resources
    }
}
