//! # TaskCache: time-bounded store of in-flight jobs.
//!
//! [`TaskCache`] keeps one [`TaskEntry`] per job id for at most `ttl`.
//! Entries disappear on explicit [`cleanup`](TaskCache::cleanup), lazily when a read
//! finds them expired, or when the background sweeper runs.
//!
//! ## Architecture
//! ```text
//!   set(id) ──► DashMap<JobId, Arc<TaskEntry>> ◄── get(id): expired? remove_if + None
//!                       ▲
//!                       │ evict_expired() every sweep_interval
//!                sweeper task (Weak<Inner>, stops on close() or last drop)
//! ```
//!
//! ## Rules
//! - Reads of unrelated ids never contend (sharded map).
//! - `set` replaces any previous entry for the same id.
//! - Cache operations never fail; unknown ids return `None`/`false`.
//! - The sweeper never holds the cache alive and never runs on the `get`/`set` path.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::cache::entry::{EntryState, TaskEntry, TaskFields};
use crate::events::{Bus, Event, EventKind};
use crate::remote::JobId;

/// Task cache settings.
///
/// ## Sentinel values
/// - `sweep_interval = 0s` → no background sweeper (lazy expiry only)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum time an entry stays visible.
    pub ttl: Duration,
    /// How often the background sweeper evicts expired entries.
    pub sweep_interval: Duration,
}

impl CacheConfig {
    /// Returns the sweep interval as an `Option` (`None` = no sweeper).
    #[inline]
    pub fn sweep_every(&self) -> Option<Duration> {
        if self.sweep_interval == Duration::ZERO {
            None
        } else {
            Some(self.sweep_interval)
        }
    }
}

impl Default for CacheConfig {
    /// `ttl = 30min`, `sweep_interval = 5min`.
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Point-in-time cache statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Stored entries, including expired ones not yet evicted.
    pub size: usize,
    /// Stored entries per lifecycle state.
    pub by_state: BTreeMap<EntryState, usize>,
    /// Stored entries that are already past their TTL.
    pub expired: usize,
    /// Rough memory footprint in KiB (rounded up).
    pub memory_estimate_kb: usize,
}

struct Inner {
    entries: DashMap<JobId, Arc<TaskEntry>>,
    cfg: CacheConfig,
    bus: Option<Bus>,
    sweeper_started: AtomicBool,
    stop: CancellationToken,
}

impl Inner {
    fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// Shared, time-bounded store of [`TaskEntry`].
///
/// Cheap to clone; every clone refers to the same entries.
///
/// # Example
/// ```rust
/// use jobvisor::{CacheConfig, GenerationParams, JobId, RequestSnapshot, TaskCache, TaskFields};
///
/// let cache = TaskCache::new(CacheConfig::default());
/// let id = JobId::new("job-1");
/// cache.set(
///     id.clone(),
///     TaskFields::new(GenerationParams::new("a red fox", 4, "v3"), vec![], RequestSnapshot::default()),
/// );
///
/// assert!(cache.has("job-1"));
/// assert!(cache.cleanup("job-1"));
/// assert!(!cache.cleanup("job-1"));
/// ```
#[derive(Clone)]
pub struct TaskCache {
    inner: Arc<Inner>,
}

impl TaskCache {
    /// Creates an empty cache.
    ///
    /// The sweeper is started lazily by the first [`set`](Self::set) that runs
    /// inside a tokio runtime.
    pub fn new(cfg: CacheConfig) -> Self {
        Self::build(cfg, None)
    }

    /// Creates an empty cache that reports sweeps on `bus`.
    pub fn with_bus(cfg: CacheConfig, bus: Bus) -> Self {
        Self::build(cfg, Some(bus))
    }

    fn build(cfg: CacheConfig, bus: Option<Bus>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                cfg,
                bus,
                sweeper_started: AtomicBool::new(false),
                stop: CancellationToken::new(),
            }),
        }
    }

    /// Stores an entry for `id`, replacing any previous one.
    pub fn set(&self, id: JobId, fields: TaskFields) -> Arc<TaskEntry> {
        self.ensure_sweeper();

        let now = Instant::now();
        let entry = Arc::new(TaskEntry::new(id.clone(), fields, now, now + self.inner.cfg.ttl));
        self.inner.entries.insert(id, Arc::clone(&entry));
        entry
    }

    /// Returns the live entry for `id`.
    ///
    /// An expired entry is removed and reported as absent.
    pub fn get(&self, id: &str) -> Option<Arc<TaskEntry>> {
        let now = Instant::now();
        let entry = self.inner.entries.get(id).map(|e| Arc::clone(e.value()))?;
        if entry.is_expired_at(now) {
            // Only drop what we saw expire; a concurrent `set` may have replaced it.
            self.inner
                .entries
                .remove_if(id, |_, current| Arc::ptr_eq(current, &entry));
            return None;
        }
        Some(entry)
    }

    /// True if a live entry exists for `id`.
    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Removes the entry for `id`; returns whether one existed.
    pub fn cleanup(&self, id: &str) -> bool {
        self.inner.entries.remove(id).is_some()
    }

    /// Removes `entry` only if it is still the one stored under its id.
    ///
    /// A newer entry that replaced it under the same id is left in place.
    pub fn cleanup_entry(&self, entry: &TaskEntry) -> bool {
        self.inner
            .entries
            .remove_if(entry.id().as_str(), |_, current| std::ptr::eq(current.as_ref(), entry))
            .is_some()
    }

    /// Removes every expired entry; returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        self.inner.evict_expired()
    }

    /// Number of stored entries (expired ones included until evicted).
    pub fn size(&self) -> usize {
        self.inner.entries.len()
    }

    /// Collects statistics over all stored entries.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let mut stats = CacheStats::default();
        let mut bytes = 0usize;

        for item in self.inner.entries.iter() {
            let entry = item.value();
            stats.size += 1;
            *stats.by_state.entry(entry.state()).or_insert(0) += 1;
            if entry.is_expired_at(now) {
                stats.expired += 1;
            }
            bytes += entry.approx_size();
        }
        stats.memory_estimate_kb = bytes.div_ceil(1024);
        stats
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.inner.entries.clear();
    }

    /// Stops the background sweeper. Idempotent.
    ///
    /// Entries stay readable; expiry falls back to lazy removal.
    pub fn close(&self) {
        self.inner.stop.cancel();
    }

    /// True once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.inner.stop.is_cancelled()
    }

    fn ensure_sweeper(&self) {
        let Some(every) = self.inner.cfg.sweep_every() else {
            return;
        };
        if self.inner.stop.is_cancelled() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        if self.inner.sweeper_started.swap(true, Ordering::AcqRel) {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let stop = self.inner.stop.clone();
        handle.spawn(sweep_loop(weak, stop, every));
    }
}

impl std::fmt::Debug for TaskCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCache")
            .field("size", &self.size())
            .field("cfg", &self.inner.cfg)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn sweep_loop(weak: Weak<Inner>, stop: CancellationToken, every: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                let Some(inner) = weak.upgrade() else { break };
                let removed = inner.evict_expired();
                if removed > 0 {
                    tracing::debug!(removed, remaining = inner.entries.len(), "evicted expired cache entries");
                    if let Some(bus) = &inner.bus {
                        bus.publish(Event::new(EventKind::EntriesEvicted).with_items(removed));
                    }
                }
            }
        }
    }
    tracing::trace!("cache sweeper stopped");
}
