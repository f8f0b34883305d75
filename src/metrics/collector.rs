//! Snapshot collection
//!
//! [`Collector::collect`] reads every fixed stat plus one latency per queue
//! and returns them as a single [`MetricsSnapshot`]. Reads are sequential on
//! one connection and not atomic with respect to each other; Sidekiq keeps
//! running while we look.
//!
//! Any store error aborts the whole collection. The one tolerated failure is
//! a queue whose oldest job cannot be decoded: that queue's latency is left
//! out and everything else is still reported.

use super::snapshot::MetricsSnapshot;
use super::stats::StatKind;
use crate::clock::{Clock, SystemClock};
use crate::keys::KeyNamer;
use crate::store::{Store, StoreResult};
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{debug, warn};

/// Prefix of the per-queue latency metric names
pub const QUEUE_LATENCY: &str = "QueueLatency";

/// Snapshot name for one queue's latency
pub fn latency_metric_name(queue: &str) -> String {
    format!("{}.{}", QUEUE_LATENCY, queue)
}

/// Outcome of inspecting the oldest job in a queue
#[derive(Debug, Clone, PartialEq)]
pub enum QueueLatency {
    /// Seconds since the oldest job was enqueued (0.0 for an empty queue)
    Seconds(f64),
    /// Oldest job could not be decoded
    Undecodable(String),
}

pub struct Collector<S, C = SystemClock> {
    store: S,
    keys: KeyNamer,
    clock: C,
}

impl<S: Store> Collector<S, SystemClock> {
    pub fn new(store: S, keys: KeyNamer) -> Self {
        Collector {
            store,
            keys,
            clock: SystemClock,
        }
    }
}

impl<S: Store, C: Clock> Collector<S, C> {
    pub fn with_clock(store: S, keys: KeyNamer, clock: C) -> Self {
        Collector { store, keys, clock }
    }

    pub fn keys(&self) -> &KeyNamer {
        &self.keys
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Take one snapshot
    pub fn collect(&mut self) -> StoreResult<MetricsSnapshot> {
        let started = Instant::now();

        let mut snapshot = self.collect_stats()?;
        let latencies = self.collect_latencies()?;
        let latency_count = latencies.len();
        snapshot.merge(latencies);

        debug!(
            namespace = self.keys.namespace(),
            metrics = snapshot.len(),
            latencies = latency_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Collected sidekiq snapshot"
        );
        Ok(snapshot)
    }

    /// The fixed stats (`processed`, `failed`, `busy`, ...)
    pub fn collect_stats(&mut self) -> StoreResult<MetricsSnapshot> {
        let mut snapshot = MetricsSnapshot::new();
        for kind in StatKind::ALL {
            let value = kind.read(&mut self.store, &self.keys)?;
            snapshot.insert(kind.name(), value);
        }
        Ok(snapshot)
    }

    pub fn read_stat(&mut self, kind: StatKind) -> StoreResult<u64> {
        kind.read(&mut self.store, &self.keys)
    }

    /// `QueueLatency.<queue>` for every queue whose oldest job is readable
    pub fn collect_latencies(&mut self) -> StoreResult<MetricsSnapshot> {
        let queues = self.store.smembers(&self.keys.queues())?;
        let mut snapshot = MetricsSnapshot::new();
        for queue in &queues {
            match self.queue_latency(queue)? {
                QueueLatency::Seconds(latency) => {
                    snapshot.insert(latency_metric_name(queue), latency);
                }
                QueueLatency::Undecodable(reason) => {
                    warn!(queue = %queue, reason = %reason, "Skipping latency for queue");
                }
            }
        }
        Ok(snapshot)
    }

    /// Age of the oldest job in `queue`.
    ///
    /// Sidekiq enqueues with LPUSH and fetches with BRPOP, so the job that has
    /// waited longest sits at the tail of the list.
    pub fn queue_latency(&mut self, queue: &str) -> StoreResult<QueueLatency> {
        let key = self.keys.queue(queue);
        let tail = self.store.lrange(&key, -1, -1)?;
        let Some(payload) = tail.into_iter().next() else {
            return Ok(QueueLatency::Seconds(0.0));
        };
        let now = self.clock.now_unix_secs() as f64;
        Ok(latency_from_payload(&payload, now))
    }
}

/// Latency of one job payload relative to `now`. Not clamped: a job stamped
/// in the future yields a negative latency.
pub fn latency_from_payload(payload: &str, now: f64) -> QueueLatency {
    let job: Map<String, Value> = match serde_json::from_str(payload) {
        Ok(job) => job,
        Err(e) => return QueueLatency::Undecodable(e.to_string()),
    };

    match job.get("enqueued_at") {
        None => QueueLatency::Seconds(0.0),
        Some(enqueued_at) => match enqueued_at.as_f64() {
            Some(enqueued_at) => QueueLatency::Seconds(now - enqueued_at),
            None => QueueLatency::Undecodable(format!(
                "enqueued_at is not a number: {}",
                enqueued_at
            )),
        },
    }
}
