//! Fixed Sidekiq stats
//!
//! Each [`StatKind`] maps to one read function over the store. The collector
//! walks [`StatKind::ALL`] and never dispatches on metric-name strings.

use crate::keys::{KeyNamer, BUSY_FIELD};
use crate::store::{Store, StoreResult};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatKind {
    Processed,
    Failed,
    Busy,
    Enqueued,
    Schedule,
    Retry,
    Dead,
}

/// Reads one stat from the store
pub type StatReader<S> = fn(&mut S, &KeyNamer) -> StoreResult<u64>;

impl StatKind {
    pub const ALL: [StatKind; 7] = [
        StatKind::Processed,
        StatKind::Failed,
        StatKind::Busy,
        StatKind::Enqueued,
        StatKind::Schedule,
        StatKind::Retry,
        StatKind::Dead,
    ];

    /// Metric name in the snapshot
    pub fn name(self) -> &'static str {
        match self {
            StatKind::Processed => "processed",
            StatKind::Failed => "failed",
            StatKind::Busy => "busy",
            StatKind::Enqueued => "enqueued",
            StatKind::Schedule => "schedule",
            StatKind::Retry => "retry",
            StatKind::Dead => "dead",
        }
    }

    pub fn from_name(name: &str) -> Option<StatKind> {
        StatKind::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Cumulative counters; the plugin runtime reports them as rates
    pub fn is_counter(self) -> bool {
        matches!(self, StatKind::Processed | StatKind::Failed)
    }

    pub fn reader<S: Store>(self) -> StatReader<S> {
        match self {
            StatKind::Processed => read_processed::<S>,
            StatKind::Failed => read_failed::<S>,
            StatKind::Busy => sum_busy::<S>,
            StatKind::Enqueued => sum_enqueued::<S>,
            StatKind::Schedule => count_schedule::<S>,
            StatKind::Retry => count_retry::<S>,
            StatKind::Dead => count_dead::<S>,
        }
    }

    pub fn read<S: Store>(self, store: &mut S, keys: &KeyNamer) -> StoreResult<u64> {
        (self.reader::<S>())(store, keys)
    }
}

/// Sidekiq writes counters as decimal strings; anything else reads as zero.
fn parse_count(key: &str, raw: Option<String>) -> u64 {
    match raw {
        None => 0,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Non-integer count, treating as 0");
            0
        }),
    }
}

fn read_counter<S: Store>(store: &mut S, key: &str) -> StoreResult<u64> {
    let raw = store.get(key)?;
    Ok(parse_count(key, raw))
}

fn read_processed<S: Store>(store: &mut S, keys: &KeyNamer) -> StoreResult<u64> {
    read_counter(store, &keys.processed())
}

fn read_failed<S: Store>(store: &mut S, keys: &KeyNamer) -> StoreResult<u64> {
    read_counter(store, &keys.failed())
}

fn count_schedule<S: Store>(store: &mut S, keys: &KeyNamer) -> StoreResult<u64> {
    store.zcard(&keys.schedule())
}

fn count_retry<S: Store>(store: &mut S, keys: &KeyNamer) -> StoreResult<u64> {
    store.zcard(&keys.retry())
}

fn count_dead<S: Store>(store: &mut S, keys: &KeyNamer) -> StoreResult<u64> {
    store.zcard(&keys.dead())
}

fn sum_busy<S: Store>(store: &mut S, keys: &KeyNamer) -> StoreResult<u64> {
    let processes = store.smembers(&keys.processes())?;
    let mut busy = 0u64;
    for identity in &processes {
        let key = keys.process(identity);
        let raw = store.hget(&key, BUSY_FIELD)?;
        busy = busy.saturating_add(parse_count(&key, raw));
    }
    Ok(busy)
}

fn sum_enqueued<S: Store>(store: &mut S, keys: &KeyNamer) -> StoreResult<u64> {
    let queues = store.smembers(&keys.queues())?;
    let mut enqueued = 0u64;
    for name in &queues {
        enqueued = enqueued.saturating_add(store.llen(&keys.queue(name))?);
    }
    Ok(enqueued)
}
