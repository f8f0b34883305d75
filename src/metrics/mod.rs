//! Sidekiq Metrics Aggregation
//!
//! Turns Sidekiq's Redis key layout into one flat snapshot:
//!
//! - **Counters**: `processed`, `failed` (cumulative, read as-is)
//! - **Gauges**: `busy` (summed over processes), `enqueued` (summed over
//!   queues), `schedule`, `retry`, `dead`
//! - **Latency**: `QueueLatency.<queue>`, age of each queue's oldest job

mod collector;
mod snapshot;
mod stats;

pub use collector::{
    latency_from_payload, latency_metric_name, Collector, QueueLatency, QUEUE_LATENCY,
};
pub use snapshot::{MetricValue, MetricsSnapshot};
pub use stats::{StatKind, StatReader};
