pub mod clock;
pub mod config;
pub mod keys;
pub mod metrics;
pub mod observability;
pub mod plugin;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use keys::{resolve, KeyNamer};
pub use metrics::{Collector, MetricValue, MetricsSnapshot, StatKind};
pub use plugin::{Plugin, PluginConfig, PluginError};
pub use store::{InMemoryStore, RedisConfig, RedisStore, Store, StoreError};
