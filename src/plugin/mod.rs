//! mackerel-agent Plugin Runtime
//!
//! Turns a [`MetricsSnapshot`] into the agent's line protocol:
//!
//! ```text
//! <prefix>.<graph>.<metric>\t<value>\t<unix seconds>
//! ```
//!
//! Counter metrics (`processed`, `failed`) are reported as per-minute rates
//! against the previous run, which is persisted in a state file. When the
//! agent sets `MACKEREL_AGENT_PLUGIN_META`, only the graph definitions are
//! printed.

pub mod graph;
pub mod state;

pub use graph::{graph_definitions, meta_json, Graph, MetricDef, WILDCARD};
pub use state::PluginState;

use crate::clock::Clock;
use crate::metrics::{Collector, MetricValue, MetricsSnapshot};
use crate::store::{Store, StoreError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Set by mackerel-agent when it wants graph definitions
pub const META_ENV: &str = "MACKEREL_AGENT_PLUGIN_META";
pub const DEFAULT_PREFIX: &str = "sidekiq";

/// Rates over a longer gap than this are dropped
const MAX_DIFF_SECS: i64 = 600;

/// Error type for plugin runs
#[derive(Debug)]
pub enum PluginError {
    Store(StoreError),
    Io(std::io::Error),
    State(serde_json::Error),
}

impl std::fmt::Display for PluginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginError::Store(e) => write!(f, "failed to collect metrics: {}", e),
            PluginError::Io(e) => write!(f, "plugin I/O error: {}", e),
            PluginError::State(e) => write!(f, "plugin state encoding error: {}", e),
        }
    }
}

impl std::error::Error for PluginError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PluginError::Store(e) => Some(e),
            PluginError::Io(e) => Some(e),
            PluginError::State(e) => Some(e),
        }
    }
}

impl From<StoreError> for PluginError {
    fn from(e: StoreError) -> Self {
        PluginError::Store(e)
    }
}

impl From<std::io::Error> for PluginError {
    fn from(e: std::io::Error) -> Self {
        PluginError::Io(e)
    }
}

impl From<serde_json::Error> for PluginError {
    fn from(e: serde_json::Error) -> Self {
        PluginError::State(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    /// First component of every metric key
    pub prefix: String,
    /// Where the previous run's snapshot lives
    pub tempfile: PathBuf,
}

impl PluginConfig {
    /// Empty prefix falls back to `sidekiq`; no tempfile means
    /// `<workdir or tmp>/mackerel-plugin-<prefix>`.
    pub fn new(prefix: &str, tempfile: Option<PathBuf>, workdir: Option<PathBuf>) -> Self {
        let prefix = if prefix.is_empty() {
            DEFAULT_PREFIX.to_string()
        } else {
            prefix.to_string()
        };
        let tempfile = tempfile.unwrap_or_else(|| {
            workdir
                .unwrap_or_else(std::env::temp_dir)
                .join(format!("mackerel-plugin-{}", prefix))
        });
        PluginConfig { prefix, tempfile }
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        PluginConfig::new(DEFAULT_PREFIX, None, None)
    }
}

pub struct Plugin {
    config: PluginConfig,
    graphs: Vec<(&'static str, Graph)>,
}

impl Plugin {
    pub fn new(config: PluginConfig) -> Self {
        Plugin {
            config,
            graphs: graph_definitions(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    pub fn tempfile(&self) -> &Path {
        &self.config.tempfile
    }

    /// `# mackerel-agent-plugin` header followed by the graph JSON
    pub fn write_meta<W: Write>(&self, out: &mut W) -> Result<(), PluginError> {
        let json = meta_json(&self.config.prefix, &self.graphs)?;
        writeln!(out, "# mackerel-agent-plugin")?;
        writeln!(out, "{}", json)?;
        Ok(())
    }

    /// Collect a snapshot, print it and remember it for the next run
    pub fn run<S, C, W>(
        &self,
        collector: &mut Collector<S, C>,
        out: &mut W,
    ) -> Result<(), PluginError>
    where
        S: Store,
        C: Clock,
        W: Write,
    {
        let snapshot = collector.collect()?;
        let now = collector.clock().now_unix_secs();
        self.report(&snapshot, now, out)
    }

    /// Print `snapshot` taken at `now` and persist it as the new state
    pub fn report<W: Write>(
        &self,
        snapshot: &MetricsSnapshot,
        now: i64,
        out: &mut W,
    ) -> Result<(), PluginError> {
        let previous = PluginState::load(&self.config.tempfile);
        self.write_values(snapshot, previous.as_ref(), now, out)?;
        PluginState::new(now, snapshot.clone()).save(&self.config.tempfile)?;
        Ok(())
    }

    /// Print one line per graphed metric present in `snapshot`
    pub fn write_values<W: Write>(
        &self,
        snapshot: &MetricsSnapshot,
        previous: Option<&PluginState>,
        now: i64,
        out: &mut W,
    ) -> Result<(), PluginError> {
        for (graph_key, graph) in &self.graphs {
            for metric in &graph.metrics {
                if metric.is_wildcard() {
                    let scope = format!("{}.", graph_key);
                    for (name, value) in snapshot.with_prefix(&scope) {
                        if !is_valid_suffix(&name[scope.len()..]) {
                            debug!(metric = name, "Skipping metric with unsupported name");
                            continue;
                        }
                        self.write_line(out, name, value, now)?;
                    }
                    continue;
                }

                let Some(value) = snapshot.get(metric.name) else {
                    continue;
                };
                let value = if metric.diff {
                    match counter_rate(metric.name, value, previous, now) {
                        Some(rate) => MetricValue::Float(rate),
                        None => continue,
                    }
                } else {
                    value
                };
                let name = format!("{}.{}", graph_key, metric.name);
                self.write_line(out, &name, value, now)?;
            }
        }
        Ok(())
    }

    fn write_line<W: Write>(
        &self,
        out: &mut W,
        name: &str,
        value: MetricValue,
        now: i64,
    ) -> Result<(), PluginError> {
        writeln!(out, "{}.{}\t{}\t{}", self.config.prefix, name, value, now)?;
        Ok(())
    }
}

/// Mackerel metric names only allow `[-a-zA-Z0-9_]` per dotted component.
fn is_valid_suffix(suffix: &str) -> bool {
    !suffix.is_empty()
        && suffix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Per-minute rate of a cumulative counter since the previous run.
///
/// `None` when there is nothing sensible to report: no previous value, no
/// elapsed time, a gap over ten minutes, or a counter that went backwards.
pub fn counter_rate(
    name: &str,
    current: MetricValue,
    previous: Option<&PluginState>,
    now: i64,
) -> Option<f64> {
    let previous_state = previous?;
    let last = previous_state.values.get(name)?;
    let elapsed = now - previous_state.last_time;

    if elapsed <= 0 {
        return None;
    }
    if elapsed > MAX_DIFF_SECS {
        warn!(metric = name, elapsed, "Too long since the previous run, skipping rate");
        return None;
    }

    let delta = match (current, last) {
        (MetricValue::Uint(cur), MetricValue::Uint(last)) => {
            if cur < last {
                debug!(metric = name, "Counter seems to be reset");
                return None;
            }
            (cur - last) as f64
        }
        (cur, last) => {
            let delta = cur.as_f64() - last.as_f64();
            if delta < 0.0 {
                debug!(metric = name, "Counter seems to be reset");
                return None;
            }
            delta
        }
    };
    Some(delta * 60.0 / elapsed as f64)
}
