//! Graph definitions advertised to mackerel-agent.

use serde::Serialize;
use std::collections::BTreeMap;

/// Metric name that expands to every snapshot key under the graph
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Serialize)]
pub struct MetricDef {
    pub name: &'static str,
    pub label: &'static str,
    pub stacked: bool,
    /// Report the per-minute rate against the previous run instead of the raw value
    #[serde(skip)]
    pub diff: bool,
}

impl MetricDef {
    const fn gauge(name: &'static str, label: &'static str) -> Self {
        MetricDef {
            name,
            label,
            stacked: false,
            diff: false,
        }
    }

    const fn counter(name: &'static str, label: &'static str) -> Self {
        MetricDef {
            name,
            label,
            stacked: false,
            diff: true,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.name == WILDCARD
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Graph {
    pub label: &'static str,
    pub unit: &'static str,
    pub metrics: Vec<MetricDef>,
}

/// Graphs keyed by their unprefixed name
pub fn graph_definitions() -> Vec<(&'static str, Graph)> {
    vec![
        (
            "ProcessedANDFailed",
            Graph {
                label: "Sidekiq processed and failed count",
                unit: "integer",
                metrics: vec![
                    MetricDef::counter("processed", "Processed"),
                    MetricDef::counter("failed", "Failed"),
                ],
            },
        ),
        (
            "Stats",
            Graph {
                label: "Sidekiq stats",
                unit: "integer",
                metrics: vec![
                    MetricDef::gauge("busy", "Busy"),
                    MetricDef::gauge("enqueued", "Enqueued"),
                    MetricDef::gauge("schedule", "Schedule"),
                    MetricDef::gauge("retry", "Retry"),
                    MetricDef::gauge("dead", "Dead"),
                ],
            },
        ),
        (
            "QueueLatency",
            Graph {
                label: "Sidekiq queue latency",
                unit: "float",
                metrics: vec![MetricDef::gauge(WILDCARD, "%1")],
            },
        ),
    ]
}

#[derive(Serialize)]
struct Meta<'a> {
    graphs: BTreeMap<String, &'a Graph>,
}

/// JSON body of the `MACKEREL_AGENT_PLUGIN_META` reply
pub fn meta_json(prefix: &str, graphs: &[(&'static str, Graph)]) -> serde_json::Result<String> {
    let meta = Meta {
        graphs: graphs
            .iter()
            .map(|(key, graph)| (format!("{}.{}", prefix, key), graph))
            .collect(),
    };
    serde_json::to_string(&meta)
}
