//! End-to-end plugin runs: collect from an in-memory store, print agent
//! lines, and carry counter state between runs through the state file.

use sidekiq_metrics::plugin::PluginState;
use sidekiq_metrics::{
    Collector, FixedClock, InMemoryStore, KeyNamer, Plugin, PluginConfig, PluginError,
};
use std::path::Path;

fn plugin(tempfile: &Path) -> Plugin {
    Plugin::new(PluginConfig::new(
        "sidekiq",
        Some(tempfile.to_path_buf()),
        None,
    ))
}

fn run(plugin: &Plugin, store: &mut InMemoryStore, now: i64) -> Result<String, PluginError> {
    let mut collector = Collector::with_clock(store, KeyNamer::default(), FixedClock(now));
    let mut out = Vec::new();
    plugin.run(&mut collector, &mut out)?;
    Ok(String::from_utf8(out).expect("plugin output is utf-8"))
}

fn installation() -> InMemoryStore {
    let mut store = InMemoryStore::new();
    store
        .set("stat:processed", "100")
        .set("stat:failed", "4")
        .sadd("processes", "host:1")
        .hset("host:1", "busy", "2")
        .sadd("queues", "default")
        .lpush("queue:default", r#"{"enqueued_at":1699999990.5}"#);
    store
}

#[test]
fn test_first_run_has_no_counter_lines() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state");
    let plugin = plugin(&state_path);
    let mut store = installation();

    let output = run(&plugin, &mut store, 1_700_000_000).unwrap();

    assert_eq!(
        output,
        "sidekiq.Stats.busy\t2\t1700000000\n\
         sidekiq.Stats.enqueued\t1\t1700000000\n\
         sidekiq.Stats.schedule\t0\t1700000000\n\
         sidekiq.Stats.retry\t0\t1700000000\n\
         sidekiq.Stats.dead\t0\t1700000000\n\
         sidekiq.QueueLatency.default\t9.500000\t1700000000\n"
    );

    let state = PluginState::load(&state_path).expect("state written");
    assert_eq!(state.last_time, 1_700_000_000);
    assert_eq!(state.values.get("processed").and_then(|v| v.as_u64()), Some(100));
}

#[test]
fn test_second_run_reports_per_minute_rates() {
    let dir = tempfile::tempdir().unwrap();
    let plugin = plugin(&dir.path().join("state"));
    let mut store = installation();

    run(&plugin, &mut store, 1_700_000_000).unwrap();

    store.set("stat:processed", "160").set("stat:failed", "5");
    let output = run(&plugin, &mut store, 1_700_000_030).unwrap();

    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines[0], "sidekiq.ProcessedANDFailed.processed\t120.000000\t1700000030");
    assert_eq!(lines[1], "sidekiq.ProcessedANDFailed.failed\t2.000000\t1700000030");
    assert_eq!(lines.len(), 8);
}

#[test]
fn test_counter_reset_drops_rate_line() {
    let dir = tempfile::tempdir().unwrap();
    let plugin = plugin(&dir.path().join("state"));
    let mut store = installation();

    run(&plugin, &mut store, 1_700_000_000).unwrap();

    // `Sidekiq::Stats#reset` zeroes the counters
    store.set("stat:processed", "0");
    let output = run(&plugin, &mut store, 1_700_000_060).unwrap();

    assert!(!output.contains("ProcessedANDFailed.processed"));
    assert!(output.contains("sidekiq.ProcessedANDFailed.failed\t0.000000\t1700000060"));
}

#[test]
fn test_custom_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let plugin = Plugin::new(PluginConfig::new(
        "jobs",
        Some(dir.path().join("state")),
        None,
    ));
    let mut store = installation();

    let output = run(&plugin, &mut store, 1_700_000_000).unwrap();
    assert!(output.lines().all(|line| line.starts_with("jobs.")));
}

#[test]
fn test_store_failure_prints_nothing_and_keeps_state() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state");
    let plugin = plugin(&state_path);
    let mut store = installation();

    run(&plugin, &mut store, 1_700_000_000).unwrap();
    let before = PluginState::load(&state_path);

    store.fail_command("ZCARD");
    let mut collector =
        Collector::with_clock(&mut store, KeyNamer::default(), FixedClock(1_700_000_060));
    let mut out = Vec::new();
    let result = plugin.run(&mut collector, &mut out);

    assert!(matches!(result, Err(PluginError::Store(_))));
    assert!(out.is_empty());
    assert_eq!(PluginState::load(&state_path), before);
}
