use clap::Parser;
use sidekiq_metrics::config::Options;
use sidekiq_metrics::observability::init_tracing;
use sidekiq_metrics::plugin::{Plugin, META_ENV};
use sidekiq_metrics::{Collector, RedisStore};
use std::io::Write;
use tracing::error;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Options::parse();

    if let Err(e) = init_tracing() {
        eprintln!("failed to initialize logging: {}", e);
    }

    let plugin = Plugin::new(opts.plugin_config());
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if std::env::var_os(META_ENV).is_some_and(|v| !v.is_empty()) {
        plugin.write_meta(&mut out)?;
        out.flush()?;
        return Ok(());
    }

    let redis = opts.redis_config();
    let store = RedisStore::connect(&redis).map_err(|e| {
        error!(addr = %redis.addr(), error = %e, "Cannot connect to redis");
        e
    })?;

    let mut collector = Collector::new(store, opts.key_namer());
    plugin.run(&mut collector, &mut out).map_err(|e| {
        error!(error = %e, "Sidekiq metrics run failed");
        e
    })?;
    out.flush()?;

    Ok(())
}
