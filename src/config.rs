//! Command-line configuration

use crate::keys::KeyNamer;
use crate::plugin::{PluginConfig, DEFAULT_PREFIX};
use crate::store::RedisConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "mackerel-plugin-sidekiq")]
#[command(about = "Sidekiq metrics plugin for mackerel-agent", long_about = None, version)]
pub struct Options {
    /// Redis hostname
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Redis port
    #[arg(long, default_value_t = 6379)]
    pub port: u16,

    /// Redis password
    #[arg(long, env = "SIDEKIQ_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Redis database index
    #[arg(long, default_value_t = 0)]
    pub db: i64,

    /// Namespace Sidekiq was configured with (redis-namespace)
    #[arg(long = "redis-namespace", default_value = "")]
    pub redis_namespace: String,

    /// Metric key prefix
    #[arg(long = "metric-key-prefix", default_value = DEFAULT_PREFIX)]
    pub metric_key_prefix: String,

    /// State file for counter rates
    #[arg(long)]
    pub tempfile: Option<PathBuf>,

    /// Redis connect/read/write timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub timeout: u64,

    /// Directory for the default state file, set by mackerel-agent
    #[arg(long, env = "MACKEREL_PLUGIN_WORKDIR", hide = true)]
    pub workdir: Option<PathBuf>,
}

impl Options {
    pub fn redis_config(&self) -> RedisConfig {
        RedisConfig {
            host: self.host.clone(),
            port: self.port,
            password: self.password.clone().filter(|p| !p.is_empty()),
            db: self.db,
            timeout: Duration::from_secs(self.timeout),
        }
    }

    pub fn key_namer(&self) -> KeyNamer {
        KeyNamer::new(self.redis_namespace.clone())
    }

    pub fn plugin_config(&self) -> PluginConfig {
        PluginConfig::new(
            &self.metric_key_prefix,
            self.tempfile.clone(),
            self.workdir.clone(),
        )
    }
}
