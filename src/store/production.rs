//! Production store: a single synchronous Redis connection.

use super::{Store, StoreError, StoreResult};
use redis::Commands;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for the Sidekiq Redis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
    /// Applied to connect, read and write
    pub timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RedisConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn connection_info(&self) -> redis::ConnectionInfo {
        redis::ConnectionInfo {
            addr: redis::ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: redis::RedisConnectionInfo {
                db: self.db,
                password: self.password.clone(),
                ..Default::default()
            },
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_timeout()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
        {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Protocol(err.to_string())
        }
    }
}

pub struct RedisStore {
    conn: redis::Connection,
}

impl RedisStore {
    /// Open the connection, authenticate and select the database
    pub fn connect(config: &RedisConfig) -> StoreResult<Self> {
        let client = redis::Client::open(config.connection_info())?;
        let conn = client.get_connection_with_timeout(config.timeout)?;
        conn.set_read_timeout(Some(config.timeout))?;
        conn.set_write_timeout(Some(config.timeout))?;

        info!(addr = %config.addr(), db = config.db, "Connected to redis");
        Ok(RedisStore { conn })
    }

    pub fn from_connection(conn: redis::Connection) -> Self {
        RedisStore { conn }
    }
}

impl Store for RedisStore {
    fn get(&mut self, key: &str) -> StoreResult<Option<String>> {
        debug!(key, "GET");
        Ok(self.conn.get::<_, Option<String>>(key)?)
    }

    fn zcard(&mut self, key: &str) -> StoreResult<u64> {
        debug!(key, "ZCARD");
        Ok(self.conn.zcard::<_, u64>(key)?)
    }

    fn smembers(&mut self, key: &str) -> StoreResult<Vec<String>> {
        debug!(key, "SMEMBERS");
        Ok(self.conn.smembers::<_, Vec<String>>(key)?)
    }

    fn hget(&mut self, key: &str, field: &str) -> StoreResult<Option<String>> {
        debug!(key, field, "HGET");
        Ok(self.conn.hget::<_, _, Option<String>>(key, field)?)
    }

    fn llen(&mut self, key: &str) -> StoreResult<u64> {
        debug!(key, "LLEN");
        Ok(self.conn.llen::<_, u64>(key)?)
    }

    fn lrange(&mut self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        debug!(key, start, stop, "LRANGE");
        Ok(self.conn.lrange::<_, Vec<String>>(key, start, stop)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RedisConfig::default();
        assert_eq!(config.addr(), "localhost:6379");
        assert_eq!(config.db, 0);
        assert_eq!(config.password, None);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_connection_info() {
        let config = RedisConfig {
            host: "redis.internal".to_string(),
            port: 6380,
            password: Some("secret".to_string()),
            db: 3,
            ..Default::default()
        };
        let info = config.connection_info();
        assert_eq!(
            info.addr,
            redis::ConnectionAddr::Tcp("redis.internal".to_string(), 6380)
        );
        assert_eq!(info.redis.db, 3);
        assert_eq!(info.redis.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_io_error_maps_to_connection() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: StoreError = redis::RedisError::from(io).into();
        assert!(matches!(err, StoreError::Connection(_)));
    }

    #[test]
    fn test_type_error_maps_to_protocol() {
        let err: StoreError =
            redis::RedisError::from((redis::ErrorKind::TypeError, "unexpected reply")).into();
        assert!(matches!(err, StoreError::Protocol(_)));
    }

    #[test]
    fn test_connect_refused_is_connection_error() {
        // Port 1 on loopback is never a redis server.
        let config = RedisConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            timeout: Duration::from_millis(200),
            ..Default::default()
        };
        match RedisStore::connect(&config) {
            Err(StoreError::Connection(_)) => {}
            Err(other) => panic!("expected connection error, got {}", other),
            Ok(_) => panic!("expected connection error"),
        }
    }
}
