//! Store Access Abstraction
//!
//! The collector only ever talks to Redis through the [`Store`] trait, so the
//! same aggregation code runs against a live server (production) or an
//! in-memory keyspace with injected faults (simulation).
//!
//! Absence is not an error: commands that can miss return `Option` or the
//! Redis-native zero, and [`StoreError`] is reserved for transport and
//! protocol failures.

pub mod production;
pub mod simulation;

pub use production::{RedisConfig, RedisStore};
pub use simulation::{InMemoryStore, IssuedCommand};

/// Failure talking to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Server unreachable, connection dropped, or I/O timed out
    Connection(String),
    /// Server answered, but with an error or an unexpected reply
    Protocol(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Connection(msg) => write!(f, "redis connection error: {}", msg),
            StoreError::Protocol(msg) => write!(f, "redis protocol error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read-only subset of Redis used to build a snapshot
pub trait Store {
    /// GET; `None` when the key does not exist
    fn get(&mut self, key: &str) -> StoreResult<Option<String>>;

    /// ZCARD; 0 when the key does not exist
    fn zcard(&mut self, key: &str) -> StoreResult<u64>;

    /// SMEMBERS; empty when the key does not exist
    fn smembers(&mut self, key: &str) -> StoreResult<Vec<String>>;

    /// HGET; `None` when the key or the field does not exist
    fn hget(&mut self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// LLEN; 0 when the key does not exist
    fn llen(&mut self, key: &str) -> StoreResult<u64>;

    /// LRANGE with Redis index semantics (negative counts from the tail)
    fn lrange(&mut self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>>;
}

impl<S: Store + ?Sized> Store for &mut S {
    fn get(&mut self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key)
    }

    fn zcard(&mut self, key: &str) -> StoreResult<u64> {
        (**self).zcard(key)
    }

    fn smembers(&mut self, key: &str) -> StoreResult<Vec<String>> {
        (**self).smembers(key)
    }

    fn hget(&mut self, key: &str, field: &str) -> StoreResult<Option<String>> {
        (**self).hget(key, field)
    }

    fn llen(&mut self, key: &str) -> StoreResult<u64> {
        (**self).llen(key)
    }

    fn lrange(&mut self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        (**self).lrange(key, start, stop)
    }
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn get(&mut self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key)
    }

    fn zcard(&mut self, key: &str) -> StoreResult<u64> {
        (**self).zcard(key)
    }

    fn smembers(&mut self, key: &str) -> StoreResult<Vec<String>> {
        (**self).smembers(key)
    }

    fn hget(&mut self, key: &str, field: &str) -> StoreResult<Option<String>> {
        (**self).hget(key, field)
    }

    fn llen(&mut self, key: &str) -> StoreResult<u64> {
        (**self).llen(key)
    }

    fn lrange(&mut self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        (**self).lrange(key, start, stop)
    }
}
