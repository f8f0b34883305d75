//! Clock abstraction
//!
//! Latency and output timestamps read "now" through [`Clock`] so tests can
//! pin it.

use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock {
    /// Current Unix time in whole seconds
    fn now_unix_secs(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_secs(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs() as i64,
            // Clock set before 1970
            Err(before) => -(before.duration().as_secs() as i64),
        }
    }
}

/// Clock frozen at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_unix_secs(&self) -> i64 {
        self.0
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_unix_secs(&self) -> i64 {
        (**self).now_unix_secs()
    }
}
