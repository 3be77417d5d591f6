//! Time source shared by the factory and all of its markets.
//!
//! Cutoff and expiration checks read "now" from one [`Clock`] so the two can
//! never disagree.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}
#[derive(Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
/// Manually driven clock. Only ever moves forward.
#[derive(Debug)]
pub struct TestClock {
    current: Mutex<DateTime<Utc>>,
}
impl TestClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }
    pub fn advance(&self, by: Duration) {
        if by < Duration::zero() {
            log::error!("TestClock can't go backwards by {}", by);
            return;
        }
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = *current + by;
    }
}
impl Default for TestClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}
impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
