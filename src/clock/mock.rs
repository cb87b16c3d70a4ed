use crate::clock::ClockSource;
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// A manually advanced clock, measured in milliseconds past the unix epoch.
pub struct Mock {
    offset: AtomicU64,
}

impl Mock {
    pub fn new(offset_ms: u64) -> Self {
        Self {
            offset: AtomicU64::new(offset_ms),
        }
    }

    pub fn increment(&self, amount: Duration) { self.offset.fetch_add(amount.as_millis() as u64, Ordering::Release); }
}

impl ClockSource for Mock {
    fn now(&self) -> SystemTime { UNIX_EPOCH + Duration::from_millis(self.offset.load(Ordering::Acquire)) }
}
