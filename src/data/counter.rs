use super::{Collector, MetricValue, Value, ValueKind};
use std::{
    sync::atomic::{AtomicI64, Ordering},
    time::SystemTime,
};

/// Accumulates long deltas and reports the running total as `count`.
///
/// By default the total is swapped back to zero on every report.
pub struct Counter {
    count: AtomicI64,
    reset: bool,
}

impl Counter {
    pub fn new() -> Counter { Counter::with_reset(true) }

    pub fn with_reset(reset: bool) -> Counter {
        Counter {
            count: AtomicI64::new(0),
            reset,
        }
    }
}

impl Default for Counter {
    fn default() -> Counter { Counter::new() }
}

impl Collector for Counter {
    fn accepts(&self, kind: ValueKind) -> bool { kind == ValueKind::Long }

    fn put(&self, value: Value) {
        if let Value::Long(delta) = value {
            self.count.fetch_add(delta, Ordering::AcqRel);
        }
    }

    fn report(&self, now: SystemTime) -> Vec<MetricValue> {
        let count = if self.reset {
            self.count.swap(0, Ordering::AcqRel)
        } else {
            self.count.load(Ordering::Acquire)
        };

        vec![MetricValue::new("count", Value::Long(count), now)]
    }

    fn fresh(&self) -> Box<dyn Collector> { Box::new(Counter::with_reset(self.reset)) }
}
