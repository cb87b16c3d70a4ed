use super::{Collector, MetricValue, Value, ValueKind};
use parking_lot::Mutex;
use std::{
    mem,
    time::{Duration, SystemTime},
};

/// count/min/max/sum over one reporting window.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Window {
    count: u64,
    min: i64,
    max: i64,
    sum: i64,
}

impl Window {
    fn record(&mut self, value: i64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.sum = self.sum.saturating_add(value);
        self.count += 1;
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

/// Running statistics over long values.
///
/// Reports `min`, `max`, `sum`, `count` and `avg`, then starts a new window.
#[derive(Default)]
pub struct SimpleStats {
    window: Mutex<Window>,
}

impl SimpleStats {
    pub fn new() -> SimpleStats { SimpleStats::default() }
}

impl Collector for SimpleStats {
    fn accepts(&self, kind: ValueKind) -> bool { kind == ValueKind::Long }

    fn put(&self, value: Value) {
        if let Value::Long(v) = value {
            self.window.lock().record(v);
        }
    }

    fn report(&self, now: SystemTime) -> Vec<MetricValue> {
        let window = mem::take(&mut *self.window.lock());

        vec![
            MetricValue::new("min", Value::Long(window.min), now),
            MetricValue::new("max", Value::Long(window.max), now),
            MetricValue::new("sum", Value::Long(window.sum), now),
            MetricValue::new("count", Value::Long(window.count as i64), now),
            MetricValue::new("avg", Value::Double(window.avg()), now),
        ]
    }

    fn fresh(&self) -> Box<dyn Collector> { Box::new(SimpleStats::new()) }
}

/// Running statistics over durations.
///
/// Reports `min`, `max`, `total` and `avg` as durations plus `count`, then starts a new window.
#[derive(Default)]
pub struct DurationStats {
    window: Mutex<Window>,
}

impl DurationStats {
    pub fn new() -> DurationStats { DurationStats::default() }
}

fn nanos(d: Duration) -> i64 {
    let n = d.as_nanos();
    if n > i64::max_value() as u128 {
        i64::max_value()
    } else {
        n as i64
    }
}

fn duration(nanos: i64) -> Duration { Duration::from_nanos(nanos.max(0) as u64) }

impl Collector for DurationStats {
    fn accepts(&self, kind: ValueKind) -> bool { kind == ValueKind::Duration }

    fn put(&self, value: Value) {
        if let Value::Duration(d) = value {
            self.window.lock().record(nanos(d));
        }
    }

    fn report(&self, now: SystemTime) -> Vec<MetricValue> {
        let window = mem::take(&mut *self.window.lock());

        vec![
            MetricValue::new("min", Value::Duration(duration(window.min)), now),
            MetricValue::new("max", Value::Duration(duration(window.max)), now),
            MetricValue::new("total", Value::Duration(duration(window.sum)), now),
            MetricValue::new("count", Value::Long(window.count as i64), now),
            MetricValue::new("avg", Value::Duration(duration(window.avg() as i64)), now),
        ]
    }

    fn fresh(&self) -> Box<dyn Collector> { Box::new(DurationStats::new()) }
}
