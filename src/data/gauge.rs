use super::{Collector, MetricValue, Props, Value, ValueKind};
use crate::helper::parse_bool;
use log::warn;
use std::{
    sync::atomic::{AtomicI64, AtomicU64, Ordering},
    time::SystemTime,
};

fn reset_from_props(props: &Props, current: bool) -> bool {
    match props.get("reset") {
        None => current,
        Some(raw) => parse_bool(raw).unwrap_or_else(|| {
            warn!("ignoring unparseable gauge reset property '{}'", raw);
            current
        }),
    }
}

/// Last-write-wins long value, reported as `gauge`.
pub struct LongGauge {
    value: AtomicI64,
    reset: bool,
}

impl LongGauge {
    pub fn new() -> LongGauge { LongGauge::with_reset(false) }

    pub fn with_reset(reset: bool) -> LongGauge {
        LongGauge {
            value: AtomicI64::new(0),
            reset,
        }
    }
}

impl Default for LongGauge {
    fn default() -> LongGauge { LongGauge::new() }
}

impl Collector for LongGauge {
    fn accepts(&self, kind: ValueKind) -> bool { kind == ValueKind::Long }

    fn put(&self, value: Value) {
        if let Value::Long(v) = value {
            self.value.store(v, Ordering::Release);
        }
    }

    fn report(&self, now: SystemTime) -> Vec<MetricValue> {
        let value = if self.reset {
            self.value.swap(0, Ordering::AcqRel)
        } else {
            self.value.load(Ordering::Acquire)
        };

        vec![MetricValue::new("gauge", Value::Long(value), now)]
    }

    fn fresh(&self) -> Box<dyn Collector> { Box::new(LongGauge::with_reset(self.reset)) }

    fn init(&mut self, props: &Props) { self.reset = reset_from_props(props, self.reset); }
}

/// Last-write-wins double value, reported as `gauge`.
///
/// The value is kept as raw bits so reads and writes stay lock-free.
pub struct DoubleGauge {
    bits: AtomicU64,
    reset: bool,
}

impl DoubleGauge {
    pub fn new() -> DoubleGauge { DoubleGauge::with_reset(false) }

    pub fn with_reset(reset: bool) -> DoubleGauge {
        DoubleGauge {
            bits: AtomicU64::new(0f64.to_bits()),
            reset,
        }
    }
}

impl Default for DoubleGauge {
    fn default() -> DoubleGauge { DoubleGauge::new() }
}

impl Collector for DoubleGauge {
    fn accepts(&self, kind: ValueKind) -> bool { kind == ValueKind::Double }

    fn put(&self, value: Value) {
        if let Value::Double(v) = value {
            self.bits.store(v.to_bits(), Ordering::Release);
        }
    }

    fn report(&self, now: SystemTime) -> Vec<MetricValue> {
        let bits = if self.reset {
            self.bits.swap(0f64.to_bits(), Ordering::AcqRel)
        } else {
            self.bits.load(Ordering::Acquire)
        };

        vec![MetricValue::new("gauge", Value::Double(f64::from_bits(bits)), now)]
    }

    fn fresh(&self) -> Box<dyn Collector> { Box::new(DoubleGauge::with_reset(self.reset)) }

    fn init(&mut self, props: &Props) { self.reset = reset_from_props(props, self.reset); }
}
