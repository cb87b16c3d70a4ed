use super::{Collector, MetricValue, Value, ValueKind};
use std::{sync::Arc, time::SystemTime};

type Producer = Arc<dyn Fn() -> Value + Send + Sync>;

/// A gauge whose value is produced by a function at report time.
///
/// Used for ad-hoc exported metrics; it accepts no puts.
#[derive(Clone)]
pub struct FnGauge {
    producer: Producer,
}

impl FnGauge {
    pub fn new<F>(producer: F) -> FnGauge
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        FnGauge {
            producer: Arc::new(producer),
        }
    }

    pub fn long<F>(f: F) -> FnGauge
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        FnGauge::new(move || Value::Long(f()))
    }

    pub fn double<F>(f: F) -> FnGauge
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        FnGauge::new(move || Value::Double(f()))
    }
}

impl Collector for FnGauge {
    fn accepts(&self, _kind: ValueKind) -> bool { false }

    fn put(&self, _value: Value) {}

    fn report(&self, now: SystemTime) -> Vec<MetricValue> { vec![MetricValue::new("gauge", (self.producer)(), now)] }

    fn fresh(&self) -> Box<dyn Collector> { Box::new(self.clone()) }
}
