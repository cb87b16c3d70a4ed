use super::{default_percentiles, Collector, MetricValue, Percentile, Props, Value, ValueKind};
use hdrhistogram::{CreationError, Histogram as HdrHistogram};
use log::warn;
use parking_lot::Mutex;
use std::{mem, time::SystemTime};

/// Distribution of long values or durations (recorded in nanoseconds).
///
/// Reports `count` plus one field per configured percentile, labeled the way `Percentile` labels
/// them (`min`, `p50`, `p99`, `max`, ...), then starts over with an empty histogram.
pub struct TimingHistogram {
    histogram: Mutex<HdrHistogram<u64>>,
    percentiles: Vec<Percentile>,
}

impl TimingHistogram {
    pub fn new() -> Result<TimingHistogram, CreationError> {
        let histogram = HdrHistogram::new_with_bounds(1, u64::max_value(), 3)?;
        Ok(TimingHistogram {
            histogram: Mutex::new(histogram),
            percentiles: default_percentiles(),
        })
    }

    /// Replaces the reported percentiles.
    pub fn with_percentiles(mut self, percentiles: Vec<Percentile>) -> Self {
        self.percentiles = percentiles;
        self
    }
}

pub(crate) fn parse_percentiles(raw: &str) -> Option<Vec<Percentile>> {
    raw.split(',')
        .map(|p| p.trim().parse::<f64>().ok().map(Percentile::from))
        .collect()
}

impl Collector for TimingHistogram {
    fn accepts(&self, kind: ValueKind) -> bool { kind == ValueKind::Long || kind == ValueKind::Duration }

    fn put(&self, value: Value) {
        let recorded = match value {
            Value::Long(v) => v.max(0) as u64,
            Value::Duration(d) => {
                let n = d.as_nanos();
                if n > u64::max_value() as u128 {
                    u64::max_value()
                } else {
                    n as u64
                }
            },
            _ => return,
        };

        self.histogram.lock().saturating_record(recorded);
    }

    fn report(&self, now: SystemTime) -> Vec<MetricValue> {
        let histogram = {
            let mut current = self.histogram.lock();
            let empty = HdrHistogram::new_from(&*current);
            mem::replace(&mut *current, empty)
        };

        let mut values = Vec::with_capacity(self.percentiles.len() + 1);
        values.push(MetricValue::new("count", Value::Long(histogram.len() as i64), now));
        for percentile in &self.percentiles {
            let value = histogram.value_at_percentile(percentile.percentile());
            values.push(MetricValue::new(percentile.label(), Value::Long(value as i64), now));
        }
        values
    }

    fn fresh(&self) -> Box<dyn Collector> {
        let empty = HdrHistogram::new_from(&*self.histogram.lock());
        Box::new(TimingHistogram {
            histogram: Mutex::new(empty),
            percentiles: self.percentiles.clone(),
        })
    }

    fn init(&mut self, props: &Props) {
        if let Some(raw) = props.get("percentiles") {
            match parse_percentiles(raw) {
                Some(percentiles) => self.percentiles = percentiles,
                None => warn!("ignoring unparseable percentiles property '{}'", raw),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TimingHistogram;
    use crate::data::{Collector, Percentile, Props, Value};
    use std::{
        collections::HashMap,
        time::{Duration, UNIX_EPOCH},
    };

    fn fields(collector: &dyn Collector) -> HashMap<String, Value> {
        collector
            .report(UNIX_EPOCH)
            .into_iter()
            .map(|mv| (mv.field().to_owned(), mv.value().clone()))
            .collect()
    }

    #[test]
    fn test_histogram_simple_update() {
        let histogram = TimingHistogram::new().unwrap();
        histogram.put(Value::Duration(Duration::from_nanos(1245)));

        let report = fields(&histogram);
        assert_eq!(report["count"], Value::Long(1));
        match report["max"] {
            Value::Long(v) => assert!(v >= 1245 && v <= 1246),
            ref other => panic!("expected long value! actual: {:?}", other),
        }
        assert!(report.contains_key("p50"));
        assert!(report.contains_key("p99"));
        assert!(!report.contains_key("p63"));
    }

    #[test]
    fn test_histogram_resets_after_report() {
        let histogram = TimingHistogram::new().unwrap();
        for v in &[500_000i64, 750_000, 1_000_000, 1_250_000] {
            histogram.put(Value::Long(*v));
        }
        histogram.put(Value::Str("ignored".to_owned()));

        assert_eq!(fields(&histogram)["count"], Value::Long(4));
        assert_eq!(fields(&histogram)["count"], Value::Long(0));
        assert_eq!(fields(&histogram)["max"], Value::Long(0));
    }

    #[test]
    fn test_histogram_percentiles_property() {
        let mut props = Props::new();
        props.insert("percentiles".to_owned(), "50, 99.9".to_owned());

        let mut histogram = TimingHistogram::new().unwrap();
        histogram.init(&props);
        histogram.put(Value::Long(10));

        let report = fields(&histogram);
        assert_eq!(report.len(), 3);
        assert!(report.contains_key("p50"));
        assert!(report.contains_key("p999"));

        let fresh = histogram.fresh();
        assert_eq!(fields(&*fresh).len(), 3);

        let custom = TimingHistogram::new().unwrap().with_percentiles(vec![Percentile::from(100.0)]);
        assert_eq!(fields(&custom).len(), 2);
    }
}
