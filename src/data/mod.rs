use std::{
    collections::BTreeMap,
    fmt,
    time::{Duration, SystemTime},
};

pub mod counter;
pub mod gauge;
pub mod histogram;
pub mod lambda;
pub mod noop;
pub mod snapshot;
pub mod stats;
pub mod string;

pub use self::{
    counter::Counter,
    gauge::{DoubleGauge, LongGauge},
    histogram::TimingHistogram,
    lambda::FnGauge,
    noop::Noop,
    snapshot::{FormattedMetric, FormattedSample, ReportedMetric},
    stats::{DurationStats, SimpleStats},
    string::StringBuffer,
};

/// Resolved properties handed to a collector when it is created.
pub type Props = BTreeMap<String, String>;

/// A single observation, or a single reported datum.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Long(i64),
    Double(f64),
    Duration(Duration),
    Str(String),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Long(_) => ValueKind::Long,
            Value::Double(_) => ValueKind::Double,
            Value::Duration(_) => ValueKind::Duration,
            Value::Str(_) => ValueKind::String,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Long(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Duration(d) => write!(f, "{}", d.as_millis()),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Value::Long(v) }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::Double(v) }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self { Value::Duration(v) }
}

impl From<String> for Value {
    fn from(v: String) -> Self { Value::Str(v) }
}

impl<'a> From<&'a str> for Value {
    fn from(v: &'a str) -> Self { Value::Str(v.to_owned()) }
}

/// The shape of a value, used to match call sites against collector capabilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Long,
    Double,
    Duration,
    String,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ValueKind::Long => "long",
            ValueKind::Double => "double",
            ValueKind::Duration => "duration",
            ValueKind::String => "string",
        };
        write!(f, "{}", name)
    }
}

/// One reported datum: a named field of a collector's report.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricValue {
    field: String,
    value: Value,
    timestamp: SystemTime,
}

impl MetricValue {
    pub fn new<F: Into<String>>(field: F, value: Value, timestamp: SystemTime) -> MetricValue {
        MetricValue {
            field: field.into(),
            value,
            timestamp,
        }
    }

    pub fn field(&self) -> &str { &self.field }

    pub fn value(&self) -> &Value { &self.value }

    pub fn timestamp(&self) -> SystemTime { self.timestamp }
}

/// A stateful accumulator for one `(path, tags)` identity.
///
/// Collectors are shared between every writer of their identity and the scheduler, so all
/// operations take `&self` and must be safe to call concurrently.  `put` never fails: values of
/// a shape the collector does not `accept` are dropped, and the registry refuses to hand out a
/// collector to a call site whose value shape it cannot accept.
pub trait Collector: Send + Sync {
    /// Whether this collector can record values of the given shape.
    fn accepts(&self, kind: ValueKind) -> bool;

    /// Records one observation.
    fn put(&self, value: Value);

    /// Records one observation that happened at `time`.
    ///
    /// Only collectors that report individual observations keep the timestamp.
    fn put_at(&self, time: SystemTime, value: Value) {
        let _ = time;
        self.put(value)
    }

    /// Takes a snapshot of the accumulated state, stamped with `now`.
    ///
    /// Resetting collectors atomically capture and clear their state, so every `put` lands in
    /// exactly one report.
    fn report(&self, now: SystemTime) -> Vec<MetricValue>;

    /// A new instance with the same configuration and no accumulated state.
    fn fresh(&self) -> Box<dyn Collector>;

    /// Applies the resolved properties of the path the collector was created for.
    fn init(&mut self, props: &Props) { let _ = props; }
}

/// A labeled percentile.
///
/// This represents a floating-point value from 0 to 100, with a string label to be used for
/// displaying the given percentile.
#[derive(Clone, Debug)]
pub struct Percentile {
    label: String,
    value: f64,
}

impl Percentile {
    pub fn label(&self) -> &str { self.label.as_str() }

    pub fn percentile(&self) -> f64 { self.value }
}

impl From<f64> for Percentile {
    fn from(p: f64) -> Self {
        // Force our value between +0.0 and +100.0.
        let clamped = p.max(0.0);
        let clamped = clamped.min(100.0);

        let raw_label = format!("{}", clamped);
        let label = match raw_label.as_str() {
            "0" => "min".to_string(),
            "100" => "max".to_string(),
            _ => {
                let raw = format!("p{}", clamped);
                raw.replace(".", "")
            },
        };

        Percentile { label, value: clamped }
    }
}

pub fn default_percentiles() -> Vec<Percentile> {
    vec![
        Percentile::from(0.0),
        Percentile::from(50.0),
        Percentile::from(90.0),
        Percentile::from(99.0),
        Percentile::from(100.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::{Percentile, Value, ValueKind};
    use std::time::Duration;

    #[test]
    fn test_percentiles() {
        let min_p = Percentile::from(0.0);
        assert_eq!(min_p.label(), "min");

        let max_p = Percentile::from(100.0);
        assert_eq!(max_p.label(), "max");

        let clamped_min_p = Percentile::from(-20.0);
        assert_eq!(clamped_min_p.label(), "min");
        assert_eq!(clamped_min_p.percentile(), 0.0);

        let clamped_max_p = Percentile::from(1442.0);
        assert_eq!(clamped_max_p.label(), "max");
        assert_eq!(clamped_max_p.percentile(), 100.0);

        let p99_p = Percentile::from(99.0);
        assert_eq!(p99_p.label(), "p99");

        let p999_p = Percentile::from(99.9);
        assert_eq!(p999_p.label(), "p999");
    }

    #[test]
    fn test_value_kinds() {
        assert_eq!(Value::from(3i64).kind(), ValueKind::Long);
        assert_eq!(Value::from(0.5).kind(), ValueKind::Double);
        assert_eq!(Value::from(Duration::from_millis(3)).kind(), ValueKind::Duration);
        assert_eq!(Value::from("up").kind(), ValueKind::String);
        assert_eq!(Value::from(Duration::from_millis(3)).to_string(), "3");
    }
}
