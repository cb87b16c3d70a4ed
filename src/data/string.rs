use super::{Collector, MetricValue, Value, ValueKind};
use parking_lot::Mutex;
use std::{mem, time::SystemTime};

/// Buffers string observations with the time each was made.
///
/// Every buffered observation is reported as its own `value`, carrying its original timestamp,
/// and the buffer is swapped out for an empty one.
#[derive(Default)]
pub struct StringBuffer {
    entries: Mutex<Vec<(SystemTime, String)>>,
}

impl StringBuffer {
    pub fn new() -> StringBuffer { StringBuffer::default() }
}

impl Collector for StringBuffer {
    fn accepts(&self, kind: ValueKind) -> bool { kind == ValueKind::String }

    fn put(&self, value: Value) { self.put_at(SystemTime::now(), value) }

    fn put_at(&self, time: SystemTime, value: Value) {
        if let Value::Str(s) = value {
            self.entries.lock().push((time, s));
        }
    }

    fn report(&self, _now: SystemTime) -> Vec<MetricValue> {
        let entries = mem::take(&mut *self.entries.lock());
        entries
            .into_iter()
            .map(|(time, s)| MetricValue::new("value", Value::Str(s), time))
            .collect()
    }

    fn fresh(&self) -> Box<dyn Collector> { Box::new(StringBuffer::new()) }
}

#[cfg(test)]
mod tests {
    use super::StringBuffer;
    use crate::data::{Collector, Value};
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_string_buffer_keeps_timestamps() {
        let buffer = StringBuffer::new();
        let t1 = UNIX_EPOCH + Duration::from_secs(10);
        let t2 = UNIX_EPOCH + Duration::from_secs(20);
        buffer.put_at(t1, Value::Str("started".to_owned()));
        buffer.put_at(t2, Value::Str("stopped".to_owned()));

        let report = buffer.report(UNIX_EPOCH + Duration::from_secs(30));
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].value(), &Value::Str("started".to_owned()));
        assert_eq!(report[0].timestamp(), t1);
        assert_eq!(report[1].field(), "value");
        assert_eq!(report[1].timestamp(), t2);

        assert!(buffer.report(UNIX_EPOCH).is_empty());
    }

    #[test]
    fn test_string_buffer_ignores_other_shapes() {
        let buffer = StringBuffer::new();
        buffer.put(Value::Long(3));
        buffer.put(Value::from("ok"));
        assert_eq!(buffer.report(UNIX_EPOCH).len(), 1);
    }
}
