use crate::{clock::Clock, data::FormattedMetric, error::SinkError};
use log::{info, Level};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// A destination for formatted metrics.
///
/// Sinks are called from the scheduler thread and from shutdown, possibly concurrently, so they
/// take `&self`.  A failing sink only affects the metric being delivered: the error is logged and
/// reporting carries on with everything else.
pub trait Sink: Send + Sync {
    fn accept(&self, metric: &FormattedMetric) -> Result<(), SinkError>;

    /// Releases any resource the sink holds.  Called once at shutdown.
    fn close(&self) -> Result<(), SinkError> { Ok(()) }
}

/// Keeps every accepted metric in memory.
///
/// Handy for tests and for pulling metrics programmatically.
#[derive(Default)]
pub struct MemorySink {
    metrics: Mutex<Vec<FormattedMetric>>,
    closed: AtomicBool,
}

impl MemorySink {
    pub fn new() -> MemorySink { MemorySink::default() }

    /// Everything accepted so far.
    pub fn metrics(&self) -> Vec<FormattedMetric> { self.metrics.lock().clone() }

    /// Takes everything accepted so far, leaving the sink empty.
    pub fn drain(&self) -> Vec<FormattedMetric> { std::mem::take(&mut *self.metrics.lock()) }

    pub fn is_closed(&self) -> bool { self.closed.load(Ordering::Acquire) }
}

impl Sink for MemorySink {
    fn accept(&self, metric: &FormattedMetric) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        self.metrics.lock().push(metric.clone());
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Writes one log line per sample through the `log` facade.
pub struct LogSink {
    level: Level,
}

impl LogSink {
    pub fn new(level: Level) -> LogSink { LogSink { level } }
}

impl Default for LogSink {
    fn default() -> LogSink { LogSink::new(Level::Info) }
}

impl Sink for LogSink {
    fn accept(&self, metric: &FormattedMetric) -> Result<(), SinkError> {
        let tags = metric
            .tags
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");

        for sample in &metric.samples {
            log::log!(
                self.level,
                "{} [{}] {} {}",
                sample.name,
                tags,
                sample.value,
                Clock::millis(sample.timestamp)
            );
        }
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        info!("log sink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{LogSink, MemorySink, Sink};
    use crate::{
        data::{FormattedMetric, FormattedSample, Value},
        error::SinkError,
    };
    use std::{collections::BTreeMap, time::UNIX_EPOCH};

    fn metric() -> FormattedMetric {
        FormattedMetric {
            tags: BTreeMap::new(),
            samples: vec![FormattedSample {
                name: "jobs.count".to_owned(),
                value: Value::Long(2),
                timestamp: UNIX_EPOCH,
            }],
        }
    }

    #[test]
    fn test_memory_sink_collects_until_closed() {
        let sink = MemorySink::new();
        sink.accept(&metric()).unwrap();
        assert_eq!(sink.metrics().len(), 1);
        assert_eq!(sink.drain().len(), 1);
        assert!(sink.metrics().is_empty());

        sink.close().unwrap();
        assert!(sink.is_closed());
        match sink.accept(&metric()) {
            Err(SinkError::Closed) => {},
            other => panic!("expected closed error! actual: {:?}", other),
        }
    }

    #[test]
    fn test_log_sink_accepts() {
        let sink = LogSink::default();
        assert!(sink.accept(&metric()).is_ok());
        assert!(sink.close().is_ok());
    }
}
