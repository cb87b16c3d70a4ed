use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

mod mock;
pub use self::mock::Mock;

/// A source of wall-clock time for stamping reported values.
pub trait ClockSource: Send + Sync {
    fn now(&self) -> SystemTime;
}

impl<T: ClockSource> ClockSource for Arc<T> {
    fn now(&self) -> SystemTime { (**self).now() }
}

/// The operating system's wall clock.
#[derive(Clone, Copy, Default)]
pub struct System;

impl ClockSource for System {
    fn now(&self) -> SystemTime { SystemTime::now() }
}

/// Cloneable handle to the clock used when reporting.
#[derive(Clone)]
pub struct Clock {
    source: Arc<dyn ClockSource>,
}

impl Clock {
    /// A clock backed by the system time.
    pub fn new() -> Clock { Clock::from_source(System) }

    pub fn from_source<S: ClockSource + 'static>(source: S) -> Clock {
        Clock {
            source: Arc::new(source),
        }
    }

    /// A clock that only moves when told to, and the handle that moves it.
    pub fn mock() -> (Clock, Arc<Mock>) {
        let mock = Arc::new(Mock::new(0));
        (Clock::from_source(mock.clone()), mock)
    }

    pub fn now(&self) -> SystemTime { self.source.now() }

    /// Milliseconds since the unix epoch.  Times before the epoch read as zero.
    pub fn millis(time: SystemTime) -> u64 {
        time.duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

impl Default for Clock {
    fn default() -> Clock { Clock::new() }
}

#[cfg(test)]
mod tests {
    use super::Clock;
    use std::time::Duration;

    #[test]
    fn test_mock_clock_moves_only_on_increment() {
        let (clock, mock) = Clock::mock();
        assert_eq!(Clock::millis(clock.now()), 0);

        mock.increment(Duration::from_millis(1500));
        assert_eq!(Clock::millis(clock.now()), 1500);

        let cloned = clock.clone();
        mock.increment(Duration::from_millis(500));
        assert_eq!(Clock::millis(cloned.now()), 2000);
    }
}
