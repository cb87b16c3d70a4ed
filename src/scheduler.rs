use crate::{
    clock::Clock,
    container::{CollectorContainer, Route},
    data::ReportedMetric,
    control::{ControlMessage, Controller},
    error::ControlError,
    registry::CollectorRegistry,
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

/// When the collectors bound to a trigger are reported.
#[derive(Clone, Debug, PartialEq)]
pub enum Trigger {
    /// Fires every `period`, starting one period after the context starts.
    Interval(Duration),
    /// Fires only when asked to through a `Controller`.
    OnDemand,
}

/// Drains collectors and routes their reports through formatters into sinks.
pub struct Reporter {
    registry: Arc<CollectorRegistry>,
    clock: Clock,
}

impl Reporter {
    pub fn new(registry: Arc<CollectorRegistry>, clock: Clock) -> Reporter { Reporter { registry, clock } }

    /// Reports every container `trigger` is bound to.
    ///
    /// Returns the number of metrics delivered to at least one sink.
    pub fn report_trigger(&self, trigger: &str) -> usize {
        let containers = self.registry.containers_for_trigger(trigger);
        let delivered: usize = containers
            .iter()
            .map(|container| self.report_container(container, trigger))
            .sum();
        debug!("trigger '{}' reported {} metrics from {} containers", trigger, delivered, containers.len());
        delivered
    }

    /// Reports a single container on behalf of `trigger`.
    pub fn report_container(&self, container: &CollectorContainer, trigger: &str) -> usize {
        let reports = container.report(trigger, self.clock.now());
        self.deliver(container, reports)
    }

    /// Sink failures are logged and do not stop delivery to the remaining sinks or metrics.
    fn deliver(&self, container: &CollectorContainer, reports: Vec<(ReportedMetric, Route)>) -> usize {
        let mut delivered = 0;

        for (metric, route) in reports {
            let mut accepted = false;
            for binding in container.routed(&route) {
                let formatted = binding.formatter.format(&metric);
                match binding.sink.accept(&formatted) {
                    Ok(()) => accepted = true,
                    Err(e) => error!("sink '{}' failed to accept metric at '{}': {}", binding.name, metric.path(), e),
                }
            }
            if accepted {
                delivered += 1;
            }
        }

        delivered
    }

    /// Reports every collector of every container one last time.
    ///
    /// Each value reaches a given sink at most once: per-trigger clones follow their trigger's
    /// route and shared collectors are reported once.
    pub fn drain(&self) -> usize {
        let now = self.clock.now();
        let delivered: usize = self
            .registry
            .containers()
            .iter()
            .map(|container| self.deliver(container, container.drain(now)))
            .sum();
        debug!("drained {} metrics", delivered);
        delivered
    }
}

struct Deadline {
    trigger: String,
    period: Duration,
    next: Instant,
}

/// The reporting thread.
///
/// Interval triggers fire on their own schedule; on-demand requests arrive on the control
/// channel and are served between ticks, so reports never overlap.
pub(crate) struct Scheduler {
    reporter: Arc<Reporter>,
    control_rx: Receiver<ControlMessage>,
    deadlines: Vec<Deadline>,
}

impl Scheduler {
    pub(crate) fn new(reporter: Arc<Reporter>) -> (Scheduler, Controller) {
        let (control_tx, control_rx): (Sender<ControlMessage>, _) = bounded(1024);

        let start = Instant::now();
        let deadlines = reporter
            .registry
            .config()
            .triggers()
            .filter_map(|(name, trigger)| match trigger {
                Trigger::Interval(period) => Some(Deadline {
                    trigger: name.clone(),
                    period: *period,
                    next: start + *period,
                }),
                Trigger::OnDemand => None,
            })
            .collect();

        let scheduler = Scheduler {
            reporter,
            control_rx,
            deadlines,
        };
        (scheduler, Controller::new(control_tx))
    }

    fn fire(&self, trigger: &str) -> Result<usize, ControlError> {
        if self.reporter.registry.config().trigger(trigger).is_none() {
            return Err(ControlError::UnknownTrigger(trigger.to_owned()));
        }
        Ok(self.reporter.report_trigger(trigger))
    }

    fn process_control_msg(&self, msg: ControlMessage) -> bool {
        match msg {
            ControlMessage::Fire(trigger, reply) => {
                let result = self.fire(&trigger);
                let _ = reply.send(result);
                true
            },
            ControlMessage::Shutdown => false,
        }
    }

    /// Runs the scheduler until it is told to shut down or every controller is gone.
    pub(crate) fn run(mut self) {
        debug!("scheduler started with {} interval triggers", self.deadlines.len());
        loop {
            let next = self.deadlines.iter().map(|d| d.next).min();
            let msg = match next {
                Some(deadline) => self.control_rx.recv_deadline(deadline),
                None => self.control_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match msg {
                Ok(msg) => {
                    if !self.process_control_msg(msg) {
                        break;
                    }
                },
                Err(RecvTimeoutError::Timeout) => {},
                Err(RecvTimeoutError::Disconnected) => break,
            }

            let now = Instant::now();
            for deadline in self.deadlines.iter_mut() {
                if deadline.next <= now {
                    self.reporter.report_trigger(&deadline.trigger);
                    deadline.next += deadline.period;
                    // Skip ticks missed while reporting ran long.
                    if deadline.next <= now {
                        deadline.next = now + deadline.period;
                    }
                }
            }
        }
        debug!("scheduler stopped");
    }
}
