use crate::{
    data::{Collector, MetricValue, Noop, Props, ReportedMetric, Value, ValueKind},
    path::ConfigPath,
    tags::TagSet,
    tree::{ConfigTree, SinkBinding},
};
use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use std::{collections::BTreeMap, mem, sync::Arc, time::SystemTime};

/// Forwards every put to one collector per trigger.
struct Fanout {
    clones: Vec<Arc<dyn Collector>>,
}

impl Collector for Fanout {
    fn accepts(&self, kind: ValueKind) -> bool { self.clones.iter().all(|c| c.accepts(kind)) }

    fn put(&self, value: Value) {
        for clone in &self.clones {
            clone.put(value.clone());
        }
    }

    fn put_at(&self, time: SystemTime, value: Value) {
        for clone in &self.clones {
            clone.put_at(time, value.clone());
        }
    }

    fn report(&self, _now: SystemTime) -> Vec<MetricValue> { Vec::new() }

    fn fresh(&self) -> Box<dyn Collector> {
        Box::new(Fanout {
            clones: self.clones.iter().map(|c| Arc::from(c.fresh())).collect(),
        })
    }
}

/// A collector as handed out to callers, plus what each trigger reports from.
struct Entry {
    handle: Arc<dyn Collector>,
    per_trigger: Vec<(String, Arc<dyn Collector>)>,
}

impl Entry {
    fn shared(collector: Arc<dyn Collector>) -> Entry {
        Entry {
            handle: collector,
            per_trigger: Vec::new(),
        }
    }

    /// Nobody but the container can reach this entry's collector any more.
    fn orphaned(&self) -> bool { Arc::strong_count(&self.handle) == 1 }
}

/// An entry displaced by `bind`, reported until its last handle is dropped.
struct Retired {
    tags: TagSet,
    entry: Arc<Entry>,
    // Triggers still owed a final report from a per-trigger entry.
    owed: Vec<String>,
}

/// Which of a container's sinks a reported metric goes to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// Reported on a trigger tick.  Unqualified sinks only take it when `unqualified` is set.
    Tick { trigger: String, unqualified: bool },
    /// Reported by the shutdown drain from a collector every trigger shares.
    Drain,
}

/// Every collector living under one path, plus that path's resolved configuration.
///
/// Collectors are keyed by their `TagSet` and created from the path's template the first time
/// an identity is seen.  Configuration is resolved once, when the container is created.
///
/// With several triggers each identity gets one clone per trigger.  Sinks restricted to a
/// trigger read that trigger's clone; unrestricted sinks read the first trigger's clone only.
pub struct CollectorContainer {
    path: ConfigPath,
    metric_name: String,
    tags: BTreeMap<String, String>,
    props: Props,
    bindings: Vec<SinkBinding>,
    triggers: Vec<String>,
    template: Arc<dyn Collector>,
    collectors: RwLock<HashMap<TagSet, Arc<Entry>, FnvBuildHasher>>,
    retired: Mutex<Vec<Retired>>,
}

impl CollectorContainer {
    pub(crate) fn new(path: ConfigPath, config: &ConfigTree) -> CollectorContainer {
        let metric_name = config
            .metric_name_for(&path)
            .map(str::to_owned)
            .unwrap_or_else(|| path.to_string());
        let template = config
            .collector_template(&path)
            .unwrap_or_else(|| Arc::new(Noop) as Arc<dyn Collector>);

        CollectorContainer {
            metric_name,
            tags: config.tags_for(&path),
            props: config.props_for(&path),
            bindings: config.bindings_for(&path),
            triggers: config.triggers_for(&path).to_vec(),
            template,
            collectors: RwLock::new(HashMap::default()),
            retired: Mutex::new(Vec::new()),
            path,
        }
    }

    pub fn path(&self) -> &ConfigPath { &self.path }

    pub fn metric_name(&self) -> &str { &self.metric_name }

    /// Configured tags for this path.
    pub fn tags(&self) -> &BTreeMap<String, String> { &self.tags }

    pub fn props(&self) -> &Props { &self.props }

    pub fn bindings(&self) -> &[SinkBinding] { &self.bindings }

    pub fn triggers(&self) -> &[String] { &self.triggers }

    pub fn len(&self) -> usize { self.collectors.read().len() }

    pub fn is_empty(&self) -> bool { self.collectors.read().is_empty() }

    fn create(&self) -> Entry {
        let spawn = || -> Arc<dyn Collector> {
            let mut collector = self.template.fresh();
            collector.init(&self.props);
            Arc::from(collector)
        };

        if self.triggers.len() < 2 {
            return Entry::shared(spawn());
        }

        let per_trigger: Vec<(String, Arc<dyn Collector>)> =
            self.triggers.iter().map(|t| (t.clone(), spawn())).collect();
        let handle = Fanout {
            clones: per_trigger.iter().map(|(_, c)| c.clone()).collect(),
        };
        Entry {
            handle: Arc::new(handle),
            per_trigger,
        }
    }

    /// Gets or creates the collector for `tags`.
    ///
    /// Concurrent callers with equal tag sets always get the same instance.
    pub fn collector(&self, tags: &TagSet) -> Arc<dyn Collector> {
        if let Some(entry) = self.collectors.read().get(tags) {
            return entry.handle.clone();
        }

        let mut collectors = self.collectors.write();
        let entry = collectors
            .entry(tags.clone())
            .or_insert_with(|| Arc::new(self.create()));
        entry.handle.clone()
    }

    /// Binds `collector` to `tags`, replacing whatever was there.
    ///
    /// A bound collector is shared by every trigger of the path.  The replaced collector keeps
    /// being reported until nothing else holds it, so values already put into it still arrive.
    pub fn bind(&self, tags: TagSet, collector: Arc<dyn Collector>) {
        let replaced = self
            .collectors
            .write()
            .insert(tags.clone(), Arc::new(Entry::shared(collector)));
        if let Some(entry) = replaced {
            let owed = entry.per_trigger.iter().map(|(t, _)| t.clone()).collect();
            self.retired.lock().push(Retired { tags, entry, owed });
        }
    }

    /// The sinks a metric reported along `route` is delivered to.
    pub fn routed<'a>(&'a self, route: &'a Route) -> impl Iterator<Item = &'a SinkBinding> + 'a {
        self.bindings
            .iter()
            .filter(move |binding| match (route, binding.trigger.as_ref()) {
                (Route::Tick { unqualified, .. }, None) => *unqualified,
                (Route::Tick { trigger, .. }, Some(bound)) => bound == trigger,
                (Route::Drain, None) => true,
                (Route::Drain, Some(bound)) => self.triggers.is_empty() || self.triggers.contains(bound),
            })
    }

    fn tick(&self, trigger: &str) -> Route {
        Route::Tick {
            trigger: trigger.to_owned(),
            unqualified: self.triggers.first().map_or(true, |primary| primary == trigger),
        }
    }

    fn snapshot(&self) -> Vec<(TagSet, Arc<Entry>)> {
        self.collectors
            .read()
            .iter()
            .map(|(tags, entry)| (tags.clone(), entry.clone()))
            .collect()
    }

    fn reported(&self, tags: &TagSet, collector: &dyn Collector, now: SystemTime) -> Option<ReportedMetric> {
        let values = collector.report(now);
        if values.is_empty() {
            return None;
        }
        Some(ReportedMetric::new(
            self.path.clone(),
            self.metric_name.clone(),
            tags.merged_over(&self.tags),
            values,
        ))
    }

    fn report_entry(
        &self,
        tags: &TagSet,
        entry: &Entry,
        trigger: &str,
        now: SystemTime,
    ) -> Option<(ReportedMetric, Route)> {
        if entry.per_trigger.is_empty() {
            let route = Route::Tick {
                trigger: trigger.to_owned(),
                unqualified: true,
            };
            return self.reported(tags, entry.handle.as_ref(), now).map(|m| (m, route));
        }

        let (_, clone) = entry.per_trigger.iter().find(|(t, _)| t == trigger)?;
        self.reported(tags, clone.as_ref(), now).map(|m| (m, self.tick(trigger)))
    }

    /// Reports every collector on behalf of `trigger`, each with the route it takes to sinks.
    ///
    /// Shared collectors go to every sink serving `trigger`.  Collectors with nothing to report
    /// are skipped.
    pub fn report(&self, trigger: &str, now: SystemTime) -> Vec<(ReportedMetric, Route)> {
        let mut reports: Vec<(ReportedMetric, Route)> = self
            .snapshot()
            .into_iter()
            .filter_map(|(tags, entry)| self.report_entry(&tags, &entry, trigger, now))
            .collect();

        self.retired.lock().retain_mut(|retired| {
            let orphaned = retired.entry.orphaned();
            let owed = retired.owed.iter().any(|t| t == trigger);
            if retired.entry.per_trigger.is_empty() || owed || !orphaned {
                reports.extend(self.report_entry(&retired.tags, &retired.entry, trigger, now));
            }
            if !orphaned {
                return true;
            }
            retired.owed.retain(|t| t != trigger);
            !retired.entry.per_trigger.is_empty() && !retired.owed.is_empty()
        });

        reports
    }

    /// Reports every collector one last time, retired ones included.
    ///
    /// Per-trigger clones are each reported once along their trigger's route; shared collectors
    /// are reported once in total.
    pub fn drain(&self, now: SystemTime) -> Vec<(ReportedMetric, Route)> {
        let retired = mem::take(&mut *self.retired.lock())
            .into_iter()
            .map(|retired| (retired.tags, retired.entry));

        let mut reports = Vec::new();
        for (tags, entry) in self.snapshot().into_iter().chain(retired) {
            if entry.per_trigger.is_empty() {
                reports.extend(self.reported(&tags, entry.handle.as_ref(), now).map(|m| (m, Route::Drain)));
                continue;
            }
            for (trigger, clone) in &entry.per_trigger {
                reports.extend(self.reported(&tags, clone.as_ref(), now).map(|m| (m, self.tick(trigger))));
            }
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::{CollectorContainer, Route};
    use crate::{
        configuration::{Configuration, Document, SourceNode},
        data::{Collector, Counter, LongGauge, ReportedMetric, StringBuffer, Value},
        path::ConfigPath,
        scheduler::Trigger,
        sink::MemorySink,
        tags::TagSet,
        tree::ConfigTree,
    };
    use std::{sync::Arc, time::UNIX_EPOCH};

    fn tree(root: SourceNode) -> ConfigTree {
        Configuration::new()
            .with_sink("out", Arc::new(MemorySink::new()))
            .with_trigger("fast", Trigger::OnDemand)
            .with_trigger("slow", Trigger::OnDemand)
            .with_collector("counter", Counter::new())
            .with_collector("gauge", LongGauge::new())
            .document(Document::new().sources(root))
            .load()
            .unwrap()
    }

    fn first_values(reports: &[(ReportedMetric, Route)]) -> Vec<Value> {
        reports.iter().map(|(m, _)| m.values()[0].value().clone()).collect()
    }

    #[test]
    fn test_identity_tags_override_configured_tags() {
        let config = tree(
            SourceNode::root()
                .collector("counter")
                .source(SourceNode::new("svc").metric_name("service").tag("host", "a").tag("dc", "east")),
        );
        let container = CollectorContainer::new(ConfigPath::parse("svc").unwrap(), &config);
        assert_eq!(container.metric_name(), "service");

        let tags: TagSet = vec![("host", "b")].into_iter().collect();
        container.collector(&tags).put(Value::Long(2));

        let reported = container.drain(UNIX_EPOCH);
        assert_eq!(reported.len(), 1);
        let (metric, route) = &reported[0];
        assert_eq!(route, &Route::Drain);
        assert_eq!(metric.metric_name(), "service");
        assert_eq!(metric.tags().get("host").map(String::as_str), Some("b"));
        assert_eq!(metric.tags().get("dc").map(String::as_str), Some("east"));
    }

    #[test]
    fn test_same_identity_same_collector() {
        let config = tree(SourceNode::root().collector("counter"));
        let container = CollectorContainer::new(ConfigPath::parse("a.b").unwrap(), &config);
        assert_eq!(container.metric_name(), "a.b");

        let first = container.collector(&TagSet::builder().tag("k", "1").build());
        let again = container.collector(&TagSet::builder().tag("k", "1").build());
        let other = container.collector(&TagSet::builder().tag("k", "2").build());
        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(container.len(), 2);
    }

    #[test]
    fn test_per_trigger_clones() {
        let config = tree(SourceNode::root().collector("counter").trigger("fast").trigger("slow"));
        let container = CollectorContainer::new(ConfigPath::parse("a").unwrap(), &config);
        let counter = container.collector(&TagSet::empty());
        counter.put(Value::Long(5));

        let fast = container.report("fast", UNIX_EPOCH);
        assert_eq!(first_values(&fast), vec![Value::Long(5)]);
        assert_eq!(
            fast[0].1,
            Route::Tick {
                trigger: "fast".to_owned(),
                unqualified: true
            }
        );
        counter.put(Value::Long(1));

        // Only the first trigger feeds sinks that are not restricted to a trigger.
        let slow = container.report("slow", UNIX_EPOCH);
        assert_eq!(first_values(&slow), vec![Value::Long(6)]);
        assert_eq!(
            slow[0].1,
            Route::Tick {
                trigger: "slow".to_owned(),
                unqualified: false
            }
        );

        // A bound collector is shared by both triggers.
        let tags = TagSet::builder().tag("pool", "main").build();
        let gauge = Arc::new(LongGauge::new());
        container.bind(tags.clone(), gauge.clone());
        gauge.put(Value::Long(9));
        let fast = container.report("fast", UNIX_EPOCH);
        let bound: Vec<_> = fast.iter().filter(|(m, _)| m.tags().contains_key("pool")).collect();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].0.values()[0].value(), &Value::Long(9));
        assert_eq!(
            bound[0].1,
            Route::Tick {
                trigger: "fast".to_owned(),
                unqualified: true
            }
        );
    }

    #[test]
    fn test_drain_reports_shared_collectors_once() {
        let config = tree(SourceNode::root().collector("counter").trigger("fast").trigger("slow"));
        let container = CollectorContainer::new(ConfigPath::parse("a").unwrap(), &config);
        container.collector(&TagSet::empty()).put(Value::Long(2));

        let tags = TagSet::builder().tag("pool", "main").build();
        let counter = Arc::new(Counter::new());
        container.bind(tags, counter.clone());
        counter.put(Value::Long(3));

        let drained = container.drain(UNIX_EPOCH);
        assert_eq!(drained.len(), 3);
        let shared: Vec<_> = drained.iter().filter(|(_, route)| route == &Route::Drain).collect();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].0.values()[0].value(), &Value::Long(3));
        let unqualified = drained
            .iter()
            .filter(|(_, route)| match route {
                Route::Tick { unqualified, .. } => *unqualified,
                Route::Drain => false,
            })
            .count();
        assert_eq!(unqualified, 1);
    }

    #[test]
    fn test_rebind_keeps_earlier_puts() {
        let config = tree(SourceNode::root().collector("counter").trigger("fast"));
        let container = CollectorContainer::new(ConfigPath::parse("a").unwrap(), &config);
        let old = container.collector(&TagSet::empty());
        old.put(Value::Long(2));

        let replacement: Arc<dyn Collector> = Arc::new(Counter::new());
        container.bind(TagSet::empty(), replacement.clone());
        assert!(Arc::ptr_eq(&container.collector(&TagSet::empty()), &replacement));
        replacement.put(Value::Long(3));
        old.put(Value::Long(4));

        // Live collectors first, then the one the bind displaced.
        assert_eq!(first_values(&container.report("fast", UNIX_EPOCH)), vec![Value::Long(3), Value::Long(6)]);

        // Still held, so still reported; once dropped it gets one last report.
        old.put(Value::Long(1));
        drop(old);
        assert_eq!(first_values(&container.report("fast", UNIX_EPOCH)), vec![Value::Long(0), Value::Long(1)]);
        assert_eq!(container.report("fast", UNIX_EPOCH).len(), 1);
    }

    #[test]
    fn test_drain_includes_retired() {
        let config = tree(SourceNode::root().collector("counter").trigger("fast").trigger("slow"));
        let container = CollectorContainer::new(ConfigPath::parse("a").unwrap(), &config);
        container.collector(&TagSet::empty()).put(Value::Long(7));
        container.bind(TagSet::empty(), Arc::new(Counter::new()));

        let drained = container.drain(UNIX_EPOCH);
        assert_eq!(first_values(&drained), vec![Value::Long(0), Value::Long(7), Value::Long(7)]);
        assert_eq!(drained[0].1, Route::Drain);
        assert_eq!(container.drain(UNIX_EPOCH).len(), 1);
    }

    #[test]
    fn test_routes_select_sinks() {
        let config = Configuration::new()
            .with_sink("out", Arc::new(MemorySink::new()))
            .with_sink("fast_only", Arc::new(MemorySink::new()))
            .with_sink("other", Arc::new(MemorySink::new()))
            .with_trigger("fast", Trigger::OnDemand)
            .with_trigger("slow", Trigger::OnDemand)
            .with_trigger("hourly", Trigger::OnDemand)
            .document(Document::new().sources(
                SourceNode::root()
                    .sink("out")
                    .sink_for_trigger("fast_only", "fast")
                    .sink_for_trigger("other", "hourly")
                    .trigger("fast")
                    .trigger("slow"),
            ))
            .load()
            .unwrap();
        let container = CollectorContainer::new(ConfigPath::parse("a").unwrap(), &config);
        let names = |route: Route| -> Vec<String> { container.routed(&route).map(|b| b.name.clone()).collect() };

        let fast = Route::Tick {
            trigger: "fast".to_owned(),
            unqualified: true,
        };
        let slow = Route::Tick {
            trigger: "slow".to_owned(),
            unqualified: false,
        };
        assert_eq!(names(fast), vec!["out", "fast_only"]);
        assert!(names(slow).is_empty());
        assert_eq!(names(Route::Drain), vec!["out", "fast_only"]);
    }

    #[test]
    fn test_empty_reports_skipped() {
        let config = tree(SourceNode::root());
        let container = CollectorContainer::new(ConfigPath::parse("a").unwrap(), &config);

        // No template configured, so the collector is a no-op.
        container.collector(&TagSet::empty()).put(Value::Long(1));
        assert!(container.drain(UNIX_EPOCH).is_empty());

        container.bind(TagSet::builder().tag("k", "v").build(), Arc::new(StringBuffer::new()));
        assert!(container.drain(UNIX_EPOCH).is_empty());
    }
}
