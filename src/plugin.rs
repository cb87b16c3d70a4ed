use crate::{
    data::{
        histogram::parse_percentiles, Collector, Counter, DoubleGauge, DurationStats, LongGauge, Noop, SimpleStats,
        StringBuffer, TimingHistogram,
    },
    error::ConfigError,
    format::{Formatter, TemplateFormatter, DEFAULT_TEMPLATE},
    helper::{parse_bool, parse_duration},
    scheduler::Trigger,
    sink::{LogSink, MemorySink, Sink},
};
use fnv::FnvHashMap;
use log::Level;
use std::{collections::BTreeMap, str::FromStr, sync::Arc};

/// Element-specific parameters of a declaration, after `${token}` substitution.
pub type Params = BTreeMap<String, String>;

type Factory<T> = Box<dyn Fn(&str, &Params) -> Result<T, ConfigError> + Send + Sync>;

/// Name-keyed factories for everything a configuration document can declare.
///
/// A declaration names a factory by type (`"counter"`, `"interval"`, ...) and supplies its
/// parameters; the instance is built once at load time.  `Plugins::default()` carries the
/// built-in types, and more can be registered before loading.
pub struct Plugins {
    sinks: FnvHashMap<String, Factory<Arc<dyn Sink>>>,
    formatters: FnvHashMap<String, Factory<Arc<dyn Formatter>>>,
    triggers: FnvHashMap<String, Factory<Trigger>>,
    collectors: FnvHashMap<String, Factory<Arc<dyn Collector>>>,
}

impl Plugins {
    /// A registry with no factories at all.
    pub fn empty() -> Plugins {
        Plugins {
            sinks: FnvHashMap::default(),
            formatters: FnvHashMap::default(),
            triggers: FnvHashMap::default(),
            collectors: FnvHashMap::default(),
        }
    }

    pub fn register_sink<F>(&mut self, type_name: &str, factory: F)
    where
        F: Fn(&str, &Params) -> Result<Arc<dyn Sink>, ConfigError> + Send + Sync + 'static,
    {
        self.sinks.insert(type_name.to_owned(), Box::new(factory));
    }

    pub fn register_formatter<F>(&mut self, type_name: &str, factory: F)
    where
        F: Fn(&str, &Params) -> Result<Arc<dyn Formatter>, ConfigError> + Send + Sync + 'static,
    {
        self.formatters.insert(type_name.to_owned(), Box::new(factory));
    }

    pub fn register_trigger<F>(&mut self, type_name: &str, factory: F)
    where
        F: Fn(&str, &Params) -> Result<Trigger, ConfigError> + Send + Sync + 'static,
    {
        self.triggers.insert(type_name.to_owned(), Box::new(factory));
    }

    pub fn register_collector<F>(&mut self, type_name: &str, factory: F)
    where
        F: Fn(&str, &Params) -> Result<Arc<dyn Collector>, ConfigError> + Send + Sync + 'static,
    {
        self.collectors.insert(type_name.to_owned(), Box::new(factory));
    }

    pub fn build_sink(&self, name: &str, type_name: &str, params: &Params) -> Result<Arc<dyn Sink>, ConfigError> {
        build(&self.sinks, "sink", name, type_name, params)
    }

    pub fn build_formatter(
        &self, name: &str, type_name: &str, params: &Params,
    ) -> Result<Arc<dyn Formatter>, ConfigError> {
        build(&self.formatters, "formatter", name, type_name, params)
    }

    pub fn build_trigger(&self, name: &str, type_name: &str, params: &Params) -> Result<Trigger, ConfigError> {
        build(&self.triggers, "trigger", name, type_name, params)
    }

    pub fn build_collector(
        &self, name: &str, type_name: &str, params: &Params,
    ) -> Result<Arc<dyn Collector>, ConfigError> {
        build(&self.collectors, "collector", name, type_name, params)
    }
}

fn build<T>(
    factories: &FnvHashMap<String, Factory<T>>, kind: &'static str, name: &str, type_name: &str, params: &Params,
) -> Result<T, ConfigError> {
    match factories.get(type_name) {
        Some(factory) => factory(name, params),
        None => Err(ConfigError::UnknownType {
            kind,
            name: name.to_owned(),
            type_name: type_name.to_owned(),
        }),
    }
}

/// Reads an optional parameter, failing on values `parse` rejects.
fn param<T, P>(name: &str, params: &Params, key: &str, parse: P) -> Result<Option<T>, ConfigError>
where
    P: Fn(&str) -> Option<T>,
{
    match params.get(key) {
        None => Ok(None),
        Some(raw) => parse(raw).map(Some).ok_or_else(|| ConfigError::InvalidParam {
            name: name.to_owned(),
            param: key.to_owned(),
            reason: format!("unable to parse '{}'", raw),
        }),
    }
}

impl Default for Plugins {
    fn default() -> Plugins {
        let mut plugins = Plugins::empty();

        plugins.register_sink("memory", |_, _| Ok(Arc::new(MemorySink::new()) as Arc<dyn Sink>));
        plugins.register_sink("log", |name, params| {
            let level = param(name, params, "level", |raw| Level::from_str(raw).ok())?.unwrap_or(Level::Info);
            Ok(Arc::new(LogSink::new(level)) as Arc<dyn Sink>)
        });

        plugins.register_formatter("template", |_, params| {
            let template = params.get("template").map(String::as_str).unwrap_or(DEFAULT_TEMPLATE);
            Ok(Arc::new(TemplateFormatter::new(template)) as Arc<dyn Formatter>)
        });

        plugins.register_trigger("interval", |name, params| {
            match param(name, params, "period", parse_duration)? {
                Some(period) if period.as_nanos() > 0 => Ok(Trigger::Interval(period)),
                _ => Err(ConfigError::InvalidParam {
                    name: name.to_owned(),
                    param: "period".to_owned(),
                    reason: "a non-zero period is required".to_owned(),
                }),
            }
        });
        plugins.register_trigger("on_demand", |_, _| Ok(Trigger::OnDemand));

        plugins.register_collector("counter", |name, params| {
            let reset = param(name, params, "reset", parse_bool)?.unwrap_or(true);
            Ok(Arc::new(Counter::with_reset(reset)) as Arc<dyn Collector>)
        });
        plugins.register_collector("long_gauge", |name, params| {
            let reset = param(name, params, "reset", parse_bool)?.unwrap_or(false);
            Ok(Arc::new(LongGauge::with_reset(reset)) as Arc<dyn Collector>)
        });
        plugins.register_collector("double_gauge", |name, params| {
            let reset = param(name, params, "reset", parse_bool)?.unwrap_or(false);
            Ok(Arc::new(DoubleGauge::with_reset(reset)) as Arc<dyn Collector>)
        });
        plugins.register_collector("stats", |_, _| Ok(Arc::new(SimpleStats::new()) as Arc<dyn Collector>));
        plugins.register_collector("duration_stats", |_, _| {
            Ok(Arc::new(DurationStats::new()) as Arc<dyn Collector>)
        });
        plugins.register_collector("histogram", |name, params| {
            let histogram = TimingHistogram::new().map_err(|e| ConfigError::InvalidParam {
                name: name.to_owned(),
                param: "bounds".to_owned(),
                reason: format!("{:?}", e),
            })?;
            let histogram = match param(name, params, "percentiles", parse_percentiles)? {
                Some(percentiles) => histogram.with_percentiles(percentiles),
                None => histogram,
            };
            Ok(Arc::new(histogram) as Arc<dyn Collector>)
        });
        plugins.register_collector("string", |_, _| Ok(Arc::new(StringBuffer::new()) as Arc<dyn Collector>));
        plugins.register_collector("noop", |_, _| Ok(Arc::new(Noop) as Arc<dyn Collector>));

        plugins
    }
}
