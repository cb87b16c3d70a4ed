use crate::{
    configuration::{Declaration, Document, Element, SourceNode},
    data::{Collector, Props},
    error::ConfigError,
    format::{Formatter, TemplateFormatter},
    helper::format_value,
    path::ConfigPath,
    plugin::{Params, Plugins},
    scheduler::Trigger,
    sink::Sink,
};
use fnv::{FnvBuildHasher, FnvHashMap};
use hashbrown::HashMap;
use log::debug;
use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

/// Instances registered directly instead of declared in the document.
#[derive(Default)]
pub(crate) struct Preset {
    pub(crate) sinks: Vec<(String, Arc<dyn Sink>)>,
    pub(crate) formatters: Vec<(String, Arc<dyn Formatter>)>,
    pub(crate) triggers: Vec<(String, Trigger)>,
    pub(crate) collectors: Vec<(String, Arc<dyn Collector>)>,
}

/// A sink reference at a path, optionally restricted to one trigger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkRef {
    pub sink: String,
    pub trigger: Option<String>,
}

/// A formatter reference at a path, optionally restricted to one sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatterRef {
    pub formatter: String,
    pub sink: Option<String>,
}

/// A sink as resolved for one path: the instance, the formatter feeding it, and the trigger it
/// is restricted to, if any.
#[derive(Clone)]
pub struct SinkBinding {
    pub name: String,
    pub sink: Arc<dyn Sink>,
    pub formatter: Arc<dyn Formatter>,
    pub trigger: Option<String>,
}

/// Settings declared explicitly at one path.
#[derive(Default)]
struct PathConfig {
    tags: BTreeMap<String, String>,
    props: Props,
    sinks: Vec<SinkRef>,
    formatters: Vec<FormatterRef>,
    triggers: Vec<String>,
    collector: Option<String>,
}

/// Resolved, immutable configuration.
///
/// Every lookup walks from the full path up to the root and the most specific setting wins.
/// Tags and properties merge key by key.  Sink, formatter and trigger references are replaced as
/// a whole: the nearest path declaring at least one reference of a kind supplies all of them.
pub struct ConfigTree {
    properties: BTreeMap<String, String>,
    paths: HashMap<ConfigPath, PathConfig, FnvBuildHasher>,
    metric_names: HashMap<ConfigPath, String, FnvBuildHasher>,
    sinks: FnvHashMap<String, Arc<dyn Sink>>,
    formatters: FnvHashMap<String, Arc<dyn Formatter>>,
    triggers: BTreeMap<String, Trigger>,
    collectors: FnvHashMap<String, Arc<dyn Collector>>,
    default_formatter: Arc<dyn Formatter>,
    dump_file: Option<PathBuf>,
}

fn insert_unique<T>(
    map: &mut FnvHashMap<String, T>, kind: &'static str, name: String, value: T,
) -> Result<(), ConfigError> {
    if map.contains_key(&name) {
        return Err(ConfigError::DuplicateName { kind, name });
    }
    map.insert(name, value);
    Ok(())
}

fn substituted(params: &Params, properties: &BTreeMap<String, String>) -> Params {
    params
        .iter()
        .map(|(k, v)| (format_value(k, properties), format_value(v, properties)))
        .collect()
}

impl ConfigTree {
    pub(crate) fn load(
        document: Document, properties: BTreeMap<String, String>, plugins: &Plugins, preset: Preset,
    ) -> Result<ConfigTree, ConfigError> {
        let mut tree = ConfigTree {
            properties,
            paths: HashMap::default(),
            metric_names: HashMap::default(),
            sinks: FnvHashMap::default(),
            formatters: FnvHashMap::default(),
            triggers: BTreeMap::new(),
            collectors: FnvHashMap::default(),
            default_formatter: Arc::new(TemplateFormatter::default()),
            dump_file: document.dump_file,
        };

        for (name, sink) in preset.sinks {
            insert_unique(&mut tree.sinks, "sink", name, sink)?;
        }
        for (name, formatter) in preset.formatters {
            insert_unique(&mut tree.formatters, "formatter", name, formatter)?;
        }
        for (name, collector) in preset.collectors {
            insert_unique(&mut tree.collectors, "collector", name, collector)?;
        }
        for (name, trigger) in preset.triggers {
            tree.insert_trigger(name, trigger)?;
        }

        for Declaration { name, kind, params } in &document.sinks {
            let sink = plugins.build_sink(name, kind, &substituted(params, &tree.properties))?;
            insert_unique(&mut tree.sinks, "sink", name.clone(), sink)?;
        }
        for Declaration { name, kind, params } in &document.formatters {
            let formatter = plugins.build_formatter(name, kind, &substituted(params, &tree.properties))?;
            insert_unique(&mut tree.formatters, "formatter", name.clone(), formatter)?;
        }
        for Declaration { name, kind, params } in &document.triggers {
            let trigger = plugins.build_trigger(name, kind, &substituted(params, &tree.properties))?;
            tree.insert_trigger(name.clone(), trigger)?;
        }
        for Declaration { name, kind, params } in &document.collectors {
            let collector = plugins.build_collector(name, kind, &substituted(params, &tree.properties))?;
            insert_unique(&mut tree.collectors, "collector", name.clone(), collector)?;
        }

        let root = document.sources.as_ref().ok_or(ConfigError::MissingSources)?;
        let root_path = ConfigPath::root().join(&root.name)?;
        tree.parse_sources(root, &root_path)?;

        debug!(
            "loaded configuration: {} paths, {} sinks, {} triggers",
            tree.paths.len(),
            tree.sinks.len(),
            tree.triggers.len()
        );
        Ok(tree)
    }

    fn insert_trigger(&mut self, name: String, trigger: Trigger) -> Result<(), ConfigError> {
        if self.triggers.contains_key(&name) {
            return Err(ConfigError::DuplicateName { kind: "trigger", name });
        }
        self.triggers.insert(name, trigger);
        Ok(())
    }

    fn parse_sources(&mut self, node: &SourceNode, path: &ConfigPath) -> Result<(), ConfigError> {
        if let Some(metric_name) = &node.metric_name {
            let metric_name = self.format(metric_name);
            self.metric_names.insert(path.clone(), metric_name);
        }

        for element in &node.elements {
            match element {
                Element::Source(child) => {
                    if child.name.is_empty() {
                        return Err(ConfigError::MalformedPath(format!("{}.<unnamed>", path)));
                    }
                    let child_path = path.join(&child.name)?;
                    self.parse_sources(child, &child_path)?;
                },
                Element::Tag { key, value } => {
                    let (key, value) = (self.format(key), self.format(value));
                    self.path_config(path).tags.insert(key, value);
                },
                Element::Prop { key, value } => {
                    let (key, value) = (self.format(key), self.format(value));
                    self.path_config(path).props.insert(key, value);
                },
                Element::Sink { name, trigger } => {
                    self.check_sink(path, name)?;
                    if let Some(trigger) = trigger {
                        self.check_trigger(path, trigger)?;
                    }
                    self.path_config(path).sinks.push(SinkRef {
                        sink: name.clone(),
                        trigger: trigger.clone(),
                    });
                },
                Element::Formatter { name, sink } => {
                    if !self.formatters.contains_key(name) {
                        return Err(ConfigError::UnknownFormatter {
                            path: path.clone(),
                            name: name.clone(),
                        });
                    }
                    if let Some(sink) = sink {
                        self.check_sink(path, sink)?;
                    }
                    self.path_config(path).formatters.push(FormatterRef {
                        formatter: name.clone(),
                        sink: sink.clone(),
                    });
                },
                Element::Collector { name } => {
                    if !self.collectors.contains_key(name) {
                        return Err(ConfigError::UnknownCollector {
                            path: path.clone(),
                            name: name.clone(),
                        });
                    }
                    self.path_config(path).collector = Some(name.clone());
                },
                Element::Trigger { name } => {
                    self.check_trigger(path, name)?;
                    self.path_config(path).triggers.push(name.clone());
                },
            }
        }

        Ok(())
    }

    fn check_sink(&self, path: &ConfigPath, name: &str) -> Result<(), ConfigError> {
        if self.sinks.contains_key(name) {
            Ok(())
        } else {
            Err(ConfigError::UnknownSink {
                path: path.clone(),
                name: name.to_owned(),
            })
        }
    }

    fn check_trigger(&self, path: &ConfigPath, name: &str) -> Result<(), ConfigError> {
        if self.triggers.contains_key(name) {
            Ok(())
        } else {
            Err(ConfigError::UnknownTrigger {
                path: path.clone(),
                name: name.to_owned(),
            })
        }
    }

    fn path_config(&mut self, path: &ConfigPath) -> &mut PathConfig {
        self.paths.entry(path.clone()).or_insert_with(PathConfig::default)
    }

    fn format(&self, value: &str) -> String { format_value(value, &self.properties) }

    /// Walks from `path` to the root and returns the first value `pick` produces.
    fn nearest<'a, T, F>(&'a self, path: &ConfigPath, pick: F) -> Option<T>
    where
        F: Fn(&'a PathConfig) -> Option<T>,
    {
        path.prefixes().filter_map(|prefix| self.paths.get(prefix)).find_map(pick)
    }

    /// Walks from `path` to the root, keeping the first value seen for each key.
    fn inherited<F>(&self, path: &ConfigPath, pick: F) -> BTreeMap<String, String>
    where
        F: Fn(&PathConfig) -> &BTreeMap<String, String>,
    {
        let mut resolved = BTreeMap::new();
        for config in path.prefixes().filter_map(|prefix| self.paths.get(prefix)) {
            for (k, v) in pick(config) {
                resolved.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        resolved
    }

    /// Tags for `path`, with descendants overriding ancestors key by key.
    pub fn tags_for(&self, path: &ConfigPath) -> BTreeMap<String, String> { self.inherited(path, |c| &c.tags) }

    /// Properties for `path`, with descendants overriding ancestors key by key.
    pub fn props_for(&self, path: &ConfigPath) -> Props { self.inherited(path, |c| &c.props) }

    /// Sink references for `path`, from the nearest path that declares any.
    pub fn sinks_for(&self, path: &ConfigPath) -> &[SinkRef] {
        self.nearest(path, |c| if c.sinks.is_empty() { None } else { Some(c.sinks.as_slice()) })
            .unwrap_or(&[])
    }

    /// Formatter references for `path`, from the nearest path that declares any.
    pub fn formatters_for(&self, path: &ConfigPath) -> &[FormatterRef] {
        self.nearest(path, |c| {
            if c.formatters.is_empty() {
                None
            } else {
                Some(c.formatters.as_slice())
            }
        })
        .unwrap_or(&[])
    }

    /// Trigger names for `path`, from the nearest path that declares any.
    pub fn triggers_for(&self, path: &ConfigPath) -> &[String] {
        self.nearest(path, |c| {
            if c.triggers.is_empty() {
                None
            } else {
                Some(c.triggers.as_slice())
            }
        })
        .unwrap_or(&[])
    }

    /// The collector template for `path`, from the nearest path that names one.
    pub fn collector_template(&self, path: &ConfigPath) -> Option<Arc<dyn Collector>> {
        self.nearest(path, |c| c.collector.as_ref())
            .and_then(|name| self.collectors.get(name))
            .cloned()
    }

    /// The explicit metric name declared at exactly `path`.
    pub fn metric_name_for(&self, path: &ConfigPath) -> Option<&str> { self.metric_names.get(path).map(String::as_str) }

    /// Resolves the sinks of `path` together with the formatter feeding each one.
    ///
    /// A formatter bound to a specific sink wins over an unqualified one, which wins over the
    /// default `TemplateFormatter`.
    pub fn bindings_for(&self, path: &ConfigPath) -> Vec<SinkBinding> {
        let formatters = self.formatters_for(path);
        let generic = formatters
            .iter()
            .find(|f| f.sink.is_none())
            .and_then(|f| self.formatters.get(&f.formatter));

        self.sinks_for(path)
            .iter()
            .filter_map(|sink_ref| {
                let sink = self.sinks.get(&sink_ref.sink)?;
                let specific = formatters
                    .iter()
                    .find(|f| f.sink.as_ref() == Some(&sink_ref.sink))
                    .and_then(|f| self.formatters.get(&f.formatter));
                let formatter = specific.or(generic).unwrap_or(&self.default_formatter);

                Some(SinkBinding {
                    name: sink_ref.sink.clone(),
                    sink: sink.clone(),
                    formatter: formatter.clone(),
                    trigger: sink_ref.trigger.clone(),
                })
            })
            .collect()
    }

    pub fn trigger(&self, name: &str) -> Option<&Trigger> { self.triggers.get(name) }

    /// Every declared trigger, ordered by name.
    pub fn triggers(&self) -> impl Iterator<Item = (&String, &Trigger)> { self.triggers.iter() }

    /// Every declared sink.
    pub fn sinks(&self) -> impl Iterator<Item = (&String, &Arc<dyn Sink>)> { self.sinks.iter() }

    pub fn properties(&self) -> &BTreeMap<String, String> { &self.properties }

    pub fn dump_file(&self) -> Option<&PathBuf> { self.dump_file.as_ref() }
}
