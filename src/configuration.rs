use crate::{
    clock::Clock,
    context::MetricsContext,
    data::Collector,
    error::ConfigError,
    format::Formatter,
    plugin::{Params, Plugins},
    scheduler::Trigger,
    sink::Sink,
    tree::{ConfigTree, Preset},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

/// The hierarchical configuration document a loader produces.
///
/// Declarations name plugin instances; the `sources` tree attaches tags, properties and
/// references to those instances at paths.  The document can be built programmatically or
/// deserialized from JSON, in which case unknown fields and elements are rejected.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sinks: Vec<Declaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formatters: Vec<Declaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<Declaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collectors: Vec<Declaration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<SourceNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dump_file: Option<PathBuf>,
}

impl Document {
    pub fn new() -> Document { Document::default() }

    /// Parses the JSON rendering of a document.
    pub fn from_json(raw: &str) -> Result<Document, ConfigError> { Ok(serde_json::from_str(raw)?) }

    pub fn sink(mut self, declaration: Declaration) -> Self {
        self.sinks.push(declaration);
        self
    }

    pub fn formatter(mut self, declaration: Declaration) -> Self {
        self.formatters.push(declaration);
        self
    }

    pub fn trigger(mut self, declaration: Declaration) -> Self {
        self.triggers.push(declaration);
        self
    }

    pub fn collector(mut self, declaration: Declaration) -> Self {
        self.collectors.push(declaration);
        self
    }

    pub fn sources(mut self, root: SourceNode) -> Self {
        self.sources = Some(root);
        self
    }

    /// Records every resolved source path and writes them to `path` at shutdown.
    pub fn dump_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.dump_file = Some(path.into());
        self
    }
}

/// A named plugin instance: the factory type to build it with and its parameters.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Declaration {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: Params,
}

impl Declaration {
    pub fn new<N: Into<String>, K: Into<String>>(name: N, kind: K) -> Declaration {
        Declaration {
            name: name.into(),
            kind: kind.into(),
            params: Params::new(),
        }
    }

    pub fn param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// One node of the `sources` tree.
///
/// A node's name may be dotted, in which case it contributes several path segments.  The root
/// node normally has an empty name.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourceNode {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<Element>,
}

/// Something declared at a source node.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "element", rename_all = "snake_case", deny_unknown_fields)]
pub enum Element {
    Source(SourceNode),
    Tag {
        key: String,
        value: String,
    },
    Prop {
        key: String,
        value: String,
    },
    Sink {
        #[serde(rename = "ref")]
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trigger: Option<String>,
    },
    Formatter {
        #[serde(rename = "ref")]
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sink: Option<String>,
    },
    Collector {
        #[serde(rename = "ref")]
        name: String,
    },
    Trigger {
        #[serde(rename = "ref")]
        name: String,
    },
}

impl SourceNode {
    /// The unnamed root of the `sources` tree.
    pub fn root() -> SourceNode { SourceNode::default() }

    pub fn new<S: Into<String>>(name: S) -> SourceNode {
        SourceNode {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Overrides the reported metric name for exactly this node's path.
    pub fn metric_name<S: Into<String>>(mut self, name: S) -> Self {
        self.metric_name = Some(name.into());
        self
    }

    pub fn source(mut self, child: SourceNode) -> Self {
        self.elements.push(Element::Source(child));
        self
    }

    pub fn tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.elements.push(Element::Tag {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn prop<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.elements.push(Element::Prop {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn sink<S: Into<String>>(mut self, name: S) -> Self {
        self.elements.push(Element::Sink {
            name: name.into(),
            trigger: None,
        });
        self
    }

    /// Binds a sink that only receives reports from the given trigger.
    pub fn sink_for_trigger<S: Into<String>, T: Into<String>>(mut self, name: S, trigger: T) -> Self {
        self.elements.push(Element::Sink {
            name: name.into(),
            trigger: Some(trigger.into()),
        });
        self
    }

    pub fn formatter<S: Into<String>>(mut self, name: S) -> Self {
        self.elements.push(Element::Formatter {
            name: name.into(),
            sink: None,
        });
        self
    }

    /// Binds a formatter that only formats for the given sink.
    pub fn formatter_for_sink<F: Into<String>, S: Into<String>>(mut self, name: F, sink: S) -> Self {
        self.elements.push(Element::Formatter {
            name: name.into(),
            sink: Some(sink.into()),
        });
        self
    }

    pub fn collector<S: Into<String>>(mut self, name: S) -> Self {
        self.elements.push(Element::Collector { name: name.into() });
        self
    }

    pub fn trigger<S: Into<String>>(mut self, name: S) -> Self {
        self.elements.push(Element::Trigger { name: name.into() });
        self
    }
}

/// A configuration builder for `MetricsContext`.
pub struct Configuration {
    properties: BTreeMap<String, String>,
    document: Document,
    plugins: Plugins,
    clock: Clock,
    preset: Preset,
}

impl Default for Configuration {
    fn default() -> Configuration {
        Configuration {
            properties: BTreeMap::new(),
            document: Document::default(),
            plugins: Plugins::default(),
            clock: Clock::new(),
            preset: Preset::default(),
        }
    }
}

impl Configuration {
    /// Creates a new `Configuration` with default values.
    pub fn new() -> Configuration { Default::default() }

    /// Sets the properties table used for `${token}` substitution.
    ///
    /// Tag and property keys and values, metric names, and declaration parameters are all
    /// substituted.  Tokens with no entry are left as written.
    pub fn properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.properties = properties;
        self
    }

    /// Sets a single substitution property.
    pub fn property<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Sets the configuration document.
    ///
    /// Defaults to an empty document, which fails to load: a `sources` root is required.
    pub fn document(mut self, document: Document) -> Self {
        self.document = document;
        self
    }

    /// Replaces the plugin factories used to build declarations.
    ///
    /// Defaults to `Plugins::default()`, the built-in types.
    pub fn plugins(mut self, plugins: Plugins) -> Self {
        self.plugins = plugins;
        self
    }

    /// Sets the clock used to timestamp reports.
    ///
    /// Defaults to the system clock.
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Registers an already-built sink under `name`, as if it had been declared.
    pub fn with_sink<S: Sink + 'static>(mut self, name: &str, sink: Arc<S>) -> Self {
        let sink: Arc<dyn Sink> = sink;
        self.preset.sinks.push((name.to_owned(), sink));
        self
    }

    /// Registers an already-built formatter under `name`.
    pub fn with_formatter<F: Formatter + 'static>(mut self, name: &str, formatter: Arc<F>) -> Self {
        let formatter: Arc<dyn Formatter> = formatter;
        self.preset.formatters.push((name.to_owned(), formatter));
        self
    }

    /// Registers a trigger under `name`.
    pub fn with_trigger(mut self, name: &str, trigger: Trigger) -> Self {
        self.preset.triggers.push((name.to_owned(), trigger));
        self
    }

    /// Registers a collector template under `name`.
    pub fn with_collector<C: Collector + 'static>(mut self, name: &str, template: C) -> Self {
        let template: Arc<dyn Collector> = Arc::new(template);
        self.preset.collectors.push((name.to_owned(), template));
        self
    }

    /// Resolves the document into a `ConfigTree` without starting anything.
    pub fn load(self) -> Result<ConfigTree, ConfigError> {
        ConfigTree::load(self.document, self.properties, &self.plugins, self.preset)
    }

    /// Loads the configuration and starts a `MetricsContext` on it.
    ///
    /// Every configuration error surfaces here, before any collector exists.
    pub fn build(self) -> Result<MetricsContext, ConfigError> {
        let clock = self.clock.clone();
        let tree = self.load()?;
        Ok(MetricsContext::new(tree, clock))
    }
}

#[cfg(test)]
mod tests {
    use super::{Declaration, Document, Element, SourceNode};

    #[test]
    fn test_document_from_json() {
        let raw = r#"{
            "sinks": [{"name": "out", "type": "log", "params": {"level": "debug"}}],
            "triggers": [{"name": "minute", "type": "interval", "params": {"period": "60s"}}],
            "sources": {
                "elements": [
                    {"element": "sink", "ref": "out"},
                    {"element": "trigger", "ref": "minute"},
                    {"element": "source", "name": "org.example", "metric_name": "example",
                     "elements": [{"element": "tag", "key": "env", "value": "${env}"}]}
                ]
            }
        }"#;

        let document = Document::from_json(raw).unwrap();
        let expected = Document::new()
            .sink(Declaration::new("out", "log").param("level", "debug"))
            .trigger(Declaration::new("minute", "interval").param("period", "60s"))
            .sources(
                SourceNode::root()
                    .sink("out")
                    .trigger("minute")
                    .source(SourceNode::new("org.example").metric_name("example").tag("env", "${env}")),
            );
        assert_eq!(document, expected);
    }

    #[test]
    fn test_document_rejects_unknown_elements() {
        let raw = r#"{"sources": {"elements": [{"element": "alarm", "ref": "x"}]}}"#;
        assert!(Document::from_json(raw).is_err());

        let raw = r#"{"sources": {}, "reporters": []}"#;
        assert!(Document::from_json(raw).is_err());

        let raw = r#"{"sources": {"elements": [{"element": "tag", "key": "a", "value": "b", "extra": 1}]}}"#;
        assert!(Document::from_json(raw).is_err());
    }

    #[test]
    fn test_document_round_trips_through_json() {
        let document = Document::new().sources(
            SourceNode::root()
                .source(SourceNode::new("a").formatter_for_sink("fmt", "out").sink_for_trigger("out", "fast")),
        );

        let json = serde_json::to_string(&document).unwrap();
        assert_eq!(Document::from_json(&json).unwrap(), document);
        match &document.sources.as_ref().unwrap().elements[0] {
            Element::Source(node) => assert_eq!(node.elements.len(), 2),
            other => panic!("expected source element! actual: {:?}", other),
        }
    }
}
