use crate::{
    data::{Collector, Value, ValueKind},
    error::ConfigError,
    path::ConfigPath,
    registry::CollectorRegistry,
    tags::TagSet,
};
use fnv::{FnvHashMap, FnvHashSet};
use std::sync::Arc;

struct Method {
    tag_keys: Vec<String>,
    kind: ValueKind,
}

/// A declared set of measurable events.
///
/// Each method names the tag keys its arguments are reported under, in order, and the kind of
/// value it records.  The path of a method is the source name split on `.` followed by the method
/// name, e.g. `org.example.Client.reportSize`.
pub struct MetricSource {
    name: String,
    path: ConfigPath,
    methods: FnvHashMap<String, Method>,
}

impl MetricSource {
    pub fn builder<S: Into<String>>(name: S) -> MetricSourceBuilder {
        MetricSourceBuilder {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn path(&self) -> &ConfigPath { &self.path }

    fn method(&self, method: &str) -> Result<&Method, ConfigError> {
        self.methods.get(method).ok_or_else(|| ConfigError::UnknownMethod {
            source_name: self.name.clone(),
            method: method.to_owned(),
        })
    }

    /// The kind of value `method` records.
    pub fn kind_of(&self, method: &str) -> Result<ValueKind, ConfigError> { self.method(method).map(|m| m.kind) }
}

/// Builder for a `MetricSource`.
pub struct MetricSourceBuilder {
    name: String,
    methods: Vec<(String, Vec<String>, ValueKind)>,
}

impl MetricSourceBuilder {
    /// Declares a method, its argument tag keys, and the kind of value it records.
    pub fn method<S: Into<String>>(mut self, name: S, tag_keys: &[&str], kind: ValueKind) -> Self {
        let tag_keys = tag_keys.iter().map(|k| (*k).to_owned()).collect();
        self.methods.push((name.into(), tag_keys, kind));
        self
    }

    /// Validates the declaration.
    ///
    /// Source and method names must be non-empty, method names must be unique, and a method may
    /// not repeat a tag key.
    pub fn build(self) -> Result<MetricSource, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidSource {
            source_name: self.name.clone(),
            reason,
        };

        if self.name.is_empty() {
            return Err(invalid("source name is empty".to_owned()));
        }
        let path = ConfigPath::parse(&self.name).map_err(|_| invalid("source name has an empty segment".to_owned()))?;

        let mut methods = FnvHashMap::default();
        for (name, tag_keys, kind) in &self.methods {
            if name.is_empty() {
                return Err(invalid("method name is empty".to_owned()));
            }
            let mut seen = FnvHashSet::default();
            if let Some(dup) = tag_keys.iter().find(|k| !seen.insert(k.as_str())) {
                return Err(invalid(format!("method '{}' repeats tag key '{}'", name, dup)));
            }
            let method = Method {
                tag_keys: tag_keys.clone(),
                kind: *kind,
            };
            if methods.insert(name.clone(), method).is_some() {
                return Err(invalid(format!("method '{}' is declared more than once", name)));
            }
        }

        Ok(MetricSource {
            name: self.name.clone(),
            path,
            methods,
        })
    }
}

/// How an `ArgKey` came about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyOrigin {
    /// A declared source method called with arguments.
    Method,
    /// An ad-hoc name, as used by exports.
    Named,
    /// A caller-supplied path and tag set.
    Custom,
}

/// The identity a call resolves to: a path plus the tags derived from its arguments.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArgKey {
    path: ConfigPath,
    tags: TagSet,
    origin: KeyOrigin,
}

impl ArgKey {
    /// Derives the key for a call of `method` on `source` with `args`.
    ///
    /// Arguments pair positionally with the method's declared tag keys.
    pub fn method(source: &MetricSource, method: &str, args: &[&str]) -> Result<ArgKey, ConfigError> {
        let declared = source.method(method)?;
        let path = source.path.child(method);
        if args.len() != declared.tag_keys.len() {
            return Err(ConfigError::MissingTagKey {
                path,
                expected: declared.tag_keys.len(),
                actual: args.len(),
            });
        }

        let tags = declared
            .tag_keys
            .iter()
            .zip(args.iter())
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        Ok(ArgKey {
            path,
            tags,
            origin: KeyOrigin::Method,
        })
    }

    /// A key for the dotted `name`.
    pub fn named(name: &str, tags: TagSet) -> Result<ArgKey, ConfigError> {
        Ok(ArgKey {
            path: ConfigPath::parse(name)?,
            tags,
            origin: KeyOrigin::Named,
        })
    }

    pub fn custom(path: ConfigPath, tags: TagSet) -> ArgKey {
        ArgKey {
            path,
            tags,
            origin: KeyOrigin::Custom,
        }
    }

    pub fn path(&self) -> &ConfigPath { &self.path }

    pub fn tags(&self) -> &TagSet { &self.tags }

    pub fn origin(&self) -> KeyOrigin { self.origin }
}

/// Call-site handle for a registered `MetricSource`.
///
/// Sources are cheap to clone and can be shared between threads.
#[derive(Clone)]
pub struct Source {
    source: Arc<MetricSource>,
    registry: Arc<CollectorRegistry>,
}

impl Source {
    pub(crate) fn new(source: Arc<MetricSource>, registry: Arc<CollectorRegistry>) -> Source { Source { source, registry } }

    /// The collector `method` records into for `args`.
    ///
    /// Callers on a hot path can hold on to the returned collector and `put` into it directly.
    pub fn collector(&self, method: &str, args: &[&str]) -> Result<Arc<dyn Collector>, ConfigError> {
        let kind = self.source.kind_of(method)?;
        let key = ArgKey::method(&self.source, method, args)?;
        self.registry.resolve_key(&key, kind)
    }

    /// Records `value` for a call of `method` with `args`.
    pub fn put<V: Into<Value>>(&self, method: &str, args: &[&str], value: V) -> Result<(), ConfigError> {
        let value = value.into();
        let expected = self.source.kind_of(method)?;
        if value.kind() != expected {
            return Err(ConfigError::ValueKindMismatch {
                path: self.source.path.child(method),
                expected,
                actual: value.kind(),
            });
        }

        self.collector(method, args)?.put(value);
        Ok(())
    }

    pub fn metric_source(&self) -> &MetricSource { &self.source }
}

#[cfg(test)]
mod tests {
    use super::{ArgKey, KeyOrigin, MetricSource, Source};
    use crate::{
        configuration::{Configuration, Document, SourceNode},
        data::{Counter, DurationStats, Value, ValueKind},
        error::ConfigError,
        path::ConfigPath,
        registry::CollectorRegistry,
        tags::TagSet,
    };
    use std::{
        collections::HashSet,
        sync::Arc,
        time::{Duration, UNIX_EPOCH},
    };

    fn client() -> MetricSource {
        MetricSource::builder("org.example.Client")
            .method("reportSize", &["host"], ValueKind::Long)
            .method("requestTime", &["host", "endpoint"], ValueKind::Duration)
            .build()
            .unwrap()
    }

    #[test]
    fn test_method_key() {
        let source = client();
        let key = ArgKey::method(&source, "requestTime", &["a", "/status"]).unwrap();
        assert_eq!(key.path(), &ConfigPath::parse("org.example.Client.requestTime").unwrap());
        assert_eq!(key.tags().get("endpoint"), Some("/status"));
        assert_eq!(key.origin(), KeyOrigin::Method);

        let again = ArgKey::method(&source, "requestTime", &["a", "/status"]).unwrap();
        assert_eq!(key, again);
        let other = ArgKey::method(&source, "requestTime", &["a", "/health"]).unwrap();
        let keys: HashSet<ArgKey> = vec![key, again, other].into_iter().collect();
        assert_eq!(keys.len(), 2);

        match ArgKey::method(&source, "reportSize", &[]) {
            Err(ConfigError::MissingTagKey { expected, actual, .. }) => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 0);
            },
            other => panic!("expected missing tag key! actual: {:?}", other),
        }
        assert!(match ArgKey::method(&source, "close", &[]) {
            Err(ConfigError::UnknownMethod { method, .. }) => method == "close",
            _ => false,
        });

        let named = ArgKey::named("pool.size", TagSet::empty()).unwrap();
        assert_eq!(named.origin(), KeyOrigin::Named);
    }

    #[test]
    fn test_invalid_declarations() {
        let invalid = |builder: super::MetricSourceBuilder| match builder.build() {
            Err(ConfigError::InvalidSource { .. }) => true,
            _ => false,
        };

        assert!(invalid(MetricSource::builder("")));
        assert!(invalid(MetricSource::builder("org..Client")));
        assert!(invalid(MetricSource::builder("Client").method("", &[], ValueKind::Long)));
        assert!(invalid(MetricSource::builder("Client").method("send", &["host", "host"], ValueKind::Long)));
        assert!(invalid(
            MetricSource::builder("Client")
                .method("send", &[], ValueKind::Long)
                .method("send", &["host"], ValueKind::Long)
        ));
    }

    #[test]
    fn test_source_put() {
        let tree = Configuration::new()
            .with_collector("counter", Counter::new())
            .with_collector("timer", DurationStats::new())
            .document(
                Document::new().sources(
                    SourceNode::root().source(
                        SourceNode::new("org.example.Client")
                            .source(SourceNode::new("reportSize").collector("counter"))
                            .source(SourceNode::new("requestTime").collector("timer")),
                    ),
                ),
            )
            .load()
            .unwrap();
        let registry = Arc::new(CollectorRegistry::new(Arc::new(tree)));
        let source = Source::new(Arc::new(client()), registry);

        source.put("reportSize", &["a"], 10i64).unwrap();
        source.put("reportSize", &["a"], 5i64).unwrap();
        source.put("reportSize", &["b"], 1i64).unwrap();
        source
            .put("requestTime", &["a", "/"], Duration::from_millis(3))
            .unwrap();

        let a = source.collector("reportSize", &["a"]).unwrap();
        assert_eq!(a.report(UNIX_EPOCH)[0].value(), &Value::Long(15));

        match source.put("reportSize", &["a"], 1.5f64) {
            Err(ConfigError::ValueKindMismatch { expected, actual, .. }) => {
                assert_eq!(expected, ValueKind::Long);
                assert_eq!(actual, ValueKind::Double);
            },
            other => panic!("expected kind mismatch! actual: {:?}", other),
        }
    }
}
