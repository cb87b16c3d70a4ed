use crate::{
    container::CollectorContainer,
    data::{Collector, FnGauge, ValueKind},
    error::ConfigError,
    path::ConfigPath,
    source::{ArgKey, KeyOrigin},
    tags::TagSet,
    tree::ConfigTree,
};
use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use log::debug;
use parking_lot::{Mutex, RwLock};
use std::{collections::BTreeSet, sync::Arc};

/// Maps every (path, tags) identity to exactly one live collector.
///
/// Containers are created on first reference, once per path, and live as long as the registry.
pub struct CollectorRegistry {
    config: Arc<ConfigTree>,
    containers: RwLock<HashMap<ConfigPath, Arc<CollectorContainer>, FnvBuildHasher>>,
    resolved: Mutex<BTreeSet<ConfigPath>>,
}

impl CollectorRegistry {
    pub fn new(config: Arc<ConfigTree>) -> CollectorRegistry {
        CollectorRegistry {
            config,
            containers: RwLock::new(HashMap::default()),
            resolved: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn config(&self) -> &Arc<ConfigTree> { &self.config }

    /// Gets or creates the container for `path`.
    pub fn container(&self, path: &ConfigPath) -> Arc<CollectorContainer> {
        if let Some(container) = self.containers.read().get(path) {
            return container.clone();
        }

        let mut containers = self.containers.write();
        containers
            .entry(path.clone())
            .or_insert_with(|| {
                debug!("creating collector container for '{}'", path);
                Arc::new(CollectorContainer::new(path.clone(), &self.config))
            })
            .clone()
    }

    /// Gets or creates the collector for `tags` under `path`.
    ///
    /// Paths without a configured collector template resolve to a no-op collector.
    pub fn resolve(&self, path: &ConfigPath, tags: TagSet) -> Arc<dyn Collector> { self.container(path).collector(&tags) }

    /// Resolves a call-site key, checking that the collector takes values of `kind`.
    pub fn resolve_key(&self, key: &ArgKey, kind: ValueKind) -> Result<Arc<dyn Collector>, ConfigError> {
        let collector = self.container(key.path()).collector(key.tags());
        if key.origin() == KeyOrigin::Method && self.config.dump_file().is_some() {
            self.resolved.lock().insert(key.path().clone());
        }

        if !collector.accepts(kind) {
            return Err(ConfigError::IncompatibleCollector {
                path: key.path().clone(),
                kind,
            });
        }
        Ok(collector)
    }

    /// Binds `collector` to the identity, replacing any collector already there.
    pub fn bind(&self, path: &ConfigPath, tags: TagSet, collector: Arc<dyn Collector>) {
        self.container(path).bind(tags, collector);
    }

    /// Registers a collector that reports on its own under the dotted `name`.
    pub fn register_collector(
        &self, name: &str, tags: TagSet, collector: Arc<dyn Collector>,
    ) -> Result<(), ConfigError> {
        let key = ArgKey::custom(ConfigPath::parse(name)?, tags);
        self.bind(key.path(), key.tags().clone(), collector);
        Ok(())
    }

    /// Exports a long gauge whose value `f` produces at report time.
    pub fn export_long<F>(&self, name: &str, tags: TagSet, f: F) -> Result<(), ConfigError>
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        self.export(name, tags, FnGauge::long(f))
    }

    /// Exports a double gauge whose value `f` produces at report time.
    pub fn export_double<F>(&self, name: &str, tags: TagSet, f: F) -> Result<(), ConfigError>
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        self.export(name, tags, FnGauge::double(f))
    }

    fn export(&self, name: &str, tags: TagSet, gauge: FnGauge) -> Result<(), ConfigError> {
        let key = ArgKey::named(name, tags)?;
        self.bind(key.path(), key.tags().clone(), Arc::new(gauge));
        Ok(())
    }

    /// Every container created so far.
    pub fn containers(&self) -> Vec<Arc<CollectorContainer>> { self.containers.read().values().cloned().collect() }

    /// Every container whose resolved triggers include `trigger`.
    pub fn containers_for_trigger(&self, trigger: &str) -> Vec<Arc<CollectorContainer>> {
        self.containers
            .read()
            .values()
            .filter(|c| c.triggers().iter().any(|t| t == trigger))
            .cloned()
            .collect()
    }

    /// Paths resolved through method sources, when a dump file is configured.
    pub fn resolved_paths(&self) -> Vec<ConfigPath> { self.resolved.lock().iter().cloned().collect() }
}
