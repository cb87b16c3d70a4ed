use crate::{
    clock::Clock,
    configuration::{Document, Element, SourceNode},
    control::Controller,
    path::ConfigPath,
    registry::CollectorRegistry,
    scheduler::{Reporter, Scheduler},
    source::{MetricSource, Source},
    tree::ConfigTree,
};
use log::{debug, error};
use parking_lot::Mutex;
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

/// Owns everything a running metrics setup needs: the registry, the reporting thread and the
/// sinks.
///
/// Dropping the context shuts it down.
pub struct MetricsContext {
    registry: Arc<CollectorRegistry>,
    reporter: Arc<Reporter>,
    controller: Controller,
    scheduler: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl MetricsContext {
    pub(crate) fn new(tree: ConfigTree, clock: Clock) -> MetricsContext {
        let registry = Arc::new(CollectorRegistry::new(Arc::new(tree)));
        let reporter = Arc::new(Reporter::new(registry.clone(), clock));
        let (scheduler, controller) = Scheduler::new(reporter.clone());

        let handle = thread::Builder::new()
            .name("metrics-scheduler".to_owned())
            .spawn(move || scheduler.run());
        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("failed to start scheduler thread, only the shutdown drain will report: {}", e);
                None
            },
        };

        MetricsContext {
            registry,
            reporter,
            controller,
            scheduler: Mutex::new(handle),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &Arc<CollectorRegistry> { &self.registry }

    pub fn config(&self) -> &Arc<ConfigTree> { self.registry.config() }

    /// A call-site handle for `source`.
    pub fn source(&self, source: &Arc<MetricSource>) -> Source { Source::new(source.clone(), self.registry.clone()) }

    /// A handle for firing triggers on demand.
    pub fn controller(&self) -> Controller { self.controller.clone() }

    /// Stops reporting and flushes everything.
    ///
    /// The scheduler is stopped, every container is reported one last time, every sink is
    /// closed and the dump file, if configured, is written.  Only the first call does anything.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        self.controller.shutdown();
        if let Some(handle) = self.scheduler.lock().take() {
            if handle.join().is_err() {
                error!("scheduler thread panicked");
            }
        }

        self.reporter.drain();

        for (name, sink) in self.config().sinks() {
            if let Err(e) = sink.close() {
                error!("failed to close sink '{}': {}", name, e);
            }
        }

        if let Some(path) = self.config().dump_file() {
            match write_dump(path, &self.registry.resolved_paths()) {
                Ok(()) => debug!("wrote source dump to {}", path.display()),
                Err(e) => error!("failed to write source dump to {}: {}", path.display(), e),
            }
        }

        debug!("metrics context shut down");
    }
}

impl Drop for MetricsContext {
    fn drop(&mut self) { self.shutdown(); }
}

fn insert_path(node: &mut SourceNode, segments: &[String]) {
    let (first, rest) = match segments.split_first() {
        Some(split) => split,
        None => return,
    };

    let position = node.elements.iter().position(|e| match e {
        Element::Source(child) => &child.name == first,
        _ => false,
    });
    let index = match position {
        Some(index) => index,
        None => {
            node.elements.push(Element::Source(SourceNode::new(first.clone())));
            node.elements.len() - 1
        },
    };

    if let Element::Source(child) = &mut node.elements[index] {
        insert_path(child, rest);
    }
}

/// Builds a `sources` tree holding every path in `paths`.
pub(crate) fn dump_tree(paths: &[ConfigPath]) -> SourceNode {
    let mut root = SourceNode::root();
    for path in paths {
        insert_path(&mut root, path.segments());
    }
    root
}

fn write_dump(path: &Path, paths: &[ConfigPath]) -> io::Result<()> {
    let document = Document::new().sources(dump_tree(paths));
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &document)?;
    writer.flush()
}
