//! Hierarchical, configuration-driven metrics instrumentation.
//!
//! Application code declares `MetricSource`s: named sets of methods, each with the tag keys its
//! arguments map to and the kind of value it records.  Every call resolves to a path such as
//! `org.example.Client.reportSize`, and the configuration tree decides, by longest matching
//! prefix, which collector accumulates the values, which tags are attached, when the collector is
//! reported and which sinks receive the result.
//!
//! ```no_run
//! use metricpath::{Configuration, Declaration, Document, MetricSource, SourceNode, ValueKind};
//! use std::sync::Arc;
//!
//! let context = Configuration::new()
//!     .document(
//!         Document::new()
//!             .sink(Declaration::new("stdout", "log"))
//!             .trigger(Declaration::new("minute", "interval").param("period", "60s"))
//!             .collector(Declaration::new("counter", "counter"))
//!             .sources(SourceNode::root().sink("stdout").trigger("minute").collector("counter")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let client = Arc::new(
//!     MetricSource::builder("org.example.Client")
//!         .method("reportSize", &["host"], ValueKind::Long)
//!         .build()
//!         .unwrap(),
//! );
//! context.source(&client).put("reportSize", &["db1"], 512i64).unwrap();
//! ```
mod clock;
mod configuration;
mod container;
mod context;
mod control;
mod data;
mod error;
mod format;
mod helper;
mod path;
mod plugin;
mod registry;
mod scheduler;
mod sink;
mod source;
mod tags;
mod tree;

pub use self::{
    clock::{Clock, ClockSource, Mock},
    configuration::{Configuration, Declaration, Document, Element, SourceNode},
    container::{CollectorContainer, Route},
    context::MetricsContext,
    control::Controller,
    data::{
        Collector, Counter, DoubleGauge, DurationStats, FnGauge, FormattedMetric, FormattedSample, LongGauge,
        MetricValue, Noop, Percentile, Props, ReportedMetric, SimpleStats, StringBuffer, TimingHistogram, Value,
        ValueKind,
    },
    error::{ConfigError, ControlError, SinkError},
    format::{Formatter, TemplateFormatter, DEFAULT_TEMPLATE},
    path::ConfigPath,
    plugin::{Params, Plugins},
    registry::CollectorRegistry,
    scheduler::{Reporter, Trigger},
    sink::{LogSink, MemorySink, Sink},
    source::{ArgKey, KeyOrigin, MetricSource, MetricSourceBuilder, Source},
    tags::{TagSet, TagSetBuilder},
    tree::{ConfigTree, FormatterRef, SinkBinding, SinkRef},
};
