use crate::{data::ValueKind, path::ConfigPath};
use std::io;
use thiserror::Error;

/// Errors raised while loading configuration or wiring a call site to a collector.
///
/// Every variant indicates a wiring mistake rather than a transient condition, so none of them
/// are retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document has no `sources` root.
    #[error("no 'sources' element in the configuration")]
    MissingSources,

    /// A source name or dotted path contained an empty segment.
    #[error("malformed path '{0}'")]
    MalformedPath(String),

    /// A path referenced a sink that was never declared.
    #[error("path '{path}' references undeclared sink '{name}'")]
    UnknownSink { path: ConfigPath, name: String },

    /// A path referenced a formatter that was never declared.
    #[error("path '{path}' references undeclared formatter '{name}'")]
    UnknownFormatter { path: ConfigPath, name: String },

    /// A path referenced a trigger that was never declared.
    #[error("path '{path}' references undeclared trigger '{name}'")]
    UnknownTrigger { path: ConfigPath, name: String },

    /// A path referenced a collector template that was never declared.
    #[error("path '{path}' references undeclared collector '{name}'")]
    UnknownCollector { path: ConfigPath, name: String },

    /// Two declarations of the same kind share a name.
    #[error("{kind} '{name}' is declared more than once")]
    DuplicateName { kind: &'static str, name: String },

    /// A declaration named a plugin type no factory is registered for.
    #[error("no {kind} factory registered for type '{type_name}' (declared as '{name}')")]
    UnknownType {
        kind: &'static str,
        name: String,
        type_name: String,
    },

    /// A plugin parameter was missing or could not be parsed.
    #[error("invalid parameter '{param}' for '{name}': {reason}")]
    InvalidParam {
        name: String,
        param: String,
        reason: String,
    },

    /// A metric source declaration was rejected at registration.
    #[error("invalid source '{source_name}': {reason}")]
    InvalidSource { source_name: String, reason: String },

    /// A call named a method the source never declared.
    #[error("source '{source_name}' has no method '{method}'")]
    UnknownMethod { source_name: String, method: String },

    /// A call supplied a different number of arguments than the method declares tag keys.
    #[error("method '{path}' declares {expected} tag keys but was called with {actual} arguments")]
    MissingTagKey {
        path: ConfigPath,
        expected: usize,
        actual: usize,
    },

    /// The collector bound to a path cannot accept the value shape its call site produces.
    #[error("collector bound at '{path}' does not accept {kind} values")]
    IncompatibleCollector { path: ConfigPath, kind: ValueKind },

    /// A call site produced a value shape other than the one it declared.
    #[error("method '{path}' declared {expected} values but was given {actual}")]
    ValueKindMismatch {
        path: ConfigPath,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// The JSON rendering of a document could not be parsed.
    #[error("unable to parse configuration document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors a sink can return while accepting or closing.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink's underlying resource failed.
    #[error("sink i/o failure: {0}")]
    Io(#[from] io::Error),

    /// The sink has already been closed.
    #[error("sink is closed")]
    Closed,

    /// The sink refused the metric.
    #[error("sink rejected metric: {0}")]
    Rejected(String),
}

/// Errors when driving the scheduler from outside.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The trigger is not declared in the configuration.
    #[error("unknown trigger '{0}'")]
    UnknownTrigger(String),

    /// The scheduler has shut down.
    #[error("scheduler is no longer running")]
    Stopped,
}
