use super::{MetricValue, Value};
use crate::path::ConfigPath;
use std::{collections::BTreeMap, time::SystemTime};

/// One collector's report together with the identity it was reported under.
///
/// This is what formatters consume.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportedMetric {
    pub(crate) path: ConfigPath,
    pub(crate) metric_name: String,
    pub(crate) tags: BTreeMap<String, String>,
    pub(crate) values: Vec<MetricValue>,
}

impl ReportedMetric {
    pub fn new(
        path: ConfigPath, metric_name: String, tags: BTreeMap<String, String>, values: Vec<MetricValue>,
    ) -> ReportedMetric {
        ReportedMetric {
            path,
            metric_name,
            tags,
            values,
        }
    }

    /// The path of the container the collector lives in.
    pub fn path(&self) -> &ConfigPath { &self.path }

    /// Explicit `metric_name` for the path, or the dotted path.
    pub fn metric_name(&self) -> &str { &self.metric_name }

    /// Configured tags for the path merged with the collector's identity tags.
    pub fn tags(&self) -> &BTreeMap<String, String> { &self.tags }

    pub fn values(&self) -> &[MetricValue] { &self.values }
}

/// A single named value ready for a sink.
#[derive(Clone, Debug, PartialEq)]
pub struct FormattedSample {
    pub name: String,
    pub value: Value,
    pub timestamp: SystemTime,
}

/// A reported metric after a formatter has named each of its values.
#[derive(Clone, Debug, PartialEq)]
pub struct FormattedMetric {
    pub tags: BTreeMap<String, String>,
    pub samples: Vec<FormattedSample>,
}

impl FormattedMetric {
    /// Looks up the first sample with the given formatted name.
    pub fn sample(&self, name: &str) -> Option<&FormattedSample> { self.samples.iter().find(|s| s.name == name) }
}
