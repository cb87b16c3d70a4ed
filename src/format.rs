use crate::data::{FormattedMetric, FormattedSample, ReportedMetric};

/// Turns a raw reported metric into the representation a sink consumes.
pub trait Formatter: Send + Sync {
    fn format(&self, metric: &ReportedMetric) -> FormattedMetric;
}

/// Names every value of a metric by expanding a template.
///
/// Supported placeholders:
/// - `%{metricName}`: the explicit metric name, or the dotted path
/// - `%{field}`: the reported field (`count`, `max`, `gauge`, ...)
/// - `%{path}`: the dotted path
/// - `%{source}`: the path without its last segment
/// - `%{method}`: the last segment of the path
#[derive(Clone, Debug)]
pub struct TemplateFormatter {
    template: String,
}

pub const DEFAULT_TEMPLATE: &str = "%{metricName}.%{field}";

impl TemplateFormatter {
    pub fn new<S: Into<String>>(template: S) -> TemplateFormatter {
        TemplateFormatter {
            template: template.into(),
        }
    }

    fn name(&self, metric: &ReportedMetric, field: &str) -> String {
        let path = metric.path();
        self.template
            .replace("%{metricName}", metric.metric_name())
            .replace("%{field}", field)
            .replace("%{path}", &path.to_string())
            .replace("%{source}", &path.parent().to_string())
            .replace("%{method}", path.leaf().unwrap_or(""))
    }
}

impl Default for TemplateFormatter {
    fn default() -> TemplateFormatter { TemplateFormatter::new(DEFAULT_TEMPLATE) }
}

impl Formatter for TemplateFormatter {
    fn format(&self, metric: &ReportedMetric) -> FormattedMetric {
        let samples = metric
            .values()
            .iter()
            .map(|mv| FormattedSample {
                name: self.name(metric, mv.field()),
                value: mv.value().clone(),
                timestamp: mv.timestamp(),
            })
            .collect();

        FormattedMetric {
            tags: metric.tags().clone(),
            samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Formatter, TemplateFormatter};
    use crate::{
        data::{MetricValue, ReportedMetric, Value},
        path::ConfigPath,
    };
    use std::{collections::BTreeMap, time::UNIX_EPOCH};

    fn reported(metric_name: &str) -> ReportedMetric {
        let mut tags = BTreeMap::new();
        tags.insert("host".to_owned(), "a".to_owned());
        ReportedMetric::new(
            ConfigPath::parse("org.example.Client.reportSize").unwrap(),
            metric_name.to_owned(),
            tags,
            vec![
                MetricValue::new("count", Value::Long(4), UNIX_EPOCH),
                MetricValue::new("max", Value::Long(9), UNIX_EPOCH),
            ],
        )
    }

    #[test]
    fn test_default_template() {
        let formatted = TemplateFormatter::default().format(&reported("org.example.Client.reportSize"));
        assert_eq!(formatted.samples.len(), 2);
        assert_eq!(formatted.samples[0].name, "org.example.Client.reportSize.count");
        assert_eq!(formatted.samples[1].value, Value::Long(9));
        assert_eq!(formatted.tags.get("host").map(String::as_str), Some("a"));
    }

    #[test]
    fn test_template_placeholders() {
        let formatter = TemplateFormatter::new("app.%{method}-%{field} (%{source})");
        let formatted = formatter.format(&reported("size"));
        assert_eq!(formatted.samples[0].name, "app.reportSize-count (org.example.Client)");

        let formatter = TemplateFormatter::new("%{metricName}_%{field}");
        assert_eq!(formatter.format(&reported("size")).samples[1].name, "size_max");
    }
}
