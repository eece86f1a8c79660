//! Scrape orchestration and Prometheus text rendering.

use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use powerdns_common::{PdnsClient, Result, ServerInfo, StatEntry, decode_statistics};
use tracing::{debug, trace, warn};

use crate::config::FilterConfig;
use crate::mapping::{ClassifiedSample, HistogramBuilder, MetricKind, MetricTable};
use crate::resolver::ServerInfoResolver;

const UP_HELP: &str = "Was the last scrape of PowerDNS successful.";
const SCRAPES_HELP: &str = "Current total PowerDNS scrapes.";
const PARSE_FAILURES_HELP: &str = "Number of errors while parsing PowerDNS JSON stats.";
const SERVER_INFO_HELP: &str = "PowerDNS server identity as reported by the API.";

/// One exposed sample of a family.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Appended to the family name (`_bucket`, `_sum`, `_count` for histograms).
    pub suffix: &'static str,
    pub labels: Vec<(&'static str, String)>,
    pub value: f64,
}

impl Sample {
    fn plain(value: f64) -> Self {
        Self {
            suffix: "",
            labels: Vec::new(),
            value,
        }
    }
}

/// A metric family with its samples, in output order.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub help: &'static str,
    pub kind: MetricKind,
    pub samples: Vec<Sample>,
}

impl MetricFamily {
    fn single(name: String, help: &'static str, kind: MetricKind, value: f64) -> Self {
        Self {
            name,
            help,
            kind,
            samples: vec![Sample::plain(value)],
        }
    }
}

/// The metric stream produced by one scrape.
///
/// The first three families are always `up`, `scrapes_total` and
/// `json_parse_failures_total`, in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct Scrape {
    pub families: Vec<MetricFamily>,
}

impl Scrape {
    /// Whether fetch and decode both succeeded.
    pub fn is_up(&self) -> bool {
        self.families
            .first()
            .and_then(|f| f.samples.first())
            .is_some_and(|s| s.value == 1.0)
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut output = String::with_capacity(self.families.len() * 128);

        for family in &self.families {
            writeln!(output, "# HELP {} {}", family.name, escape_help(family.help)).ok();
            writeln!(output, "# TYPE {} {}", family.name, family.kind.as_str()).ok();

            for sample in &family.samples {
                writeln!(
                    output,
                    "{}{}{} {}",
                    family.name,
                    sample.suffix,
                    format_labels(&sample.labels),
                    format_value(sample.value)
                )
                .ok();
            }
        }

        output
    }
}

/// Scrape-level state shared by concurrent scrapes.
#[derive(Debug, Default)]
pub struct ScrapeState {
    up: AtomicBool,
    scrapes_total: AtomicU64,
    json_parse_failures: AtomicU64,
}

/// Point-in-time copy of [`ScrapeState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeStats {
    pub up: bool,
    pub scrapes_total: u64,
    pub json_parse_failures: u64,
}

impl ScrapeState {
    pub fn snapshot(&self) -> ScrapeStats {
        ScrapeStats {
            up: self.up.load(Ordering::Relaxed),
            scrapes_total: self.scrapes_total.load(Ordering::Relaxed),
            json_parse_failures: self.json_parse_failures.load(Ordering::Relaxed),
        }
    }
}

/// Glob filter on exposed family names.
pub struct MetricFilter {
    include_metrics: Vec<glob::Pattern>,
    exclude_metrics: Vec<glob::Pattern>,
}

impl MetricFilter {
    /// Create a new filter from configuration.
    ///
    /// Invalid patterns are ignored; [`crate::ExporterConfig::validate`] rejects them.
    pub fn new(config: &FilterConfig) -> Self {
        let compile = |patterns: &[String]| {
            patterns
                .iter()
                .filter_map(|p| glob::Pattern::new(p).ok())
                .collect()
        };

        Self {
            include_metrics: compile(&config.include_metrics),
            exclude_metrics: compile(&config.exclude_metrics),
        }
    }

    /// Check if a family should be exported.
    pub fn should_include(&self, name: &str) -> bool {
        if !self.include_metrics.is_empty() && !self.include_metrics.iter().any(|p| p.matches(name))
        {
            return false;
        }
        !self.exclude_metrics.iter().any(|p| p.matches(name))
    }
}

/// Runs scrapes against one PowerDNS server.
pub struct Exporter {
    client: PdnsClient,
    table: MetricTable,
    resolver: Arc<ServerInfoResolver>,
    filter: MetricFilter,
    state: ScrapeState,
}

/// Create a shareable exporter handle.
pub type SharedExporter = Arc<Exporter>;

impl Exporter {
    /// Create an exporter using `table` for classification.
    pub fn new(
        client: PdnsClient,
        table: MetricTable,
        resolver: Arc<ServerInfoResolver>,
        filters: &FilterConfig,
    ) -> Self {
        Self {
            client,
            table,
            resolver,
            filter: MetricFilter::new(filters),
            state: ScrapeState::default(),
        }
    }

    pub fn resolver(&self) -> &Arc<ServerInfoResolver> {
        &self.resolver
    }

    /// Get scrape statistics.
    pub fn stats(&self) -> ScrapeStats {
        self.state.snapshot()
    }

    /// Run one scrape.
    ///
    /// Never fails: fetch and decode errors are reported through `up` and the
    /// scrape counters, and no stat-derived metrics are emitted in that case.
    pub async fn scrape(&self) -> Scrape {
        let scrapes_total = self.state.scrapes_total.fetch_add(1, Ordering::Relaxed) + 1;

        let entries = match self.fetch_and_decode().await {
            Ok(entries) => Some(entries),
            Err(e) => {
                if e.is_parse() {
                    self.state.json_parse_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "Failed to decode PowerDNS statistics");
                } else {
                    warn!(error = %e, "Failed to fetch PowerDNS statistics");
                }
                None
            }
        };

        let up = entries.is_some();
        self.state.up.store(up, Ordering::Relaxed);

        let mut families = vec![
            MetricFamily::single(
                self.table.metric_name("up"),
                UP_HELP,
                MetricKind::Gauge,
                if up { 1.0 } else { 0.0 },
            ),
            MetricFamily::single(
                self.table.metric_name("scrapes_total"),
                SCRAPES_HELP,
                MetricKind::Counter,
                scrapes_total as f64,
            ),
            MetricFamily::single(
                self.table.metric_name("json_parse_failures_total"),
                PARSE_FAILURES_HELP,
                MetricKind::Counter,
                self.state.json_parse_failures.load(Ordering::Relaxed) as f64,
            ),
        ];

        if let Some(entries) = entries {
            families.extend(self.classify_all(&entries));
            if let Some(info) = self.resolver.cached() {
                families.push(self.server_info_family(&info));
            }
        }

        debug!(up, families = families.len(), "Scrape finished");
        Scrape { families }
    }

    async fn fetch_and_decode(&self) -> Result<Vec<StatEntry>> {
        let body = self.client.fetch_statistics().await?;
        let entries = decode_statistics(&body)?;
        trace!(stats = entries.len(), "Decoded PowerDNS statistics");
        Ok(entries)
    }

    /// Turn decoded stats into families, in table order.
    fn classify_all(&self, entries: &[StatEntry]) -> Vec<MetricFamily> {
        let descriptors = self.table.descriptors();
        let mut grouped: Vec<Vec<ClassifiedSample>> = vec![Vec::new(); descriptors.len()];
        let mut histogram = self.table.histogram().map(HistogramBuilder::new);

        for entry in entries {
            if let Some(builder) = histogram.as_mut() {
                if builder.observe(entry) {
                    continue;
                }
            }
            for sample in self.table.classify(entry) {
                grouped[sample.family].push(sample);
            }
        }

        let mut families = Vec::with_capacity(descriptors.len() + 1);

        for (descriptor, mut samples) in descriptors.iter().zip(grouped) {
            if samples.is_empty() {
                continue;
            }
            let name = self.table.metric_name(descriptor.name);
            if !self.filter.should_include(&name) {
                trace!(metric = %name, "Metric filtered out");
                continue;
            }

            samples.sort_by_key(|s| s.order);
            let mut seen = HashSet::new();
            samples.retain(|s| seen.insert(s.label.clone()));

            families.push(MetricFamily {
                name,
                help: descriptor.help,
                kind: descriptor.kind,
                samples: samples
                    .into_iter()
                    .map(|s| Sample {
                        suffix: "",
                        labels: s.label.into_iter().collect(),
                        value: s.value,
                    })
                    .collect(),
            });
        }

        if let Some(builder) = histogram {
            let spec = builder.spec();
            let name = self.table.metric_name(spec.name);
            if self.filter.should_include(&name) {
                if let Some(value) = builder.finish() {
                    let mut samples: Vec<Sample> = value
                        .buckets
                        .iter()
                        .map(|(bound, count)| Sample {
                            suffix: "_bucket",
                            labels: vec![("le", format_value(*bound))],
                            value: *count,
                        })
                        .collect();
                    samples.push(Sample {
                        suffix: "_bucket",
                        labels: vec![("le", "+Inf".to_string())],
                        value: value.count,
                    });
                    samples.push(Sample {
                        suffix: "_sum",
                        labels: Vec::new(),
                        value: value.sum,
                    });
                    samples.push(Sample {
                        suffix: "_count",
                        labels: Vec::new(),
                        value: value.count,
                    });

                    families.push(MetricFamily {
                        name,
                        help: spec.help,
                        kind: MetricKind::Histogram,
                        samples,
                    });
                }
            }
        }

        families
    }

    fn server_info_family(&self, info: &ServerInfo) -> MetricFamily {
        MetricFamily {
            name: self.table.metric_name("server_info"),
            help: SERVER_INFO_HELP,
            kind: MetricKind::Gauge,
            samples: vec![Sample {
                suffix: "",
                labels: vec![
                    ("daemon_type", info.daemon_type.clone()),
                    ("id", info.id.clone()),
                    ("version", info.version.clone()),
                ],
                value: 1.0,
            }],
        }
    }
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape help text; quotes are allowed there.
fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Format labels for Prometheus exposition format.
fn format_labels(labels: &[(&'static str, String)]) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    format!("{{{}}}", parts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use powerdns_common::{ApiConfig, DaemonType};

    fn exporter(daemon: DaemonType, filters: FilterConfig) -> Exporter {
        let client = PdnsClient::new(&ApiConfig::default()).unwrap();
        let resolver = Arc::new(ServerInfoResolver::new(client.clone()));
        Exporter::new(
            client,
            MetricTable::new(daemon, "powerdns"),
            resolver,
            &filters,
        )
    }

    fn stats(pairs: &[(&str, &str)]) -> Vec<StatEntry> {
        pairs
            .iter()
            .map(|(name, value)| StatEntry::single(*name, *value))
            .collect()
    }

    #[test]
    fn test_classify_all_follows_table_order() {
        let exporter = exporter(DaemonType::Authoritative, FilterConfig::default());
        let entries = stats(&[
            ("udp-queries", "138"),
            ("cpu-user-msec", "1877"),
            ("latency-average", "1308"),
            ("cpu-sys-msec", "1729"),
        ]);

        let families = exporter.classify_all(&entries);
        let names: Vec<&str> = families.iter().map(|f| f.name.as_str()).collect();

        assert_eq!(
            names,
            vec![
                "powerdns_authoritative_cpu_utilisation",
                "powerdns_authoritative_latency_average_seconds",
                "powerdns_authoritative_queries_total",
            ]
        );
        // sys is declared before user
        assert_eq!(families[0].samples[0].labels, vec![("type", "sys".to_string())]);
        assert_eq!(families[0].samples[1].labels, vec![("type", "user".to_string())]);
    }

    #[test]
    fn test_classify_all_is_deterministic() {
        let exporter = exporter(DaemonType::Recursor, FilterConfig::default());
        let entries = stats(&[
            ("cache-misses", "2"),
            ("questions", "10"),
            ("cache-hits", "1"),
            ("tcp-questions", "3"),
        ]);
        let mut reversed = entries.clone();
        reversed.reverse();

        assert_eq!(exporter.classify_all(&entries), exporter.classify_all(&reversed));
    }

    #[test]
    fn test_duplicate_sources_keep_first_binding() {
        let exporter = exporter(DaemonType::Authoritative, FilterConfig::default());
        let entries = stats(&[("latency", "2000"), ("latency-average", "1308")]);

        let families = exporter.classify_all(&entries);

        assert_eq!(families.len(), 1);
        assert_eq!(families[0].samples.len(), 1);
        assert!((families[0].samples[0].value - 0.001308).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_and_malformed_stats_dropped() {
        let exporter = exporter(DaemonType::Authoritative, FilterConfig::default());
        let entries = stats(&[("x-unknown", "1"), ("uptime", "later"), ("qsize-q", "4")]);

        let families = exporter.classify_all(&entries);

        assert_eq!(families.len(), 1);
        assert_eq!(families[0].name, "powerdns_authoritative_qsize");
    }

    #[test]
    fn test_filter_excludes_family() {
        let filters = FilterConfig {
            exclude_metrics: vec!["*_cpu_*".to_string()],
            ..Default::default()
        };
        let exporter = exporter(DaemonType::Authoritative, filters);
        let entries = stats(&[("cpu-sys-msec", "1"), ("uptime", "5")]);

        let families = exporter.classify_all(&entries);

        assert_eq!(families.len(), 1);
        assert_eq!(families[0].name, "powerdns_authoritative_uptime_seconds");
    }

    #[test]
    fn test_metric_filter_include() {
        let filter = MetricFilter::new(&FilterConfig {
            include_metrics: vec!["powerdns_recursor_cache_*".to_string()],
            ..Default::default()
        });

        assert!(filter.should_include("powerdns_recursor_cache_size"));
        assert!(!filter.should_include("powerdns_recursor_uptime_seconds"));
    }

    #[test]
    fn test_recursor_histogram_rendered() {
        let exporter = exporter(DaemonType::Recursor, FilterConfig::default());
        let entries = stats(&[
            ("answers0-1", "10"),
            ("answers1-10", "5"),
            ("answers10-100", "3"),
            ("answers100-1000", "1"),
            ("answers-slow", "1"),
        ]);

        let families = exporter.classify_all(&entries);
        let scrape = Scrape { families };
        let output = scrape.render();

        assert!(output.contains("# TYPE powerdns_recursor_response_time_seconds histogram"));
        assert!(output.contains("powerdns_recursor_response_time_seconds_bucket{le=\"0.001\"} 10"));
        assert!(output.contains("powerdns_recursor_response_time_seconds_bucket{le=\"1\"} 19"));
        assert!(output.contains("powerdns_recursor_response_time_seconds_bucket{le=\"+Inf\"} 20"));
        assert!(output.contains("powerdns_recursor_response_time_seconds_sum 0"));
        assert!(output.contains("powerdns_recursor_response_time_seconds_count 20"));
    }

    #[test]
    fn test_render_help_and_type() {
        let scrape = Scrape {
            families: vec![MetricFamily {
                name: "powerdns_authoritative_cpu_utilisation".to_string(),
                help: "Number of CPU milliseconds spent in user, and kernel space",
                kind: MetricKind::Counter,
                samples: vec![
                    Sample {
                        suffix: "",
                        labels: vec![("type", "sys".to_string())],
                        value: 1729.0,
                    },
                    Sample {
                        suffix: "",
                        labels: vec![("type", "user".to_string())],
                        value: 1877.0,
                    },
                ],
            }],
        };

        assert_eq!(
            scrape.render(),
            "# HELP powerdns_authoritative_cpu_utilisation Number of CPU milliseconds spent in user, and kernel space\n\
             # TYPE powerdns_authoritative_cpu_utilisation counter\n\
             powerdns_authoritative_cpu_utilisation{type=\"sys\"} 1729\n\
             powerdns_authoritative_cpu_utilisation{type=\"user\"} 1877\n"
        );
    }

    #[test]
    fn test_escape_label_value() {
        assert_eq!(escape_label_value("simple"), "simple");
        assert_eq!(escape_label_value("with\"quote"), "with\\\"quote");
        assert_eq!(escape_label_value("with\\backslash"), "with\\\\backslash");
        assert_eq!(escape_label_value("with\nnewline"), "with\\nnewline");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(0.001308), "0.001308");
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
    }

    #[test]
    fn test_format_labels() {
        assert_eq!(format_labels(&[]), "");
        assert_eq!(
            format_labels(&[("a", "1".to_string()), ("b", "2".to_string())]),
            "{a=\"1\",b=\"2\"}"
        );
    }
}
