//! Mapping from PowerDNS statistics to Prometheus metrics.
//!
//! Each daemon role has a fixed table. A table is made of:
//!
//! - metric descriptors: the exposed families (name, help, type, label key, transform);
//! - stat bindings: raw stat name to descriptor, plus the label value that
//!   distinguishes it when several stats share one family;
//! - map bindings: map statistics whose entry names become the label value;
//! - for the recursor, the `answers*` response time histogram.
//!
//! These names are what dashboards and alerts are written against. Do not rename
//! or retype an existing entry.

use std::collections::HashMap;

use powerdns_common::{DaemonType, MapEntry, StatEntry, StatValue};
use tracing::{debug, trace};

/// Prometheus metric type of an exposed family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    /// Get the TYPE comment string for Prometheus exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

/// Numeric conversion applied to a raw value before export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// PowerDNS reports latencies in microseconds; Prometheus wants seconds.
    MicrosToSeconds,
}

impl Transform {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Transform::MicrosToSeconds => value / 1_000_000.0,
        }
    }
}

/// Static description of one exposed metric family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricDescriptor {
    /// Name without the `{namespace}_{role}_` prefix.
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    /// Label key distinguishing stats that collapse onto this family.
    pub label: Option<&'static str>,
    pub transform: Option<Transform>,
}

impl MetricDescriptor {
    const fn counter(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            kind: MetricKind::Counter,
            label: None,
            transform: None,
        }
    }

    const fn gauge(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            kind: MetricKind::Gauge,
            label: None,
            transform: None,
        }
    }

    const fn labelled(mut self, key: &'static str) -> Self {
        self.label = Some(key);
        self
    }

    const fn transformed(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// Binds a plain statistic to a descriptor.
#[derive(Debug, Clone, Copy)]
struct StatBinding {
    stat: &'static str,
    metric: &'static str,
    label_value: Option<&'static str>,
}

const fn bind(stat: &'static str, metric: &'static str) -> StatBinding {
    StatBinding {
        stat,
        metric,
        label_value: None,
    }
}

const fn bind_as(stat: &'static str, metric: &'static str, label_value: &'static str) -> StatBinding {
    StatBinding {
        stat,
        metric,
        label_value: Some(label_value),
    }
}

/// Binds a map statistic to a labelled descriptor.
#[derive(Debug, Clone, Copy)]
struct MapBinding {
    stat: &'static str,
    metric: &'static str,
}

/// Histogram assembled from several per-range counters.
#[derive(Debug, Clone, Copy)]
pub struct HistogramSpec {
    pub name: &'static str,
    pub help: &'static str,
    /// Stat names with their bucket upper bound, in ascending order.
    pub buckets: &'static [(&'static str, f64)],
    /// Stat counting observations above the last bound.
    pub overflow: &'static str,
}

const CPU_HELP: &str = "Number of CPU milliseconds spent in user, and kernel space";

const AUTHORITATIVE_METRICS: &[MetricDescriptor] = &[
    MetricDescriptor::counter("cpu_utilisation", CPU_HELP).labelled("type"),
    MetricDescriptor::gauge(
        "latency_average_seconds",
        "Average number of microseconds a packet spends within PowerDNS",
    )
    .transformed(Transform::MicrosToSeconds),
    MetricDescriptor::gauge("uptime_seconds", "Uptime of the daemon in seconds."),
    MetricDescriptor::counter("queries_total", "Total number of queries by protocol.")
        .labelled("proto"),
    MetricDescriptor::counter("answers_total", "Total number of answers by protocol.")
        .labelled("proto"),
    MetricDescriptor::counter(
        "answer_bytes_total",
        "Total number of answer bytes sent by protocol.",
    )
    .labelled("proto"),
    MetricDescriptor::counter(
        "recursive_queries_total",
        "Total number of recursive queries by status.",
    )
    .labelled("status"),
    MetricDescriptor::counter(
        "update_queries_total",
        "Total number of DNS update queries by status.",
    )
    .labelled("status"),
    MetricDescriptor::counter(
        "packet_cache_lookup",
        "Total number of packet-cache lookups by result.",
    )
    .labelled("result"),
    MetricDescriptor::counter(
        "query_cache_lookup",
        "Total number of query-cache lookups by result.",
    )
    .labelled("result"),
    MetricDescriptor::counter("exceptions_total", "Total number of exceptions by error.")
        .labelled("error"),
    MetricDescriptor::counter(
        "dnssec_signatures_total",
        "Total number of DNSSEC signatures made.",
    ),
    MetricDescriptor::gauge("packet_cache_size", "Number of entries in the packet cache."),
    MetricDescriptor::gauge(
        "signature_cache_size",
        "Number of entries in the signature cache.",
    ),
    MetricDescriptor::gauge("key_cache_size", "Number of entries in the key cache."),
    MetricDescriptor::gauge(
        "metadata_cache_size",
        "Number of entries in the metadata cache.",
    ),
    MetricDescriptor::gauge("qsize", "Number of packets waiting for database attention."),
    MetricDescriptor::gauge(
        "open_tcp_connections",
        "Number of currently open TCP connections.",
    ),
    MetricDescriptor::gauge(
        "security_status",
        "Security status based on the result of security polling.",
    ),
    MetricDescriptor::counter(
        "responses_by_qtype_total",
        "Total number of responses by query type.",
    )
    .labelled("qtype"),
    MetricDescriptor::counter(
        "responses_by_rcode_total",
        "Total number of responses by response code.",
    )
    .labelled("rcode"),
    MetricDescriptor::counter(
        "response_sizes_total",
        "Total number of responses by response size in bytes.",
    )
    .labelled("size"),
];

// Older releases report `sys-msec`/`user-msec`, newer ones the `cpu-` form.
const AUTHORITATIVE_STATS: &[StatBinding] = &[
    bind_as("cpu-sys-msec", "cpu_utilisation", "sys"),
    bind_as("sys-msec", "cpu_utilisation", "sys"),
    bind_as("cpu-user-msec", "cpu_utilisation", "user"),
    bind_as("user-msec", "cpu_utilisation", "user"),
    bind("latency-average", "latency_average_seconds"),
    bind("latency", "latency_average_seconds"),
    bind("uptime", "uptime_seconds"),
    bind_as("udp-queries", "queries_total", "udp"),
    bind_as("tcp-queries", "queries_total", "tcp"),
    bind_as("udp-answers", "answers_total", "udp"),
    bind_as("tcp-answers", "answers_total", "tcp"),
    bind_as("udp-answers-bytes", "answer_bytes_total", "udp"),
    bind_as("tcp-answers-bytes", "answer_bytes_total", "tcp"),
    bind_as("rd-queries", "recursive_queries_total", "requested"),
    bind_as("recursing-questions", "recursive_queries_total", "processed"),
    bind_as("recursing-answers", "recursive_queries_total", "answered"),
    bind_as("recursion-unanswered", "recursive_queries_total", "unanswered"),
    bind_as("dnsupdate-queries", "update_queries_total", "requested"),
    bind_as("dnsupdate-answers", "update_queries_total", "answered"),
    bind_as("dnsupdate-refused", "update_queries_total", "refused"),
    bind_as("dnsupdate-changes", "update_queries_total", "applied"),
    bind_as("packetcache-hit", "packet_cache_lookup", "hit"),
    bind_as("packetcache-miss", "packet_cache_lookup", "miss"),
    bind_as("query-cache-hit", "query_cache_lookup", "hit"),
    bind_as("query-cache-miss", "query_cache_lookup", "miss"),
    bind_as("servfail-packets", "exceptions_total", "servfail"),
    bind_as("timedout-packets", "exceptions_total", "timeout"),
    bind_as("corrupt-packets", "exceptions_total", "corrupt_packet"),
    bind_as("udp-recvbuf-errors", "exceptions_total", "recvbuf_error"),
    bind_as("udp-sndbuf-errors", "exceptions_total", "sndbuf_error"),
    bind_as("udp-in-errors", "exceptions_total", "in_error"),
    bind_as("udp-noport-errors", "exceptions_total", "noport_error"),
    bind("signatures", "dnssec_signatures_total"),
    bind("packetcache-size", "packet_cache_size"),
    bind("signature-cache-size", "signature_cache_size"),
    bind("key-cache-size", "key_cache_size"),
    bind("meta-cache-size", "metadata_cache_size"),
    bind("qsize-q", "qsize"),
    bind("open-tcp-connections", "open_tcp_connections"),
    bind("security-status", "security_status"),
];

const AUTHORITATIVE_MAPS: &[MapBinding] = &[
    MapBinding {
        stat: "response-by-qtype",
        metric: "responses_by_qtype_total",
    },
    MapBinding {
        stat: "response-by-rcode",
        metric: "responses_by_rcode_total",
    },
    MapBinding {
        stat: "response-sizes",
        metric: "response_sizes_total",
    },
];

const RECURSOR_METRICS: &[MetricDescriptor] = &[
    MetricDescriptor::counter("cpu_utilisation", CPU_HELP).labelled("type"),
    MetricDescriptor::gauge(
        "latency_average_seconds",
        "Exponential moving average of question-to-answer latency.",
    )
    .transformed(Transform::MicrosToSeconds),
    MetricDescriptor::gauge("uptime_seconds", "Uptime of the daemon in seconds."),
    MetricDescriptor::counter(
        "incoming_queries_total",
        "Total number of incoming queries by network.",
    )
    .labelled("net"),
    MetricDescriptor::counter(
        "outgoing_queries_total",
        "Total number of outgoing queries by network.",
    )
    .labelled("net"),
    MetricDescriptor::counter("cache_lookups_total", "Total number of cache lookups by result.")
        .labelled("result"),
    MetricDescriptor::counter(
        "packet_cache_lookups_total",
        "Total number of packet-cache lookups by result.",
    )
    .labelled("result"),
    MetricDescriptor::counter(
        "answers_rcodes_total",
        "Total number of answers by response code.",
    )
    .labelled("rcode"),
    MetricDescriptor::counter("exceptions_total", "Total number of exceptions by error.")
        .labelled("error"),
    MetricDescriptor::gauge("concurrent_queries", "Number of concurrent queries."),
    MetricDescriptor::gauge("cache_size", "Number of entries in the cache."),
    MetricDescriptor::gauge("packet_cache_size", "Number of entries in the packet cache."),
    MetricDescriptor::gauge(
        "security_status",
        "Security status based on the result of security polling.",
    ),
    MetricDescriptor::counter(
        "responses_by_qtype_total",
        "Total number of responses by query type.",
    )
    .labelled("qtype"),
];

const RECURSOR_STATS: &[StatBinding] = &[
    bind_as("cpu-sys-msec", "cpu_utilisation", "sys"),
    bind_as("sys-msec", "cpu_utilisation", "sys"),
    bind_as("cpu-user-msec", "cpu_utilisation", "user"),
    bind_as("user-msec", "cpu_utilisation", "user"),
    bind("qa-latency", "latency_average_seconds"),
    bind("uptime", "uptime_seconds"),
    bind_as("questions", "incoming_queries_total", "udp"),
    bind_as("tcp-questions", "incoming_queries_total", "tcp"),
    bind_as("all-outqueries", "outgoing_queries_total", "udp"),
    bind_as("tcp-outqueries", "outgoing_queries_total", "tcp"),
    bind_as("cache-hits", "cache_lookups_total", "hit"),
    bind_as("cache-misses", "cache_lookups_total", "miss"),
    bind_as("packetcache-hits", "packet_cache_lookups_total", "hit"),
    bind_as("packetcache-misses", "packet_cache_lookups_total", "miss"),
    bind_as("noerror-answers", "answers_rcodes_total", "noerror"),
    bind_as("nxdomain-answers", "answers_rcodes_total", "nxdomain"),
    bind_as("servfail-answers", "answers_rcodes_total", "servfail"),
    bind_as("resource-limits", "exceptions_total", "resource_limit"),
    bind_as("over-capacity-drops", "exceptions_total", "over_capacity_drop"),
    bind_as("unreachables", "exceptions_total", "ns_unreachable"),
    bind_as("outgoing-timeouts", "exceptions_total", "outgoing_timeout"),
    bind("concurrent-queries", "concurrent_queries"),
    bind("cache-entries", "cache_size"),
    bind("packetcache-entries", "packet_cache_size"),
    bind("security-status", "security_status"),
];

const RECURSOR_MAPS: &[MapBinding] = &[MapBinding {
    stat: "response-by-qtype",
    metric: "responses_by_qtype_total",
}];

static RECURSOR_RESPONSE_TIME: HistogramSpec = HistogramSpec {
    name: "response_time_seconds",
    help: "Histogram of PowerDNS recursor response times in seconds.",
    buckets: &[
        ("answers0-1", 0.001),
        ("answers1-10", 0.01),
        ("answers10-100", 0.1),
        ("answers100-1000", 1.0),
    ],
    overflow: "answers-slow",
};

/// Where a stat lands in the table.
#[derive(Debug, Clone, Copy)]
struct Target {
    family: usize,
    /// Declaration position, used to order samples within a family.
    order: usize,
    label_value: Option<&'static str>,
}

/// One classified value, ready to be grouped into its family.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedSample {
    /// Index into [`MetricTable::descriptors`].
    pub family: usize,
    /// Sort key within the family: binding position, then map entry position.
    pub order: (usize, usize),
    pub label: Option<(&'static str, String)>,
    pub value: f64,
}

/// Immutable classification table for one daemon role.
#[derive(Debug)]
pub struct MetricTable {
    prefix: String,
    descriptors: &'static [MetricDescriptor],
    stats: HashMap<&'static str, Target>,
    maps: HashMap<&'static str, Target>,
    histogram: Option<&'static HistogramSpec>,
}

impl MetricTable {
    /// Build the table for a daemon role. Metric names are `{namespace}_{role}_{name}`.
    pub fn new(daemon: DaemonType, namespace: &str) -> Self {
        let (descriptors, stat_bindings, map_bindings, histogram) = match daemon {
            DaemonType::Authoritative => {
                (AUTHORITATIVE_METRICS, AUTHORITATIVE_STATS, AUTHORITATIVE_MAPS, None)
            }
            DaemonType::Recursor => (
                RECURSOR_METRICS,
                RECURSOR_STATS,
                RECURSOR_MAPS,
                Some(&RECURSOR_RESPONSE_TIME),
            ),
        };

        let family_of = |metric: &str| descriptors.iter().position(|d| d.name == metric);

        let stats = stat_bindings
            .iter()
            .enumerate()
            .filter_map(|(order, b)| {
                let family = family_of(b.metric)?;
                Some((
                    b.stat,
                    Target {
                        family,
                        order,
                        label_value: b.label_value,
                    },
                ))
            })
            .collect();

        let maps = map_bindings
            .iter()
            .enumerate()
            .filter_map(|(order, b)| {
                let family = family_of(b.metric)?;
                Some((
                    b.stat,
                    Target {
                        family,
                        order,
                        label_value: None,
                    },
                ))
            })
            .collect();

        let prefix = if namespace.is_empty() {
            daemon.as_str().to_string()
        } else {
            format!("{}_{}", namespace, daemon.as_str())
        };

        Self {
            prefix,
            descriptors,
            stats,
            maps,
            histogram,
        }
    }

    /// Prefix shared by every metric of this table, e.g. `powerdns_recursor`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full exposed name for a descriptor or meta-metric suffix.
    pub fn metric_name(&self, suffix: &str) -> String {
        format!("{}_{}", self.prefix, suffix)
    }

    /// Exposed families, in output order.
    pub fn descriptors(&self) -> &'static [MetricDescriptor] {
        self.descriptors
    }

    pub fn histogram(&self) -> Option<&'static HistogramSpec> {
        self.histogram
    }

    /// Classify one stat entry.
    ///
    /// Unknown names and non-numeric values produce no samples.
    pub fn classify(&self, entry: &StatEntry) -> Vec<ClassifiedSample> {
        match &entry.value {
            StatValue::Single(raw) => self
                .classify_single(&entry.name, raw)
                .into_iter()
                .collect(),
            StatValue::Map(entries) => self.classify_map(&entry.name, entries),
        }
    }

    fn classify_single(&self, name: &str, raw: &str) -> Option<ClassifiedSample> {
        let Some(target) = self.stats.get(name) else {
            trace!(stat = name, "Skipping unmapped statistic");
            return None;
        };
        let descriptor = &self.descriptors[target.family];

        let value = parse_value(name, raw)?;
        let value = match descriptor.transform {
            Some(transform) => transform.apply(value),
            None => value,
        };

        let label = descriptor
            .label
            .zip(target.label_value)
            .map(|(key, value)| (key, value.to_string()));

        Some(ClassifiedSample {
            family: target.family,
            order: (target.order, 0),
            label,
            value,
        })
    }

    fn classify_map(&self, name: &str, entries: &[MapEntry]) -> Vec<ClassifiedSample> {
        let Some(target) = self.maps.get(name) else {
            trace!(stat = name, "Skipping unmapped map statistic");
            return Vec::new();
        };
        let descriptor = &self.descriptors[target.family];
        let Some(key) = descriptor.label else {
            return Vec::new();
        };

        entries
            .iter()
            .enumerate()
            .filter_map(|(position, entry)| {
                let value = parse_value(name, &entry.value)?;
                Some(ClassifiedSample {
                    family: target.family,
                    order: (target.order, position),
                    label: Some((key, entry.name.clone())),
                    value,
                })
            })
            .collect()
    }
}

fn parse_value(stat: &str, raw: &str) -> Option<f64> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            debug!(stat, value = raw, "Skipping statistic with non-numeric value");
            None
        }
    }
}

/// Accumulates the per-range counters of a [`HistogramSpec`].
#[derive(Debug)]
pub struct HistogramBuilder {
    spec: &'static HistogramSpec,
    buckets: Vec<Option<f64>>,
    overflow: Option<f64>,
}

/// A finished histogram in Prometheus form.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramValue {
    /// Cumulative counts per upper bound, ascending.
    pub buckets: Vec<(f64, f64)>,
    pub count: f64,
    pub sum: f64,
}

impl HistogramBuilder {
    pub fn new(spec: &'static HistogramSpec) -> Self {
        Self {
            spec,
            buckets: vec![None; spec.buckets.len()],
            overflow: None,
        }
    }

    pub fn spec(&self) -> &'static HistogramSpec {
        self.spec
    }

    /// Record the entry if it is one of the histogram's stats.
    ///
    /// Returns `true` when the entry was consumed.
    pub fn observe(&mut self, entry: &StatEntry) -> bool {
        let StatValue::Single(raw) = &entry.value else {
            return false;
        };

        if entry.name == self.spec.overflow {
            self.overflow = parse_value(&entry.name, raw);
            return true;
        }

        match self
            .spec
            .buckets
            .iter()
            .position(|(stat, _)| *stat == entry.name)
        {
            Some(i) => {
                self.buckets[i] = parse_value(&entry.name, raw);
                true
            }
            None => false,
        }
    }

    /// Build the histogram, or `None` if any of its stats was missing.
    ///
    /// PowerDNS does not report a sum of response times, so `sum` is 0.
    pub fn finish(self) -> Option<HistogramValue> {
        let mut cumulative = 0.0;
        let mut buckets = Vec::with_capacity(self.buckets.len());

        for ((stat, bound), value) in self.spec.buckets.iter().zip(self.buckets) {
            let Some(value) = value else {
                debug!(stat = *stat, "Histogram bucket missing, skipping histogram");
                return None;
            };
            cumulative += value;
            buckets.push((*bound, cumulative));
        }

        let Some(overflow) = self.overflow else {
            debug!(stat = self.spec.overflow, "Histogram overflow missing, skipping histogram");
            return None;
        };

        Some(HistogramValue {
            buckets,
            count: cumulative + overflow,
            sum: 0.0,
        })
    }
}

/// Check a name against `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family_name(table: &MetricTable, sample: &ClassifiedSample) -> String {
        table.metric_name(table.descriptors()[sample.family].name)
    }

    #[test]
    fn test_prefix() {
        let table = MetricTable::new(DaemonType::Authoritative, "powerdns");
        assert_eq!(table.prefix(), "powerdns_authoritative");
        assert_eq!(table.metric_name("up"), "powerdns_authoritative_up");

        let table = MetricTable::new(DaemonType::Recursor, "");
        assert_eq!(table.prefix(), "recursor");
    }

    #[test]
    fn test_cpu_stats_collapse_onto_labelled_counter() {
        let table = MetricTable::new(DaemonType::Authoritative, "powerdns");

        let sys = table.classify(&StatEntry::single("cpu-sys-msec", "1729"));
        let user = table.classify(&StatEntry::single("cpu-user-msec", "1877"));

        assert_eq!(sys.len(), 1);
        assert_eq!(user.len(), 1);
        assert_eq!(sys[0].family, user[0].family);
        assert_eq!(
            family_name(&table, &sys[0]),
            "powerdns_authoritative_cpu_utilisation"
        );
        assert_eq!(sys[0].label, Some(("type", "sys".to_string())));
        assert_eq!(user[0].label, Some(("type", "user".to_string())));
        assert_eq!(sys[0].value, 1729.0);
        assert_eq!(user[0].value, 1877.0);
        assert_eq!(
            table.descriptors()[sys[0].family].kind,
            MetricKind::Counter
        );
    }

    #[test]
    fn test_latency_converted_to_seconds() {
        let table = MetricTable::new(DaemonType::Authoritative, "powerdns");

        let samples = table.classify(&StatEntry::single("latency-average", "1308"));

        assert_eq!(samples.len(), 1);
        let descriptor = &table.descriptors()[samples[0].family];
        assert_eq!(descriptor.kind, MetricKind::Gauge);
        assert_eq!(descriptor.name, "latency_average_seconds");
        assert!((samples[0].value - 0.001308).abs() < 1e-12);
        assert_eq!(samples[0].label, None);
    }

    #[test]
    fn test_recursor_latency_uses_qa_latency() {
        let table = MetricTable::new(DaemonType::Recursor, "powerdns");

        let samples = table.classify(&StatEntry::single("qa-latency", "29478"));

        assert_eq!(samples.len(), 1);
        assert_eq!(
            family_name(&table, &samples[0]),
            "powerdns_recursor_latency_average_seconds"
        );
        assert!((samples[0].value - 0.029478).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_stat_skipped() {
        let table = MetricTable::new(DaemonType::Authoritative, "powerdns");
        assert!(table.classify(&StatEntry::single("x-unknown", "1")).is_empty());
    }

    #[test]
    fn test_role_specific_names() {
        // `questions` is a recursor stat only.
        let auth = MetricTable::new(DaemonType::Authoritative, "powerdns");
        let rec = MetricTable::new(DaemonType::Recursor, "powerdns");

        assert!(auth.classify(&StatEntry::single("questions", "5")).is_empty());
        let samples = rec.classify(&StatEntry::single("questions", "5"));
        assert_eq!(
            family_name(&rec, &samples[0]),
            "powerdns_recursor_incoming_queries_total"
        );
        assert_eq!(samples[0].label, Some(("net", "udp".to_string())));
    }

    #[test]
    fn test_non_numeric_value_skipped() {
        let table = MetricTable::new(DaemonType::Authoritative, "powerdns");
        assert!(table.classify(&StatEntry::single("uptime", "n/a")).is_empty());
    }

    #[test]
    fn test_non_finite_value_skipped() {
        let table = MetricTable::new(DaemonType::Authoritative, "powerdns");
        for raw in ["NaN", "inf", "-inf", "infinity"] {
            assert!(table.classify(&StatEntry::single("uptime", raw)).is_empty());
            assert!(table.classify(&StatEntry::single("cpu-sys-msec", raw)).is_empty());
        }
    }

    #[test]
    fn test_non_finite_histogram_bucket_is_missing() {
        let mut builder = HistogramBuilder::new(&RECURSOR_RESPONSE_TIME);
        assert!(builder.observe(&StatEntry::single("answers0-1", "NaN")));
        for stat in ["answers1-10", "answers10-100", "answers100-1000", "answers-slow"] {
            builder.observe(&StatEntry::single(stat, "1"));
        }
        assert!(builder.finish().is_none());
    }

    #[test]
    fn test_map_statistic_labels_from_entry_names() {
        let table = MetricTable::new(DaemonType::Authoritative, "powerdns");
        let entry = StatEntry {
            name: "response-by-qtype".to_string(),
            value: StatValue::Map(vec![
                MapEntry {
                    name: "A".to_string(),
                    value: "97".to_string(),
                },
                MapEntry {
                    name: "AAAA".to_string(),
                    value: "bogus".to_string(),
                },
                MapEntry {
                    name: "SOA".to_string(),
                    value: "10".to_string(),
                },
            ]),
        };

        let samples = table.classify(&entry);

        assert_eq!(samples.len(), 2);
        assert_eq!(
            family_name(&table, &samples[0]),
            "powerdns_authoritative_responses_by_qtype_total"
        );
        assert_eq!(samples[0].label, Some(("qtype", "A".to_string())));
        assert_eq!(samples[1].label, Some(("qtype", "SOA".to_string())));
        assert!(samples[0].order < samples[1].order);
    }

    #[test]
    fn test_map_value_for_plain_binding_skipped() {
        let table = MetricTable::new(DaemonType::Authoritative, "powerdns");
        let entry = StatEntry {
            name: "uptime".to_string(),
            value: StatValue::Map(vec![]),
        };
        assert!(table.classify(&entry).is_empty());
    }

    #[test]
    fn test_every_binding_resolves() {
        let tables = [
            (AUTHORITATIVE_METRICS, AUTHORITATIVE_STATS, AUTHORITATIVE_MAPS),
            (RECURSOR_METRICS, RECURSOR_STATS, RECURSOR_MAPS),
        ];

        for (metrics, stats, maps) in tables {
            for binding in stats {
                let descriptor = metrics
                    .iter()
                    .find(|d| d.name == binding.metric)
                    .unwrap_or_else(|| panic!("no descriptor for {}", binding.stat));
                assert_eq!(
                    descriptor.label.is_some(),
                    binding.label_value.is_some(),
                    "label mismatch for {}",
                    binding.stat
                );
            }
            for binding in maps {
                let descriptor = metrics
                    .iter()
                    .find(|d| d.name == binding.metric)
                    .unwrap_or_else(|| panic!("no descriptor for {}", binding.stat));
                assert!(descriptor.label.is_some());
            }
        }
    }

    #[test]
    fn test_descriptor_names_are_unique_and_valid() {
        for metrics in [AUTHORITATIVE_METRICS, RECURSOR_METRICS] {
            let mut names: Vec<_> = metrics.iter().map(|d| d.name).collect();
            assert!(names.iter().all(|n| is_valid_metric_name(n)));
            names.sort();
            names.dedup();
            assert_eq!(names.len(), metrics.len());
        }
    }

    #[test]
    fn test_histogram_is_cumulative() {
        let mut builder = HistogramBuilder::new(&RECURSOR_RESPONSE_TIME);
        for (name, value) in [
            ("answers0-1", "177297"),
            ("answers1-10", "5348"),
            ("answers10-100", "29122"),
            ("answers100-1000", "11778"),
            ("answers-slow", "36451"),
        ] {
            assert!(builder.observe(&StatEntry::single(name, value)));
        }
        assert!(!builder.observe(&StatEntry::single("questions", "1")));

        let histogram = builder.finish().unwrap();

        assert_eq!(
            histogram.buckets,
            vec![
                (0.001, 177297.0),
                (0.01, 182645.0),
                (0.1, 211767.0),
                (1.0, 223545.0),
            ]
        );
        assert_eq!(histogram.count, 259996.0);
        assert_eq!(histogram.sum, 0.0);
    }

    #[test]
    fn test_histogram_incomplete() {
        let mut builder = HistogramBuilder::new(&RECURSOR_RESPONSE_TIME);
        builder.observe(&StatEntry::single("answers0-1", "1"));
        builder.observe(&StatEntry::single("answers-slow", "1"));
        assert!(builder.finish().is_none());
    }

    #[test]
    fn test_transform() {
        assert_eq!(Transform::MicrosToSeconds.apply(1_500_000.0), 1.5);
    }

    #[test]
    fn test_is_valid_metric_name() {
        assert!(is_valid_metric_name("powerdns"));
        assert!(is_valid_metric_name("pdns:exporter_1"));
        assert!(!is_valid_metric_name(""));
        assert!(!is_valid_metric_name("1pdns"));
        assert!(!is_valid_metric_name("power-dns"));
    }
}
