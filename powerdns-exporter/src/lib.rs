//! Prometheus metrics exporter for PowerDNS.
//!
//! Every request to the metrics endpoint fetches the statistics of one
//! PowerDNS authoritative server or recursor through its HTTP API, maps them
//! through the table of the daemon's role and renders the result.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  PowerDNS API   │────>│    Exporter     │────>│   HTTP Server   │
//! │ (/statistics)   │     │ (mapping table) │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! The first three families of every scrape are `up`, `scrapes_total` and
//! `json_parse_failures_total`. Stat-derived families follow only when the
//! fetch and decode both succeeded.
//!
//! # Usage
//!
//! ```bash
//! powerdns-exporter --config config.json5
//! powerdns-exporter --api-url http://127.0.0.1:8082/api/v1 --api-key secret
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod collector;
pub mod config;
pub mod http;
pub mod mapping;
pub mod resolver;

pub use collector::{Exporter, MetricFamily, Sample, Scrape, ScrapeStats, SharedExporter};
pub use config::ExporterConfig;
pub use http::HttpServer;
pub use mapping::{MetricKind, MetricTable};
pub use resolver::{ServerInfoResolver, select_daemon_type};
