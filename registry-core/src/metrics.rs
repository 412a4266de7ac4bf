//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring a registry node.
//!
//! # Metrics
//!
//! - `registry_recipients_added_total` - Recipients admitted
//! - `registry_recipients_removed_total` - Recipients tombstoned
//! - `registry_requests_submitted_total` - Deposit-backed requests opened
//! - `registry_requests_executed_total` - Requests executed
//! - `registry_requests_rejected_total` - Requests challenged
//! - `registry_active_recipients` - Occupied slots
//! - `registry_deposits_held` - Deposits backing open requests
//! - `registry_transaction_duration_seconds` - Sequencer transaction latency

use crate::events::RegistryEvent;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Recipients admitted
    pub recipients_added: IntCounter,

    /// Recipients tombstoned
    pub recipients_removed: IntCounter,

    /// Requests opened
    pub requests_submitted: IntCounter,

    /// Requests executed
    pub requests_executed: IntCounter,

    /// Requests challenged
    pub requests_rejected: IntCounter,

    /// Occupied slots
    pub active_recipients: IntGauge,

    /// Deposits backing open requests
    pub deposits_held: Gauge,

    /// Transaction latency histogram
    pub transaction_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("recipients_added", &self.recipients_added.get())
            .field("recipients_removed", &self.recipients_removed.get())
            .field("active_recipients", &self.active_recipients.get())
            .field("deposits_held", &self.deposits_held.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let recipients_added = IntCounter::new(
            "registry_recipients_added_total",
            "Total number of recipients admitted",
        )?;
        registry.register(Box::new(recipients_added.clone()))?;

        let recipients_removed = IntCounter::new(
            "registry_recipients_removed_total",
            "Total number of recipients removed",
        )?;
        registry.register(Box::new(recipients_removed.clone()))?;

        let requests_submitted = IntCounter::new(
            "registry_requests_submitted_total",
            "Total number of deposit-backed requests opened",
        )?;
        registry.register(Box::new(requests_submitted.clone()))?;

        let requests_executed = IntCounter::new(
            "registry_requests_executed_total",
            "Total number of requests executed",
        )?;
        registry.register(Box::new(requests_executed.clone()))?;

        let requests_rejected = IntCounter::new(
            "registry_requests_rejected_total",
            "Total number of requests challenged",
        )?;
        registry.register(Box::new(requests_rejected.clone()))?;

        let active_recipients = IntGauge::with_opts(Opts::new(
            "registry_active_recipients",
            "Number of occupied recipient slots",
        ))?;
        registry.register(Box::new(active_recipients.clone()))?;

        let deposits_held = Gauge::with_opts(Opts::new(
            "registry_deposits_held",
            "Deposits backing open requests",
        ))?;
        registry.register(Box::new(deposits_held.clone()))?;

        let transaction_duration = Histogram::with_opts(
            HistogramOpts::new(
                "registry_transaction_duration_seconds",
                "Histogram of sequencer transaction latencies",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500]),
        )?;
        registry.register(Box::new(transaction_duration.clone()))?;

        Ok(Self {
            recipients_added,
            recipients_removed,
            requests_submitted,
            requests_executed,
            requests_rejected,
            active_recipients,
            deposits_held,
            transaction_duration,
            registry,
        })
    }

    /// Count a committed event
    pub fn record_event(&self, event: &RegistryEvent) {
        match event {
            RegistryEvent::RecipientAdded { .. } => self.recipients_added.inc(),
            RegistryEvent::RecipientRemoved { .. } => self.recipients_removed.inc(),
            RegistryEvent::RequestSubmitted { .. } => self.requests_submitted.inc(),
            RegistryEvent::RequestResolved { rejected: true, .. } => self.requests_rejected.inc(),
            RegistryEvent::RequestResolved { rejected: false, .. } => self.requests_executed.inc(),
        }
    }

    /// Update occupied slot count
    pub fn set_active_recipients(&self, count: u64) {
        self.active_recipients.set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Update held deposits
    pub fn set_deposits_held(&self, amount: f64) {
        self.deposits_held.set(amount);
    }

    /// Record transaction duration
    pub fn record_transaction_duration(&self, duration_seconds: f64) {
        self.transaction_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn encode_text(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
