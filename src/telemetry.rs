//! Prometheus counters for the sync pipeline

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

use crate::error::Result;

/// Counters updated by the synchronization controller
#[derive(Clone)]
pub struct SyncTelemetry {
    decisions: IntCounterVec,
    requests: IntCounterVec,
    resets: IntCounter,
    publishes: IntCounter,
}

impl SyncTelemetry {
    /// Create unregistered counters
    pub fn new() -> Result<Self> {
        Ok(Self {
            decisions: IntCounterVec::new(
                Opts::new("orderbook_messages_total", "Feed messages by routing decision"),
                &["decision"],
            )?,
            requests: IntCounterVec::new(
                Opts::new("orderbook_requests_total", "Subscribe/unsubscribe requests sent"),
                &["method"],
            )?,
            resets: IntCounter::new("orderbook_resets_total", "Ledger resets")?,
            publishes: IntCounter::new("orderbook_publishes_total", "Views published to readers")?,
        })
    }

    /// Register all counters with `registry`
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.decisions.clone()))?;
        registry.register(Box::new(self.requests.clone()))?;
        registry.register(Box::new(self.resets.clone()))?;
        registry.register(Box::new(self.publishes.clone()))?;
        Ok(())
    }

    pub fn record_decision(&self, label: &str) {
        self.decisions.with_label_values(&[label]).inc();
    }

    pub fn record_request(&self, method: &str) {
        self.requests.with_label_values(&[method]).inc();
    }

    pub fn record_reset(&self) {
        self.resets.inc();
    }

    pub fn record_publish(&self) {
        self.publishes.inc();
    }

    pub fn decisions(&self, label: &str) -> u64 {
        self.decisions.with_label_values(&[label]).get()
    }

    pub fn requests(&self, method: &str) -> u64 {
        self.requests.with_label_values(&[method]).get()
    }

    pub fn publishes(&self) -> u64 {
        self.publishes.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_count() {
        let registry = Registry::new();
        let telemetry = SyncTelemetry::new().unwrap();
        telemetry.register(&registry).unwrap();
        telemetry.record_decision("commit");
        telemetry.record_decision("commit");
        telemetry.record_publish();

        assert_eq!(telemetry.decisions("commit"), 2);
        assert_eq!(telemetry.publishes(), 1);
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"orderbook_messages_total".to_string()));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        let telemetry = SyncTelemetry::new().unwrap();
        telemetry.register(&registry).unwrap();
        assert!(telemetry.register(&registry).is_err());
    }
}
