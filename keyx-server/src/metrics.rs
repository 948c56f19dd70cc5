//! Prometheus Metrics

use prometheus::{IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters exported on `/metrics`.
#[derive(Clone)]
pub struct ServerMetrics {
    registry: Registry,
    pub requests_created: IntCounter,
    pub requests_confirmed: IntCounter,
    pub requests_declined: IntCounter,
    pub parameters_submitted: IntCounter,
    /// Failed calls, labelled by error code.
    pub rejected_calls: IntCounterVec,
}

impl ServerMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_created = IntCounter::new(
            "keyx_exchange_requests_created_total",
            "Key exchange requests opened",
        )?;
        let requests_confirmed = IntCounter::new(
            "keyx_exchange_requests_confirmed_total",
            "Key exchange requests confirmed by the receiver",
        )?;
        let requests_declined = IntCounter::new(
            "keyx_exchange_requests_declined_total",
            "Key exchange requests declined by the receiver",
        )?;
        let parameters_submitted = IntCounter::new(
            "keyx_dh_parameters_submitted_total",
            "Diffie-Hellman parameter sets accepted",
        )?;
        let rejected_calls = IntCounterVec::new(
            Opts::new("keyx_rejected_calls_total", "Calls rejected with an error"),
            &["code"],
        )?;

        registry.register(Box::new(requests_created.clone()))?;
        registry.register(Box::new(requests_confirmed.clone()))?;
        registry.register(Box::new(requests_declined.clone()))?;
        registry.register(Box::new(parameters_submitted.clone()))?;
        registry.register(Box::new(rejected_calls.clone()))?;

        Ok(ServerMetrics {
            registry,
            requests_created,
            requests_confirmed,
            requests_declined,
            parameters_submitted,
            rejected_calls,
        })
    }

    /// Renders all metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_counters() {
        let metrics = ServerMetrics::new().unwrap();
        metrics.requests_created.inc();
        metrics
            .rejected_calls
            .with_label_values(&["SelfExchange"])
            .inc();

        let text = metrics.encode().unwrap();
        assert!(text.contains("keyx_exchange_requests_created_total 1"));
        assert!(text.contains("code=\"SelfExchange\""));
    }
}
