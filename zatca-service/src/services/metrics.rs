use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static ZATCA_SUBMISSIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static ZATCA_WEBHOOK_EVENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Install the recorder and the service counters. Call once at startup.
pub fn init_metrics() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    if METRICS_HANDLE.set(handle).is_err() {
        panic!("failed to set metrics handle: already initialized");
    }

    let registry = Registry::new();

    let submissions = IntCounterVec::new(
        Opts::new(
            "zatca_submissions_total",
            "ZATCA stage submissions by stage and outcome",
        ),
        &["stage", "outcome"],
    )
    .expect("Failed to create zatca_submissions_total metric");

    let webhook_events = IntCounterVec::new(
        Opts::new(
            "zatca_webhook_events_total",
            "ZATCA status callbacks by mapped sync status",
        ),
        &["sync_status"],
    )
    .expect("Failed to create zatca_webhook_events_total metric");

    registry
        .register(Box::new(submissions.clone()))
        .expect("Failed to register zatca_submissions_total");
    registry
        .register(Box::new(webhook_events.clone()))
        .expect("Failed to register zatca_webhook_events_total");

    PROMETHEUS_REGISTRY
        .set(registry)
        .expect("Failed to set prometheus registry");
    ZATCA_SUBMISSIONS_TOTAL
        .set(submissions)
        .expect("Failed to set zatca_submissions_total");
    ZATCA_WEBHOOK_EVENTS_TOTAL
        .set(webhook_events)
        .expect("Failed to set zatca_webhook_events_total");
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

/// Outcome is `success`, `rejected`, `error` (transport) or `bypassed`.
pub fn record_submission(stage: &str, outcome: &str) {
    if let Some(counter) = ZATCA_SUBMISSIONS_TOTAL.get() {
        counter.with_label_values(&[stage, outcome]).inc();
    }
}

pub fn record_webhook_event(sync_status: &str) {
    if let Some(counter) = ZATCA_WEBHOOK_EVENTS_TOTAL.get() {
        counter.with_label_values(&[sync_status]).inc();
    }
}
