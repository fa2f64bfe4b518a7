// Prometheus metrics definitions for the HP bot.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Counters ─────────────────────────────────────────────────────

    /// Commands handled, by command name and outcome (ok, rejected, failed).
    pub static ref COMMANDS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("hp_commands_total", "Slash commands handled"),
        &["command", "outcome"],
    )
    .unwrap();

    /// Player rows deleted by the listing because the member left or had no HP.
    pub static ref RECORDS_PRUNED_TOTAL: IntCounter = IntCounter::new(
        "hp_records_pruned_total",
        "Player rows pruned while listing",
    )
    .unwrap();

    /// Interaction requests refused before dispatch, by reason.
    pub static ref INTERACTIONS_REJECTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("hp_interactions_rejected_total", "Interaction requests refused"),
        &["reason"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Time spent executing a command, by command name.
    pub static ref COMMAND_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("hp_command_duration_seconds", "Command execution time in seconds")
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
        &["command"],
    )
    .unwrap();
}

static REGISTER: Once = Once::new();

/// Register all metrics with the custom registry. Safe to call repeatedly.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(COMMANDS_TOTAL.clone()),
            Box::new(RECORDS_PRUNED_TOTAL.clone()),
            Box::new(INTERACTIONS_REJECTED_TOTAL.clone()),
            Box::new(COMMAND_DURATION_SECONDS.clone()),
        ];

        for c in collectors {
            REGISTRY.register(c).expect("failed to register metric");
        }
    });
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
