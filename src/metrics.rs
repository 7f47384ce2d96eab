use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Opts, Registry, TextEncoder};

/// Metric name prefix for all contacts metrics
const PREFIX: &str = "contacts";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref JOURNALS_COMMITTED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_journals_committed_total"),
        "Journals written by a save"
    ).expect("Failed to create journals_committed_total metric");

    pub static ref JOURNALS_DISCARDED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_journals_discarded_total"),
            "Pending journals that were not written"
        ),
        &["reason"]
    ).expect("Failed to create journals_discarded_total metric");

    pub static ref QUERY_FAILURES_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_query_failures_total"),
        "Contact queries rejected or failed while executing"
    ).expect("Failed to create query_failures_total metric");
}

/// Registers every metric. Safe to call more than once.
pub fn init_metrics() {
    let _ = REGISTRY.register(Box::new(JOURNALS_COMMITTED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(JOURNALS_DISCARDED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(QUERY_FAILURES_TOTAL.clone()));
}

pub fn record_journal_committed() {
    JOURNALS_COMMITTED_TOTAL.inc();
}

/// `reason` is `empty` when nothing changed, `rolled_back` when the save failed.
pub fn record_journal_discarded(reason: &str) {
    JOURNALS_DISCARDED_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_query_failure() {
    QUERY_FAILURES_TOTAL.inc();
}

/// Text exposition of the registry.
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_all_counters() {
        init_metrics();
        record_journal_committed();
        record_journal_discarded("empty");
        record_query_failure();

        let names: Vec<String> = REGISTRY
            .gather()
            .iter()
            .map(|m| m.get_name().to_string())
            .collect();
        assert!(names.contains(&"contacts_journals_committed_total".to_string()));
        assert!(names.contains(&"contacts_journals_discarded_total".to_string()));
        assert!(names.contains(&"contacts_query_failures_total".to_string()));
    }

    #[test]
    fn init_is_idempotent() {
        init_metrics();
        init_metrics();
        record_journal_discarded("rolled_back");
        assert!(render_metrics().contains("reason=\"rolled_back\""));
    }
}
