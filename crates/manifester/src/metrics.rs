//! Workflow counters
//!
//! - `manifester_entitlement_attach_total` (counter): label `outcome`
//! - `manifester_export_polls_total` (counter)
//!
//! Request-level counters live in the requester crate. Nothing here installs a
//! recorder; without one these calls are no-ops.

/// Record the outcome of one attach attempt (`attached`, `verified`, `retry`, `failed`).
pub fn record_attach(outcome: &'static str) {
    metrics::counter!("manifester_entitlement_attach_total", "outcome" => outcome).increment(1);
}

/// Record one export job status check.
pub fn record_export_poll() {
    metrics::counter!("manifester_export_polls_total").increment(1);
}
