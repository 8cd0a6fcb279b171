// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics. Without an installed recorder every helper is
//! a no-op, which is what unit tests rely on.

use metrics::describe_counter;

/// Register all zapdesk metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "zapdesk_webhook_events_total",
        "Webhook deliveries by provider and outcome"
    );
    describe_counter!(
        "zapdesk_webhook_errors_total",
        "Errors swallowed while processing webhooks, by provider and stage"
    );
    describe_counter!(
        "zapdesk_messages_persisted_total",
        "Messages written, by provider and direction"
    );
    describe_counter!(
        "zapdesk_media_ingest_total",
        "Media attachments ingested, by outcome"
    );
    describe_counter!(
        "zapdesk_reconcile_total",
        "Contacts handled by the duplicate reconciler, by outcome"
    );
}

/// Record one webhook delivery and how it ended (`processed`, `ignored`, `rejected`, `failed`).
pub fn record_webhook_event(provider: &str, outcome: &'static str) {
    metrics::counter!(
        "zapdesk_webhook_events_total",
        "provider" => provider.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record an error that was logged and swallowed at `stage`.
pub fn record_webhook_error(provider: &str, stage: &'static str) {
    metrics::counter!(
        "zapdesk_webhook_errors_total",
        "provider" => provider.to_string(),
        "stage" => stage
    )
    .increment(1);
}

/// Record a persisted message (`inbound` or `outbound`).
pub fn record_message_persisted(provider: &str, direction: &'static str) {
    metrics::counter!(
        "zapdesk_messages_persisted_total",
        "provider" => provider.to_string(),
        "direction" => direction
    )
    .increment(1);
}

/// Record a media ingest result (`stored`, `placeholder` or `unavailable`).
pub fn record_media_ingest(outcome: &'static str) {
    metrics::counter!("zapdesk_media_ingest_total", "outcome" => outcome).increment(1);
}

/// Record reconciler results (`merged`, `updated`, `failed`).
pub fn record_reconcile(outcome: &'static str, count: u64) {
    metrics::counter!("zapdesk_reconcile_total", "outcome" => outcome).increment(count);
}
