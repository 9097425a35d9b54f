//! Thin, label-tagged wrappers around the `metrics` crate's macros. This
//! module owns no registry or exporter — installing one is the host
//! process's job.

use std::time::Duration;

use crate::ids::TenantId;

pub fn tenant_blocklist_gauges(
    tenant: &TenantId,
    live_count: usize,
    compacted_count: usize,
    live_bytes: u64,
    compacted_bytes: u64,
) {
    let tenant = tenant.as_str().to_string();
    metrics::gauge!("blocklist_poller_live_objects", "tenant" => tenant.clone()).set(live_count as f64);
    metrics::gauge!("blocklist_poller_compacted_objects", "tenant" => tenant.clone())
        .set(compacted_count as f64);
    metrics::gauge!("blocklist_poller_live_bytes", "tenant" => tenant.clone()).set(live_bytes as f64);
    metrics::gauge!("blocklist_poller_compacted_bytes", "tenant" => tenant.clone())
        .set(compacted_bytes as f64);
    metrics::gauge!("blocklist_poller_length", "tenant" => tenant)
        .set((live_count + compacted_count) as f64);
}

pub fn tenant_builder_status(tenant: &TenantId, is_builder: bool) {
    metrics::gauge!("blocklist_poller_is_builder", "tenant" => tenant.as_str().to_string())
        .set(if is_builder { 1.0 } else { 0.0 });
}

pub fn tenant_index_age(tenant: &TenantId, age_secs: i64) {
    metrics::gauge!("blocklist_poller_index_age_seconds", "tenant" => tenant.as_str().to_string())
        .set(age_secs as f64);
}

pub fn tenant_poll_error(tenant: &TenantId) {
    metrics::counter!("blocklist_poller_poll_errors_total", "tenant" => tenant.as_str().to_string())
        .increment(1);
}

pub fn tenant_index_write_error(tenant: &TenantId) {
    metrics::counter!("blocklist_poller_index_write_errors_total", "tenant" => tenant.as_str().to_string())
        .increment(1);
}

pub fn cycle_duration(duration: Duration) {
    metrics::histogram!("blocklist_poller_cycle_duration_seconds").record(duration.as_secs_f64());
}
