use tracing::trace;

// Counters are emitted as trace events; there is no exporter.

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    trace!(
        target = "relay.metrics",
        stage = stage,
        elapsed_ms = elapsed_ms as u64,
        "stage_elapsed"
    );
}

pub fn inc_published(tag: &str) {
    trace!(target = "relay.metrics", tag = tag, "published_total_inc");
}

pub fn inc_skipped(reason: &'static str) {
    trace!(target = "relay.metrics", reason = reason, "skipped_total_inc");
}
