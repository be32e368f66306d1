use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram, IntCounter,
    IntCounterVec, TextEncoder,
};

// Prometheus metrics (default registry)
pub static REGISTRATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "chirper_registrations_total",
        "Registration attempts by outcome",
        &["outcome"]
    )
    .expect("register registrations_total")
});

pub static LOGINS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "chirper_logins_total",
        "Login attempts by outcome",
        &["outcome"]
    )
    .expect("register logins_total")
});

pub static LOADER_BATCHES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "chirper_user_loader_batches_total",
        "Bulk user fetches issued by request loaders"
    )
    .expect("register user_loader_batches_total")
});

pub static LOADER_BATCH_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "chirper_user_loader_batch_failures_total",
        "Bulk user fetches that failed in the store"
    )
    .expect("register user_loader_batch_failures_total")
});

pub static LOADER_BATCH_SIZE: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "chirper_user_loader_batch_size",
        "Distinct keys per bulk user fetch",
        vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]
    )
    .expect("register user_loader_batch_size")
});

pub fn record_auth(counter: &IntCounterVec, outcome: &str) {
    counter.with_label_values(&[outcome]).inc();
}

/// Render the default registry in the text exposition format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_exposition() {
        record_auth(&LOGINS_TOTAL, "ok");
        LOADER_BATCHES_TOTAL.inc();
        let text = encode_metrics().expect("encode");
        assert!(text.contains("chirper_logins_total"));
        assert!(text.contains("chirper_user_loader_batches_total"));
    }
}
