use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

lazy_static! {
    pub static ref INVOICE_EVENTS_TOTAL: CounterVec = register_counter_vec!(
        "lnbridge_invoice_events_total",
        "Invoice stream events by kind",
        &["kind"]
    )
    .unwrap();
    pub static ref ACTIVE_INVOICE_STREAMS: Gauge = register_gauge!(
        "lnbridge_active_invoice_streams",
        "Number of invoice stream sessions with a running read loop"
    )
    .unwrap();
    pub static ref REMOTE_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "lnbridge_remote_errors_total",
        "Remote node errors by classification",
        &["class"]
    )
    .unwrap();
    pub static ref REMOTE_CALL_RETRIES_TOTAL: CounterVec = register_counter_vec!(
        "lnbridge_remote_call_retries_total",
        "Retries of state-changing remote calls",
        &["operation"]
    )
    .unwrap();
    pub static ref PAY_RESULTS_TOTAL: CounterVec = register_counter_vec!(
        "lnbridge_pay_results_total",
        "Payment attempts by typed result",
        &["result"]
    )
    .unwrap();
    pub static ref OPEN_CHANNEL_RESULTS_TOTAL: CounterVec = register_counter_vec!(
        "lnbridge_open_channel_results_total",
        "Channel open attempts by typed result",
        &["result"]
    )
    .unwrap();
    pub static ref REMOTE_CALL_LATENCY_SECONDS: HistogramVec = register_histogram_vec!(
        "lnbridge_remote_call_latency_seconds",
        "Latency of single remote call attempts",
        &["operation"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]
    )
    .unwrap();
}

pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}
