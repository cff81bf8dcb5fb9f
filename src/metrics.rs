//! Workflow metrics, exported at `/metrics/workflow` next to the HTTP metrics.

use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    static ref DOCUMENT_TRANSITIONS: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "document_transitions_total",
            "Workflow operations by operation and outcome"
        ),
        &["operation", "outcome"]
    )
    .expect("valid document_transitions_total definition");
    static ref PDF_RENDER_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("pdf_render_seconds", "Time spent rendering a document to PDF")
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
    )
    .expect("valid pdf_render_seconds definition");
    static ref REGISTRY: Registry = {
        let registry = Registry::new_custom(Some("document_approval".to_string()), None)
            .expect("valid registry prefix");
        registry
            .register(Box::new(DOCUMENT_TRANSITIONS.clone()))
            .expect("document_transitions_total registered once");
        registry
            .register(Box::new(PDF_RENDER_SECONDS.clone()))
            .expect("pdf_render_seconds registered once");
        registry
    };
}

pub fn record_transition(operation: &str, outcome: &str) {
    DOCUMENT_TRANSITIONS
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn observe_pdf_render(seconds: f64) {
    PDF_RENDER_SECONDS.observe(seconds);
}

/// Text exposition of the workflow registry.
pub fn export() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        log::error!("Failed to encode workflow metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
