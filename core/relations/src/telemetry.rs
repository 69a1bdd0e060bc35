//! Telemetry related to authorization graph operations.
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use anyhow::Result;
use once_cell::sync::Lazy;
use opentelemetry_api::global::BoxedTracer;
use opentelemetry_api::trace::TraceContextExt;
use opentelemetry_api::trace::Tracer;
use opentelemetry_api::trace::TracerProvider;
use opentelemetry_api::Context as OtelContext;
use prometheus::Counter;
use prometheus::CounterVec;
use prometheus::HistogramOpts;
use prometheus::HistogramTimer;
use prometheus::HistogramVec;
use prometheus::Opts;

/// Total number of operations performed against the authorization graph.
pub static OPS_COUNT: Lazy<CounterVec> = Lazy::new(|| {
    CounterVec::new(
        Opts::new(
            "fleetcore_relations_ops_count",
            "Total number of operations performed against the authorization graph",
        ),
        &["op"],
    )
    .expect("failed to initialise OPS_COUNT counter")
});

/// Duration of operations performed against the authorization graph.
pub static OPS_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "fleetcore_relations_ops_duration",
            "Duration (in seconds) of operations performed against the authorization graph",
        ),
        &["op"],
    )
    .expect("failed to initialise OPS_DURATION histogram")
});

/// Number of operations against the authorization graph that resulted in error.
pub static OPS_ERR: Lazy<CounterVec> = Lazy::new(|| {
    CounterVec::new(
        Opts::new(
            "fleetcore_relations_ops_error",
            "Number of operations against the authorization graph that resulted in error",
        ),
        &["op"],
    )
    .expect("failed to initialise OPS_ERR counter")
});

/// Open Telemetry tracer for authorization graph operations.
pub static TRACER: Lazy<BoxedTracer> = Lazy::new(|| {
    opentelemetry_api::global::tracer_provider().versioned_tracer(
        env!("CARGO_PKG_NAME"),
        Some(env!("CARGO_PKG_VERSION")),
        Option::<&str>::None,
        None,
    )
});

/// Ensure metrics are registered only once.
static METRICS_REGISTERED: AtomicBool = AtomicBool::new(false);

/// Count an operation and time it, returning the error counter to increment on failure.
pub fn observe_op(op: &str) -> (Counter, HistogramTimer) {
    OPS_COUNT.with_label_values(&[op]).inc();
    let err_count = OPS_ERR.with_label_values(&[op]);
    let timer = OPS_DURATION.with_label_values(&[op]).start_timer();
    (err_count, timer)
}

/// Start a new span for the operation and return a context to attach it to.
pub fn trace_op(op: &'static str) -> OtelContext {
    let span = TRACER.start(op);
    OtelContext::current_with_span(span)
}

/// The first time this method is called it will register the authorization graph metrics.
pub fn register_metrics(reg: &prometheus::Registry) -> Result<()> {
    // Skip registration if already done before.
    if METRICS_REGISTERED.swap(true, Ordering::AcqRel) {
        return Ok(());
    }

    let collectors: [Box<dyn prometheus::core::Collector>; 3] = [
        Box::new(OPS_COUNT.clone()),
        Box::new(OPS_DURATION.clone()),
        Box::new(OPS_ERR.clone()),
    ];
    for collector in collectors {
        reg.register(collector)?;
    }
    Ok(())
}
