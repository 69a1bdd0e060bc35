//! Telemetry related to capability token generation.
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::Counter;
use prometheus::CounterVec;
use prometheus::Opts;

/// Number of capability tokens signed, by kind of request.
pub static TOKENS_ISSUED: Lazy<CounterVec> = Lazy::new(|| {
    CounterVec::new(
        Opts::new(
            "fleetcore_tokens_issued",
            "Number of capability tokens signed, by kind of request",
        ),
        &["kind"],
    )
    .expect("failed to initialise TOKENS_ISSUED counter")
});

/// Number of token requests rejected for exceeding the per-login limit.
pub static TOKENS_RATE_LIMITED: Lazy<Counter> = Lazy::new(|| {
    Counter::new(
        "fleetcore_tokens_rate_limited",
        "Number of token requests rejected for exceeding the per-login limit",
    )
    .expect("failed to initialise TOKENS_RATE_LIMITED counter")
});

static METRICS_REGISTERED: AtomicBool = AtomicBool::new(false);

/// Register capability token metrics, once.
pub fn register_metrics(reg: &prometheus::Registry) -> Result<()> {
    if METRICS_REGISTERED.swap(true, Ordering::AcqRel) {
        return Ok(());
    }

    let collectors: [Box<dyn prometheus::core::Collector>; 2] = [
        Box::new(TOKENS_ISSUED.clone()),
        Box::new(TOKENS_RATE_LIMITED.clone()),
    ];
    for collector in collectors {
        reg.register(collector)?;
    }
    Ok(())
}
