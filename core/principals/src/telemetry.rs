//! Telemetry related to principal management.
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::CounterVec;
use prometheus::Opts;

/// Number of principal removals that failed to clean up the authorization graph.
pub static CLEANUP_FAILURES: Lazy<CounterVec> = Lazy::new(|| {
    CounterVec::new(
        Opts::new(
            "fleetcore_principals_cleanup_failures",
            "Number of principal removals that failed to clean up the authorization graph",
        ),
        &["kind"],
    )
    .expect("failed to initialise CLEANUP_FAILURES counter")
});

static METRICS_REGISTERED: AtomicBool = AtomicBool::new(false);

/// Register principal management metrics, once.
pub fn register_metrics(reg: &prometheus::Registry) -> Result<()> {
    if METRICS_REGISTERED.swap(true, Ordering::AcqRel) {
        return Ok(());
    }
    reg.register(Box::new(CLEANUP_FAILURES.clone()))?;
    Ok(())
}
