//! Health-check reporting surface (out of scope per spec §1 — an external
//! collaborator). The driver only needs a place to report OK/CRITICAL; the
//! concrete reporting backend (an agent status API, a metrics endpoint, ...)
//! is supplied by the host application.

use std::fmt;

/// Outcome of a single check cycle for one `(instance, saved_search)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Ok,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Ok => write!(f, "OK"),
            HealthStatus::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Receives health status reports from the check driver.
///
/// Mirrors the role of `omgpointless-aspy`'s `EventProcessor` trait (a
/// side-effect-only seam the driver calls into without needing to know the
/// concrete implementation).
pub trait HealthReporter: Send + Sync {
    fn report(&self, instance_key: &str, saved_search: &str, status: HealthStatus, message: &str);
}

/// Default reporter: structured `tracing` events. Good enough for a
/// standalone binary; a host embedding this crate into a larger agent would
/// supply its own reporter that forwards to its status API.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHealthReporter;

impl HealthReporter for LoggingHealthReporter {
    fn report(&self, instance_key: &str, saved_search: &str, status: HealthStatus, message: &str) {
        match status {
            HealthStatus::Ok => {
                tracing::info!(instance = instance_key, search = saved_search, %status, "{}", message);
            }
            HealthStatus::Critical => {
                tracing::error!(instance = instance_key, search = saved_search, %status, "{}", message);
            }
        }
    }
}
