//! The downstream event sink (out of scope per spec §1 — an external
//! collaborator). The driver hands it the deduplicated events of a cycle and
//! commits cursors only if it reports success.

use crate::events::EventRecord;
use async_trait::async_trait;

/// Consumes the events produced by one check cycle.
///
/// Implementations decide what "success" means (durably queued, forwarded,
/// written to disk, ...). Returning `Err` causes the driver to withhold the
/// cursor commit for every search in the cycle (§4.5 commit/rollback).
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn handle(&self, instance_key: &str, events: &[EventRecord]) -> anyhow::Result<()>;
}

/// Default sink: logs events via `tracing` and always succeeds. Useful for
/// smoke-testing a configuration before wiring in a real downstream
/// pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

#[async_trait]
impl EventSink for LoggingSink {
    async fn handle(&self, instance_key: &str, events: &[EventRecord]) -> anyhow::Result<()> {
        for event in events {
            tracing::info!(
                instance = instance_key,
                timestamp = event.timestamp,
                event_type = event.event_type.as_deref(),
                msg_title = event.msg_title.as_deref(),
                "collected event"
            );
        }
        Ok(())
    }
}
