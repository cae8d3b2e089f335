//! The check driver (spec §4.6): one tick of registry resolution, window
//! planning, dispatch, event extraction/dedup, commit/rollback, and health
//! reporting.

use crate::clock::Clock;
use crate::config::InstanceConfig;
use crate::cursor::TemporalCursor;
use crate::dispatch::Dispatcher;
use crate::error::CheckError;
use crate::events::extract_and_dedup;
use crate::health::{HealthReporter, HealthStatus};
use crate::registry::{resolve_registry, SavedSearchLister};
use crate::sink::EventSink;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owns one instance's cursor map and runs its check cycles. The cursor map
/// is private and written only by `run_cycle`'s single commit phase, so no
/// locking is needed beyond the `&mut self` borrow (spec §5).
pub struct CheckDriver {
    instance: InstanceConfig,
    lister: Box<dyn SavedSearchLister>,
    dispatcher: Box<dyn Dispatcher>,
    sink: Box<dyn EventSink>,
    health: Box<dyn HealthReporter>,
    clock: Box<dyn Clock>,
    cursors: HashMap<String, TemporalCursor>,
    /// Flipped by the host (a signal handler, a CLI subcommand) to force a
    /// bounded replay on the next cycle (spec §6 "Persisted state").
    force_reload: Arc<AtomicBool>,
}

impl CheckDriver {
    pub fn new(
        instance: InstanceConfig,
        lister: Box<dyn SavedSearchLister>,
        dispatcher: Box<dyn Dispatcher>,
        sink: Box<dyn EventSink>,
        health: Box<dyn HealthReporter>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            instance,
            lister,
            dispatcher,
            sink,
            health,
            clock,
            cursors: HashMap::new(),
            force_reload: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle the host can flip to request a forced reload on the next
    /// cycle (spec §6).
    pub fn force_reload_flag(&self) -> Arc<AtomicBool> {
        self.force_reload.clone()
    }

    /// Run one check cycle (spec §4.6). Returns whether the scheduler should
    /// re-invoke the driver immediately rather than waiting for the next
    /// interval tick.
    pub async fn run_cycle(&mut self) -> bool {
        let now = self.clock.now_seconds();
        let force_reload = self.force_reload.swap(false, Ordering::SeqCst);

        let registry = match resolve_registry(&self.instance, self.lister.as_ref()).await {
            Ok(registry) => registry,
            Err(e) => {
                let error = CheckError::from(e);
                self.health.report(
                    &self.instance.key,
                    "*",
                    HealthStatus::Critical,
                    &error.to_string(),
                );
                return false;
            }
        };

        let mut pairs = Vec::new();
        let mut skipped_states = Vec::new();
        for search in &registry {
            let cursor = self.cursors.entry(search.name.clone()).or_insert_with(|| {
                TemporalCursor::new(now, self.instance.defaults.initial_delay_seconds)
            });
            let outcome = cursor.plan(
                now,
                force_reload,
                search.max_query_chunk_seconds,
                search.max_initial_history_seconds,
                search.max_restart_history_seconds,
            );
            match outcome.window {
                Some(window) => pairs.push((search.clone(), window, outcome.continue_after_commit)),
                None => skipped_states.push(search.name.clone()),
            }
        }

        for name in &skipped_states {
            tracing::debug!(instance = %self.instance.key, search = %name, "skipped this cycle (initial delay not yet elapsed)");
        }

        let dispatch_pairs: Vec<_> = pairs
            .iter()
            .map(|(search, window, _)| (search.clone(), window.clone()))
            .collect();

        let results = crate::dispatch::dispatch_waves(
            self.dispatcher.as_ref(),
            &self.instance,
            &dispatch_pairs,
            self.instance.defaults.saved_searches_parallel,
        )
        .await;

        let mut seen: HashSet<String> = HashSet::new();
        let mut cycle_ok = true;
        let mut continue_after_commit = false;

        for ((search, window, search_continue), (_, outcome)) in pairs.iter().zip(results) {
            match outcome {
                Ok(pages) => {
                    let events = match extract_and_dedup(&search.name, &self.instance.tags, pages, &mut seen) {
                        Ok(events) => events,
                        Err(e) => {
                            cycle_ok = false;
                            self.health.report(
                                &self.instance.key,
                                &search.name,
                                HealthStatus::Critical,
                                &e.to_string(),
                            );
                            continue;
                        }
                    };

                    match self.sink.handle(&self.instance.key, &events).await {
                        Ok(()) => {
                            let max_event_timestamp =
                                events.iter().map(|e| e.timestamp).fold(None, |acc, ts| {
                                    Some(acc.map_or(ts, |a: f64| a.max(ts)))
                                });
                            if let Some(cursor) = self.cursors.get_mut(&search.name) {
                                cursor.commit(window, now, max_event_timestamp);
                            }
                            continue_after_commit |= *search_continue;
                            self.health.report(
                                &self.instance.key,
                                &search.name,
                                HealthStatus::Ok,
                                "collection succeeded",
                            );
                        }
                        Err(e) => {
                            cycle_ok = false;
                            if let Some(cursor) = self.cursors.get(&search.name) {
                                cursor.rollback();
                            }
                            self.health.report(
                                &self.instance.key,
                                &search.name,
                                HealthStatus::Critical,
                                &format!("downstream sink refused events: {e}"),
                            );
                        }
                    }
                }
                Err(e) => {
                    cycle_ok = false;
                    if let Some(cursor) = self.cursors.get(&search.name) {
                        cursor.rollback();
                    }
                    self.health.report(
                        &self.instance.key,
                        &search.name,
                        HealthStatus::Critical,
                        &e.to_string(),
                    );
                }
            }
        }

        tracing::debug!(
            instance = %self.instance.key,
            cycle_ok,
            continue_after_commit,
            "cycle complete"
        );
        continue_after_commit
    }
}
