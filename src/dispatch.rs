//! Dispatch & poll orchestration (spec §4.4): fan out saved searches in
//! waves bounded by `saved_searches_parallel`, dispatch then poll each one,
//! and return the flattened raw result pages per search.

use crate::config::{InstanceConfig, SavedSearch};
use crate::cursor::QueryWindow;
use crate::error::{DispatchError, PollError};
use crate::http;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// One search's outcome for this cycle: its raw result pages, flattened and
/// in page order (spec §3 `DispatchResult`, already flattened for the
/// driver's convenience).
pub type SearchOutcome = Result<Vec<Map<String, Value>>, CycleError>;

/// Errors a single search's dispatch+poll can produce within a wave.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Poll(#[from] PollError),
}

/// The `_dispatch_saved_search` / `_search` / `_dispatch_and_await_search`
/// mocking seam (spec §9): dispatch one saved search for one window and
/// return its flattened result pages.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch_and_await(
        &self,
        instance: &InstanceConfig,
        search: &SavedSearch,
        window: &QueryWindow,
    ) -> SearchOutcome;
}

/// Default dispatcher backed by the real HTTP transport.
pub struct HttpDispatcher {
    pub client: reqwest::Client,
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch_and_await(
        &self,
        instance: &InstanceConfig,
        search: &SavedSearch,
        window: &QueryWindow,
    ) -> SearchOutcome {
        let earliest = window.earliest_canonical();
        let latest = window.latest_canonical();

        let sid = http::dispatch_saved_search(
            &self.client,
            instance,
            &search.name,
            search.parameters.clone(),
            &earliest,
            latest.as_deref(),
        )
        .await
        .map_err(CycleError::from)?;

        let pages = http::saved_search_results(
            &self.client,
            instance,
            &search.name,
            &sid,
            search.batch_size,
            search.search_max_retry_count,
            search.search_seconds_between_retries,
        )
        .await
        .map_err(CycleError::from)?;

        Ok(pages)
    }
}

/// Run `(search, window)` pairs through the dispatcher in waves of at most
/// `saved_searches_parallel` concurrent operations, preserving the pairs'
/// input order in the returned results (spec §4.4, §8 scenario 6).
pub async fn dispatch_waves<'a>(
    dispatcher: &(dyn Dispatcher + Send + Sync),
    instance: &InstanceConfig,
    pairs: &'a [(SavedSearch, QueryWindow)],
    saved_searches_parallel: usize,
) -> Vec<(&'a SavedSearch, SearchOutcome)> {
    let wave_size = saved_searches_parallel.max(1);
    let mut results = Vec::with_capacity(pairs.len());

    for wave in pairs.chunks(wave_size) {
        let futures = wave
            .iter()
            .map(|(search, window)| dispatcher.dispatch_and_await(instance, search, window));
        let wave_results = futures::future::join_all(futures).await;
        for ((search, _window), outcome) in wave.iter().zip(wave_results) {
            results.push((search, outcome));
        }
    }

    results
}
