//! Error taxonomy for the collection engine.
//!
//! Each stage of a check cycle (§7 of the design doc) gets its own variant so
//! the driver can decide, per failure, whether the cursor advances and what
//! health status to emit. Every per-search error still fails the cycle as a
//! whole — there is no partial commit.

use thiserror::Error;

/// Errors surfaced while resolving the saved-search registry (§4.3).
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to fetch saved-search inventory from {url}: {source}")]
    Inventory {
        url: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors surfaced while dispatching a saved search (§4.4, phase 1).
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatch of '{search}' failed: {source}")]
    Request {
        search: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("dispatch of '{search}' returned a response with no 'sid' field")]
    MissingSid { search: String },
}

/// Errors surfaced while polling a dispatched search for results (§4.2, §4.4 phase 2).
#[derive(Debug, Error)]
pub enum PollError {
    #[error("search '{search}' (sid {sid}) exhausted {retries} retries waiting for results")]
    ResultsNotReady {
        search: String,
        sid: String,
        retries: u32,
    },
    #[error("search '{search}' (sid {sid}) returned a FATAL message: {text}")]
    FatalSearch {
        search: String,
        sid: String,
        text: String,
    },
    #[error("transport error polling '{search}' (sid {sid}): {source}")]
    Transport {
        search: String,
        sid: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors surfaced while extracting events from a raw result page (§4.6 step 5).
#[derive(Debug, Error)]
pub enum EventExtractionError {
    #[error("result record for '{search}' is missing required field '{field}'")]
    MissingField { search: String, field: String },
    #[error("result record for '{search}' has field '{field}' of the wrong type")]
    WrongType { search: String, field: String },
}

/// Errors surfaced while the downstream sink is processing a cycle's events.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("downstream sink refused the cycle's events: {0}")]
    SinkRefused(String),
}

/// Top-level error composing every stage. The driver converts any of these
/// into a CRITICAL health report and withholds the corresponding cursor
/// commit, per §7's propagation policy.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error(transparent)]
    EventExtraction(#[from] EventExtractionError),
    #[error(transparent)]
    Commit(#[from] CommitError),
}

impl CheckError {
    /// Whether this failure should withhold the cursor commit for the search(es)
    /// it affects. Every current variant does; kept as a method rather than a
    /// blanket assumption so a future non-fatal variant can opt out explicitly.
    pub fn withholds_commit(&self) -> bool {
        true
    }
}
