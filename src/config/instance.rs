//! Per-instance configuration: the Splunk endpoint, its saved-search
//! selectors, and the tunable defaults they fall back to (spec §3, §6).

use crate::error::CheckError;
use serde::Deserialize;
use std::collections::HashMap;

/// A saved-search selector as written in config: either a literal `name` or
/// a shell-style `match` glob — exactly one of the two (spec §3,
/// `SavedSearchSelector`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Name(String),
    Match(String),
}

/// Per-search tunable overrides (spec §6: "optional overrides of every
/// per-search tunable"). `None` means "fall back to the instance default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavedSearchOverrides {
    pub batch_size: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
    pub search_max_retry_count: Option<u32>,
    pub search_seconds_between_retries: Option<u64>,
    pub max_restart_history_seconds: Option<u64>,
    pub max_query_chunk_seconds: Option<u64>,
    pub max_initial_history_seconds: Option<u64>,
}

/// One configured saved-search selector, with its dispatch parameters and
/// tunable overrides.
#[derive(Debug, Clone)]
pub struct SavedSearchSelectorConfig {
    pub selector: Selector,
    pub parameters: HashMap<String, String>,
    pub overrides: SavedSearchOverrides,
}

/// The resolved, numeric-validated tunables for one saved search in one
/// cycle (spec §3, `SavedSearch`). Built fresh each cycle from the registry
/// plus the owning instance's defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedSearch {
    pub name: String,
    pub parameters: HashMap<String, String>,
    pub batch_size: u64,
    pub request_timeout_seconds: u64,
    pub search_max_retry_count: u32,
    pub search_seconds_between_retries: u64,
    pub max_restart_history_seconds: u64,
    pub max_query_chunk_seconds: u64,
    pub max_initial_history_seconds: u64,
}

impl SavedSearch {
    /// Resolve one saved search's tunables from its overrides and the
    /// owning instance's defaults, validating every numeric invariant from
    /// spec §3 ("every numeric field ≥ 0; batch_size ≥ 1").
    pub fn resolve(
        name: String,
        parameters: HashMap<String, String>,
        overrides: &SavedSearchOverrides,
        defaults: &InstanceDefaults,
    ) -> Result<Self, CheckError> {
        let batch_size = overrides.batch_size.unwrap_or(defaults.batch_size);
        if batch_size < 1 {
            return Err(CheckError::Config(format!(
                "saved search '{name}': batch_size must be >= 1, got {batch_size}"
            )));
        }
        Ok(Self {
            name,
            parameters,
            batch_size,
            request_timeout_seconds: overrides
                .request_timeout_seconds
                .unwrap_or(defaults.request_timeout_seconds),
            search_max_retry_count: overrides
                .search_max_retry_count
                .unwrap_or(defaults.search_max_retry_count),
            search_seconds_between_retries: overrides
                .search_seconds_between_retries
                .unwrap_or(defaults.search_seconds_between_retries),
            max_restart_history_seconds: overrides
                .max_restart_history_seconds
                .unwrap_or(defaults.max_restart_history_seconds),
            max_query_chunk_seconds: overrides
                .max_query_chunk_seconds
                .unwrap_or(defaults.max_query_chunk_seconds),
            max_initial_history_seconds: overrides
                .max_initial_history_seconds
                .unwrap_or(defaults.max_initial_history_seconds),
        })
    }
}

/// Instance-wide defaults every saved search falls back to (spec §6,
/// "Instance-wide defaults").
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDefaults {
    pub request_timeout_seconds: u64,
    pub search_max_retry_count: u32,
    pub search_seconds_between_retries: u64,
    pub verify_ssl_certificate: bool,
    pub batch_size: u64,
    pub saved_searches_parallel: usize,
    pub initial_delay_seconds: u64,
    pub max_initial_history_seconds: u64,
    pub max_query_chunk_seconds: u64,
    pub max_restart_history_seconds: u64,
}

impl Default for InstanceDefaults {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 5,
            search_max_retry_count: 3,
            search_seconds_between_retries: 5,
            verify_ssl_certificate: true,
            batch_size: 1000,
            saved_searches_parallel: 3,
            initial_delay_seconds: 0,
            max_initial_history_seconds: 0,
            max_query_chunk_seconds: 3_600,
            max_restart_history_seconds: 86_400,
        }
    }
}

/// One configured Splunk endpoint (spec §3, `InstanceConfig`): immutable
/// once built, owns its own defaults and the list of saved-search selectors
/// to resolve each cycle.
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    /// Stable identity for this instance, used as the cursor-map key and in
    /// health/log output. Derived from `url` (Splunk instances are
    /// addressed by endpoint, not by a separately configured name).
    pub key: String,
    pub url: String,
    pub username: String,
    pub password: String,
    pub saved_searches: Vec<SavedSearchSelectorConfig>,
    pub tags: Vec<String>,
    pub defaults: InstanceDefaults,
}

impl InstanceConfig {
    pub fn basic_auth(&self) -> (&str, &str) {
        (&self.username, &self.password)
    }
}

impl std::fmt::Display for InstanceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File (TOML) deserialization layer
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileSavedSearch {
    pub name: Option<String>,
    #[serde(rename = "match")]
    pub match_: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    pub batch_size: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
    pub search_max_retry_count: Option<u32>,
    pub search_seconds_between_retries: Option<u64>,
    pub max_restart_history_seconds: Option<u64>,
    pub max_query_chunk_seconds: Option<u64>,
    pub max_initial_history_seconds: Option<u64>,
}

impl FileSavedSearch {
    pub(crate) fn into_selector(self) -> Result<SavedSearchSelectorConfig, CheckError> {
        let selector = match (self.name, self.match_) {
            (Some(name), None) => Selector::Name(name),
            (None, Some(pattern)) => Selector::Match(pattern),
            (Some(_), Some(_)) => {
                return Err(CheckError::Config(
                    "saved_searches entry must set exactly one of 'name' or 'match', not both"
                        .to_string(),
                ))
            }
            (None, None) => {
                return Err(CheckError::Config(
                    "saved_searches entry must set one of 'name' or 'match'".to_string(),
                ))
            }
        };
        Ok(SavedSearchSelectorConfig {
            selector,
            parameters: self.parameters,
            overrides: SavedSearchOverrides {
                batch_size: self.batch_size,
                request_timeout_seconds: self.request_timeout_seconds,
                search_max_retry_count: self.search_max_retry_count,
                search_seconds_between_retries: self.search_seconds_between_retries,
                max_restart_history_seconds: self.max_restart_history_seconds,
                max_query_chunk_seconds: self.max_query_chunk_seconds,
                max_initial_history_seconds: self.max_initial_history_seconds,
            },
        })
    }
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileInstanceDefaults {
    pub request_timeout_seconds: Option<u64>,
    pub search_max_retry_count: Option<u32>,
    pub search_seconds_between_retries: Option<u64>,
    pub verify_ssl_certificate: Option<bool>,
    pub batch_size: Option<u64>,
    pub saved_searches_parallel: Option<usize>,
    pub initial_delay_seconds: Option<u64>,
    pub initial_history_time_seconds: Option<u64>,
    pub max_query_chunk_seconds: Option<u64>,
    pub max_query_time_range: Option<u64>,
    pub restart_history_time_seconds: Option<u64>,
    pub max_restart_history_seconds: Option<u64>,
}

/// Resolve an aliased pair of settings, failing loudly on a genuine conflict
/// rather than silently preferring one (spec §9 open question).
fn resolve_alias(
    name: &str,
    primary: Option<u64>,
    alias: Option<u64>,
) -> Result<Option<u64>, CheckError> {
    match (primary, alias) {
        (Some(a), Some(b)) if a != b => Err(CheckError::Config(format!(
            "conflicting values for aliased setting '{name}': {a} vs {b}"
        ))),
        (Some(a), _) => Ok(Some(a)),
        (None, Some(b)) => Ok(Some(b)),
        (None, None) => Ok(None),
    }
}

impl FileInstanceDefaults {
    pub(crate) fn resolve(&self, base: &InstanceDefaults) -> Result<InstanceDefaults, CheckError> {
        let max_query_chunk_seconds = resolve_alias(
            "max_query_chunk_seconds/max_query_time_range",
            self.max_query_chunk_seconds,
            self.max_query_time_range,
        )?
        .unwrap_or(base.max_query_chunk_seconds);

        let max_restart_history_seconds = resolve_alias(
            "restart_history_time_seconds/max_restart_history_seconds",
            self.restart_history_time_seconds,
            self.max_restart_history_seconds,
        )?
        .unwrap_or(base.max_restart_history_seconds);

        Ok(InstanceDefaults {
            request_timeout_seconds: self
                .request_timeout_seconds
                .unwrap_or(base.request_timeout_seconds),
            search_max_retry_count: self
                .search_max_retry_count
                .unwrap_or(base.search_max_retry_count),
            search_seconds_between_retries: self
                .search_seconds_between_retries
                .unwrap_or(base.search_seconds_between_retries),
            verify_ssl_certificate: self
                .verify_ssl_certificate
                .unwrap_or(base.verify_ssl_certificate),
            batch_size: self.batch_size.unwrap_or(base.batch_size),
            saved_searches_parallel: self
                .saved_searches_parallel
                .unwrap_or(base.saved_searches_parallel),
            initial_delay_seconds: self
                .initial_delay_seconds
                .unwrap_or(base.initial_delay_seconds),
            max_initial_history_seconds: self
                .initial_history_time_seconds
                .unwrap_or(base.max_initial_history_seconds),
            max_query_chunk_seconds,
            max_restart_history_seconds,
        })
    }
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileInstance {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub saved_searches: Vec<FileSavedSearch>,
    #[serde(default)]
    pub defaults: FileInstanceDefaults,
}

impl FileInstance {
    pub(crate) fn into_instance_config(self) -> Result<InstanceConfig, CheckError> {
        if self.url.is_empty() {
            return Err(CheckError::Config("instance is missing 'url'".to_string()));
        }
        if self.username.is_empty() || self.password.is_empty() {
            return Err(CheckError::Config(format!(
                "instance '{}' is missing username/password",
                self.url
            )));
        }
        if self.saved_searches.is_empty() {
            return Err(CheckError::Config(format!(
                "instance '{}' has no saved_searches configured",
                self.url
            )));
        }

        let defaults = self.defaults.resolve(&InstanceDefaults::default())?;
        let saved_searches = self
            .saved_searches
            .into_iter()
            .map(FileSavedSearch::into_selector)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(InstanceConfig {
            key: self.url.clone(),
            url: self.url,
            username: self.username,
            password: self.password,
            saved_searches,
            tags: self.tags,
            defaults,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> InstanceDefaults {
        InstanceDefaults::default()
    }

    #[test]
    fn resolve_fills_unset_fields_from_instance_defaults() {
        let overrides = SavedSearchOverrides::default();
        let search =
            SavedSearch::resolve("events".to_string(), HashMap::new(), &overrides, &defaults())
                .unwrap();
        assert_eq!(search.batch_size, defaults().batch_size);
        assert_eq!(
            search.max_query_chunk_seconds,
            defaults().max_query_chunk_seconds
        );
    }

    #[test]
    fn resolve_prefers_override_over_default() {
        let overrides = SavedSearchOverrides {
            batch_size: Some(50),
            ..Default::default()
        };
        let search =
            SavedSearch::resolve("events".to_string(), HashMap::new(), &overrides, &defaults())
                .unwrap();
        assert_eq!(search.batch_size, 50);
    }

    #[test]
    fn resolve_rejects_batch_size_zero() {
        let overrides = SavedSearchOverrides {
            batch_size: Some(0),
            ..Default::default()
        };
        let result =
            SavedSearch::resolve("events".to_string(), HashMap::new(), &overrides, &defaults());
        assert!(result.is_err());
    }

    #[test]
    fn alias_resolution_prefers_primary_when_only_primary_set() {
        let file = FileInstanceDefaults {
            restart_history_time_seconds: Some(3600),
            ..Default::default()
        };
        let resolved = file.resolve(&defaults()).unwrap();
        assert_eq!(resolved.max_restart_history_seconds, 3600);
    }

    #[test]
    fn alias_resolution_accepts_matching_values() {
        let file = FileInstanceDefaults {
            restart_history_time_seconds: Some(3600),
            max_restart_history_seconds: Some(3600),
            ..Default::default()
        };
        assert!(file.resolve(&defaults()).is_ok());
    }

    #[test]
    fn alias_resolution_rejects_conflicting_values() {
        let file = FileInstanceDefaults {
            restart_history_time_seconds: Some(3600),
            max_restart_history_seconds: Some(7200),
            ..Default::default()
        };
        assert!(file.resolve(&defaults()).is_err());
    }

    #[test]
    fn selector_requires_exactly_one_of_name_or_match() {
        let both = FileSavedSearch {
            name: Some("a".into()),
            match_: Some("b*".into()),
            ..Default::default()
        };
        assert!(both.into_selector().is_err());

        let neither = FileSavedSearch::default();
        assert!(neither.into_selector().is_err());

        let name_only = FileSavedSearch {
            name: Some("events".into()),
            ..Default::default()
        };
        assert!(matches!(
            name_only.into_selector().unwrap().selector,
            Selector::Name(ref n) if n == "events"
        ));
    }
}
