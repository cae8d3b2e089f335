//! Saved-search registry resolution (spec §4.3): turn the configured
//! literal/wildcard selectors into the ordered, deduplicated list of
//! `SavedSearch` to run this cycle.

use crate::config::{InstanceConfig, SavedSearch, Selector};
use crate::error::RegistryError;
use crate::http;
use async_trait::async_trait;
use globset::Glob;
use std::collections::HashSet;

/// The `_saved_searches` mocking seam: fetches the live inventory of saved
/// search names from an instance. Implemented for the real HTTP transport
/// and swappable with an in-memory double in tests.
#[async_trait]
pub trait SavedSearchLister: Send + Sync {
    async fn saved_searches(&self, instance: &InstanceConfig) -> Result<Vec<String>, RegistryError>;
}

/// Default lister backed by the real Splunk-compatible HTTP API.
pub struct HttpSavedSearchLister {
    pub client: reqwest::Client,
}

#[async_trait]
impl SavedSearchLister for HttpSavedSearchLister {
    async fn saved_searches(&self, instance: &InstanceConfig) -> Result<Vec<String>, RegistryError> {
        http::fetch_saved_search_inventory(&self.client, instance).await
    }
}

/// Resolve this instance's configured selectors into the ordered list of
/// `SavedSearch` to run this cycle (spec §4.3, §3 `Registry`).
///
/// Ordering: literal selectors first, in configured order; then wildcard
/// expansions, alphabetically; duplicates by name are dropped (first
/// occurrence wins, so a literal always takes precedence over a wildcard
/// that would also match it). Inventory gating only applies to wildcard
/// expansion (a `match:` selector can only name what the inventory lists);
/// a literal `name:` selector is always dispatched as configured.
pub async fn resolve_registry(
    instance: &InstanceConfig,
    lister: &dyn SavedSearchLister,
) -> Result<Vec<SavedSearch>, RegistryError> {
    let inventory = lister.saved_searches(instance).await?;

    let mut seen_names: HashSet<String> = HashSet::new();
    let mut ordered_names: Vec<String> = Vec::new();

    // Literal selectors first, in configured order. Unlike wildcard
    // expansions, literal names are always dispatched regardless of what the
    // inventory endpoint echoes back — a literal name names a specific saved
    // search the operator configured, not a query over the inventory.
    for selector in &instance.saved_searches {
        if let Selector::Name(name) = &selector.selector {
            if seen_names.insert(name.clone()) {
                ordered_names.push(name.clone());
            }
        }
    }

    // Then wildcard expansions, alphabetically within each selector, merged
    // against what's already present.
    let mut wildcard_matches: Vec<String> = Vec::new();
    for selector in &instance.saved_searches {
        if let Selector::Match(pattern) = &selector.selector {
            let matcher = Glob::new(pattern)
                .map_err(|e| RegistryError::Inventory {
                    url: instance.url.clone(),
                    source: anyhow::anyhow!("invalid saved-search match pattern '{pattern}': {e}"),
                })?
                .compile_matcher();
            for name in &inventory {
                if matcher.is_match(name) && !seen_names.contains(name) {
                    wildcard_matches.push(name.clone());
                }
            }
        }
    }
    wildcard_matches.sort();
    wildcard_matches.dedup();
    for name in wildcard_matches {
        if seen_names.insert(name.clone()) {
            ordered_names.push(name);
        }
    }

    let mut resolved = Vec::with_capacity(ordered_names.len());
    for name in ordered_names {
        let selector_config = instance
            .saved_searches
            .iter()
            .find(|s| matches_selector(&s.selector, &name));
        let (parameters, overrides) = match selector_config {
            Some(cfg) => (cfg.parameters.clone(), cfg.overrides.clone()),
            None => Default::default(),
        };
        let search = SavedSearch::resolve(name, parameters, &overrides, &instance.defaults).map_err(
            |e| RegistryError::Inventory {
                url: instance.url.clone(),
                source: anyhow::anyhow!("{e}"),
            },
        )?;
        resolved.push(search);
    }

    Ok(resolved)
}

fn matches_selector(selector: &Selector, name: &str) -> bool {
    match selector {
        Selector::Name(n) => n == name,
        Selector::Match(pattern) => Glob::new(pattern)
            .map(|g| g.compile_matcher().is_match(name))
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InstanceDefaults, SavedSearchOverrides, SavedSearchSelectorConfig};
    use std::collections::HashMap;

    struct FakeLister(Vec<String>);

    #[async_trait]
    impl SavedSearchLister for FakeLister {
        async fn saved_searches(
            &self,
            _instance: &InstanceConfig,
        ) -> Result<Vec<String>, RegistryError> {
            Ok(self.0.clone())
        }
    }

    fn instance_with(selectors: Vec<SavedSearchSelectorConfig>) -> InstanceConfig {
        InstanceConfig {
            key: "test".to_string(),
            url: "https://splunk.example.com".to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
            saved_searches: selectors,
            tags: vec![],
            defaults: InstanceDefaults::default(),
        }
    }

    fn literal(name: &str) -> SavedSearchSelectorConfig {
        SavedSearchSelectorConfig {
            selector: Selector::Name(name.to_string()),
            parameters: HashMap::new(),
            overrides: SavedSearchOverrides::default(),
        }
    }

    fn wildcard(pattern: &str) -> SavedSearchSelectorConfig {
        SavedSearchSelectorConfig {
            selector: Selector::Match(pattern.to_string()),
            parameters: HashMap::new(),
            overrides: SavedSearchOverrides::default(),
        }
    }

    #[tokio::test]
    async fn wildcard_matches_against_inventory() {
        let instance = instance_with(vec![wildcard("even*")]);
        let lister = FakeLister(vec!["events".to_string(), "blaat".to_string()]);
        let resolved = resolve_registry(&instance, &lister).await.unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "events");
    }

    #[tokio::test]
    async fn wildcard_against_empty_inventory_yields_empty_registry() {
        let instance = instance_with(vec![wildcard("even*")]);
        let lister = FakeLister(vec![]);
        let resolved = resolve_registry(&instance, &lister).await.unwrap();
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn literal_selectors_preserve_configured_order() {
        let instance = instance_with(vec![literal("zeta"), literal("alpha")]);
        let lister = FakeLister(vec!["alpha".to_string(), "zeta".to_string()]);
        let resolved = resolve_registry(&instance, &lister).await.unwrap();
        let names: Vec<&str> = resolved.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn literal_missing_from_inventory_is_still_dispatched() {
        let instance = instance_with(vec![literal("gone")]);
        let lister = FakeLister(vec!["events".to_string()]);
        let resolved = resolve_registry(&instance, &lister).await.unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "gone");
    }

    #[tokio::test]
    async fn literal_selectors_are_dispatched_against_empty_inventory() {
        let instance = instance_with(vec![literal("events")]);
        let lister = FakeLister(vec![]);
        let resolved = resolve_registry(&instance, &lister).await.unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "events");
    }

    #[tokio::test]
    async fn literal_takes_precedence_over_overlapping_wildcard() {
        let instance = instance_with(vec![literal("events"), wildcard("even*")]);
        let lister = FakeLister(vec!["events".to_string()]);
        let resolved = resolve_registry(&instance, &lister).await.unwrap();
        assert_eq!(resolved.len(), 1);
    }
}
