//! Configuration for the collection engine.
//!
//! Configuration is loaded in order of precedence:
//! 1. Environment variables (highest priority, operational overrides)
//! 2. Config file (~/.config/splunk-event-collector/config.toml)
//! 3. Built-in defaults (lowest priority)

pub mod instance;


pub use instance::{
    InstanceConfig, InstanceDefaults, SavedSearch, SavedSearchOverrides, SavedSearchSelectorConfig,
    Selector,
};

use instance::FileInstance;
use serde::Deserialize;
use std::path::PathBuf;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_COLLECTION_INTERVAL_SECONDS: u64 = 15;

// ─────────────────────────────────────────────────────────────────────────────
// Application Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Process-wide configuration (spec §3, root of the data model): a
/// collection cadence plus every configured Splunk instance.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// How often the scheduler starts a new check cycle, absent a
    /// `continue_after_commit` request for an earlier re-entry.
    pub collection_interval_seconds: u64,

    /// Every configured Splunk endpoint. Empty is valid: the scheduler
    /// simply has nothing to dispatch.
    pub instances: Vec<InstanceConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            collection_interval_seconds: DEFAULT_COLLECTION_INTERVAL_SECONDS,
            instances: Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

/// Config file structure (subset of `AppConfig` that makes sense to persist).
#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileAppConfig {
    pub collection_interval_seconds: Option<u64>,

    /// `[[instances]]` array-of-tables, one per configured Splunk endpoint.
    #[serde(default)]
    pub instances: Vec<FileInstance>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Loading
// ─────────────────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Get the config file path: `$SPLUNK_COLLECTOR_CONFIG_PATH` if set,
    /// otherwise `~/.config/splunk-event-collector/config.toml`.
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SPLUNK_COLLECTOR_CONFIG_PATH") {
            return Some(PathBuf::from(path));
        }
        dirs::home_dir().map(|p| p.join(".config").join("splunk-event-collector").join("config.toml"))
    }

    /// Create config file with defaults if it doesn't exist. Called during
    /// startup to help users discover configuration options.
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };

        if path.exists() {
            return;
        }

        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return; // Silently fail - config is optional
            }
        }

        let template = Self::default().to_toml();
        let _ = std::fs::write(&path, template);
    }

    /// Load file config if it exists.
    ///
    /// # Panics
    /// If config file exists but cannot be parsed. This is intentional - a
    /// broken config should fail fast with a clear error, not silently fall
    /// back to defaults while the operator debugs the wrong thing.
    fn load_file_config() -> FileAppConfig {
        let Some(path) = Self::config_path() else {
            return FileAppConfig::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!(
                        "\n╔══════════════════════════════════════════════════════════════╗"
                    );
                    eprintln!(
                        "║  CONFIG ERROR - Failed to parse configuration file          ║"
                    );
                    eprintln!(
                        "╚══════════════════════════════════════════════════════════════╝\n"
                    );
                    eprintln!("  File: {}\n", path.display());
                    eprintln!("  Error: {}\n", e);
                    eprintln!("  Tip: Check for:\n");
                    eprintln!("    - Missing quotes around string values");
                    eprintln!("    - Invalid boolean values (use true/false)");
                    eprintln!("    - Malformed array syntax");
                    eprintln!("    - Duplicate or conflicting aliased default_* keys\n");
                    eprintln!("  To reset, delete the file and restart.\n");
                    std::process::exit(1);
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileAppConfig::default(),
            Err(e) => {
                eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
                eprintln!("║  CONFIG ERROR - Cannot read configuration file              ║");
                eprintln!("╚══════════════════════════════════════════════════════════════╝\n");
                eprintln!("  File: {}\n", path.display());
                eprintln!("  Error: {}\n", e);
                std::process::exit(1);
            }
        }
    }

    /// Load configuration: env vars -> file -> defaults. Instance parsing
    /// errors (bad selectors, missing credentials, conflicting aliased
    /// defaults) are not fatal-on-sight the way a malformed TOML file is;
    /// they are returned so the caller can decide how to surface them.
    pub fn from_env() -> anyhow::Result<Self> {
        let file = Self::load_file_config();

        let collection_interval_seconds = std::env::var("SPLUNK_COLLECTOR_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.collection_interval_seconds)
            .unwrap_or(DEFAULT_COLLECTION_INTERVAL_SECONDS);

        let instances = file
            .instances
            .into_iter()
            .map(FileInstance::into_instance_config)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            collection_interval_seconds,
            instances,
        })
    }

    /// Render this config back to TOML, used by `ensure_config_exists` and
    /// by the `config show`/`config reset` CLI subcommands. Passwords are
    /// never echoed back in full.
    pub fn to_toml(&self) -> String {
        let mut out = format!(
            "collection_interval_seconds = {}\n",
            self.collection_interval_seconds
        );
        for instance in &self.instances {
            out.push_str("\n[[instances]]\n");
            out.push_str(&format!("url = {:?}\n", instance.url));
            out.push_str(&format!("username = {:?}\n", instance.username));
            out.push_str("password = \"***\"\n");
            if !instance.tags.is_empty() {
                out.push_str(&format!("tags = {:?}\n", instance.tags));
            }
        }
        out
    }
}
