//! Command-line surface (spec §4.7, ambient): subcommands for inspecting
//! and managing the on-disk config file. Mirrors the teacher's
//! `cli::handle_cli() -> bool` early-return convention — `main()` calls this
//! first and exits immediately if a subcommand was handled.

use splunk_event_collector::config::{AppConfig, VERSION};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::process::Command;

/// Periodic saved-search dispatcher and temporal-cursor scheduler
#[derive(Parser)]
#[command(name = "splunk-event-collector")]
#[command(version = VERSION)]
#[command(about = "Periodic saved-search dispatcher and temporal-cursor scheduler", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,

        /// Open config file in $EDITOR
        #[arg(long)]
        edit: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

/// Handle CLI commands. Returns true if a command was handled (exit after).
pub fn handle_cli() -> bool {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config {
            show,
            reset,
            edit,
            path,
        }) => {
            if path {
                handle_config_path();
            } else if show {
                handle_config_show();
            } else if reset {
                handle_config_reset();
            } else if edit {
                handle_config_edit();
            } else {
                println!("Usage: splunk-event-collector config [--show|--reset|--edit|--path]");
                println!();
                println!("Options:");
                println!("  --show    Display effective configuration");
                println!("  --reset   Reset config file to defaults");
                println!("  --edit    Open config file in $EDITOR");
                println!("  --path    Show config file path");
            }
            true
        }
        None => false, // No subcommand, run the scheduler
    }
}

fn handle_config_path() {
    match AppConfig::config_path() {
        Some(path) => println!("{}", path.display()),
        None => {
            eprintln!("Error: Could not determine config path");
            std::process::exit(1);
        }
    }
}

fn handle_config_show() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    println!("# Effective configuration (env > file > defaults)");
    println!();
    println!(
        "collection_interval_seconds = {}",
        config.collection_interval_seconds
    );
    println!("instances = {}", config.instances.len());
    for instance in &config.instances {
        println!();
        println!("[instance {:?}]", instance.key);
        println!("  url = {:?}", instance.url);
        println!("  username = {:?}", instance.username);
        println!("  saved_searches = {}", instance.saved_searches.len());
        println!(
            "  saved_searches_parallel = {}",
            instance.defaults.saved_searches_parallel
        );
        println!(
            "  max_query_chunk_seconds = {}",
            instance.defaults.max_query_chunk_seconds
        );
    }

    println!();
    if let Some(path) = AppConfig::config_path() {
        if path.exists() {
            println!("# Source: {}", path.display());
        } else {
            println!("# Source: defaults (no config file)");
        }
    }
}

fn handle_config_reset() {
    let Some(path) = AppConfig::config_path() else {
        eprintln!("Error: Could not determine config path");
        std::process::exit(1);
    };

    if path.exists() {
        eprint!(
            "Config file exists at {}. Overwrite? [y/N] ",
            path.display()
        );
        std::io::stderr().flush().unwrap();

        let mut input = String::new();
        std::io::stdin().read_line(&mut input).unwrap();

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return;
        }
    }

    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Error creating directory: {}", e);
            std::process::exit(1);
        }
    }

    if let Err(e) = std::fs::write(&path, AppConfig::default().to_toml()) {
        eprintln!("Error writing config: {}", e);
        std::process::exit(1);
    }

    println!("Config reset to defaults: {}", path.display());
}

fn handle_config_edit() {
    let Some(path) = AppConfig::config_path() else {
        eprintln!("Error: Could not determine config path");
        std::process::exit(1);
    };

    if !path.exists() {
        AppConfig::ensure_config_exists();
        println!("Created new config file: {}", path.display());
    }

    let editor = std::env::var("EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .unwrap_or_else(|_| {
            if cfg!(windows) {
                "notepad".to_string()
            } else {
                "nano".to_string()
            }
        });

    println!("Opening {} with {}", path.display(), editor);

    let status = Command::new(&editor).arg(&path).status();

    match status {
        Ok(s) if s.success() => {}
        Ok(s) => {
            eprintln!("Editor exited with status: {}", s);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to launch editor '{}': {}", editor, e);
            eprintln!("Set $EDITOR environment variable to your preferred editor");
            std::process::exit(1);
        }
    }
}
