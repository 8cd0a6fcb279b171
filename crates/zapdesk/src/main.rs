// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Zapdesk - WhatsApp webhook ingestion and CRM synchronization.
//!
//! This is the binary entry point for the Zapdesk service.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod reconcile;
mod serve;
mod shutdown;

use clap::{Parser, Subcommand};

/// Zapdesk - WhatsApp webhook ingestion and CRM synchronization.
#[derive(Parser, Debug)]
#[command(name = "zapdesk", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook and management HTTP server.
    Serve,
    /// Run duplicate-contact reconciliation once and print the report.
    Reconcile,
    /// Inspect Zapdesk configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate configuration and exit.
    Check,
    /// Print the effective configuration as JSON (secrets redacted).
    Show,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match zapdesk_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            zapdesk_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => {
            init_tracing(&config.server.log_level);
            serve::run_serve(config).await
        }
        Some(Commands::Reconcile) => {
            init_tracing(&config.server.log_level);
            reconcile::run_reconcile(config).await
        }
        Some(Commands::Config { action: ConfigCommand::Check }) => {
            println!("zapdesk: configuration is valid");
            Ok(())
        }
        Some(Commands::Config { action: ConfigCommand::Show }) => {
            println!("{}", redacted_config_json(&config));
            Ok(())
        }
        None => {
            println!("zapdesk: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("zapdesk={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

const SECRET_KEYS: &[&str] = &[
    "bearer_token",
    "api_key",
    "secret_key",
    "verify_token",
    "app_secret",
    "flow_service_token",
];

fn redacted_config_json(config: &zapdesk_config::ZapdeskConfig) -> String {
    let mut value = serde_json::to_value(config).unwrap_or(serde_json::Value::Null);
    redact(&mut value);
    serde_json::to_string_pretty(&value).unwrap_or_default()
}

fn redact(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if SECRET_KEYS.contains(&key.as_str()) && !v.is_null() {
                    *v = serde_json::Value::String("[redacted]".into());
                } else {
                    redact(v);
                }
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn default_config_is_valid() {
        let config = zapdesk_config::load_and_validate_str("").expect("defaults should validate");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn cli_parses_config_check() {
        let cli = Cli::try_parse_from(["zapdesk", "config", "check"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config { action: ConfigCommand::Check })
        ));
    }

    #[test]
    fn show_redacts_secrets() {
        let mut config = zapdesk_config::ZapdeskConfig::default();
        config.server.bearer_token = Some("tok-abc".into());
        config.evolution.api_key = Some("evo-key".into());
        let json = redacted_config_json(&config);
        assert!(!json.contains("tok-abc"));
        assert!(!json.contains("evo-key"));
        assert!(json.contains("[redacted]"));
    }
}
