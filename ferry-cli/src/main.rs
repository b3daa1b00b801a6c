//! Ferry CLI

mod agent;

use agent::{builtin_registry, Agent};
use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use ferry_config::{load_and_merge, load_config, Config};
use ferry_core::Capability;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Ferry metrics forwarder", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the forwarder
    #[command(alias = "serve")]
    Run {
        /// Configuration files, merged in order
        #[arg(short, long, default_value = "ferry.yaml", env = "FERRY_CONFIG")]
        config: Vec<PathBuf>,

        /// Log level (trace, debug, info, warn, error)
        #[arg(short, long, default_value = "info")]
        log_level: String,

        /// Log output format
        #[arg(long, value_enum, default_value = "text")]
        log_format: LogFormat,
    },

    /// Validate configuration file
    Validate {
        /// Configuration files, merged in order
        #[arg(short, long, default_value = "ferry.yaml", env = "FERRY_CONFIG")]
        config: Vec<PathBuf>,
    },

    /// List builtin plugins and their options
    Plugins {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            log_level,
            log_format,
        } => {
            init_tracing(&log_level, log_format)?;

            tracing::info!("Starting Ferry");
            tracing::info!("Config files: {}", display_paths(&config));

            let config = load(&config)?;
            tracing::info!(
                entries = config.entry_count(),
                rebind_timeout = ?config.core.rebind_timeout,
                "Configuration loaded"
            );

            let report = Agent::new(config).run().await?;

            tracing::info!(
                started = report.setup.started,
                failed = report.setup.failed,
                bind_failures = report.bind_failures.len(),
                "Ferry stopped"
            );
            Ok(())
        }

        Commands::Validate { config } => {
            tracing_subscriber::fmt().with_target(false).init();

            tracing::info!("Validating configuration: {}", display_paths(&config));

            match load(&config) {
                Ok(cfg) => {
                    let manager = ferry_plugins::PluginManager::new(builtin_registry());
                    let mut skipped = 0;
                    for (capability, resolved) in manager.resolve_all(&cfg) {
                        tracing::info!(
                            "  {}: {} usable, {} skipped",
                            capability,
                            resolved.setups.len(),
                            resolved.skipped.len()
                        );
                        skipped += resolved.skipped.len();
                    }

                    if skipped > 0 {
                        tracing::warn!("Configuration loaded, {} entries will be skipped", skipped);
                    } else {
                        tracing::info!("Configuration is valid");
                    }
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Plugins { json } => {
            let registry = builtin_registry();
            if json {
                println!("{}", serde_json::to_string_pretty(&plugins_json(&registry))?);
            } else {
                print_plugins(&registry);
            }
            Ok(())
        }

        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "ferry", &mut std::io::stdout());
            Ok(())
        }

        Commands::Version => {
            println!("Ferry metrics forwarder");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

fn load(paths: &[PathBuf]) -> ferry_core::Result<Config> {
    match paths {
        [single] => load_config(single),
        _ => load_and_merge(paths.to_vec()),
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_plugins(registry: &ferry_plugins::PluginRegistry) {
    for plugin in registry.loaded() {
        let capabilities: Vec<_> = plugin.capabilities().iter().map(Capability::as_str).collect();

        println!("{} ({})", plugin.name(), plugin.source());
        if !plugin.description().is_empty() {
            println!("  {}", plugin.description());
        }
        println!("  capabilities: {}", capabilities.join(", "));

        for option in plugin.options() {
            match &option.default {
                Some(default) => println!("  {} (default: {})", option.name, default),
                None => println!("  {}", option.name),
            }
            if !option.modes.is_empty() {
                let modes: Vec<_> = option.modes.iter().map(Capability::as_str).collect();
                println!("    modes: {}", modes.join(", "));
            }
            for line in &option.help {
                println!("    {}", line);
            }
        }
    }
}

fn plugins_json(registry: &ferry_plugins::PluginRegistry) -> serde_json::Value {
    registry
        .loaded()
        .map(|plugin| {
            serde_json::json!({
                "name": plugin.name(),
                "source": plugin.source(),
                "description": plugin.description(),
                "capabilities": plugin.capabilities(),
                "options": plugin.options(),
            })
        })
        .collect()
}

fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(filter.into());

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_level(true),
            )
            .with(filter)
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json())
            .with(filter)
            .try_init()?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_alias() {
        let cli = Cli::try_parse_from(["ferry", "serve", "-c", "x.yaml"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { ref config, .. } if config == &[PathBuf::from("x.yaml")]));
    }

    #[test]
    fn test_layered_config_files() {
        let cli = Cli::try_parse_from(["ferry", "validate", "-c", "base.yaml", "-c", "host.toml"]).unwrap();
        let Commands::Validate { config } = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(config, vec![PathBuf::from("base.yaml"), PathBuf::from("host.toml")]);
        assert_eq!(display_paths(&config), "base.yaml, host.toml");
    }

    #[test]
    fn test_plugins_json() {
        let json = plugins_json(&builtin_registry());
        assert_eq!(json[0]["name"], "collectd");
        assert_eq!(json[0]["source"], "builtin");
        assert_eq!(json[0]["capabilities"], serde_json::json!(["input"]));
        assert_eq!(json[0]["options"][1]["default"], 25826);
    }
}
