use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use sumo_source::apply::executor::TaskExecutor;
use sumo_source::config::{load_apply_config, load_sumo_config, SumoConfig};
use sumo_source::sumologic::Collector;

#[derive(Parser)]
#[command(name = "sumo-source")]
#[command(about = "Declarative management of Sumo Logic collector sources")]
#[command(version)]
struct Cli {
    /// Configuration directory (default: /etc/sumo-source/config if exists, otherwise ~/.config/sumo-source/config)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply source tasks to the collector
    Apply {
        /// Perform dry run (only report planned changes)
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate source tasks without contacting the API
    Validate,
    /// Show whether the configured collector exists
    Collector,
    /// List the sources registered on the collector
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Determine config directory with proper precedence:
    // 1. CLI argument if provided
    // 2. System-wide config (/etc/sumo-source/config) if it exists
    // 3. User config (~/.config/sumo-source/config)
    let config_dir = cli.config.unwrap_or_else(|| {
        let system_config = PathBuf::from("/etc/sumo-source/config");
        if system_config.exists() {
            system_config
        } else {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sumo-source")
                .join("config")
        }
    });
    debug!("Using config directory: {}", config_dir.display());

    match cli.command {
        Commands::Apply { dry_run } => {
            println!("Applying source tasks from: {}", config_dir.display());
            if dry_run {
                println!("Dry run mode - no changes will be made");
            }

            let sumo_config = load_sumo_config(&config_dir)?;
            let apply_config = load_apply_config(&config_dir)?;

            let mut executor = TaskExecutor::new(dry_run).disabled(sumo_config.disabled);
            if let Err(e) = executor.validate(&apply_config) {
                eprintln!("Configuration validation failed: {}", e);
                std::process::exit(1);
            }

            let mut collector = build_collector(&sumo_config)?;
            if let Err(e) = executor.execute(&apply_config, &mut collector).await {
                error!("Task execution failed: {:#}", e);
                eprintln!("Task execution failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Validate => {
            let apply_config = load_apply_config(&config_dir)?;
            if let Err(e) = TaskExecutor::new(true).validate(&apply_config) {
                eprintln!("Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Collector => {
            let sumo_config = load_sumo_config(&config_dir)?;
            let mut collector = build_collector(&sumo_config)?;
            let name = collector.name().to_string();
            match collector.metadata().await? {
                Some(info) => println!("Collector '{}' exists (id {})", info.name, info.id),
                None => {
                    println!("Collector '{}' not found", name);
                    std::process::exit(1);
                }
            }
        }
        Commands::Sources => {
            let sumo_config = load_sumo_config(&config_dir)?;
            let mut collector = build_collector(&sumo_config)?;
            let sources = collector.sources().await?;
            println!("{} sources on collector:", sources.len());
            for source in sources {
                println!(
                    "  {} (id {}): {} [{}]",
                    source.name,
                    source.id,
                    source.path_expression.as_deref().unwrap_or("-"),
                    source.category.as_deref().unwrap_or("-")
                );
            }
        }
    }

    Ok(())
}

fn build_collector(config: &SumoConfig) -> anyhow::Result<Collector> {
    config.validate()?;
    let name = config.resolve_collector_name()?;
    debug!("Managing collector '{}' via {}", name, config.api_endpoint);
    Ok(Collector::from_config(config, name)?)
}
