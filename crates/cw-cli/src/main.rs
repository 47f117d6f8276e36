//! catalog-walker CLI
//!
//! Command-line interface for inspecting and traversing a remote metadata
//! catalog without knowing its schema ahead of time.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;
mod config;

use commands::{cmd_get, cmd_type, cmd_walk, connect, WalkArgs};
use config::AppConfig;
use cw_observability::{describe_catalog_metrics, record_cache_stats, LoggingConfig};

#[derive(Parser)]
#[command(name = "catalog-walker")]
#[command(version)]
#[command(about = "Traverse a remote metadata catalog by type id", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "CATALOG_WALKER_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    /// Catalog base URL, overriding the configuration file
    #[arg(long, env = "CATALOG_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the schema of an asset type
    Type {
        /// Type identifier (e.g. database_table)
        type_id: String,
    },

    /// Resolve one asset
    Get {
        /// Asset id
        id: String,

        /// Asset type identifier
        #[arg(short = 't', long = "type")]
        type_id: String,

        /// Load only these properties (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        properties: Vec<String>,
    },

    /// Page through a collection relationship of an asset
    Walk {
        /// Asset id
        id: String,

        /// Asset type identifier
        #[arg(short = 't', long = "type")]
        type_id: String,

        /// Relationship property to walk
        relationship: String,

        /// Members per page
        #[arg(long)]
        page_size: Option<u32>,

        /// Resolve every member instead of listing references
        #[arg(long)]
        eager: bool,

        /// Stop after this many members
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show current configuration
    Config {
        /// Show secrets (redacted by default)
        #[arg(long)]
        show_secrets: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    cw_observability::init_logging_with_config(
        LoggingConfig::from_verbosity(cli.verbose).with_json(cli.format == OutputFormat::Json),
    );
    describe_catalog_metrics();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = AppConfig::load(&config_path).unwrap_or_else(|e| {
        if cli.verbose > 0 || cli.config.is_some() {
            eprintln!("{}: {:#}", "Using default configuration".yellow(), e);
        }
        AppConfig::default()
    });
    if let Some(base_url) = cli.base_url {
        config.connector.base_url = base_url;
    }

    if let Commands::Config { show_secrets } = cli.command {
        return cmd_config(config, show_secrets, cli.format);
    }

    let client = connect(&config).await?;
    let outcome = match cli.command {
        Commands::Type { type_id } => cmd_type(&client, &type_id, cli.format).await,
        Commands::Get {
            id,
            type_id,
            properties,
        } => cmd_get(&client, &id, &type_id, &properties, cli.format).await,
        Commands::Walk {
            id,
            type_id,
            relationship,
            page_size,
            eager,
            limit,
        } => {
            cmd_walk(
                &client,
                WalkArgs {
                    id,
                    type_id,
                    relationship,
                    page_size,
                    eager,
                    limit,
                },
                cli.format,
            )
            .await
        }
        Commands::Config { .. } => Ok(()),
    };

    let stats = client.cache_stats();
    record_cache_stats(&stats);
    tracing::debug!(
        hits = stats.hits,
        misses = stats.misses,
        joined = stats.joined,
        "Cache statistics"
    );

    outcome
}

fn default_config_path() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("io", "catalog-walker", "catalog-walker") {
        dirs.config_dir().join("config.yaml")
    } else {
        PathBuf::from("config/catalog-walker.yaml")
    }
}

fn cmd_config(config: AppConfig, show_secrets: bool, format: OutputFormat) -> Result<()> {
    let display_config = if show_secrets {
        config
    } else {
        config.redact_secrets()
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&display_config)?);
    } else {
        println!("{}", "Configuration".bold());
        println!("─────────────────────");
        print!("{}", serde_yaml::to_string(&display_config)?);
    }

    Ok(())
}
