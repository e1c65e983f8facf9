use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use loam::config::ServerConfig;
use loam::media::MediaService;
use loam::schema::{GetOptions, ListOptions, SchemaRegistry, SchemaStore};
use loam::store::{SqliteStore, Store};
use loam::sync::NoSync;
use loam::types::ProjectContext;

#[derive(Parser)]
#[command(name = "loam")]
#[command(about = "A headless CMS core", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "loam.toml")]
    config: PathBuf,

    /// Project scope for schema and media commands
    #[arg(long, default_value = "default")]
    project: String,

    /// Environment scope for schema and media commands
    #[arg(long, default_value = "live")]
    environment: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Inspect schemas
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },

    /// Inspect media
    Media {
        #[command(subcommand)]
        command: MediaCommands,
    },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// List schemas across all tiers
    List,

    /// Print one schema as JSON
    Get {
        id: String,

        /// Merge inherited field definitions down the parent chain
        #[arg(long)]
        resolve: bool,
    },
}

#[derive(Subcommand)]
enum MediaCommands {
    /// List media entries for the environment
    List,
}

fn run_init(config: &ServerConfig) -> anyhow::Result<()> {
    let db_path = config.db_path();
    if db_path.exists() {
        bail!("Already initialized: {} exists", db_path.display());
    }

    fs::create_dir_all(&config.data_dir)?;
    for type_tag in ["content", "field"] {
        fs::create_dir_all(config.schemas_dir().join(type_tag))?;
    }
    fs::create_dir_all(config.plugins_dir())?;

    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    info!("database created at {}", db_path.display());
    println!("Initialized data directory at {}", config.data_dir.display());
    Ok(())
}

fn open_schema_store(config: &ServerConfig) -> anyhow::Result<SchemaStore> {
    let store = SqliteStore::new(config.db_path())?;
    let registry = SchemaRegistry::build(&config.data_dir)?;
    Ok(SchemaStore::new(
        Arc::new(registry),
        Arc::new(store),
        Arc::new(NoSync),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("loam=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::load(&cli.config)?;
    let ctx = ProjectContext::new(cli.project.clone(), cli.environment.clone());

    match cli.command {
        Commands::Init => run_init(&config)?,

        Commands::Schema { command } => match command {
            SchemaCommands::List => {
                let schemas = open_schema_store(&config)?;
                for schema in schemas.list(&ctx, &ListOptions::default()).await? {
                    let locked = if schema.locked { "locked" } else { "custom" };
                    println!("{}\t{}\t{}\t{}", schema.id, schema.type_tag(), locked, schema.name);
                }
            }
            SchemaCommands::Get { id, resolve } => {
                let schemas = open_schema_store(&config)?;
                let options = if resolve {
                    GetOptions::resolved()
                } else {
                    GetOptions::default()
                };
                match schemas.get(&ctx, &id, &options).await? {
                    Some(schema) => println!("{}", serde_json::to_string_pretty(&schema)?),
                    None => bail!("schema '{id}' not found"),
                }
            }
        },

        Commands::Media { command } => match command {
            MediaCommands::List => {
                let store = SqliteStore::new(config.db_path())?;
                let media = MediaService::from_config(Arc::new(store), &config, &cli.environment)?;
                for entry in media.list(&ctx).await? {
                    println!("{}", serde_json::to_string(&entry)?);
                }
            }
        },
    }

    Ok(())
}
