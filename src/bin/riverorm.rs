//! CLI for checking connections and running ad-hoc statements

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use riverorm::{init_logging, naming, Database, OrmConfig};

/// Entry point for the riverorm CLI
#[derive(Parser)]
#[command(name = "riverorm")]
#[command(
    about = "Run statements against the databases configured for riverorm",
    long_about = None
)]
struct Cli {
    /// Path to a TOML configuration file (environment variables otherwise)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Registry alias to use (`postgres` or `mysql`); the configured default otherwise
    #[arg(short, long, value_name = "ALIAS", global = true)]
    alias: Option<String>,

    /// Log every statement
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and disconnect
    Ping,
    /// Run a statement and print the affected-row count
    Exec {
        /// SQL statement
        sql: String,
    },
    /// Run a SELECT and print rows as JSON lines
    Query {
        /// SELECT statement
        sql: String,
    },
    /// Print the table name derived for a model type name
    TableName {
        /// Model type name, e.g. `UserNDAContract`
        type_name: String,
        /// Explicit override
        #[arg(long)]
        table_name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => OrmConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => OrmConfig::from_env().context("invalid environment configuration")?,
    };
    config.debug |= cli.debug;
    init_logging(config.debug);

    if let Commands::TableName {
        type_name,
        table_name,
    } = &cli.command
    {
        println!("{}", naming::table_name(type_name, table_name.as_deref()));
        return Ok(());
    }

    let mut registry = config.into_registry()?;
    let db = registry.get_mut(cli.alias.as_deref())?;
    let db_type = db.database_type();
    db.connect()
        .await
        .with_context(|| format!("failed to connect to {}", db_type))?;

    let result = match &cli.command {
        Commands::Ping => {
            println!("{}: ok", db.database_type());
            Ok(())
        }
        Commands::Exec { sql } => db.execute(sql, &[]).await.map(|affected| {
            println!("{} row(s) affected", affected);
        }),
        Commands::Query { sql } => db.fetch(sql, &[]).await.map(|rows| {
            for row in rows {
                println!("{}", serde_json::Value::Object(row.to_json()));
            }
        }),
        Commands::TableName { .. } => Ok(()),
    };

    db.close().await?;
    Ok(result?)
}
