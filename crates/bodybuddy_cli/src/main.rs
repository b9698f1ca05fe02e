//! BodyBuddy CLI
//!
//! Command-line tools for the local exercise catalog.
//!
//! # Commands
//!
//! - `sync` - Mirror catalog collections from the remote API
//! - `list` - List the rows of one kind
//! - `show` - Print one row as JSON
//! - `language` - Read or change the selected language
//! - `inspect` - Display store statistics

mod commands;

use bodybuddy_sync::{EntityKind, DEFAULT_BASE_URL};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// BodyBuddy catalog tools.
#[derive(Parser)]
#[command(name = "bodybuddy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store file
    #[arg(global = true, short, long, default_value = "bodybuddy.bbj")]
    store: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror catalog collections from the remote API
    Sync {
        /// Kinds to sync (all if omitted)
        kinds: Vec<EntityKind>,

        /// API base URL
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: String,

        /// API token
        #[arg(long, env = "BODYBUDDY_TOKEN", hide_env_values = true, default_value = "")]
        token: String,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List the rows of one kind
    List {
        /// Kind to list
        kind: EntityKind,

        /// Attribute to sort by (defaults to the kind's display attribute)
        #[arg(long)]
        sort: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print one row as JSON
    Show {
        /// Kind of the row
        kind: EntityKind,

        /// Remote id of the row
        id: i64,
    },

    /// Read or change the selected language
    Language {
        #[command(subcommand)]
        action: LanguageAction,
    },

    /// Display store statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
enum LanguageAction {
    /// Show the selected language
    Get,
    /// Select a language by short name
    Set {
        /// Short name, e.g. `en`
        code: String,
    },
    /// Forget the selected language
    Clear,
    /// List the synced languages
    List,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Sync {
            kinds,
            base_url,
            token,
            timeout,
            format,
        } => {
            let options = commands::sync::SyncOptions {
                base_url,
                token,
                timeout,
            };
            commands::sync::run(&cli.store, &kinds, options, &format).await?;
        }
        Commands::List { kind, sort, format } => {
            commands::list::run(&cli.store, kind, sort.as_deref(), &format)?;
        }
        Commands::Show { kind, id } => {
            commands::show::run(&cli.store, kind, id)?;
        }
        Commands::Language { action } => match action {
            LanguageAction::Get => commands::language::get(&cli.store)?,
            LanguageAction::Set { code } => commands::language::set(&cli.store, &code)?,
            LanguageAction::Clear => commands::language::clear(&cli.store)?,
            LanguageAction::List => commands::language::list(&cli.store)?,
        },
        Commands::Inspect { format } => {
            commands::inspect::run(&cli.store, &format)?;
        }
    }

    Ok(())
}
