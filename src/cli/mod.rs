//! CLI parser and command dispatch.

mod commands;
mod helpers;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use doctag::config::{load_settings, LoadOptions};

#[derive(Parser)]
#[command(name = "doctag")]
#[command(about = "Tag and summarize documents with an AI model")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides config file)
    #[arg(long, global = true, env = "DOCTAG_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files: extract text, generate tags and a summary, store them
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Media type (guessed from the name and content when omitted)
        #[arg(long)]
        media_type: Option<String>,
        /// Skip the AI service and use keyword tags
        #[arg(long)]
        offline: bool,
        /// Do not keep a copy of the original
        #[arg(long)]
        no_archive: bool,
        /// Print the stored document as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored documents
    List {
        /// Filter by title, summary or tag name
        #[arg(short, long)]
        search: Option<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a document (tags no longer used by any document go too)
    Delete {
        /// Document ID
        doc_id: String,
    },

    /// Change a document's processing status
    Status {
        /// Document ID
        doc_id: String,
        /// New status: processing, processed or error
        status: String,
    },

    /// Show where a document's original can be opened or downloaded
    Open {
        /// Document ID
        doc_id: String,
        /// Base URL for stored files (overrides config)
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Manage the tag catalog
    Tags {
        #[command(subcommand)]
        command: TagCommands,
    },

    /// Follow the store and print changes until interrupted
    Watch {
        /// Seconds between periodic refreshes (overrides config)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Show the effective configuration
    Config,
}

#[derive(Subcommand)]
enum TagCommands {
    /// List catalog tags with usage counts
    List {
        /// Only tags of this category: entity, theme or keyword
        #[arg(short, long)]
        category: Option<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rename a tag everywhere
    Rename {
        /// Tag ID
        tag_id: String,
        /// New name
        name: String,
    },

    /// Delete a tag and remove it from every document
    Delete {
        /// Tag ID
        tag_id: String,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data_dir: cli.data_dir,
    };
    let settings = load_settings(options).await?;

    match cli.command {
        Commands::Upload {
            files,
            media_type,
            offline,
            no_archive,
            json,
        } => {
            commands::upload::cmd_upload(
                &settings,
                &files,
                media_type.as_deref(),
                offline,
                no_archive,
                json,
            )
            .await
        }
        Commands::List { search, json } => {
            commands::documents::cmd_list(&settings, search.as_deref(), json).await
        }
        Commands::Delete { doc_id } => commands::documents::cmd_delete(&settings, &doc_id).await,
        Commands::Status { doc_id, status } => {
            commands::documents::cmd_status(&settings, &doc_id, &status).await
        }
        Commands::Open { doc_id, base_url } => {
            commands::documents::cmd_open(&settings, &doc_id, base_url.as_deref()).await
        }
        Commands::Tags { command } => match command {
            TagCommands::List { category, json } => {
                commands::tags::cmd_tags_list(&settings, category.as_deref(), json).await
            }
            TagCommands::Rename { tag_id, name } => {
                commands::tags::cmd_tags_rename(&settings, &tag_id, &name).await
            }
            TagCommands::Delete { tag_id } => {
                commands::tags::cmd_tags_delete(&settings, &tag_id).await
            }
        },
        Commands::Watch { interval } => commands::watch::cmd_watch(&settings, interval).await,
        Commands::Config => commands::config_cmd::cmd_config(&settings).await,
    }
}
