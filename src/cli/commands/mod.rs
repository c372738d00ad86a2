//! CLI parser and command dispatch.

mod analyze;
mod llm;
mod query;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use paperlens::config::Config;
use paperlens::models::SummaryLength;

#[derive(Parser)]
#[command(name = "paperlens")]
#[command(about = "Structured analysis of papers and documents with local or remote LLMs")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true, env = "PAPERLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check verbosity before the parser runs, so logging can start first.
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a document and produce a structured analysis
    Analyze {
        /// PDF, text or Markdown file
        file: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize a document
    Summarize {
        /// PDF, text or Markdown file
        file: PathBuf,

        /// Summary length
        #[arg(short, long, value_enum, default_value_t = SummaryLength::Medium)]
        length: SummaryLength,
    },

    /// Answer a question about a document
    Ask {
        /// PDF, text or Markdown file
        file: PathBuf,

        /// The question
        question: String,
    },

    /// Show backend readiness, routing and effective configuration
    Status,

    /// Download the on-device model
    Pull,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load_with_override(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Analyze { file, json } => analyze::cmd_analyze(&config, &file, json).await,
        Commands::Summarize { file, length } => {
            query::cmd_summarize(&config, &file, length).await
        }
        Commands::Ask { file, question } => query::cmd_ask(&config, &file, &question).await,
        Commands::Status => llm::cmd_status(&config).await,
        Commands::Pull => llm::cmd_pull(&config).await,
    }
}
