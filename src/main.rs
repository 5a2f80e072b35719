use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pdf_rag::Result;
use pdf_rag::commands::{ingest_document, init_config, run_query, serve_chat, show_config};
use pdf_rag::config::{Config, default_config_path};

#[derive(Parser)]
#[command(name = "pdf-rag")]
#[command(about = "Ask questions about a PDF using Ollama embeddings and a LanceDB vector store")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value_os_t = default_config_path())]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, chunk and embed a document into the vector store
    Ingest {
        /// Document to ingest instead of the configured one
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Search the vector store interactively
    Query,
    /// Start the HTTP chat service
    Serve,
    /// Show the effective configuration
    Config {
        /// Write a default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Config { init: true } = cli.command {
        return init_config(&cli.config);
    }

    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Ingest { source } => {
            ingest_document(&config, source).await?;
        }
        Commands::Query => {
            run_query(&config).await?;
        }
        Commands::Serve => {
            serve_chat(&config).await?;
        }
        Commands::Config { .. } => {
            show_config(&config, &cli.config)?;
        }
    }

    Ok(())
}
