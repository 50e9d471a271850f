//! Text classifier CLI
//!
//! A command-line tool for classifying text, reading monitoring metrics and
//! requesting retrains from a running classifier service.

mod client;
mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::{classify, monitoring};

/// Text classifier CLI
#[derive(Parser)]
#[command(name = "clf")]
#[command(author, version, about = "CLI for the Text Classifier service", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via CLF_API_URL env var)
    #[arg(long, env = "CLF_API_URL", default_value = "http://localhost:5000")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify a piece of text
    Predict {
        /// Text to classify
        text: String,
    },

    /// Show the prediction metrics summary
    Metrics,

    /// Request a manual model retrain
    Retrain,

    /// Show service health and readiness
    Health,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let client = client::ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Predict { text } => classify::predict(&client, text, cli.format).await,
        Commands::Metrics => monitoring::show_metrics(&client, cli.format).await,
        Commands::Retrain => classify::retrain(&client, cli.format).await,
        Commands::Health => monitoring::show_health(&client, cli.format).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
