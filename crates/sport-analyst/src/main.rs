use std::path::PathBuf;

use analysis_core::{AnalysisRequest, MediaKind};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sport_analyst::{AnalystConfig, Analyzer};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file (ANALYST_* environment variables still override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse one piece of content and print the result as JSON
    Analyze {
        /// Content reference, usually a file name
        #[arg(long)]
        subject: String,

        /// video, image or document
        #[arg(long, default_value = "video")]
        media: MediaKind,

        #[arg(long)]
        sport: String,

        #[arg(long)]
        position: Option<String>,

        /// Skill level hint (beginner, intermediate, advanced, elite)
        #[arg(long)]
        level: Option<String>,

        /// Free-text description of the content
        #[arg(long)]
        context: Option<String>,

        /// Run the five sub-analyses and print the weighted composite
        #[arg(long, default_value_t = false)]
        comprehensive: bool,
    },

    /// Suggest vocabulary tags matching a query
    Suggest {
        #[arg(long)]
        query: String,

        #[arg(long)]
        sport: Option<String>,
    },

    /// Probe the configured backend
    Health,
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AnalystConfig::load(path)?,
        None => AnalystConfig::from_env(),
    };
    let analyzer = Analyzer::new(config).context("building analyzer")?;

    match args.command {
        Command::Analyze {
            subject,
            media,
            sport,
            position,
            level,
            context,
            comprehensive,
        } => {
            let mut request = AnalysisRequest::new(subject, media, sport);
            request.position_hint = position;
            request.skill_level_hint = level;
            request.free_text_context = context;

            if comprehensive {
                print_json(&analyzer.analyze_comprehensive(&request).await?)?;
            } else {
                print_json(&analyzer.analyze(&request).await?)?;
            }
        }
        Command::Suggest { query, sport } => {
            print_json(&analyzer.suggest_tags(&query, sport.as_deref()))?;
        }
        Command::Health => {
            print_json(&analyzer.health_check().await)?;
        }
    }

    Ok(())
}
