use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use tracing::info;

use hatewatch::classifier::onnx::OnnxClassifier;
use hatewatch::classifier::openai::ChatCompletionsClient;
use hatewatch::classifier::rate_limiter::RateLimiter;
use hatewatch::classifier::TextClassifier;
use hatewatch::config::{self, Config, LogFormat};
use hatewatch::db::models::Platform;
use hatewatch::db::{self, Database};
use hatewatch::output::terminal;
use hatewatch::pipeline::{self, Labeling, RetryPolicy};
use hatewatch::report::Summary;
use hatewatch::sources::quora::QuoraConnector;
use hatewatch::sources::reddit::RedditConnector;
use hatewatch::sources::twitter::TwitterConnector;
use hatewatch::sources::Connector;

/// hatewatch: collect, clean and label social media posts for cyberbullying research.
///
/// Scrapes Reddit, Quora and Twitter/X into a local SQLite database,
/// validates and normalizes post titles, and labels each one as cyberhate
/// or not with an LLM.
#[derive(Parser)]
#[command(name = "hatewatch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Collect posts from the configured sources into the raw table
    Scrape {
        /// Sources to run (default: HATEWATCH_SOURCES). Repeat or comma-separate.
        #[arg(long = "source", value_delimiter = ',')]
        sources: Vec<String>,
    },

    /// Validate and normalize raw titles into the cleaned table
    Clean,

    /// Label every cleaned post with the LLM
    Label {
        /// Completion calls in flight at once (default: LABEL_CONCURRENCY)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Run the full pipeline: scrape, clean, label
    Run {
        #[arg(long = "source", value_delimiter = ',')]
        sources: Vec<String>,

        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Classify a piece of text with the local trained model
    Classify {
        /// The text to classify
        text: String,
    },

    /// Show table counts and when each stage last ran
    Status,

    /// Summarize the labelled data
    Report {
        /// Number of most recent rows to list
        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    let config = Config::load()?;
    init_logging(config.log_format);

    let cli = Cli::parse();
    let policy = RetryPolicy::default();

    match cli.command {
        Commands::Init => {
            info!("Initializing hatewatch database...");
            let db = db::initialize_sqlite(&config.db_path)?;
            let table_count = db.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nNext step: set up your .env file");
            println!("  (see .env.example for required variables)");
            println!("\nThen run: hatewatch run");
        }

        Commands::Scrape { sources } => {
            let platforms = resolve_platforms(&config, &sources)?;
            let connectors = build_connectors(&config, &platforms)?;
            let db = db::initialize_sqlite(&config.db_path)?;

            let stats = pipeline::scrape_stage(&db, &connectors, &policy).await?;
            terminal::display_connector_stats(&stats);
        }

        Commands::Clean => {
            let db = db::open_sqlite(&config.db_path)?;
            let report = pipeline::clean_stage(&db, &policy).await?;
            terminal::display_quality_report(&report);
        }

        Commands::Label { concurrency } => {
            let labeling = build_labeling(&config, concurrency)?;
            let db = db::open_sqlite(&config.db_path)?;
            let stats = pipeline::label_stage(&db, &labeling, &policy).await?;
            terminal::display_label_stats(&stats);
        }

        Commands::Run {
            sources,
            concurrency,
        } => {
            // Check every credential up front so a missing key doesn't
            // surface only after a long scrape
            let platforms = resolve_platforms(&config, &sources)?;
            let connectors = build_connectors(&config, &platforms)?;
            let labeling = build_labeling(&config, concurrency)?;
            let db = db::initialize_sqlite(&config.db_path)?;

            let summary = pipeline::run_all(&db, &connectors, &labeling, &policy).await?;
            terminal::display_connector_stats(&summary.connectors);
            terminal::display_quality_report(&summary.quality);
            terminal::display_label_stats(&summary.labels);
        }

        Commands::Classify { text } => {
            config.require_model()?;
            let classifier = OnnxClassifier::load(&config.model_dir)?;
            let classification = classifier.classify(&text).await?;
            terminal::display_classification(&text, &classification);
        }

        Commands::Status => {
            if hatewatch::status::is_uninitialized(&config.db_path) {
                println!("Database: not initialized");
                println!("\nRun `hatewatch init` to set up the database.");
                return Ok(());
            }
            let db = db::open_sqlite(&config.db_path)?;
            hatewatch::status::show(&db, &config.db_path).await?;
        }

        Commands::Report { limit } => {
            let db = db::open_sqlite(&config.db_path)?;
            let rows = db.labelled_view(None).await?;
            let summary = Summary::from_rows(&rows);
            let recent: Vec<_> = rows.into_iter().take(limit as usize).collect();
            terminal::display_report(&summary, &recent);
            if summary.total_posts > 0 && summary.cyberhate_percent.is_none() {
                println!("\n  {}", "No rows carry a label value yet.".yellow());
            }
        }
    }

    Ok(())
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hatewatch=info"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// --source flags win over HATEWATCH_SOURCES.
fn resolve_platforms(config: &Config, flags: &[String]) -> Result<Vec<Platform>> {
    if flags.is_empty() {
        return Ok(config.sources.clone());
    }
    config::parse_platforms(&flags.join(","))
}

fn build_connectors(config: &Config, platforms: &[Platform]) -> Result<Vec<Arc<dyn Connector>>> {
    let mut connectors: Vec<Arc<dyn Connector>> = Vec::new();
    for platform in platforms {
        match platform {
            Platform::Reddit => {
                config.require_reddit()?;
                connectors.push(Arc::new(RedditConnector::new(config.reddit())?));
            }
            Platform::Quora => {
                connectors.push(Arc::new(QuoraConnector::new(config.quora())));
            }
            Platform::Twitter => {
                config.require_twitter()?;
                connectors.push(Arc::new(TwitterConnector::new(config.twitter())?));
            }
        }
    }
    Ok(connectors)
}

fn build_labeling(config: &Config, concurrency: Option<usize>) -> Result<Labeling> {
    config.require_llm()?;
    let client = ChatCompletionsClient::new(&config.llm_api_key)?
        .with_base_url(&config.llm_base_url)
        .with_model(&config.llm_model);
    info!(model = client.model(), "Using completion API");

    Ok(Labeling {
        client: Arc::new(client),
        limiter: RateLimiter::new(config.label_delay),
        concurrency: concurrency.unwrap_or(config.label_concurrency),
    })
}
