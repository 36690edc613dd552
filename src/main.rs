use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stream_resolver::{
    config::{Config, TMDB_API_KEY_ENV},
    context::ResolverContext,
    models::{MediaKind, MediaRequest, RequesterId},
    pipeline::StreamResolver,
    providers::TmdbProvider,
};

#[derive(Parser)]
#[command(name = "stream-resolver")]
#[command(version)]
#[command(about = "Resolves catalog identifiers into playable stream URLs")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config.toml")]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve one identifier (`tt0944947` or `tt0944947:1:4`) and print the
    /// stream response as JSON
    Resolve {
        id: String,

        /// movie or series; inferred when omitted
        #[arg(short = 't', long = "type", default_value = "")]
        kind: String,

        /// Title to search for instead of resolving the identifier
        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        year: Option<u32>,

        /// Requester identity used by the fairness queue
        #[arg(short, long, default_value = "cli")]
        requester: String,
    },
    /// Print the effective configuration with credentials masked
    CheckEnv,
    /// Check a TMDb API key against the API
    VerifyTmdbKey {
        /// Key to check; defaults to the configured one
        key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("stream_resolver={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    match cli.command {
        Command::Resolve {
            id,
            kind,
            name,
            year,
            requester,
        } => resolve(&config, &id, &kind, name, year, &requester).await,
        Command::CheckEnv => {
            check_env(&config, &cli.config);
            Ok(())
        }
        Command::VerifyTmdbKey { key } => verify_tmdb_key(&config, key).await,
    }
}

async fn resolve(
    config: &Config,
    id: &str,
    kind: &str,
    name: Option<String>,
    year: Option<u32>,
    requester: &str,
) -> Result<()> {
    let kind: MediaKind = kind.parse()?;
    let mut request = MediaRequest::from_compound_id(kind, id);
    if let Some(name) = name {
        request = request.with_display_name(name);
    }
    if let Some(year) = year {
        request = request.with_year(year);
    }

    let ctx = ResolverContext::from_config(config)?;
    let resolver = StreamResolver::from_context(&ctx, config);
    let requester = RequesterId::from_client("local", requester);

    let response = resolver.handle(&requester, request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn check_env(config: &Config, config_file: &str) {
    println!("Configuration file: {config_file}");
    match config.metadata.masked_tmdb_key() {
        Some(masked) => println!("{TMDB_API_KEY_ENV}: {masked}"),
        None => println!("{TMDB_API_KEY_ENV}: not set (Wikidata only)"),
    }
    println!("TMDb language: {}", config.metadata.tmdb_language);
    println!("Wikidata language: {}", config.metadata.wikidata_language);
    println!(
        "Alternative titles: {}",
        if config.metadata.use_alternative_titles { "enabled" } else { "disabled" }
    );
    println!("Search endpoint: {}", config.endpoints.search_base_url);
    println!(
        "Gateway: {:?} between requests, {} retries",
        config.gateway.min_interval, config.gateway.max_retries
    );
    println!(
        "Queue: {} concurrent, {:?} max wait",
        config.queue.max_concurrent, config.queue.max_wait
    );
}

async fn verify_tmdb_key(config: &Config, key: Option<String>) -> Result<()> {
    let Some(key) = key.or_else(|| config.metadata.tmdb_key().map(str::to_string)) else {
        bail!("No TMDb API key given and {} is not set", TMDB_API_KEY_ENV);
    };

    let ctx = ResolverContext::from_config(config)?;
    let tmdb = TmdbProvider::new(
        ctx.gateway.clone(),
        config.endpoints.tmdb_base_url.clone(),
        key,
        config.metadata.tmdb_language.clone(),
    );

    if tmdb.verify_key().await? {
        println!("TMDb API key is valid");
        Ok(())
    } else {
        bail!("TMDb rejected the API key")
    }
}
