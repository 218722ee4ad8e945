use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use catalog::{
    CatalogApi, CatalogId, CatalogPaginator, MetadataEnricher, MovieRecord, SimilarityResult,
    TmdbClient, TmdbConfig, DEFAULT_BASE_URL,
};
use ml_client::{EmbeddingClient, EmbeddingGateway};
use pipeline::{BuildReport, IndexBuilder, RecommendationResolver, DEFAULT_CONCURRENCY};
use server::AppState;

/// movie-recs - content-based movie recommendations
#[derive(Parser)]
#[command(name = "movie-recs")]
#[command(about = "Index a movie catalog into an embedding service and query it by title", long_about = None)]
struct Cli {
    /// Catalog API credential, sent as the api_key query parameter
    #[arg(long, env = "TMDB_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Base URL of the catalog API
    #[arg(long, env = "TMDB_BASE_URL", default_value = DEFAULT_BASE_URL)]
    catalog_url: String,

    /// Address of the embedding service
    #[arg(long, env = "EMBEDDING_SERVICE_ADDR", default_value = "http://localhost:50051")]
    embedding_addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit every top-rated catalog movie to the embedding service
    BuildIndex {
        /// Number of movies processed at once
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Attempts per movie submission before it counts as failed
        #[arg(long, default_value = "3")]
        max_attempts: usize,
    },

    /// Get movies similar to a title
    Recommend {
        /// Movie title to search for
        #[arg(long)]
        title: String,

        /// Number of recommendations to return
        #[arg(long, default_value = "5")]
        limit: u32,
    },

    /// Show the single most similar movie to a title
    Similar {
        /// Movie title to search for
        #[arg(long)]
        title: String,
    },

    /// Show the metadata submitted for a title
    Show {
        /// Movie title to search for
        #[arg(long)]
        title: String,
    },

    /// Store a precomputed embedding for a movie
    AddEmbedding {
        /// Catalog identifier of the movie
        #[arg(long)]
        id: CatalogId,

        /// Comma-separated embedding values
        #[arg(long, value_delimiter = ',', required = true)]
        values: Vec<f32>,
    },

    /// Serve the HTML search page
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let catalog: Arc<dyn CatalogApi> = Arc::new(
        TmdbClient::new(TmdbConfig::new(&cli.api_key).with_base_url(&cli.catalog_url))
            .context("Failed to create catalog client")?,
    );

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::BuildIndex {
            concurrency,
            max_attempts,
        } => {
            let gateway = connect_gateway(&cli.embedding_addr).await?;
            handle_build_index(catalog, gateway, concurrency, max_attempts, &cancel).await?
        }
        Commands::Recommend { title, limit } => {
            let gateway = connect_gateway(&cli.embedding_addr).await?;
            handle_recommend(catalog, gateway, &title, limit, &cancel).await?
        }
        Commands::Similar { title } => {
            let gateway = connect_gateway(&cli.embedding_addr).await?;
            handle_similar(catalog, gateway, &title, &cancel).await?
        }
        Commands::Show { title } => {
            let gateway = lazy_gateway(&cli.embedding_addr)?;
            handle_show(catalog, gateway, &title, &cancel).await?
        }
        Commands::AddEmbedding { id, values } => {
            let gateway = connect_gateway(&cli.embedding_addr).await?;
            handle_add_embedding(gateway, id, values).await?
        }
        Commands::Serve { bind } => {
            // The page comes up even while the service is down
            let gateway = lazy_gateway(&cli.embedding_addr)?;
            handle_serve(catalog, gateway, &bind, cancel).await?
        }
    }

    Ok(())
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, shutting down");
            cancel.cancel();
        }
    });
}

async fn connect_gateway(addr: &str) -> Result<Arc<dyn EmbeddingGateway>> {
    let client = EmbeddingClient::connect(addr)
        .await
        .with_context(|| format!("Failed to connect to embedding service at {addr}"))?;
    Ok(Arc::new(client))
}

/// Gateway that connects on first use.
fn lazy_gateway(addr: &str) -> Result<Arc<dyn EmbeddingGateway>> {
    let client = EmbeddingClient::connect_lazy(addr)
        .with_context(|| format!("Invalid embedding service address {addr}"))?;
    Ok(Arc::new(client))
}

/// Handle the 'build-index' command
async fn handle_build_index(
    catalog: Arc<dyn CatalogApi>,
    gateway: Arc<dyn EmbeddingGateway>,
    concurrency: usize,
    max_attempts: usize,
    cancel: &CancellationToken,
) -> Result<()> {
    let builder = IndexBuilder::new(
        CatalogPaginator::new(catalog.clone()),
        MetadataEnricher::new(catalog),
        gateway,
    )
    .with_concurrency(concurrency)
    .with_max_attempts(max_attempts);

    let report = builder.build(cancel).await.context("Index build aborted")?;
    print_report(&report);

    report.into_result()?;
    Ok(())
}

/// Handle the 'recommend' command
async fn handle_recommend(
    catalog: Arc<dyn CatalogApi>,
    gateway: Arc<dyn EmbeddingGateway>,
    title: &str,
    limit: u32,
    cancel: &CancellationToken,
) -> Result<()> {
    let resolver = RecommendationResolver::new(catalog, gateway);
    let recommendations = resolver.resolve(title, limit, cancel).await?;

    print_recommendations(title, &recommendations);
    Ok(())
}

/// Handle the 'similar' command
async fn handle_similar(
    catalog: Arc<dyn CatalogApi>,
    gateway: Arc<dyn EmbeddingGateway>,
    title: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let resolver = RecommendationResolver::new(catalog.clone(), gateway);
    let best = resolver.most_similar(title, cancel).await?;

    let record = MetadataEnricher::new(catalog)
        .enrich(best.id)
        .await
        .with_context(|| format!("Failed to fetch metadata for movie {}", best.id))?;

    println!("{}", format!("Most similar to '{}':", title).bold().blue());
    print_record(&record);
    Ok(())
}

/// Handle the 'show' command
async fn handle_show(
    catalog: Arc<dyn CatalogApi>,
    gateway: Arc<dyn EmbeddingGateway>,
    title: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    // Only the title search runs; the gateway is never contacted
    let resolver = RecommendationResolver::new(catalog.clone(), gateway);
    let id = resolver.resolve_id(title, cancel).await?;
    let record = MetadataEnricher::new(catalog).enrich(id).await?;

    print_record(&record);
    Ok(())
}

/// Handle the 'add-embedding' command
async fn handle_add_embedding(
    gateway: Arc<dyn EmbeddingGateway>,
    id: CatalogId,
    values: Vec<f32>,
) -> Result<()> {
    let count = values.len();
    let message = gateway.store_embedding(id, values).await?;

    info!("Stored {} values for movie {}", count, id);
    println!("{} {}", "✓".green(), message);
    Ok(())
}

/// Handle the 'serve' command
async fn handle_serve(
    catalog: Arc<dyn CatalogApi>,
    gateway: Arc<dyn EmbeddingGateway>,
    bind: &str,
    cancel: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;

    let state = AppState::new(RecommendationResolver::new(catalog, gateway))
        .with_cancellation(cancel.clone());
    server::serve(listener, state, cancel).await
}

fn print_report(report: &BuildReport) {
    println!("{}", "Index build summary:".bold().blue());
    println!("{}Listed: {}", "• ".cyan(), report.listed);
    println!("{}Enriched: {}", "• ".cyan(), report.enriched);
    println!("{}Submitted: {}", "• ".green(), report.submitted);
    println!("{}Failed: {}", "• ".red(), report.failed);
    println!("{}Elapsed: {:?}", "• ".cyan(), report.elapsed);

    for failure in &report.failures {
        println!(
            "  - movie {} ({}): {}",
            failure.id.to_string().yellow(),
            failure.stage,
            failure.reason
        );
    }
}

fn print_recommendations(title: &str, recommendations: &[SimilarityResult]) {
    println!("{}", format!("Movies similar to '{}':", title).bold().blue());
    for (rank, movie) in recommendations.iter().enumerate() {
        println!("{}. {} [{}]", (rank + 1).to_string().green(), movie.title, movie.id);
    }
}

fn print_record(record: &MovieRecord) {
    println!("{}", format!("{} [{}]", record.title, record.id).bold());
    println!("{}Overview: {}", "• ".green(), record.overview);
    println!("{}Keywords: {}", "• ".green(), record.keywords);
}
