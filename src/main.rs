use axum::{
    routing::{get, post},
    Router,
};
use leadflow_pipeline::automation::{ChannelExecutor, ExecutionFanout};
use leadflow_pipeline::cache_store::MokaCache;
use leadflow_pipeline::config::Config;
use leadflow_pipeline::db::Database;
use leadflow_pipeline::db_storage::PgRecordStore;
use leadflow_pipeline::enrichment::{EnrichmentOrchestrator, EnrichmentSource};
use leadflow_pipeline::api::handlers::{self, AppState};
use leadflow_pipeline::insight::{InsightSynthesizer, QualificationBackend};
use leadflow_pipeline::integrations::intelligence::{CompetitiveIntelligence, NoIntelligence};
use leadflow_pipeline::intent::{IntentAggregator, IntentProvider};
use leadflow_pipeline::knowledge::{HashingEmbedder, KnowledgeReader, KnowledgeWriter};
use leadflow_pipeline::models::Channel;
use leadflow_pipeline::core::pipeline::Pipeline;
use leadflow_pipeline::integrations::services::{
    HttpChannelExecutor, HttpEnrichmentSource, HttpIntelligence, HttpIntentProvider,
    HttpQualificationBackend, HttpSemanticIndex, JsonApiClient,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Builds the pipeline from configuration, wiring every collaborator client.
fn build_pipeline(
    config: &Config,
    store: Arc<PgRecordStore>,
    cache: Arc<MokaCache>,
) -> anyhow::Result<Pipeline> {
    let settings = &config.pipeline;
    let token = config.collaborator_token.clone();

    let mut sources: Vec<Arc<dyn EnrichmentSource>> = Vec::new();
    for (rank, endpoint) in config.enrichment_sources.iter().enumerate() {
        let api = JsonApiClient::from_endpoint(endpoint, token.clone())?;
        sources.push(Arc::new(HttpEnrichmentSource::new(api, rank as u32)));
    }

    let mut providers: Vec<Arc<dyn IntentProvider>> = Vec::new();
    for endpoint in &config.intent_providers {
        let api = JsonApiClient::from_endpoint(endpoint, token.clone())?;
        providers.push(Arc::new(HttpIntentProvider::new(api)));
    }

    let mut backends: Vec<Arc<dyn QualificationBackend>> = Vec::new();
    for endpoint in &config.qualification_backends {
        let api = JsonApiClient::from_endpoint(endpoint, token.clone())?;
        backends.push(Arc::new(HttpQualificationBackend::new(api)));
    }

    let mut executors: HashMap<Channel, Arc<dyn ChannelExecutor>> = HashMap::new();
    for endpoint in &config.channel_executors {
        let channel: Channel = endpoint
            .name
            .parse()
            .map_err(|e| anyhow::anyhow!("CHANNEL_EXECUTORS: {}", e))?;
        let api = JsonApiClient::from_endpoint(endpoint, token.clone())?;
        executors.insert(channel, Arc::new(HttpChannelExecutor::new(api)));
    }

    let intel: Arc<dyn CompetitiveIntelligence> = match config.intel_url {
        Some(ref url) => Arc::new(HttpIntelligence::new(JsonApiClient::new(
            "intelligence",
            url.clone(),
            token.clone(),
        )?)),
        None => {
            tracing::warn!("INTEL_URL not set, competitive intelligence disabled");
            Arc::new(NoIntelligence)
        }
    };

    let index = Arc::new(HttpSemanticIndex::new(JsonApiClient::new(
        "semantic_index",
        config.semantic_index_url.clone(),
        token,
    )?));

    let writer = KnowledgeWriter::new(
        store.clone(),
        index,
        cache,
        Arc::new(HashingEmbedder::default()),
        intel.clone(),
        store,
        settings,
    );

    Ok(Pipeline::new(
        EnrichmentOrchestrator::new(sources, settings),
        IntentAggregator::new(providers, settings),
        InsightSynthesizer::new(backends, intel, settings)?,
        ExecutionFanout::new(executors, settings),
        writer,
        settings.stage_timeout(),
    ))
}

/// Main entry point for the application.
///
/// Initializes tracing, configuration, the database pool, the fast cache and
/// every collaborator client, then serves the lead API with Axum.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leadflow_pipeline=debug,leadflow=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    db.ensure_schema().await?;
    tracing::info!("Database connection pool established");

    let store = Arc::new(PgRecordStore::new(db.pool.clone()));

    // Record cache; entries carry their own TTL (CACHE_TTL_SECONDS)
    let cache = Arc::new(MokaCache::new(100_000));
    tracing::info!(
        "Record cache initialized ({}s TTL, 100k capacity)",
        config.pipeline.cache_ttl_seconds
    );

    let pipeline = build_pipeline(&config, store.clone(), cache.clone())?;
    tracing::info!("Pipeline ready");

    let app_state = Arc::new(AppState {
        pipeline: Arc::new(pipeline),
        reader: Arc::new(KnowledgeReader::new(store, cache)),
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = Router::new()
        .route("/api/v1/leads", post(handlers::process_lead))
        .route("/api/v1/leads/:id", get(handlers::get_lead))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
