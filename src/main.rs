use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use viralspot::config::Config;
use viralspot::discovery::{DiscoveryConfig, NetworkDiscoverer};
use viralspot::fetchers::bulk_reels::LiveBulkReelsFetcher;
use viralspot::fetchers::detail::LiveDetailFetcher;
use viralspot::fetchers::listing::LiveListingFetcher;
use viralspot::fetchers::llm_chat::LiveLlmChatFetcher;
use viralspot::fetchers::profile::LiveProfileFetcher;
use viralspot::fetchers::similar::LiveSimilarProfilesFetcher;
use viralspot::fetchers::transcript::LiveTranscriptFetcher;
use viralspot::pipeline::Pipeline;
use viralspot::queue::{CsvQueueMirror, PriorityQueue};
use viralspot::store::object_store::{LiveObjectStore, ObjectStore};
use viralspot::store::Store;
use viralspot::viral::{ViralEngine, ViralWorkflowLoop};
use viralspot::workers::WorkerPool;
use viralspot::{db, handlers, AppState};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::reels::list_reels,
        handlers::posts::list_posts,
        handlers::filter_options::filter_options,
        handlers::profile::get_profile,
    ),
    tags(
        (name = "Content", description = "Reel/post search endpoints"),
        (name = "Profiles", description = "Primary/secondary profile endpoints"),
        (name = "ViralIdeas", description = "Viral-ideas workflow endpoints"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path.file_name().and_then(|n| n.to_str()).unwrap_or("viralspot.log");
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
        // flushing must outlive main()'s scope
        std::mem::forget(guard);
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("viralspot starting up");

    let pool = db::create_pool(&config.database.url).await?;
    tracing::info!("database pool created");

    let objects: Arc<dyn ObjectStore> =
        Arc::new(LiveObjectStore::new(&config.storage.supabase_url, &config.storage.supabase_service_role_key));
    let store = Arc::new(Store::new(pool.clone(), objects));

    let csv_mirror = if config.storage.keep_local_csv {
        Some(Arc::new(CsvQueueMirror::new("queue_mirror.csv")))
    } else {
        None
    };
    let queue = Arc::new(PriorityQueue::new(Arc::clone(&store), csv_mirror));

    let profile_fetcher = Arc::new(LiveProfileFetcher::new(&config.scraper.api_host, &config.scraper.api_key));
    let listing_fetcher = Arc::new(LiveListingFetcher::new(&config.scraper.api_host, &config.scraper.api_key));
    let detail_fetcher = Arc::new(LiveDetailFetcher::new(&config.scraper.api_host, &config.scraper.api_key));
    let similar_fetcher =
        Arc::new(LiveSimilarProfilesFetcher::new(&config.scraper.similar_profiles_host, &config.scraper.api_key));
    let bulk_reels_fetcher =
        Arc::new(LiveBulkReelsFetcher::new(&config.scraper.alt_host_20251, &config.scraper.api_key));
    let transcript_fetcher =
        Arc::new(LiveTranscriptFetcher::new(&config.scraper.alt_host_20251, &config.scraper.api_key));
    let llm = Arc::new(LiveLlmChatFetcher::new(&config.llm.openai_api_key));

    let pipeline = Arc::new(Pipeline {
        store: Arc::clone(&store),
        http: reqwest::Client::new(),
        profile_fetcher,
        listing_fetcher,
        detail_fetcher,
        similar_fetcher: Arc::clone(&similar_fetcher),
        bulk_reels_fetcher,
        llm,
    });

    let worker_pool = WorkerPool::new(
        Arc::clone(&queue),
        Arc::clone(&pipeline),
        config.queue.max_concurrent_high,
        config.queue.max_concurrent_low,
    );
    {
        let pool_for_tick = Arc::clone(&worker_pool);
        tokio::spawn(async move {
            viralspot::utils::ScheduledExecutor::new("worker-pool", WorkerPool::tick_interval())
                .start(pool_for_tick)
                .await;
        });
    }

    let viral_engine =
        Arc::new(ViralEngine::new(Arc::clone(&store), Arc::clone(&pipeline), transcript_fetcher));
    let viral_loop = ViralWorkflowLoop::new(Arc::clone(&store), Arc::clone(&viral_engine));
    {
        let loop_for_run = Arc::clone(&viral_loop);
        tokio::spawn(async move {
            loop_for_run.run_forever().await;
        });
    }

    let discovery_config = DiscoveryConfig::from(&config.discovery);
    let discoverer = Arc::new(NetworkDiscoverer::new(
        Arc::clone(&store),
        similar_fetcher,
        Arc::clone(&queue),
        discovery_config,
    ));
    {
        let discoverer_for_loop = Arc::clone(&discoverer);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                match discoverer_for_loop.run().await {
                    Ok(result) => tracing::info!(total_queued = result.total_queued, "discovery round complete"),
                    Err(e) => tracing::warn!(error = %e, "discovery round failed"),
                }
            }
        });
    }

    let app_state = Arc::new(AppState {
        store: Arc::clone(&store),
        pipeline: Arc::clone(&pipeline),
        queue: Arc::clone(&queue),
        worker_pool: Arc::clone(&worker_pool),
        viral_engine: Arc::clone(&viral_engine),
        viral_loop: Arc::clone(&viral_loop),
        discoverer,
        config: config.clone(),
    });

    let api_routes = Router::new()
        .route("/api/reels", get(handlers::reels::list_reels))
        .route("/api/posts", get(handlers::posts::list_posts))
        .route("/api/filter-options", get(handlers::filter_options::filter_options))
        .route("/api/profile/:username", get(handlers::profile::get_profile))
        .route("/api/profile/:username/reels", get(handlers::profile::profile_reels))
        .route("/api/profile/:username/similar", get(handlers::profile::similar_profiles))
        .route("/api/profile/:username/secondary", get(handlers::profile::secondary_profile))
        .route("/api/profile/:username/request", post(handlers::profile::request_profile))
        .route("/api/profile/:username/status", get(handlers::profile::profile_status))
        .route("/api/reset-session", post(handlers::profile::reset_session))
        .route("/api/profile/:username/similar-fast", get(handlers::profile::similar_fast))
        .route("/api/profile/:primary/add-competitor/:target", post(handlers::profile::add_competitor))
        .route("/api/viral-ideas/queue", post(handlers::viral_ideas::queue_request))
        .route("/api/viral-ideas/queue/:session_id", get(handlers::viral_ideas::get_by_session))
        .route("/api/viral-ideas/check-existing/:username", get(handlers::viral_ideas::check_existing))
        .route("/api/viral-ideas/queue/:queue_id/start", post(handlers::viral_ideas::start))
        .route("/api/viral-ideas/queue/:queue_id/process", post(handlers::viral_ideas::process))
        .route("/api/viral-analysis/:queue_id/results", get(handlers::viral_analysis::results))
        .route("/api/viral-analysis/:queue_id/content", get(handlers::viral_analysis::content))
        .with_state(Arc::clone(&app_state));

    let health_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/", get(handlers::health::root));

    let app = Router::new()
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_routes)
        .merge(health_routes)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("server listening on http://{}", addr);
    tracing::info!("API documentation available at http://{}/api-docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(app_state))
        .await?;

    Ok(())
}

async fn shutdown_signal(app_state: Arc<AppState>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining worker pool");
    app_state.worker_pool.begin_shutdown();
    app_state.worker_pool.await_shutdown(std::time::Duration::from_secs(30)).await;
    app_state.viral_loop.begin_shutdown();
}
