use clap::Parser;
use dotenvy::dotenv;
use rust_media_backend::config::IngestConfig;
use rust_media_backend::infrastructure::{database, storage};
use rust_media_backend::services::identity::JwtIdentityProvider;
use rust_media_backend::services::ingest::{FfprobeProber, IngestService};
use rust_media_backend::services::videos::SeaOrmVideoRepository;
use rust_media_backend::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the API server (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_media_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Rust Media Backend...");

    let mut config = IngestConfig::from_env();
    if let Some(port) = args.port {
        config.port = port;
    }
    if config.jwt_secret == IngestConfig::default().jwt_secret {
        warn!("⚠️  JWT_SECRET is not set, using the insecure default");
    }
    info!(
        "🎞️  Ingest Config: Video Max={}MB, Thumbnail Max={}MB, Probe={} ({:?}), Storage={:?}",
        config.video.max_bytes / 1024 / 1024,
        config.thumbnail.max_bytes / 1024 / 1024,
        config.probe_program,
        config.probe_timeout,
        config.storage_backend
    );

    let db = database::setup_database(&config.database_url).await?;
    let storage_service = storage::setup_storage(&config).await?;

    let videos = Arc::new(SeaOrmVideoRepository::new(db.clone()));
    let prober = Arc::new(FfprobeProber::new(
        config.probe_program.clone(),
        config.probe_timeout,
    ));
    let ingest = Arc::new(IngestService::new(
        prober,
        storage_service.clone(),
        videos.clone(),
        config.clone(),
    ));

    let state = AppState {
        db,
        videos,
        identity: Arc::new(JwtIdentityProvider::new(config.jwt_secret.clone())),
        storage: storage_service,
        ingest,
        config: config.clone(),
    };

    let app = create_app(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                info!("📥 {} {}", request.method(), request.uri());
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            ),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
