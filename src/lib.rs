pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::api::handlers::upload::MULTIPART_OVERHEAD;
use crate::config::{IngestConfig, StorageBackend};
use crate::services::identity::IdentityProvider;
use crate::services::ingest::{AssetKind, IngestService};
use crate::services::storage::StorageService;
use crate::services::videos::VideoRepository;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::videos::create_video,
        api::handlers::videos::get_video,
        api::handlers::upload::upload_video,
        api::handlers::upload::upload_thumbnail,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::videos::CreateVideoRequest,
            models::Video,
            services::ingest::AssetReference,
            services::ingest::AssetKind,
            services::ingest::ShapeCategory,
        )
    ),
    tags(
        (name = "videos", description = "Video metadata endpoints"),
        (name = "uploads", description = "Video and thumbnail ingestion"),
        (name = "system", description = "Health and diagnostics")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub videos: Arc<dyn VideoRepository>,
    pub identity: Arc<dyn IdentityProvider>,
    pub storage: Arc<dyn StorageService>,
    pub ingest: Arc<IngestService>,
    pub config: IngestConfig,
}

fn upload_body_limit(config: &IngestConfig, kind: AssetKind) -> DefaultBodyLimit {
    let max = usize::try_from(config.policy(kind).max_bytes).unwrap_or(usize::MAX);
    DefaultBodyLimit::max(max.saturating_add(MULTIPART_OVERHEAD))
}

pub fn create_app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/videos", post(api::handlers::videos::create_video))
        .route("/videos/:video_id", get(api::handlers::videos::get_video))
        .route(
            "/video_upload/:video_id",
            post(api::handlers::upload::upload_video)
                .layer(upload_body_limit(&state.config, AssetKind::Video)),
        )
        .route(
            "/thumbnail_upload/:video_id",
            post(api::handlers::upload::upload_thumbnail)
                .layer(upload_body_limit(&state.config, AssetKind::Thumbnail)),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            api::middleware::auth::auth_middleware,
        ));

    let mut app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .nest("/api", api_routes);

    if state.config.storage_backend == StorageBackend::Local {
        app = app.nest_service("/assets", ServeDir::new(&state.config.assets_root));
    }

    app.layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .with_state(state)
}
