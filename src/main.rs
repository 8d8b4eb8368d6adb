use std::sync::Arc;

use axum::{Router, Extension, extract::DefaultBodyLimit};
use tower_http::{limit::RequestBodyLimitLayer, services::ServeDir};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use roomchat::{
    room::{CodeGenerator, RoomRegistry},
    routes,
    state::{MediaLog, SharedRegistry, SharedStore},
    storage::DiskStore,
    utils::clean,
    Config,
};

/* multipart framing on top of the file itself */
const FORM_OVERHEAD: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = Arc::new(Config::from_env()?);
    let body_limit = config.max_upload_bytes + FORM_OVERHEAD;

    let registry: SharedRegistry = Arc::new(RoomRegistry::new(CodeGenerator::new(config.room_code_len)));
    let media = MediaLog::default();
    let store: SharedStore = Arc::new(DiskStore::new(config.upload_dir.clone(), media.clone()));
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    tokio::spawn(clean::task(media, config.upload_disk_cap, config.upload_sweep));  // start the sweeper

    let app = Router::new()
        .merge(routes::router())
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(Extension(registry))
        .layer(Extension(store))
        .layer(Extension(config.clone()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
