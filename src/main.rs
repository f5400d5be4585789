use axum::debug_handler;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use incognichat::config::Config;
use incognichat::{AppState, admin, chat, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let pool = db::connect(&config.database_url).await?;
    db::init(&pool).await?;

    let cors = CorsLayer::new()
        .allow_origin(config.client_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-service-key")]);

    let state = AppState::new(pool, &config);
    let app = Router::new()
        .route("/api/health", get(health))
        .nest("/api/admin", admin::router())
        .merge(chat::router())
        .with_state(state)
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "incognichat gateway listening");
    axum::serve(listener, app).await?;

    Ok(())
}

#[debug_handler]
async fn health() -> Json<Value> {
    Json(json!({ "success": true, "message": "IncogniChat API is running!" }))
}
