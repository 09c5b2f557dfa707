pub mod handlers;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::{ApiState, AppFactory, PageQuery, SessionCounters};

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .with_state(state.clone());

    Router::new()
        .route("/", get(handlers::handle_page))
        .with_state(state)
        .nest("/api", api_routes)
        .layer(cors)
}

pub async fn serve(state: ApiState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    tracing::info!(host, port, "HTTP listening");
    axum::serve(listener, app).await?;
    Ok(())
}
