mod cinemas;
mod config;
mod dates;
mod db;
mod entities;
mod error;
mod fetch;
mod html;
mod models;
mod processor;
mod routes;
mod section;
mod sessions;
mod store;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{config::Config, store::Store};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/scrape/cinemas", post(routes::scrape_cinemas))
        .route("/scrape/sessions", post(routes::scrape_sessions))
        .route("/sessions/{region_code}", get(routes::sessions))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,kino=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let db = db::connect_and_migrate(config.database_url.as_str()).await?;
    let store = Store::new(db);

    let state = Arc::new(AppState { config: config.clone(), store });

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app(state)).await?;

    Ok(())
}
