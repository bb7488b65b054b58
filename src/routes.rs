use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    AppState,
    config::Config,
    dates,
    error::{AppError, AppResult},
    fetch::Site,
    models::{Region, ScrapeRequest, Session, SessionsResponse},
    processor,
};

pub async fn scrape_cinemas(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScrapeRequest>,
) -> AppResult<String> {
    let (region, site) = resolve_target(&state.config, req)?;
    let count = processor::refresh_cinemas(&state.config, &state.store, &region, &site).await?;
    Ok(format!("scraped {count} cinemas {}", region.name))
}

pub async fn scrape_sessions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScrapeRequest>,
) -> AppResult<String> {
    let (region, site) = resolve_target(&state.config, req)?;
    let count = processor::refresh_sessions(&state.config, &state.store, &region, &site).await?;
    Ok(format!("scraped {count} movies {}", region.name))
}

pub async fn sessions(
    State(state): State<Arc<AppState>>,
    Path(region_code): Path<String>,
) -> AppResult<Json<SessionsResponse>> {
    let Some(timezone) = state.config.region_timezone(&region_code) else {
        return Err(AppError::BadRequest(format!("region not supported: {region_code}")));
    };
    let today = dates::today_in(timezone)?;

    let movies = state.store.upcoming_movies(&region_code, today).await.map_err(|source| {
        AppError::StorageRead { context: "could not read sessions", source }
    })?;

    let sessions = movies.into_iter().map(|movie| Session::upcoming(movie, today)).collect();
    Ok(Json(SessionsResponse { sessions }))
}

/// Region and site for a scrape trigger. A host supplied by the caller is used
/// as-is; otherwise the country code is resolved through the configured hosts.
fn resolve_target(config: &Config, req: ScrapeRequest) -> AppResult<(Region, Site)> {
    let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    let missing = || AppError::BadRequest("missing region info".to_string());
    let name = non_empty(req.region_name).ok_or_else(missing)?;
    let slug = non_empty(req.region_slug).ok_or_else(missing)?;

    let host = match (non_empty(req.host), non_empty(req.country_code)) {
        (Some(host), _) => host,
        (None, Some(code)) => config
            .scrape_host(&code)
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::BadRequest(format!("country code not supported: {}", code.to_uppercase()))
            })?,
        (None, None) => return Err(missing()),
    };

    Ok((Region { name, slug }, Site::new(&host)))
}
