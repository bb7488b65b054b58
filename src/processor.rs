use anyhow::Context;
use tracing::{info, warn};

use crate::{
    cinemas,
    config::Config,
    dates,
    error::{AppError, AppResult},
    fetch::{Fetcher, Site},
    models::Region,
    sessions::{self, Roster},
    store::{Store, StoreError},
};

/// Scrapes the region's cinemas and replaces the stored set. Returns the
/// number of cinemas written.
pub async fn refresh_cinemas(
    config: &Config,
    store: &Store,
    region: &Region,
    site: &Site,
) -> AppResult<usize> {
    info!(region = %region.name, host = %site.host(), "scrape cinemas begin");

    let cinemas = {
        let fetcher = Fetcher::new(config.retry_policy(), config.max_concurrent)
            .context("building http client")?;
        cinemas::scrape_cinemas(&fetcher, site, region)
            .await
            .map_err(|err| AppError::ScrapeFailed(format!("failed to scrape cinemas: {err}")))?
    };

    if cinemas.is_empty() {
        return Err(AppError::ScrapeFailed(
            "failed to scrape cinemas: no cinema could be enriched".to_string(),
        ));
    }

    let existing =
        store.cinemas_by_region(&region.slug).await.map_err(storage("scrape cinemas"))?;
    let deleted = store.delete_cinemas(&existing).await.map_err(storage("scrape cinemas"))?;
    info!(region = %region.name, deleted = deleted, "deleted existing cinemas");

    let inserted = store.insert_cinemas(&cinemas).await.map_err(storage("scrape cinemas"))?;
    info!(region = %region.name, inserted = inserted, "inserted cinemas");

    info!(region = %region.name, "scrape cinemas complete");
    Ok(cinemas.len())
}

/// Scrapes the movies now playing in the region against its stored cinema
/// roster and replaces the stored set. Returns the number of movies written.
pub async fn refresh_sessions(
    config: &Config,
    store: &Store,
    region: &Region,
    site: &Site,
) -> AppResult<usize> {
    info!(region = %region.name, host = %site.host(), "scrape sessions begin");

    let cinemas = store.cinemas_by_region(&region.slug).await.map_err(|source| {
        AppError::StorageRead { context: "scrape sessions could not read cinemas", source }
    })?;
    let roster = Roster::new(&cinemas);
    if roster.is_empty() {
        warn!(region = %region.name, "no cinemas stored for region");
        return Err(AppError::ScrapeFailed(
            "skip scrape sessions cos no existing cinemas in database".to_string(),
        ));
    }
    info!(region = %region.name, cinemas = roster.len(), "loaded cinema roster");

    let today = dates::today_in(config.scrape_timezone(&region.slug))?;

    let movies = {
        let fetcher = Fetcher::new(config.retry_policy(), config.max_concurrent)
            .context("building http client")?;
        sessions::scrape_sessions(&fetcher, site, region, &roster, today)
            .await
            .map_err(|err| AppError::ScrapeFailed(format!("failed to scrape sessions: {err}")))?
    };

    if movies.is_empty() {
        return Err(AppError::ScrapeFailed(
            "failed to scrape sessions: no movie could be assembled".to_string(),
        ));
    }

    let existing =
        store.movies_by_region(&region.slug).await.map_err(storage("scrape sessions"))?;
    let deleted = store.delete_movies(&existing).await.map_err(storage("scrape sessions"))?;
    info!(region = %region.name, deleted = deleted, "deleted existing movies");

    let inserted = store.insert_movies(&movies).await.map_err(storage("scrape sessions"))?;
    info!(region = %region.name, inserted = inserted, "inserted movies");

    info!(region = %region.name, "scrape sessions complete");
    Ok(movies.len())
}

fn storage(context: &'static str) -> impl Fn(StoreError) -> AppError {
    move |source| AppError::Storage { context, source }
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, routing::get};
    use pretty_assertions::assert_eq;
    use sea_orm::ConnectionTrait;

    use super::*;
    use crate::{
        config::test_config,
        models::Cinema,
        testing::{fixture, memory_db, serve},
    };

    fn auckland() -> Region {
        Region { name: "Auckland".to_string(), slug: "auckland".to_string() }
    }

    fn stored_cinema(id: &str, name: &str, region_code: &str) -> Cinema {
        Cinema {
            id: id.to_string(),
            name: name.to_string(),
            homepage_url: None,
            region: "Somewhere".to_string(),
            region_code: region_code.to_string(),
        }
    }

    fn cinema_site() -> Router {
        Router::new()
            .route("/cinemas/auckland/", get(|| async { fixture("cinemas") }))
            .route("/cinema/maya-cinemas", get(|| async { fixture("cinema_details") }))
            .route("/cinema/lighthouse-cinemas", get(|| async { fixture("cinema_details_phone") }))
    }

    fn session_site() -> Router {
        Router::new()
            .route("/now-playing/auckland", get(|| async { fixture("now_showing") }))
            .route("/movie/{slug}/", get(|| async { fixture("movie_details") }))
            .route("/movie/times/{slug}/auckland", get(|| async { fixture("movie_showtimes") }))
            .route(
                "/movie/sessions/{slug}/{showtime}/region/",
                get(|| async { fixture("movie_venues") }),
            )
    }

    #[tokio::test]
    async fn refresh_cinemas_replaces_only_the_region() {
        let store = Store::new(memory_db().await);
        store
            .insert_cinemas(&[
                stored_cinema("old", "Closed Cinema", "auckland"),
                stored_cinema("other", "Event Cinemas", "canterbury"),
            ])
            .await
            .unwrap();
        let site = Site::new(&serve(cinema_site()).await);

        let count = refresh_cinemas(&test_config(), &store, &auckland(), &site).await.unwrap();

        assert_eq!(count, 2);
        let names: Vec<String> =
            store.cinemas_by_region("auckland").await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Lighthouse Cinemas", "Maya Cinemas"]);
        assert_eq!(store.cinemas_by_region("canterbury").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn refresh_cinemas_keeps_old_rows_when_nothing_was_scraped() {
        let store = Store::new(memory_db().await);
        store.insert_cinemas(&[stored_cinema("old", "Closed Cinema", "auckland")]).await.unwrap();
        let router = Router::new()
            .route("/cinemas/auckland/", get(|| async { fixture("cinemas") }))
            .route("/cinema/{slug}", get(|| async { StatusCode::BAD_GATEWAY }));
        let site = Site::new(&serve(router).await);

        let err = refresh_cinemas(&test_config(), &store, &auckland(), &site).await.unwrap_err();

        assert!(err.to_string().starts_with("failed to scrape cinemas"));
        assert_eq!(store.cinemas_by_region("auckland").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn refresh_sessions_needs_a_roster() {
        let store = Store::new(memory_db().await);
        let site = Site::new(&serve(session_site()).await);

        let err = refresh_sessions(&test_config(), &store, &auckland(), &site).await.unwrap_err();

        assert_eq!(err.to_string(), "skip scrape sessions cos no existing cinemas in database");
    }

    #[tokio::test]
    async fn refresh_sessions_stores_assembled_movies() {
        let store = Store::new(memory_db().await);
        store
            .insert_cinemas(&[
                stored_cinema("c1", "Maya Cinemas", "auckland"),
                stored_cinema("c2", "Lighthouse Cinemas", "auckland"),
            ])
            .await
            .unwrap();
        let site = Site::new(&serve(session_site()).await);

        let count = refresh_sessions(&test_config(), &store, &auckland(), &site).await.unwrap();
        assert_eq!(count, 2);

        // a second run replaces rather than appends
        refresh_sessions(&test_config(), &store, &auckland(), &site).await.unwrap();

        let movies = store.movies_by_region("auckland").await.unwrap();
        assert_eq!(movies.len(), 2);
        assert!(movies.iter().all(|m| m.cinemas.len() == 2 && m.showtimes.len() == 2));
    }

    #[tokio::test]
    async fn write_fault_after_cinema_scrape_is_a_storage_error() {
        let db = memory_db().await;
        let store = Store::new(db.clone());
        db.execute_unprepared("DROP TABLE cinemas").await.unwrap();
        let site = Site::new(&serve(cinema_site()).await);

        let err = refresh_cinemas(&test_config(), &store, &auckland(), &site).await.unwrap_err();

        assert!(matches!(err, AppError::Storage { context: "scrape cinemas", .. }));
        assert!(
            err.to_string()
                .starts_with("scrape cinemas successful but encountered storage error")
        );
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn write_fault_after_session_scrape_is_a_storage_error() {
        let db = memory_db().await;
        let store = Store::new(db.clone());
        store
            .insert_cinemas(&[
                stored_cinema("c1", "Maya Cinemas", "auckland"),
                stored_cinema("c2", "Lighthouse Cinemas", "auckland"),
            ])
            .await
            .unwrap();
        db.execute_unprepared("DROP TABLE movies").await.unwrap();
        let site = Site::new(&serve(session_site()).await);

        let err = refresh_sessions(&test_config(), &store, &auckland(), &site).await.unwrap_err();

        assert!(matches!(err, AppError::Storage { context: "scrape sessions", .. }));
        assert!(
            err.to_string()
                .starts_with("scrape sessions successful but encountered storage error")
        );
    }

    #[tokio::test]
    async fn unreadable_roster_is_reported_before_scraping() {
        let db = memory_db().await;
        let store = Store::new(db.clone());
        db.execute_unprepared("DROP TABLE cinemas").await.unwrap();
        let site = Site::new(&serve(session_site()).await);

        let err = refresh_sessions(&test_config(), &store, &auckland(), &site).await.unwrap_err();

        assert!(matches!(err, AppError::StorageRead { .. }));
        assert!(err.to_string().starts_with("scrape sessions could not read cinemas: "));
    }
}
