use std::time::Duration;

use axum::Router;
use sea_orm::{ConnectOptions, DatabaseConnection};

use crate::{
    db,
    fetch::{Fetcher, RetryPolicy},
};

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn fast_fetcher() -> Fetcher {
    let policy = RetryPolicy {
        retries: 2,
        delay: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
    };
    Fetcher::new(policy, 4).unwrap()
}

pub async fn memory_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    db::connect_and_migrate(opts).await.unwrap()
}

pub fn fixture(name: &str) -> &'static str {
    match name {
        "cinemas" => include_str!("../tests/fixtures/cinemas.html"),
        "no_cinemas" => include_str!("../tests/fixtures/no_cinemas.html"),
        "cinema_details" => include_str!("../tests/fixtures/cinema_details.html"),
        "cinema_details_phone" => include_str!("../tests/fixtures/cinema_details_phone.html"),
        "cinema_details_no_block" => {
            include_str!("../tests/fixtures/cinema_details_no_block.html")
        },
        "now_showing" => include_str!("../tests/fixtures/now_showing.html"),
        "now_showing_no_movies" => include_str!("../tests/fixtures/now_showing_no_movies.html"),
        "movie_details" => include_str!("../tests/fixtures/movie_details.html"),
        "movie_details_no_image" => include_str!("../tests/fixtures/movie_details_no_image.html"),
        "movie_showtimes" => include_str!("../tests/fixtures/movie_showtimes.html"),
        "movie_venues" => include_str!("../tests/fixtures/movie_venues.html"),
        other => panic!("unknown fixture {other}"),
    }
}
