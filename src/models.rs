use jiff::civil::Date;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Region {
    /// Display name, e.g. "Auckland".
    pub name: String,
    /// URL path segment and storage partition code, e.g. "auckland".
    pub slug: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CinemaStub {
    pub name: String,
    pub slug: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Cinema {
    pub id: String,
    pub name: String,
    pub homepage_url: Option<String>,
    pub region: String,
    pub region_code: String,
}

/// Venue info embedded in a [`Movie`]; a copy of the roster entry at scrape time.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CinemaSummary {
    pub name: String,
    pub homepage_url: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MovieStub {
    pub title: String,
    pub slug: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MovieDetails {
    pub release_year: i32,
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub release_year: i32,
    pub image_url: Option<String>,
    pub region: String,
    pub region_code: String,
    pub cinemas: Vec<CinemaSummary>,
    pub showtimes: Vec<Date>,
    pub last_showtime: Date,
}

/// Wire shape of a movie on the read side: no internal id or region name.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Session {
    pub title: String,
    pub release_year: i32,
    pub image_url: Option<String>,
    pub region_code: String,
    pub cinemas: Vec<CinemaSummary>,
    pub showtimes: Vec<Date>,
    pub last_showtime: Date,
}

impl Session {
    /// Projects a stored movie, keeping only showtimes on or after `today`.
    pub fn upcoming(movie: Movie, today: Date) -> Self {
        Self {
            title: movie.title,
            release_year: movie.release_year,
            image_url: movie.image_url,
            region_code: movie.region_code,
            cinemas: movie.cinemas,
            showtimes: movie.showtimes.into_iter().filter(|d| *d >= today).collect(),
            last_showtime: movie.last_showtime,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<Session>,
}

/// Body of both scrape triggers. `host` is the legacy shape; newer callers
/// send `country_code` and the host is resolved from configuration.
#[derive(Debug, Default, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub region_slug: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
}
