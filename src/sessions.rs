use std::{
    collections::{HashMap, HashSet},
    sync::LazyLock,
};

use futures::{StreamExt, stream};
use jiff::civil::Date;
use scraper::{Html, Selector};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{
    dates::normalize_showtime,
    error::{ExtractError, ExtractResult},
    fetch::{Fetcher, Site},
    html::{slug_from_href, strip_trailing_parenthetical, strip_trailing_year, text_of},
    models::{Cinema, CinemaSummary, Movie, MovieDetails, MovieStub, Region},
};

// only the "playing now" carousel is needed, the rest of the page is large
const MOVIES_START: &str = r#"<div class="container__outer playing-now playing-now--sliders">"#;
const MOVIES_END: &str =
    r#"<div id="genre-modal class="modal modal--v5 modal--genre modal--opacity js-modal">"#;
const MOVIE_DETAILS_START: &str = "<main>";
const MOVIE_DETAILS_END: &str = "</main>";

static MOVIE_HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h3.movie-list-carousel-item__heading").unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static RELEASE_YEAR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.single-movie__release-year").unwrap());
static FEATURED_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.single-movie__featured-image").unwrap());
static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());
static SHOWTIME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.times-calendar__el-grouper").unwrap());
static SHOWTIME_DAY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.times-calendar__el__date").unwrap());
static SHOWTIME_MONTH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.times-calendar__el__month").unwrap());
static VENUE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.movie-times__cinema__copy").unwrap());
static VENUE_NAME: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h4").unwrap());

/// Snapshot of a region's scraped cinemas, keyed by name, used to attach
/// homepages to the venues listed for a movie.
#[derive(Clone, Debug, Default)]
pub struct Roster {
    homepages: HashMap<String, Option<String>>,
}

impl Roster {
    pub fn new(cinemas: &[Cinema]) -> Self {
        let homepages =
            cinemas.iter().map(|c| (c.name.clone(), c.homepage_url.clone())).collect();
        Self { homepages }
    }

    pub fn is_empty(&self) -> bool {
        self.homepages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.homepages.len()
    }

    /// Exact name first, then the name without a trailing parenthetical
    /// (screen formats such as "(IMAX)" are appended on the sessions page).
    pub fn lookup(&self, venue: &str) -> Option<CinemaSummary> {
        if let Some((name, homepage)) = self.homepages.get_key_value(venue) {
            return Some(CinemaSummary { name: name.clone(), homepage_url: homepage.clone() });
        }
        let cleaned = strip_trailing_parenthetical(venue);
        self.homepages.get_key_value(cleaned).map(|(name, homepage)| CinemaSummary {
            name: name.clone(),
            homepage_url: homepage.clone(),
        })
    }
}

impl FromIterator<(String, Option<String>)> for Roster {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        Self { homepages: iter.into_iter().collect() }
    }
}

/// Scrapes every movie now playing in `region`.
///
/// Only a missing or empty now-playing listing fails the whole run. A movie
/// that cannot be fully assembled is logged and left out of the result.
pub async fn scrape_sessions(
    fetcher: &Fetcher,
    site: &Site,
    region: &Region,
    roster: &Roster,
    today: Date,
) -> ExtractResult<Vec<Movie>> {
    let now_showing_url = format!("{}/now-playing/{}", site.host(), region.slug);
    debug!(url = %now_showing_url, "fetching now showing movies");

    let Some(html) = fetcher
        .fetch_section(&now_showing_url, site.headers(), MOVIES_START, MOVIES_END)
        .await
    else {
        return Err(ExtractError::Unreachable { url: now_showing_url });
    };

    let stubs = parse_now_showing(&html).inspect_err(|_| {
        error!(url = %now_showing_url, "could not find any movies in now showing page");
        debug!(page = %html, "now showing page");
    })?;
    debug!(movies_found = stubs.len(), "parsed now showing page");

    let movies: Vec<Option<Movie>> = stream::iter(stubs)
        .map(|stub| async move {
            match scrape_movie(fetcher, site, region, roster, today, &stub).await {
                Ok(movie) => Some(movie),
                Err(err) => {
                    warn!(title = %stub.title, error = %err, "skipping movie due to scraping failure");
                    None
                },
            }
        })
        .buffered(fetcher.max_concurrent())
        .collect()
        .await;

    let movies: Vec<Movie> = movies.into_iter().flatten().collect();
    debug!(region = %region.slug, movies = movies.len(), "completed session scrape");
    Ok(movies)
}

async fn scrape_movie(
    fetcher: &Fetcher,
    site: &Site,
    region: &Region,
    roster: &Roster,
    today: Date,
    stub: &MovieStub,
) -> ExtractResult<Movie> {
    debug!(slug = %stub.slug, "processing movie");

    let (details, showtimes) = tokio::join!(
        fetch_movie_details(fetcher, site, &stub.slug),
        fetch_movie_showtimes(fetcher, site, region, &stub.slug, today),
    );
    let details = details?;
    let showtimes = showtimes?;

    let (Some(&earliest), Some(&last_showtime)) = (showtimes.iter().min(), showtimes.iter().max())
    else {
        return Err(ExtractError::NoShowtimes);
    };

    let cinemas = fetch_movie_venues(fetcher, site, &stub.slug, earliest, roster).await?;

    debug!(
        slug = %stub.slug,
        showtimes = showtimes.len(),
        venues = cinemas.len(),
        "assembled movie"
    );

    Ok(Movie {
        id: Uuid::new_v4().to_string(),
        title: stub.title.clone(),
        release_year: details.release_year,
        image_url: details.image_url,
        region: region.name.clone(),
        region_code: region.slug.clone(),
        cinemas,
        showtimes,
        last_showtime,
    })
}

async fn fetch_movie_details(
    fetcher: &Fetcher,
    site: &Site,
    slug: &str,
) -> ExtractResult<MovieDetails> {
    let url = format!("{}/movie/{}/", site.host(), slug);
    let html = fetcher
        .fetch_section(&url, site.headers(), MOVIE_DETAILS_START, MOVIE_DETAILS_END)
        .await
        .ok_or(ExtractError::Unreachable { url })?;
    parse_movie_details(&html)
}

async fn fetch_movie_showtimes(
    fetcher: &Fetcher,
    site: &Site,
    region: &Region,
    slug: &str,
    today: Date,
) -> ExtractResult<Vec<Date>> {
    let url = format!("{}/movie/times/{}/{}", site.host(), slug, region.slug);
    let html =
        fetcher.fetch(&url, site.headers()).await.ok_or(ExtractError::Unreachable { url })?;
    parse_movie_showtimes(&html, today)
}

async fn fetch_movie_venues(
    fetcher: &Fetcher,
    site: &Site,
    slug: &str,
    showtime: Date,
    roster: &Roster,
) -> ExtractResult<Vec<CinemaSummary>> {
    let url = format!("{}/movie/sessions/{}/{}/region/", site.host(), slug, showtime);
    let html =
        fetcher.fetch(&url, site.headers()).await.ok_or(ExtractError::Unreachable { url })?;
    parse_movie_venues(&html, roster)
}

/// Movie stubs from the now-playing carousel, with any trailing release year
/// stripped from the title and repeated titles dropped.
pub fn parse_now_showing(html: &str) -> ExtractResult<Vec<MovieStub>> {
    let doc = Html::parse_document(html);

    let mut headings = doc.select(&MOVIE_HEADING).peekable();
    if headings.peek().is_none() {
        return Err(ExtractError::NoListings { what: "movies" });
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for heading in headings {
        let Some(anchor) = heading.select(&ANCHOR).next() else {
            error!(element = %heading.html(), "could not find <a> for movie title");
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            error!(element = %anchor.html(), "could not find href for movie slug");
            continue;
        };
        let Some(slug) = slug_from_href(href) else {
            error!(href = %href, "unexpected format for movie slug, expected </movie/movie-title>");
            continue;
        };

        let title = strip_trailing_year(&text_of(anchor)).to_string();
        if title.is_empty() {
            error!(element = %anchor.html(), "empty movie title");
            continue;
        }
        if !seen.insert(title.clone()) {
            continue;
        }

        out.push(MovieStub { title, slug: slug.to_string() });
    }

    Ok(out)
}

pub fn parse_movie_details(html: &str) -> ExtractResult<MovieDetails> {
    let doc = Html::parse_document(html);

    let Some(year_el) = doc.select(&RELEASE_YEAR).next() else {
        error!("could not find <div.single-movie__release-year> in movie details page");
        return Err(ExtractError::MissingElement { what: "movie release year" });
    };
    let year_text = text_of(year_el);
    let release_year: i32 = year_text
        .parse()
        .map_err(|_| ExtractError::InvalidValue { what: "release year", value: year_text })?;

    let Some(image_div) = doc.select(&FEATURED_IMAGE).next() else {
        error!("could not find <div.single-movie__featured-image> in movie details page");
        return Err(ExtractError::MissingElement { what: "movie image container" });
    };
    let Some(img) = image_div.select(&IMG).next() else {
        error!(element = %image_div.html(), "could not find <img> for movie image url");
        return Err(ExtractError::MissingElement { what: "movie image" });
    };

    let image_url =
        img.value().attr("src").map(str::trim).filter(|s| !s.is_empty()).map(String::from);

    Ok(MovieDetails { release_year, image_url })
}

/// Showtime dates in page order. Calendar entries missing a day or month
/// are skipped; an empty calendar is an error.
pub fn parse_movie_showtimes(html: &str, today: Date) -> ExtractResult<Vec<Date>> {
    let doc = Html::parse_document(html);

    let mut showtimes = Vec::new();
    for entry in doc.select(&SHOWTIME) {
        let Some(day) = entry.select(&SHOWTIME_DAY).next() else {
            error!(element = %entry.html(), "could not find <span.times-calendar__el__date> for showtime day");
            continue;
        };
        let Some(month) = entry.select(&SHOWTIME_MONTH).next() else {
            error!(element = %entry.html(), "could not find <span.times-calendar__el__month> for showtime month");
            continue;
        };

        match normalize_showtime(&text_of(day), &text_of(month), today) {
            Ok(date) => showtimes.push(date),
            Err(err) => error!(element = %entry.html(), error = %err, "skipping showtime"),
        }
    }

    if showtimes.is_empty() {
        return Err(ExtractError::NoShowtimes);
    }
    Ok(showtimes)
}

/// Venues showing the movie, reconciled against the roster. Venues the roster
/// does not know are dropped, and a cinema listed under several screen formats
/// appears once.
pub fn parse_movie_venues(html: &str, roster: &Roster) -> ExtractResult<Vec<CinemaSummary>> {
    let doc = Html::parse_document(html);

    let mut venues: Vec<CinemaSummary> = Vec::new();
    for venue in doc.select(&VENUE) {
        let Some(name_el) = venue.select(&VENUE_NAME).next() else {
            error!(element = %venue.html(), "could not find <h4> for movie venue name");
            continue;
        };
        let name = text_of(name_el);

        let Some(summary) = roster.lookup(&name) else {
            warn!(venue = %name, "venue not found in cinema table");
            continue;
        };
        if venues.iter().any(|v| v.name == summary.name) {
            continue;
        }
        venues.push(summary);
    }

    if venues.is_empty() {
        return Err(ExtractError::NoVenues);
    }
    Ok(venues)
}
