use std::sync::LazyLock;

use futures::{StreamExt, stream};
use scraper::{Html, Selector};
use tracing::{debug, error, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    error::{ExtractError, ExtractResult},
    fetch::{Fetcher, Site},
    html::{slug_from_href, text_of},
    models::{Cinema, CinemaStub, Region},
};

static CINEMA_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.more-cinemas__link").unwrap());
static CINEMA_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2.more-cinemas__title").unwrap());
static CINEMA_DETAILS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul.cinema-info__block").unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

pub async fn scrape_cinemas(
    fetcher: &Fetcher,
    site: &Site,
    region: &Region,
) -> ExtractResult<Vec<Cinema>> {
    let listing_url = format!("{}/cinemas/{}/", site.host(), region.slug);
    debug!(url = %listing_url, "fetching cinema listing");

    let Some(html) = fetcher.fetch(&listing_url, site.headers()).await else {
        return Err(ExtractError::Unreachable { url: listing_url });
    };

    let stubs = parse_cinema_listings(&html).inspect_err(|_| {
        error!(url = %listing_url, "could not find any cinemas in cinema listing page");
        debug!(page = %html, "cinema listing page");
    })?;
    debug!(cinemas_found = stubs.len(), "parsed cinema listing");

    let cinemas: Vec<Option<Cinema>> = stream::iter(stubs)
        .map(|stub| async move {
            let details_url = format!("{}/cinema/{}", site.host(), stub.slug);
            let result = match fetcher.fetch(&details_url, site.headers()).await {
                Some(html) => enrich_cinema(&stub.name, region, &html),
                None => Err(ExtractError::Unreachable { url: details_url }),
            };

            match result {
                Ok(cinema) => Some(cinema),
                Err(err) => {
                    warn!(cinema = %stub.name, error = %err, "skipping cinema due to scraping failure");
                    None
                },
            }
        })
        .buffered(fetcher.max_concurrent())
        .collect()
        .await;

    let cinemas: Vec<Cinema> = cinemas.into_iter().flatten().collect();
    debug!(region = %region.slug, cinemas = cinemas.len(), "completed cinema scrape");
    Ok(cinemas)
}

/// Cinema name and slug from every `a.more-cinemas__link` on the listing page.
///
/// Malformed entries are skipped; a page without a single link is an error.
pub fn parse_cinema_listings(html: &str) -> ExtractResult<Vec<CinemaStub>> {
    let doc = Html::parse_document(html);

    let mut links = doc.select(&CINEMA_LINK).peekable();
    if links.peek().is_none() {
        return Err(ExtractError::NoListings { what: "cinemas" });
    }

    let mut out = Vec::new();
    for link in links {
        let Some(title) = link.select(&CINEMA_TITLE).next() else {
            error!(element = %link.html(), "could not find <h2.more-cinemas__title> for cinema name");
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            error!(element = %link.html(), "could not find href for cinema slug");
            continue;
        };
        let Some(slug) = slug_from_href(href) else {
            error!(href = %href, "unexpected format for cinema slug, expected </cinema/cinema-name>");
            continue;
        };

        out.push(CinemaStub { name: text_of(title), slug: slug.to_string() });
    }

    Ok(out)
}

/// Builds the [`Cinema`] record from its details page.
///
/// The homepage is the first link inside `ul.cinema-info__block`. The site
/// occasionally puts a phone number there, in which case the homepage is
/// recorded as unknown.
pub fn enrich_cinema(name: &str, region: &Region, html: &str) -> ExtractResult<Cinema> {
    let doc = Html::parse_document(html);

    let Some(details) = doc.select(&CINEMA_DETAILS).next() else {
        error!(cinema = %name, "could not find <ul.cinema-info__block> in cinema details page");
        return Err(ExtractError::MissingElement { what: "cinema details block" });
    };
    let Some(link) = details.select(&ANCHOR).next() else {
        error!(cinema = %name, element = %details.html(), "could not find <a> in cinema details");
        return Err(ExtractError::MissingElement { what: "cinema homepage link" });
    };

    let candidate = text_of(link);
    let homepage_url = if is_web_url(&candidate) {
        Some(candidate)
    } else {
        warn!(cinema = %name, candidate = %candidate, "homepage element does not contain a valid url");
        None
    };

    Ok(Cinema {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        homepage_url,
        region: region.name.clone(),
        region_code: region.slug.clone(),
    })
}

/// Absolute `http`/`https` URL with a host.
pub fn is_web_url(candidate: &str) -> bool {
    let Ok(url) = Url::parse(candidate) else {
        return false;
    };
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
}
