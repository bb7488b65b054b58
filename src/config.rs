use std::{collections::HashMap, net::SocketAddr, time::Duration};

use anyhow::Context;

use crate::fetch::RetryPolicy;

const SCRAPE_HOST_PREFIX: &str = "SCRAPE_HOST_";

const DEFAULT_REGION_TIMEZONES: &str =
    "auckland=Pacific/Auckland,canterbury=Pacific/Auckland,brisbane-central=Australia/Brisbane";

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    /// Country code (upper case) to scrape host, e.g. `NZ -> https://example.co.nz`.
    pub scrape_hosts: HashMap<String, String>,
    /// Region slug (lower case) to IANA timezone name.
    pub region_timezones: HashMap<String, String>,
    pub default_timezone: String,
    pub fetch_retries: u32,
    pub fetch_retry_delay_ms: u64,
    pub fetch_timeout_secs: u64,
    pub max_concurrent: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://kino.db?mode=rwc".to_string());

        let scrape_hosts = parse_scrape_hosts(std::env::vars());

        let region_timezones = parse_region_timezones(
            &std::env::var("REGION_TIMEZONES")
                .unwrap_or_else(|_| DEFAULT_REGION_TIMEZONES.to_string()),
        );

        let default_timezone =
            std::env::var("DEFAULT_TIMEZONE").unwrap_or_else(|_| "Pacific/Auckland".to_string());

        let fetch_retries: u32 =
            std::env::var("FETCH_RETRIES").ok().and_then(|s| s.parse().ok()).unwrap_or(2);

        let fetch_retry_delay_ms: u64 =
            std::env::var("FETCH_RETRY_DELAY_MS").ok().and_then(|s| s.parse().ok()).unwrap_or(500);

        let fetch_timeout_secs: u64 =
            std::env::var("FETCH_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(10);

        let max_concurrent: usize =
            std::env::var("MAX_CONCURRENT_REQUESTS").ok().and_then(|s| s.parse().ok()).unwrap_or(8);

        if scrape_hosts.is_empty() {
            tracing::warn!("no SCRAPE_HOST_<COUNTRY_CODE> variables set, only legacy host requests will work");
        }

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            scrape_hosts,
            region_timezones,
            default_timezone,
            fetch_retries,
            fetch_retry_delay_ms,
            fetch_timeout_secs,
            max_concurrent,
        })
    }

    pub fn scrape_host(&self, country_code: &str) -> Option<&str> {
        self.scrape_hosts.get(&country_code.trim().to_uppercase()).map(String::as_str)
    }

    /// Timezone configured for a region, if the region is known at all.
    pub fn region_timezone(&self, region_code: &str) -> Option<&str> {
        self.region_timezones.get(&region_code.trim().to_lowercase()).map(String::as_str)
    }

    /// Timezone used to decide "today" while scraping, falling back to the default.
    pub fn scrape_timezone(&self, region_code: &str) -> &str {
        self.region_timezone(region_code).unwrap_or(&self.default_timezone)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.fetch_retries,
            delay: Duration::from_millis(self.fetch_retry_delay_ms),
            timeout: Duration::from_secs(self.fetch_timeout_secs),
        }
    }
}

fn parse_scrape_hosts(vars: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
    vars.filter_map(|(key, value)| {
        let code = key.strip_prefix(SCRAPE_HOST_PREFIX)?;
        let value = value.trim().trim_end_matches('/');
        if code.is_empty() || value.is_empty() {
            return None;
        }
        Some((code.to_uppercase(), value.to_string()))
    })
    .collect()
}

fn parse_region_timezones(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (region, tz) = pair.split_once('=')?;
            let (region, tz) = (region.trim(), tz.trim());
            (!region.is_empty() && !tz.is_empty()).then(|| (region.to_lowercase(), tz.to_string()))
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        addr: "127.0.0.1:0".parse().unwrap(),
        database_url: "sqlite::memory:".to_string(),
        scrape_hosts: HashMap::new(),
        region_timezones: parse_region_timezones(DEFAULT_REGION_TIMEZONES),
        default_timezone: "Pacific/Auckland".to_string(),
        fetch_retries: 2,
        fetch_retry_delay_ms: 10,
        fetch_timeout_secs: 5,
        max_concurrent: 4,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn scrape_hosts_are_read_from_prefixed_vars() {
        let vars = vec![
            ("SCRAPE_HOST_NZ".to_string(), "https://tickets.example.co.nz/".to_string()),
            ("SCRAPE_HOST_".to_string(), "https://ignored.example".to_string()),
            ("SCRAPE_HOST_AU".to_string(), "  ".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ];

        let hosts = parse_scrape_hosts(vars.into_iter());

        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts["NZ"], "https://tickets.example.co.nz");
    }

    #[test]
    fn region_timezones_skip_malformed_pairs() {
        let map = parse_region_timezones("Auckland=Pacific/Auckland, broken ,perth=");

        assert_eq!(map.len(), 1);
        assert_eq!(map["auckland"], "Pacific/Auckland");
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let mut config = test_config();
        config.scrape_hosts.insert("NZ".to_string(), "https://tickets.example.co.nz".to_string());

        assert_eq!(config.scrape_host("nz"), Some("https://tickets.example.co.nz"));
        assert_eq!(config.region_timezone("Brisbane-Central"), Some("Australia/Brisbane"));
        assert_eq!(config.scrape_timezone("wellington"), "Pacific/Auckland");
    }
}
