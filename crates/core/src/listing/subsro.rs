//! subs.ro listing client.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::{header, Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::config::ListingConfig;
use super::traits::ListingSource;
use super::types::{CandidateSubtitle, ListingError};
use crate::media::MediaReference;
use crate::metrics;

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([^,;]+(?:720p|1080p|BluRay|WEB-DL|BRRip|DVDRip|HDTV)[^,;]*)").unwrap()
});

const TRANSLATOR_LABEL: &str = "Traducător";

/// Listing client for subs.ro, searching by IMDb id.
pub struct SubsRoListing {
    client: Client,
    config: ListingConfig,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl SubsRoListing {
    pub fn new(config: ListingConfig) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            config,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    pub fn listing_url(&self, media: &MediaReference) -> String {
        format!(
            "{}/subtitrari/imdbid/{}",
            self.config.base_url.trim_end_matches('/'),
            media.numeric_id()
        )
    }

    /// Wait for the minimum spacing between listing requests.
    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        let interval = self.config.min_request_interval();

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < interval {
                let wait_time = interval - elapsed;
                debug!("Listing rate limit: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }

    async fn fetch_html(&self, url: &str) -> Result<String, ListingError> {
        self.wait_for_rate_limit().await;

        let response = self
            .client
            .get(url)
            .header(
                header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(header::ACCEPT_LANGUAGE, &self.config.accept_language)
            .header(header::REFERER, &self.config.base_url)
            .send()
            .await
            .map_err(|e| ListingError::from_reqwest(url, e))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(ListingError::Throttled {
                    url: url.to_string(),
                })
            }
            status if !status.is_success() => {
                return Err(ListingError::Fetch {
                    url: url.to_string(),
                    message: format!("HTTP {}", status),
                })
            }
            _ => {}
        }

        response
            .text()
            .await
            .map_err(|e| ListingError::from_reqwest(url, e))
    }
}

#[async_trait]
impl ListingSource for SubsRoListing {
    fn name(&self) -> &str {
        "subs.ro"
    }

    fn domain(&self) -> &str {
        self.config.domain()
    }

    fn referer(&self) -> Option<&str> {
        Some(&self.config.base_url)
    }

    async fn fetch_candidates(
        &self,
        media: &MediaReference,
    ) -> Result<Vec<CandidateSubtitle>, ListingError> {
        let url = self.listing_url(media);
        debug!(url = %url, "Fetching listing");

        let html = match self.fetch_html(&url).await {
            Ok(html) => html,
            Err(e) => {
                let result = if matches!(e, ListingError::Throttled { .. }) {
                    "throttled"
                } else {
                    "error"
                };
                metrics::LISTING_REQUESTS.with_label_values(&[result]).inc();
                return Err(e);
            }
        };
        metrics::LISTING_REQUESTS.with_label_values(&["success"]).inc();

        let candidates = parse_listing(&html, &media.series_id, &self.config)?;
        info!(
            media = %media,
            candidates = candidates.len(),
            "Listing fetched"
        );
        Ok(candidates)
    }
}

struct RowSelectors {
    row: Selector,
    title: Selector,
    download: Selector,
    comment: Selector,
    language: Selector,
    paragraph: Selector,
}

impl RowSelectors {
    fn new() -> Result<Self, ListingError> {
        let parse = |s: &str| Selector::parse(s).map_err(|e| ListingError::Parse(e.to_string()));
        Ok(Self {
            row: parse(".grid")?,
            title: parse("h1 a")?,
            download: parse(r#"a[href*="/subtitrare/descarca/"]"#)?,
            comment: parse(r#"[class*="f4f3e9"] p"#)?,
            language: parse(r#"img[alt*="Subtitrare"]"#)?,
            paragraph: parse("p")?,
        })
    }
}

/// Parse a listing page into candidates.
///
/// Rows without an archive link, or whose language badge is not the
/// configured language, are dropped. A row without a badge is kept.
pub fn parse_listing(
    html: &str,
    series_id: &str,
    config: &ListingConfig,
) -> Result<Vec<CandidateSubtitle>, ListingError> {
    let selectors = RowSelectors::new()?;
    let document = Html::parse_document(html);
    let base_url = config.base_url.trim_end_matches('/');

    let mut candidates = Vec::new();
    for (index, row) in document.select(&selectors.row).enumerate() {
        let Some(link) = row
            .select(&selectors.download)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };

        let badge = row
            .select(&selectors.language)
            .next()
            .and_then(|img| img.value().attr("alt"));
        if let Some(badge) = badge {
            if !badge.contains(&config.language_marker) {
                debug!(row = index, badge, "Skipping row in another language");
                continue;
            }
        }

        let title = row
            .select(&selectors.title)
            .next()
            .map(|a| {
                let text = element_text(&a);
                if text.is_empty() {
                    a.value().attr("title").unwrap_or_default().trim().to_string()
                } else {
                    text
                }
            })
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());

        let comment = row
            .select(&selectors.comment)
            .map(|p| element_text(&p))
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string();

        let translator = row
            .select(&selectors.paragraph)
            .map(|p| element_text(&p))
            .find(|text| text.contains(TRANSLATOR_LABEL))
            .and_then(|text| text.split_once(':').map(|(_, name)| name.trim().to_string()))
            .filter(|name| !name.is_empty());

        let version = VERSION_PATTERN
            .captures(&comment)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string());

        let source_url = if link.starts_with("http") {
            link.to_string()
        } else {
            format!("{}{}", base_url, link)
        };

        candidates.push(CandidateSubtitle {
            id: format!("subsro_{}_{}", index, series_id),
            source_url,
            language: config.result_language.clone(),
            title,
            comment,
            translator,
            version,
        });
    }

    Ok(candidates)
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
