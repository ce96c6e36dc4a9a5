//! Scraping client for series/season pages
//!
//! One `PortalClient` is configured per portal; the scraping algorithm is
//! shared. All parsing works on fetched page text so the HTML handling stays
//! out of async context (`scraper::Html` is not `Send`).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode, header};
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::language::LanguageFlags;
use crate::portal::{EpisodeSnapshot, Portal, PortalError, SeasonSnapshot, SeriesSnapshot};

/// Marker string of the anti-bot interstitial page
const CHALLENGE_MARKER: &str = "Browser Check";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

static SEASON_NAV_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.hosterSiteDirectNav ul").unwrap());
static NAV_ITEM_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("li").unwrap());
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.series-title h1 span").unwrap());
static COVER_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.seriesCoverBox img").unwrap());
static EPISODE_TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tbody tr td.seasonEpisodeTitle a").unwrap());
static EPISODE_ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody tr").unwrap());
static LANGUAGE_ICON_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td a img").unwrap());
static NAME_PART_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("strong, span").unwrap());

/// Header data parsed from a series root page
#[derive(Debug)]
struct SeriesHeader {
    name: String,
    cover_art_url: Option<String>,
    season_count: i32,
}

/// Scraper for one streaming portal
pub struct PortalClient {
    portal: Portal,
    base_url: String,
    client: Client,
}

impl PortalClient {
    /// Create a client for the given portal.
    ///
    /// `base_url` is the portal origin, e.g. `https://aniworld.to`.
    pub fn new(portal: Portal, base_url: &str) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::USER_AGENT, USER_AGENT.parse()?);

        let client = Client::builder()
            .default_headers(headers)
            .gzip(true)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            portal,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn portal(&self) -> Portal {
        self.portal
    }

    /// Fetch and assemble a full snapshot of one series.
    ///
    /// Fails with `NotFound` when the series page does not resolve or lacks
    /// the season-count marker; with `Unreachable` on transport failures and
    /// anti-bot challenge pages. A season page that cannot be fetched aborts
    /// the scrape so a partial snapshot is never diffed.
    pub async fn fetch_series(&self, path: &str) -> Result<SeriesSnapshot, PortalError> {
        let series_url = format!("{}{}", self.base_url, self.portal.series_path(path));
        let (status, html) = self.get_page(&series_url).await?;

        if !status.is_success() {
            return Err(PortalError::NotFound {
                portal: self.portal,
                path: path.to_string(),
            });
        }

        let header = self.parse_series_page(&html, path)?;
        debug!(
            portal = %self.portal,
            series = %header.name,
            seasons = header.season_count,
            "Parsed series page"
        );

        let mut seasons = Vec::with_capacity(header.season_count as usize);

        for season in 1..=header.season_count {
            let season_url = format!("{}{}", self.base_url, self.portal.season_path(path, season));
            let (status, html) = self.get_page(&season_url).await?;

            if !status.is_success() {
                return Err(PortalError::Unreachable {
                    portal: self.portal,
                    reason: format!("season {season} page returned status {status}"),
                });
            }

            let snapshot = parse_season_page(&html, season);

            if snapshot.episode_count == 0 {
                // Kept so the classifier can observe "season exists, episode
                // count zero" rather than a missing season.
                warn!(portal = %self.portal, series = path, season, "Season page has no episode rows");
            }

            seasons.push(snapshot);
        }

        Ok(SeriesSnapshot {
            name: header.name,
            path: path.to_string(),
            cover_art_url: header.cover_art_url,
            season_count: header.season_count,
            seasons,
        })
    }

    async fn get_page(&self, url: &str) -> Result<(StatusCode, String), PortalError> {
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|e| PortalError::Unreachable {
                    portal: self.portal,
                    reason: e.to_string(),
                })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| PortalError::Unreachable {
            portal: self.portal,
            reason: e.to_string(),
        })?;

        if body.contains(CHALLENGE_MARKER) {
            return Err(PortalError::Unreachable {
                portal: self.portal,
                reason: "anti-bot challenge page".to_string(),
            });
        }

        Ok((status, body))
    }

    fn parse_series_page(&self, html: &str, path: &str) -> Result<SeriesHeader, PortalError> {
        let document = Html::parse_document(html);

        // The first direct-nav block lists the seasons; its last entry is the
        // season count. A page without this marker is not a series page.
        let season_count = document
            .select(&SEASON_NAV_SELECTOR)
            .next()
            .and_then(|nav| nav.select(&NAV_ITEM_SELECTOR).last())
            .map(|li| li.text().collect::<String>())
            .and_then(|text| text.trim().parse::<i32>().ok())
            .ok_or_else(|| PortalError::NotFound {
                portal: self.portal,
                path: path.to_string(),
            })?;

        let name = document
            .select(&TITLE_SELECTOR)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| PortalError::Parse {
                portal: self.portal,
                reason: "series title missing".to_string(),
            })?;

        let cover_art_url = document
            .select(&COVER_SELECTOR)
            .next()
            .and_then(|img| img.value().attr("data-src"))
            .map(|src| {
                if src.starts_with("http") {
                    src.to_string()
                } else {
                    format!("{}{src}", self.base_url)
                }
            });

        Ok(SeriesHeader {
            name,
            cover_art_url,
            season_count,
        })
    }
}

/// Parse one season page into a `SeasonSnapshot`.
///
/// Episode numbering is strictly sequential by row order starting at 1;
/// language icons are correlated through the season-scoped
/// `data-episode-season-id` attribute carried by each episode row.
fn parse_season_page(html: &str, season: i32) -> SeasonSnapshot {
    let document = Html::parse_document(html);

    let languages_by_row = episode_languages(&document);

    let mut episodes = Vec::new();
    let mut index = 1;

    for anchor in document.select(&EPISODE_TITLE_SELECTOR) {
        // Display name: first non-empty strong/span text node in the cell
        let name = anchor
            .select(&NAME_PART_SELECTOR)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .find(|text| !text.is_empty());

        let Some(name) = name else {
            continue;
        };

        episodes.push(EpisodeSnapshot {
            season,
            episode: index,
            name,
            languages: languages_by_row.get(&index).copied().unwrap_or_default(),
        });

        index += 1;
    }

    SeasonSnapshot {
        season,
        episode_count: episodes.len() as i32,
        episodes,
    }
}

/// Language availability per episode row, keyed by the row's season-scoped id.
fn episode_languages(document: &Html) -> HashMap<i32, LanguageFlags> {
    let mut map = HashMap::new();

    for row in document.select(&EPISODE_ROW_SELECTOR) {
        let Some(row_id) = row
            .value()
            .attr("data-episode-season-id")
            .and_then(|id| id.trim().parse::<i32>().ok())
        else {
            continue;
        };

        let mut flags = LanguageFlags::empty();

        for icon in row.select(&LANGUAGE_ICON_SELECTOR) {
            if let Some(title) = icon.value().attr("title") {
                // Unrecognized titles are ignored, not fatal
                if let Some(flag) = LanguageFlags::from_portal_title(title) {
                    flags |= flag;
                }
            }
        }

        map.insert(row_id, flags);
    }

    map
}
