//! Steam storefront review source.
//!
//! Wraps the paginated `appreviews` endpoint (opaque cursor, optional total
//! in `query_summary`) and the `appdetails` endpoint for title names.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::database_ops::reviews::ReviewRecord;
use crate::database_ops::walker::{ReviewPage, ReviewSource};
use crate::util::env::env_parse;

/// Page sort filters the reviews endpoint accepts.
pub const SORT_FILTERS: &[&str] = &["recent", "updated", "all"];

const REVIEWS_URL: &str = "https://store.steampowered.com/appreviews";
const APP_DETAILS_URL: &str = "https://store.steampowered.com/api/appdetails";

#[derive(Debug, Deserialize)]
struct ReviewsEnvelope {
    #[serde(default)]
    reviews: Vec<WireReview>,
    cursor: Option<String>,
    query_summary: Option<QuerySummary>,
}

#[derive(Debug, Deserialize)]
struct QuerySummary {
    #[serde(default)]
    total_reviews: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireReview {
    recommendationid: String,
    language: String,
    #[serde(default)]
    review: Option<String>,
    voted_up: bool,
    #[serde(default)]
    votes_up: Option<i64>,
    #[serde(default)]
    votes_funny: Option<i64>,
    #[serde(default)]
    timestamp_created: Option<i64>,
    #[serde(default)]
    timestamp_updated: Option<i64>,
    #[serde(default)]
    timestamp_dev_responded: Option<i64>,
    #[serde(default)]
    received_for_free: bool,
    #[serde(default)]
    written_during_early_access: bool,
    author: WireAuthor,
}

#[derive(Debug, Deserialize)]
struct WireAuthor {
    steamid: String,
    #[serde(default)]
    num_games_owned: Option<i32>,
    #[serde(default)]
    playtime_forever: Option<f64>,
}

pub struct SteamReviewSource {
    client: Client,
}

impl SteamReviewSource {
    pub fn new() -> Self {
        // Sane default timeout so slow Steam endpoints never hang a run.
        let timeout_secs: u64 = env_parse("STEAM_HTTP_TIMEOUT_SECS", 15u64);
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

impl Default for SteamReviewSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReviewSource for SteamReviewSource {
    async fn fetch_page(
        &self,
        appid: i64,
        cursor: &str,
        languages_csv: &str,
        page_size: u32,
        sort_filter: &str,
    ) -> Result<ReviewPage> {
        // day_range must span everything; the endpoint caps it at "since
        // forever", expressed as days since a date before Steam existed.
        let day_range = (Utc::now().date_naive()
            - NaiveDate::from_ymd_opt(1993, 1, 1).expect("valid static date"))
        .num_days();
        let url = format!("{REVIEWS_URL}/{appid}");
        let query = [
            ("json", "1".to_string()),
            ("cursor", cursor.to_string()),
            ("language", languages_csv.to_string()),
            ("filter", sort_filter.to_string()),
            ("review_type", "all".to_string()),
            ("purchase_type", "all".to_string()),
            ("num_per_page", page_size.to_string()),
            ("day_range", day_range.to_string()),
        ];

        let envelope: ReviewsEnvelope = get_json_with_backoff(&self.client, &url, &query)
            .await
            .with_context(|| format!("fetching reviews page for app {appid}"))?;
        let Some(next_cursor) = envelope.cursor else {
            bail!("reviews response for app {appid} is missing its cursor");
        };

        let reviews = envelope
            .reviews
            .into_iter()
            .filter_map(|wire| normalize_review(appid, wire))
            .collect();

        Ok(ReviewPage {
            reviews,
            cursor: next_cursor,
            total_reviews: envelope.query_summary.and_then(|s| s.total_reviews),
        })
    }

    async fn fetch_app_name(&self, appid: i64) -> Result<String> {
        let query = [("appids", appid.to_string())];
        let body: Value = get_json_with_backoff(&self.client, APP_DETAILS_URL, &query)
            .await
            .with_context(|| format!("fetching appdetails for app {appid}"))?;
        let entry = body
            .get(appid.to_string())
            .with_context(|| format!("appdetails response has no entry for app {appid}"))?;
        if !entry.get("success").and_then(Value::as_bool).unwrap_or(false) {
            bail!("appdetails lookup unsuccessful for app {appid}");
        }
        entry
            .get("data")
            .and_then(|d| d.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .with_context(|| format!("appdetails for app {appid} carries no name"))
    }
}

/// Builds a normalized record from a wire review; the language token is left
/// as received for the walker to map against the tracked language list.
fn normalize_review(appid: i64, wire: WireReview) -> Option<ReviewRecord> {
    let id = match wire.recommendationid.parse::<i64>() {
        Ok(id) => id,
        Err(_) => {
            warn!(recommendationid = %wire.recommendationid, appid,
                "unparseable recommendation id; skipping record");
            return None;
        }
    };
    let steamid = wire.author.steamid;
    Some(ReviewRecord {
        id,
        steam_appid: appid,
        recommended: wire.voted_up,
        user_name: Some(steamid.clone()),
        user_link: Some(format!("https://steamcommunity.com/profiles/{steamid}")),
        review_text: wire.review,
        hours_played: wire.author.playtime_forever.map(|minutes| minutes / 60.0),
        review_url: format!(
            "https://steamcommunity.com/profiles/{steamid}/recommended/{appid}"
        ),
        date_posted: timestamp(wire.timestamp_created),
        date_updated: timestamp(wire.timestamp_updated),
        helpful_amount: wire.votes_up.map(|v| v as i32),
        helpful_total: wire
            .votes_up
            .map(|up| (up + wire.votes_funny.unwrap_or(0)) as i32),
        owned_games_amount: wire.author.num_games_owned,
        early_access: wire.written_during_early_access,
        responded_by: None,
        responded_at: timestamp(wire.timestamp_dev_responded),
        lang_key: wire.language,
        received_compensation: wire.received_for_free,
        can_be_turned: None,
        issue_tags: Vec::new(),
    })
}

fn timestamp(unix: Option<i64>) -> Option<DateTime<Utc>> {
    unix.filter(|secs| *secs > 0)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

// -------- HTTP helper with 429 backoff --------

async fn get_json_with_backoff<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<T> {
    let delays = [5u64, 10, 15, 20];
    let mut attempt: usize = 0;
    loop {
        let resp = client
            .get(url)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await
            .context("request failed")?;
        if resp.status().as_u16() == 429 {
            if attempt >= delays.len() {
                bail!("still rate limited after {} retries", delays.len());
            }
            let mut sleep_secs = delays[attempt];
            if let Some(retry_after) = resp
                .headers()
                .get("Retry-After")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
            {
                if retry_after > sleep_secs {
                    sleep_secs = retry_after;
                }
            }
            attempt += 1;
            tokio::time::sleep(std::time::Duration::from_secs(sleep_secs)).await;
            continue;
        }
        if !resp.status().is_success() {
            bail!("api returned status {}", resp.status());
        }
        return resp.json::<T>().await.context("decoding response body");
    }
}
