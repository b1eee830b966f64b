//! Cursor-driven walk over the paged review API for a single title.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::database_ops::reviews::{ReviewRecord, ReviewStore, UpsertMode};
use crate::settings::Language;

/// Sentinel first-page cursor. Not a meaningful page marker; never entered
/// into the seen-cursor set.
pub const INITIAL_CURSOR: &str = "*";

/// One page from the upstream API. `reviews` carry the raw upstream language
/// token in `lang_key`; the walker maps it to a configured language key.
#[derive(Debug, Clone)]
pub struct ReviewPage {
    pub reviews: Vec<ReviewRecord>,
    pub cursor: String,
    pub total_reviews: Option<i64>,
}

/// Paged fetch contract. Implementations must fail with an error on
/// transport/protocol problems rather than returning an empty page.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    async fn fetch_page(
        &self,
        appid: i64,
        cursor: &str,
        languages_csv: &str,
        page_size: u32,
        sort_filter: &str,
    ) -> Result<ReviewPage>;

    async fn fetch_app_name(&self, appid: i64) -> Result<String>;
}

/// Result of one walk. `complete` is true only when the walk terminated via
/// cycle detection; reconciliation must not run otherwise.
#[derive(Debug)]
pub struct RunOutcome {
    pub ids: HashSet<i64>,
    pub total: Option<i64>,
    pub complete: bool,
}

impl RunOutcome {
    pub fn added(&self) -> usize {
        self.ids.len()
    }
}

/// Walks the paged API until the next cursor repeats, upserting each page in
/// ingest mode. A fetch failure ends the walk early with `complete = false`;
/// storage failures propagate as hard errors.
pub async fn walk_reviews(
    source: &dyn ReviewSource,
    store: &dyn ReviewStore,
    appid: i64,
    languages: &[&Language],
    page_size: u32,
    sort_filter: &str,
) -> Result<RunOutcome> {
    let steam_to_key: HashMap<&str, &str> = languages
        .iter()
        .map(|l| (l.steam_key.as_str(), l.lang_key.as_str()))
        .collect();
    let languages_csv = if languages.is_empty() {
        "all".to_string()
    } else {
        languages.iter().map(|l| l.steam_key.as_str()).join(",")
    };

    let mut seen_cursors: HashSet<String> = HashSet::new();
    let mut cursor = INITIAL_CURSOR.to_string();
    let mut ids: HashSet<i64> = HashSet::new();
    let mut total: Option<i64> = None;

    loop {
        let page = match source
            .fetch_page(appid, &cursor, &languages_csv, page_size, sort_filter)
            .await
        {
            Ok(page) => page,
            Err(err) => {
                warn!(appid, cursor = %cursor, error = %err,
                    "review page fetch failed; aborting walk");
                return Ok(RunOutcome {
                    ids,
                    total,
                    complete: false,
                });
            }
        };

        if page.total_reviews.is_some() {
            total = page.total_reviews;
        }

        let mut batch: Vec<ReviewRecord> = Vec::with_capacity(page.reviews.len());
        for mut review in page.reviews {
            let Some(lang_key) = steam_to_key.get(review.lang_key.as_str()) else {
                debug!(review_id = review.id, language = %review.lang_key,
                    "skipping review; language not tracked");
                continue;
            };
            review.lang_key = (*lang_key).to_string();
            if review.date_posted.is_none() {
                info!(review_id = review.id, url = %review.review_url,
                    "review missing posted date; dropping");
                continue;
            }
            if ids.insert(review.id) {
                batch.push(review);
            }
        }

        store.upsert_reviews(&batch, UpsertMode::IngestOnly).await?;

        match total {
            Some(t) if t > 0 => {
                let percent = (ids.len() as i64 * 100) / t;
                info!(appid, added = ids.len(), total = t, percent, "review sync progress");
            }
            _ => info!(appid, added = ids.len(), "review sync progress (total unknown)"),
        }

        if seen_cursors.contains(&page.cursor) {
            info!(appid, cursor = %page.cursor,
                "terminating on repeated cursor; no more reviews to add");
            break;
        }
        if page.cursor != INITIAL_CURSOR {
            seen_cursors.insert(page.cursor.clone());
        }
        cursor = page.cursor;
    }

    Ok(RunOutcome {
        ids,
        total,
        complete: true,
    })
}
