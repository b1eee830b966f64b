//! Review model and the storage sink used by ingestion and reconciliation.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, info};

use crate::database_ops::db::Db;
use crate::settings::Language;

/// One normalized review as ingested from the upstream API, plus the
/// human-curated fields the moderation front end may set later.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRecord {
    pub id: i64,
    pub steam_appid: i64,
    pub recommended: bool,
    pub user_name: Option<String>,
    pub user_link: Option<String>,
    pub review_text: Option<String>,
    pub hours_played: Option<f64>,
    pub review_url: String,
    /// Required for persistence; records without it are rejected by the sink.
    pub date_posted: Option<DateTime<Utc>>,
    pub date_updated: Option<DateTime<Utc>>,
    pub helpful_amount: Option<i32>,
    pub helpful_total: Option<i32>,
    pub owned_games_amount: Option<i32>,
    pub early_access: bool,
    /// Human-owned moderation field; ingest-mode upserts never write it.
    pub responded_by: Option<i64>,
    /// Developer-response timestamp as reported by the API.
    pub responded_at: Option<DateTime<Utc>>,
    pub lang_key: String,
    pub received_compensation: bool,
    /// Human-curated; ingest-mode upserts never write it.
    pub can_be_turned: Option<bool>,
    /// Human-curated issue-tag ids; only full-mode upserts replace them.
    pub issue_tags: Vec<i64>,
}

/// Upsert variants: `IngestOnly` updates ingestion-owned columns only and
/// leaves `can_be_turned`, `responded_by` and issue tags untouched; `Full`
/// writes those as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMode {
    IngestOnly,
    Full,
}

/// A stored review's identity and language, as needed by reconciliation.
#[derive(Debug, Clone)]
pub struct StoredReviewRef {
    pub id: i64,
    pub lang_key: Option<String>,
}

/// Narrow persistence contract consumed by the walker and the reconciler.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Idempotently persists a batch keyed by review id. Returns the number
    /// of records actually written (records missing their posted date are
    /// dropped with a diagnostic).
    async fn upsert_reviews(&self, reviews: &[ReviewRecord], mode: UpsertMode) -> Result<usize>;
    async fn delete_review(&self, review_id: i64) -> Result<()>;
    async fn upsert_app(&self, appid: i64, display_name: &str) -> Result<()>;
    async fn upsert_language(&self, language: &Language) -> Result<()>;
    async fn stored_reviews(&self, appid: i64) -> Result<Vec<StoredReviewRef>>;
}

/// Drops records lacking a posted date (logged for manual replay) and
/// collapses duplicate ids so a single INSERT .. ON CONFLICT statement never
/// touches the same row twice.
fn storable(reviews: &[ReviewRecord]) -> Vec<&ReviewRecord> {
    let mut by_id: HashMap<i64, &ReviewRecord> = HashMap::with_capacity(reviews.len());
    for review in reviews {
        if review.date_posted.is_none() {
            info!(
                review_id = review.id,
                url = %review.review_url,
                "review missing posted date; not persisting"
            );
            continue;
        }
        by_id.insert(review.id, review);
    }
    let mut unique: Vec<&ReviewRecord> = by_id.into_values().collect();
    unique.sort_by_key(|r| r.id);
    unique
}

/// Builds the batch INSERT .. ON CONFLICT statement for a mode. Ingest mode
/// names only ingestion-owned columns, so a conflicting row keeps whatever a
/// human set in `can_be_turned` and `responded_by`.
fn build_upsert<'a>(rows: &'a [&'a ReviewRecord], mode: UpsertMode) -> QueryBuilder<'a, Postgres> {
    let mut qb: QueryBuilder<'a, Postgres> = QueryBuilder::new(
        "INSERT INTO stats_steam_reviews (id, steam_appid, recommended, user_name, \
         user_link, review_text, hours_played, review_url, date_posted, date_updated, \
         helpful_amount, helpful_total, owned_games_amount, early_access, responded_at, \
         lang_key, received_compensation",
    );
    if mode == UpsertMode::Full {
        qb.push(", responded_by, can_be_turned");
    }
    qb.push(") ");
    qb.push_values(rows, |mut b, r| {
        b.push_bind(r.id)
            .push_bind(r.steam_appid)
            .push_bind(r.recommended)
            .push_bind(r.user_name.as_ref())
            .push_bind(r.user_link.as_ref())
            .push_bind(r.review_text.as_ref())
            .push_bind(r.hours_played)
            .push_bind(&r.review_url)
            .push_bind(r.date_posted)
            .push_bind(r.date_updated)
            .push_bind(r.helpful_amount)
            .push_bind(r.helpful_total)
            .push_bind(r.owned_games_amount)
            .push_bind(r.early_access)
            .push_bind(r.responded_at)
            .push_bind(&r.lang_key)
            .push_bind(r.received_compensation);
        if mode == UpsertMode::Full {
            b.push_bind(r.responded_by).push_bind(r.can_be_turned);
        }
    });
    qb.push(
        " ON CONFLICT (id) DO UPDATE SET \
         recommended = EXCLUDED.recommended, \
         user_name = EXCLUDED.user_name, \
         user_link = EXCLUDED.user_link, \
         review_text = EXCLUDED.review_text, \
         hours_played = EXCLUDED.hours_played, \
         review_url = EXCLUDED.review_url, \
         date_posted = EXCLUDED.date_posted, \
         date_updated = EXCLUDED.date_updated, \
         helpful_amount = EXCLUDED.helpful_amount, \
         helpful_total = EXCLUDED.helpful_total, \
         owned_games_amount = EXCLUDED.owned_games_amount, \
         early_access = EXCLUDED.early_access, \
         responded_at = EXCLUDED.responded_at, \
         lang_key = EXCLUDED.lang_key, \
         received_compensation = EXCLUDED.received_compensation",
    );
    if mode == UpsertMode::Full {
        qb.push(
            ", responded_by = EXCLUDED.responded_by, \
             can_be_turned = EXCLUDED.can_be_turned",
        );
    }
    qb
}

#[async_trait]
impl ReviewStore for Db {
    async fn upsert_reviews(&self, reviews: &[ReviewRecord], mode: UpsertMode) -> Result<usize> {
        let rows = storable(reviews);
        if rows.is_empty() {
            return Ok(0);
        }

        let mut qb = build_upsert(&rows, mode);
        qb.build().persistent(false).execute(&self.pool).await?;

        if mode == UpsertMode::Full {
            self.replace_issue_tags(&rows).await?;
        }

        debug!(count = rows.len(), ?mode, "upserted review batch");
        Ok(rows.len())
    }

    async fn delete_review(&self, review_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM stats_steam_reviews WHERE id = $1")
            .persistent(false)
            .bind(review_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_app(&self, appid: i64, display_name: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO stats_steam_games (steam_appid, display_name) VALUES ($1, $2) \
             ON CONFLICT (steam_appid) DO UPDATE SET display_name = EXCLUDED.display_name",
        )
        .persistent(false)
        .bind(appid)
        .bind(display_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_language(&self, language: &Language) -> Result<()> {
        sqlx::query(
            "INSERT INTO stats_steam_languages (lang_key, name, steam_key) VALUES ($1, $2, $3) \
             ON CONFLICT (lang_key) DO UPDATE SET name = EXCLUDED.name, \
             steam_key = EXCLUDED.steam_key",
        )
        .persistent(false)
        .bind(&language.lang_key)
        .bind(&language.name)
        .bind(&language.steam_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn stored_reviews(&self, appid: i64) -> Result<Vec<StoredReviewRef>> {
        let rows: Vec<(i64, Option<String>)> = sqlx::query_as(
            "SELECT id, lang_key FROM stats_steam_reviews WHERE steam_appid = $1",
        )
        .persistent(false)
        .bind(appid)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, lang_key)| StoredReviewRef { id, lang_key })
            .collect())
    }
}

impl Db {
    async fn replace_issue_tags(&self, rows: &[&ReviewRecord]) -> Result<()> {
        let review_ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        sqlx::query("DELETE FROM stats_review_issue_tags WHERE review_id = ANY($1)")
            .persistent(false)
            .bind(&review_ids)
            .execute(&self.pool)
            .await?;

        let pairs: Vec<(i64, i64)> = rows
            .iter()
            .flat_map(|r| r.issue_tags.iter().map(|issue| (r.id, *issue)))
            .collect();
        if pairs.is_empty() {
            return Ok(());
        }
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("INSERT INTO stats_review_issue_tags (review_id, issue_id) ");
        qb.push_values(&pairs, |mut b, (review_id, issue_id)| {
            b.push_bind(review_id).push_bind(issue_id);
        });
        qb.push(" ON CONFLICT DO NOTHING");
        qb.build().persistent(false).execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, posted: bool) -> ReviewRecord {
        ReviewRecord {
            id,
            steam_appid: 440,
            recommended: true,
            user_name: Some(format!("user-{id}")),
            user_link: None,
            review_text: Some("ok".into()),
            hours_played: Some(1.5),
            review_url: format!("https://steamcommunity.com/profiles/{id}/recommended/440"),
            date_posted: posted.then(Utc::now),
            date_updated: None,
            helpful_amount: Some(0),
            helpful_total: Some(0),
            owned_games_amount: None,
            early_access: false,
            responded_by: None,
            responded_at: None,
            lang_key: "en".into(),
            received_compensation: false,
            can_be_turned: None,
            issue_tags: Vec::new(),
        }
    }

    #[test]
    fn storable_drops_missing_dates_and_duplicate_ids() {
        let batch = vec![record(1, true), record(2, false), record(1, true)];
        let rows = storable(&batch);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 1);
    }

    #[test]
    fn storable_keeps_distinct_ids_sorted() {
        let batch = vec![record(3, true), record(1, true), record(2, true)];
        let ids: Vec<i64> = storable(&batch).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn ingest_mode_never_names_human_curated_columns() {
        let batch = vec![record(1, true)];
        let rows = storable(&batch);
        let mut qb = build_upsert(&rows, UpsertMode::IngestOnly);
        let sql = qb.sql().to_string();
        assert!(!sql.contains("can_be_turned"));
        assert!(!sql.contains("responded_by"));
        assert!(sql.contains("ON CONFLICT (id) DO UPDATE SET"));
        assert!(sql.contains("responded_at = EXCLUDED.responded_at"));
    }

    #[test]
    fn full_mode_updates_human_curated_columns() {
        let batch = vec![record(1, true)];
        let rows = storable(&batch);
        let mut qb = build_upsert(&rows, UpsertMode::Full);
        let sql = qb.sql().to_string();
        assert!(sql.contains("can_be_turned = EXCLUDED.can_be_turned"));
        assert!(sql.contains("responded_by = EXCLUDED.responded_by"));
    }
}
