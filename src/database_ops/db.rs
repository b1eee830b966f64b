use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool,
};
use tracing::{info, instrument};

#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let use_prepared = std::env::var("USE_PREPARED")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("on"))
            .unwrap_or(false);
        let mut connect_options = PgConnectOptions::from_str(database_url)?;

        if database_url.contains("sslmode=require") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }

        if !use_prepared {
            // PgBouncer txn mode safe
            connect_options = connect_options.statement_cache_capacity(0);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await?;
        info!("connected to db");
        Ok(Self { pool })
    }

    /// Idempotent schema bootstrap. All statements are IF NOT EXISTS so this
    /// is safe to run at every scraper start; the API server never calls it.
    pub async fn ensure_schema(&self) -> Result<()> {
        for stmt in SCHEMA_STATEMENTS {
            sqlx::raw_sql(stmt).execute(&self.pool).await?;
        }
        info!("schema ensured");
        Ok(())
    }
}

const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS stats_steam_games (
        steam_appid BIGINT PRIMARY KEY,
        display_name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS stats_steam_languages (
        lang_key TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        steam_key TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS stats_review_issues (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        resolved_status BIGINT NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS stats_steam_reviews (
        id BIGINT PRIMARY KEY,
        steam_appid BIGINT NOT NULL REFERENCES stats_steam_games(steam_appid),
        recommended BOOLEAN NOT NULL,
        user_name TEXT,
        user_link TEXT,
        review_text TEXT,
        hours_played DOUBLE PRECISION,
        review_url TEXT NOT NULL,
        date_posted TIMESTAMPTZ NOT NULL,
        date_updated TIMESTAMPTZ,
        helpful_amount INTEGER,
        helpful_total INTEGER,
        owned_games_amount INTEGER,
        early_access BOOLEAN NOT NULL DEFAULT FALSE,
        responded_by BIGINT,
        responded_at TIMESTAMPTZ,
        lang_key TEXT REFERENCES stats_steam_languages(lang_key),
        received_compensation BOOLEAN NOT NULL DEFAULT FALSE,
        can_be_turned BOOLEAN
    )",
    "CREATE INDEX IF NOT EXISTS idx_steam_reviews_app_posted
        ON stats_steam_reviews (steam_appid, date_posted)",
    "CREATE INDEX IF NOT EXISTS idx_steam_reviews_app_lang
        ON stats_steam_reviews (steam_appid, lang_key)",
    "CREATE TABLE IF NOT EXISTS stats_review_issue_tags (
        review_id BIGINT NOT NULL REFERENCES stats_steam_reviews(id) ON DELETE CASCADE,
        issue_id BIGINT NOT NULL REFERENCES stats_review_issues(id),
        PRIMARY KEY (review_id, issue_id)
    )",
];
