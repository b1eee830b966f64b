use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use steam_review_sync::database_ops::db::Db;
use steam_review_sync::database_ops::reconcile::remove_vanished_reviews;
use steam_review_sync::database_ops::reviews::ReviewStore;
use steam_review_sync::database_ops::steam::provider::{SteamReviewSource, SORT_FILTERS};
use steam_review_sync::database_ops::walker::{walk_reviews, ReviewSource};
use steam_review_sync::settings::{Language, Settings};
use steam_review_sync::util::{env as env_util, time::pretty_time, trace};

#[derive(Parser, Debug)]
#[command(
    name = "review_scraper",
    version,
    about = "Retrieves and parses Steam reviews for the tracked games in the settings file"
)]
struct Cli {
    /// If set, only errors will be printed during the retrieve and parse process
    #[arg(short, long)]
    silent: bool,
    /// Restrict the run to a single appid instead of every tracked app
    #[arg(long)]
    appid: Option<i64>,
    /// Path to the settings file
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,
    /// Reviews requested per API page
    #[arg(long, default_value_t = 100)]
    page_size: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.silent { "error" } else { "info,sqlx=warn" };
    trace::init_tracing(default_filter)?;
    env_util::init_env();

    let started = Instant::now();

    // Invalid settings abort the process before any ingestion.
    let settings = Settings::load(&cli.settings)?;
    let tracked_languages = settings.tracked_languages();

    let database_url = env_util::db_url()?;
    let max_connections: u32 = env_util::env_parse("DB_MAX_CONNS", 5u32);
    let db = Db::connect(&database_url, max_connections).await?;
    db.ensure_schema().await?;

    for language in &tracked_languages {
        db.upsert_language(language).await?;
    }

    let source = SteamReviewSource::new();
    let apps: Vec<i64> = match cli.appid {
        Some(appid) => vec![appid],
        None => settings.tracked_apps().iter().map(|a| a.appid).collect(),
    };
    info!(?apps, "parsing reviews for tracked apps");

    for appid in apps {
        if let Err(err) =
            sync_app(&source, &db, appid, &tracked_languages, cli.page_size).await
        {
            error!(appid, error = %err, "review sync failed for app");
        }
    }

    info!(elapsed = %pretty_time(started.elapsed()), "done");
    Ok(())
}

/// One full sync for a single title: title upsert, cursor walk, and (only
/// after a complete walk) removal of reviews deleted upstream.
async fn sync_app(
    source: &SteamReviewSource,
    db: &Db,
    appid: i64,
    languages: &[&Language],
    page_size: u32,
) -> Result<()> {
    let display_name = match source.fetch_app_name(appid).await {
        Ok(name) => name,
        Err(err) => {
            warn!(appid, error = %err, "could not fetch title name; falling back to appid");
            appid.to_string()
        }
    };
    info!(appid, name = %display_name, sort = SORT_FILTERS[0], "retrieving and parsing reviews");
    db.upsert_app(appid, &display_name).await?;

    let outcome = walk_reviews(source, db, appid, languages, page_size, SORT_FILTERS[0]).await?;
    info!(appid, added = outcome.added(), "review walk finished");

    if outcome.complete {
        let deleted = remove_vanished_reviews(db, appid, &outcome, languages).await?;
        info!(appid, deleted, "reconciliation finished");
    } else {
        warn!(appid, "walk terminated early; skipping reconciliation");
    }
    Ok(())
}
