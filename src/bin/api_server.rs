// HTTP API server binary serving the stored-review read path.

use anyhow::Result;
use steam_review_sync::api::ApiServer;
use steam_review_sync::database_ops::db::Db;
use steam_review_sync::util::{env as env_util, trace};

#[actix_web::main]
async fn main() -> Result<()> {
    trace::init_tracing("info,sqlx=warn")?;
    tracing::info!("initializing review API server");

    // Load dotenv/env once (safe to call multiple times)
    env_util::init_env();

    let server = ApiServer::from_env()?;

    let database_url = env_util::db_url()?;
    let max_connections: u32 = env_util::env_parse("DB_MAX_CONNS", 10u32);
    let db = Db::connect(&database_url, max_connections).await?;
    tracing::info!("database connected successfully");

    server.run(db).await
}
