// API server implementation using actix-web

use actix_web::{middleware::Condition, web, App, HttpServer};
use anyhow::{Context, Result};

use crate::api::{auth, middleware, routes};
use crate::database_ops::db::Db;
use crate::util::env as env_util;

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    /// Bearer secret for `/api/v1`; None serves the API unauthenticated
    /// (local reporting setups).
    pub api_secret: Option<String>,
    pub allowed_origins: String,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        env_util::init_env();

        let host = env_util::env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = env_util::env_opt("API_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .context("invalid API_PORT")?;
        let api_secret = env_util::env_opt("API_SECRET");
        let allowed_origins = env_util::env_opt("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000,http://localhost:8000".to_string());

        Ok(Self {
            host,
            port,
            api_secret,
            allowed_origins,
        })
    }

    /// Start the HTTP server
    pub async fn run(self, db: Db) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        tracing::info!(
            host = %self.host,
            port = self.port,
            auth = self.api_secret.is_some(),
            "starting review API server"
        );
        if self.api_secret.is_none() {
            tracing::warn!("API_SECRET not set; serving the review API without authentication");
        }

        let db_data = web::Data::new(db);
        let api_secret = self.api_secret.clone();
        let allowed_origins = self.allowed_origins.clone();

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);
            let auth = Condition::new(
                api_secret.is_some(),
                auth::Auth::new(api_secret.clone().unwrap_or_default()),
            );

            App::new()
                .app_data(db_data.clone())
                .wrap(logger)
                .wrap(compress)
                .wrap(cors)
                .wrap(auth)
                .configure(routes::configure_routes)
        })
        .bind(&bind_addr)
        .with_context(|| format!("failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
