// HTTP request handlers for API endpoints

use actix_web::{web, HttpResponse, Result};
use std::time::SystemTime;

use crate::api::models::*;
use crate::database_ops::db::Db;
use crate::database_ops::review_query::fetch_reviews;

/// Health check endpoint
pub async fn health_check(db: web::Data<Db>) -> Result<HttpResponse> {
    // Quick database connectivity check
    let db_status = match sqlx::query_scalar::<_, bool>("SELECT true")
        .fetch_one(&db.pool)
        .await
    {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    let uptime = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let response = ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        database: db_status.to_string(),
        uptime_seconds: uptime,
    });

    Ok(HttpResponse::Ok().json(response))
}

/// Filtered, sorted, paginated review listing for the reporting front end.
pub async fn list_reviews(
    params: web::Query<ReviewListParams>,
    db: web::Data<Db>,
) -> Result<HttpResponse> {
    let query = params.into_inner().into_query();
    tracing::debug!(
        appid = query.steam_appid,
        page = query.page,
        sort_by = %query.sort_by,
        "review listing requested"
    );

    match fetch_reviews(&db, &query).await {
        Ok(result) => {
            let payload = ReviewListPayload {
                reviews: result.rows,
                total_matching: result.total_matching,
                total_positive: result.total_positive,
                page: query.page,
                page_size: query.page_size,
            };
            Ok(HttpResponse::Ok().json(ApiResponse::success(payload)))
        }
        Err(err) => {
            tracing::error!(appid = query.steam_appid, error = %err, "review listing failed");
            Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<ReviewListPayload>::error("review query failed")))
        }
    }
}
