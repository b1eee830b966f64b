// API request/response models (DTOs)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database_ops::review_query::{
    ReviewQuery, ReviewRow, SortOrder, Toggle, VoteFilter,
};

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub meta: Meta,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Meta::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            meta: Meta::now(),
        }
    }
}

/// Metadata included in all API responses
#[derive(Debug, Serialize)]
pub struct Meta {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub version: String,
}

impl Meta {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: uuid::Uuid::new_v4().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub uptime_seconds: u64,
}

fn default_page_size() -> i64 {
    25
}

fn default_sort_by() -> String {
    "date_posted".to_string()
}

/// Query-string parameters of `GET /api/v1/reviews`. Filter tokens are
/// lenient strings; unknown values mean "no constraint" rather than a 400.
#[derive(Debug, Deserialize)]
pub struct ReviewListParams {
    pub appid: i64,
    #[serde(default)]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    pub sort_order: Option<String>,
    pub lang_key: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub until_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub hide_never_updated: bool,
    #[serde(default)]
    pub only_resolved_issues: bool,
    /// Comma-separated issue-tag ids; non-numeric entries are discarded.
    pub issue_list: Option<String>,
    #[serde(default)]
    pub only_updated_after_response: bool,
    pub can_be_turned: Option<String>,
    pub vote: Option<String>,
    pub has_response: Option<String>,
    #[serde(default)]
    pub responded_by: i64,
}

impl ReviewListParams {
    pub fn into_query(self) -> ReviewQuery {
        let issue_list = self
            .issue_list
            .as_deref()
            .map(|csv| {
                csv.split(',')
                    .filter_map(|token| token.trim().parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default();
        ReviewQuery {
            steam_appid: self.appid,
            page: self.page.max(0),
            page_size: self.page_size.clamp(1, 500),
            sort_by: self.sort_by,
            sort_order: SortOrder::from_param(self.sort_order.as_deref().unwrap_or("desc")),
            lang_key: self.lang_key,
            from_date: self.from_date,
            until_date: self.until_date,
            hide_never_updated: self.hide_never_updated,
            only_resolved_issues: self.only_resolved_issues,
            issue_list,
            only_updated_after_response: self.only_updated_after_response,
            can_be_turned: Toggle::from_param(self.can_be_turned.as_deref().unwrap_or("both")),
            vote: VoteFilter::from_param(self.vote.as_deref().unwrap_or("both")),
            has_response: Toggle::from_param(self.has_response.as_deref().unwrap_or("both")),
            responded_by: self.responded_by,
        }
    }
}

/// Review listing response
#[derive(Debug, Serialize)]
pub struct ReviewListPayload {
    pub reviews: Vec<ReviewRow>,
    pub total_matching: i64,
    pub total_positive: i64,
    pub page: i64,
    pub page_size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ReviewListParams {
        ReviewListParams {
            appid: 440,
            page: 2,
            page_size: 50,
            sort_by: "helpful_amount".into(),
            sort_order: Some("upside-down".into()),
            lang_key: None,
            from_date: None,
            until_date: None,
            hide_never_updated: false,
            only_resolved_issues: false,
            issue_list: Some("3, 9,banana,12".into()),
            only_updated_after_response: false,
            can_be_turned: Some("only".into()),
            vote: None,
            has_response: Some("nonsense".into()),
            responded_by: 0,
        }
    }

    #[test]
    fn lenient_tokens_map_to_neutral_or_known_filters() {
        let q = params().into_query();
        assert_eq!(q.sort_order, SortOrder::Desc);
        assert_eq!(q.can_be_turned, Toggle::Only);
        assert_eq!(q.has_response, Toggle::Both);
        assert_eq!(q.vote, VoteFilter::Both);
        assert_eq!(q.issue_list, vec![3, 9, 12]);
    }
}
