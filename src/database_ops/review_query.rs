//! Filtered, sorted, paginated read queries over stored reviews.
//!
//! Every user-influenced value binds as a parameter; only sort tokens
//! validated against the column allow-list are interpolated into SQL.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, Postgres, QueryBuilder};

use crate::database_ops::db::Db;

/// Tri-state filter: keep rows where the property holds, keep rows where it
/// does not, or apply no constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Toggle {
    Only,
    Hide,
    #[default]
    Both,
}

impl Toggle {
    /// Lenient parse for query-string input; unknown tokens mean no filter.
    pub fn from_param(raw: &str) -> Self {
        match raw {
            "only" => Toggle::Only,
            "hide" => Toggle::Hide,
            _ => Toggle::Both,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoteFilter {
    Yes,
    No,
    #[default]
    Both,
}

impl VoteFilter {
    pub fn from_param(raw: &str) -> Self {
        match raw {
            "yes" => VoteFilter::Yes,
            "no" => VoteFilter::No,
            _ => VoteFilter::Both,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Anything other than the two known directions falls back to descending.
    pub fn from_param(raw: &str) -> Self {
        match raw {
            "asc" => SortOrder::Asc,
            "desc" => SortOrder::Desc,
            _ => SortOrder::Desc,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Columns a caller may sort on. Unlisted input falls back to `date_posted`.
const SORT_COLUMNS: &[&str] = &[
    "id",
    "recommended",
    "user_name",
    "review_text",
    "hours_played",
    "review_url",
    "date_posted",
    "date_updated",
    "helpful_amount",
    "helpful_total",
    "responded_by",
    "can_be_turned",
    "responded_at",
];

fn sort_column(requested: &str) -> &'static str {
    SORT_COLUMNS
        .iter()
        .copied()
        .find(|col| *col == requested)
        .unwrap_or("date_posted")
}

/// A fully-described read request. All filters are optional and independent;
/// absent ones impose no constraint.
#[derive(Debug, Clone)]
pub struct ReviewQuery {
    pub steam_appid: i64,
    pub page: i64,
    pub page_size: i64,
    pub sort_by: String,
    pub sort_order: SortOrder,
    pub lang_key: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub until_date: Option<DateTime<Utc>>,
    pub hide_never_updated: bool,
    pub only_resolved_issues: bool,
    pub issue_list: Vec<i64>,
    pub only_updated_after_response: bool,
    pub can_be_turned: Toggle,
    pub vote: VoteFilter,
    pub has_response: Toggle,
    /// Response-author filter; 0 is the unset sentinel.
    pub responded_by: i64,
}

impl ReviewQuery {
    pub fn for_app(steam_appid: i64) -> Self {
        Self {
            steam_appid,
            page: 0,
            page_size: 25,
            sort_by: "date_posted".to_string(),
            sort_order: SortOrder::Desc,
            lang_key: None,
            from_date: None,
            until_date: None,
            hide_never_updated: false,
            only_resolved_issues: false,
            issue_list: Vec::new(),
            only_updated_after_response: false,
            can_be_turned: Toggle::Both,
            vote: VoteFilter::Both,
            has_response: Toggle::Both,
            responded_by: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReviewRow {
    pub id: i64,
    pub recommended: bool,
    pub user_name: Option<String>,
    pub review_text: Option<String>,
    pub hours_played: Option<f64>,
    pub review_url: String,
    pub date_posted: DateTime<Utc>,
    pub date_updated: Option<DateTime<Utc>>,
    pub helpful_amount: Option<i32>,
    pub helpful_total: Option<i32>,
    pub responded_by: Option<i64>,
    pub can_be_turned: Option<bool>,
    pub issue_list: Vec<i64>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct QueryResult {
    pub rows: Vec<ReviewRow>,
    pub total_matching: i64,
    pub total_positive: i64,
}

const SELECT_COLUMNS: &str = "SELECT re.id, re.recommended, re.user_name, re.review_text, \
    re.hours_played, re.review_url, re.date_posted, re.date_updated, re.helpful_amount, \
    re.helpful_total, re.responded_by, re.can_be_turned, \
    ARRAY(SELECT rit.issue_id FROM stats_review_issue_tags rit \
        WHERE rit.review_id = re.id ORDER BY rit.issue_id) AS issue_list, \
    re.responded_at \
    FROM stats_steam_reviews re";

/// Appends the WHERE clause implied by the present filters. All three queries
/// of a request run through this one function so their clauses cannot drift.
fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, q: &'a ReviewQuery) {
    qb.push(" WHERE re.steam_appid = ").push_bind(q.steam_appid);

    if let Some(lang) = &q.lang_key {
        qb.push(" AND re.lang_key = ").push_bind(lang);
    }
    if let Some(from) = q.from_date {
        qb.push(" AND re.date_posted >= ").push_bind(from);
    }
    if let Some(until) = q.until_date {
        qb.push(" AND re.date_posted <= ").push_bind(until);
    }
    if q.hide_never_updated {
        qb.push(" AND re.date_updated IS NOT NULL");
    }

    // The two issue filters are mutually exclusive; resolved-issues wins.
    if q.only_resolved_issues {
        qb.push(
            " AND EXISTS (SELECT 1 FROM stats_review_issue_tags rit \
             JOIN stats_review_issues ri ON ri.id = rit.issue_id \
             WHERE rit.review_id = re.id AND ri.resolved_status > 0)",
        );
    } else if !q.issue_list.is_empty() {
        qb.push(
            " AND EXISTS (SELECT 1 FROM stats_review_issue_tags rit \
             WHERE rit.review_id = re.id AND rit.issue_id = ANY(",
        )
        .push_bind(q.issue_list.clone())
        .push("))");
    }

    if q.only_updated_after_response {
        qb.push(" AND re.date_updated > re.responded_at");
    }
    match q.can_be_turned {
        Toggle::Only => {
            qb.push(" AND re.can_be_turned = TRUE");
        }
        Toggle::Hide => {
            qb.push(" AND re.can_be_turned = FALSE");
        }
        Toggle::Both => {}
    }
    match q.vote {
        VoteFilter::Yes => {
            qb.push(" AND re.recommended = TRUE");
        }
        VoteFilter::No => {
            qb.push(" AND re.recommended = FALSE");
        }
        VoteFilter::Both => {}
    }
    match q.has_response {
        Toggle::Only => {
            qb.push(" AND re.responded_by IS NOT NULL");
        }
        Toggle::Hide => {
            qb.push(" AND re.responded_by IS NULL");
        }
        Toggle::Both => {}
    }
    if q.responded_by != 0 {
        qb.push(" AND re.responded_by = ").push_bind(q.responded_by);
    }
}

/// (limit, offset) to apply, or None when the requested page starts at or
/// past the end of the match set — then no window is applied at all, so an
/// out-of-range page never silently re-serves the first page.
fn page_window(page: i64, page_size: i64, total_matching: i64) -> Option<(i64, i64)> {
    let offset = page * page_size;
    (offset < total_matching).then_some((page_size, offset))
}

/// Runs the request's three queries (row page, matching count, positive
/// count) over identical filter clauses.
pub async fn fetch_reviews(db: &Db, q: &ReviewQuery) -> Result<QueryResult> {
    let mut count_qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("SELECT count(*) FROM stats_steam_reviews re");
    push_filters(&mut count_qb, q);
    let total_matching: i64 = count_qb
        .build_query_scalar()
        .persistent(false)
        .fetch_one(&db.pool)
        .await?;

    let mut positive_qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        "SELECT count(*) FILTER (WHERE re.recommended) FROM stats_steam_reviews re",
    );
    push_filters(&mut positive_qb, q);
    let total_positive: i64 = positive_qb
        .build_query_scalar()
        .persistent(false)
        .fetch_one(&db.pool)
        .await?;

    let mut rows_qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(SELECT_COLUMNS);
    push_filters(&mut rows_qb, q);
    rows_qb
        .push(" ORDER BY re.")
        .push(sort_column(&q.sort_by))
        .push(" ")
        .push(q.sort_order.sql());
    if let Some((limit, offset)) = page_window(q.page, q.page_size, total_matching) {
        rows_qb
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
    }
    let rows = rows_qb
        .build_query_as::<ReviewRow>()
        .persistent(false)
        .fetch_all(&db.pool)
        .await?;

    Ok(QueryResult {
        rows,
        total_matching,
        total_positive,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn where_sql(q: &ReviewQuery) -> String {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT count(*) FROM stats_steam_reviews re");
        push_filters(&mut qb, q);
        qb.sql().to_string()
    }

    #[test]
    fn unknown_sort_column_falls_back_to_date_posted() {
        assert_eq!(sort_column("droptable"), "date_posted");
        assert_eq!(sort_column("helpful_amount"), "helpful_amount");
        assert_eq!(sort_column("id; DROP TABLE stats_steam_reviews"), "date_posted");
    }

    #[test]
    fn unknown_sort_order_falls_back_to_desc() {
        assert_eq!(SortOrder::from_param("asc"), SortOrder::Asc);
        assert_eq!(SortOrder::from_param("sideways"), SortOrder::Desc);
    }

    #[test]
    fn neutral_query_constrains_only_the_app() {
        let sql = where_sql(&ReviewQuery::for_app(440));
        assert!(sql.contains("re.steam_appid = $1"));
        assert!(!sql.contains(" AND "));
    }

    #[test]
    fn present_filters_bind_parameters() {
        let mut q = ReviewQuery::for_app(440);
        q.lang_key = Some("en".into());
        q.from_date = Some(Utc::now());
        q.until_date = Some(Utc::now());
        q.responded_by = 7;
        let sql = where_sql(&q);
        assert!(sql.contains("re.lang_key = $2"));
        assert!(sql.contains("re.date_posted >= $3"));
        assert!(sql.contains("re.date_posted <= $4"));
        assert!(sql.contains("re.responded_by = $5"));
    }

    #[test]
    fn zero_responded_by_means_no_author_filter() {
        let sql = where_sql(&ReviewQuery::for_app(440));
        assert!(!sql.contains("re.responded_by ="));
    }

    #[test]
    fn resolved_issue_filter_wins_over_explicit_tag_set() {
        let mut q = ReviewQuery::for_app(440);
        q.only_resolved_issues = true;
        q.issue_list = vec![1, 2, 3];
        let sql = where_sql(&q);
        assert!(sql.contains("resolved_status > 0"));
        assert!(!sql.contains("ANY("));
    }

    #[test]
    fn explicit_tag_set_binds_an_id_array() {
        let mut q = ReviewQuery::for_app(440);
        q.issue_list = vec![1, 2, 3];
        let sql = where_sql(&q);
        assert!(sql.contains("rit.issue_id = ANY($2)"));
    }

    #[test]
    fn tri_state_filters_expand_to_fixed_literals() {
        let mut q = ReviewQuery::for_app(440);
        q.can_be_turned = Toggle::Only;
        q.vote = VoteFilter::No;
        q.has_response = Toggle::Hide;
        q.hide_never_updated = true;
        q.only_updated_after_response = true;
        let sql = where_sql(&q);
        assert!(sql.contains("re.can_be_turned = TRUE"));
        assert!(sql.contains("re.recommended = FALSE"));
        assert!(sql.contains("re.responded_by IS NULL"));
        assert!(sql.contains("re.date_updated IS NOT NULL"));
        assert!(sql.contains("re.date_updated > re.responded_at"));
    }

    #[test]
    fn out_of_range_page_gets_no_window() {
        assert_eq!(page_window(0, 25, 100), Some((25, 0)));
        assert_eq!(page_window(3, 25, 100), Some((25, 75)));
        assert_eq!(page_window(4, 25, 100), None);
        assert_eq!(page_window(0, 25, 0), None);
    }
}
