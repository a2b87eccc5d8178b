use chrono::{DateTime, Utc};
use sqlx::Row;

use paydeck_core::domain::check::CheckId;
use paydeck_core::domain::company::CompanyId;
use paydeck_core::domain::review::{ReviewRequest, ReviewRequestId, ReviewScope, ReviewStatus};
use paydeck_core::domain::user::UserId;
use paydeck_core::week::WeekKey;

use super::{RepositoryError, ReviewRequestRepository};
use crate::DbPool;

const REQUEST_COLUMNS: &str =
    "id, check_id, company_id, week_key, created_by, status, reviewed, created_at";

pub struct SqlReviewRequestRepository {
    pool: DbPool,
}

impl SqlReviewRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_status(s: &str) -> ReviewStatus {
    match s {
        "reviewed" => ReviewStatus::Reviewed,
        _ => ReviewStatus::Pending,
    }
}

pub fn review_status_as_str(status: ReviewStatus) -> &'static str {
    match status {
        ReviewStatus::Pending => "pending",
        ReviewStatus::Reviewed => "reviewed",
    }
}

fn decode_err(field: &str, error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(format!("review_requests.{field}: {error}"))
}

pub(crate) fn row_to_request(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ReviewRequest, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| decode_err("id", e))?;
    let check_id: Option<String> =
        row.try_get("check_id").map_err(|e| decode_err("check_id", e))?;
    let company_id: String =
        row.try_get("company_id").map_err(|e| decode_err("company_id", e))?;
    let week_key_str: String =
        row.try_get("week_key").map_err(|e| decode_err("week_key", e))?;
    let created_by: String =
        row.try_get("created_by").map_err(|e| decode_err("created_by", e))?;
    let status_str: String = row.try_get("status").map_err(|e| decode_err("status", e))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| decode_err("created_at", e))?;

    let week_key: WeekKey =
        week_key_str.parse().map_err(|e| decode_err("week_key", e))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| decode_err("created_at", e))?;

    let scope = match check_id {
        Some(check_id) => ReviewScope::SingleCheck { check_id: CheckId(check_id) },
        None => ReviewScope::CompanyWeekCreator,
    };

    Ok(ReviewRequest {
        id: ReviewRequestId(id),
        scope,
        company_id: CompanyId(company_id),
        week_key,
        created_by: UserId(created_by),
        status: parse_status(&status_str),
        created_at,
    })
}

#[async_trait::async_trait]
impl ReviewRequestRepository for SqlReviewRequestRepository {
    async fn find_by_id(
        &self,
        id: &ReviewRequestId,
    ) -> Result<Option<ReviewRequest>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {REQUEST_COLUMNS} FROM review_requests WHERE id = ?"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_request(r)?)),
            None => Ok(None),
        }
    }

    async fn list_by_correlation(
        &self,
        company_id: &CompanyId,
        week_key: WeekKey,
        created_by: &UserId,
    ) -> Result<Vec<ReviewRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM review_requests
             WHERE company_id = ? AND week_key = ? AND created_by = ?
             ORDER BY created_at ASC"
        ))
        .bind(&company_id.0)
        .bind(week_key.to_string())
        .bind(&created_by.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_request).collect()
    }

    async fn list_open_by_correlation(
        &self,
        company_id: &CompanyId,
        week_key: WeekKey,
        created_by: &UserId,
    ) -> Result<Vec<ReviewRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM review_requests
             WHERE company_id = ? AND week_key = ? AND created_by = ? AND status = 'pending'
             ORDER BY created_at ASC"
        ))
        .bind(&company_id.0)
        .bind(week_key.to_string())
        .bind(&created_by.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_request).collect()
    }

    async fn list_open_for_week(
        &self,
        company_id: &CompanyId,
        week_key: WeekKey,
    ) -> Result<Vec<ReviewRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM review_requests
             WHERE company_id = ? AND week_key = ? AND status = 'pending'
             ORDER BY created_at ASC"
        ))
        .bind(&company_id.0)
        .bind(week_key.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_request).collect()
    }

    async fn save(&self, request: ReviewRequest) -> Result<(), RepositoryError> {
        let status_str = review_status_as_str(request.status);
        let check_id = request.check_id().map(|id| id.0.clone());

        sqlx::query(
            "INSERT INTO review_requests (id, check_id, company_id, week_key, created_by,
                                          status, reviewed, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 check_id = excluded.check_id,
                 company_id = excluded.company_id,
                 week_key = excluded.week_key,
                 created_by = excluded.created_by,
                 status = excluded.status,
                 reviewed = excluded.reviewed",
        )
        .bind(&request.id.0)
        .bind(check_id)
        .bind(&request.company_id.0)
        .bind(request.week_key.to_string())
        .bind(&request.created_by.0)
        .bind(status_str)
        .bind(i64::from(request.is_reviewed()))
        .bind(request.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
