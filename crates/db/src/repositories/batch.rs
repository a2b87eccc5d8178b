use paydeck_core::domain::review::{ReviewRequest, ReviewStatus};

use super::review_request::review_status_as_str;
use super::{BatchWriter, RepositoryError, WriteOp};
use crate::DbPool;

/// Applies grouped writes inside one transaction. Any failure drops the
/// transaction, so the store is left exactly as it was before the batch.
pub struct SqlBatchWriter {
    pool: DbPool,
}

impl SqlBatchWriter {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

async fn insert_request(
    conn: &mut sqlx::SqliteConnection,
    request: &ReviewRequest,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO review_requests (id, check_id, company_id, week_key, created_by,
                                      status, reviewed, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&request.id.0)
    .bind(request.check_id().map(|id| id.0.clone()))
    .bind(&request.company_id.0)
    .bind(request.week_key.to_string())
    .bind(&request.created_by.0)
    .bind(review_status_as_str(request.status))
    .bind(i64::from(request.is_reviewed()))
    .bind(request.created_at.to_rfc3339())
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait::async_trait]
impl BatchWriter for SqlBatchWriter {
    async fn apply(&self, ops: Vec<WriteOp>) -> Result<(), RepositoryError> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for op in &ops {
            match op {
                WriteOp::SetCheckReviewed { id, reviewed } => {
                    let result = sqlx::query("UPDATE checks SET reviewed = ? WHERE id = ?")
                        .bind(i64::from(*reviewed))
                        .bind(&id.0)
                        .execute(&mut *tx)
                        .await?;
                    if result.rows_affected() == 0 {
                        return Err(RepositoryError::BatchRejected(format!(
                            "check {} does not exist",
                            id.0
                        )));
                    }
                }
                WriteOp::SetCheckPaid { id, paid } => {
                    let result = sqlx::query("UPDATE checks SET paid = ? WHERE id = ?")
                        .bind(i64::from(*paid))
                        .bind(&id.0)
                        .execute(&mut *tx)
                        .await?;
                    if result.rows_affected() == 0 {
                        return Err(RepositoryError::BatchRejected(format!(
                            "check {} does not exist",
                            id.0
                        )));
                    }
                }
                WriteOp::CreateReviewRequest { request } => {
                    insert_request(&mut *tx, request).await?;
                }

                WriteOp::SetReviewRequestStatus { id, status } => {
                    let result = sqlx::query(
                        "UPDATE review_requests SET status = ?, reviewed = ? WHERE id = ?",
                    )
                    .bind(review_status_as_str(*status))
                    .bind(i64::from(*status == ReviewStatus::Reviewed))
                    .bind(&id.0)
                    .execute(&mut *tx)
                    .await?;
                    if result.rows_affected() == 0 {
                        return Err(RepositoryError::BatchRejected(format!(
                            "review request {} does not exist",
                            id.0
                        )));
                    }
                }
            }
        }
        tx.commit().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use paydeck_core::domain::check::{Check, CheckId};
    use paydeck_core::domain::company::CompanyId;
    use paydeck_core::domain::review::{
        ReviewRequest, ReviewRequestId, ReviewScope, ReviewStatus,
    };
    use paydeck_core::domain::user::UserId;
    use paydeck_core::week::WeekKey;

    use super::SqlBatchWriter;
    use crate::repositories::{
        BatchWriter, CheckRepository, ReviewRequestRepository, SqlCheckRepository,
        SqlReviewRequestRepository, WriteOp,
    };
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn check(id: &str) -> Check {
        Check {
            id: CheckId(id.to_string()),
            company_id: CompanyId("c-1".to_string()),
            client_id: None,
            relationship_details: Vec::new(),
            relationship_hours: HashMap::new(),
            employee_name: "Dana Reeve".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 8, 4).expect("date"),
            hours: Some(Decimal::new(40, 0)),
            ot_hours: None,
            holiday_hours: None,
            pay_rate: Some(Decimal::new(20, 0)),
            perdiem_amount: None,
            perdiem_breakdown: None,
            amount: Decimal::new(80000, 2),
            reviewed: false,
            paid: false,
            check_number: 1,
            created_by: UserId("auth-u-1".to_string()),
            created_at: Utc::now(),
        }
    }

    fn request(id: &str) -> ReviewRequest {
        ReviewRequest {
            id: ReviewRequestId(id.to_string()),
            scope: ReviewScope::CompanyWeekCreator,
            company_id: CompanyId("c-1".to_string()),
            week_key: WeekKey::for_date(NaiveDate::from_ymd_opt(2026, 8, 4).expect("date")),
            created_by: UserId("auth-u-1".to_string()),
            status: ReviewStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn batch_applies_every_op_or_none() {
        let pool = setup().await;
        let checks = SqlCheckRepository::new(pool.clone());
        let requests = SqlReviewRequestRepository::new(pool.clone());
        let writer = SqlBatchWriter::new(pool);

        checks.save(check("chk-1")).await.expect("seed check");

        writer
            .apply(vec![
                WriteOp::SetCheckReviewed { id: CheckId("chk-1".to_string()), reviewed: true },
                WriteOp::CreateReviewRequest { request: request("rr-1") },
            ])
            .await
            .expect("batch");

        let reviewed = checks
            .find_by_id(&CheckId("chk-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert!(reviewed.reviewed);
        assert!(requests
            .find_by_id(&ReviewRequestId("rr-1".to_string()))
            .await
            .expect("find request")
            .is_some());
    }

    #[tokio::test]
    async fn failing_op_rolls_back_the_whole_batch() {
        let pool = setup().await;
        let checks = SqlCheckRepository::new(pool.clone());
        let requests = SqlReviewRequestRepository::new(pool.clone());
        let writer = SqlBatchWriter::new(pool);

        checks.save(check("chk-1")).await.expect("seed check");

        let error = writer
            .apply(vec![
                WriteOp::CreateReviewRequest { request: request("rr-1") },
                WriteOp::SetCheckReviewed {
                    id: CheckId("chk-missing".to_string()),
                    reviewed: true,
                },
            ])
            .await
            .expect_err("missing check should reject the batch");
        assert!(error.to_string().contains("chk-missing"));

        // nothing from the batch may exist
        assert!(requests
            .find_by_id(&ReviewRequestId("rr-1".to_string()))
            .await
            .expect("find request")
            .is_none());
        let untouched = checks
            .find_by_id(&CheckId("chk-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert!(!untouched.reviewed);
    }
}
