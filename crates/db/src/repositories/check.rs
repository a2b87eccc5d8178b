use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use paydeck_core::domain::check::{
    Check, CheckId, PerdiemBreakdown, RelationshipDetail, RelationshipId,
};
use paydeck_core::domain::company::{ClientId, CompanyId};
use paydeck_core::domain::user::UserId;

use super::{CheckFilter, CheckRepository, RepositoryError, MEMBERSHIP_QUERY_LIMIT};
use crate::DbPool;

const CHECK_COLUMNS: &str = "id, company_id, client_id, relationship_details, relationship_hours, \
     employee_name, date, hours, ot_hours, holiday_hours, pay_rate, perdiem_amount, \
     perdiem_breakdown, amount, reviewed, paid, check_number, created_by, created_at";

pub struct SqlCheckRepository {
    pool: DbPool,
}

impl SqlCheckRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_err(field: &str, error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(format!("checks.{field}: {error}"))
}

fn opt_decimal(field: &str, value: Option<String>) -> Result<Option<Decimal>, RepositoryError> {
    value
        .map(|raw| Decimal::from_str(&raw).map_err(|error| decode_err(field, error)))
        .transpose()
}

pub(crate) fn row_to_check(row: &sqlx::sqlite::SqliteRow) -> Result<Check, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| decode_err("id", e))?;
    let company_id: String = row.try_get("company_id").map_err(|e| decode_err("company_id", e))?;
    let client_id: Option<String> =
        row.try_get("client_id").map_err(|e| decode_err("client_id", e))?;
    let relationship_details_json: String = row
        .try_get("relationship_details")
        .map_err(|e| decode_err("relationship_details", e))?;
    let relationship_hours_json: String =
        row.try_get("relationship_hours").map_err(|e| decode_err("relationship_hours", e))?;
    let employee_name: String =
        row.try_get("employee_name").map_err(|e| decode_err("employee_name", e))?;
    let date_str: String = row.try_get("date").map_err(|e| decode_err("date", e))?;
    let hours: Option<String> = row.try_get("hours").map_err(|e| decode_err("hours", e))?;
    let ot_hours: Option<String> =
        row.try_get("ot_hours").map_err(|e| decode_err("ot_hours", e))?;
    let holiday_hours: Option<String> =
        row.try_get("holiday_hours").map_err(|e| decode_err("holiday_hours", e))?;
    let pay_rate: Option<String> =
        row.try_get("pay_rate").map_err(|e| decode_err("pay_rate", e))?;
    let perdiem_amount: Option<String> =
        row.try_get("perdiem_amount").map_err(|e| decode_err("perdiem_amount", e))?;
    let perdiem_breakdown_json: Option<String> =
        row.try_get("perdiem_breakdown").map_err(|e| decode_err("perdiem_breakdown", e))?;
    let amount_str: String = row.try_get("amount").map_err(|e| decode_err("amount", e))?;
    let reviewed: i64 = row.try_get("reviewed").map_err(|e| decode_err("reviewed", e))?;
    let paid: i64 = row.try_get("paid").map_err(|e| decode_err("paid", e))?;
    let check_number: i64 =
        row.try_get("check_number").map_err(|e| decode_err("check_number", e))?;
    let created_by: String =
        row.try_get("created_by").map_err(|e| decode_err("created_by", e))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| decode_err("created_at", e))?;

    let relationship_details: Vec<RelationshipDetail> =
        serde_json::from_str(&relationship_details_json)
            .map_err(|e| decode_err("relationship_details", e))?;
    let relationship_hours: HashMap<RelationshipId, Decimal> =
        serde_json::from_str(&relationship_hours_json)
            .map_err(|e| decode_err("relationship_hours", e))?;
    let perdiem_breakdown: Option<PerdiemBreakdown> = perdiem_breakdown_json
        .map(|raw| serde_json::from_str(&raw).map_err(|e| decode_err("perdiem_breakdown", e)))
        .transpose()?;

    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
        .map_err(|e| decode_err("date", e))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| decode_err("created_at", e))?;

    Ok(Check {
        id: CheckId(id),
        company_id: CompanyId(company_id),
        client_id: client_id.map(ClientId),
        relationship_details,
        relationship_hours,
        employee_name,
        date,
        hours: opt_decimal("hours", hours)?,
        ot_hours: opt_decimal("ot_hours", ot_hours)?,
        holiday_hours: opt_decimal("holiday_hours", holiday_hours)?,
        pay_rate: opt_decimal("pay_rate", pay_rate)?,
        perdiem_amount: opt_decimal("perdiem_amount", perdiem_amount)?,
        perdiem_breakdown,
        amount: Decimal::from_str(&amount_str).map_err(|e| decode_err("amount", e))?,
        reviewed: reviewed != 0,
        paid: paid != 0,
        check_number,
        created_by: UserId(created_by),
        created_at,
    })
}

fn filter_clauses(filter: &CheckFilter) -> (Vec<&'static str>, Vec<String>) {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();

    if let Some(company_id) = &filter.company_id {
        clauses.push("company_id = ?");
        binds.push(company_id.0.clone());
    }
    if let Some(week) = filter.week {
        let (start, end) = week.date_range();
        clauses.push("date >= ?");
        binds.push(start.format("%Y-%m-%d").to_string());
        clauses.push("date < ?");
        binds.push(end.format("%Y-%m-%d").to_string());
    }
    if let Some(created_by) = &filter.created_by {
        clauses.push("created_by = ?");
        binds.push(created_by.0.clone());
    }
    if let Some(reviewed) = filter.reviewed {
        clauses.push("reviewed = ?");
        binds.push(if reviewed { "1".to_string() } else { "0".to_string() });
    }

    (clauses, binds)
}

async fn fetch_checks(
    pool: &DbPool,
    clauses: Vec<&str>,
    binds: Vec<String>,
) -> Result<Vec<Check>, RepositoryError> {
    let mut sql = format!("SELECT {CHECK_COLUMNS} FROM checks");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY date DESC, check_number DESC");

    let mut query = sqlx::query(&sql);
    for bind in &binds {
        query = query.bind(bind);
    }

    let rows: Vec<sqlx::sqlite::SqliteRow> = query.fetch_all(pool).await?;
    rows.iter().map(row_to_check).collect()
}

#[async_trait::async_trait]
impl CheckRepository for SqlCheckRepository {
    async fn find_by_id(&self, id: &CheckId) -> Result<Option<Check>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CHECK_COLUMNS} FROM checks WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_check(r)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &CheckFilter) -> Result<Vec<Check>, RepositoryError> {
        let (clauses, binds) = filter_clauses(filter);
        fetch_checks(&self.pool, clauses, binds).await
    }

    async fn list_by_companies_chunk(
        &self,
        company_ids: &[CompanyId],
        filter: &CheckFilter,
    ) -> Result<Vec<Check>, RepositoryError> {
        if company_ids.is_empty() {
            return Ok(Vec::new());
        }
        if company_ids.len() > MEMBERSHIP_QUERY_LIMIT {
            return Err(RepositoryError::membership_limit(company_ids.len()));
        }

        let placeholders = vec!["?"; company_ids.len()].join(", ");
        let mut sql = format!(
            "SELECT {CHECK_COLUMNS} FROM checks WHERE company_id IN ({placeholders})"
        );

        let (clauses, binds) = filter_clauses(filter);
        for clause in &clauses {
            sql.push_str(" AND ");
            sql.push_str(clause);
        }
        sql.push_str(" ORDER BY date DESC, check_number DESC");

        let mut query = sqlx::query(&sql);
        for company_id in company_ids {
            query = query.bind(&company_id.0);
        }
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows: Vec<sqlx::sqlite::SqliteRow> = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_check).collect()
    }

    async fn save(&self, check: Check) -> Result<(), RepositoryError> {
        let relationship_details = serde_json::to_string(&check.relationship_details)
            .map_err(|e| decode_err("relationship_details", e))?;
        let relationship_hours = serde_json::to_string(&check.relationship_hours)
            .map_err(|e| decode_err("relationship_hours", e))?;
        let perdiem_breakdown = check
            .perdiem_breakdown
            .as_ref()
            .map(|b| serde_json::to_string(b).map_err(|e| decode_err("perdiem_breakdown", e)))
            .transpose()?;

        sqlx::query(
            "INSERT INTO checks (id, company_id, client_id, relationship_details,
                                 relationship_hours, employee_name, date, hours, ot_hours,
                                 holiday_hours, pay_rate, perdiem_amount, perdiem_breakdown,
                                 amount, reviewed, paid, check_number, created_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 company_id = excluded.company_id,
                 client_id = excluded.client_id,
                 relationship_details = excluded.relationship_details,
                 relationship_hours = excluded.relationship_hours,
                 employee_name = excluded.employee_name,
                 date = excluded.date,
                 hours = excluded.hours,
                 ot_hours = excluded.ot_hours,
                 holiday_hours = excluded.holiday_hours,
                 pay_rate = excluded.pay_rate,
                 perdiem_amount = excluded.perdiem_amount,
                 perdiem_breakdown = excluded.perdiem_breakdown,
                 amount = excluded.amount,
                 reviewed = excluded.reviewed,
                 paid = excluded.paid,
                 check_number = excluded.check_number,
                 created_by = excluded.created_by,
                 created_at = excluded.created_at",
        )
        .bind(&check.id.0)
        .bind(&check.company_id.0)
        .bind(check.client_id.as_ref().map(|c| c.0.clone()))
        .bind(relationship_details)
        .bind(relationship_hours)
        .bind(&check.employee_name)
        .bind(check.date.format("%Y-%m-%d").to_string())
        .bind(check.hours.map(|d| d.to_string()))
        .bind(check.ot_hours.map(|d| d.to_string()))
        .bind(check.holiday_hours.map(|d| d.to_string()))
        .bind(check.pay_rate.map(|d| d.to_string()))
        .bind(check.perdiem_amount.map(|d| d.to_string()))
        .bind(perdiem_breakdown)
        .bind(check.amount.to_string())
        .bind(i64::from(check.reviewed))
        .bind(i64::from(check.paid))
        .bind(check.check_number)
        .bind(&check.created_by.0)
        .bind(check.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
