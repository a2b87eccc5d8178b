//! Deterministic demo dataset.
//!
//! Two companies across two pay weeks, covering all three pay structures
//! and both roles, plus one open review request. The CLI `seed` command
//! loads it into SQLite; engine tests load it into the in-memory store.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use paydeck_core::domain::check::{
    Check, CheckId, PayType, PerdiemBreakdown, RelationshipDetail, RelationshipId,
};
use paydeck_core::domain::company::{Client, ClientId, Company, CompanyId};
use paydeck_core::domain::review::{ReviewRequest, ReviewRequestId, ReviewScope, ReviewStatus};
use paydeck_core::domain::user::{Role, User, UserId};
use paydeck_core::week::WeekKey;

use crate::repositories::{
    CheckRepository, InMemoryStore, RepositoryError, ReviewRequestRepository,
    SqlCheckRepository, SqlReviewRequestRepository, SqlUserRepository,
};
use crate::DbPool;

#[derive(Clone, Debug)]
pub struct DemoDataset {
    pub companies: Vec<Company>,
    pub clients: Vec<Client>,
    pub users: Vec<User>,
    pub checks: Vec<Check>,
    pub review_requests: Vec<ReviewRequest>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedSummary {
    pub companies: usize,
    pub clients: usize,
    pub users: usize,
    pub checks: usize,
    pub review_requests: usize,
}

fn fixture_date(y: i32, m: u32, d: u32) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::from_ymd_opt(y, m, d)
        .ok_or_else(|| RepositoryError::Decode(format!("invalid fixture date {y}-{m}-{d}")))
}

fn fixture_ts(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid fixture timestamp: {error}")))
}

fn base_check(
    id: &str,
    company: &str,
    employee: &str,
    date: NaiveDate,
    number: i64,
    creator_uid: &str,
    amount: Decimal,
) -> Result<Check, RepositoryError> {
    Ok(Check {
        id: CheckId(id.to_string()),
        company_id: CompanyId(company.to_string()),
        client_id: None,
        relationship_details: Vec::new(),
        relationship_hours: HashMap::new(),
        employee_name: employee.to_string(),
        date,
        hours: None,
        ot_hours: None,
        holiday_hours: None,
        pay_rate: None,
        perdiem_amount: None,
        perdiem_breakdown: None,
        amount,
        reviewed: false,
        paid: false,
        check_number: number,
        created_by: UserId(creator_uid.to_string()),
        created_at: fixture_ts("2026-08-03T09:30:00Z")?,
    })
}

pub fn demo_dataset() -> Result<DemoDataset, RepositoryError> {
    let companies = vec![
        Company { id: CompanyId("c-harbor".to_string()), name: "Harbor Staffing".to_string() },
        Company {
            id: CompanyId("c-lakeside".to_string()),
            name: "Lakeside Mechanical".to_string(),
        },
    ];

    let clients = vec![
        Client {
            id: ClientId("cl-acme".to_string()),
            name: "Acme Fabrication".to_string(),
            company_id: Some(CompanyId("c-harbor".to_string())),
        },
        Client {
            id: ClientId("cl-globex".to_string()),
            name: "Globex Logistics".to_string(),
            company_id: Some(CompanyId("c-harbor".to_string())),
        },
        Client {
            id: ClientId("cl-initech".to_string()),
            name: "Initech Services".to_string(),
            company_id: Some(CompanyId("c-lakeside".to_string())),
        },
    ];

    let users = vec![
        User {
            id: UserId("u-admin".to_string()),
            uid: "auth-admin".to_string(),
            username: Some("pat.admin".to_string()),
            email: Some("pat@paydeck.example".to_string()),
            role: Role::Admin,
            can_print_checks: true,
            company_ids: Vec::new(),
        },
        User {
            id: UserId("u-clerk".to_string()),
            uid: "auth-clerk".to_string(),
            username: Some("riley.clerk".to_string()),
            email: Some("riley@paydeck.example".to_string()),
            role: Role::User,
            can_print_checks: false,
            company_ids: vec![CompanyId("c-harbor".to_string())],
        },
        // doc id and auth uid intentionally differ, so name resolution has
        // to go through the uid field first
        User {
            id: UserId("u-lead".to_string()),
            uid: "auth-lead-7f3a92c1".to_string(),
            username: None,
            email: Some("lead@paydeck.example".to_string()),
            role: Role::User,
            can_print_checks: true,
            company_ids: vec![
                CompanyId("c-harbor".to_string()),
                CompanyId("c-lakeside".to_string()),
            ],
        },
    ];

    let mut hourly =
        base_check("chk-1001", "c-harbor", "Dana Reeve", fixture_date(2026, 8, 3)?, 1001, "auth-clerk", Decimal::new(95000, 2))?;
    hourly.hours = Some(Decimal::new(40, 0));
    hourly.ot_hours = Some(Decimal::new(5, 0));
    hourly.pay_rate = Some(Decimal::new(20, 0));

    let mut perdiem =
        base_check("chk-1002", "c-harbor", "Sam Okafor", fixture_date(2026, 8, 4)?, 1002, "auth-clerk", Decimal::new(12550, 2))?;
    perdiem.perdiem_amount = Some(Decimal::new(12550, 2));

    let mut relationships =
        base_check("chk-1003", "c-harbor", "Lee Tran", fixture_date(2026, 8, 5)?, 1003, "auth-lead-7f3a92c1", Decimal::new(35000, 2))?;
    relationships.relationship_details = vec![
        RelationshipDetail {
            id: RelationshipId("r-acme".to_string()),
            client_id: ClientId("cl-acme".to_string()),
            client_name: "Acme Fabrication".to_string(),
            pay_type: PayType::Hourly,
            pay_rate: Some(Decimal::new(25, 0)),
        },
        RelationshipDetail {
            id: RelationshipId("r-globex".to_string()),
            client_id: ClientId("cl-globex".to_string()),
            client_name: "Globex Logistics".to_string(),
            pay_type: PayType::Perdiem,
            pay_rate: None,
        },
    ];
    relationships
        .relationship_hours
        .insert(RelationshipId("r-acme".to_string()), Decimal::new(10, 0));
    relationships.perdiem_amount = Some(Decimal::new(100, 0));

    let mut settled =
        base_check("chk-0999", "c-lakeside", "Ira Vance", fixture_date(2026, 7, 28)?, 999, "auth-lead-7f3a92c1", Decimal::new(64000, 2))?;
    settled.hours = Some(Decimal::new(32, 0));
    settled.pay_rate = Some(Decimal::new(20, 0));
    settled.reviewed = true;
    settled.paid = true;

    let mut breakdown =
        base_check("chk-0998", "c-harbor", "Sam Okafor", fixture_date(2026, 7, 29)?, 998, "auth-clerk", Decimal::new(22500, 2))?;
    breakdown.perdiem_breakdown = Some(PerdiemBreakdown {
        monday: Some(Decimal::new(7500, 2)),
        wednesday: Some(Decimal::new(7500, 2)),
        friday: Some(Decimal::new(7500, 2)),
        ..PerdiemBreakdown::default()
    });

    let review_requests = vec![ReviewRequest {
        id: ReviewRequestId("rr-demo-1".to_string()),
        scope: ReviewScope::CompanyWeekCreator,
        company_id: CompanyId("c-harbor".to_string()),
        week_key: WeekKey::for_date(fixture_date(2026, 8, 3)?),
        created_by: UserId("auth-clerk".to_string()),
        status: ReviewStatus::Pending,
        created_at: fixture_ts("2026-08-05T16:00:00Z")?,
    }];

    Ok(DemoDataset {
        companies,
        clients,
        users,
        checks: vec![hourly, perdiem, relationships, settled, breakdown],
        review_requests,
    })
}

impl DemoDataset {
    pub fn summary(&self) -> SeedSummary {
        SeedSummary {
            companies: self.companies.len(),
            clients: self.clients.len(),
            users: self.users.len(),
            checks: self.checks.len(),
            review_requests: self.review_requests.len(),
        }
    }
}

pub async fn seed_pool(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
    let dataset = demo_dataset()?;
    let summary = dataset.summary();

    for company in &dataset.companies {
        sqlx::query(
            "INSERT INTO companies (id, name) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(&company.id.0)
        .bind(&company.name)
        .execute(pool)
        .await?;
    }

    for client in &dataset.clients {
        sqlx::query(
            "INSERT INTO clients (id, name, company_id) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 company_id = excluded.company_id",
        )
        .bind(&client.id.0)
        .bind(&client.name)
        .bind(client.company_id.as_ref().map(|id| id.0.clone()))
        .execute(pool)
        .await?;
    }

    let users = SqlUserRepository::new(pool.clone());
    for user in dataset.users {
        users.save(user).await?;
    }

    let checks = SqlCheckRepository::new(pool.clone());
    for check in dataset.checks {
        checks.save(check).await?;
    }

    let requests = SqlReviewRequestRepository::new(pool.clone());
    for request in dataset.review_requests {
        requests.save(request).await?;
    }

    Ok(summary)
}

/// Loads the same dataset into an [`InMemoryStore`] for engine tests.
pub async fn seed_memory(store: &InMemoryStore) -> Result<SeedSummary, RepositoryError> {
    let dataset = demo_dataset()?;
    let summary = dataset.summary();

    for company in dataset.companies {
        store.put_company(company).await;
    }
    for client in dataset.clients {
        store.put_client(client).await;
    }
    for user in dataset.users {
        store.put_user(user).await;
    }
    for check in dataset.checks {
        CheckRepository::save(store, check).await?;
    }
    for request in dataset.review_requests {
        ReviewRequestRepository::save(store, request).await?;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::{demo_dataset, seed_pool};
    use crate::repositories::{CheckFilter, CheckRepository, SqlCheckRepository};
    use crate::{connect_with_settings, migrations};

    #[test]
    fn dataset_is_deterministic() {
        let first = demo_dataset().expect("dataset");
        let second = demo_dataset().expect("dataset");
        assert_eq!(first.checks, second.checks);
        assert_eq!(first.summary(), second.summary());
    }

    #[tokio::test]
    async fn seeding_a_pool_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let first = seed_pool(&pool).await.expect("seed once");
        let second = seed_pool(&pool).await.expect("seed twice");
        assert_eq!(first, second);

        let checks = SqlCheckRepository::new(pool);
        let all = checks.list(&CheckFilter::default()).await.expect("list");
        assert_eq!(all.len(), first.checks);
    }
}
