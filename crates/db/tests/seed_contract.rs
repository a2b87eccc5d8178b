//! Contract checks for the seeded demo dataset: what the fixtures declare
//! is exactly what a freshly seeded database serves back through the
//! repositories.

use rust_decimal::Decimal;

use paydeck_core::domain::check::CheckId;
use paydeck_core::domain::company::CompanyId;
use paydeck_core::domain::user::{Role, UserId};
use paydeck_core::week::WeekKey;
use paydeck_db::repositories::{
    CheckFilter, CheckRepository, CompanyRepository, ReviewRequestRepository,
    SqlCheckRepository, SqlCompanyRepository, SqlReviewRequestRepository, SqlUserRepository,
    UserRepository,
};
use paydeck_db::{connect_with_settings, fixtures, migrations};

async fn seeded_pool() -> sqlx::SqlitePool {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    fixtures::seed_pool(&pool).await.expect("seed");
    pool
}

#[tokio::test]
async fn seeded_counts_match_the_declared_dataset() {
    let pool = seeded_pool().await;
    let dataset = fixtures::demo_dataset().expect("dataset");

    let checks = SqlCheckRepository::new(pool.clone());
    let all = checks.list(&CheckFilter::default()).await.expect("list checks");
    assert_eq!(all.len(), dataset.checks.len());

    let users = SqlUserRepository::new(pool.clone());
    assert_eq!(users.list_all().await.expect("users").len(), dataset.users.len());

    let companies = SqlCompanyRepository::new(pool);
    assert_eq!(companies.list_all().await.expect("companies").len(), dataset.companies.len());
}

#[tokio::test]
async fn seeded_checks_round_trip_their_pay_fields() {
    let pool = seeded_pool().await;
    let checks = SqlCheckRepository::new(pool);

    let hourly = checks
        .find_by_id(&CheckId("chk-1001".to_string()))
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(hourly.amount, Decimal::new(95000, 2));
    assert_eq!(hourly.hours, Some(Decimal::new(40, 0)));
    assert_eq!(hourly.ot_hours, Some(Decimal::new(5, 0)));
    assert!(!hourly.reviewed);

    let relationships = checks
        .find_by_id(&CheckId("chk-1003".to_string()))
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(relationships.relationship_details.len(), 2);
    assert_eq!(relationships.relationship_hours.len(), 1);

    let settled = checks
        .find_by_id(&CheckId("chk-0999".to_string()))
        .await
        .expect("find")
        .expect("exists");
    assert!(settled.reviewed);
    assert!(settled.paid);
}

#[tokio::test]
async fn seeded_review_request_correlates_with_the_clerk_week() {
    let pool = seeded_pool().await;
    let requests = SqlReviewRequestRepository::new(pool.clone());
    let checks = SqlCheckRepository::new(pool.clone());

    let clerk_check = checks
        .find_by_id(&CheckId("chk-1001".to_string()))
        .await
        .expect("find")
        .expect("exists");
    let week = clerk_check.week_key();
    assert_eq!(week, WeekKey::for_date(clerk_check.date));

    let open = requests
        .list_open_by_correlation(
            &CompanyId("c-harbor".to_string()),
            week,
            &UserId("auth-clerk".to_string()),
        )
        .await
        .expect("correlation");
    assert_eq!(open.len(), 1);

    let users = SqlUserRepository::new(pool);
    let admin = users
        .find_by_id(&UserId("u-admin".to_string()))
        .await
        .expect("find admin")
        .expect("exists");
    assert_eq!(admin.role, Role::Admin);
    assert!(admin.can_print_checks);
}
