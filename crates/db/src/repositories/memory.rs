use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::RwLock;

use paydeck_core::domain::check::{Check, CheckId};
use paydeck_core::domain::company::{Client, ClientId, Company, CompanyId};
use paydeck_core::domain::review::{ReviewRequest, ReviewRequestId};
use paydeck_core::domain::user::{User, UserId};
use paydeck_core::week::WeekKey;

use super::{
    BatchWriter, CheckFilter, CheckRepository, ClientRepository, CompanyRepository,
    RepositoryError, ReviewRequestRepository, UserRepository, WriteOp, MEMBERSHIP_QUERY_LIMIT,
};

/// Every repository trait over in-process maps. One struct rather than one
/// per collection because atomic batches span collections.
#[derive(Default)]
pub struct InMemoryStore {
    checks: RwLock<HashMap<String, Check>>,
    requests: RwLock<HashMap<String, ReviewRequest>>,
    users: RwLock<HashMap<String, User>>,
    companies: RwLock<HashMap<String, Company>>,
    clients: RwLock<HashMap<String, Client>>,
    fail_next_batch: AtomicBool,
    membership_queries: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `apply` call fails before touching anything.
    pub fn fail_next_batch(&self) {
        self.fail_next_batch.store(true, Ordering::SeqCst);
    }

    /// How many membership-constrained chunk queries have been issued.
    pub fn membership_queries(&self) -> usize {
        self.membership_queries.load(Ordering::SeqCst)
    }

    pub async fn put_user(&self, user: User) {
        self.users.write().await.insert(user.id.0.clone(), user);
    }

    pub async fn put_company(&self, company: Company) {
        self.companies.write().await.insert(company.id.0.clone(), company);
    }

    pub async fn put_client(&self, client: Client) {
        self.clients.write().await.insert(client.id.0.clone(), client);
    }
}

fn sort_checks(checks: &mut [Check]) {
    checks.sort_by(|left, right| {
        right.date.cmp(&left.date).then_with(|| right.check_number.cmp(&left.check_number))
    });
}

#[async_trait::async_trait]
impl CheckRepository for InMemoryStore {
    async fn find_by_id(&self, id: &CheckId) -> Result<Option<Check>, RepositoryError> {
        Ok(self.checks.read().await.get(&id.0).cloned())
    }

    async fn list(&self, filter: &CheckFilter) -> Result<Vec<Check>, RepositoryError> {
        let checks = self.checks.read().await;
        let mut matched: Vec<Check> =
            checks.values().filter(|check| filter.matches(check)).cloned().collect();
        sort_checks(&mut matched);
        Ok(matched)
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
        self.membership_queries.fetch_add(1, Ordering::SeqCst);

        let checks = self.checks.read().await;
        let mut matched: Vec<Check> = checks
            .values()
            .filter(|check| company_ids.contains(&check.company_id))
            .filter(|check| filter.matches(check))
            .cloned()
            .collect();
        sort_checks(&mut matched);
        Ok(matched)
    }

    async fn save(&self, check: Check) -> Result<(), RepositoryError> {
        self.checks.write().await.insert(check.id.0.clone(), check);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReviewRequestRepository for InMemoryStore {
    async fn find_by_id(
        &self,
        id: &ReviewRequestId,
    ) -> Result<Option<ReviewRequest>, RepositoryError> {
        Ok(self.requests.read().await.get(&id.0).cloned())
    }

    async fn list_by_correlation(
        &self,
        company_id: &CompanyId,
        week_key: WeekKey,
        created_by: &UserId,
    ) -> Result<Vec<ReviewRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut matched: Vec<ReviewRequest> = requests
            .values()
            .filter(|request| request.matches_correlation(company_id, week_key, created_by))
            .cloned()
            .collect();
        matched.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(matched)
    }

    async fn list_open_by_correlation(
        &self,
        company_id: &CompanyId,
        week_key: WeekKey,
        created_by: &UserId,
    ) -> Result<Vec<ReviewRequest>, RepositoryError> {
        let all = self.list_by_correlation(company_id, week_key, created_by).await?;
        Ok(all.into_iter().filter(ReviewRequest::is_open).collect())
    }

    async fn list_open_for_week(
        &self,
        company_id: &CompanyId,
        week_key: WeekKey,
    ) -> Result<Vec<ReviewRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut matched: Vec<ReviewRequest> = requests
            .values()
            .filter(|request| {
                request.company_id == *company_id
                    && request.week_key == week_key
                    && request.is_open()
            })
            .cloned()
            .collect();
        matched.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(matched)
    }

    async fn save(&self, request: ReviewRequest) -> Result<(), RepositoryError> {
        self.requests.write().await.insert(request.id.0.clone(), request);
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(&id.0).cloned())
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let users = self.users.read().await;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        Ok(all)
    }

    async fn find_by_uids_chunk(&self, uids: &[String]) -> Result<Vec<User>, RepositoryError> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        if uids.len() > MEMBERSHIP_QUERY_LIMIT {
            return Err(RepositoryError::membership_limit(uids.len()));
        }
        self.membership_queries.fetch_add(1, Ordering::SeqCst);

        let users = self.users.read().await;
        Ok(users.values().filter(|user| uids.contains(&user.uid)).cloned().collect())
    }
}

#[async_trait::async_trait]
impl CompanyRepository for InMemoryStore {
    async fn find_by_id(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError> {
        Ok(self.companies.read().await.get(&id.0).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Company>, RepositoryError> {
        let companies = self.companies.read().await;
        let mut all: Vec<Company> = companies.values().cloned().collect();
        all.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(all)
    }
}

#[async_trait::async_trait]
impl ClientRepository for InMemoryStore {
    async fn find_by_id(&self, id: &ClientId) -> Result<Option<Client>, RepositoryError> {
        Ok(self.clients.read().await.get(&id.0).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Client>, RepositoryError> {
        let clients = self.clients.read().await;
        let mut all: Vec<Client> = clients.values().cloned().collect();
        all.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(all)
    }
}

#[async_trait::async_trait]
impl BatchWriter for InMemoryStore {
    async fn apply(&self, ops: Vec<WriteOp>) -> Result<(), RepositoryError> {
        if self.fail_next_batch.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::BatchRejected("injected batch failure".to_string()));
        }
        if ops.is_empty() {
            return Ok(());
        }

        let mut checks = self.checks.write().await;
        let mut requests = self.requests.write().await;

        // validate everything up front so a late failure cannot leave a
        // half-applied batch
        for op in &ops {
            match op {
                WriteOp::SetCheckReviewed { id, .. } | WriteOp::SetCheckPaid { id, .. } => {
                    if !checks.contains_key(&id.0) {
                        return Err(RepositoryError::BatchRejected(format!(
                            "check {} does not exist",
                            id.0
                        )));
                    }
                }
                WriteOp::CreateReviewRequest { request } => {
                    if requests.contains_key(&request.id.0) {
                        return Err(RepositoryError::BatchRejected(format!(
                            "review request {} already exists",
                            request.id.0
                        )));
                    }
                }
                WriteOp::SetReviewRequestStatus { id, .. } => {
                    if !requests.contains_key(&id.0) {
                        return Err(RepositoryError::BatchRejected(format!(
                            "review request {} does not exist",
                            id.0
                        )));
                    }
                }
            }
        }

        for op in ops {
            match op {
                WriteOp::SetCheckReviewed { id, reviewed } => {
                    if let Some(check) = checks.get_mut(&id.0) {
                        check.reviewed = reviewed;
                    }
                }
                WriteOp::SetCheckPaid { id, paid } => {
                    if let Some(check) = checks.get_mut(&id.0) {
                        check.paid = paid;
                    }
                }
                WriteOp::CreateReviewRequest { request } => {
                    requests.insert(request.id.0.clone(), request);
                }
                WriteOp::SetReviewRequestStatus { id, status } => {
                    if let Some(request) = requests.get_mut(&id.0) {
                        request.status = status;
                    }
                }
            }
        }

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

    use super::InMemoryStore;
    use crate::repositories::{
        BatchWriter, CheckFilter, CheckRepository, RepositoryError, ReviewRequestRepository,
        WriteOp,
    };

    fn check(id: &str, company: &str, day: u32, number: i64) -> Check {
        Check {
            id: CheckId(id.to_string()),
            company_id: CompanyId(company.to_string()),
            client_id: None,
            relationship_details: Vec::new(),
            relationship_hours: HashMap::new(),
            employee_name: "Dana Reeve".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 8, day).expect("date"),
            hours: Some(Decimal::new(40, 0)),
            ot_hours: None,
            holiday_hours: None,
            pay_rate: Some(Decimal::new(20, 0)),
            perdiem_amount: None,
            perdiem_breakdown: None,
            amount: Decimal::new(80000, 2),
            reviewed: false,
            paid: false,
            check_number: number,
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
    async fn list_orders_by_date_then_check_number() {
        let store = InMemoryStore::new();
        CheckRepository::save(&store, check("chk-1", "c-1", 3, 7)).await.expect("save");
        CheckRepository::save(&store, check("chk-2", "c-1", 3, 9)).await.expect("save");
        CheckRepository::save(&store, check("chk-3", "c-1", 5, 1)).await.expect("save");

        let listed = store.list(&CheckFilter::default()).await.expect("list");
        let ids: Vec<&str> = listed.iter().map(|c| c.id.0.as_str()).collect();
        assert_eq!(ids, vec!["chk-3", "chk-2", "chk-1"]);
    }

    #[tokio::test]
    async fn injected_batch_failure_applies_nothing() {
        let store = InMemoryStore::new();
        CheckRepository::save(&store, check("chk-1", "c-1", 3, 1)).await.expect("save");

        store.fail_next_batch();
        let error = store
            .apply(vec![
                WriteOp::SetCheckReviewed { id: CheckId("chk-1".to_string()), reviewed: true },
                WriteOp::CreateReviewRequest { request: request("rr-1") },
            ])
            .await
            .expect_err("injected failure");
        assert!(matches!(error, RepositoryError::BatchRejected(_)));

        let untouched = CheckRepository::find_by_id(&store, &CheckId("chk-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert!(!untouched.reviewed);
        assert!(ReviewRequestRepository::find_by_id(
            &store,
            &ReviewRequestId("rr-1".to_string())
        )
        .await
        .expect("find request")
        .is_none());

        // the injection is one-shot
        store
            .apply(vec![WriteOp::SetCheckReviewed {
                id: CheckId("chk-1".to_string()),
                reviewed: true,
            }])
            .await
            .expect("second batch succeeds");
    }

    #[tokio::test]
    async fn invalid_op_rejects_the_whole_batch() {
        let store = InMemoryStore::new();
        CheckRepository::save(&store, check("chk-1", "c-1", 3, 1)).await.expect("save");

        let error = store
            .apply(vec![
                WriteOp::CreateReviewRequest { request: request("rr-1") },
                WriteOp::SetCheckPaid { id: CheckId("chk-missing".to_string()), paid: true },
            ])
            .await
            .expect_err("missing check");
        assert!(error.to_string().contains("chk-missing"));

        assert!(ReviewRequestRepository::find_by_id(
            &store,
            &ReviewRequestId("rr-1".to_string())
        )
        .await
        .expect("find request")
        .is_none());
    }
}
