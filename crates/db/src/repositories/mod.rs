use async_trait::async_trait;
use thiserror::Error;

use paydeck_core::domain::check::{Check, CheckId};
use paydeck_core::domain::company::{Client, ClientId, Company, CompanyId};
use paydeck_core::domain::review::{ReviewRequest, ReviewRequestId, ReviewStatus};
use paydeck_core::domain::user::{User, UserId};
use paydeck_core::week::WeekKey;

pub mod batch;
pub mod check;
pub mod memory;
pub mod reference;
pub mod review_request;
pub mod user;

pub use batch::SqlBatchWriter;
pub use check::SqlCheckRepository;
pub use memory::InMemoryStore;
pub use reference::{SqlClientRepository, SqlCompanyRepository};
pub use review_request::SqlReviewRequestRepository;
pub use user::SqlUserRepository;

/// The backing store rejects membership filters longer than this; callers
/// with bigger value sets must chunk (see the engine's chunked fetcher).
pub const MEMBERSHIP_QUERY_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("membership query over {requested} values exceeds the {limit}-value limit")]
    MembershipLimitExceeded { requested: usize, limit: usize },
    #[error("batch rejected: {0}")]
    BatchRejected(String),
}

impl RepositoryError {
    pub fn membership_limit(requested: usize) -> Self {
        Self::MembershipLimitExceeded { requested, limit: MEMBERSHIP_QUERY_LIMIT }
    }
}

/// Equality filters applied server-side. Week filtering goes through the
/// date column as a half-open range; the week key itself is never stored.
#[derive(Clone, Debug, Default)]
pub struct CheckFilter {
    pub company_id: Option<CompanyId>,
    pub week: Option<WeekKey>,
    pub created_by: Option<UserId>,
    pub reviewed: Option<bool>,
}

impl CheckFilter {
    pub fn matches(&self, check: &Check) -> bool {
        if let Some(company_id) = &self.company_id {
            if check.company_id != *company_id {
                return false;
            }
        }
        if let Some(week) = self.week {
            if !week.contains(check.date) {
                return false;
            }
        }
        if let Some(created_by) = &self.created_by {
            if check.created_by != *created_by {
                return false;
            }
        }
        if let Some(reviewed) = self.reviewed {
            if check.reviewed != reviewed {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait CheckRepository: Send + Sync {
    async fn find_by_id(&self, id: &CheckId) -> Result<Option<Check>, RepositoryError>;

    async fn list(&self, filter: &CheckFilter) -> Result<Vec<Check>, RepositoryError>;

    /// One membership-constrained query. At most [`MEMBERSHIP_QUERY_LIMIT`]
    /// companies per call; larger sets are the chunked fetcher's job.
    async fn list_by_companies_chunk(
        &self,
        company_ids: &[CompanyId],
        filter: &CheckFilter,
    ) -> Result<Vec<Check>, RepositoryError>;

    async fn save(&self, check: Check) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ReviewRequestRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &ReviewRequestId,
    ) -> Result<Option<ReviewRequest>, RepositoryError>;

    async fn list_by_correlation(
        &self,
        company_id: &CompanyId,
        week_key: WeekKey,
        created_by: &UserId,
    ) -> Result<Vec<ReviewRequest>, RepositoryError>;

    async fn list_open_by_correlation(
        &self,
        company_id: &CompanyId,
        week_key: WeekKey,
        created_by: &UserId,
    ) -> Result<Vec<ReviewRequest>, RepositoryError>;

    async fn list_open_for_week(
        &self,
        company_id: &CompanyId,
        week_key: WeekKey,
    ) -> Result<Vec<ReviewRequest>, RepositoryError>;

    async fn save(&self, request: ReviewRequest) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError>;

    /// Looks users up by their auth `uid` field. At most
    /// [`MEMBERSHIP_QUERY_LIMIT`] values per call.
    async fn find_by_uids_chunk(&self, uids: &[String]) -> Result<Vec<User>, RepositoryError>;
}

#[async_trait]
pub trait CompanyRepository: Send + Sync {
    async fn find_by_id(&self, id: &CompanyId) -> Result<Option<Company>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Company>, RepositoryError>;
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn find_by_id(&self, id: &ClientId) -> Result<Option<Client>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Client>, RepositoryError>;
}

/// One mutation inside an atomic batch.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    SetCheckReviewed { id: CheckId, reviewed: bool },
    SetCheckPaid { id: CheckId, paid: bool },
    CreateReviewRequest { request: ReviewRequest },
    SetReviewRequestStatus { id: ReviewRequestId, status: ReviewStatus },
}

/// Atomic grouped writes: the whole batch applies or none of it does.
#[async_trait]
pub trait BatchWriter: Send + Sync {
    async fn apply(&self, ops: Vec<WriteOp>) -> Result<(), RepositoryError>;
}
