use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::check::CheckId;
use crate::domain::company::CompanyId;
use crate::domain::user::UserId;
use crate::week::WeekKey;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewRequestId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Reviewed,
}

/// What a request covers. Admin actions correlate by the
/// (company, week, creator) triple, so a week-scoped request can be
/// resolved by reviewing any check in that triple.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewScope {
    SingleCheck { check_id: CheckId },
    CompanyWeekCreator,
}

/// An approval workflow record. Created when a non-privileged user sends
/// work for review, or back-filled by an admin action so that history is
/// never silently absent. Never deleted by this engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub id: ReviewRequestId,
    pub scope: ReviewScope,
    pub company_id: CompanyId,
    pub week_key: WeekKey,
    pub created_by: UserId,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
}

impl ReviewRequest {
    pub fn is_open(&self) -> bool {
        self.status == ReviewStatus::Pending
    }

    /// Legacy mirror column kept alongside `status` in the store.
    pub fn is_reviewed(&self) -> bool {
        self.status == ReviewStatus::Reviewed
    }

    pub fn check_id(&self) -> Option<&CheckId> {
        match &self.scope {
            ReviewScope::SingleCheck { check_id } => Some(check_id),
            ReviewScope::CompanyWeekCreator => None,
        }
    }

    pub fn matches_correlation(
        &self,
        company_id: &CompanyId,
        week_key: WeekKey,
        created_by: &UserId,
    ) -> bool {
        self.company_id == *company_id
            && self.week_key == week_key
            && self.created_by == *created_by
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::{ReviewRequest, ReviewRequestId, ReviewScope, ReviewStatus};
    use crate::domain::check::CheckId;
    use crate::domain::company::CompanyId;
    use crate::domain::user::UserId;
    use crate::week::WeekKey;

    fn request(status: ReviewStatus) -> ReviewRequest {
        ReviewRequest {
            id: ReviewRequestId("rr-1".to_string()),
            scope: ReviewScope::SingleCheck { check_id: CheckId("chk-1".to_string()) },
            company_id: CompanyId("c-1".to_string()),
            week_key: WeekKey::for_date(NaiveDate::from_ymd_opt(2026, 8, 4).expect("date")),
            created_by: UserId("u-1".to_string()),
            status,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn pending_requests_are_open() {
        assert!(request(ReviewStatus::Pending).is_open());
        assert!(!request(ReviewStatus::Reviewed).is_open());
    }

    #[test]
    fn reviewed_mirror_tracks_status() {
        assert!(request(ReviewStatus::Reviewed).is_reviewed());
        assert!(!request(ReviewStatus::Pending).is_reviewed());
    }

    #[test]
    fn correlation_matches_on_the_full_triple() {
        let r = request(ReviewStatus::Pending);
        let week = WeekKey::for_date(NaiveDate::from_ymd_opt(2026, 8, 6).expect("date"));
        assert!(r.matches_correlation(
            &CompanyId("c-1".to_string()),
            week,
            &UserId("u-1".to_string())
        ));
        assert!(!r.matches_correlation(
            &CompanyId("c-2".to_string()),
            week,
            &UserId("u-1".to_string())
        ));
    }
}
