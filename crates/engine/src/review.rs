//! Review/paid lifecycle transitions.
//!
//! `reviewed` and `paid` are independent flags. Reviewed moves through
//! either direct admin action or the request/approval workflow; paid is
//! flipped only by the print path (plus the admin unmark). Everything
//! that must be all-or-nothing goes through one [`BatchWriter`] batch;
//! paid marking after a delivered export is per-check and best-effort.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use paydeck_core::domain::check::{Check, CheckId};
use paydeck_core::domain::company::CompanyId;
use paydeck_core::domain::review::{ReviewRequest, ReviewRequestId, ReviewScope, ReviewStatus};
use paydeck_core::domain::user::{User, UserId};
use paydeck_core::week::WeekKey;

use crate::errors::EngineError;
use paydeck_db::repositories::{
    BatchWriter, CheckFilter, CheckRepository, ReviewRequestRepository, WriteOp,
};

/// What a bulk operation will do, shown to the user before anything is
/// committed. Committing without a plan is not possible by construction.
#[derive(Clone, Debug)]
pub struct BulkPlan {
    pub action: BulkAction,
    pub company_id: Option<CompanyId>,
    pub week: Option<WeekKey>,
    pub summary: String,
    target_ids: Vec<CheckId>,
}

impl BulkPlan {
    pub fn target_count(&self) -> usize {
        self.target_ids.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BulkAction {
    SendForReview,
    MarkReviewed,
}

/// Scope of a bulk action: a whole company week, or hand-picked checks.
#[derive(Clone, Debug)]
pub enum BulkScope {
    CompanyWeek { company_id: CompanyId, week: WeekKey },
    Selection { check_ids: Vec<CheckId> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BulkOutcome {
    /// Zero eligible targets is a successful no-op, not an error.
    NoEligibleTargets,
    Committed { count: usize },
}

impl BulkOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::NoEligibleTargets => "No eligible checks in scope; nothing to do.".to_string(),
            Self::Committed { count } => format!("{count} checks updated."),
        }
    }
}

/// Result of best-effort paid marking. Partial success is expected;
/// failed ids were logged and are reported, not rolled back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaidOutcome {
    pub marked: Vec<CheckId>,
    pub already_paid: Vec<CheckId>,
    pub failed: Vec<CheckId>,
}

pub struct ReviewWorkflow {
    checks: Arc<dyn CheckRepository>,
    requests: Arc<dyn ReviewRequestRepository>,
    batch: Arc<dyn BatchWriter>,
}

impl ReviewWorkflow {
    pub fn new(
        checks: Arc<dyn CheckRepository>,
        requests: Arc<dyn ReviewRequestRepository>,
        batch: Arc<dyn BatchWriter>,
    ) -> Self {
        Self { checks, requests, batch }
    }

    fn require_admin(actor: &User, action: &'static str) -> Result<(), EngineError> {
        if actor.is_admin() {
            Ok(())
        } else {
            Err(EngineError::PermissionDenied { action })
        }
    }

    fn require_visible(actor: &User, company_id: &CompanyId) -> Result<(), EngineError> {
        if actor.can_see_company(company_id) {
            Ok(())
        } else {
            Err(EngineError::PermissionDenied { action: "access this company" })
        }
    }

    async fn load_check(&self, check_id: &CheckId) -> Result<Check, EngineError> {
        self.checks
            .find_by_id(check_id)
            .await
            .map_err(EngineError::StoreRead)?
            .ok_or_else(|| EngineError::not_found(format!("check {}", check_id.0)))
    }

    fn new_request(
        scope: ReviewScope,
        company_id: CompanyId,
        week_key: WeekKey,
        created_by: UserId,
        status: ReviewStatus,
    ) -> ReviewRequest {
        ReviewRequest {
            id: ReviewRequestId(Uuid::new_v4().to_string()),
            scope,
            company_id,
            week_key,
            created_by,
            status,
            created_at: Utc::now(),
        }
    }

    /// Ad-hoc per-check request. These may legitimately accumulate; the
    /// uniqueness guard applies to the week-scoped send only.
    pub async fn send_for_review(
        &self,
        actor: &User,
        check_id: &CheckId,
    ) -> Result<ReviewRequest, EngineError> {
        let check = self.load_check(check_id).await?;
        Self::require_visible(actor, &check.company_id)?;

        let request = Self::new_request(
            ReviewScope::SingleCheck { check_id: check.id.clone() },
            check.company_id.clone(),
            check.week_key(),
            UserId(actor.uid.clone()),
            ReviewStatus::Pending,
        );
        self.batch
            .apply(vec![WriteOp::CreateReviewRequest { request: request.clone() }])
            .await
            .map_err(EngineError::BatchWrite)?;

        info!(
            check_id = %check.id.0,
            company_id = %check.company_id.0,
            week = %check.week_key(),
            "check sent for review"
        );
        Ok(request)
    }

    /// Sends a whole company week for approval as one request. Refused
    /// while an open request for the same (company, week, creator)
    /// triple exists.
    pub async fn send_week_for_review(
        &self,
        actor: &User,
        company_id: &CompanyId,
        week: WeekKey,
    ) -> Result<ReviewRequest, EngineError> {
        Self::require_visible(actor, company_id)?;

        let creator = UserId(actor.uid.clone());
        let open = self
            .requests
            .list_open_by_correlation(company_id, week, &creator)
            .await
            .map_err(EngineError::StoreRead)?;
        if !open.is_empty() {
            return Err(EngineError::DuplicateReviewRequest);
        }

        let request = Self::new_request(
            ReviewScope::CompanyWeekCreator,
            company_id.clone(),
            week,
            creator,
            ReviewStatus::Pending,
        );
        self.batch
            .apply(vec![WriteOp::CreateReviewRequest { request: request.clone() }])
            .await
            .map_err(EngineError::BatchWrite)?;

        info!(company_id = %company_id.0, week = %week, "week sent for review");
        Ok(request)
    }

    async fn eligible_targets(
        &self,
        actor: &User,
        scope: &BulkScope,
    ) -> Result<(Vec<CheckId>, Option<CompanyId>, Option<WeekKey>), EngineError> {
        match scope {
            BulkScope::CompanyWeek { company_id, week } => {
                Self::require_visible(actor, company_id)?;
                let filter = CheckFilter {
                    company_id: Some(company_id.clone()),
                    week: Some(*week),
                    created_by: None,
                    reviewed: Some(false),
                };
                let checks = self.checks.list(&filter).await.map_err(EngineError::StoreRead)?;
                let ids = checks.into_iter().map(|check| check.id).collect();
                Ok((ids, Some(company_id.clone()), Some(*week)))
            }
            BulkScope::Selection { check_ids } => {
                let mut ids = Vec::new();
                for check_id in check_ids {
                    let check = self.load_check(check_id).await?;
                    Self::require_visible(actor, &check.company_id)?;
                    if !check.reviewed {
                        ids.push(check.id);
                    }
                }
                Ok((ids, None, None))
            }
        }
    }

    fn plan_summary(
        action: BulkAction,
        count: usize,
        company_id: &Option<CompanyId>,
        week: &Option<WeekKey>,
    ) -> String {
        let verb = match action {
            BulkAction::SendForReview => "Send",
            BulkAction::MarkReviewed => "Mark",
        };
        let tail = match action {
            BulkAction::SendForReview => "for review",
            BulkAction::MarkReviewed => "as reviewed",
        };
        match (company_id, week) {
            (Some(company_id), Some(week)) => format!(
                "{verb} {count} checks in company {} for the week of {week} {tail}",
                company_id.0
            ),
            _ => format!("{verb} {count} selected checks {tail}"),
        }
    }

    /// First half of the mandatory confirmation gate: what would happen.
    pub async fn plan_bulk_send_for_review(
        &self,
        actor: &User,
        scope: &BulkScope,
    ) -> Result<BulkPlan, EngineError> {
        let (target_ids, company_id, week) = self.eligible_targets(actor, scope).await?;
        let summary =
            Self::plan_summary(BulkAction::SendForReview, target_ids.len(), &company_id, &week);
        Ok(BulkPlan { action: BulkAction::SendForReview, company_id, week, summary, target_ids })
    }

    /// Second half of the gate: one atomic batch, one request per check.
    pub async fn commit_bulk_send_for_review(
        &self,
        actor: &User,
        plan: &BulkPlan,
    ) -> Result<BulkOutcome, EngineError> {
        if plan.target_ids.is_empty() {
            return Ok(BulkOutcome::NoEligibleTargets);
        }

        let creator = UserId(actor.uid.clone());
        let mut ops = Vec::with_capacity(plan.target_ids.len());
        for check_id in &plan.target_ids {
            let check = self.load_check(check_id).await?;
            ops.push(WriteOp::CreateReviewRequest {
                request: Self::new_request(
                    ReviewScope::SingleCheck { check_id: check.id.clone() },
                    check.company_id.clone(),
                    check.week_key(),
                    creator.clone(),
                    ReviewStatus::Pending,
                ),
            });
        }

        let count = ops.len();
        self.batch.apply(ops).await.map_err(EngineError::BatchWrite)?;
        info!(count, "bulk send for review committed");
        Ok(BulkOutcome::Committed { count })
    }

    pub async fn plan_mark_reviewed(
        &self,
        actor: &User,
        scope: &BulkScope,
    ) -> Result<BulkPlan, EngineError> {
        Self::require_admin(actor, "mark checks reviewed")?;
        let (target_ids, company_id, week) = self.eligible_targets(actor, scope).await?;
        let summary =
            Self::plan_summary(BulkAction::MarkReviewed, target_ids.len(), &company_id, &week);
        Ok(BulkPlan { action: BulkAction::MarkReviewed, company_id, week, summary, target_ids })
    }

    /// Direct admin review: flips the flags in one batch, no requests
    /// required or created.
    pub async fn commit_mark_reviewed(
        &self,
        actor: &User,
        plan: &BulkPlan,
    ) -> Result<BulkOutcome, EngineError> {
        Self::require_admin(actor, "mark checks reviewed")?;
        if plan.target_ids.is_empty() {
            return Ok(BulkOutcome::NoEligibleTargets);
        }

        let ops: Vec<WriteOp> = plan
            .target_ids
            .iter()
            .map(|id| WriteOp::SetCheckReviewed { id: id.clone(), reviewed: true })
            .collect();
        let count = ops.len();
        self.batch.apply(ops).await.map_err(EngineError::BatchWrite)?;
        info!(count, "bulk mark reviewed committed");
        Ok(BulkOutcome::Committed { count })
    }

    /// Admin review with request correlation: the check flag plus every
    /// request on the check's (company, week, creator) triple, in one
    /// batch. No matching request means one is back-filled already
    /// reviewed, so the approval history is never silently absent.
    /// Requests covering sibling checks of the same creator and week are
    /// updated too; that widening is deliberate.
    pub async fn review_with_correlation(
        &self,
        actor: &User,
        check_id: &CheckId,
    ) -> Result<(), EngineError> {
        Self::require_admin(actor, "review checks")?;
        self.transition_with_correlation(check_id, true).await
    }

    /// Reverts a review, re-opening the correlated requests.
    pub async fn undo_review(&self, actor: &User, check_id: &CheckId) -> Result<(), EngineError> {
        Self::require_admin(actor, "undo a review")?;
        self.transition_with_correlation(check_id, false).await
    }

    async fn transition_with_correlation(
        &self,
        check_id: &CheckId,
        reviewed: bool,
    ) -> Result<(), EngineError> {
        let check = self.load_check(check_id).await?;
        let week = check.week_key();
        let status = if reviewed { ReviewStatus::Reviewed } else { ReviewStatus::Pending };

        let mut ops = vec![WriteOp::SetCheckReviewed { id: check.id.clone(), reviewed }];

        let correlated = self
            .requests
            .list_by_correlation(&check.company_id, week, &check.created_by)
            .await
            .map_err(EngineError::StoreRead)?;
        if correlated.is_empty() {
            ops.push(WriteOp::CreateReviewRequest {
                request: Self::new_request(
                    ReviewScope::CompanyWeekCreator,
                    check.company_id.clone(),
                    week,
                    check.created_by.clone(),
                    status,
                ),
            });
        } else {
            for request in &correlated {
                ops.push(WriteOp::SetReviewRequestStatus { id: request.id.clone(), status });
            }
        }

        self.batch.apply(ops).await.map_err(EngineError::BatchWrite)?;
        info!(
            check_id = %check.id.0,
            reviewed,
            correlated = correlated.len(),
            "review transition applied"
        );
        Ok(())
    }

    /// Best-effort paid marking over exactly the printed ids. Already
    /// paid checks are left untouched; failures are logged and reported
    /// without rolling back the rest.
    pub(crate) async fn mark_paid(&self, check_ids: &[CheckId]) -> PaidOutcome {
        let mut outcome = PaidOutcome::default();
        for check_id in check_ids {
            match self.checks.find_by_id(check_id).await {
                Ok(Some(check)) if check.paid => outcome.already_paid.push(check_id.clone()),
                Ok(Some(mut check)) => {
                    check.paid = true;
                    match self.checks.save(check).await {
                        Ok(()) => outcome.marked.push(check_id.clone()),
                        Err(error) => {
                            warn!(check_id = %check_id.0, %error, "paid marking failed");
                            outcome.failed.push(check_id.clone());
                        }
                    }
                }
                Ok(None) => {
                    warn!(check_id = %check_id.0, "paid marking skipped: check missing");
                    outcome.failed.push(check_id.clone());
                }
                Err(error) => {
                    warn!(check_id = %check_id.0, %error, "paid marking read failed");
                    outcome.failed.push(check_id.clone());
                }
            }
        }
        outcome
    }

    /// Admin-only escape hatch; the only standalone paid toggle.
    pub async fn unmark_paid(&self, actor: &User, check_id: &CheckId) -> Result<(), EngineError> {
        Self::require_admin(actor, "unmark a paid check")?;

        let mut check = self.load_check(check_id).await?;
        if !check.paid {
            return Ok(());
        }
        check.paid = false;
        self.checks.save(check).await.map_err(EngineError::StoreRead)?;
        info!(check_id = %check_id.0, "paid flag cleared");
        Ok(())
    }
}
