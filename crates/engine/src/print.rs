//! Print orchestration.
//!
//! Exporting is the trigger for paid marking: after a document is
//! delivered, every submitted check that is not already paid flips to
//! paid. The marking is deliberately not atomic with the export; a
//! failed write cannot un-deliver the document, so partial success is
//! logged and reported instead of rolled back.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use paydeck_core::domain::check::{Check, CheckId};
use paydeck_core::domain::company::CompanyId;
use paydeck_core::domain::user::User;
use paydeck_core::week::WeekKey;

use crate::errors::EngineError;
use crate::review::{PaidOutcome, ReviewWorkflow};
use paydeck_db::repositories::{CheckFilter, CheckRepository};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("template error: {0}")]
    Template(String),
    #[error("render error: {0}")]
    Render(String),
}

/// Collaborator that turns a set of checks into a printable document.
/// The PDF conversion and its transport live outside this engine.
#[async_trait]
pub trait CheckExporter: Send + Sync {
    async fn export(&self, checks: &[Check], week_key: WeekKey) -> Result<Vec<u8>, ExportError>;
}

#[derive(Clone, Debug)]
pub struct PrintOutcome {
    pub document: Vec<u8>,
    pub paid: PaidOutcome,
}

pub struct PrintOrchestrator {
    checks: Arc<dyn CheckRepository>,
    workflow: Arc<ReviewWorkflow>,
    exporter: Arc<dyn CheckExporter>,
}

impl PrintOrchestrator {
    pub fn new(
        checks: Arc<dyn CheckRepository>,
        workflow: Arc<ReviewWorkflow>,
        exporter: Arc<dyn CheckExporter>,
    ) -> Self {
        Self { checks, workflow, exporter }
    }

    fn require_print_permission(actor: &User) -> Result<(), EngineError> {
        if actor.can_print_checks {
            Ok(())
        } else {
            Err(EngineError::PermissionDenied { action: "print checks" })
        }
    }

    /// Prints every check of a company week.
    pub async fn print_week(
        &self,
        actor: &User,
        company_id: &CompanyId,
        week: WeekKey,
    ) -> Result<PrintOutcome, EngineError> {
        Self::require_print_permission(actor)?;
        if !actor.can_see_company(company_id) {
            return Err(EngineError::PermissionDenied { action: "access this company" });
        }

        let filter = CheckFilter {
            company_id: Some(company_id.clone()),
            week: Some(week),
            created_by: None,
            reviewed: None,
        };
        let checks = self.checks.list(&filter).await.map_err(EngineError::StoreRead)?;
        self.export_and_mark(checks, week).await
    }

    /// Prints an explicit selection; the week key on the document is the
    /// bucket of the earliest selected check.
    pub async fn print_checks(
        &self,
        actor: &User,
        check_ids: &[CheckId],
    ) -> Result<PrintOutcome, EngineError> {
        Self::require_print_permission(actor)?;

        let mut checks = Vec::with_capacity(check_ids.len());
        for check_id in check_ids {
            let check = self
                .checks
                .find_by_id(check_id)
                .await
                .map_err(EngineError::StoreRead)?
                .ok_or_else(|| EngineError::not_found(format!("check {}", check_id.0)))?;
            if !actor.can_see_company(&check.company_id) {
                return Err(EngineError::PermissionDenied { action: "access this company" });
            }
            checks.push(check);
        }

        let week = checks
            .iter()
            .map(|check| check.week_key())
            .min()
            .ok_or_else(|| EngineError::not_found("checks to print"))?;
        self.export_and_mark(checks, week).await
    }

    async fn export_and_mark(
        &self,
        checks: Vec<Check>,
        week: WeekKey,
    ) -> Result<PrintOutcome, EngineError> {
        if checks.is_empty() {
            return Err(EngineError::not_found("checks to print"));
        }

        let document = self
            .exporter
            .export(&checks, week)
            .await
            .map_err(|error| EngineError::Export(error.to_string()))?;

        // export delivered; marking is best-effort over exactly these ids
        let ids: Vec<CheckId> = checks.iter().map(|check| check.id.clone()).collect();
        let paid = self.workflow.mark_paid(&ids).await;
        info!(
            printed = ids.len(),
            marked = paid.marked.len(),
            already_paid = paid.already_paid.len(),
            failed = paid.failed.len(),
            week = %week,
            "print completed"
        );

        Ok(PrintOutcome { document, paid })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use paydeck_core::domain::check::{Check, CheckId};
    use paydeck_core::domain::company::CompanyId;
    use paydeck_core::domain::user::{Role, User, UserId};
    use paydeck_core::week::WeekKey;
    use paydeck_db::fixtures::seed_memory;
    use paydeck_db::repositories::{CheckRepository, InMemoryStore};

    use super::{CheckExporter, ExportError, PrintOrchestrator};
    use crate::errors::EngineError;
    use crate::review::ReviewWorkflow;

    struct FakeExporter {
        fail: AtomicBool,
    }

    impl FakeExporter {
        fn new() -> Self {
            Self { fail: AtomicBool::new(false) }
        }
    }

    #[async_trait]
    impl CheckExporter for FakeExporter {
        async fn export(
            &self,
            checks: &[Check],
            _week_key: WeekKey,
        ) -> Result<Vec<u8>, ExportError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ExportError::Render("printer on fire".to_string()));
            }
            Ok(format!("{} checks", checks.len()).into_bytes())
        }
    }

    async fn orchestrator() -> (Arc<InMemoryStore>, Arc<FakeExporter>, PrintOrchestrator) {
        let store = Arc::new(InMemoryStore::new());
        seed_memory(&store).await.expect("seed");
        let workflow =
            Arc::new(ReviewWorkflow::new(store.clone(), store.clone(), store.clone()));
        let exporter = Arc::new(FakeExporter::new());
        let orchestrator =
            PrintOrchestrator::new(store.clone(), workflow, exporter.clone());
        (store, exporter, orchestrator)
    }

    fn printer() -> User {
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
        }
    }

    #[tokio::test]
    async fn printing_marks_exactly_the_unpaid_submitted_checks() {
        let (store, _, orchestrator) = orchestrator().await;

        // pre-pay B so only A and C transition
        let mut b = CheckRepository::find_by_id(
            store.as_ref(),
            &CheckId("chk-1002".to_string()),
        )
        .await
        .expect("find")
        .expect("exists");
        b.paid = true;
        CheckRepository::save(store.as_ref(), b).await.expect("save");

        let outcome = orchestrator
            .print_checks(
                &printer(),
                &[
                    CheckId("chk-1001".to_string()),
                    CheckId("chk-1002".to_string()),
                    CheckId("chk-1003".to_string()),
                ],
            )
            .await
            .expect("print");

        assert_eq!(
            outcome.paid.marked,
            vec![CheckId("chk-1001".to_string()), CheckId("chk-1003".to_string())]
        );
        assert_eq!(outcome.paid.already_paid, vec![CheckId("chk-1002".to_string())]);
        assert!(outcome.paid.failed.is_empty());
        assert!(!outcome.document.is_empty());
    }

    #[tokio::test]
    async fn failed_export_marks_nothing() {
        let (store, exporter, orchestrator) = orchestrator().await;
        exporter.fail.store(true, std::sync::atomic::Ordering::SeqCst);

        let error = orchestrator
            .print_week(
                &printer(),
                &CompanyId("c-harbor".to_string()),
                WeekKey::for_date(NaiveDate::from_ymd_opt(2026, 8, 3).expect("date")),
            )
            .await
            .expect_err("export failure");
        assert!(matches!(error, EngineError::Export(_)));

        let untouched = CheckRepository::find_by_id(
            store.as_ref(),
            &CheckId("chk-1001".to_string()),
        )
        .await
        .expect("find")
        .expect("exists");
        assert!(!untouched.paid);
    }

    #[tokio::test]
    async fn printing_requires_the_capability() {
        let (_, _, orchestrator) = orchestrator().await;

        let mut no_permission = printer();
        no_permission.can_print_checks = false;

        let error = orchestrator
            .print_checks(&no_permission, &[CheckId("chk-1001".to_string())])
            .await
            .expect_err("denied");
        assert!(matches!(error, EngineError::PermissionDenied { .. }));
    }
}
