use paydeck_core::config::{AppConfig, LoadOptions};
use paydeck_core::domain::check::CheckId;
use paydeck_core::domain::company::CompanyId;
use paydeck_core::week::WeekKey;
use paydeck_engine::{BulkScope, ReviewWorkflow};

use crate::commands::{actor_for, build_runtime, wire, CommandError, CommandResult};

pub enum ReviewAction {
    /// Admin review of one check through the request-correlation path.
    ReviewCheck { check_id: String, undo: bool },
    /// Non-privileged: one request covering the whole week.
    SendWeek { company: String, week: String },
    /// Non-privileged: one request per unreviewed check, atomically.
    BulkSend { company: String, week: String, confirmed: bool },
    /// Admin: flip the reviewed flag over the whole scope, atomically.
    MarkReviewed { company: String, week: String, confirmed: bool },
    /// Admin: clear the paid flag on one check.
    UnmarkPaid { check_id: String },
}

pub struct ReviewArgs {
    pub acting_uid: String,
    pub action: ReviewAction,
}

fn parse_week(raw: &str) -> Result<WeekKey, CommandError> {
    raw.parse::<WeekKey>().map_err(|error| ("week_parse", error.to_string(), 2u8))
}

async fn execute(
    workflow: &ReviewWorkflow,
    actor: &paydeck_core::domain::user::User,
    action: &ReviewAction,
) -> Result<String, CommandError> {
    let engine_failure =
        |error: paydeck_engine::EngineError| ("review", error.user_message().to_string(), 7u8);

    match action {
        ReviewAction::ReviewCheck { check_id, undo } => {
            let id = CheckId(check_id.clone());
            if *undo {
                workflow.undo_review(actor, &id).await.map_err(engine_failure)?;
                Ok(format!("check {check_id} moved back to unreviewed"))
            } else {
                workflow.review_with_correlation(actor, &id).await.map_err(engine_failure)?;
                Ok(format!("check {check_id} reviewed"))
            }
        }
        ReviewAction::SendWeek { company, week } => {
            let week = parse_week(week)?;
            let request = workflow
                .send_week_for_review(actor, &CompanyId(company.clone()), week)
                .await
                .map_err(engine_failure)?;
            Ok(format!("week {week} sent for review as request {}", request.id.0))
        }
        ReviewAction::BulkSend { company, week, confirmed } => {
            let week = parse_week(week)?;
            let scope =
                BulkScope::CompanyWeek { company_id: CompanyId(company.clone()), week };
            let plan = workflow
                .plan_bulk_send_for_review(actor, &scope)
                .await
                .map_err(engine_failure)?;
            if !*confirmed {
                return Ok(format!("{} (re-run with --yes to commit)", plan.summary));
            }
            let outcome = workflow
                .commit_bulk_send_for_review(actor, &plan)
                .await
                .map_err(engine_failure)?;
            Ok(outcome.message())
        }
        ReviewAction::MarkReviewed { company, week, confirmed } => {
            let week = parse_week(week)?;
            let scope =
                BulkScope::CompanyWeek { company_id: CompanyId(company.clone()), week };
            let plan =
                workflow.plan_mark_reviewed(actor, &scope).await.map_err(engine_failure)?;
            if !*confirmed {
                return Ok(format!("{} (re-run with --yes to commit)", plan.summary));
            }
            let outcome =
                workflow.commit_mark_reviewed(actor, &plan).await.map_err(engine_failure)?;
            Ok(outcome.message())
        }
        ReviewAction::UnmarkPaid { check_id } => {
            let id = CheckId(check_id.clone());
            workflow.unmark_paid(actor, &id).await.map_err(engine_failure)?;
            Ok(format!("check {check_id} unmarked as paid"))
        }
    }
}

pub fn run(args: ReviewArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "review",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match build_runtime("review") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let engines = wire(&config).await?;
        let actor = actor_for(&engines, &args.acting_uid).await?;
        let message = execute(&engines.workflow, &actor, &args.action).await?;
        engines.query.invalidate();
        engines.pool.close().await;
        Ok::<String, CommandError>(message)
    });

    match result {
        Ok(message) => CommandResult::success("review", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("review", error_class, message, exit_code)
        }
    }
}
