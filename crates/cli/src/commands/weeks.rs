use serde_json::json;

use paydeck_core::config::{AppConfig, LoadOptions};
use paydeck_core::domain::company::CompanyId;
use paydeck_core::week::WeekKey;
use paydeck_engine::{QueryFilters, QueryScope};

use crate::commands::{actor_for, build_runtime, wire, CommandError, CommandResult};

pub struct WeeksArgs {
    pub acting_uid: String,
    pub company: Option<String>,
    pub week: Option<String>,
    pub search: Option<String>,
}

pub fn run(args: WeeksArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "weeks",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let week = match args.week.as_deref().map(str::parse::<WeekKey>).transpose() {
        Ok(week) => week,
        Err(error) => {
            return CommandResult::failure("weeks", "week_parse", error.to_string(), 2);
        }
    };

    let runtime = match build_runtime("weeks") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let engines = wire(&config).await?;
        let actor = actor_for(&engines, &args.acting_uid).await?;

        let scope = QueryScope {
            company_id: args.company.clone().map(CompanyId),
            week,
            created_by: None,
        };
        let filters = QueryFilters { search_text: args.search.clone(), ..QueryFilters::default() };

        let snapshot = engines
            .query
            .fetch(&actor, &scope, &filters)
            .await
            .map_err(|error| ("query", error.user_message().to_string(), 7u8))?;

        let buckets: Vec<serde_json::Value> = snapshot
            .buckets
            .iter()
            .map(|bucket| {
                json!({
                    "week": bucket.week_key.to_string(),
                    "label": bucket.label,
                    "checks": bucket.rows.iter().map(|row| json!({
                        "id": row.check.id.0,
                        "number": row.check.check_number,
                        "employee": row.check.employee_name,
                        "amount": row.check.amount.to_string(),
                        "reviewed": row.check.reviewed,
                        "paid": row.check.paid,
                        "state": format!("{:?}", row.review_state),
                        "creator": row.creator_name,
                    })).collect::<Vec<_>>(),
                })
            })
            .collect();

        engines.pool.close().await;
        Ok::<String, CommandError>(
            serde_json::to_string_pretty(&json!({ "buckets": buckets }))
                .unwrap_or_else(|error| format!("{{\"error\":\"{error}\"}}")),
        )
    });

    match result {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("weeks", error_class, message, exit_code)
        }
    }
}
