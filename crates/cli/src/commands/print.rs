use std::path::PathBuf;
use std::sync::Arc;

use paydeck_core::config::{AppConfig, LoadOptions};
use paydeck_core::domain::company::CompanyId;
use paydeck_core::week::WeekKey;
use paydeck_engine::{HtmlStubExporter, PrintOrchestrator};

use crate::commands::{actor_for, build_runtime, wire, CommandError, CommandResult};

pub struct PrintArgs {
    pub acting_uid: String,
    pub company: String,
    pub week: String,
    pub out: Option<PathBuf>,
}

pub fn run(args: PrintArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "print",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let week = match args.week.parse::<WeekKey>() {
        Ok(week) => week,
        Err(error) => {
            return CommandResult::failure("print", "week_parse", error.to_string(), 2);
        }
    };

    let runtime = match build_runtime("print") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let engines = wire(&config).await?;
        let actor = actor_for(&engines, &args.acting_uid).await?;

        let exporter = Arc::new(
            HtmlStubExporter::new()
                .map_err(|error| ("exporter_init", error.to_string(), 7u8))?,
        );
        let orchestrator = PrintOrchestrator::new(
            engines.checks.clone(),
            engines.workflow.clone(),
            exporter,
        );

        let company = CompanyId(args.company.clone());
        let outcome = orchestrator
            .print_week(&actor, &company, week)
            .await
            .map_err(|error| ("print", error.user_message().to_string(), 7u8))?;

        let out_path = args.out.clone().unwrap_or_else(|| {
            config.export.output_dir.join(format!("checks-{}-{week}.html", args.company))
        });
        if let Some(parent) = out_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| ("export_write", error.to_string(), 7u8))?;
        }
        tokio::fs::write(&out_path, &outcome.document)
            .await
            .map_err(|error| ("export_write", error.to_string(), 7u8))?;

        engines.query.invalidate();
        engines.pool.close().await;

        let mut message = format!(
            "wrote {} and marked {} checks paid ({} already paid)",
            out_path.display(),
            outcome.paid.marked.len(),
            outcome.paid.already_paid.len()
        );
        if !outcome.paid.failed.is_empty() {
            message.push_str(&format!(
                "; {} checks could not be marked and were left unpaid",
                outcome.paid.failed.len()
            ));
        }
        Ok::<String, CommandError>(message)
    });

    match result {
        Ok(message) => CommandResult::success("print", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("print", error_class, message, exit_code)
        }
    }
}
