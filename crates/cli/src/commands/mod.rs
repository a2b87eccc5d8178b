pub mod config;
pub mod migrate;
pub mod print;
pub mod review;
pub mod seed;
pub mod weeks;

use std::sync::Arc;

use serde::Serialize;

use paydeck_core::config::AppConfig;
use paydeck_core::domain::user::{User, UserId};
use paydeck_db::repositories::{
    BatchWriter, CheckRepository, ReviewRequestRepository, SqlBatchWriter, SqlCheckRepository,
    SqlReviewRequestRepository, SqlUserRepository, UserRepository,
};
use paydeck_db::{connect_with_settings, DbPool};
use paydeck_engine::{
    resolve_actor, CheckQueryEngine, ReviewWorkflow, StaticAuthProvider, UserDirectory,
};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Command failure carried as (error class, message, exit code).
pub(crate) type CommandError = (&'static str, String, u8);

pub(crate) fn build_runtime(
    command: &str,
) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Everything a domain command needs, wired over one pool.
pub(crate) struct Engines {
    pub pool: DbPool,
    pub users: Arc<dyn UserRepository>,
    pub workflow: Arc<ReviewWorkflow>,
    pub query: Arc<CheckQueryEngine>,
    pub checks: Arc<dyn CheckRepository>,
}

pub(crate) async fn wire(config: &AppConfig) -> Result<Engines, CommandError> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

    let checks: Arc<dyn CheckRepository> = Arc::new(SqlCheckRepository::new(pool.clone()));
    let requests: Arc<dyn ReviewRequestRepository> =
        Arc::new(SqlReviewRequestRepository::new(pool.clone()));
    let users: Arc<dyn UserRepository> = Arc::new(SqlUserRepository::new(pool.clone()));
    let batch: Arc<dyn BatchWriter> = Arc::new(SqlBatchWriter::new(pool.clone()));

    let workflow = Arc::new(ReviewWorkflow::new(checks.clone(), requests.clone(), batch));
    let query = Arc::new(CheckQueryEngine::new(
        checks.clone(),
        requests,
        UserDirectory::new(users.clone()),
    ));

    Ok(Engines { pool, users, workflow, query, checks })
}

/// Resolves the `--as` identity the way the engine resolves any session.
pub(crate) async fn actor_for(engines: &Engines, uid: &str) -> Result<User, CommandError> {
    let auth = StaticAuthProvider::new(Some(UserId(uid.to_string())));
    resolve_actor(&auth, engines.users.as_ref())
        .await
        .map_err(|error| ("acting_user", error.to_string(), 6u8))
}
