pub mod auth;
pub mod chunk;
pub mod directory;
pub mod errors;
pub mod export;
pub mod print;
pub mod query;
pub mod review;

pub use auth::{resolve_actor, AuthProvider, StaticAuthProvider};
pub use chunk::{fetch_by_id_batch, fetch_by_membership, Keyed};
pub use directory::UserDirectory;
pub use errors::EngineError;
pub use export::HtmlStubExporter;
pub use print::{CheckExporter, ExportError, PrintOrchestrator, PrintOutcome};
pub use query::{
    CheckQueryEngine, CheckRow, QueryFilters, QueryScope, QuerySnapshot, ReviewState,
    ReviewStatusFilter, WeekBucket,
};
pub use review::{BulkAction, BulkOutcome, BulkPlan, BulkScope, PaidOutcome, ReviewWorkflow};
