pub mod config;
pub mod domain;
pub mod errors;
pub mod payroll;
pub mod week;

pub use domain::check::{
    Check, CheckId, PayStructure, PayType, PerdiemBreakdown, RelationshipDetail, RelationshipId,
};
pub use domain::company::{Client, ClientId, Company, CompanyId};
pub use domain::review::{ReviewRequest, ReviewRequestId, ReviewScope, ReviewStatus};
pub use domain::user::{Role, User, UserId};
pub use errors::DomainError;
pub use payroll::{compute_display, PayBreakdown, PayLine};
pub use week::{iso_week_label, WeekKey};
