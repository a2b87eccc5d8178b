use thiserror::Error;

/// Violations of the domain model's own invariants, independent of any
/// store or transport.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}
