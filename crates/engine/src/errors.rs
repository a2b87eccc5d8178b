use thiserror::Error;

use paydeck_db::repositories::RepositoryError;

/// Failure taxonomy for engine operations. Batch failures guarantee the
/// store was left untouched; best-effort failures are partial by design
/// and carried in the operation's outcome instead of here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no authenticated user")]
    NotAuthenticated,
    #[error("permission denied for {action}")]
    PermissionDenied { action: &'static str },
    #[error("{what} not found")]
    NotFound { what: String },
    #[error("an open review request already exists for this week")]
    DuplicateReviewRequest,
    #[error("store read failed: {0}")]
    StoreRead(#[source] RepositoryError),
    #[error("batch write failed: {0}")]
    BatchWrite(#[source] RepositoryError),
    #[error("export failed: {0}")]
    Export(String),
}

impl EngineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Safe to show to an end user; internals go to the log.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "Sign in to continue.",
            Self::PermissionDenied { .. } => {
                "You do not have permission to perform this action."
            }
            Self::NotFound { .. } => "The requested record no longer exists.",
            Self::DuplicateReviewRequest => {
                "This week was already sent for review and is still pending."
            }
            Self::StoreRead(_) => "Checks could not be loaded. Try again.",
            Self::BatchWrite(_) => "No changes were saved. Try the operation again.",
            Self::Export(_) => "The document could not be generated. Nothing was marked paid.",
        }
    }
}

#[cfg(test)]
mod tests {
    use paydeck_db::repositories::RepositoryError;

    use super::EngineError;

    #[test]
    fn batch_failures_tell_the_user_nothing_was_saved() {
        let error =
            EngineError::BatchWrite(RepositoryError::BatchRejected("boom".to_string()));
        assert_eq!(error.user_message(), "No changes were saved. Try the operation again.");
    }

    #[test]
    fn messages_are_distinct_per_variant() {
        let messages = [
            EngineError::NotAuthenticated.user_message(),
            EngineError::PermissionDenied { action: "print" }.user_message(),
            EngineError::not_found("check chk-1").user_message(),
            EngineError::DuplicateReviewRequest.user_message(),
            EngineError::Export("template".to_string()).user_message(),
        ];
        let mut unique = messages.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), messages.len());
    }
}
