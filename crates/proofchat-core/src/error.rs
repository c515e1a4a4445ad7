/// Errors raised by the chat core.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A tactic id that is not in the registry was requested.
    #[error("unknown tactic: {0}")]
    UnknownTactic(String),

    /// A knowledge base label that is not in the catalog was selected.
    #[error("unknown knowledge base: {0}")]
    UnknownKnowledgeBase(String),

    /// The backend call failed (transport, status or decoding).
    #[error("submission failed: {0}")]
    SubmissionFailed(String),
}

/// Extension trait to reduce `.map_err()` boilerplate when wrapping errors into `CoreError`.
pub trait ResultExt<T> {
    /// Wrap the error as [`CoreError::SubmissionFailed`] with `context` prefix.
    fn submission(self, context: &str) -> Result<T, CoreError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn submission(self, context: &str) -> Result<T, CoreError> {
        self.map_err(|e| CoreError::SubmissionFailed(format!("{context}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_context_is_prefixed() {
        let result: Result<(), &str> = Err("connection refused");
        let err = result.submission("POST /submit_prompt/").unwrap_err();
        assert_eq!(
            err.to_string(),
            "submission failed: POST /submit_prompt/: connection refused"
        );
    }
}
