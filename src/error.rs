use thiserror::Error;

/// Domain failures carried inside `anyhow::Error`. Callers that need to
/// branch on them use `err.downcast_ref::<StoreError>()`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid submission: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("cannot move {kind} {id} from {from} to {to}")]
    InvalidTransition {
        kind: &'static str,
        id: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("speech transcription failed: {0}")]
    Transcription(String),

    #[error("upload rejected: {0}")]
    Upload(String),

    #[error("unsupported database url: {0}")]
    UnsupportedDatabase(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_lists_every_problem() {
        let err = StoreError::Validation(vec![
            "Story title is required".into(),
            "Story content is required".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "invalid submission: Story title is required; Story content is required"
        );
    }

    #[test]
    fn downcasts_through_anyhow() {
        let err: anyhow::Error = StoreError::Upload("too large".into()).into();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Upload(_))
        ));
    }
}
