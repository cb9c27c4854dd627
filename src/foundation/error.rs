use crate::constraint::GenerationConstraintError;
use crate::invoke::EngineFailure;

pub type VestureResult<T> = Result<T, VestureError>;

#[derive(thiserror::Error, Debug)]
pub enum VestureError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("analysis error: {0}")]
    Analysis(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error("constraint error: {0}")]
    Constraint(#[from] GenerationConstraintError),

    #[error("generation error: {0}")]
    Generation(#[from] EngineFailure),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VestureError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn analysis(msg: impl Into<String>) -> Self {
        Self::Analysis(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Message suitable for showing to the person who submitted the try-on request.
    ///
    /// Constraint and generation failures carry their own phrasing; everything else is
    /// collapsed into a generic retry hint.
    pub fn user_message(&self) -> String {
        match self {
            Self::Constraint(e) => e.message.clone(),
            Self::Generation(f) => f.user_message().to_string(),
            Self::Validation(msg) => format!("Invalid request: {msg}"),
            Self::Analysis(_) | Self::Serde(_) | Self::Other(_) => {
                "Something went wrong while preparing your try-on. Please try again.".to_string()
            }
        }
    }
}

impl From<serde_json::Error> for VestureError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Coverage;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            VestureError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            VestureError::analysis("x")
                .to_string()
                .contains("analysis error:")
        );
        assert!(
            VestureError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
        assert!(
            VestureError::from(EngineFailure::Timeout)
                .to_string()
                .contains("generation error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = VestureError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn constraint_user_message_is_the_error_message() {
        let err = VestureError::from(GenerationConstraintError {
            message: "need more body".to_string(),
            input_coverage: Coverage::FaceOnly,
            required_coverage: Coverage::UpperBody,
            garment_topology: None,
        });
        assert_eq!(err.user_message(), "need more body");
        assert!(err.to_string().starts_with("constraint error:"));
    }

    #[test]
    fn generation_user_message_is_distinct_from_constraint() {
        let err = VestureError::from(EngineFailure::QuotaExceeded);
        assert_eq!(
            err.user_message(),
            EngineFailure::QuotaExceeded.user_message()
        );
    }
}
