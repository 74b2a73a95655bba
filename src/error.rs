use thiserror::Error;

use crate::state::Action;

/// Credentials a command may need before it can reach a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    Gemini,
    Naver,
}

impl Credential {
    pub fn as_str(&self) -> &'static str {
        match self {
            Credential::Gemini => "gemini",
            Credential::Naver => "naver",
        }
    }
}

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("{} API key is required", .0.as_str())]
    MissingCredential(Credential),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{} is already in progress", .0.as_str())]
    Busy(Action),

    #[error("no background image is set")]
    NoBackground,

    #[error("image error: {0}")]
    Image(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StudioError {
    /// Failures after which keyword analysis degrades to synthetic data.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            StudioError::Unauthorized(_) | StudioError::Forbidden(_) | StudioError::Transport(_)
        )
    }
}

impl From<reqwest::Error> for StudioError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StudioError::MalformedResponse(err.to_string())
        } else {
            StudioError::Transport(err.to_string())
        }
    }
}

impl StudioError {
    pub(crate) fn storage(err: anyhow::Error) -> Self {
        StudioError::Storage(format!("{:#}", err))
    }

    pub(crate) fn internal(err: anyhow::Error) -> Self {
        StudioError::Internal(format!("{:#}", err))
    }
}

pub type StudioResult<T> = std::result::Result<T, StudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_only_for_reachability_failures() {
        assert!(StudioError::Transport("timeout".into()).is_fallback_eligible());
        assert!(StudioError::Forbidden("cors".into()).is_fallback_eligible());
        assert!(StudioError::Unauthorized("bad key".into()).is_fallback_eligible());
        assert!(
            !StudioError::Api {
                status: 500,
                message: "boom".into()
            }
            .is_fallback_eligible()
        );
        assert!(!StudioError::MalformedResponse("{}".into()).is_fallback_eligible());
        assert!(!StudioError::MissingCredential(Credential::Naver).is_fallback_eligible());
    }

    #[test]
    fn messages_name_the_credential() {
        let err = StudioError::MissingCredential(Credential::Gemini);
        assert_eq!(err.to_string(), "gemini API key is required");
    }
}
