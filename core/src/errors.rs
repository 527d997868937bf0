use thiserror::Error;

/// Failure catalogue shared by connectors, the config store and the orchestrator.
///
/// Messages are shown to the user verbatim, so transport and protocol variants
/// already carry the provider-specific remediation hint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LumenError {
    #[error("{0}")]
    Transport(String),
    #[error("{message}")]
    Protocol { status: u16, message: String },
    #[error("{0}")]
    Decode(String),
    #[error("{0}")]
    EmptyResult(String),
    #[error("{0}")]
    Api(String),
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
    #[error("{0}")]
    Credential(String),
    #[error("{0}")]
    Storage(String),
}

impl LumenError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "NET-1001",
            Self::Protocol { .. } => "NET-1002",
            Self::Decode(_) => "NET-1003",
            Self::EmptyResult(_) => "MDL-1001",
            Self::Api(_) => "API-1001",
            Self::UnsupportedProvider(_) => "PRV-1001",
            Self::Credential(_) => "KEY-1001",
            Self::Storage(_) => "CFG-1001",
        }
    }

    pub fn explain(&self) -> &'static str {
        match self {
            Self::Transport(_) => "The backend could not be reached (refused, timed out, or unresolvable).",
            Self::Protocol { .. } => "The backend answered with a non-success HTTP status.",
            Self::Decode(_) => "The backend response body could not be parsed.",
            Self::EmptyResult(_) => "The backend answered but returned no models or no completion.",
            Self::Api(_) => "The backend reported an error inside its response body.",
            Self::UnsupportedProvider(_) => "No connector is registered for the requested provider.",
            Self::Credential(_) => "A stored credential is missing or could not be decrypted.",
            Self::Storage(_) => "The configuration file could not be read or written.",
        }
    }
}

pub type LumenResult<T> = std::result::Result<T, LumenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_displays_message_only() {
        let err = LumenError::Protocol {
            status: 503,
            message: "HTTP 503: service unavailable".into(),
        };
        assert_eq!(err.to_string(), "HTTP 503: service unavailable");
        assert_eq!(err.code(), "NET-1002");
    }

    #[test]
    fn unsupported_provider_names_the_id() {
        let err = LumenError::UnsupportedProvider("mistral".into());
        assert_eq!(err.to_string(), "Unsupported provider: mistral");
        assert!(!err.explain().is_empty());
    }
}
