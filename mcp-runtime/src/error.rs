use confluence_core::GatewayError;
use confluence_core::error::codes;
use thiserror::Error;

use crate::template::TemplateError;

/// Failure raised inside an operation or resource handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("{0}")]
    InvalidInput(String),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl HandlerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        HandlerError::InvalidInput(message.into())
    }

    /// Gateway failures keep their own kind; everything else a handler raises
    /// is a plain handler error.
    pub fn kind(&self) -> FailureKind {
        match self {
            HandlerError::Gateway(GatewayError::ConfigurationInvalid(_)) => {
                FailureKind::ConfigurationInvalid
            }
            HandlerError::Gateway(GatewayError::Upstream { .. }) => FailureKind::UpstreamError,
            HandlerError::Gateway(GatewayError::Transport(_) | GatewayError::Cancelled) => {
                FailureKind::TransportFailure
            }
            HandlerError::Gateway(GatewayError::Decode(_))
            | HandlerError::InvalidInput(_)
            | HandlerError::Json(_)
            | HandlerError::Io(_) => FailureKind::HandlerError,
        }
    }
}

/// Startup-fatal problems found while building the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("operation '{0}' is registered more than once")]
    DuplicateOperation(String),
    #[error("resource '{0}' is registered more than once")]
    DuplicateResource(String),
    #[error("operation '{operation}': {reason}")]
    InvalidParameter { operation: String, reason: String },
    #[error(transparent)]
    InvalidTemplate(#[from] TemplateError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    ConfigurationInvalid,
    UpstreamError,
    TransportFailure,
    BadArgument,
    MissingArgument,
    NotFound,
    HandlerError,
}

impl FailureKind {
    pub fn code(self) -> &'static str {
        match self {
            FailureKind::ConfigurationInvalid => codes::CONFIGURATION_INVALID,
            FailureKind::UpstreamError => codes::UPSTREAM_ERROR,
            FailureKind::TransportFailure => codes::TRANSPORT_FAILURE,
            FailureKind::BadArgument => codes::BAD_ARGUMENT,
            FailureKind::MissingArgument => codes::MISSING_ARGUMENT,
            FailureKind::NotFound => codes::NOT_FOUND,
            FailureKind::HandlerError => codes::HANDLER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_failures_keep_their_kind() {
        let upstream = HandlerError::from(GatewayError::Upstream {
            status: 500,
            body: "boom".to_string(),
        });
        assert_eq!(upstream.kind(), FailureKind::UpstreamError);
        assert_eq!(upstream.to_string(), "Confluence API error (500): boom");

        let cancelled = HandlerError::from(GatewayError::Cancelled);
        assert_eq!(cancelled.kind(), FailureKind::TransportFailure);

        let config = HandlerError::from(GatewayError::ConfigurationInvalid("x".into()));
        assert_eq!(config.kind(), FailureKind::ConfigurationInvalid);
    }

    #[test]
    fn other_failures_are_handler_errors() {
        assert_eq!(HandlerError::invalid("bad").kind(), FailureKind::HandlerError);
        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(HandlerError::from(json).kind(), FailureKind::HandlerError);
    }

    #[test]
    fn codes_are_snake_case() {
        assert_eq!(FailureKind::MissingArgument.code(), "missing_argument");
        assert_eq!(FailureKind::NotFound.code(), "not_found");
    }
}
