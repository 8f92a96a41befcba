use thiserror::Error;

/// Failure of a single upstream call, before or after it reached the wire.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The deployment profile is incomplete; the call never reached transport.
    #[error("{0}")]
    ConfigurationInvalid(String),
    /// Non-2xx response. The body is kept verbatim for diagnosis.
    #[error("Confluence API error ({status}): {body}")]
    Upstream { status: u16, body: String },
    /// Connection, DNS, TLS or timeout failure.
    #[error("{0}")]
    Transport(String),
    /// The caller cancelled the call while it was in flight.
    #[error("request cancelled")]
    Cancelled,
    /// A 2xx payload could not be decoded into the expected shape.
    #[error("unexpected response from Confluence: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Machine-readable failure codes surfaced in log events and result payloads.
pub mod codes {
    pub const CONFIGURATION_INVALID: &str = "configuration_invalid";
    pub const UPSTREAM_ERROR: &str = "upstream_error";
    pub const TRANSPORT_FAILURE: &str = "transport_failure";
    pub const BAD_ARGUMENT: &str = "bad_argument";
    pub const MISSING_ARGUMENT: &str = "missing_argument";
    pub const NOT_FOUND: &str = "not_found";
    pub const HANDLER_ERROR: &str = "handler_error";
}
