use crate::dav::{DavError, Protocol};
use crate::provider::Provider;

/// Fatal startup errors. Nothing is served when one of these occurs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set to a non-empty value")]
    MissingVariable(&'static str),

    #[error("unsupported provider '{0}', expected one of: fastmail, icloud")]
    UnsupportedProvider(String),

    #[error("account name '{0}' cannot be used in a server URL")]
    InvalidAccountName(String),

    #[error("failed to build DAV client: {0}")]
    Client(#[from] DavError),
}

/// Text used when an upstream failure carries no message of its own.
pub const UPSTREAM_DEFAULT_MESSAGE: &str = "the DAV server request failed";

/// Outcome of a failed tool handler. Always rendered into an error envelope,
/// never propagated past the registry.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{protocol} client is not initialized for provider {provider}")]
    ClientNotInitialized { protocol: Protocol, provider: Provider },

    #[error("{kind} not found: {url}")]
    NotFound { kind: &'static str, url: String },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{}", message.as_deref().unwrap_or(UPSTREAM_DEFAULT_MESSAGE))]
    Upstream { message: Option<String> },
}

impl ToolError {
    pub fn upstream(message: impl Into<String>) -> Self {
        let message = message.into();
        ToolError::Upstream {
            message: (!message.trim().is_empty()).then_some(message),
        }
    }
}

impl From<DavError> for ToolError {
    fn from(err: DavError) -> Self {
        ToolError::upstream(err.to_string())
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::upstream(format!("failed to encode result: {err}"))
    }
}

/// A `tools/call` request the dispatcher refused before running any handler.
/// Reported as a JSON-RPC error, not as an error envelope.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for tool {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
}

/// Convenience type alias for tool handlers.
pub type ToolResult<T> = Result<T, ToolError>;
