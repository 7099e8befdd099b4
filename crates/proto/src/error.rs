use thiserror::Error;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration loading/validation error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Model gateway error.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Tool bridge error.
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Inbound request validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Internal protocol type error.
    #[error("Proto error: {0}")]
    Proto(#[from] ProtoError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was not provided.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A field has an invalid value and reason.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Filesystem read error.
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Toml(String),
}

/// Model gateway errors. Any of these aborts the current conversation loop.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Provider answered with a non-success status.
    #[error("{0}")]
    Api(String),

    /// Provider rejected the credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Provider throttled the request.
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Network-level failure before a response arrived.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider response schema/content was invalid.
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    /// Request could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Tool bridge errors
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// No tool server script path was configured.
    #[error("Tool server script path is not configured")]
    NotConfigured,

    /// Script path has an extension we cannot launch.
    #[error("Tool server script must be a .py or .js file: {0}")]
    UnsupportedScript(String),

    /// Child process could not be started.
    #[error("Failed to spawn tool server: {0}")]
    Spawn(String),

    /// Initialize handshake or tool listing failed.
    #[error("Tool server handshake failed: {0}")]
    Handshake(String),

    /// Operation requires a live connection.
    #[error("Tool bridge is not connected")]
    NotConnected,

    /// Reading from or writing to the child failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The tool server answered with a JSON-RPC error object.
    #[error("JSON-RPC error {code}: {message}")]
    Protocol { code: i64, message: String },

    /// A specific tool call failed.
    #[error("Tool '{tool}' failed: {reason}")]
    CallFailed { tool: String, reason: String },
}

/// Inbound request validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The conversation history has no messages.
    #[error("messages must not be empty")]
    EmptyHistory,

    /// A message carries no content.
    #[error("message {index} has empty content")]
    EmptyContent { index: usize },

    /// A tool result does not answer a tool use in the preceding assistant turn.
    #[error("message {index} has a tool result for unknown tool use '{tool_use_id}'")]
    UnpairedToolResult { index: usize, tool_use_id: String },

    /// The newest message is not a user turn.
    #[error("the last message must come from the user")]
    LastMessageNotUser,

    /// A required text field is blank.
    #[error("{0} must not be empty")]
    EmptyField(String),

    /// A field has an invalid value.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Internal proto errors
#[derive(Debug, Error)]
pub enum ProtoError {
    /// Invalid role string value.
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// Generic serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}
