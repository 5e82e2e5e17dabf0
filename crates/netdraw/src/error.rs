//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use netdraw_config::ConfigError;
use netdraw_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TESTS_FAILED: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(netdraw::connection_failed),
        help(
            "Check that the server is running and reachable.\n\
             Try: netdraw inventory hosts --insecure"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Session ended: {reason}")]
    #[diagnostic(code(netdraw::session_closed))]
    SessionClosed { reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(netdraw::auth_failed),
        help("Store a fresh token with: netdraw config set-token --profile {profile}")
    )]
    AuthFailed { profile: String, message: String },

    #[error("No token configured for profile '{profile}'")]
    #[diagnostic(
        code(netdraw::no_credentials),
        help(
            "Store one with: netdraw config set-token\n\
             Or set the NETDRAW_TOKEN environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Server / API ─────────────────────────────────────────────────

    #[error("Server rejected the request: {message}")]
    #[diagnostic(code(netdraw::server_error))]
    Server { message: String },

    #[error("API error{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    #[diagnostic(code(netdraw::api_error))]
    Api { status: Option<u16>, message: String },

    #[error("{resource} not found")]
    #[diagnostic(code(netdraw::not_found))]
    NotFound { resource: String },

    // ── Replay ───────────────────────────────────────────────────────

    #[error("{failed} of {total} test(s) did not pass")]
    #[diagnostic(code(netdraw::tests_failed))]
    TestsFailed { failed: usize, total: usize },

    #[error("Cannot read {path}: {reason}")]
    #[diagnostic(
        code(netdraw::invalid_file),
        help("Expected a JSON test case, an array of test cases, or a snapshot.")
    )]
    InvalidFile { path: String, reason: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(netdraw::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(netdraw::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No server configured")]
    #[diagnostic(
        code(netdraw::no_config),
        help(
            "Pass --server and --inventory, or add a profile to\n\
             {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {0}")]
    #[diagnostic(code(netdraw::config))]
    Config(String),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(netdraw::json))]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML: {0}")]
    #[diagnostic(code(netdraw::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::SessionClosed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::TestsFailed { .. } => exit_code::TESTS_FAILED,
            Self::Validation { .. } | Self::NoConfig { .. } | Self::InvalidFile { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },
            CoreError::SessionClosed => CliError::SessionClosed {
                reason: "the session task stopped".into(),
            },
            CoreError::Server { message } => CliError::Server { message },
            CoreError::Api {
                status: Some(404),
                message,
            } => CliError::NotFound { resource: message },
            CoreError::Api { status, message } => CliError::Api { status, message },
            CoreError::NotFound { entity_type, id } => CliError::NotFound {
                resource: format!("{entity_type} {id}"),
            },
            CoreError::Config { message } => CliError::Config(message),
            CoreError::InvalidDocument { path, message } => CliError::InvalidFile {
                path,
                reason: message,
            },
            CoreError::InvalidTest { message } | CoreError::MalformedFrame { message } => {
                CliError::Validation {
                    field: "input".into(),
                    reason: message,
                }
            }
            other => CliError::Api {
                status: None,
                message: other.to_string(),
            },
        }
    }
}

impl From<netdraw_api::Error> for CliError {
    fn from(err: netdraw_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                name: profile,
                available: "(none)".into(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(other.to_string()),
        }
    }
}
