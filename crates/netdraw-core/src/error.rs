// ── Core error types ──
//
// Errors surfaced by the editor core. Transport failures from
// netdraw-api are translated into session-level variants so hosts
// never match on HTTP or WebSocket details directly.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Session is not running")]
    SessionClosed,

    // ── Protocol errors ──────────────────────────────────────────────
    /// The server sent an `Error` frame; the current dispatch is aborted.
    #[error("Server error: {message}")]
    Server { message: String },

    /// A frame could not be decoded into a known message.
    #[error("Malformed frame: {message}")]
    MalformedFrame { message: String },

    // ── Dispatch errors ──────────────────────────────────────────────
    /// Redispatch or injection did not settle within the step bound.
    #[error("Dispatch did not settle after {steps} steps (last event: {event})")]
    DispatchLoop { steps: usize, event: &'static str },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: &'static str, id: u64 },

    // ── Documents and fixtures ───────────────────────────────────────
    /// A snapshot file could not be read, parsed or written.
    #[error("Invalid document {path}: {message}")]
    InvalidDocument { path: String, message: String },

    #[error("Invalid test case: {message}")]
    InvalidTest { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::MalformedFrame {
            message: err.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<netdraw_api::Error> for CoreError {
    fn from(err: netdraw_api::Error) -> Self {
        match err {
            netdraw_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            netdraw_api::Error::Transport(ref e) => {
                if e.is_connect() || e.is_timeout() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            netdraw_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            netdraw_api::Error::UnsupportedScheme { scheme } => CoreError::Config {
                message: format!("Unsupported URL scheme: {scheme}"),
            },
            netdraw_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            netdraw_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            netdraw_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            netdraw_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            netdraw_api::Error::SocketShutdown => CoreError::SessionClosed,
            netdraw_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
