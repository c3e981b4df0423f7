// ── Core error types ──
//
// User-facing errors from tuyalink-core. Consumers never see signing
// details, envelope parse failures or MQTT internals directly. The
// `From<tuyalink_api::Error>` impl translates transport-layer errors into
// domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {target}: {reason}")]
    ConnectionFailed { target: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// Platform error code from the response envelope, or the HTTP
        /// status for transport-level failures.
        code: Option<i64>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether retrying the operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. } | Self::Timeout { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<tuyalink_api::Error> for CoreError {
    fn from(err: tuyalink_api::Error) -> Self {
        use tuyalink_api::Error as ApiError;

        match err {
            ApiError::Authentication { code, message } => CoreError::AuthenticationFailed {
                message: format!("{message} (code {code})"),
            },
            ApiError::TokenInvalid => CoreError::AuthenticationFailed {
                message: "Access token invalid -- session re-established, retry the request".into(),
            },
            ApiError::NotConnected => CoreError::AuthenticationFailed {
                message: "Not logged in".into(),
            },
            ApiError::BrokerRejected => CoreError::AuthenticationFailed {
                message: "Broker rejected the issued credentials".into(),
            },
            ApiError::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        target: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        code: e.status().map(|s| i64::from(s.as_u16())),
                    }
                }
            }
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ApiError::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            ApiError::Api { code, message } => CoreError::Api {
                message,
                code: Some(code),
            },
            ApiError::Pagination(message) => CoreError::Api {
                message,
                code: None,
            },
            ApiError::ConfigFetch { message } => CoreError::ConnectionFailed {
                target: "broker".into(),
                reason: format!("access config: {message}"),
            },
            ApiError::BrokerConnect(reason) => CoreError::ConnectionFailed {
                target: "broker".into(),
                reason,
            },
            ApiError::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                target: "pulsar".into(),
                reason,
            },
            ApiError::Unsupported { operation, mode } => CoreError::Unsupported {
                message: format!("{operation} is not available for {mode} accounts"),
            },
            ApiError::Signing(message) => CoreError::Config {
                message: format!("Access secret unusable for signing: {message}"),
            },
            ApiError::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
