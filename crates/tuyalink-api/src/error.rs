use thiserror::Error;

/// Top-level error type for the `tuyalink-api` crate.
///
/// Covers every failure mode across the API surfaces: authentication,
/// signed REST transport, broker config, MQTT and the Pulsar websocket. `tuyalink-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected by the platform (bad credentials, wrong schema, etc.)
    #[error("Authentication failed (code {code}): {message}")]
    Authentication { code: i64, message: String },

    /// The platform reported the access token invalid. The session has
    /// been re-established, but the request itself was not retried.
    #[error("Access token invalid -- session re-established, re-issue the request")]
    TokenInvalid,

    /// A request needing a credential was issued before `connect`.
    #[error("Not connected -- call connect() first")]
    NotConnected,

    /// The access secret could not key the request HMAC.
    #[error("Request signing failed: {0}")]
    Signing(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request or connect attempt timed out.
    #[error("Timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Platform API ────────────────────────────────────────────────
    /// Structured failure from the `{success, code, msg}` envelope.
    #[error("API error (code {code}): {message}")]
    Api { code: i64, message: String },

    /// Paginated listing returned inconsistent totals.
    #[error("Pagination error: {0}")]
    Pagination(String),

    /// The account mode has no endpoint for this operation.
    #[error("{operation} is not available for {mode} accounts")]
    Unsupported {
        operation: &'static str,
        mode: &'static str,
    },

    // ── Event channel ───────────────────────────────────────────────
    /// Broker configuration could not be fetched.
    #[error("Broker config fetch failed: {message}")]
    ConfigFetch { message: String },

    /// MQTT connection could not be established.
    #[error("Broker connection failed: {0}")]
    BrokerConnect(String),

    /// Broker refused the connection as not authorized.
    #[error("Broker rejected credentials (not authorized)")]
    BrokerRejected,

    /// Pulsar websocket could not be opened or dropped with an error.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the error came from the login flow or a
    /// token the platform no longer accepts.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::TokenInvalid | Self::NotConnected
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. }
            | Self::BrokerConnect(_)
            | Self::BrokerRejected
            | Self::WebSocketConnect(_)
            | Self::ConfigFetch { .. } => true,
            _ => false,
        }
    }

    /// Extract the platform error code, if available.
    pub fn api_code(&self) -> Option<i64> {
        match self {
            Self::Api { code, .. } | Self::Authentication { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::Timeout { timeout_secs: 10 }.is_transient());
        assert!(Error::BrokerRejected.is_transient());
        assert!(!Error::TokenInvalid.is_transient());
        assert!(
            !Error::Api {
                code: 1106,
                message: "permission deny".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn api_code_extraction() {
        let err = Error::Authentication {
            code: 2406,
            message: "skill id invalid".into(),
        };
        assert!(err.is_auth_error());
        assert_eq!(err.api_code(), Some(2406));
        assert_eq!(Error::NotConnected.api_code(), None);
    }
}
