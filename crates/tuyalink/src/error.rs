//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use tuyalink_config::ConfigError;
use tuyalink_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {target}")]
    #[diagnostic(
        code(tuyalink::connection_failed),
        help("Check the profile's endpoint region and your network connection.\n{reason}")
    )]
    ConnectionFailed { target: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(tuyalink::auth_failed),
        help(
            "Verify the access id/secret and the account credentials.\n\
             Store a secret with: tuyalink config set-secret password"
        )
    )]
    AuthFailed { message: String },

    #[error("No {what} configured for profile '{profile}'")]
    #[diagnostic(
        code(tuyalink::no_credentials),
        help(
            "Set it in the profile, point `{env_hint}` at an environment variable,\n\
             or run: tuyalink config set-secret"
        )
    )]
    NoCredentials {
        profile: String,
        what: String,
        env_hint: String,
    },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Device '{identifier}' not found")]
    #[diagnostic(
        code(tuyalink::not_found),
        help("Run: tuyalink devices list to see available devices")
    )]
    DeviceNotFound { identifier: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error ({code}): {message}")]
    #[diagnostic(code(tuyalink::api_error))]
    ApiError { code: String, message: String },

    #[error("Device '{device}' rejected the command")]
    #[diagnostic(code(tuyalink::command_rejected))]
    CommandRejected { device: String },

    #[error("Scene '{scene}' did not run")]
    #[diagnostic(code(tuyalink::scene_rejected))]
    SceneRejected { scene: String },

    #[error("{message}")]
    #[diagnostic(
        code(tuyalink::unsupported),
        help("Check the profile's `mode`; scenes and infrared remotes need a smart_home account.")
    )]
    Unsupported { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tuyalink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(tuyalink::profile_not_found),
        help("Expected a [profiles.{name}] table in {path}")
    )]
    ProfileNotFound { name: String, path: String },

    #[error(transparent)]
    #[diagnostic(code(tuyalink::config))]
    Config(Box<figment::Error>),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(tuyalink::timeout),
        help("Increase timeout with --timeout or check the endpoint region.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(tuyalink::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::DeviceNotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::Unsupported { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { target, reason } => {
                CliError::ConnectionFailed { target, reason }
            }
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::DeviceNotFound { identifier } => CliError::DeviceNotFound { identifier },
            CoreError::Api { message, code } => CliError::ApiError {
                code: code.map_or_else(|| "-".into(), |c| c.to_string()),
                message,
            },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Unsupported { message } => CliError::Unsupported { message },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile(name) => CliError::ProfileNotFound {
                name,
                path: tuyalink_config::config_path().display().to_string(),
            },
            ConfigError::NoCredentials { profile, what } => CliError::NoCredentials {
                env_hint: if what == "password" {
                    "password_env".into()
                } else {
                    "access_secret_env".into()
                },
                profile,
                what: what.into(),
            },
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
            ConfigError::Serialization(e) => CliError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_operations_are_usage_errors() {
        let err = CliError::from(CoreError::Unsupported {
            message: "scene trigger is not available for custom accounts".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
        assert!(err.to_string().contains("custom accounts"));
    }

    #[test]
    fn broken_output_pipe_is_a_general_failure() {
        let err = CliError::from(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }
}
