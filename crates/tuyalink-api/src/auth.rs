use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Login parameters, remembered so an invalidated session can be
/// re-established without the caller's help.
#[derive(Clone)]
pub struct Identity {
    pub username: String,
    pub password: SecretString,
    /// Country calling code (SmartHome only).
    pub country_code: String,
    /// App schema, e.g. `"smartlife"` (SmartHome only).
    pub schema: String,
}

impl Identity {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
            country_code: String::new(),
            schema: String::new(),
        }
    }

    pub fn with_country_code(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = country_code.into();
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .field("password", &"***")
            .field("country_code", &self.country_code)
            .field("schema", &self.schema)
            .finish()
    }
}

/// The access/refresh token pair currently authorizing REST calls.
///
/// Never mutated in place: login and refresh each build a new value.
pub struct Credential {
    access_token: SecretString,
    refresh_token: SecretString,
    expires_at: DateTime<Utc>,
    uid: String,
    platform_url: Option<String>,
}

impl Credential {
    pub fn new(
        access_token: SecretString,
        refresh_token: SecretString,
        expires_at: DateTime<Utc>,
        uid: impl Into<String>,
        platform_url: Option<String>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at,
            uid: uid.into(),
            platform_url,
        }
    }

    /// Build a credential from a token endpoint response.
    ///
    /// The expiry is anchored to the server timestamp `t` (ms) rather
    /// than the local clock.
    pub(crate) fn from_token_result(server_time_ms: i64, result: TokenResult) -> Self {
        let lifetime_secs = result.expire.or(result.expire_time).unwrap_or(0);
        let issued = DateTime::<Utc>::from_timestamp_millis(server_time_ms).unwrap_or_else(Utc::now);
        Self {
            access_token: SecretString::from(result.access_token),
            refresh_token: SecretString::from(result.refresh_token),
            expires_at: issued + TimeDelta::seconds(lifetime_secs),
            uid: result.uid,
            platform_url: result.platform_url.filter(|u| !u.is_empty()),
        }
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &SecretString {
        &self.refresh_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Regional platform URL returned by SmartHome logins.
    pub fn platform_url(&self) -> Option<&str> {
        self.platform_url.as_deref()
    }

    /// Whether the credential expires within `margin` of `now`.
    pub fn expires_within(&self, margin: TimeDelta, now: DateTime<Utc>) -> bool {
        self.expires_at - margin <= now
    }

    pub(crate) fn has_access_token(&self) -> bool {
        !self.access_token.expose_secret().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .field("expires_at", &self.expires_at)
            .field("uid", &"***")
            .field("platform_url", &self.platform_url)
            .finish()
    }
}

/// `result` payload of the login and refresh endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResult {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Lifetime in seconds (refresh responses).
    #[serde(default)]
    pub expire: Option<i64>,
    /// Lifetime in seconds (login responses).
    #[serde(default)]
    pub expire_time: Option<i64>,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub platform_url: Option<String>,
}
