// Open API HTTP client
//
// Wraps `reqwest::Client` with request signing, the `{success, code, msg,
// result}` envelope, and credential lifecycle: login, proactive refresh
// ahead of expiry, and re-login when the platform reports the access token
// invalid. Endpoint groups (devices, assets, broker config) are implemented
// as inherent methods in separate files.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{TimeDelta, Utc};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::{Credential, Identity, TokenResult};
use crate::error::Error;
use crate::mode::{AccountMode, RefreshMethod};
use crate::models::ApiResponse;
use crate::redact::redact;
use crate::sign::{self, SIGN_METHOD};
use crate::transport::TransportConfig;

/// Platform error code meaning "access token invalid".
pub const TOKEN_INVALID_CODE: i64 = 1010;

/// Refresh the credential when it expires within this many seconds.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Query parameters, kept sorted for signing.
pub type Query = BTreeMap<String, String>;

/// Authenticated session against the open API.
///
/// Produces a validly signed request for any path and keeps the
/// [`Credential`] usable without caller intervention. Safe to share
/// behind an `Arc`; the credential is swapped atomically.
pub struct OpenApiClient {
    http: reqwest::Client,
    endpoint: Url,
    access_id: String,
    access_secret: SecretString,
    mode: AccountMode,
    lang: String,
    dev_channel: String,
    credential: ArcSwapOption<Credential>,
    /// Last identity passed to `connect`, replayed on token invalidation.
    identity: ArcSwapOption<Identity>,
    /// Serializes refreshes so concurrent callers don't all hit the endpoint.
    refresh_lock: Mutex<()>,
}

impl OpenApiClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `endpoint` is the regional API root, e.g. `https://openapi.tuyaus.com`.
    pub fn new(
        endpoint: Url,
        access_id: impl Into<String>,
        access_secret: SecretString,
        mode: AccountMode,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, endpoint, access_id, access_secret, mode))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        endpoint: Url,
        access_id: impl Into<String>,
        access_secret: SecretString,
        mode: AccountMode,
    ) -> Self {
        Self {
            http,
            endpoint,
            access_id: access_id.into(),
            access_secret,
            mode,
            lang: "en".into(),
            dev_channel: String::new(),
            credential: ArcSwapOption::empty(),
            identity: ArcSwapOption::empty(),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Set the `lang` header sent with every request.
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    /// Set the `dev_channel` header sent with login and refresh calls.
    pub fn with_dev_channel(mut self, channel: impl Into<String>) -> Self {
        self.dev_channel = channel.into();
        self
    }

    pub fn mode(&self) -> AccountMode {
        self.mode
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Snapshot of the current credential, if logged in.
    pub fn credential(&self) -> Option<Arc<Credential>> {
        self.credential.load_full()
    }

    /// Account uid of the current credential.
    pub fn uid(&self) -> Option<String> {
        self.credential.load().as_ref().map(|c| c.uid().to_owned())
    }

    pub fn is_connected(&self) -> bool {
        self.credential
            .load()
            .as_ref()
            .is_some_and(|c| c.has_access_token())
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Log in with `identity` and store the resulting credential.
    ///
    /// The login endpoint and password hashing depend on the account mode.
    /// The identity is remembered for automatic re-login.
    pub async fn connect(&self, identity: Identity) -> Result<(), Error> {
        let password = self.mode.hash_password(identity.password.expose_secret());
        let body = if self.mode.sends_country_and_schema() {
            json!({
                "username": identity.username,
                "password": password,
                "country_code": identity.country_code,
                "schema": identity.schema,
            })
        } else {
            json!({
                "username": identity.username,
                "password": password,
            })
        };
        self.identity.store(Some(Arc::new(identity)));

        let path = self.mode.login_path();
        let token = self.current_access_token();
        let raw = self
            .execute(Method::POST, path, &Query::new(), Some(&body), &token)
            .await?;
        let envelope = parse_envelope(raw)?;

        if !envelope.success {
            return Err(Error::Authentication {
                code: envelope.code.unwrap_or_default(),
                message: envelope.msg.unwrap_or_else(|| "login rejected".into()),
            });
        }

        let result: TokenResult = decode_result(envelope.result)?;
        self.credential
            .store(Some(Arc::new(Credential::from_token_result(envelope.t, result))));
        info!(mode = ?self.mode, "logged in");
        Ok(())
    }

    /// Re-run `connect` with the last identity.
    pub async fn force_reconnect(&self) -> Result<(), Error> {
        let identity = self.identity.load_full().ok_or(Error::NotConnected)?;
        self.connect((*identity).clone()).await
    }

    /// Drop the current credential. The remembered identity is kept.
    pub fn clear_credential(&self) {
        self.credential.store(None);
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Send a signed request and return the parsed envelope.
    ///
    /// Refreshes the credential first when it is about to expire. When the
    /// platform answers with [`TOKEN_INVALID_CODE`] the credential is dropped
    /// and the session re-established, and [`Error::TokenInvalid`] is
    /// returned; the request is not retried.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &Query,
        body: Option<&Value>,
    ) -> Result<ApiResponse, Error> {
        let token_path = self.mode.is_token_path(path);
        if !token_path {
            self.refresh_if_needed().await?;
        }

        let token = self.current_access_token();
        let raw = self.execute(method, path, query, body, &token).await?;
        let envelope = parse_envelope(raw)?;

        if envelope.code == Some(TOKEN_INVALID_CODE) && !token_path {
            warn!("access token rejected by platform, re-authenticating");
            self.credential.store(None);
            if let Err(e) = self.force_reconnect().await {
                warn!(error = %e, "re-login after token invalidation failed");
            }
            return Err(Error::TokenInvalid);
        }

        Ok(envelope)
    }

    /// Send a GET request and deserialize the envelope's `result`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &Query) -> Result<T, Error> {
        self.request(Method::GET, path, query, None).await?.into_result()
    }

    /// Send a POST request with JSON body and deserialize `result`.
    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: Option<&Value>) -> Result<T, Error> {
        self.request(Method::POST, path, &Query::new(), body)
            .await?
            .into_result()
    }

    /// Send a PUT request with JSON body and deserialize `result`.
    pub async fn put<T: DeserializeOwned>(&self, path: &str, body: Option<&Value>) -> Result<T, Error> {
        self.request(Method::PUT, path, &Query::new(), body)
            .await?
            .into_result()
    }

    /// Send a DELETE request and deserialize `result`.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str, query: &Query) -> Result<T, Error> {
        self.request(Method::DELETE, path, query, None)
            .await?
            .into_result()
    }

    // ── Credential refresh ───────────────────────────────────────────

    async fn refresh_if_needed(&self) -> Result<(), Error> {
        let margin = TimeDelta::seconds(REFRESH_MARGIN_SECS);
        let needs_refresh = |cred: &Option<Arc<Credential>>| {
            cred.as_ref()
                .is_some_and(|c| c.expires_within(margin, Utc::now()))
        };

        if !needs_refresh(&self.credential.load_full()) {
            return Ok(());
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        let current = self.credential.load_full();
        if !needs_refresh(&current) {
            return Ok(());
        }
        let Some(cred) = current else {
            return Ok(());
        };

        debug!(expires_at = %cred.expires_at(), "refreshing access token");
        let path = format!(
            "{}{}",
            self.mode.refresh_prefix(),
            cred.refresh_token().expose_secret()
        );
        let method = match self.mode.refresh_method() {
            RefreshMethod::Get => Method::GET,
            RefreshMethod::Post => Method::POST,
        };

        // The refresh call is signed without an access token.
        let raw = self.execute(method, &path, &Query::new(), None, "").await?;
        let envelope = parse_envelope(raw)?;
        if !envelope.success {
            return Err(Error::Authentication {
                code: envelope.code.unwrap_or_default(),
                message: envelope
                    .msg
                    .unwrap_or_else(|| "token refresh rejected".into()),
            });
        }

        let result: TokenResult = decode_result(envelope.result)?;
        self.credential
            .store(Some(Arc::new(Credential::from_token_result(envelope.t, result))));
        debug!("access token refreshed");
        Ok(())
    }

    fn current_access_token(&self) -> String {
        self.credential
            .load()
            .as_ref()
            .map(|c| c.access_token().expose_secret().to_owned())
            .unwrap_or_default()
    }

    // ── Transport ────────────────────────────────────────────────────

    /// Sign and send one request, returning the raw JSON body.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &Query,
        body: Option<&Value>,
        access_token: &str,
    ) -> Result<Value, Error> {
        // An absent or empty-object body is signed as the empty string.
        let sent_body = body.map(Value::to_string);
        let signed_body = match body {
            Some(Value::Object(map)) if map.is_empty() => "",
            Some(_) => sent_body.as_deref().unwrap_or_default(),
            None => "",
        };

        let timestamp = Utc::now().timestamp_millis();
        let canonical = sign::canonical_string(method.as_str(), path, query, signed_body);
        let signature = sign::sign(
            self.access_secret.expose_secret(),
            &self.access_id,
            access_token,
            timestamp,
            &canonical,
        )?;

        let url = self.endpoint.join(path)?;
        let token_path = self.mode.is_token_path(path);
        let log_path = if path.starts_with(self.mode.refresh_prefix()) {
            format!("{}***", self.mode.refresh_prefix())
        } else {
            path.to_owned()
        };
        let logged_body = body.map_or(Value::Null, redact);
        debug!(
            %method,
            path = %log_path,
            query = ?query,
            body = %logged_body,
            "request"
        );

        let mut builder = self
            .http
            .request(method, url)
            .header("client_id", &self.access_id)
            .header("sign", signature)
            .header("sign_method", SIGN_METHOD)
            .header("access_token", access_token)
            .header("t", timestamp.to_string())
            .header("lang", &self.lang);

        if token_path {
            builder = builder
                .header("dev_lang", "rust")
                .header("dev_version", env!("CARGO_PKG_VERSION"))
                .header("dev_channel", &self.dev_channel);
        }
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(text) = sent_body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(text);
        }

        let resp = builder.send().await.map_err(Error::Transport)?;
        let status = resp.status();
        let text = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            warn!(%status, path = %log_path, "HTTP error from open API");
            return Err(Error::Api {
                code: i64::from(status.as_u16()),
                message: format!("HTTP {status}: {}", truncate(&text, 200)),
            });
        }

        let value: Value = serde_json::from_str(&text).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", truncate(&text, 200)),
            body: text.clone(),
        })?;
        debug!(response = %redact(&value), "response");
        Ok(value)
    }
}

fn parse_envelope(raw: Value) -> Result<ApiResponse, Error> {
    serde_json::from_value(raw.clone()).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: redact(&raw).to_string(),
    })
}

fn decode_result<T: DeserializeOwned>(result: Option<Value>) -> Result<T, Error> {
    let value = result.unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: String::new(),
    })
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
