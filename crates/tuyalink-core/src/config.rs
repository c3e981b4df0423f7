// ── Runtime connection configuration ──
//
// Describes *how* to reach the platform and *who* to log in as. Carries
// credential data but never touches disk; the CLI builds a
// `ConnectConfig` from a config profile and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use tuyalink_api::mq::MqSettings;
use tuyalink_api::{AccountMode, Identity, OpenApiClient, TransportConfig};

use crate::error::CoreError;

/// Everything needed to open a session.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Regional API root, e.g. `https://openapi.tuyaus.com`.
    pub endpoint: Url,
    pub access_id: String,
    pub access_secret: SecretString,
    pub mode: AccountMode,
    pub identity: Identity,
    /// `lang` header value.
    pub lang: String,
    /// HTTP request timeout.
    pub timeout: Duration,
    pub mq: MqSettings,
}

impl ConnectConfig {
    pub fn new(
        endpoint: Url,
        access_id: impl Into<String>,
        access_secret: SecretString,
        mode: AccountMode,
        identity: Identity,
    ) -> Self {
        Self {
            endpoint,
            access_id: access_id.into(),
            access_secret,
            mode,
            identity,
            lang: "en".into(),
            timeout: Duration::from_secs(30),
            mq: MqSettings::default(),
        }
    }

    /// Build an unauthenticated API client from this config.
    pub fn build_client(&self) -> Result<OpenApiClient, CoreError> {
        let transport = TransportConfig::default().with_timeout(self.timeout);
        let client = OpenApiClient::new(
            self.endpoint.clone(),
            self.access_id.clone(),
            self.access_secret.clone(),
            self.mode,
            &transport,
        )?
        .with_lang(self.lang.clone())
        .with_dev_channel(concat!("tuyalink/", env!("CARGO_PKG_VERSION")));
        Ok(client)
    }
}
