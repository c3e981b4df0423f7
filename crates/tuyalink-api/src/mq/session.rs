use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::client::{OpenApiClient, Query};
use crate::error::Error;

/// Broker connection parameters handed out by the access-config endpoint.
///
/// Valid for `expire_time` seconds; the event client fetches a new one
/// before that elapses.
#[derive(Clone, Deserialize)]
pub struct BrokerSession {
    pub url: String,
    pub client_id: String,
    pub username: String,
    /// Also the source of the payload key (bytes 8..24).
    pub password: String,
    #[serde(default)]
    pub source_topic: HashMap<String, String>,
    #[serde(default)]
    pub sink_topic: HashMap<String, String>,
    /// Validity in seconds.
    #[serde(default)]
    pub expire_time: u64,
}

impl BrokerSession {
    pub fn validity(&self) -> Duration {
        Duration::from_secs(self.expire_time)
    }

    /// Host, port and TLS flag parsed from `url` (`ssl://host:8883`).
    pub(crate) fn endpoint(&self) -> Result<(String, u16, bool), Error> {
        let url = Url::parse(&self.url)?;
        let tls = matches!(url.scheme(), "ssl" | "mqtts");
        let host = url
            .host_str()
            .ok_or_else(|| Error::BrokerConnect(format!("broker URL has no host: {}", self.url)))?
            .to_owned();
        let port = url.port().unwrap_or(if tls { 8883 } else { 1883 });
        Ok((host, port, tls))
    }
}

impl fmt::Debug for BrokerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerSession")
            .field("url", &self.url)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &"***")
            .field("source_topic", &self.source_topic)
            .field("sink_topic", &self.sink_topic)
            .field("expire_time", &self.expire_time)
            .finish()
    }
}

impl OpenApiClient {
    /// Request broker credentials for `link_id`.
    ///
    /// A rejection by the platform (as opposed to a transport failure) is
    /// retried once after re-establishing the session.
    pub async fn fetch_broker_session(&self, link_id: &str) -> Result<BrokerSession, Error> {
        match self.request_broker_session(link_id).await {
            Ok(session) => Ok(session),
            Err(e) if is_rejection(&e) => {
                warn!(error = %e, "broker config rejected, re-authenticating");
                self.force_reconnect().await?;
                self.request_broker_session(link_id).await
            }
            Err(e) => Err(e),
        }
    }

    async fn request_broker_session(&self, link_id: &str) -> Result<BrokerSession, Error> {
        let uid = self.uid().ok_or(Error::NotConnected)?;
        let body = json!({
            "uid": uid,
            "link_id": link_id,
            "link_type": "mqtt",
            "topics": "device",
            "msg_encrypted_version": self.mode().encryption_version(),
        });

        let envelope = self
            .request(
                Method::POST,
                self.mode().mq_config_path(),
                &Query::new(),
                Some(&body),
            )
            .await?;
        if !envelope.success {
            return Err(Error::ConfigFetch {
                message: format!(
                    "code {}: {}",
                    envelope.code.unwrap_or_default(),
                    envelope.msg.as_deref().unwrap_or("rejected")
                ),
            });
        }

        let session: BrokerSession = envelope.into_result()?;
        debug!(session = ?session, "broker session issued");
        Ok(session)
    }
}

fn is_rejection(err: &Error) -> bool {
    matches!(
        err,
        Error::ConfigFetch { .. } | Error::TokenInvalid | Error::NotConnected
    )
}
