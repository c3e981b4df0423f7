//! Pulsar websocket event stream for industry (Custom) projects.
//!
//! Industry projects can consume device events from a Pulsar topic over a
//! websocket instead of MQTT. The consumer authenticates with the project's
//! access id and a password derived from the access secret, receives JSON
//! frames whose `payload` wraps an AES-ECB encrypted event, and acknowledges
//! every frame by `messageId`. The connection is kept alive with pings and
//! re-established with exponential backoff.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tuyalink_api::pulsar::{PulsarClient, PulsarEndpoint, PulsarMessage, PulsarTopic};
//!
//! let pulsar = PulsarClient::new(
//!     "access-id",
//!     access_secret,
//!     &PulsarEndpoint::America.url()?,
//!     PulsarTopic::Prod,
//! )?;
//! pulsar.add_message_listener(Arc::new(|msg: &PulsarMessage| {
//!     println!("{}: {}", msg.message_id, msg.data);
//! }));
//! pulsar.start();
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures_util::{SinkExt, StreamExt};
use md5::{Digest, Md5};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::listeners::{ListenerId, ListenerSet};
use crate::mq::decode::{DecodeError, decrypt_ecb, derive_key};
use crate::mq::{Backoff, BackoffConfig};

/// Consumer options appended to the topic URL.
const CONSUMER_QUERY: &str = "ackTimeoutMillis=3000&subscriptionType=Failover";

// ── Endpoints and topics ─────────────────────────────────────────────

/// Regional Pulsar websocket gateways.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulsarEndpoint {
    China,
    America,
    Europe,
    India,
}

impl PulsarEndpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::China => "wss://mqe.tuyacn.com:8285/",
            Self::America => "wss://mqe.tuyaus.com:8285/",
            Self::Europe => "wss://mqe.tuyaeu.com:8285/",
            Self::India => "wss://mqe.tuyain.com:8285/",
        }
    }

    pub fn url(self) -> Result<Url, Error> {
        Ok(Url::parse(self.as_str())?)
    }
}

/// Event topic: production traffic or the platform's test channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulsarTopic {
    Prod,
    Test,
}

impl PulsarTopic {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prod => "event",
            Self::Test => "event-test",
        }
    }
}

// ── Settings ─────────────────────────────────────────────────────────

/// Tuning for the Pulsar consumer.
#[derive(Debug, Clone)]
pub struct PulsarSettings {
    /// Backoff between failed connections. Default: 1s doubling to 60s.
    pub backoff: BackoffConfig,

    /// Interval between websocket pings. Default: 30s.
    pub ping_interval: Duration,

    /// Consecutive failed connections before giving up.
    /// `None` retries forever. Default: 1000.
    pub max_retries: Option<u32>,
}

impl Default for PulsarSettings {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            ping_interval: Duration::from_secs(30),
            max_retries: Some(1000),
        }
    }
}

// ── Messages ─────────────────────────────────────────────────────────

/// A decrypted event from the Pulsar topic.
#[derive(Debug, Clone, PartialEq)]
pub struct PulsarMessage {
    /// Pulsar message id, already acknowledged.
    pub message_id: String,
    pub protocol: i64,
    pub t: i64,
    /// Decrypted event body.
    pub data: Value,
}

/// Receives every decrypted Pulsar event, in delivery order.
pub trait PulsarListener: Send + Sync {
    fn on_message(&self, message: &PulsarMessage);
}

impl<F> PulsarListener for F
where
    F: Fn(&PulsarMessage) + Send + Sync,
{
    fn on_message(&self, message: &PulsarMessage) {
        self(message);
    }
}

#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(rename = "messageId")]
    message_id: String,
    #[serde(default)]
    payload: String,
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(default)]
    protocol: i64,
    #[serde(default)]
    t: i64,
    data: String,
}

/// Websocket password: chars 8..24 of `md5(access_id + md5(access_secret))`.
pub fn consumer_password(access_id: &str, access_secret: &str) -> String {
    let secret_hash = hex::encode(Md5::digest(access_secret.as_bytes()));
    let mixed = hex::encode(Md5::digest(format!("{access_id}{secret_hash}").as_bytes()));
    mixed[8..24].to_owned()
}

/// `{base}ws/v2/consumer/persistent/{id}/out/{topic}/{id}-sub?...`
pub fn consumer_url(base: &Url, access_id: &str, topic: PulsarTopic) -> Result<Url, Error> {
    let mut url = base.join(&format!(
        "ws/v2/consumer/persistent/{access_id}/out/{}/{access_id}-sub",
        topic.as_str()
    ))?;
    url.set_query(Some(CONSUMER_QUERY));
    Ok(url)
}

/// Decode one frame's base64 `payload` into its event, decrypting `data`
/// with bytes 8..24 of the access secret.
fn decode_payload(payload: &str, access_secret: &str) -> Result<(i64, i64, Value), DecodeError> {
    let raw = STANDARD.decode(payload)?;
    let envelope: EventEnvelope =
        serde_json::from_slice(&raw).map_err(|e| DecodeError::Envelope(e.to_string()))?;
    let key = derive_key(access_secret)?;
    let plain = decrypt_ecb(key, &envelope.data)?;
    let text = String::from_utf8_lossy(&plain);
    let data = serde_json::from_str(text.trim())?;
    Ok((envelope.protocol, envelope.t, data))
}

// ── PulsarClient ─────────────────────────────────────────────────────

/// Long-lived consumer of a project's Pulsar event topic.
pub struct PulsarClient {
    inner: Arc<Inner>,
}

struct Inner {
    url: Url,
    access_id: String,
    password: String,
    access_secret: SecretString,
    settings: PulsarSettings,
    listeners: ListenerSet<dyn PulsarListener>,
    state: Mutex<RunState>,
}

#[derive(Default)]
struct RunState {
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl PulsarClient {
    /// `endpoint` is the gateway root, e.g. [`PulsarEndpoint::America`].
    pub fn new(
        access_id: impl Into<String>,
        access_secret: SecretString,
        endpoint: &Url,
        topic: PulsarTopic,
    ) -> Result<Self, Error> {
        Self::with_settings(access_id, access_secret, endpoint, topic, PulsarSettings::default())
    }

    pub fn with_settings(
        access_id: impl Into<String>,
        access_secret: SecretString,
        endpoint: &Url,
        topic: PulsarTopic,
        settings: PulsarSettings,
    ) -> Result<Self, Error> {
        let access_id = access_id.into();
        let url = consumer_url(endpoint, &access_id, topic)?;
        let password = consumer_password(&access_id, access_secret.expose_secret());
        Ok(Self {
            inner: Arc::new(Inner {
                url,
                access_id,
                password,
                access_secret,
                settings,
                listeners: ListenerSet::new(),
                state: Mutex::new(RunState::default()),
            }),
        })
    }

    pub fn consumer_url(&self) -> &Url {
        &self.inner.url
    }

    /// Spawn the connect/read loop. No-op if already running.
    pub fn start(&self) {
        let mut state = self.inner.lock_state();
        if state.cancel.as_ref().is_some_and(|c| !c.is_cancelled()) {
            debug!("pulsar consumer already running");
            return;
        }

        let cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let task_cancel = cancel.clone();
        state.task = Some(tokio::spawn(async move {
            ws_loop(&inner, &task_cancel).await;
        }));
        state.cancel = Some(cancel);
        info!(url = %self.inner.url, "pulsar consumer started");
    }

    /// Stop the loop and drop all listeners. Idempotent.
    pub async fn stop(&self) {
        self.inner.listeners.clear();
        let (cancel, task) = {
            let mut state = self.inner.lock_state();
            (state.cancel.take(), state.task.take())
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "pulsar task ended abnormally");
            }
            info!("pulsar consumer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .lock_state()
            .cancel
            .as_ref()
            .is_some_and(|c| !c.is_cancelled())
    }

    pub fn add_message_listener(&self, listener: Arc<dyn PulsarListener>) -> ListenerId {
        self.inner.listeners.add(listener)
    }

    pub fn remove_message_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }
}

impl Drop for PulsarClient {
    fn drop(&mut self) {
        if let Some(cancel) = self.inner.lock_state().cancel.take() {
            cancel.cancel();
        }
    }
}

impl Inner {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decode a text frame and notify listeners. Returns the message id to
    /// acknowledge; frames that carry one are acked even if undecodable.
    fn handle_frame(&self, text: &str) -> Option<String> {
        let frame: Frame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "dropping unparseable pulsar frame");
                return None;
            }
        };

        match decode_payload(&frame.payload, self.access_secret.expose_secret()) {
            Ok((protocol, t, data)) => {
                let message = PulsarMessage {
                    message_id: frame.message_id.clone(),
                    protocol,
                    t,
                    data,
                };
                debug!(message_id = %message.message_id, protocol, "pulsar message received");
                self.listeners.notify(|l| l.on_message(&message));
            }
            Err(e) => debug!(message_id = %frame.message_id, error = %e, "undecodable pulsar message"),
        }
        Some(frame.message_id)
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn ws_loop(inner: &Inner, cancel: &CancellationToken) {
    let mut backoff = Backoff::new(inner.settings.backoff.clone());

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(inner, cancel) => result,
        };

        match result {
            Ok(()) => {
                if cancel.is_cancelled() {
                    break;
                }
                info!("pulsar websocket closed, reconnecting");
                backoff.reset();
            }
            Err(e) => {
                if let Some(max) = inner.settings.max_retries {
                    if backoff.attempt() >= max {
                        warn!(max_retries = max, "pulsar reconnection limit reached, giving up");
                        cancel.cancel();
                        break;
                    }
                }
                let delay = backoff.next_delay();
                warn!(
                    error = %e,
                    attempt = backoff.attempt(),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "pulsar connection failed, backing off"
                );

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
    debug!("pulsar loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Open one websocket, read and ack frames until it drops.
async fn connect_and_read(inner: &Inner, cancel: &CancellationToken) -> Result<(), Error> {
    debug!(url = %inner.url, "connecting to pulsar");

    let uri: tungstenite::http::Uri = inner
        .url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;
    let request = ClientRequestBuilder::new(uri)
        .with_header("username", inner.access_id.clone())
        .with_header("password", inner.password.clone());

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
    info!("pulsar websocket connected");

    let (mut write, mut read) = ws_stream.split();
    let mut ping = tokio::time::interval(inner.settings.ping_interval);
    ping.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                if let Err(e) = write.close().await {
                    debug!(error = %e, "pulsar close handshake failed");
                }
                return Ok(());
            }
            _ = ping.tick() => {
                write
                    .send(tungstenite::Message::Ping(Vec::new().into()))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            frame = read.next() => match frame {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    if let Some(message_id) = inner.handle_frame(text.as_str()) {
                        let ack = json!({ "messageId": message_id }).to_string();
                        write
                            .send(tungstenite::Message::text(ack))
                            .await
                            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
                    }
                }
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    match frame {
                        Some(cf) => info!(code = %cf.code, reason = %cf.reason, "pulsar close frame received"),
                        None => info!("pulsar close frame received"),
                    }
                    return Ok(());
                }
                Some(Ok(_)) => trace!("pulsar control frame"),
                Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                None => {
                    info!("pulsar stream ended");
                    return Ok(());
                }
            },
        }
    }
}
