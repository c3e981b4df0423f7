//! Encrypted MQTT event channel with credential rotation.
//!
//! [`MqClient`] fetches short-lived broker credentials through the
//! [`OpenApiClient`], keeps one MQTT connection alive, decrypts every
//! publish and hands the result to registered [`MessageListener`]s.
//!
//! The run loop rotates credentials before they expire: a new connection
//! is fully established (CONNACK received, topics subscribed) before the
//! previous one is closed. Failed cycles back off exponentially. A
//! `NotAuthorized` refusal triggers an immediate new session, both at
//! connect time and on a live connection; only a second refusal in a row
//! falls back to the backoff schedule.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tuyalink_api::mq::{MqClient, MqMessage};
//!
//! let mq = MqClient::new(Arc::clone(&api));
//! mq.add_message_listener(Arc::new(|msg: &MqMessage| {
//!     println!("protocol {}: {}", msg.protocol, msg.data);
//! }));
//! mq.start();
//! // ...
//! mq.stop().await;
//! ```

mod backoff;
pub(crate) mod decode;
mod session;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS,
    Transport,
};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::OpenApiClient;
use crate::error::Error;
use crate::listeners::{ListenerId, ListenerSet};

pub use backoff::{Backoff, BackoffConfig};
pub use decode::{DecodeError, MqMessage, decode_message};
pub use session::BrokerSession;

/// Sessions shorter than this are still kept for this long before rotating.
const MIN_SESSION_LIFETIME: Duration = Duration::from_secs(60);

/// Pause between polls after a transient connection error; rumqttc
/// reconnects on the next poll.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(1);

// ── MessageListener ──────────────────────────────────────────────────

/// Receives every decoded broker message, in delivery order.
///
/// Called on the delivery task; keep it short.
pub trait MessageListener: Send + Sync {
    fn on_message(&self, message: &MqMessage);
}

impl<F> MessageListener for F
where
    F: Fn(&MqMessage) + Send + Sync,
{
    fn on_message(&self, message: &MqMessage) {
        self(message);
    }
}

// ── MqSettings ───────────────────────────────────────────────────────

/// Tuning for the event client.
#[derive(Debug, Clone)]
pub struct MqSettings {
    /// Backoff between failed connect cycles. Default: 1s doubling to 60s.
    pub backoff: BackoffConfig,

    /// Bound on TCP/TLS connect plus CONNACK. Default: 10s.
    pub connect_timeout: Duration,

    /// MQTT keepalive. Default: 60s.
    pub keep_alive: Duration,

    /// How long before session expiry to rotate. Default: 60s.
    pub rotation_margin: Duration,

    /// rumqttc request channel capacity. Default: 10.
    pub channel_capacity: usize,
}

impl Default for MqSettings {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            connect_timeout: Duration::from_secs(10),
            keep_alive: Duration::from_secs(60),
            rotation_margin: Duration::from_secs(60),
            channel_capacity: 10,
        }
    }
}

// ── MqClient ─────────────────────────────────────────────────────────

/// Long-lived subscriber to the platform's device event topics.
pub struct MqClient {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<OpenApiClient>,
    settings: MqSettings,
    link_id: String,
    listeners: ListenerSet<dyn MessageListener>,
    /// Signalled by a delivery task when the broker refuses its credentials.
    rotate: Notify,
    next_connection: AtomicU64,
    state: Mutex<RunState>,
}

#[derive(Default)]
struct RunState {
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
    live: Option<Connection>,
}

/// One established MQTT connection and its delivery task.
struct Connection {
    id: u64,
    cancel: CancellationToken,
    _client: AsyncClient,
}

impl Connection {
    fn close(self) {
        self.cancel.cancel();
    }
}

impl MqClient {
    pub fn new(api: Arc<OpenApiClient>) -> Self {
        Self::with_settings(api, MqSettings::default())
    }

    pub fn with_settings(api: Arc<OpenApiClient>, settings: MqSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                settings,
                link_id: format!("tuyalink-rust.{}", uuid::Uuid::new_v4()),
                listeners: ListenerSet::new(),
                rotate: Notify::new(),
                next_connection: AtomicU64::new(1),
                state: Mutex::new(RunState::default()),
            }),
        }
    }

    /// Identifier sent with every broker config request. Fixed per client.
    pub fn link_id(&self) -> &str {
        &self.inner.link_id
    }

    pub fn api(&self) -> &Arc<OpenApiClient> {
        &self.inner.api
    }

    /// Spawn the connect/rotate loop. No-op if already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut state = self.inner.lock_state();
        if state.cancel.as_ref().is_some_and(|c| !c.is_cancelled()) {
            debug!("event client already running");
            return;
        }

        let cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let task_cancel = cancel.clone();
        state.task = Some(tokio::spawn(async move {
            run_loop(inner, task_cancel).await;
        }));
        state.cancel = Some(cancel);
        info!(link_id = %self.inner.link_id, "event client started");
    }

    /// Stop the loop, close the live connection and drop all listeners.
    ///
    /// Idempotent. Returns once the run loop has exited.
    pub async fn stop(&self) {
        self.inner.listeners.clear();
        let (cancel, task, live) = {
            let mut state = self.inner.lock_state();
            (state.cancel.take(), state.task.take(), state.live.take())
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(conn) = live {
            conn.close();
        }
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "event loop task ended abnormally");
            }
            info!("event client stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .lock_state()
            .cancel
            .as_ref()
            .is_some_and(|c| !c.is_cancelled())
    }

    /// Whether an MQTT connection is currently established.
    pub fn is_connected(&self) -> bool {
        self.inner.is_live()
    }

    pub fn add_message_listener(&self, listener: Arc<dyn MessageListener>) -> ListenerId {
        self.inner.listeners.add(listener)
    }

    pub fn remove_message_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }
}

impl Drop for MqClient {
    fn drop(&mut self) {
        let mut state = self.inner.lock_state();
        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }
        if let Some(conn) = state.live.take() {
            conn.close();
        }
    }
}

impl Inner {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `conn` the live connection and close its predecessor.
    fn install(&self, conn: Connection) {
        let previous = self.lock_state().live.replace(conn);
        if let Some(old) = previous {
            debug!("closing superseded broker connection");
            old.close();
        }
    }

    fn close_live(&self) {
        let live = self.lock_state().live.take();
        if let Some(conn) = live {
            conn.close();
        }
    }

    fn is_live(&self) -> bool {
        self.lock_state().live.is_some()
    }

    /// Close the live connection if it is still connection `id`.
    ///
    /// Returns `false` when `id` has already been superseded.
    fn retire(&self, id: u64) -> bool {
        let retired = {
            let mut state = self.lock_state();
            if state.live.as_ref().is_some_and(|c| c.id == id) {
                state.live.take()
            } else {
                None
            }
        };
        match retired {
            Some(conn) => {
                conn.close();
                true
            }
            None => false,
        }
    }

    fn dispatch(&self, payload: &[u8], password: &str) {
        match decode_message(payload, password, self.api.mode().payload_cipher()) {
            Ok(message) => {
                debug!(protocol = message.protocol, t = message.t, "message received");
                self.listeners.notify(|l| l.on_message(&message));
            }
            Err(e) => debug!(error = %e, "dropping undecodable message"),
        }
    }
}

// ── Background loop ──────────────────────────────────────────────────

async fn run_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    let shared = &inner;
    let token = &cancel;
    drive(
        &inner.settings,
        &inner.rotate,
        &cancel,
        move || connect_cycle(shared, token),
        || shared.is_live(),
    )
    .await;

    inner.close_live();
    debug!("event loop exiting");
}

/// Main loop: connect → wait for rotation; on error, backoff.
///
/// `connect` runs one full cycle and yields the session validity.
/// `is_live` reports whether the connection from the last successful cycle
/// is still installed; rotation signals arriving while it is are stale.
async fn drive<C, Fut>(
    settings: &MqSettings,
    rotate: &Notify,
    cancel: &CancellationToken,
    mut connect: C,
    is_live: impl Fn() -> bool,
) where
    C: FnMut() -> Fut,
    Fut: Future<Output = Result<Duration, Error>>,
{
    let mut backoff = Backoff::new(settings.backoff.clone());
    let mut rejected_last = false;

    loop {
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            outcome = connect() => outcome,
        };

        match outcome {
            Ok(validity) => {
                backoff.reset();
                rejected_last = false;
                let wait = validity
                    .saturating_sub(settings.rotation_margin)
                    .max(MIN_SESSION_LIFETIME);
                debug!(wait_secs = wait.as_secs(), "broker session established");

                if !wait_for_rotation(rotate, cancel, wait, &is_live).await {
                    return;
                }
            }
            Err(Error::BrokerRejected) if !rejected_last => {
                rejected_last = true;
                warn!("broker refused the issued credentials, requesting a new session");
            }
            Err(e) => {
                rejected_last = matches!(e, Error::BrokerRejected);
                let delay = backoff.next_delay();
                warn!(
                    error = %e,
                    attempt = backoff.attempt(),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "broker connect cycle failed, backing off"
                );

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

/// Sleep until the session is due for rotation or the broker refuses the
/// live connection. Returns `false` when cancelled.
async fn wait_for_rotation(
    rotate: &Notify,
    cancel: &CancellationToken,
    wait: Duration,
    is_live: &impl Fn() -> bool,
) -> bool {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return false,
            () = rotate.notified() => {
                if is_live() {
                    debug!("ignoring rotation signal from a superseded connection");
                    continue;
                }
                warn!("broker refused credentials, rotating early");
                return true;
            }
            () = tokio::time::sleep_until(deadline) => {
                info!("rotating broker session");
                return true;
            }
        }
    }
}

/// One full cycle: fresh session, connect, CONNACK, subscribe, swap.
///
/// Returns the session validity.
async fn connect_cycle(inner: &Arc<Inner>, cancel: &CancellationToken) -> Result<Duration, Error> {
    let session = inner.api.fetch_broker_session(&inner.link_id).await?;
    let (host, port, tls) = session.endpoint()?;
    info!(host = %host, port, tls, "connecting to broker");

    let mut options = MqttOptions::new(session.client_id.clone(), host, port);
    options
        .set_credentials(session.username.clone(), session.password.clone())
        .set_keep_alive(inner.settings.keep_alive)
        .set_clean_session(true);
    if tls {
        options.set_transport(Transport::tls_with_default_config());
    }

    let (client, mut eventloop) = AsyncClient::new(options, inner.settings.channel_capacity);

    let timeout = inner.settings.connect_timeout;
    tokio::time::timeout(timeout, wait_for_connack(&mut eventloop))
        .await
        .map_err(|_| Error::Timeout {
            timeout_secs: timeout.as_secs(),
        })??;
    info!("broker connected");

    let topics: Vec<String> = session.source_topic.values().cloned().collect();
    let conn_cancel = cancel.child_token();
    let id = inner.next_connection.fetch_add(1, Ordering::Relaxed);
    tokio::spawn(deliver(
        Arc::clone(inner),
        id,
        eventloop,
        client.clone(),
        topics.clone(),
        session.password.clone(),
        conn_cancel.clone(),
    ));

    for topic in &topics {
        if let Err(e) = client.subscribe(topic.as_str(), QoS::AtLeastOnce).await {
            conn_cancel.cancel();
            return Err(Error::BrokerConnect(format!("subscribe {topic}: {e}")));
        }
        debug!(topic = %topic, "subscribed");
    }

    inner.install(Connection {
        id,
        cancel: conn_cancel,
        _client: client,
    });
    Ok(session.validity())
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), Error> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return match ack.code {
                    ConnectReturnCode::Success => Ok(()),
                    ConnectReturnCode::NotAuthorized => Err(Error::BrokerRejected),
                    code => Err(Error::BrokerConnect(format!("connection refused: {code:?}"))),
                };
            }
            Ok(_) => {}
            Err(ConnectionError::ConnectionRefused(ConnectReturnCode::NotAuthorized)) => {
                return Err(Error::BrokerRejected);
            }
            Err(e) => return Err(Error::BrokerConnect(e.to_string())),
        }
    }
}

// ── Delivery task ────────────────────────────────────────────────────

/// Poll one connection until cancelled, decoding and dispatching publishes.
async fn deliver(
    inner: Arc<Inner>,
    id: u64,
    mut eventloop: EventLoop,
    client: AsyncClient,
    topics: Vec<String>,
    password: String,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    inner.dispatch(&publish.payload, &password);
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("broker reconnected, resubscribing");
                    for topic in &topics {
                        if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                            warn!(topic = %topic, error = %e, "resubscribe failed");
                        }
                    }
                }
                Ok(_) => {}
                Err(ConnectionError::ConnectionRefused(ConnectReturnCode::NotAuthorized)) => {
                    warn!("broker rejected credentials on reconnect");
                    if inner.retire(id) {
                        inner.rotate.notify_one();
                    }
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "broker connection lost");
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                    }
                }
            }
        }
    }
    debug!("delivery task exiting");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use secrecy::SecretString;
    use serde_json::json;
    use url::Url;

    use super::decode::tests::{PASSWORD, encrypt_ecb, envelope};
    use super::*;
    use crate::mode::AccountMode;

    fn client() -> MqClient {
        let api = OpenApiClient::with_client(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:1").unwrap(),
            "id",
            SecretString::from("secret"),
            AccountMode::SmartHome,
        );
        MqClient::new(Arc::new(api))
    }

    #[test]
    fn link_id_is_stable_and_prefixed() {
        let mq = client();
        assert!(mq.link_id().starts_with("tuyalink-rust."));
        assert_eq!(mq.link_id(), mq.link_id());
        assert_ne!(mq.link_id(), client().link_id());
    }

    #[test]
    fn dispatch_decodes_and_notifies_in_order() {
        let mq = client();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        mq.add_message_listener(Arc::new(move |m: &MqMessage| {
            sink.lock().unwrap().push(m.data["n"].as_i64().unwrap());
        }));

        for n in 0..3 {
            let data = encrypt_ecb(PASSWORD, json!({ "n": n }).to_string().as_bytes());
            mq.inner.dispatch(&envelope(4, 1, &data), PASSWORD);
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn undecodable_messages_are_dropped() {
        let mq = client();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        mq.add_message_listener(Arc::new(move |_: &MqMessage| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        mq.inner.dispatch(b"not json", PASSWORD);
        mq.inner
            .dispatch(&envelope(4, 1, &STANDARD.encode([1u8; 16])), PASSWORD);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remove_listener_stops_delivery() {
        let mq = client();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = mq.add_message_listener(Arc::new(move |_: &MqMessage| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(mq.remove_message_listener(id));

        let data = encrypt_ecb(PASSWORD, b"{}");
        mq.inner.dispatch(&envelope(4, 1, &data), PASSWORD);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mq = client();
        mq.stop().await;
        mq.start();
        assert!(mq.is_running());
        mq.stop().await;
        assert!(!mq.is_running());
        mq.stop().await;
    }

    #[test]
    fn retire_only_drops_the_matching_connection() {
        let mq = client();
        let (mqtt, _eventloop) = AsyncClient::new(MqttOptions::new("t", "127.0.0.1", 1883), 1);
        let token = CancellationToken::new();
        mq.inner.install(Connection {
            id: 7,
            cancel: token.clone(),
            _client: mqtt,
        });

        assert!(!mq.inner.retire(6));
        assert!(mq.is_connected());
        assert!(mq.inner.retire(7));
        assert!(!mq.is_connected());
        assert!(token.is_cancelled());
    }

    // ── Loop scheduling (paused clock) ──────────────────────────────

    fn refused() -> Result<Duration, Error> {
        Err(Error::BrokerConnect("connection refused".into()))
    }

    /// Run `drive` over scripted cycle outcomes and return the offsets from
    /// start at which each cycle began. The loop is cancelled by the first
    /// cycle past the end of the script.
    async fn cycle_offsets(
        script: Vec<Result<Duration, Error>>,
        live: bool,
        signalled: bool,
    ) -> Vec<u64> {
        let settings = MqSettings::default();
        let rotate = Notify::new();
        if signalled {
            rotate.notify_one();
        }
        let cancel = CancellationToken::new();
        let start = tokio::time::Instant::now();
        let offsets = Mutex::new(Vec::new());
        let script = Mutex::new(VecDeque::from(script));

        drive(
            &settings,
            &rotate,
            &cancel,
            || {
                offsets.lock().unwrap().push(start.elapsed().as_secs());
                let next = script.lock().unwrap().pop_front();
                let outcome = next.unwrap_or_else(|| {
                    cancel.cancel();
                    refused()
                });
                std::future::ready(outcome)
            },
            move || live,
        )
        .await;

        offsets.into_inner().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_restarts_after_a_successful_cycle() {
        let offsets = cycle_offsets(
            vec![refused(), refused(), Ok(Duration::ZERO), refused()],
            true,
            false,
        )
        .await;
        // Delays 1s, 2s, then the 60s minimum session, then 1s again.
        assert_eq!(offsets, vec![0, 1, 3, 63, 64]);
    }

    #[tokio::test(start_paused = true)]
    async fn not_authorized_requests_a_new_session_immediately() {
        let offsets = cycle_offsets(vec![Err(Error::BrokerRejected), Ok(Duration::ZERO)], true, false).await;
        assert_eq!(offsets, vec![0, 0, 60]);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_not_authorized_falls_back_to_backoff() {
        let offsets = cycle_offsets(
            vec![
                Err(Error::BrokerRejected),
                Err(Error::BrokerRejected),
                Err(Error::BrokerRejected),
            ],
            true,
            false,
        )
        .await;
        assert_eq!(offsets, vec![0, 0, 1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_rotation_signal_is_ignored_while_connected() {
        let offsets = cycle_offsets(vec![Ok(Duration::ZERO)], true, true).await;
        assert_eq!(offsets, vec![0, 60]);
    }

    #[tokio::test(start_paused = true)]
    async fn rotation_signal_after_refusal_rotates_now() {
        let offsets = cycle_offsets(vec![Ok(Duration::ZERO)], false, true).await;
        assert_eq!(offsets, vec![0, 0]);
    }
}
