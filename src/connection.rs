//! Connection management: the client handle, the background reader loop, and
//! the publish engine that correlates actions with responses.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::{
    action::{AmiAction, ResponseStatus},
    constants::{
        DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_RESPONSE_TIMEOUT_MS, MAX_EVENT_QUEUE_SIZE,
        SOCKET_BUF_SIZE,
    },
    error::{AmiError, AmiResult},
    fields::CoreField,
    message::AmiMessage,
    pending::PendingTable,
    protocol::AmiCodec,
};

/// Read side of the attached transport, erased so the client stays
/// non-generic over the stream type.
type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
/// Write side of the attached transport.
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Lifecycle of one client instance. There is no resurrection: a closed
/// client is not reusable.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionState {
    /// Reader loop running, actions accepted.
    Open,
    /// The stream ended or failed; pending actions are being drained.
    Closing,
    /// Terminal. Every pending action has been failed and the event sink
    /// notified.
    Closed(DisconnectReason),
}

/// Why the connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DisconnectReason {
    /// Clean EOF from the peer.
    ConnectionClosed,
    /// The client called [`AmiClient::close`] and the shutdown completed.
    ClientRequested,
    /// Transport I/O error (io::Error is not Clone, so we store the message).
    IoError(String),
    /// Malformed block or buffer overflow. Framing trust is lost once a
    /// block fails to decode, so these are always fatal.
    ProtocolError(String),
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::ConnectionClosed => write!(f, "connection closed"),
            DisconnectReason::ClientRequested => write!(f, "client requested disconnect"),
            DisconnectReason::IoError(msg) => write!(f, "I/O error: {}", msg),
            DisconnectReason::ProtocolError(msg) => write!(f, "protocol error: {}", msg),
        }
    }
}

/// Establish a TCP connection with a timeout.
async fn tcp_connect_with_timeout(host: &str, port: u16) -> AmiResult<TcpStream> {
    let tcp_result = timeout(
        Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        TcpStream::connect((host, port)),
    )
    .await;

    match tcp_result {
        Ok(Ok(s)) => {
            debug!("[CONNECT] TCP connection established");
            Ok(s)
        }
        Ok(Err(e)) => {
            warn!("[CONNECT] TCP connect failed: {}", e);
            Err(AmiError::Io(e))
        }
        Err(_) => {
            warn!(
                "[CONNECT] TCP connect timed out after {}ms",
                DEFAULT_CONNECT_TIMEOUT_MS
            );
            Err(AmiError::Timeout {
                timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            })
        }
    }
}

/// Options fixed at attach time.
///
/// Use [`Default::default()`] for standard settings.
#[derive(Debug, Clone)]
pub struct AmiConnectOptions {
    /// Capacity of each subscriber's event channel. Default: 1000.
    pub event_queue_size: usize,
}

impl Default for AmiConnectOptions {
    fn default() -> Self {
        Self {
            event_queue_size: MAX_EVENT_QUEUE_SIZE,
        }
    }
}

/// One registered event consumer.
struct Subscriber {
    tx: mpsc::Sender<Result<AmiMessage, AmiError>>,
    /// Set after a drop so the consumer gets one QueueFull notice.
    overflowed: bool,
}

/// State shared between the client handles and the reader task.
struct SharedState {
    /// The correlation table — the only structure both sides mutate.
    pending: PendingTable,
    /// Event fan-out, in registration order. `None` once the sink is closed.
    subscribers: StdMutex<Option<Vec<Subscriber>>>,
    status_tx: watch::Sender<ConnectionState>,
    /// Default response wait in milliseconds (0 = wait indefinitely).
    response_timeout_ms: AtomicU64,
    /// Total events dropped across all subscribers.
    dropped_event_count: AtomicU64,
    /// Set by close() so the resulting EOF reports ClientRequested.
    close_requested: AtomicBool,
    /// First shutdown caller wins; everyone else returns immediately.
    shutdown_started: AtomicBool,
    event_queue_size: usize,
}

impl SharedState {
    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Option<Vec<Subscriber>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver one event to every live subscriber, in registration order.
    ///
    /// Delivery is isolated: a full or closed subscriber never blocks the
    /// others. A full queue drops the event for that subscriber, flags it
    /// for a one-time QueueFull notice, and bumps the global counter.
    /// Returns `false` once the sink has been closed by shutdown.
    fn dispatch_event(&self, event: &AmiMessage) -> bool {
        let mut guard = self.lock_subscribers();
        let Some(subscribers) = guard.as_mut() else {
            return false;
        };

        subscribers.retain_mut(|sub| {
            if sub.overflowed {
                match sub.tx.try_send(Err(AmiError::EventQueueFull)) {
                    Ok(()) => sub.overflowed = false,
                    Err(mpsc::error::TrySendError::Closed(_)) => return false,
                    Err(mpsc::error::TrySendError::Full(_)) => {}
                }
            }

            match sub.tx.try_send(Ok(event.clone())) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    sub.overflowed = true;
                    self.dropped_event_count.fetch_add(1, Ordering::Relaxed);
                    warn!("subscriber event queue full, dropping event");
                    true
                }
            }
        });
        true
    }

    /// Tear the connection down: Open -> Closing -> drain pending -> notify
    /// the event sink -> Closed. Idempotent; callable from the reader loop
    /// and from a failed write alike.
    fn shutdown(&self, reason: DisconnectReason) {
        if self.shutdown_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.status_tx.send(ConnectionState::Closing);

        let drained = self.pending.drain(reason.clone());
        if drained > 0 {
            debug!(drained, "failed pending actions on disconnect");
        }

        let subscribers = self.lock_subscribers().take();
        if let Some(subscribers) = subscribers {
            for sub in &subscribers {
                let _ = sub.tx.try_send(Err(AmiError::Disconnected {
                    reason: reason.clone(),
                }));
            }
        }

        info!(%reason, "connection closed");
        let _ = self.status_tx.send(ConnectionState::Closed(reason));
    }
}

/// AMI client handle (Clone + Send).
///
/// Any number of tasks may hold clones and call [`publish`](Self::publish)
/// concurrently: writes are linearized through the writer mutex, and each
/// caller resumes when its own response arrives, regardless of arrival order.
#[derive(Clone)]
pub struct AmiClient {
    writer: Arc<Mutex<BoxedWriter>>,
    shared: Arc<SharedState>,
    status_rx: watch::Receiver<ConnectionState>,
    server_version: Option<Arc<str>>,
}

impl std::fmt::Debug for AmiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiClient")
            .field("open", &self.is_open())
            .finish()
    }
}

/// Event stream receiver (!Clone).
///
/// Receives unsolicited events from the background reader task. Events are
/// delivered as `Result<AmiMessage, AmiError>`: an `Err(AmiError::EventQueueFull)`
/// means this subscriber fell behind and lost events, and an
/// `Err(AmiError::Disconnected { .. })` is the final item before the stream
/// ends. Register additional independent streams with
/// [`AmiClient::subscribe`].
pub struct AmiEventStream {
    rx: mpsc::Receiver<Result<AmiMessage, AmiError>>,
    status_rx: watch::Receiver<ConnectionState>,
}

impl std::fmt::Debug for AmiEventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiEventStream")
            .field("open", &self.is_open())
            .finish()
    }
}

/// Read the single-line `Asterisk Call Manager/x.y` greeting that precedes
/// all block traffic. Leftover bytes stay in the codec for the reader loop.
async fn read_greeting(stream: &mut TcpStream, codec: &mut AmiCodec) -> AmiResult<String> {
    let mut read_buffer = [0u8; SOCKET_BUF_SIZE];
    loop {
        if let Some(line) = codec.take_line()? {
            debug!(greeting = %line, "received server greeting");
            return Ok(line);
        }

        let read_result = timeout(
            Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            stream.read(&mut read_buffer),
        )
        .await;

        let bytes_read = match read_result {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(AmiError::Io(e)),
            Err(_) => {
                return Err(AmiError::Timeout {
                    timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
                })
            }
        };

        if bytes_read == 0 {
            return Err(AmiError::protocol("stream closed before greeting"));
        }
        codec.extend(&read_buffer[..bytes_read])?;
    }
}

/// Background reader loop wrapper: a panic in the loop body must still drain
/// the correlation table, or every in-flight caller would hang.
async fn reader_loop(reader: BoxedReader, codec: AmiCodec, shared: Arc<SharedState>) {
    let result = std::panic::AssertUnwindSafe(reader_loop_inner(reader, codec, shared.clone()));
    if futures_util::FutureExt::catch_unwind(result).await.is_err() {
        tracing::error!("reader task panicked");
        shared.shutdown(DisconnectReason::IoError("reader task panicked".to_string()));
    }
}

async fn reader_loop_inner(mut reader: BoxedReader, mut codec: AmiCodec, shared: Arc<SharedState>) {
    let mut read_buffer = [0u8; SOCKET_BUF_SIZE];

    loop {
        // Drain every complete block already buffered before reading again.
        match codec.next_block() {
            Ok(Some(message)) => {
                match message.get(CoreField::ActionId).map(str::to_owned) {
                    Some(id) => {
                        trace!(action_id = %id, "routing response");
                        if !shared.pending.fulfill(&id, Ok(message)) {
                            // Already timed out, or never ours. Non-fatal.
                            debug!(action_id = %id, "response for unknown action id, dropping");
                        }
                    }
                    None => {
                        trace!("routing event");
                        if !shared.dispatch_event(&message) {
                            debug!("event sink closed, reader exiting");
                            return;
                        }
                    }
                }
                continue;
            }
            Ok(None) => {
                // Need more data from the stream.
            }
            Err(e) => {
                warn!("decode error: {}", e);
                shared.shutdown(DisconnectReason::ProtocolError(e.to_string()));
                return;
            }
        }

        match reader.read(&mut read_buffer).await {
            Ok(0) => {
                info!("stream ended (EOF)");
                let reason = if shared.close_requested.load(Ordering::SeqCst) {
                    DisconnectReason::ClientRequested
                } else {
                    DisconnectReason::ConnectionClosed
                };
                shared.shutdown(reason);
                return;
            }
            Ok(n) => {
                if let Err(e) = codec.extend(&read_buffer[..n]) {
                    warn!("buffer error: {}", e);
                    shared.shutdown(DisconnectReason::ProtocolError(e.to_string()));
                    return;
                }
            }
            Err(e) => {
                warn!("read error: {}", e);
                shared.shutdown(DisconnectReason::IoError(e.to_string()));
                return;
            }
        }
    }
}

/// Hex MD5 digest of challenge + secret, as the manager's MD5 handshake
/// expects it.
fn challenge_digest(challenge: &str, secret: &str) -> String {
    use md5::{Digest, Md5};
    use std::fmt::Write;

    let mut hasher = Md5::new();
    hasher.update(challenge.as_bytes());
    hasher.update(secret.as_bytes());

    let digest = hasher.finalize();
    let mut key = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(key, "{:02x}", byte);
    }
    key
}

fn validate_credentials(username: &str, secret: &str) -> AmiResult<()> {
    if username.is_empty() {
        return Err(AmiError::InvalidAction {
            message: "username must not be empty".to_string(),
        });
    }
    if secret.is_empty() {
        return Err(AmiError::InvalidAction {
            message: "secret must not be empty".to_string(),
        });
    }
    Ok(())
}

impl AmiClient {
    /// Connect to Asterisk over TCP and authenticate with the MD5 challenge
    /// handshake.
    ///
    /// Consumes the greeting banner, starts the reader loop, then logs in.
    /// Use [`login_plain`](Self::login_plain) after
    /// [`attach`](Self::attach) for peers without challenge support.
    pub async fn connect(
        host: &str,
        port: u16,
        username: &str,
        secret: &str,
    ) -> AmiResult<(Self, AmiEventStream)> {
        Self::connect_with_options(host, port, username, secret, AmiConnectOptions::default())
            .await
    }

    /// [`connect`](Self::connect) with custom options.
    pub async fn connect_with_options(
        host: &str,
        port: u16,
        username: &str,
        secret: &str,
        options: AmiConnectOptions,
    ) -> AmiResult<(Self, AmiEventStream)> {
        validate_credentials(username, secret)?;

        info!("Connecting to Asterisk at {}:{}", host, port);
        let mut stream = tcp_connect_with_timeout(host, port).await?;
        let mut codec = AmiCodec::new();

        let greeting = read_greeting(&mut stream, &mut codec).await?;

        let (read_half, write_half) = stream.into_split();
        let (client, events) = Self::split_and_spawn(
            Box::new(read_half),
            Box::new(write_half),
            codec,
            Some(Arc::from(greeting.as_str())),
            options,
        );

        client.login(username, secret).await?;
        info!("Connected and authenticated to Asterisk");
        Ok((client, events))
    }

    /// Attach to an already-established duplex stream (TLS tunnel, test
    /// harness, proxy...).
    ///
    /// Precondition: the stream is readable and writable and any greeting
    /// line has already been consumed — from here on, only blank-line
    /// delimited blocks may arrive. No login is performed.
    pub fn attach<S>(stream: S) -> (Self, AmiEventStream)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::attach_with_options(stream, AmiConnectOptions::default())
    }

    /// [`attach`](Self::attach) with custom options.
    pub fn attach_with_options<S>(stream: S, options: AmiConnectOptions) -> (Self, AmiEventStream)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        Self::split_and_spawn(
            Box::new(read_half),
            Box::new(write_half),
            AmiCodec::new(),
            None,
            options,
        )
    }

    fn split_and_spawn(
        reader: BoxedReader,
        writer: BoxedWriter,
        codec: AmiCodec,
        server_version: Option<Arc<str>>,
        options: AmiConnectOptions,
    ) -> (Self, AmiEventStream) {
        let queue_size = options.event_queue_size.max(1);

        let (status_tx, status_rx) = watch::channel(ConnectionState::Open);
        let status_rx2 = status_tx.subscribe();
        let (event_tx, event_rx) = mpsc::channel(queue_size);

        let shared = Arc::new(SharedState {
            pending: PendingTable::new(),
            subscribers: StdMutex::new(Some(vec![Subscriber {
                tx: event_tx,
                overflowed: false,
            }])),
            status_tx,
            response_timeout_ms: AtomicU64::new(DEFAULT_RESPONSE_TIMEOUT_MS),
            dropped_event_count: AtomicU64::new(0),
            close_requested: AtomicBool::new(false),
            shutdown_started: AtomicBool::new(false),
            event_queue_size: queue_size,
        });

        tokio::spawn(reader_loop(reader, codec, shared.clone()));

        let client = AmiClient {
            writer: Arc::new(Mutex::new(writer)),
            shared,
            status_rx,
            server_version,
        };

        let stream = AmiEventStream {
            rx: event_rx,
            status_rx: status_rx2,
        };

        (client, stream)
    }

    /// Send an action and wait for its correlated response.
    ///
    /// Assigns a fresh `ActionID`, registers the pending slot, writes the
    /// block (one writer at a time — concurrent publishes never interleave
    /// bytes), then suspends until the reader loop fulfills the slot. The
    /// writer lock is released before the wait, so a slow response never
    /// blocks other callers' writes.
    ///
    /// Uses the configured default response timeout; see
    /// [`publish_with_timeout`](Self::publish_with_timeout) and
    /// [`set_response_timeout`](Self::set_response_timeout).
    pub async fn publish(&self, action: AmiMessage) -> AmiResult<AmiMessage> {
        let timeout_ms = self.shared.response_timeout_ms.load(Ordering::Relaxed);
        let wait = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));
        self.publish_with_timeout(action, wait).await
    }

    /// [`publish`](Self::publish) with an explicit wait. `None` waits until
    /// the response arrives or the connection closes.
    ///
    /// On timeout the pending slot is discarded; a late response for that
    /// identifier is ignored without disturbing the connection.
    pub async fn publish_with_timeout(
        &self,
        mut action: AmiMessage,
        wait: Option<Duration>,
    ) -> AmiResult<AmiMessage> {
        if !self.is_open() {
            return Err(AmiError::NotConnected);
        }
        if action.get(CoreField::Action).is_none() {
            return Err(AmiError::InvalidAction {
                message: "missing Action field".to_string(),
            });
        }
        if action.get(CoreField::ActionId).is_some() {
            return Err(AmiError::InvalidAction {
                message: "ActionID is assigned by the client".to_string(),
            });
        }

        let action_id = uuid::Uuid::new_v4().to_string();
        action.set(CoreField::ActionId, action_id.clone());

        // Serialize (and validate) before registering, so a bad message
        // leaves no slot behind.
        let wire = action.to_wire_format()?;
        let rx = self.shared.pending.register(&action_id)?;

        debug!(
            action = action.get(CoreField::Action).unwrap_or("?"),
            action_id = %action_id,
            "publishing action"
        );

        {
            let mut writer = self.writer.lock().await;
            let write_result = async {
                writer.write_all(wire.as_bytes()).await?;
                writer.flush().await
            }
            .await;

            if let Err(e) = write_result {
                warn!("write failed: {}", e);
                self.shared.pending.discard(&action_id);
                self.shared
                    .shutdown(DisconnectReason::IoError(e.to_string()));
                return Err(AmiError::Io(e));
            }
        }

        let outcome = match wait {
            Some(duration) => match timeout(duration, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.shared.pending.discard(&action_id);
                    return Err(AmiError::Timeout {
                        timeout_ms: duration.as_millis() as u64,
                    });
                }
            },
            None => rx.await,
        };

        match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(e),
            // Sender dropped without completing the slot; only possible if
            // the table vanished mid-teardown.
            Err(_) => Err(AmiError::Disconnected {
                reason: DisconnectReason::ConnectionClosed,
            }),
        }
    }

    /// Authenticate with the two-step MD5 challenge handshake: request a
    /// challenge token, then log in with the hex MD5 of challenge + secret.
    /// The secret itself never crosses the wire.
    pub async fn login(&self, username: &str, secret: &str) -> AmiResult<()> {
        validate_credentials(username, secret)?;

        let challenge = self.publish(AmiAction::Challenge.into_message()).await?;
        if ResponseStatus::of(&challenge) != ResponseStatus::Success {
            return Err(AmiError::AuthenticationFailed {
                message: challenge
                    .get(CoreField::Message)
                    .unwrap_or("challenge rejected")
                    .to_string(),
            });
        }
        let token = challenge
            .get(CoreField::Challenge)
            .ok_or_else(|| AmiError::protocol("challenge response missing Challenge field"))?;

        let key = challenge_digest(token, secret);
        let response = self
            .publish(
                AmiAction::Login {
                    username: username.to_string(),
                    key,
                }
                .into_message(),
            )
            .await?;

        match ResponseStatus::of(&response) {
            ResponseStatus::Success => {
                info!(username, "authenticated");
                Ok(())
            }
            _ => Err(AmiError::AuthenticationFailed {
                message: response
                    .get(CoreField::Message)
                    .unwrap_or("authentication failed")
                    .to_string(),
            }),
        }
    }

    /// Authenticate with a cleartext `Login` action. Prefer
    /// [`login`](Self::login) where the peer supports challenges.
    pub async fn login_plain(&self, username: &str, secret: &str) -> AmiResult<()> {
        validate_credentials(username, secret)?;

        let response = self
            .publish(
                AmiAction::LoginPlain {
                    username: username.to_string(),
                    secret: secret.to_string(),
                }
                .into_message(),
            )
            .await?;

        match ResponseStatus::of(&response) {
            ResponseStatus::Success => {
                info!(username, "authenticated");
                Ok(())
            }
            _ => Err(AmiError::AuthenticationFailed {
                message: response
                    .get(CoreField::Message)
                    .unwrap_or("authentication failed")
                    .to_string(),
            }),
        }
    }

    /// End the manager session. The peer answers `Response: Goodbye` and
    /// then closes the stream, which the reader loop reports as a normal
    /// disconnect.
    pub async fn logoff(&self) -> AmiResult<()> {
        let response = self.publish(AmiAction::Logoff.into_message()).await?;
        match ResponseStatus::of(&response) {
            ResponseStatus::Goodbye => Ok(()),
            _ => Err(AmiError::UnexpectedResponse {
                status: response
                    .get(CoreField::Response)
                    .unwrap_or("")
                    .to_string(),
            }),
        }
    }

    /// Round-trip liveness check (`Action: Ping`).
    pub async fn ping(&self) -> AmiResult<()> {
        let response = self.publish(AmiAction::Ping.into_message()).await?;
        crate::action::require_success(response).map(|_| ())
    }

    /// Set the server-side event mask (`on`, `off`, or a category list such
    /// as `call,log`). Which events to consume is the caller's policy; this
    /// just forwards it.
    pub async fn set_event_mask(&self, event_mask: &str) -> AmiResult<()> {
        let response = self
            .publish(
                AmiAction::Events {
                    event_mask: event_mask.to_string(),
                }
                .into_message(),
            )
            .await?;
        crate::action::require_success(response).map(|_| ())
    }

    /// Run a CLI command and return the full response block (output arrives
    /// in its `Output` fields).
    pub async fn command(&self, command: &str) -> AmiResult<AmiMessage> {
        let response = self
            .publish(
                AmiAction::Command {
                    command: command.to_string(),
                }
                .into_message(),
            )
            .await?;
        crate::action::require_success(response)
    }

    /// Register another independent event stream.
    ///
    /// Every subscriber receives every event, in arrival order; a slow
    /// subscriber only loses its own events. Subscribing to a closed client
    /// yields a stream that ends immediately.
    pub fn subscribe(&self) -> AmiEventStream {
        let (tx, rx) = mpsc::channel(self.shared.event_queue_size);
        if let Some(subscribers) = self.shared.lock_subscribers().as_mut() {
            subscribers.push(Subscriber {
                tx,
                overflowed: false,
            });
        }
        AmiEventStream {
            rx,
            status_rx: self.shared.status_tx.subscribe(),
        }
    }

    /// Default wait applied by [`publish`](Self::publish). Zero disables the
    /// timeout.
    pub fn set_response_timeout(&self, duration: Duration) {
        self.shared
            .response_timeout_ms
            .store(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Total events dropped because subscribers fell behind.
    pub fn dropped_event_count(&self) -> u64 {
        self.shared.dropped_event_count.load(Ordering::Relaxed)
    }

    /// Number of actions currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    /// Greeting line captured by [`connect`](Self::connect), e.g.
    /// `Asterisk Call Manager/5.0.1`. `None` for attached streams.
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    /// Whether the connection is alive (not yet closing or closed).
    pub fn is_open(&self) -> bool {
        matches!(*self.status_rx.borrow(), ConnectionState::Open)
    }

    /// Current lifecycle snapshot.
    pub fn status(&self) -> ConnectionState {
        self.status_rx.borrow().clone()
    }

    /// Wait for the terminal state and return the disconnect reason.
    pub async fn wait_closed(&self) -> DisconnectReason {
        let mut rx = self.status_rx.clone();
        loop {
            if let ConnectionState::Closed(reason) = &*rx.borrow() {
                return reason.clone();
            }
            if rx.changed().await.is_err() {
                return DisconnectReason::ConnectionClosed;
            }
        }
    }

    /// Close the connection by shutting down the write side. The reader
    /// observes EOF, drains pending actions, and reports
    /// [`DisconnectReason::ClientRequested`].
    pub async fn close(&self) -> AmiResult<()> {
        info!("client requested disconnect");
        self.shared.close_requested.store(true, Ordering::SeqCst);
        let mut writer = self.writer.lock().await;
        writer.shutdown().await.map_err(AmiError::Io)?;
        Ok(())
    }
}

impl AmiEventStream {
    /// Receive the next event, or `None` once the connection has closed and
    /// the final disconnect notice has been consumed.
    pub async fn recv(&mut self) -> Option<Result<AmiMessage, AmiError>> {
        self.rx.recv().await
    }

    /// Whether the connection is alive (not yet closing or closed).
    pub fn is_open(&self) -> bool {
        matches!(*self.status_rx.borrow(), ConnectionState::Open)
    }

    /// Current lifecycle snapshot.
    pub fn status(&self) -> ConnectionState {
        self.status_rx.borrow().clone()
    }
}

impl futures_util::Stream for AmiEventStream {
    type Item = Result<AmiMessage, AmiError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_state_eq() {
        assert_eq!(ConnectionState::Open, ConnectionState::Open);
        assert_eq!(
            ConnectionState::Closed(DisconnectReason::ConnectionClosed),
            ConnectionState::Closed(DisconnectReason::ConnectionClosed)
        );
        assert_ne!(
            ConnectionState::Open,
            ConnectionState::Closed(DisconnectReason::ClientRequested)
        );
    }

    #[test]
    fn disconnect_reason_display() {
        assert_eq!(
            DisconnectReason::ClientRequested.to_string(),
            "client requested disconnect"
        );
        assert_eq!(
            DisconnectReason::ProtocolError("bad block".to_string()).to_string(),
            "protocol error: bad block"
        );
    }

    #[test]
    fn challenge_digest_known_vector() {
        // md5("abc") = 900150983cd24fb0d6963f7d28e17f72
        assert_eq!(
            challenge_digest("a", "bc"),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn default_options() {
        let options = AmiConnectOptions::default();
        assert_eq!(options.event_queue_size, MAX_EVENT_QUEUE_SIZE);
    }

    #[test]
    fn empty_credentials_rejected() {
        assert!(matches!(
            validate_credentials("", "secret"),
            Err(AmiError::InvalidAction { .. })
        ));
        assert!(matches!(
            validate_credentials("admin", ""),
            Err(AmiError::InvalidAction { .. })
        ));
    }
}
