//! Realtime WebSocket session.
//!
//! One [`RealtimeSession`] owns at most one live link at a time. Each link
//! runs a reader task and a writer task; both share the link's `done` token
//! and whichever notices a failure first tears the link down. Teardown is
//! guarded by a per-link flag so observers see exactly one `Disconnected`
//! per link, however many paths race to close it.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::Credential;
use crate::client::join_path;
use crate::config::SessionConfig;
use crate::error::{AppError, Result};
use crate::session::dispatch::accept_frame;
use crate::session::messages::OutboundMessage;

/// Path of the realtime endpoint on the service host.
pub const REALTIME_PATH: &str = "/_ws/";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Receives the key code of every accepted command.
///
/// Runs on the reader task; a slow handler delays subsequent frames.
pub type CommandHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Receives every connection status change.
pub type StatusHandler = Arc<dyn Fn(SessionStatus) + Send + Sync>;

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl SessionStatus {
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Derives the realtime endpoint from the service base URL.
///
/// `http` maps to `ws` and `https` to `wss`; `/_ws/` is appended to the
/// base path.
///
/// # Errors
///
/// Returns [`AppError::Config`] for schemes other than http(s) or ws(s).
pub fn realtime_endpoint(base: &Url) -> Result<Url> {
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(AppError::Config(format!(
                "unsupported service scheme '{other}'"
            )));
        },
    };

    let mut url = base.clone();
    url.set_scheme(scheme)
        .map_err(|()| AppError::Config(format!("cannot use scheme '{scheme}' for {base}")))?;
    join_path(&url, REALTIME_PATH)
}

#[derive(Default)]
struct Handlers {
    command: Option<CommandHandler>,
    status: Option<StatusHandler>,
}

/// A single connection's shared state.
struct Link {
    closed: Mutex<bool>,
    done: CancellationToken,
    outbound: mpsc::Sender<Message>,
}

impl Link {
    fn is_closed(&self) -> bool {
        *lock(&self.closed)
    }

    /// Marks the link closed; true only for the first caller.
    fn mark_closed(&self) -> bool {
        let mut closed = lock(&self.closed);
        if *closed {
            return false;
        }
        *closed = true;
        true
    }
}

struct Shared {
    endpoint: Url,
    token: String,
    user_id: String,
    handshake_timeout: Duration,
    queue_capacity: usize,
    handlers: Mutex<Handlers>,
    status: Mutex<SessionStatus>,
    link: Mutex<Option<Arc<Link>>>,
    /// Cancels the handshake of the connect in progress, if any.
    pending: Mutex<Option<CancellationToken>>,
    connecting: tokio::sync::Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn report(&self, status: SessionStatus) {
        *lock(&self.status) = status;
        tracing::debug!(%status, "Session status changed");
        let handler = lock(&self.handlers).status.clone();
        if let Some(handler) = handler {
            handler(status);
        }
    }

    fn teardown(&self, link: &Link) {
        if !link.mark_closed() {
            return;
        }
        link.done.cancel();
        tracing::info!(endpoint = %self.endpoint, "Realtime link closed");
        self.report(SessionStatus::Disconnected);
    }

    fn handle_frame(&self, payload: &str) {
        tracing::trace!(payload, "Frame received");
        match accept_frame(payload, &self.user_id) {
            Ok(Some(code)) => {
                let handler = lock(&self.handlers).command.clone();
                match handler {
                    Some(handler) => handler(&code),
                    None => tracing::debug!(key_code = %code, "No command handler registered"),
                }
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Skipping frame"),
        }
    }

    fn upgrade_request(&self) -> Result<tungstenite::handshake::client::Request> {
        let mut request = self.endpoint.as_str().into_client_request()?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|e| AppError::Connection(format!("invalid session token: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);
        Ok(request)
    }
}

/// Client side of the realtime channel.
///
/// Cheap to clone; clones share the same link and handlers.
#[derive(Clone)]
pub struct RealtimeSession {
    shared: Arc<Shared>,
}

impl fmt::Debug for RealtimeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeSession")
            .field("endpoint", &self.shared.endpoint.as_str())
            .field("user_id", &self.shared.user_id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl RealtimeSession {
    /// Creates a disconnected session for `credential` against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if no realtime endpoint can be derived.
    pub fn new(base_url: &Url, credential: &Credential, config: &SessionConfig) -> Result<Self> {
        Ok(Self {
            shared: Arc::new(Shared {
                endpoint: realtime_endpoint(base_url)?,
                token: credential.session_token.clone(),
                user_id: credential.user_id.clone(),
                handshake_timeout: Duration::from_secs(config.handshake_timeout_secs),
                queue_capacity: config.send_queue_capacity.max(1),
                handlers: Mutex::new(Handlers::default()),
                status: Mutex::new(SessionStatus::Disconnected),
                link: Mutex::new(None),
                pending: Mutex::new(None),
                connecting: tokio::sync::Mutex::new(()),
            }),
        })
    }

    /// Replaces the command observer.
    pub fn set_command_handler(&self, handler: CommandHandler) {
        lock(&self.shared.handlers).command = Some(handler);
    }

    /// Replaces the status observer.
    pub fn set_status_handler(&self, handler: StatusHandler) {
        lock(&self.shared.handlers).status = Some(handler);
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.shared.endpoint
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        *lock(&self.shared.status)
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Opens a new link, closing any existing one first.
    ///
    /// On success the reader and writer tasks are running and a ping has
    /// been queued. A [`close`](Self::close) while the upgrade is still in
    /// flight abandons it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] if the service refuses the token and
    /// [`AppError::Connection`] if the upgrade otherwise fails, is abandoned
    /// or does not finish within the handshake timeout. Status is
    /// `Disconnected` then.
    pub async fn connect(&self) -> Result<()> {
        let _connecting = self.shared.connecting.lock().await;
        self.close();
        let cancel = CancellationToken::new();
        *lock(&self.shared.pending) = Some(cancel.clone());
        self.shared.report(SessionStatus::Connecting);

        let handshake = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(abandoned()),
            result = self.handshake() => result,
        };

        let (outbound, queue) = mpsc::channel(self.shared.queue_capacity);
        let link = Arc::new(Link {
            closed: Mutex::new(false),
            done: CancellationToken::new(),
            outbound,
        });

        let stream = {
            let mut pending = lock(&self.shared.pending);
            pending.take();
            match handshake {
                Ok(_) if cancel.is_cancelled() => Err(abandoned()),
                Ok(stream) => {
                    *lock(&self.shared.link) = Some(link.clone());
                    Ok(stream)
                },
                Err(e) => Err(e),
            }
        };
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(
                    endpoint = %self.shared.endpoint,
                    error = %e,
                    "Realtime connect failed"
                );
                self.shared.report(SessionStatus::Disconnected);
                return Err(e);
            },
        };

        tracing::info!(endpoint = %self.shared.endpoint, "Realtime link established");
        self.shared.report(SessionStatus::Connected);

        let (sink, stream) = stream.split();
        tokio::spawn(write_loop(self.shared.clone(), link.clone(), sink, queue));
        tokio::spawn(read_loop(self.shared.clone(), link, stream));

        if let Err(e) = self.send(&OutboundMessage::ping()) {
            tracing::warn!(error = %e, "Could not queue ping");
        }
        Ok(())
    }

    async fn handshake(&self) -> Result<WsStream> {
        let request = self.shared.upgrade_request()?;
        let timeout = self.shared.handshake_timeout;
        match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request)).await {
            Ok(Ok((stream, response))) => {
                tracing::debug!(status = %response.status(), "Upgrade accepted");
                Ok(stream)
            },
            Ok(Err(tungstenite::Error::Http(response)))
                if matches!(response.status().as_u16(), 401 | 403) =>
            {
                Err(AppError::Forbidden)
            },
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(AppError::Connection(format!(
                "handshake did not finish within {}s",
                timeout.as_secs()
            ))),
        }
    }

    /// Queues `message` for the writer task without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotConnected`] when no link is open and
    /// [`AppError::QueueFull`] when the outbound queue is at capacity; the
    /// message is dropped in both cases.
    pub fn send(&self, message: &OutboundMessage) -> Result<()> {
        let link = lock(&self.shared.link).clone().ok_or(AppError::NotConnected)?;
        if link.is_closed() {
            return Err(AppError::NotConnected);
        }

        let payload = serde_json::to_string(message)
            .map_err(|e| AppError::Protocol(format!("cannot encode message: {e}")))?;

        link.outbound
            .try_send(Message::Text(payload))
            .map_err(|e| match e {
                TrySendError::Full(_) => AppError::QueueFull,
                TrySendError::Closed(_) => AppError::NotConnected,
            })
    }

    /// Closes the current link and abandons a connect still in its
    /// handshake. Safe to call any number of times.
    pub fn close(&self) {
        let link = {
            let mut pending = lock(&self.shared.pending);
            if let Some(cancel) = pending.take() {
                cancel.cancel();
            }
            lock(&self.shared.link).take()
        };
        if let Some(link) = link {
            self.shared.teardown(&link);
        }
    }
}

fn abandoned() -> AppError {
    AppError::Connection("connect abandoned by close".to_string())
}

async fn read_loop(shared: Arc<Shared>, link: Arc<Link>, mut stream: SplitStream<WsStream>) {
    loop {
        let frame = tokio::select! {
            () = link.done.cancelled() => break,
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => shared.handle_frame(&text),
            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => shared.handle_frame(text),
                Err(_) => tracing::warn!(len = bytes.len(), "Skipping non-UTF-8 binary frame"),
            },
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(?frame, "Service closed the realtime channel");
                break;
            },
            Some(Ok(_)) => {}
            Some(Err(
                tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
            ))
            | None => {
                tracing::debug!("Realtime stream ended");
                break;
            },
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Realtime read failed");
                break;
            },
        }
    }
    shared.teardown(&link);
}

async fn write_loop(
    shared: Arc<Shared>,
    link: Arc<Link>,
    mut sink: SplitSink<WsStream, Message>,
    mut queue: mpsc::Receiver<Message>,
) {
    loop {
        tokio::select! {
            biased;
            () = link.done.cancelled() => break,
            message = queue.recv() => {
                let Some(message) = message else { break };
                if let Err(e) = sink.send(message).await {
                    tracing::warn!(error = %e, "Realtime write failed");
                    shared.teardown(&link);
                    break;
                }
            }
        }
    }

    if let Err(e) = sink.close().await {
        tracing::debug!(error = %e, "Close frame not delivered");
    }
}
