//! WebSocket connection supervision.
//!
//! One logical connection per process, owned by a background task.
//! Connecting is idempotent, an unexpected close schedules a new dial
//! after a fixed delay (forever, no backoff), and inbound text frames
//! are parsed and fanned out to registered listeners. Outbound frames
//! are only accepted while the socket is open; nothing is queued across
//! connections.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use parley_shared::constants::{DEFAULT_WS_URL, MAX_FRAME_SIZE, RECONNECT_DELAY_SECS};
use parley_shared::protocol::{InboundFrame, OutboundFrame};

use crate::error::Result;
use crate::listeners::{ListenerGuard, ListenerRegistry};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type OutboundSlot = Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>;

// ---------------------------------------------------------------------------
// Public surface
// ---------------------------------------------------------------------------

/// Connection lifecycle states, observable through [`ConnectionHandle::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
        };
        write!(f, "{label}")
    }
}

/// Configuration for the connection supervisor.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket endpoint of the daemon.
    pub ws_url: String,
    /// Delay between dial attempts. Fixed; there is no backoff.
    pub reconnect_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            reconnect_delay: Duration::from_secs(RECONNECT_DELAY_SECS),
        }
    }
}

enum Command {
    Connect,
    Disconnect,
}

/// Handle to the connection supervisor. Cheap to clone; every clone
/// drives the same underlying socket.
#[derive(Clone)]
pub struct ConnectionHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    outbound: OutboundSlot,
    listeners: ListenerRegistry,
    state_rx: watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    /// Ask the supervisor to open the socket. No-op while a connection
    /// is already open or being established; a pending reconnect delay
    /// is shortcut.
    pub fn connect(&self) {
        let _ = self.cmd_tx.send(Command::Connect);
    }

    /// Close the socket and stop the supervisor, including any pending
    /// reconnect. Further calls on the handle become no-ops.
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(Command::Disconnect);
    }

    /// Push one frame onto the open socket.
    ///
    /// Returns `false` without queueing when the connection is not open,
    /// the frame does not serialize, or the daemon would reject it for
    /// size. Delivery is best-effort, at most once.
    pub fn send(&self, frame: &OutboundFrame) -> bool {
        let text = match frame.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Dropping unserializable outbound frame");
                return false;
            }
        };
        if text.len() > MAX_FRAME_SIZE {
            warn!(len = text.len(), max = MAX_FRAME_SIZE, "Dropping oversized outbound frame");
            return false;
        }
        match self.lock_outbound().as_ref() {
            Some(tx) => tx.send(text).is_ok(),
            None => {
                debug!("Send while not connected, frame dropped");
                false
            }
        }
    }

    /// Register a subscriber for every successfully parsed inbound
    /// frame. The subscriber stays registered for the guard's lifetime
    /// and survives reconnects.
    pub fn add_listener(
        &self,
        callback: impl Fn(&InboundFrame) + Send + Sync + 'static,
    ) -> ListenerGuard {
        self.listeners.add(callback)
    }

    /// Watch channel carrying lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Current lifecycle state.
    pub fn current_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    fn lock_outbound(&self) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<String>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Spawn the connection supervisor in a background task and return the
/// handle for it.
///
/// The task idles until the first [`ConnectionHandle::connect`]; from
/// then on it keeps the socket alive until an explicit disconnect,
/// dialing again after every close.
pub fn spawn_connection(config: ConnectionConfig) -> Result<ConnectionHandle> {
    // Fail fast on a bad endpoint instead of retrying it forever.
    url::Url::parse(&config.ws_url)?;

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
    let outbound: OutboundSlot = Arc::new(Mutex::new(None));
    let listeners = ListenerRegistry::new();

    let supervisor = Supervisor {
        config,
        cmd_rx,
        state_tx,
        outbound: outbound.clone(),
        listeners: listeners.clone(),
    };
    tokio::spawn(supervisor.run());

    Ok(ConnectionHandle {
        cmd_tx,
        outbound,
        listeners,
        state_rx,
    })
}

// ---------------------------------------------------------------------------
// Supervisor task
// ---------------------------------------------------------------------------

struct Supervisor {
    config: ConnectionConfig,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    outbound: OutboundSlot,
    listeners: ListenerRegistry,
}

impl Supervisor {
    async fn run(mut self) {
        match self.cmd_rx.recv().await {
            Some(Command::Connect) => {}
            Some(Command::Disconnect) | None => {
                debug!("Connection supervisor stopped before first connect");
                return;
            }
        }

        loop {
            self.set_state(ConnectionState::Connecting);
            info!(url = %self.config.ws_url, "Connecting to daemon");

            match connect_async(self.config.ws_url.as_str()).await {
                Ok((stream, _response)) => {
                    let teardown = self.drive(stream).await;
                    self.clear_outbound();
                    self.set_state(ConnectionState::Disconnected);
                    if teardown {
                        info!("Connection closed by request");
                        return;
                    }
                    warn!(
                        retry_in = ?self.config.reconnect_delay,
                        "Connection lost, reconnect scheduled"
                    );
                }
                Err(e) => {
                    self.set_state(ConnectionState::Disconnected);
                    warn!(
                        error = %e,
                        retry_in = ?self.config.reconnect_delay,
                        "Connect failed, reconnect scheduled"
                    );
                }
            }

            // Fixed delay, retried forever. An explicit connect shortcuts
            // the wait; disconnect ends the supervisor.
            tokio::select! {
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Connect) => {}
                    Some(Command::Disconnect) | None => return,
                },
            }
        }
    }

    /// Drive one established socket until it closes. Returns true when
    /// the close was an explicit disconnect request.
    async fn drive(&mut self, stream: WsStream) -> bool {
        let (mut sink, mut source) = stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

        // The outbound slot must be live before the state flips to Open,
        // or an early send would be dropped on an open connection.
        self.install_outbound(out_tx);
        self.set_state(ConnectionState::Open);
        info!("WebSocket connection established");

        let listeners = self.listeners.clone();
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    // Already connected; connect is idempotent.
                    Some(Command::Connect) => {}
                    Some(Command::Disconnect) | None => {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        return true;
                    }
                },

                Some(text) = out_rx.recv() => {
                    if let Err(e) = sink.send(WsMessage::Text(text.into())).await {
                        warn!(error = %e, "WebSocket send failed");
                        return false;
                    }
                }

                frame = source.next() => match frame {
                    Some(Ok(WsMessage::Text(raw))) => dispatch_text(&listeners, raw.as_str()),
                    Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {}
                    Some(Ok(WsMessage::Binary(_))) => {
                        debug!("Ignoring binary frame");
                    }
                    Some(Ok(WsMessage::Close(close))) => {
                        debug!(close = ?close, "Server closed the connection");
                        return false;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket read error");
                        return false;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        return false;
                    }
                },
            }
        }
    }

    fn install_outbound(&self, tx: mpsc::UnboundedSender<String>) {
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
    }

    fn clear_outbound(&self) {
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn set_state(&self, state: ConnectionState) {
        let _ = self.state_tx.send(state);
    }
}

/// Parse one text frame and fan it out. A frame that does not parse is
/// dropped; delivery of later frames is unaffected.
fn dispatch_text(listeners: &ListenerRegistry, raw: &str) {
    match InboundFrame::from_json(raw) {
        Ok(frame) => {
            debug!(listeners = listeners.len(), "Dispatching inbound frame");
            listeners.dispatch(&frame);
        }
        Err(e) => {
            warn!(error = %e, len = raw.len(), "Ignoring malformed inbound frame");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
