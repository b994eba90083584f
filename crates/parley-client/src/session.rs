//! The chat session: one local identity, one daemon connection, and the
//! store, window, and scroll state behind a running UI.
//!
//! Sends are fire-and-forget. Nothing is inserted locally at send time;
//! a sent message only materializes when the daemon echoes it back
//! through the WebSocket, exactly like a message from anyone else. A
//! send while disconnected is silently lost, which keeps delivery
//! at-most-once with no duplicate risk on reconnect.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use parley_net::{ConnectionHandle, ConnectionState, ListenerGuard};
use parley_shared::protocol::{InboundFrame, OutboundFrame};
use parley_shared::{ChatId, Friend, GroupChat, GroupId, Message, PeerId};
use parley_store::MessageStore;

use crate::api::ApiClient;
use crate::error::Result;
use crate::scroll::{ScrollAnchor, ViewportMetrics};
use crate::window::{ChatWindows, WindowView};

/// What the user opened: a 1:1 conversation or a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTarget {
    Direct(PeerId),
    Group(GroupId),
}

impl ChatTarget {
    /// The conversation key this target maps to.
    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::Direct(peer) => ChatId::direct(peer),
            Self::Group(group) => ChatId::group(group),
        }
    }
}

/// Notifications pushed to the embedder.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A message was appended to some chat's log.
    Message { message: Message },
    /// The daemon link changed state.
    Connection(ConnectionState),
}

#[derive(Default)]
struct SessionState {
    store: MessageStore,
    windows: ChatWindows,
    scroll: ScrollAnchor,
    selected: Option<ChatTarget>,
}

/// A running chat session bound to one local identity.
pub struct ChatSession {
    state: Arc<Mutex<SessionState>>,
    connection: ConnectionHandle,
    api: ApiClient,
    local_id: PeerId,
    _listener: ListenerGuard,
}

impl ChatSession {
    /// Wire a session onto an existing connection handle.
    ///
    /// Registers the inbound listener and returns the session together
    /// with the event stream the embedder should drain.
    pub fn start(
        connection: ConnectionHandle,
        api: ApiClient,
        local_id: PeerId,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let state = Arc::new(Mutex::new(SessionState::default()));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let listener_state = state.clone();
        let listener_local = local_id.clone();
        let listener_events = events_tx.clone();
        let listener = connection.add_listener(move |frame| {
            on_inbound(&listener_state, &listener_local, &listener_events, frame);
        });

        let mut state_watch = connection.state();
        tokio::spawn(async move {
            // Forward transitions from now on; the state at start is
            // available through `connection_state` directly.
            let _ = state_watch.borrow_and_update();
            while state_watch.changed().await.is_ok() {
                let current = *state_watch.borrow_and_update();
                if events_tx.send(SessionEvent::Connection(current)).is_err() {
                    return;
                }
            }
        });

        let session = Self {
            state,
            connection,
            api,
            local_id,
            _listener: listener,
        };
        (session, events_rx)
    }

    /// Open a conversation: mark it selected, fetch its history, merge,
    /// and size the display window.
    ///
    /// A fetch that resolves after the user has moved on is discarded.
    /// A failed fetch is logged and leaves the existing log untouched.
    pub async fn open_chat(&self, target: &ChatTarget) -> WindowView {
        let chat_id = target.chat_id();

        let first_display = {
            let mut guard = self.lock_state();
            let state = &mut *guard;
            state.selected = Some(target.clone());
            let first = !state.windows.is_open(&chat_id);
            state.windows.select_chat(&state.store, &chat_id);
            state.scroll.reset();
            first
        };

        match self.fetch_history(target).await {
            Ok(fetched) => {
                let mut guard = self.lock_state();
                let state = &mut *guard;
                // The user may have moved on while the fetch was in
                // flight; merging would window the wrong chat.
                if state.selected.as_ref() == Some(target) {
                    state.store.replace_history(&chat_id, fetched);
                } else {
                    debug!(chat = %chat_id, "Discarding stale history fetch");
                }
            }
            Err(e) => {
                warn!(chat = %chat_id, error = %e, "History fetch failed, keeping existing log");
            }
        }

        let mut guard = self.lock_state();
        let state = &mut *guard;
        let view = state.windows.view(&state.store, &chat_id);
        if first_display && state.selected.as_ref() == Some(target) {
            state.scroll.on_first_display();
        }
        view
    }

    /// Send a direct message. Returns whether the frame went out; the
    /// message itself appears only once the daemon echoes it back.
    pub fn send_direct(&self, target: &PeerId, body: &str) -> bool {
        self.connection.send(&OutboundFrame::direct(target, body))
    }

    /// Send to every member of a group.
    pub fn send_group(&self, group: &GroupId, body: &str) -> bool {
        self.connection.send(&OutboundFrame::group(group, body))
    }

    /// Send to the currently open conversation.
    pub fn send_to_open_chat(&self, body: &str) -> bool {
        let target = self.lock_state().selected.clone();
        match target {
            Some(ChatTarget::Direct(peer)) => self.send_direct(&peer, body),
            Some(ChatTarget::Group(group)) => self.send_group(&group, body),
            None => false,
        }
    }

    /// Messages currently visible for a chat (the windowed suffix,
    /// oldest first) plus the window description.
    pub fn visible_messages(&self, chat_id: &ChatId) -> (Vec<Message>, WindowView) {
        let guard = self.lock_state();
        let state = &*guard;
        let view = state.windows.view(&state.store, chat_id);
        let all = state.store.messages(chat_id);
        let start = all.len() - view.displayed_count;
        (all[start..].to_vec(), view)
    }

    /// Reveal another page of older messages. `viewport` carries the
    /// pre-mutation measurements when a real viewport is attached.
    pub fn load_older(&self, chat_id: &ChatId, viewport: Option<ViewportMetrics>) -> WindowView {
        let mut guard = self.lock_state();
        let state = &mut *guard;
        let before = state.windows.view(&state.store, chat_id);
        let after = state.windows.load_older(&state.store, chat_id);
        if after.displayed_count > before.displayed_count {
            if let Some(metrics) = viewport {
                state.scroll.on_load_older(metrics);
            }
        }
        after
    }

    /// Forward a scroll or resize observation to the scroll policy.
    pub fn observe_viewport(&self, metrics: ViewportMetrics) {
        self.lock_state().scroll.observe(metrics);
    }

    /// Post-paint hook: the scroll offset to apply now, if any.
    pub fn scroll_correction(&self, metrics: ViewportMetrics) -> Option<f64> {
        self.lock_state().scroll.take_correction(metrics)
    }

    /// Confirmed friends from the daemon.
    pub async fn friends(&self) -> Result<Vec<Friend>> {
        self.api.friends().await
    }

    /// Group chats the local identity belongs to.
    pub async fn group_chats(&self) -> Result<Vec<GroupChat>> {
        self.api.group_chats().await
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.current_state()
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    /// Key of the currently open conversation, if any.
    pub fn selected_chat(&self) -> Option<ChatId> {
        self.lock_state().selected.as_ref().map(ChatTarget::chat_id)
    }

    async fn fetch_history(&self, target: &ChatTarget) -> Result<Vec<Message>> {
        match target {
            ChatTarget::Direct(peer) => self.api.direct_history(&self.local_id, peer).await,
            ChatTarget::Group(group) => self.api.group_history(&self.local_id, group).await,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Inbound frame handler, run on the connection task. Resolves the
/// conversation, appends, widens the window, and nudges the scroll
/// policy when the open chat is the one that grew.
fn on_inbound(
    state: &Arc<Mutex<SessionState>>,
    local_id: &PeerId,
    events_tx: &mpsc::UnboundedSender<SessionEvent>,
    frame: &InboundFrame,
) {
    let message = frame.clone().into_message(local_id);
    let chat_id = message.chat_id.clone();

    {
        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *guard;
        if !state.store.append(message.clone()) {
            debug!(chat = %chat_id, "Duplicate delivery ignored");
            return;
        }
        state.windows.on_append(&chat_id);
        let selected = state
            .selected
            .as_ref()
            .map_or(false, |target| target.chat_id() == chat_id);
        if selected {
            state.scroll.on_live_append();
        }
    }

    let _ = events_tx.send(SessionEvent::Message { message });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::{SinkExt, StreamExt};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    use parley_net::{spawn_connection, ConnectionConfig};

    // -- HTTP stub ---------------------------------------------------------

    /// Read one full HTTP request: headers plus a content-length body.
    async fn read_request(sock: &mut TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let content_length = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    return buf;
                }
            }
            match sock.read(&mut chunk).await {
                Ok(0) | Err(_) => return buf,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
    }

    async fn respond(sock: &mut TcpStream, status: u16, body: &str) {
        let reason = if status == 200 { "OK" } else { "Error" };
        let response = format!(
            "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = sock.write_all(response.as_bytes()).await;
        let _ = sock.shutdown().await;
    }

    /// Serve the same status and body to every request.
    async fn http_stub(status: u16, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            loop {
                let (mut sock, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let body = body.clone();
                tokio::spawn(async move {
                    read_request(&mut sock).await;
                    respond(&mut sock, status, &body).await;
                });
            }
        });
        base
    }

    fn direct_history_json(bodies: &[&str]) -> String {
        let entries: Vec<String> = bodies
            .iter()
            .enumerate()
            .map(|(i, body)| {
                format!(
                    r#"{{"Message":"{body}","SendTime":"2024-01-15T10:{:02}:00Z","IsOutgoing":false}}"#,
                    i
                )
            })
            .collect();
        format!(r#"{{"Messages":[{}]}}"#, entries.join(","))
    }

    // -- Session fixtures ---------------------------------------------------

    fn offline_connection() -> ConnectionHandle {
        // Never told to connect; sends fail and no frames arrive.
        spawn_connection(ConnectionConfig {
            ws_url: "ws://127.0.0.1:9".to_string(),
            reconnect_delay: Duration::from_millis(50),
        })
        .unwrap()
    }

    fn offline_session(base_url: &str) -> (ChatSession, mpsc::UnboundedReceiver<SessionEvent>) {
        ChatSession::start(offline_connection(), ApiClient::new(base_url), PeerId::new("p1"))
    }

    // -- Tests ---------------------------------------------------------------

    #[tokio::test]
    async fn test_open_chat_fetches_and_windows_history() {
        let bodies: Vec<String> = (1..=25).map(|i| format!("msg {i}")).collect();
        let refs: Vec<&str> = bodies.iter().map(String::as_str).collect();
        let base = http_stub(200, direct_history_json(&refs)).await;

        let (session, _events) = offline_session(&base);
        let target = ChatTarget::Direct(PeerId::new("p2"));
        let view = session.open_chat(&target).await;
        assert_eq!(view.displayed_count, 10);
        assert!(view.has_more);

        let chat = target.chat_id();
        let (visible, _) = session.visible_messages(&chat);
        assert_eq!(visible.len(), 10);
        assert_eq!(visible.first().unwrap().body, "msg 16");
        assert_eq!(visible.last().unwrap().body, "msg 25");

        let view = session.load_older(&chat, None);
        assert_eq!(view.displayed_count, 20);
        let view = session.load_older(&chat, None);
        assert_eq!((view.displayed_count, view.has_more), (25, false));
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_existing_log() {
        let hits = Arc::new(AtomicUsize::new(0));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let (mut sock, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    read_request(&mut sock).await;
                    if n == 0 {
                        respond(&mut sock, 200, &direct_history_json(&["first load"])).await;
                    } else {
                        respond(&mut sock, 500, "").await;
                    }
                });
            }
        });

        let (session, _events) = offline_session(&base);
        let target = ChatTarget::Direct(PeerId::new("p2"));
        session.open_chat(&target).await;
        assert_eq!(session.visible_messages(&target.chat_id()).0.len(), 1);

        // The daemon errors this time; the log must survive untouched.
        let view = session.open_chat(&target).await;
        assert_eq!(view.displayed_count, 1);
        let (visible, _) = session.visible_messages(&target.chat_id());
        assert_eq!(visible[0].body, "first load");
    }

    #[tokio::test]
    async fn test_stale_history_fetch_discarded() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let server_gate = gate.clone();
        tokio::spawn(async move {
            loop {
                let (mut sock, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let gate = server_gate.clone();
                tokio::spawn(async move {
                    let request = read_request(&mut sock).await;
                    let request = String::from_utf8_lossy(&request).to_string();
                    if request.contains(r#""peer_id":"slow""#) {
                        gate.notified().await;
                        respond(&mut sock, 200, &direct_history_json(&["stale entry"])).await;
                    } else {
                        respond(&mut sock, 200, &direct_history_json(&["fresh entry"])).await;
                    }
                });
            }
        });

        let (session, _events) = offline_session(&base);
        let session = Arc::new(session);
        let slow_target = ChatTarget::Direct(PeerId::new("slow"));
        let fast_target = ChatTarget::Direct(PeerId::new("fast"));

        let slow_session = session.clone();
        let slow_open = tokio::spawn(async move {
            slow_session
                .open_chat(&ChatTarget::Direct(PeerId::new("slow")))
                .await
        });

        // Let the slow fetch get in flight, then move on.
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.open_chat(&fast_target).await;

        gate.notify_one();
        let stale_view = timeout(Duration::from_secs(5), slow_open)
            .await
            .expect("timed out")
            .unwrap();

        assert_eq!(stale_view.displayed_count, 0);
        assert!(session.visible_messages(&slow_target.chat_id()).0.is_empty());
        assert_eq!(session.visible_messages(&fast_target.chat_id()).0.len(), 1);
        assert_eq!(session.selected_chat(), Some(fast_target.chat_id()));
    }

    #[tokio::test]
    async fn test_send_materializes_only_on_echo() {
        let base = http_stub(200, r#"{"Messages":null}"#.to_string()).await;

        // WebSocket stub the test drives by hand.
        let ws_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ws_url = format!("ws://{}", ws_listener.local_addr().unwrap());
        let (client_frames_tx, mut client_frames_rx) = mpsc::unbounded_channel::<String>();
        let (push_tx, mut push_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            let (stream, _) = ws_listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let (mut sink, mut source) = ws.split();
            loop {
                tokio::select! {
                    Some(text) = push_rx.recv() => {
                        if sink.send(WsMessage::Text(text.into())).await.is_err() {
                            return;
                        }
                    }
                    frame = source.next() => match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            let _ = client_frames_tx.send(text.to_string());
                        }
                        Some(Ok(_)) => {}
                        _ => return,
                    },
                }
            }
        });

        let connection = spawn_connection(ConnectionConfig {
            ws_url,
            reconnect_delay: Duration::from_millis(50),
        })
        .unwrap();
        connection.connect();
        let mut state_rx = connection.state();
        timeout(
            Duration::from_secs(5),
            state_rx.wait_for(|s| *s == ConnectionState::Open),
        )
        .await
        .expect("timed out")
        .expect("supervisor gone");

        let (session, mut events) = ChatSession::start(
            connection.clone(),
            ApiClient::new(&base),
            PeerId::new("p1"),
        );
        let target = ChatTarget::Direct(PeerId::new("p2"));
        session.open_chat(&target).await;

        assert!(session.send_to_open_chat("hello there"));

        // The daemon got the frame; the local log must not have it yet.
        let sent = timeout(Duration::from_secs(5), client_frames_rx.recv())
            .await
            .expect("timed out")
            .expect("stub gone");
        assert!(sent.contains("hello there"));
        assert!(session.visible_messages(&target.chat_id()).0.is_empty());

        // The echo arrives; now it materializes, flagged outgoing.
        let echo = r#"{"type":"DIRECT_MESSAGE","payload":{"sender_peer_id":"p1","target_peer_id":"p2","message":"hello there","Time":"2024-01-15T12:00:00Z"}}"#;
        push_tx.send(echo.to_string()).unwrap();

        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out")
            .expect("session gone");
        match event {
            SessionEvent::Message { message } => {
                assert!(message.outgoing);
                assert_eq!(message.body, "hello there");
                assert_eq!(message.chat_id, target.chat_id());
            }
            other => panic!("unexpected event: {other:?}"),
        }
        let (visible, view) = session.visible_messages(&target.chat_id());
        assert_eq!(visible.len(), 1);
        assert_eq!(view.displayed_count, 1);

        // A duplicate delivery of the same echo is absorbed; the next
        // distinct frame still lands.
        push_tx.send(echo.to_string()).unwrap();
        let reply = r#"{"type":"DIRECT_MESSAGE","payload":{"sender_peer_id":"p2","target_peer_id":"p1","message":"reply","Time":"2024-01-15T12:00:01Z"}}"#;
        push_tx.send(reply.to_string()).unwrap();

        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out")
            .expect("session gone");
        match event {
            SessionEvent::Message { message } => assert_eq!(message.body, "reply"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(session.visible_messages(&target.chat_id()).0.len(), 2);

        connection.disconnect();
    }

    #[tokio::test]
    async fn test_send_while_disconnected_is_lost_silently() {
        let base = http_stub(200, r#"{"Messages":null}"#.to_string()).await;
        let (session, _events) = offline_session(&base);
        let target = ChatTarget::Direct(PeerId::new("p2"));
        session.open_chat(&target).await;

        assert!(!session.send_to_open_chat("into the void"));
        assert!(session.visible_messages(&target.chat_id()).0.is_empty());
    }

    #[tokio::test]
    async fn test_send_with_no_chat_open_fails() {
        let base = http_stub(200, r#"{"Messages":null}"#.to_string()).await;
        let (session, _events) = offline_session(&base);
        assert!(!session.send_to_open_chat("to nowhere"));
    }
}
