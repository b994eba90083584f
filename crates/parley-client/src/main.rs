//! Parley terminal client.
//!
//! A line-oriented chat client for a locally running daemon: lists the
//! roster, opens direct or group conversations, pages back through
//! history, and prints live messages as they arrive.

use anyhow::Context;
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use parley_client::{ApiClient, ChatSession, ChatTarget, ClientConfig, SessionEvent};
use parley_net::{spawn_connection, ConnectionConfig};
use parley_shared::{ChatId, GroupId, Message, PeerId};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ClientConfig::from_env();
    let api = ApiClient::new(&config.api_url);

    let local_id = resolve_identity(&api, &config).await?;
    println!("signed in as {}", local_id.short());

    let connection = spawn_connection(ConnectionConfig {
        ws_url: config.ws_url.clone(),
        ..ConnectionConfig::default()
    })?;
    connection.connect();

    let (session, events) = ChatSession::start(connection.clone(), api, local_id);

    print_roster(&session).await;
    print_help();

    run_repl(&session, events).await?;

    connection.disconnect();
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("parley_client=info,parley_net=info,parley_store=info,warn")
    });
    // Logs go to stderr; stdout belongs to the conversation.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// The local peer id, from configuration or from the daemon itself.
async fn resolve_identity(api: &ApiClient, config: &ClientConfig) -> anyhow::Result<PeerId> {
    if let Some(id) = &config.peer_id {
        return Ok(PeerId::new(id));
    }
    let status = api
        .status()
        .await
        .context("daemon unreachable; is it running?")?;
    match status.peer_id {
        Some(id) => Ok(PeerId::new(id)),
        None => anyhow::bail!("daemon reports state '{}' and no peer id yet", status.state),
    }
}

async fn run_repl(
    session: &ChatSession,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Message { message }) => {
                    if session.selected_chat().as_ref() == Some(&message.chat_id) {
                        print_message(&message);
                    } else {
                        println!("-- new message in {} --", message.chat_id);
                    }
                }
                Some(SessionEvent::Connection(state)) => {
                    println!("-- connection {state} --");
                }
                None => return Ok(()),
            },
            line = lines.next_line() => {
                let Some(line) = line? else { return Ok(()) };
                if !handle_line(session, line.trim()).await {
                    return Ok(());
                }
            }
        }
    }
}

/// Dispatch one input line. Returns false when the user asked to leave.
async fn handle_line(session: &ChatSession, line: &str) -> bool {
    match line {
        "" => {}
        "exit" | "quit" => return false,
        "/help" => print_help(),
        "/friends" | "/groups" => print_roster(session).await,
        "/older" => match session.selected_chat() {
            Some(chat_id) => {
                session.load_older(&chat_id, None);
                print_window(session, &chat_id);
            }
            None => println!("no chat open; /dm <peer-id> or /group <group-id> first"),
        },
        _ => {
            if let Some(peer) = line.strip_prefix("/dm ") {
                open(session, ChatTarget::Direct(PeerId::new(peer))).await;
            } else if let Some(group) = line.strip_prefix("/group ") {
                open(session, ChatTarget::Group(GroupId::new(group))).await;
            } else if line.starts_with('/') {
                println!("unknown command; /help lists them");
            } else if session.selected_chat().is_none() {
                println!("no chat open; nothing sent");
            } else if !session.send_to_open_chat(line) {
                println!("not connected; message dropped");
            }
        }
    }
    true
}

async fn open(session: &ChatSession, target: ChatTarget) {
    let chat_id = target.chat_id();
    session.open_chat(&target).await;
    print_window(session, &chat_id);
}

fn print_window(session: &ChatSession, chat_id: &ChatId) {
    let (messages, view) = session.visible_messages(chat_id);
    println!("== {chat_id} ==");
    if view.has_more {
        println!("   (older messages hidden; /older reveals another page)");
    }
    if messages.is_empty() {
        println!("   (no messages yet)");
    }
    for message in &messages {
        print_message(message);
    }
}

fn print_message(message: &Message) {
    let stamp = message.sent_at.with_timezone(&Local).format("%H:%M");
    let who = if message.outgoing {
        "you".to_string()
    } else {
        message.sender_id.short()
    };
    println!("[{stamp}] {who}: {}", message.body);
}

async fn print_roster(session: &ChatSession) {
    match session.friends().await {
        Ok(friends) if friends.is_empty() => println!("no friends yet"),
        Ok(friends) => {
            println!("friends:");
            for friend in &friends {
                let marker = if friend.is_online { "*" } else { " " };
                println!("  {marker} {}  ({})", friend.label(), friend.peer_id);
            }
        }
        Err(e) => warn!(error = %e, "Could not fetch friends"),
    }
    match session.group_chats().await {
        Ok(groups) if groups.is_empty() => {}
        Ok(groups) => {
            println!("groups:");
            for group in &groups {
                println!("    {}  ({})", group.name, group.group_id);
            }
        }
        Err(e) => warn!(error = %e, "Could not fetch group chats"),
    }
}

fn print_help() {
    println!("commands: /dm <peer-id>, /group <group-id>, /older, /friends, /groups, /help, exit");
    println!("anything else is sent to the open chat");
}
