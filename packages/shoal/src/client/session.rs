use anyhow::Result;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;

use crate::models::ChatMessage;
use crate::ws::{ClientEvent, ServerEvent};

use super::terminal::RawModeGuard;
use super::view::{ChatView, DraftChange};

const TOGGLE_FOLLOW_BYTE: u8 = 0x10; // Ctrl-P
const QUIT_BYTES: [u8; 2] = [0x03, 0x04]; // Ctrl-C, Ctrl-D

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("relay server is unavailable")]
    Unavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RelayError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Unavailable
        } else {
            Self::Other(err.into())
        }
    }

    pub fn from_tungstenite(err: tungstenite::Error) -> Self {
        let is_connect = match &err {
            tungstenite::Error::Io(io_err) => matches!(
                io_err.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        };
        if is_connect {
            Self::Unavailable
        } else {
            Self::Other(err.into())
        }
    }
}

/// Where the relay lives.
#[derive(Debug, Clone)]
pub struct RelayAddr {
    pub host: String,
    pub port: u16,
}

impl RelayAddr {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn ws_url(&self, user: &str, token: Option<&str>) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("user", user);
        if let Some(token) = token {
            query.append_pair("token", token);
        }
        format!("ws://{}:{}/ws?{}", self.host, self.port, query.finish())
    }
}

/// One-shot history query, outside the persistent channel.
pub async fn fetch_history(addr: &RelayAddr) -> Result<Vec<ChatMessage>, RelayError> {
    let url = format!("{}/messages", addr.base_url());
    let resp = reqwest::get(&url).await.map_err(RelayError::from_reqwest)?;
    if !resp.status().is_success() {
        return Err(RelayError::Other(anyhow::anyhow!(
            "history query failed: HTTP {}",
            resp.status()
        )));
    }
    resp.json::<Vec<ChatMessage>>()
        .await
        .map_err(RelayError::from_reqwest)
}

/// Print history to stdout, either human-readable or as the raw JSON array.
pub async fn history_command(addr: &RelayAddr, json: bool) -> Result<(), RelayError> {
    let messages = fetch_history(addr).await?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&messages).map_err(anyhow::Error::from)?
        );
    } else {
        for msg in &messages {
            println!("{}", format_message(msg));
        }
    }
    Ok(())
}

/// Join the room: fetch history, open the persistent channel, and run the
/// interactive session until the user quits or the server goes away.
pub async fn join(addr: &RelayAddr, user: &str, token: Option<&str>) -> Result<(), RelayError> {
    // 1. One-shot history before the live feed starts
    let history = fetch_history(addr).await?;

    // 2. Connect the persistent channel — the Unavailable boundary
    let ws_url = addr.ws_url(user, token);
    let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url.as_str())
        .await
        .map_err(RelayError::from_tungstenite)?;

    // 3. Session phase — internal anyhow, mapped to Other at the boundary
    run_session(ws_stream, user, history).await.map_err(Into::into)
}

async fn run_session(
    ws_stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    user: &str,
    history: Vec<ChatMessage>,
) -> Result<()> {
    let (mut ws_write, mut ws_read) = ws_stream.split();

    let mut view = ChatView::new();
    {
        let mut stdout = std::io::stdout().lock();
        for msg in &history {
            writeln!(stdout, "{}", format_message(msg))?;
        }
        writeln!(
            stdout,
            "joined as {user} -- Enter sends, Ctrl-P pauses scroll, Ctrl-C quits"
        )?;
        stdout.flush()?;
    }
    view.load_history(history);

    // Raw mode for keystroke-level input; restored on drop
    let guard = RawModeGuard::enter();
    redraw_input(&view)?;

    // Blocking stdin reader thread (with poll so it can shut down cleanly)
    let (stdin_tx, mut stdin_rx) = mpsc::channel::<Vec<u8>>(64);
    let stdin_shutdown = Arc::new(AtomicBool::new(false));
    spawn_stdin_reader(stdin_tx, stdin_shutdown.clone());

    let mut quit = false;
    while !quit {
        tokio::select! {
            // Keystrokes
            Some(data) = stdin_rx.recv() => {
                for change in apply_input(&mut view, &data, user, &mut quit)? {
                    let json = serde_json::to_string(&change)?;
                    if ws_write.send(tungstenite::Message::Text(json.into())).await.is_err() {
                        quit = true;
                        break;
                    }
                }
            }

            // Server events
            Some(msg) = ws_read.next() => {
                match msg {
                    Ok(tungstenite::Message::Text(text)) => {
                        if let Ok(event) = serde_json::from_str::<ServerEvent>(&text) {
                            apply_server_event(&mut view, event)?;
                        }
                    }
                    Ok(tungstenite::Message::Close(_)) | Err(_) => {
                        break;
                    }
                    _ => {}
                }
            }

            else => break,
        }
    }

    // Shut down the stdin reader and restore the terminal
    stdin_shutdown.store(true, Ordering::Relaxed);
    drop(guard);
    eprintln!("\r\n[shoal: left the room]");
    Ok(())
}

/// Fold a chunk of raw input into the view, emitting the client events the
/// edits imply. Rendering happens here too; event ordering is preserved.
fn apply_input(
    view: &mut ChatView,
    data: &[u8],
    user: &str,
    quit: &mut bool,
) -> Result<Vec<ClientEvent>> {
    let mut events = Vec::new();
    let mut printable: Vec<u8> = Vec::new();

    let flush_printable = |view: &mut ChatView, events: &mut Vec<ClientEvent>, buf: &mut Vec<u8>| {
        if buf.is_empty() {
            return;
        }
        for c in String::from_utf8_lossy(buf).chars() {
            if view.push_char(c) == DraftChange::StartedTyping {
                events.push(ClientEvent::Typing {
                    username: user.to_string(),
                });
            }
        }
        buf.clear();
    };

    for &byte in data {
        match byte {
            b if QUIT_BYTES.contains(&b) => {
                flush_printable(view, &mut events, &mut printable);
                *quit = true;
                break;
            }
            TOGGLE_FOLLOW_BYTE => {
                flush_printable(view, &mut events, &mut printable);
                let flushed = view.toggle_follow();
                for msg in &flushed {
                    print_message(msg)?;
                }
                redraw_input(view)?;
            }
            b'\r' | b'\n' => {
                flush_printable(view, &mut events, &mut printable);
                let draft = view.take_draft();
                let was_composing = !draft.is_empty();
                let text = draft.trim().to_string();

                // Client-side mirror of the relay's validation: nothing is
                // sent for a whitespace-only draft.
                if !text.is_empty() {
                    let msg = ChatMessage {
                        id: None,
                        user: user.to_string(),
                        text: text.clone(),
                        timestamp: Utc::now(),
                    };
                    // Optimistic echo — the server will not send this back
                    view.push_local(msg.clone());
                    print_message(&msg)?;
                    events.push(ClientEvent::SendMessage {
                        user: msg.user,
                        text: msg.text,
                        timestamp: Some(msg.timestamp),
                    });
                }
                if was_composing {
                    events.push(ClientEvent::StopTyping {
                        username: user.to_string(),
                    });
                }
                redraw_input(view)?;
            }
            0x7f | 0x08 => {
                flush_printable(view, &mut events, &mut printable);
                if view.backspace() == DraftChange::StoppedTyping {
                    events.push(ClientEvent::StopTyping {
                        username: user.to_string(),
                    });
                }
                redraw_input(view)?;
            }
            b if b >= 0x20 => printable.push(b),
            _ => {}
        }
    }
    flush_printable(view, &mut events, &mut printable);
    redraw_input(view)?;

    Ok(events)
}

fn apply_server_event(view: &mut ChatView, event: ServerEvent) -> Result<()> {
    match event {
        ServerEvent::ReceiveMessage {
            user,
            text,
            timestamp,
        } => {
            let msg = ChatMessage {
                id: None,
                user,
                text,
                timestamp,
            };
            if view.push_remote(msg.clone()) {
                print_message(&msg)?;
            }
        }
        ServerEvent::UserTyping { username } => view.set_typing(&username),
        ServerEvent::UserStoppedTyping { username } => view.clear_typing(&username),
    }
    redraw_input(view)
}

fn format_message(msg: &ChatMessage) -> String {
    format!(
        "[{}] {}: {}",
        msg.timestamp.format("%H:%M"),
        msg.user,
        msg.text
    )
}

/// Print a message above the input line (raw mode, so explicit \r\n).
fn print_message(msg: &ChatMessage) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "\r\x1b[K{}\r\n", format_message(msg))?;
    stdout.flush()?;
    Ok(())
}

/// Redraw the input line: prompt, draft, and transient annotations.
fn redraw_input(view: &ChatView) -> Result<()> {
    let mut annotations = String::new();
    if !view.is_following() {
        annotations.push_str(&format!("  [paused, {} unread]", view.unread()));
    }
    if let Some(name) = view.typing_from() {
        annotations.push_str(&format!("  ({name} is typing...)"));
    }

    let mut stdout = std::io::stdout().lock();
    write!(stdout, "\r\x1b[K> {}{}", view.draft(), annotations)?;
    stdout.flush()?;
    Ok(())
}

/// Blocking stdin reader on its own thread, bridged over an mpsc channel.
fn spawn_stdin_reader(stdin_tx: mpsc::Sender<Vec<u8>>, shutdown: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        use std::io::Read;
        let stdin = std::io::stdin();
        let mut buf = [0u8; 4096];
        loop {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            // Poll stdin with a 100ms timeout so the shutdown flag is honored
            #[cfg(unix)]
            {
                use std::os::fd::AsRawFd;
                let mut pfd = nix::libc::pollfd {
                    fd: stdin.as_raw_fd(),
                    events: nix::libc::POLLIN,
                    revents: 0,
                };
                let ret = unsafe { nix::libc::poll(&mut pfd, 1, 100) };
                if ret <= 0 {
                    continue;
                }
            }
            let mut handle = stdin.lock();
            match handle.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    drop(handle);
                    if stdin_tx.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_carries_identity_claim() {
        let addr = RelayAddr {
            host: "127.0.0.1".to_string(),
            port: 5000,
        };
        assert_eq!(
            addr.ws_url("Alice Smith", None),
            "ws://127.0.0.1:5000/ws?user=Alice+Smith"
        );
        assert_eq!(
            addr.ws_url("Alice", Some("s3cret")),
            "ws://127.0.0.1:5000/ws?user=Alice&token=s3cret"
        );
    }

    #[test]
    fn enter_sends_trimmed_draft_with_optimistic_echo() {
        let mut view = ChatView::new();
        let mut quit = false;

        let events = apply_input(&mut view, b"  hi  \r", "Alice", &mut quit).unwrap();

        // typing on first char, then the send, then stopTyping
        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            ClientEvent::Typing { username } if username == "Alice"
        ));
        assert!(matches!(
            &events[1],
            ClientEvent::SendMessage { user, text, timestamp }
                if user == "Alice" && text == "hi" && timestamp.is_some()
        ));
        assert!(matches!(
            &events[2],
            ClientEvent::StopTyping { username } if username == "Alice"
        ));

        // Optimistic echo landed in the log, draft is cleared
        assert_eq!(view.log().len(), 1);
        assert_eq!(view.log()[0].text, "hi");
        assert_eq!(view.draft(), "");
        assert!(!quit);
    }

    #[test]
    fn whitespace_only_draft_sends_nothing_but_stops_typing() {
        let mut view = ChatView::new();
        let mut quit = false;

        let events = apply_input(&mut view, b"   \r", "Alice", &mut quit).unwrap();

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ClientEvent::Typing { .. }));
        assert!(matches!(&events[1], ClientEvent::StopTyping { .. }));
        assert!(view.log().is_empty());
    }

    #[test]
    fn backspace_to_empty_stops_typing() {
        let mut view = ChatView::new();
        let mut quit = false;

        let events = apply_input(&mut view, b"a\x7f", "Alice", &mut quit).unwrap();

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ClientEvent::Typing { .. }));
        assert!(matches!(&events[1], ClientEvent::StopTyping { .. }));
        assert_eq!(view.draft(), "");
    }

    #[test]
    fn quit_byte_ends_the_session() {
        let mut view = ChatView::new();
        let mut quit = false;

        let events = apply_input(&mut view, b"\x03", "Alice", &mut quit).unwrap();
        assert!(quit);
        assert!(events.is_empty());
    }
}
