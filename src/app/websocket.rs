// LogPilot - app/websocket.rs
//
// Network log transport: one websocket per subscribed host through the log
// server's proxy at `<server>/ws/proxy`.
//
// Per host link:
//   1. connect with the client identity in the `clientid` handshake header
//   2. send the agent address (`<host>:9995`); the proxy dials the agent and
//      answers with a connected or dial-failed frame
//   3. forward update-options, unit-list and update-page frames; relay the
//      agent's frames back, stamped with the host and identity
//
// Each link runs on its own thread. The socket has a short read timeout so
// queued requests and the cancel flag are looked at between reads. A link
// that cannot connect, or that the server drops, reports a dial-failed
// frame for its host; the other hosts keep streaming.
//
// Only plain `ws://` is spoken; an `https://` server needs a replay source
// or a TLS-terminating proxy in front.

use crate::app::transport::{LogTransport, TransportEvent};
use crate::core::frame::{Frame, MessageKind};
use crate::core::query::JournalQuery;
use crate::util::constants::{
    AGENT_PORT, CLIENT_ID_HEADER, INACTIVE_CLIENT_ID, LINK_READ_TIMEOUT_MS, WS_PROXY_PATH,
};
use crate::util::error::TransportError;
use std::collections::HashMap;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::time::Duration;
use tungstenite::client::IntoClientRequest;
use tungstenite::http::HeaderValue;
use tungstenite::{Message, WebSocket};

/// Proxy endpoint for a server base URL (`http://h:p` -> `ws://h:p/ws/proxy`).
pub fn ws_proxy_url(server_url: &str) -> Result<String, TransportError> {
    let base = server_url.trim().trim_end_matches('/');
    let rest = base
        .strip_prefix("http://")
        .or_else(|| base.strip_prefix("ws://"))
        .filter(|rest| !rest.is_empty())
        .ok_or_else(|| TransportError::UnsupportedUrl {
            url: server_url.to_string(),
        })?;
    Ok(format!("ws://{rest}{WS_PROXY_PATH}"))
}

/// Control side of one host's link thread.
struct HostLink {
    commands: mpsc::Sender<Frame>,
    cancel: Arc<AtomicBool>,
}

impl HostLink {
    fn stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

/// Transport that talks to host agents through the server's websocket proxy.
pub struct WebSocketTransport {
    proxy_url: String,
    connect_timeout: Duration,
    client_id: u32,
    event_tx: Option<mpsc::Sender<TransportEvent>>,
    event_rx: Option<mpsc::Receiver<TransportEvent>>,
    links: HashMap<String, HostLink>,
}

impl WebSocketTransport {
    pub fn new(server_url: &str, connect_timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            proxy_url: ws_proxy_url(server_url)?,
            connect_timeout,
            client_id: INACTIVE_CLIENT_ID,
            event_tx: None,
            event_rx: None,
            links: HashMap::new(),
        })
    }

    pub fn proxy_url(&self) -> &str {
        &self.proxy_url
    }

    fn check_identity(&self, client_id: u32) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        if client_id != self.client_id {
            return Err(TransportError::IdentityMismatch {
                expected: self.client_id,
                got: client_id,
            });
        }
        Ok(())
    }

    /// Queue `frame` on the host's link.
    fn send_to(&mut self, host: &str, frame: Frame) -> Result<(), TransportError> {
        let sent = self
            .links
            .get(host)
            .is_some_and(|link| link.commands.send(frame).is_ok());
        if sent {
            Ok(())
        } else {
            // A link whose thread has exited is as good as none.
            self.links.remove(host);
            Err(TransportError::NotSubscribed {
                host: host.to_string(),
            })
        }
    }

    fn spawn_link(&mut self, host: &str, first: Frame) -> Result<(), TransportError> {
        let Some(events) = self.event_tx.clone() else {
            return Err(TransportError::NotOpen);
        };
        let (commands, command_rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        // Queued before the thread connects; sent right after the agent address.
        let _ = commands.send(first);

        let target = LinkTarget {
            url: self.proxy_url.clone(),
            client_id: self.client_id,
            host: host.to_string(),
            connect_timeout: self.connect_timeout,
        };
        let thread_cancel = Arc::clone(&cancel);
        std::thread::spawn(move || {
            run_host_link(target, command_rx, events, thread_cancel);
        });

        self.links
            .insert(host.to_string(), HostLink { commands, cancel });
        Ok(())
    }
}

impl LogTransport for WebSocketTransport {
    fn open(&mut self, client_id: u32) -> Result<(), TransportError> {
        if client_id == INACTIVE_CLIENT_ID {
            return Err(TransportError::InactiveIdentity);
        }
        if self.is_open() && self.client_id == client_id {
            return Ok(());
        }
        self.close();

        let (tx, rx) = mpsc::channel();
        self.event_tx = Some(tx);
        self.event_rx = Some(rx);
        self.client_id = client_id;
        tracing::info!(url = %self.proxy_url, client_id, "WebSocket transport opened");
        Ok(())
    }

    fn close(&mut self) {
        if self.is_open() {
            tracing::info!(
                url = %self.proxy_url,
                client_id = self.client_id,
                links = self.links.len(),
                "WebSocket transport closed"
            );
        }
        for link in self.links.values() {
            link.stop();
        }
        self.links.clear();
        self.event_tx = None;
        self.event_rx = None;
        self.client_id = INACTIVE_CLIENT_ID;
    }

    fn is_open(&self) -> bool {
        self.event_rx.is_some()
    }

    fn subscribe(
        &mut self,
        client_id: u32,
        host: &str,
        query: &JournalQuery,
    ) -> Result<(), TransportError> {
        self.check_identity(client_id)?;
        let frame = Frame::update_options(client_id, host, query.clone());
        tracing::debug!(host, follow = !query.notail, "WebSocket subscription");
        match self.send_to(host, frame.clone()) {
            Ok(()) => Ok(()),
            Err(TransportError::NotSubscribed { .. }) => self.spawn_link(host, frame),
            Err(e) => Err(e),
        }
    }

    fn unsubscribe(&mut self, client_id: u32, host: &str) -> Result<(), TransportError> {
        self.check_identity(client_id)?;
        if let Some(link) = self.links.remove(host) {
            link.stop();
            tracing::debug!(host, "WebSocket link stopped");
        }
        Ok(())
    }

    fn request_units(&mut self, client_id: u32, host: &str) -> Result<(), TransportError> {
        self.check_identity(client_id)?;
        self.send_to(host, Frame::unit_list(client_id, host))
    }

    fn request_page(
        &mut self,
        client_id: u32,
        host: &str,
        query: &JournalQuery,
    ) -> Result<(), TransportError> {
        self.check_identity(client_id)?;
        self.send_to(host, Frame::update_page(client_id, host, query.clone()))
    }

    fn poll(&mut self, limit: usize) -> Vec<TransportEvent> {
        let Some(rx) = &self.event_rx else {
            return Vec::new();
        };
        rx.try_iter().take(limit).collect()
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        for link in self.links.values() {
            link.stop();
        }
    }
}

// =============================================================================
// Host link thread
// =============================================================================

struct LinkTarget {
    url: String,
    client_id: u32,
    host: String,
    connect_timeout: Duration,
}

fn run_host_link(
    target: LinkTarget,
    commands: mpsc::Receiver<Frame>,
    tx: mpsc::Sender<TransportEvent>,
    cancel: Arc<AtomicBool>,
) {
    let LinkTarget {
        client_id, host, ..
    } = &target;
    let client_id = *client_id;

    macro_rules! send {
        ($msg:expr) => {
            if tx.send($msg).is_err() {
                // Transport closed: exit silently.
                return;
            }
        };
    }
    macro_rules! fail {
        ($reason:expr) => {{
            let reason: String = $reason;
            tracing::warn!(host = %host, %reason, "Host link failed");
            send!(TransportEvent::Frame(Frame::dial_failed(client_id, host, &reason)));
            return;
        }};
    }

    let mut socket = match connect(&target) {
        Ok(socket) => socket,
        Err(e) => fail!(e.to_string()),
    };
    tracing::debug!(host = %host, url = %target.url, "Host link connected");

    let agent = format!("{host}:{AGENT_PORT}");
    if let Err(e) = write_frame(&mut socket, &Frame::agent_addr(client_id, host, &agent)) {
        fail!(e);
    }

    let mut dial_failed = false;
    loop {
        if cancel.load(Ordering::SeqCst) {
            let _ = socket.close(None);
            let _ = socket.flush();
            return;
        }

        loop {
            match commands.try_recv() {
                Ok(frame) => {
                    if let Err(e) = write_frame(&mut socket, &frame) {
                        fail!(e);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    let _ = socket.close(None);
                    let _ = socket.flush();
                    return;
                }
            }
        }

        let text = match socket.read() {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(_) => continue,
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
            {
                continue
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                if dial_failed || cancel.load(Ordering::SeqCst) {
                    return;
                }
                fail!("connection closed by server".to_string());
            }
            Err(e) => fail!(e.to_string()),
        };

        match Frame::parse(&text) {
            Ok(mut frame) => {
                frame.client_id = client_id;
                frame.host = host.clone();
                if frame.message_kind().ok() == Some(MessageKind::DialFailed) {
                    dial_failed = true;
                }
                send!(TransportEvent::Frame(frame));
            }
            Err(e) => {
                tracing::debug!(host = %host, error = %e, "Undecodable frame from proxy");
                send!(TransportEvent::Warning(format!("{host}: {e}")));
            }
        }
    }
}

fn connect(target: &LinkTarget) -> Result<WebSocket<TcpStream>, TransportError> {
    let fail = |reason: String| TransportError::Connect {
        url: target.url.clone(),
        reason,
    };

    let mut request = target
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| fail(e.to_string()))?;
    request
        .headers_mut()
        .insert(CLIENT_ID_HEADER, HeaderValue::from(target.client_id));

    let host = request
        .uri()
        .host()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
        .ok_or_else(|| fail("URL has no host".to_string()))?;
    let port = request.uri().port_u16().unwrap_or(80);
    let addr = (host.as_str(), port)
        .to_socket_addrs()
        .map_err(|e| fail(e.to_string()))?
        .next()
        .ok_or_else(|| fail(format!("'{host}' did not resolve")))?;

    let stream =
        TcpStream::connect_timeout(&addr, target.connect_timeout).map_err(|e| fail(e.to_string()))?;
    stream
        .set_read_timeout(Some(target.connect_timeout))
        .and_then(|()| stream.set_write_timeout(Some(target.connect_timeout)))
        .map_err(|e| fail(e.to_string()))?;

    let (socket, _response) =
        tungstenite::client(request, stream).map_err(|e| fail(e.to_string()))?;
    socket
        .get_ref()
        .set_read_timeout(Some(Duration::from_millis(LINK_READ_TIMEOUT_MS)))
        .map_err(|e| fail(e.to_string()))?;
    Ok(socket)
}

fn write_frame(socket: &mut WebSocket<TcpStream>, frame: &Frame) -> Result<String, String> {
    let line = frame.to_line().map_err(|e| e.to_string())?;
    socket
        .send(Message::Text(line.clone()))
        .map_err(|e| e.to_string())?;
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::FramePayload;
    use serde_json::Value;
    use std::net::TcpListener;
    use std::time::Instant;
    use tungstenite::handshake::server::{ErrorResponse, Request, Response};

    /// One-connection proxy stand-in. Reports the handshake identity and
    /// every message it receives, and answers like a proxy with a live agent.
    fn serve_proxy() -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, seen_rx) = mpsc::channel();
        std::thread::spawn(move || {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let header_tx = seen_tx.clone();
            let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                let id = req
                    .headers()
                    .get(CLIENT_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                let _ = header_tx.send(format!("clientid={id}"));
                Ok(resp)
            };
            let Ok(mut ws) = tungstenite::accept_hdr(stream, callback) else {
                return;
            };
            while let Ok(message) = ws.read() {
                let Message::Text(text) = message else {
                    continue;
                };
                let kind = serde_json::from_str::<Value>(&text).unwrap()["type"]
                    .as_u64()
                    .unwrap();
                let _ = seen_tx.send(text);
                let reply = match kind {
                    1 => r#"{"type":3}"#,
                    0 => r#"{"type":4,"data":{"type":0,"data":{"level":"6","message":"hello"}}}"#,
                    2 => r#"{"type":4,"data":{"type":1,"data":{"systemd":["sshd"]}}}"#,
                    5 => r#"{"type":4,"data":{"type":0,"data":{"total":120,"hits":[{"message":"p"}]}}}"#,
                    _ => continue,
                };
                if ws.send(Message::Text(reply.to_string())).is_err() {
                    break;
                }
            }
            let _ = seen_tx.send("closed".to_string());
        });
        (format!("http://{addr}"), seen_rx)
    }

    fn wait_for_frames(t: &mut WebSocketTransport, want: usize) -> Vec<Frame> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut frames = Vec::new();
        while frames.len() < want && Instant::now() < deadline {
            for event in t.poll(100) {
                if let TransportEvent::Frame(f) = event {
                    frames.push(f);
                }
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        frames
    }

    fn next_seen(rx: &mpsc::Receiver<String>) -> String {
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    fn seen_json(rx: &mpsc::Receiver<String>) -> Value {
        serde_json::from_str(&next_seen(rx)).unwrap()
    }

    #[test]
    fn test_proxy_url_from_server_url() {
        assert_eq!(
            ws_proxy_url("http://10.0.0.1:9995/").unwrap(),
            "ws://10.0.0.1:9995/ws/proxy"
        );
        assert_eq!(ws_proxy_url("ws://logs").unwrap(), "ws://logs/ws/proxy");
        for bad in ["https://logs", "logs:9995", "http://"] {
            assert!(
                matches!(ws_proxy_url(bad), Err(TransportError::UnsupportedUrl { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_requests_need_open_channel_and_link() {
        let mut t = WebSocketTransport::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let q = JournalQuery::default();
        assert!(matches!(t.open(0), Err(TransportError::InactiveIdentity)));
        assert!(matches!(t.subscribe(3, "h", &q), Err(TransportError::NotOpen)));

        t.open(3).unwrap();
        assert!(matches!(
            t.subscribe(4, "h", &q),
            Err(TransportError::IdentityMismatch { expected: 3, got: 4 })
        ));
        assert!(matches!(
            t.request_units(3, "h"),
            Err(TransportError::NotSubscribed { .. })
        ));
        assert!(matches!(
            t.request_page(3, "h", &q),
            Err(TransportError::NotSubscribed { .. })
        ));
        t.unsubscribe(3, "h").unwrap();
        t.close();
        assert!(!t.is_open());
    }

    #[test]
    fn test_link_dials_agent_and_relays_frames() {
        let (base, seen) = serve_proxy();
        let mut t = WebSocketTransport::new(&base, Duration::from_secs(5)).unwrap();
        t.open(7).unwrap();
        t.subscribe(7, "10.0.0.9", &JournalQuery::default()).unwrap();

        let frames = wait_for_frames(&mut t, 2);
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.host == "10.0.0.9" && f.client_id == 7));
        assert_eq!(frames[0].payload().unwrap(), FramePayload::Connected);
        assert!(matches!(
            frames[1].payload().unwrap(),
            FramePayload::Records(ref r) if r[0].message == "hello"
        ));

        t.request_units(7, "10.0.0.9").unwrap();
        let frames = wait_for_frames(&mut t, 1);
        assert!(matches!(frames[0].payload().unwrap(), FramePayload::Units(ref u) if u.systemd == ["sshd"]));

        let page = JournalQuery {
            notail: true,
            from: 50,
            size: 50,
            ..Default::default()
        };
        t.request_page(7, "10.0.0.9", &page).unwrap();
        let frames = wait_for_frames(&mut t, 1);
        assert!(matches!(frames[0].payload().unwrap(), FramePayload::Page { total: 120, .. }));

        assert_eq!(next_seen(&seen), "clientid=7");
        let addr = seen_json(&seen);
        assert_eq!(addr["type"], 1);
        assert_eq!(addr["data"], "10.0.0.9:9995");
        assert_eq!(seen_json(&seen)["type"], 0);
        assert_eq!(seen_json(&seen)["type"], 2);
        let paged = seen_json(&seen);
        assert_eq!(paged["type"], 5);
        assert_eq!(paged["joptions"]["from"], 50);

        t.unsubscribe(7, "10.0.0.9").unwrap();
        assert_eq!(next_seen(&seen), "closed");
    }

    #[test]
    fn test_unreachable_proxy_reports_dial_failure_for_host() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let mut t =
            WebSocketTransport::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        t.open(7).unwrap();
        t.subscribe(7, "h", &JournalQuery::default()).unwrap();

        let frames = wait_for_frames(&mut t, 1);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].host, "h");
        assert!(matches!(
            frames[0].payload().unwrap(),
            FramePayload::DialFailed(ref reason) if reason.contains("cannot connect")
        ));
        assert!(t.is_open());
    }
}
