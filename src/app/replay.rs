// LogPilot - app/replay.rs
//
// File-backed log transport: streams newline-delimited JSON frames from a
// capture file and keeps following it as new frames are appended.
//
// Architecture:
//   - `ReplayTransport` lives on the UI thread; `run_replay_reader` runs on a
//     background thread that polls the file on a fixed interval.
//   - An `Arc<AtomicBool>` cancel flag stops the reader; the poll sleep is
//     split into short slices so cancellation is honoured promptly.
//   - Frames travel to the UI thread over an mpsc channel and are filtered
//     by subscription in `poll`, so an unsubscribed host stops receiving
//     frames on the very next poll.
//   - A capture holds whatever the agent once sent, so `poll` also applies
//     the host's query: live entries only reach follow subscriptions, pages
//     only static ones, and level/unit/identifier filters are re-checked.
//
// A capture cannot be re-queried. Unit-list and page requests are accepted
// for subscribed hosts; unit catalogs and pages in the capture are delivered
// as recorded.
//
// Captures are usually recorded without an identity. Frames whose
// `client_id` is 0 are stamped with the identity the transport was opened
// with; frames that carry another identity are passed through untouched so
// the router can drop them as stale.
//
// Lines that are empty or start with '#' are skipped. Truncated/rotated
// files are re-read from the start.

use crate::app::transport::{LogTransport, TransportEvent};
use crate::core::frame::Frame;
use crate::core::query::JournalQuery;
use crate::util::constants::{
    INACTIVE_CLIENT_ID, MAX_FRAME_LINE_BYTES, REPLAY_CANCEL_CHECK_INTERVAL_MS,
    REPLAY_POLL_INTERVAL_MS,
};
use crate::util::error::TransportError;
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

/// Transport that replays a frame capture file.
pub struct ReplayTransport {
    source: PathBuf,
    /// Identity the channel is open for; `INACTIVE_CLIENT_ID` when closed.
    client_id: u32,
    event_rx: Option<mpsc::Receiver<TransportEvent>>,
    cancel_flag: Option<Arc<AtomicBool>>,
    /// Subscribed hosts and the query each was subscribed with.
    subscriptions: HashMap<String, JournalQuery>,
}

impl ReplayTransport {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            client_id: INACTIVE_CLIENT_ID,
            event_rx: None,
            cancel_flag: None,
            subscriptions: HashMap::new(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Query the host was last subscribed with.
    pub fn subscription(&self, host: &str) -> Option<&JournalQuery> {
        self.subscriptions.get(host)
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

    fn stop_reader(&mut self) {
        if let Some(flag) = &self.cancel_flag {
            flag.store(true, Ordering::SeqCst);
        }
        self.cancel_flag = None;
        self.event_rx = None;
    }
}

impl LogTransport for ReplayTransport {
    fn open(&mut self, client_id: u32) -> Result<(), TransportError> {
        if client_id == INACTIVE_CLIENT_ID {
            return Err(TransportError::InactiveIdentity);
        }
        if self.is_open() && self.client_id == client_id {
            return Ok(());
        }
        self.close();

        std::fs::metadata(&self.source).map_err(|e| TransportError::Io {
            path: self.source.clone(),
            operation: "open replay source",
            source: e,
        })?;

        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        self.event_rx = Some(rx);
        self.cancel_flag = Some(Arc::clone(&cancel));
        self.client_id = client_id;

        let path = self.source.clone();
        std::thread::spawn(move || {
            run_replay_reader(path, client_id, tx, cancel);
        });

        tracing::info!(source = %self.source.display(), client_id, "Replay transport opened");
        Ok(())
    }

    fn close(&mut self) {
        if self.is_open() {
            tracing::info!(
                source = %self.source.display(),
                client_id = self.client_id,
                subscriptions = self.subscriptions.len(),
                "Replay transport closed"
            );
        }
        self.stop_reader();
        self.subscriptions.clear();
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
        tracing::debug!(host, follow = !query.notail, "Replay subscription");
        self.subscriptions.insert(host.to_string(), query.clone());
        Ok(())
    }

    fn unsubscribe(&mut self, client_id: u32, host: &str) -> Result<(), TransportError> {
        self.check_identity(client_id)?;
        if self.subscriptions.remove(host).is_some() {
            tracing::debug!(host, "Replay subscription removed");
        }
        Ok(())
    }

    fn request_units(&mut self, client_id: u32, host: &str) -> Result<(), TransportError> {
        self.check_identity(client_id)?;
        if !self.subscriptions.contains_key(host) {
            return Err(TransportError::NotSubscribed {
                host: host.to_string(),
            });
        }
        tracing::debug!(host, "Unit list comes from the capture as recorded");
        Ok(())
    }

    fn request_page(
        &mut self,
        client_id: u32,
        host: &str,
        query: &JournalQuery,
    ) -> Result<(), TransportError> {
        self.check_identity(client_id)?;
        let Some(current) = self.subscriptions.get_mut(host) else {
            return Err(TransportError::NotSubscribed {
                host: host.to_string(),
            });
        };
        tracing::debug!(host, from = query.from, size = query.size, "Replay page request");
        current.from = query.from;
        current.size = query.size;
        Ok(())
    }

    fn poll(&mut self, limit: usize) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        let mut disconnected = false;

        if let Some(rx) = &self.event_rx {
            while events.len() < limit {
                match rx.try_recv() {
                    Ok(TransportEvent::Frame(frame)) => {
                        let restricted = self
                            .subscriptions
                            .get(&frame.host)
                            .and_then(|query| frame.restrict_to(query));
                        if let Some(frame) = restricted {
                            events.push(TransportEvent::Frame(frame));
                        }
                    }
                    Ok(other) => events.push(other),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }
        }

        if disconnected {
            tracing::warn!(source = %self.source.display(), "Replay reader exited");
            self.close();
            events.push(TransportEvent::Closed);
        }
        events
    }
}

impl Drop for ReplayTransport {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

// =============================================================================
// Background reader
// =============================================================================

/// Poll loop: reads whatever has been appended to `path` since the last
/// tick, decodes complete lines into frames, and sends them to the UI.
fn run_replay_reader(
    path: PathBuf,
    client_id: u32,
    tx: mpsc::Sender<TransportEvent>,
    cancel: Arc<AtomicBool>,
) {
    macro_rules! send {
        ($msg:expr) => {
            if tx.send($msg).is_err() {
                // Transport dropped its receiver: exit silently.
                return;
            }
        };
    }

    let mut offset: u64 = 0;
    let mut partial: Vec<u8> = Vec::new();
    let mut line_number: u64 = 0;
    let slices = (REPLAY_POLL_INTERVAL_MS / REPLAY_CANCEL_CHECK_INTERVAL_MS).max(1);

    loop {
        if cancel.load(Ordering::SeqCst) {
            return;
        }

        match std::fs::metadata(&path) {
            Ok(meta) => {
                let size = meta.len();
                if size < offset {
                    tracing::info!(
                        file = %path.display(),
                        old_offset = offset,
                        new_size = size,
                        "Replay source truncated; restarting from the top"
                    );
                    offset = 0;
                    line_number = 0;
                    partial.clear();
                }

                if size > offset {
                    let limit = ((size - offset) as usize).min(MAX_FRAME_LINE_BYTES);
                    match read_bytes_at(&path, offset, limit) {
                        Ok(bytes) => {
                            offset += bytes.len() as u64;
                            partial.extend_from_slice(&bytes);
                        }
                        Err(e) => {
                            tracing::warn!(file = %path.display(), error = %e, "Replay read error");
                            send!(TransportEvent::Warning(format!(
                                "{}: read error: {e}",
                                path.display()
                            )));
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Replay stat error");
                send!(TransportEvent::Warning(format!(
                    "{}: cannot stat: {e}",
                    path.display()
                )));
            }
        }

        // Split off complete lines; anything after the last newline waits
        // for the next tick.
        if let Some(last_nl) = partial.iter().rposition(|&b| b == b'\n') {
            let rest = partial.split_off(last_nl + 1);
            let complete = std::mem::replace(&mut partial, rest);

            for raw in complete.split(|&b| b == b'\n') {
                if cancel.load(Ordering::SeqCst) {
                    return;
                }
                if raw.is_empty() {
                    continue;
                }
                line_number += 1;
                match decode_line(raw, client_id) {
                    Some(Ok(frame)) => send!(TransportEvent::Frame(frame)),
                    Some(Err(message)) => {
                        tracing::debug!(line = line_number, %message, "Replay line skipped");
                        send!(TransportEvent::Warning(format!(
                            "{}:{line_number}: {message}",
                            path.display()
                        )));
                    }
                    None => {}
                }
            }
        } else if partial.len() >= MAX_FRAME_LINE_BYTES {
            tracing::warn!(file = %path.display(), bytes = partial.len(), "Oversized replay line discarded");
            send!(TransportEvent::Warning(format!(
                "{}: discarded a line longer than {MAX_FRAME_LINE_BYTES} bytes",
                path.display()
            )));
            partial.clear();
        }

        for _ in 0..slices {
            std::thread::sleep(Duration::from_millis(REPLAY_CANCEL_CHECK_INTERVAL_MS));
            if cancel.load(Ordering::SeqCst) {
                return;
            }
        }
    }
}

/// Decode one capture line. `None` for blank and comment lines.
fn decode_line(raw: &[u8], client_id: u32) -> Option<Result<Frame, String>> {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    if text.is_empty() || text.starts_with('#') {
        return None;
    }
    Some(
        Frame::parse(text)
            .map(|mut frame| {
                if frame.client_id == INACTIVE_CLIENT_ID {
                    frame.client_id = client_id;
                }
                frame
            })
            .map_err(|e| e.to_string()),
    )
}

/// Read up to `limit` bytes from `path` starting at byte position `offset`.
fn read_bytes_at(path: &Path, offset: u64, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; limit];
    let n = file.read(&mut buf)?;
    buf.truncate(n);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Instant;

    fn wait_for_frames(transport: &mut ReplayTransport, want: usize) -> Vec<TransportEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while Instant::now() < deadline {
            events.extend(transport.poll(100));
            let frames = events
                .iter()
                .filter(|e| matches!(e, TransportEvent::Frame(_)))
                .count();
            if frames >= want {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        events
    }

    fn frames(events: &[TransportEvent]) -> Vec<&Frame> {
        events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::Frame(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_decode_line_stamps_identity() {
        let frame = decode_line(br#"{"host":"h","type":3}"#, 77).unwrap().unwrap();
        assert_eq!(frame.client_id, 77);
        let frame = decode_line(br#"{"client_id":5,"host":"h","type":3}"#, 77)
            .unwrap()
            .unwrap();
        assert_eq!(frame.client_id, 5);
        assert!(decode_line(b"   ", 77).is_none());
        assert!(decode_line(b"# comment", 77).is_none());
        assert!(decode_line(b"{broken", 77).unwrap().is_err());
    }

    #[test]
    fn test_open_requires_live_identity_and_existing_source() {
        let mut t = ReplayTransport::new("/nonexistent/logpilot/replay.jsonl");
        assert!(matches!(t.open(0), Err(TransportError::InactiveIdentity)));
        assert!(matches!(t.open(9), Err(TransportError::Io { .. })));
        assert!(!t.is_open());
    }

    #[test]
    fn test_subscribe_requires_open_channel_and_matching_identity() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut t = ReplayTransport::new(file.path());
        let q = JournalQuery::default();
        assert!(matches!(t.subscribe(9, "h", &q), Err(TransportError::NotOpen)));
        t.open(9).unwrap();
        assert!(matches!(
            t.subscribe(10, "h", &q),
            Err(TransportError::IdentityMismatch { expected: 9, got: 10 })
        ));
        t.subscribe(9, "h", &q).unwrap();
        assert!(t.subscription("h").is_some());
        t.close();
        assert!(!t.is_open());
        assert!(t.subscription("h").is_none());
    }

    #[test]
    fn test_delivers_only_subscribed_hosts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"host":"a","type":3}}"#).unwrap();
        writeln!(file, r#"{{"host":"b","type":3}}"#).unwrap();
        writeln!(file, r#"{{"host":"a","type":6,"data":"refused"}}"#).unwrap();
        file.flush().unwrap();

        let mut t = ReplayTransport::new(file.path());
        t.open(42).unwrap();
        t.subscribe(42, "a", &JournalQuery::default()).unwrap();

        let events = wait_for_frames(&mut t, 2);
        let delivered = frames(&events);
        assert_eq!(delivered.len(), 2);
        assert!(delivered.iter().all(|f| f.host == "a" && f.client_id == 42));
    }

    fn entry_line(host: &str, message: &str, level: &str) -> String {
        format!(
            r#"{{"host":"{host}","type":4,"data":{{"type":0,"data":{{"level":"{level}","message":"{message}"}}}}}}"#
        )
    }

    fn follow(severity: &str) -> JournalQuery {
        JournalQuery {
            severity: severity.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_live_entries_stop_when_host_switches_to_static_query() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut t = ReplayTransport::new(file.path());
        t.open(5).unwrap();
        t.subscribe(5, "h", &follow("")).unwrap();

        writeln!(file, "{}", entry_line("h", "live", "6")).unwrap();
        file.flush().unwrap();
        assert_eq!(frames(&wait_for_frames(&mut t, 1)).len(), 1);

        let static_query = JournalQuery {
            severity: "3".into(),
            notail: true,
            ..Default::default()
        };
        t.subscribe(5, "h", &static_query).unwrap();
        writeln!(file, "{}", entry_line("h", "after-off", "7")).unwrap();
        writeln!(file, r#"{{"host":"h","type":3}}"#).unwrap();
        file.flush().unwrap();

        let delivered: Vec<Frame> = frames(&wait_for_frames(&mut t, 1))
            .into_iter()
            .cloned()
            .collect();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].kind, 3);
    }

    #[test]
    fn test_follow_subscription_applies_level_filter() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", entry_line("h", "debug", "7")).unwrap();
        writeln!(file, "{}", entry_line("h", "error", "3")).unwrap();
        writeln!(file, r#"{{"host":"h","type":3}}"#).unwrap();
        file.flush().unwrap();

        let mut t = ReplayTransport::new(file.path());
        t.open(5).unwrap();
        t.subscribe(5, "h", &follow("4")).unwrap();

        let events = wait_for_frames(&mut t, 2);
        let delivered = frames(&events);
        assert_eq!(delivered.len(), 2);
        let record = delivered[0].payload().unwrap();
        assert!(matches!(record, crate::core::frame::FramePayload::Records(ref r) if r[0].message == "error"));
    }

    #[test]
    fn test_requests_need_a_subscription() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut t = ReplayTransport::new(file.path());
        let page = JournalQuery {
            notail: true,
            from: 50,
            size: 50,
            ..Default::default()
        };
        assert!(matches!(t.request_units(5, "h"), Err(TransportError::NotOpen)));

        t.open(5).unwrap();
        assert!(matches!(
            t.request_units(5, "h"),
            Err(TransportError::NotSubscribed { .. })
        ));
        assert!(matches!(
            t.request_page(5, "h", &page),
            Err(TransportError::NotSubscribed { .. })
        ));

        t.subscribe(5, "h", &JournalQuery { notail: true, ..Default::default() }).unwrap();
        t.request_units(5, "h").unwrap();
        t.request_page(5, "h", &page).unwrap();
        assert_eq!(t.subscription("h").map(|q| (q.from, q.size)), Some((50, 50)));
    }

    #[test]
    fn test_follows_appended_frames_and_reports_bad_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut t = ReplayTransport::new(file.path());
        t.open(1).unwrap();
        t.subscribe(1, "a", &JournalQuery::default()).unwrap();

        writeln!(file, "not a frame").unwrap();
        writeln!(file, r#"{{"host":"a","type":3}}"#).unwrap();
        file.flush().unwrap();

        let events = wait_for_frames(&mut t, 1);
        assert_eq!(frames(&events).len(), 1);
        assert!(events
            .iter()
            .any(|e| matches!(e, TransportEvent::Warning(w) if w.contains(":1:"))));
    }
}
