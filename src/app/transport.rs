// LogPilot - app/transport.rs
//
// Seam between the search session and whatever carries log frames.
//
// A transport is opened with the session's client identity, told which
// hosts to deliver for (with the agent query to run), and polled by the UI
// thread each frame. It never blocks the caller: implementations do their
// I/O on a background thread and hand results over a channel.
//
// Delivery for a host must stop as soon as it is unsubscribed or the
// transport is closed; confirming that the remote side honoured the request
// is the implementation's concern, not the session's.

use crate::core::frame::Frame;
use crate::core::query::JournalQuery;
use crate::util::error::TransportError;

/// Messages a transport hands to the UI thread.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A frame for a subscribed host.
    Frame(Frame),
    /// A non-fatal problem (unreadable line, malformed frame, ...).
    Warning(String),
    /// The channel closed on its own (source gone, reader exited).
    Closed,
}

/// A streaming channel for log frames.
pub trait LogTransport {
    /// Open the channel for `client_id`. Reopening with the same identity is
    /// a no-op; reopening with another identity restarts the channel.
    fn open(&mut self, client_id: u32) -> Result<(), TransportError>;

    /// Close the channel and forget all subscriptions.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Start (or restart with a new query) delivery for `host`.
    fn subscribe(
        &mut self,
        client_id: u32,
        host: &str,
        query: &JournalQuery,
    ) -> Result<(), TransportError>;

    /// Stop delivery for `host`. Unknown hosts are ignored.
    fn unsubscribe(&mut self, client_id: u32, host: &str) -> Result<(), TransportError>;

    /// Ask a subscribed host's agent for its unit catalog.
    fn request_units(&mut self, client_id: u32, host: &str) -> Result<(), TransportError>;

    /// Ask a subscribed host's agent for another window of its static
    /// result; `query` carries the wanted `from`/`size`.
    fn request_page(
        &mut self,
        client_id: u32,
        host: &str,
        query: &JournalQuery,
    ) -> Result<(), TransportError>;

    /// Drain pending events without blocking, at most `limit` of them.
    fn poll(&mut self, limit: usize) -> Vec<TransportEvent>;
}

/// Transport used when the server URL cannot carry a websocket and no
/// replay source is given: it never opens, so turning streaming on yields a
/// warning instead of silently doing nothing.
#[derive(Debug, Default)]
pub struct UnconfiguredTransport;

impl LogTransport for UnconfiguredTransport {
    fn open(&mut self, _client_id: u32) -> Result<(), TransportError> {
        Err(TransportError::Unavailable)
    }

    fn close(&mut self) {}

    fn is_open(&self) -> bool {
        false
    }

    fn subscribe(
        &mut self,
        _client_id: u32,
        _host: &str,
        _query: &JournalQuery,
    ) -> Result<(), TransportError> {
        Err(TransportError::NotOpen)
    }

    fn unsubscribe(&mut self, _client_id: u32, _host: &str) -> Result<(), TransportError> {
        Err(TransportError::NotOpen)
    }

    fn request_units(&mut self, _client_id: u32, _host: &str) -> Result<(), TransportError> {
        Err(TransportError::NotOpen)
    }

    fn request_page(
        &mut self,
        _client_id: u32,
        _host: &str,
        _query: &JournalQuery,
    ) -> Result<(), TransportError> {
        Err(TransportError::NotOpen)
    }

    fn poll(&mut self, _limit: usize) -> Vec<TransportEvent> {
        Vec::new()
    }
}
