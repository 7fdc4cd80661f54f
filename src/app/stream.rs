// LogPilot - app/stream.rs
//
// Stream coordinator: turns session change events into transport calls.
//
//   StreamingChanged(on)   open(client_id), subscribe every configured host
//   StreamingChanged(off)  unsubscribe everything, close
//   ConfigUpserted         (re)subscribe that host while streaming
//   Reset                  unsubscribe the cleared hosts, close
//   Disposed               unsubscribe with the old identity, close
//
// Events are handled against the session as it is when `pump` runs, so a
// host upserted and then cleared within the same UI frame is never
// subscribed. Transport failures become status warnings; nothing is retried.
//
// Unit-list and page requests from the UI go through `dispatch` and are
// only forwarded for hosts this coordinator has subscribed.

use crate::app::state::HostRequest;
use crate::app::transport::LogTransport;
use crate::core::query::{JournalQuery, Page};
use crate::core::session::{SearchSession, SessionEvent};
use crate::util::constants::{INACTIVE_CLIENT_ID, MAX_SESSION_EVENTS_PER_FRAME};
use std::sync::mpsc;

pub struct StreamCoordinator {
    events: mpsc::Receiver<SessionEvent>,
    /// Identity the transport was opened with by this coordinator.
    open_id: u32,
    /// Hosts currently subscribed, in subscription order.
    subscribed: Vec<String>,
}

impl StreamCoordinator {
    /// Start observing `session`.
    pub fn attach(session: &mut SearchSession) -> Self {
        Self {
            events: session.subscribe(),
            open_id: INACTIVE_CLIENT_ID,
            subscribed: Vec::new(),
        }
    }

    pub fn subscribed_hosts(&self) -> &[String] {
        &self.subscribed
    }

    /// The transport closed itself; forget what was subscribed.
    pub fn transport_closed(&mut self) {
        self.subscribed.clear();
        self.open_id = INACTIVE_CLIENT_ID;
    }

    /// Handle pending session events. Returns warnings for the status bar.
    pub fn pump(
        &mut self,
        session: &SearchSession,
        transport: &mut dyn LogTransport,
    ) -> Vec<String> {
        let mut warnings = Vec::new();
        let events: Vec<SessionEvent> = self
            .events
            .try_iter()
            .take(MAX_SESSION_EVENTS_PER_FRAME)
            .collect();
        for event in events {
            tracing::debug!(?event, "Coordinator handling session event");
            match event {
                SessionEvent::StreamingChanged { enabled: true } => {
                    self.start(session, transport, &mut warnings);
                }
                SessionEvent::StreamingChanged { enabled: false } => {
                    self.stop(transport, &mut warnings);
                }
                SessionEvent::ConfigUpserted { host, .. } => {
                    if session.streaming_enabled()
                        && transport.is_open()
                        && self.open_id == session.client_id()
                    {
                        self.subscribe_host(session, transport, &host, &mut warnings);
                    }
                }
                SessionEvent::Reset { hosts } => {
                    for host in &hosts {
                        self.unsubscribe_host(transport, host, &mut warnings);
                    }
                    self.stop(transport, &mut warnings);
                }
                SessionEvent::Disposed { client_id } => {
                    tracing::debug!(client_id, open_id = self.open_id, "Stopping disposed session");
                    self.stop(transport, &mut warnings);
                }
            }
        }
        warnings
    }

    /// Forward UI requests for subscribed hosts. Returns warnings for the
    /// status bar.
    pub fn dispatch(
        &mut self,
        session: &SearchSession,
        transport: &mut dyn LogTransport,
        requests: Vec<HostRequest>,
    ) -> Vec<String> {
        let mut warnings = Vec::new();
        for request in requests {
            let host = request.host().to_string();
            let live = transport.is_open() && self.open_id == session.client_id();
            if !live || !self.subscribed.contains(&host) {
                tracing::debug!(?request, "Request for a host without a stream skipped");
                continue;
            }

            let result = match request {
                HostRequest::Units(_) => transport.request_units(self.open_id, &host),
                HostRequest::Page { page, .. } => {
                    let Some(config) = session.config(&host) else {
                        continue;
                    };
                    if config.real_time {
                        tracing::debug!(host, "Follow searches are not paged");
                        continue;
                    }
                    match JournalQuery::from_config(config, page) {
                        Ok(query) => transport.request_page(self.open_id, &host, &query),
                        Err(e) => {
                            warnings.push(e.to_string());
                            continue;
                        }
                    }
                }
            };
            if let Err(e) = result {
                tracing::warn!(host, error = %e, "Host request failed");
                warnings.push(format!("{host}: request failed: {e}"));
            }
        }
        warnings
    }

    fn start(
        &mut self,
        session: &SearchSession,
        transport: &mut dyn LogTransport,
        warnings: &mut Vec<String>,
    ) {
        // A later event in the same batch may already have switched it off.
        if !session.streaming_enabled() || !session.is_active() {
            return;
        }

        let client_id = session.client_id();
        if let Err(e) = transport.open(client_id) {
            tracing::warn!(client_id, error = %e, "Cannot open log transport");
            warnings.push(format!("Streaming unavailable: {e}"));
            return;
        }
        if self.open_id != client_id {
            self.subscribed.clear();
        }
        self.open_id = client_id;

        for host in session.hosts() {
            self.subscribe_host(session, transport, &host, warnings);
        }
    }

    fn stop(&mut self, transport: &mut dyn LogTransport, warnings: &mut Vec<String>) {
        for host in std::mem::take(&mut self.subscribed) {
            if let Err(e) = transport.unsubscribe(self.open_id, &host) {
                tracing::debug!(host = %host, error = %e, "Unsubscribe failed");
                if transport.is_open() {
                    warnings.push(format!("{host}: cannot stop stream: {e}"));
                }
            }
        }
        if transport.is_open() {
            transport.close();
        }
        self.open_id = INACTIVE_CLIENT_ID;
    }

    fn subscribe_host(
        &mut self,
        session: &SearchSession,
        transport: &mut dyn LogTransport,
        host: &str,
        warnings: &mut Vec<String>,
    ) {
        let Some(config) = session.config(host) else {
            return;
        };

        let query = match JournalQuery::from_config(config, Page::default()) {
            Ok(q) => q,
            Err(e) => {
                tracing::warn!(host, error = %e, "Search not streamed");
                warnings.push(e.to_string());
                // The previous query for the host no longer reflects its search.
                self.unsubscribe_host(transport, host, warnings);
                return;
            }
        };

        match transport.subscribe(self.open_id, host, &query) {
            Ok(()) => {
                if !self.subscribed.iter().any(|h| h == host) {
                    self.subscribed.push(host.to_string());
                }
            }
            Err(e) => {
                tracing::warn!(host, error = %e, "Subscribe failed");
                warnings.push(format!("{host}: cannot start stream: {e}"));
            }
        }
    }

    fn unsubscribe_host(
        &mut self,
        transport: &mut dyn LogTransport,
        host: &str,
        warnings: &mut Vec<String>,
    ) {
        let Some(idx) = self.subscribed.iter().position(|h| h == host) else {
            return;
        };
        self.subscribed.remove(idx);
        if let Err(e) = transport.unsubscribe(self.open_id, host) {
            warnings.push(format!("{host}: cannot stop stream: {e}"));
        }
    }
}
