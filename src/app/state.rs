// LogPilot - app/state.rs
//
// Application state management. Owns the search session, the host list,
// per-host search drafts and record panels, and status text.
// Owned by the eframe::App implementation.
//
// Panels react to session events the same way any other subscriber would:
// a new search for a host clears that host's records, a reset clears all
// panels. Inbound frames are routed through `core::routing` before they
// touch a panel.

use crate::app::transport::TransportEvent;
use crate::core::datefmt::{format_date, parse_date};
use crate::core::frame::{Frame, FramePayload};
use crate::core::model::{LogRecord, SearchConfig, ServiceFilter, TimeRange, UnitCatalog};
use crate::core::query::Page;
use crate::core::routing::{self, Route};
use crate::core::session::{SearchSession, SessionEvent};
use crate::util::constants::{MAX_WARNINGS, QUERY_TIME_PATTERN};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::mpsc;

// =============================================================================
// Per-host search form
// =============================================================================

/// Editable form state for one host, turned into a `SearchConfig` on submit.
/// Times are entered in UTC.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchDraft {
    pub since_text: String,
    pub until_text: String,
    pub level: String,
    pub service: ServiceFilter,
    pub real_time: bool,
    /// Validation message from the last failed submit.
    pub error: Option<String>,
}

impl SearchDraft {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            since_text: format_date(&config.time_range.start, QUERY_TIME_PATTERN),
            until_text: format_date(&config.time_range.end, QUERY_TIME_PATTERN),
            level: config.level.clone(),
            service: config.service.clone(),
            real_time: config.real_time,
            error: None,
        }
    }

    /// Build the complete configuration for `host`.
    ///
    /// Only the time fields are checked here; an inverted range is left for
    /// the query builder to reject.
    pub fn to_config(&self, host: &str) -> Result<SearchConfig, String> {
        let start = parse_time("start", &self.since_text)?;
        let end = parse_time("end", &self.until_text)?;
        Ok(SearchConfig {
            host: host.to_string(),
            time_range: TimeRange::new(start, end),
            level: self.level.clone(),
            service: self.service.clone(),
            real_time: self.real_time,
        })
    }
}

fn parse_time(field: &str, text: &str) -> Result<DateTime<Utc>, String> {
    parse_date(text).ok_or_else(|| {
        format!("Cannot read {field} time '{text}'; expected YYYY-MM-DD HH:MM:SS (UTC)")
    })
}

// =============================================================================
// Per-host requests
// =============================================================================

/// Request for a host's agent raised by the UI, handed to the stream
/// coordinator on the next frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRequest {
    /// Fetch the host's unit catalog.
    Units(String),
    /// Show another window of the host's static result.
    Page { host: String, page: Page },
}

impl HostRequest {
    pub fn host(&self) -> &str {
        match self {
            HostRequest::Units(host) => host,
            HostRequest::Page { host, .. } => host,
        }
    }
}

// =============================================================================
// Per-host record panel
// =============================================================================

/// What has been received for one host.
#[derive(Debug, Clone, Default)]
pub struct HostPanel {
    /// Newest last; bounded by `AppState::max_records_per_host`.
    pub records: VecDeque<LogRecord>,
    /// Size of the full static result set, when the agent reported one.
    pub total: Option<usize>,
    /// Window of the static result shown in `records`.
    pub page: Page,
    pub connected: bool,
    pub dial_error: Option<String>,
    pub units: UnitCatalog,
    /// Records evicted because the panel was full.
    pub dropped: usize,
}

impl HostPanel {
    fn push_records(&mut self, records: Vec<LogRecord>, cap: usize) {
        for record in records {
            if self.records.len() >= cap {
                self.records.pop_front();
                self.dropped += 1;
            }
            self.records.push_back(record);
        }
    }

    fn clear_results(&mut self) {
        self.records.clear();
        self.total = None;
        self.page = Page::default();
        self.dropped = 0;
    }

    /// Whether a static result continues past the shown window.
    pub fn has_next_page(&self) -> bool {
        self.total.is_some_and(|total| self.page.next().from < total)
    }

    pub fn has_previous_page(&self) -> bool {
        self.total.is_some() && self.page.from > 0
    }
}

// =============================================================================
// AppState
// =============================================================================

/// Top-level application state.
#[derive(Debug)]
pub struct AppState {
    pub session: SearchSession,

    /// This state's own subscription to session changes.
    session_events: mpsc::Receiver<SessionEvent>,

    /// Searchable hosts as last reported by the host directory.
    pub hosts: Vec<String>,

    /// Host whose search form is shown.
    pub selected_host: Option<String>,

    pub drafts: HashMap<String, SearchDraft>,

    pub panels: HashMap<String, HostPanel>,

    pub max_records_per_host: usize,

    /// Status message for the status bar.
    pub status_message: String,

    /// Non-fatal warnings, oldest first, bounded by `MAX_WARNINGS`.
    pub warnings: Vec<String>,

    /// Set by the host list panel; consumed by the app loop.
    pub request_host_refresh: bool,

    /// Unit-list and page requests waiting for the coordinator.
    pending_requests: Vec<HostRequest>,

    pub debug_mode: bool,
    pub dark_mode: bool,
    pub font_size: f32,
}

impl AppState {
    pub fn new(mut session: SearchSession, max_records_per_host: usize, debug_mode: bool) -> Self {
        let session_events = session.subscribe();
        Self {
            session,
            session_events,
            hosts: Vec::new(),
            selected_host: None,
            drafts: HashMap::new(),
            panels: HashMap::new(),
            max_records_per_host: max_records_per_host.max(1),
            status_message: "Ready. Loading host list...".to_string(),
            warnings: Vec::new(),
            request_host_refresh: false,
            pending_requests: Vec::new(),
            debug_mode,
            dark_mode: true,
            font_size: crate::util::constants::DEFAULT_FONT_SIZE,
        }
    }

    /// Replace the host list. The selection is kept if the host is still
    /// listed or still has a search.
    pub fn set_hosts(&mut self, hosts: Vec<String>) {
        self.status_message = format!("{} host(s) available.", hosts.len());
        self.hosts = hosts;
        if let Some(selected) = &self.selected_host {
            let known = self.hosts.contains(selected) || self.session.config(selected).is_some();
            if !known {
                self.selected_host = None;
            }
        }
    }

    /// Show the search form for `host`, seeding it from the host's current
    /// search or from defaults. Asks for the host's unit catalog if none has
    /// arrived yet.
    pub fn select_host(&mut self, host: &str) {
        let has_units = self.panels.get(host).is_some_and(|p| !p.units.is_empty());
        if !has_units {
            self.queue_request(HostRequest::Units(host.to_string()));
        }
        if !self.drafts.contains_key(host) {
            let config = self
                .session
                .config(host)
                .cloned()
                .unwrap_or_else(|| SearchConfig::for_host(host, Utc::now()));
            self.drafts
                .insert(host.to_string(), SearchDraft::from_config(&config));
        }
        self.selected_host = Some(host.to_string());
    }

    /// Submit the draft for `host` as its complete search configuration.
    pub fn submit_search(&mut self, host: &str) -> bool {
        let Some(draft) = self.drafts.get_mut(host) else {
            return false;
        };
        match draft.to_config(host) {
            Ok(config) => {
                draft.error = None;
                self.session.upsert_config(config);
                self.status_message = format!("Search submitted for {host}.");
                true
            }
            Err(message) => {
                tracing::debug!(host, %message, "Search draft rejected");
                draft.error = Some(message);
                false
            }
        }
    }

    /// Move a static result one window forward or back. Does nothing when
    /// the host has no further window in that direction.
    pub fn turn_page(&mut self, host: &str, forward: bool) {
        let Some(panel) = self.panels.get_mut(host) else {
            return;
        };
        let page = if forward && panel.has_next_page() {
            panel.page.next()
        } else if !forward && panel.has_previous_page() {
            panel.page.previous()
        } else {
            return;
        };
        panel.page = page;
        self.queue_request(HostRequest::Page {
            host: host.to_string(),
            page,
        });
    }

    /// Requests raised since the last call, oldest first.
    pub fn take_requests(&mut self) -> Vec<HostRequest> {
        std::mem::take(&mut self.pending_requests)
    }

    fn queue_request(&mut self, request: HostRequest) {
        // One pending request per kind and host is enough.
        self.pending_requests.retain(|r| {
            r.host() != request.host()
                || std::mem::discriminant(r) != std::mem::discriminant(&request)
        });
        self.pending_requests.push(request);
    }

    /// Drop every search and stop streaming.
    pub fn clear_searches(&mut self) {
        self.session.reset();
    }

    pub fn set_streaming(&mut self, enabled: bool) {
        self.session.set_streaming_enabled(enabled);
    }

    /// Hosts with a search, in display order, with their panels.
    pub fn panels_in_order(&self) -> Vec<(&SearchConfig, Option<&HostPanel>)> {
        self.session
            .configs()
            .iter()
            .map(|c| (c, self.panels.get(&c.host)))
            .collect()
    }

    /// React to session changes since the last call.
    pub fn handle_session_events(&mut self) {
        while let Ok(event) = self.session_events.try_recv() {
            match event {
                SessionEvent::ConfigUpserted { host, .. } => {
                    self.panels.entry(host).or_default().clear_results();
                }
                SessionEvent::StreamingChanged { enabled } => {
                    self.status_message = if enabled {
                        "Streaming on.".to_string()
                    } else {
                        "Streaming off.".to_string()
                    };
                }
                SessionEvent::Reset { hosts } => {
                    self.panels.clear();
                    self.pending_requests.clear();
                    self.drafts.clear();
                    self.selected_host = None;
                    self.status_message = format!("Cleared {} search(es).", hosts.len());
                }
                SessionEvent::Disposed { client_id } => {
                    tracing::debug!(client_id, "Session disposed; panels frozen");
                }
            }
        }
    }

    /// Apply one transport event.
    pub fn apply_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Frame(frame) => self.apply_frame(&frame),
            TransportEvent::Warning(w) => self.add_warning(w),
            TransportEvent::Closed => {
                self.add_warning("Log transport closed.".to_string());
                self.session.set_streaming_enabled(false);
            }
        }
    }

    /// Route a frame to its host panel. Frames for another identity or for a
    /// host without a search are dropped.
    pub fn apply_frame(&mut self, frame: &Frame) {
        let host = match routing::route(frame, &self.session) {
            Route::Deliver(host) => host.to_string(),
            Route::Drop(reason) => {
                tracing::debug!(host = %frame.host, ?reason, "Frame not applied");
                return;
            }
        };

        let payload = match frame.payload() {
            Ok(p) => p,
            Err(e) => {
                self.add_warning(format!("{host}: {e}"));
                return;
            }
        };

        let cap = self.max_records_per_host;
        let panel = self.panels.entry(host.clone()).or_default();
        match payload {
            FramePayload::Records(records) => panel.push_records(records, cap),
            FramePayload::Page { total, records } => {
                // A page replaces the window shown.
                panel.records.clear();
                panel.total = Some(total);
                panel.push_records(records, cap);
            }
            FramePayload::Units(units) => panel.units = units,
            FramePayload::Connected => {
                panel.connected = true;
                panel.dial_error = None;
                if panel.units.is_empty() {
                    self.queue_request(HostRequest::Units(host));
                }
            }
            FramePayload::DialFailed(reason) => {
                panel.connected = false;
                panel.dial_error = Some(reason.clone());
                self.add_warning(format!("{host}: agent unreachable: {reason}"));
            }
            FramePayload::Control(_) => {}
        }
    }

    /// Record a non-fatal warning, evicting the oldest beyond `MAX_WARNINGS`.
    pub fn add_warning(&mut self, warning: String) {
        if self.warnings.len() >= MAX_WARNINGS {
            self.warnings.remove(0);
        }
        self.warnings.push(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::severity::LEVEL_ALL;

    fn state() -> AppState {
        let session = SearchSession::create(&mut || 12u32).unwrap();
        AppState::new(session, 3, false)
    }

    fn data_frame(client_id: u32, host: &str, message: &str) -> Frame {
        Frame::parse(&format!(
            r#"{{"client_id":{client_id},"host":"{host}","type":4,
               "data":{{"type":0,"data":{{"timestamp":"1000","level":"6","message":"{message}"}}}}}}"#
        ))
        .unwrap()
    }

    fn search(state: &mut AppState, host: &str) {
        state.select_host(host);
        assert!(state.submit_search(host));
        state.handle_session_events();
    }

    #[test]
    fn test_draft_round_trips_config_fields() {
        let draft = SearchDraft {
            since_text: "2018-08-08 00:08:08".into(),
            until_text: "2018-08-08 01:00:00".into(),
            level: "3".into(),
            service: ServiceFilter::new("sshd", "unit:sshd"),
            real_time: true,
            error: None,
        };
        let config = draft.to_config("10.0.0.1").unwrap();
        assert_eq!(config.time_range.start.timestamp(), 1_533_686_888);
        assert!(config.real_time);
        assert_eq!(SearchDraft::from_config(&config), draft);
    }

    #[test]
    fn test_bad_time_text_keeps_session_untouched() {
        let mut s = state();
        s.select_host("h");
        s.drafts.get_mut("h").unwrap().since_text = "yesterday".into();
        assert!(!s.submit_search("h"));
        assert!(s.drafts["h"].error.is_some());
        assert!(s.session.configs().is_empty());
    }

    #[test]
    fn test_select_host_seeds_defaults() {
        let mut s = state();
        s.select_host("h");
        assert_eq!(s.selected_host.as_deref(), Some("h"));
        assert_eq!(s.drafts["h"].level, LEVEL_ALL);
        assert!(!s.drafts["h"].real_time);
    }

    #[test]
    fn test_frames_route_to_host_panels_with_bounded_buffer() {
        let mut s = state();
        search(&mut s, "h");
        for i in 0..5 {
            s.apply_frame(&data_frame(12, "h", &format!("m{i}")));
        }
        let panel = &s.panels["h"];
        let messages: Vec<&str> = panel.records.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["m2", "m3", "m4"]);
        assert_eq!(panel.dropped, 2);
    }

    #[test]
    fn test_stale_and_unknown_frames_are_ignored() {
        let mut s = state();
        search(&mut s, "h");
        s.apply_frame(&data_frame(99, "h", "stale"));
        s.apply_frame(&data_frame(12, "other", "unknown"));
        assert!(s.panels["h"].records.is_empty());
        assert!(!s.panels.contains_key("other"));
        assert!(s.warnings.is_empty());
    }

    #[test]
    fn test_resubmitting_clears_host_results() {
        let mut s = state();
        search(&mut s, "h");
        s.apply_frame(&data_frame(12, "h", "old"));
        assert!(s.submit_search("h"));
        s.handle_session_events();
        assert!(s.panels["h"].records.is_empty());
    }

    #[test]
    fn test_reset_clears_panels_and_drafts() {
        let mut s = state();
        search(&mut s, "a");
        search(&mut s, "b");
        s.clear_searches();
        s.handle_session_events();
        assert!(s.panels.is_empty());
        assert!(s.drafts.is_empty());
        assert!(s.selected_host.is_none());
        assert!(s.panels_in_order().is_empty());
    }

    #[test]
    fn test_dial_failure_and_transport_close() {
        let mut s = state();
        search(&mut s, "h");
        let failed =
            Frame::parse(r#"{"client_id":12,"host":"h","type":6,"data":"refused"}"#).unwrap();
        s.apply_frame(&failed);
        assert_eq!(s.panels["h"].dial_error.as_deref(), Some("refused"));

        s.set_streaming(true);
        s.apply_transport_event(TransportEvent::Closed);
        assert!(!s.session.streaming_enabled());
        assert_eq!(s.warnings.len(), 2);
    }

    fn page_frame(total: usize, messages: &[&str]) -> Frame {
        let hits: Vec<String> = messages
            .iter()
            .map(|m| format!(r#"{{"timestamp":"1000","level":"6","message":"{m}"}}"#))
            .collect();
        Frame::parse(&format!(
            r#"{{"client_id":12,"host":"h","type":4,"data":{{"type":0,"data":{{"total":{total},"hits":[{}]}}}}}}"#,
            hits.join(",")
        ))
        .unwrap()
    }

    #[test]
    fn test_select_and_connect_ask_for_units_once() {
        let mut s = state();
        search(&mut s, "h");
        s.select_host("h");
        let connected = Frame::parse(r#"{"client_id":12,"host":"h","type":3}"#).unwrap();
        s.apply_frame(&connected);
        assert_eq!(s.take_requests(), vec![HostRequest::Units("h".into())]);
        assert!(s.take_requests().is_empty());

        let units = Frame::parse(
            r#"{"client_id":12,"host":"h","type":4,"data":{"type":1,"data":{"systemd":["sshd"]}}}"#,
        )
        .unwrap();
        s.apply_frame(&units);
        s.select_host("h");
        s.apply_frame(&connected);
        assert!(s.take_requests().is_empty());
    }

    #[test]
    fn test_pages_replace_the_window_and_turn_within_total() {
        let mut s = state();
        search(&mut s, "h");
        s.take_requests();

        s.apply_frame(&page_frame(120, &["a", "b"]));
        s.apply_frame(&page_frame(120, &["c"]));
        let panel = &s.panels["h"];
        assert_eq!(panel.records.len(), 1);
        assert_eq!(panel.total, Some(120));
        assert!(panel.has_next_page());
        assert!(!panel.has_previous_page());

        s.turn_page("h", false);
        assert!(s.take_requests().is_empty());

        s.turn_page("h", true);
        s.turn_page("h", true);
        let size = Page::default().size;
        assert_eq!(
            s.take_requests(),
            vec![HostRequest::Page {
                host: "h".into(),
                page: Page { from: 2 * size, size },
            }]
        );
        assert!(!s.panels["h"].has_next_page());
        s.turn_page("h", true);
        assert!(s.take_requests().is_empty());

        s.turn_page("h", false);
        assert_eq!(s.panels["h"].page.from, size);
    }

    #[test]
    fn test_follow_results_have_no_pages() {
        let mut s = state();
        search(&mut s, "h");
        s.take_requests();
        s.apply_frame(&data_frame(12, "h", "live"));
        assert!(!s.panels["h"].has_next_page());
        s.turn_page("h", true);
        assert!(s.take_requests().is_empty());
    }

    #[test]
    fn test_reset_discards_pending_requests() {
        let mut s = state();
        search(&mut s, "h");
        s.clear_searches();
        s.handle_session_events();
        assert!(s.take_requests().is_empty());
    }

    #[test]
    fn test_warnings_are_bounded() {
        let mut s = state();
        for i in 0..(MAX_WARNINGS + 5) {
            s.add_warning(format!("w{i}"));
        }
        assert_eq!(s.warnings.len(), MAX_WARNINGS);
        assert_eq!(s.warnings[0], "w5");
    }
}
