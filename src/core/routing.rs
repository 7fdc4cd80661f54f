// LogPilot - core/routing.rs
//
// Addressing of inbound transport frames.
//
// A frame is delivered only if it is tagged with the live session's client
// identity and names a host that currently has a search configuration.
// Everything else is dropped without surfacing an error: a mismatched
// identity means the frame belongs to a previous (disposed) session, and an
// unknown host means the search was cleared while the frame was in flight.

use crate::core::frame::Frame;
use crate::core::session::SearchSession;

/// Why a frame was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The session is disposed or the frame carries another identity.
    StaleIdentity,
    /// No search configuration exists for the frame's host.
    UnknownHost,
}

/// Routing outcome for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// Deliver to the panel of this host.
    Deliver(&'a str),
    Drop(DropReason),
}

/// Decide where `frame` goes.
pub fn route<'a>(frame: &'a Frame, session: &SearchSession) -> Route<'a> {
    if !session.is_active() || frame.client_id != session.client_id() {
        tracing::debug!(
            frame_client = frame.client_id,
            session_client = session.client_id(),
            host = %frame.host,
            "Dropping frame with stale client id"
        );
        return Route::Drop(DropReason::StaleIdentity);
    }

    if session.config(&frame.host).is_none() {
        tracing::debug!(host = %frame.host, "Dropping frame for host without a search");
        return Route::Drop(DropReason::UnknownHost);
    }

    Route::Deliver(&frame.host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::SearchConfig;
    use chrono::Utc;

    fn frame(client_id: u32, host: &str) -> Frame {
        Frame::parse(&format!(
            r#"{{"client_id":{client_id},"host":"{host}","type":3}}"#
        ))
        .unwrap()
    }

    fn session_with(host: &str) -> SearchSession {
        let mut s = SearchSession::create(&mut || 500u32).unwrap();
        s.upsert_config(SearchConfig::for_host(host, Utc::now()));
        s
    }

    #[test]
    fn test_matching_frame_is_delivered() {
        let s = session_with("10.0.0.1");
        let f = frame(500, "10.0.0.1");
        assert_eq!(route(&f, &s), Route::Deliver("10.0.0.1"));
    }

    #[test]
    fn test_foreign_identity_is_dropped() {
        let s = session_with("10.0.0.1");
        assert_eq!(
            route(&frame(501, "10.0.0.1"), &s),
            Route::Drop(DropReason::StaleIdentity)
        );
    }

    #[test]
    fn test_disposed_session_drops_everything() {
        let mut s = session_with("10.0.0.1");
        s.dispose();
        assert_eq!(
            route(&frame(500, "10.0.0.1"), &s),
            Route::Drop(DropReason::StaleIdentity)
        );
        // A zero-tagged frame must not match the zeroed identity either.
        assert_eq!(
            route(&frame(0, "10.0.0.1"), &s),
            Route::Drop(DropReason::StaleIdentity)
        );
    }

    #[test]
    fn test_unknown_host_is_dropped() {
        let mut s = session_with("10.0.0.1");
        assert_eq!(
            route(&frame(500, "10.0.0.2"), &s),
            Route::Drop(DropReason::UnknownHost)
        );
        s.reset();
        assert_eq!(
            route(&frame(500, "10.0.0.1"), &s),
            Route::Drop(DropReason::UnknownHost)
        );
    }
}
