// LogPilot - core/session.rs
//
// Multi-host log search session: the single source of truth for which hosts
// are being watched and with which filters.
//
// Lifecycle:
//   - `SearchSession::create` draws the client identity from an injected
//     generator. The identity tags every transport subscription and is
//     stable until `dispose`.
//   - `dispose` is the application-teardown step: it zeroes the identity so
//     frames still in flight are recognised as stale. It is deliberately
//     separate from `reset`, which only clears searches.
//
// Change notification: `subscribe` hands out an mpsc receiver; every
// mutation that changes state emits a `SessionEvent` to all live receivers.
// Receivers that have been dropped are pruned on the next emit.
//
// Nothing here validates field contents or can fail once created. Callers
// submit complete configurations; the last upsert for a host wins.

use crate::core::model::SearchConfig;
use crate::util::constants::{DEFAULT_CLIENT_ID_MAX, INACTIVE_CLIENT_ID, MAX_IDENTITY_DRAWS};
use crate::util::error::SessionError;
use rand::Rng;
use std::sync::mpsc;

// =============================================================================
// Identity generation
// =============================================================================

/// Source of client identities.
///
/// Any `FnMut() -> u32` closure is a generator, which lets tests supply
/// fixed identities.
pub trait IdentityGenerator {
    /// Produce a candidate identity. Zero is rejected and re-drawn.
    fn next_identity(&mut self) -> u32;
}

impl<F: FnMut() -> u32> IdentityGenerator for F {
    fn next_identity(&mut self) -> u32 {
        self()
    }
}

/// Uniform random identities in `[1, max)`.
#[derive(Debug, Clone, Copy)]
pub struct RandomIdentity {
    max: u32,
}

impl RandomIdentity {
    /// `max` is the exclusive upper bound; values below 2 are raised to 2 so
    /// the range is never empty.
    pub fn new(max: u32) -> Self {
        Self { max: max.max(2) }
    }

    pub fn max(&self) -> u32 {
        self.max
    }
}

impl Default for RandomIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_ID_MAX)
    }
}

impl IdentityGenerator for RandomIdentity {
    fn next_identity(&mut self) -> u32 {
        rand::thread_rng().gen_range(1..self.max)
    }
}

// =============================================================================
// Change events
// =============================================================================

/// State changes emitted to session subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A host's configuration was inserted (`replaced == false`) or
    /// replaced wholesale (`replaced == true`).
    ConfigUpserted { host: String, replaced: bool },

    /// The global streaming gate changed.
    StreamingChanged { enabled: bool },

    /// All searches were cleared and streaming switched off. `hosts` lists
    /// the hosts that were configured before the reset, in display order.
    Reset { hosts: Vec<String> },

    /// The session was disposed; `client_id` is the identity it held.
    Disposed { client_id: u32 },
}

// =============================================================================
// SearchSession
// =============================================================================

/// Per-application search state.
#[derive(Debug)]
pub struct SearchSession {
    client_id: u32,
    streaming_enabled: bool,
    /// Insertion-ordered, unique by host.
    configs: Vec<SearchConfig>,
    subscribers: Vec<mpsc::Sender<SessionEvent>>,
}

impl SearchSession {
    /// Start a session with an identity drawn from `generator`.
    ///
    /// Zero identities are re-drawn up to `MAX_IDENTITY_DRAWS` times.
    pub fn create<G: IdentityGenerator + ?Sized>(
        generator: &mut G,
    ) -> Result<Self, SessionError> {
        for attempt in 1..=MAX_IDENTITY_DRAWS {
            let candidate = generator.next_identity();
            if candidate != INACTIVE_CLIENT_ID {
                tracing::info!(client_id = candidate, attempt, "Search session created");
                return Ok(Self {
                    client_id: candidate,
                    streaming_enabled: false,
                    configs: Vec::new(),
                    subscribers: Vec::new(),
                });
            }
            tracing::debug!(attempt, "Identity generator returned 0; drawing again");
        }
        Err(SessionError::ZeroIdentity {
            attempts: MAX_IDENTITY_DRAWS,
        })
    }

    /// Current client identity; `INACTIVE_CLIENT_ID` after `dispose`.
    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    /// True until `dispose` is called.
    pub fn is_active(&self) -> bool {
        self.client_id != INACTIVE_CLIENT_ID
    }

    pub fn streaming_enabled(&self) -> bool {
        self.streaming_enabled
    }

    /// All configurations in the order their hosts were first searched.
    pub fn configs(&self) -> &[SearchConfig] {
        &self.configs
    }

    /// Configuration for `host`, if one has been submitted.
    pub fn config(&self, host: &str) -> Option<&SearchConfig> {
        self.configs.iter().find(|c| c.host == host)
    }

    /// Configured hosts in display order.
    pub fn hosts(&self) -> Vec<String> {
        self.configs.iter().map(|c| c.host.clone()).collect()
    }

    /// Register for change events.
    pub fn subscribe(&mut self) -> mpsc::Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Insert or wholesale-replace the configuration for `config.host`.
    ///
    /// A replaced entry keeps its position; a new host is appended.
    pub fn upsert_config(&mut self, config: SearchConfig) {
        let host = config.host.clone();
        let replaced = match self.configs.iter().position(|c| c.host == host) {
            Some(idx) => {
                self.configs[idx] = config;
                true
            }
            None => {
                self.configs.push(config);
                false
            }
        };

        tracing::debug!(host = %host, replaced, total = self.configs.len(), "Search config upserted");
        self.emit(SessionEvent::ConfigUpserted { host, replaced });
    }

    /// Open or close the global streaming gate. No event if unchanged.
    pub fn set_streaming_enabled(&mut self, enabled: bool) {
        if self.streaming_enabled == enabled {
            return;
        }
        self.streaming_enabled = enabled;
        tracing::info!(enabled, client_id = self.client_id, "Streaming toggled");
        self.emit(SessionEvent::StreamingChanged { enabled });
    }

    /// Clear every search and switch streaming off. The identity is kept.
    pub fn reset(&mut self) {
        let hosts = self.hosts();
        self.configs.clear();
        self.streaming_enabled = false;
        tracing::info!(cleared = hosts.len(), "Search session reset");
        self.emit(SessionEvent::Reset { hosts });
    }

    /// Teardown: zero the identity. Searches and the streaming flag are left
    /// as they are. Calling it twice has no further effect.
    pub fn dispose(&mut self) {
        if !self.is_active() {
            return;
        }
        let client_id = self.client_id;
        self.client_id = INACTIVE_CLIENT_ID;
        tracing::info!(client_id, "Search session disposed");
        self.emit(SessionEvent::Disposed { client_id });
    }

    fn emit(&mut self, event: SessionEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
