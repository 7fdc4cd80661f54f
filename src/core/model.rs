// LogPilot - core/model.rs
//
// Core data model types. Pure data definitions with no I/O, no UI,
// no platform dependencies.
//
// These types are the shared vocabulary across all layers.

use crate::core::severity::{self, Severity, LEVEL_ALL};
use crate::util::constants::DEFAULT_LOOKBACK_SECS;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Search configuration (one per host)
// =============================================================================

/// Closed time window of a search. `start <= end` is expected but only
/// enforced when the window is turned into an agent query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The `secs` seconds leading up to `now`.
    pub fn lookback(now: DateTime<Utc>, secs: i64) -> Self {
        Self {
            start: now - Duration::seconds(secs),
            end: now,
        }
    }

    /// True when the window is well-formed (start not after end).
    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }
}

/// Originating service filter. `value` is the canonical token sent to the
/// agent; `label` is only shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFilter {
    pub label: String,
    pub value: String,
}

impl ServiceFilter {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    /// The "any service" filter.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn is_any(&self) -> bool {
        self.value.is_empty()
    }
}

/// Complete filter state of one host's panel.
///
/// A search configuration is always submitted whole: the session replaces
/// any previous configuration for the same host without merging fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Host identifier (IP address). Unique within a session.
    pub host: String,

    pub time_range: TimeRange,

    /// Severity code `"0"`..`"7"`, or `LEVEL_ALL`. Not validated.
    pub level: String,

    pub service: ServiceFilter,

    /// Live-streaming (true) or static/historical query mode (false).
    pub real_time: bool,
}

impl SearchConfig {
    /// A fresh configuration for `host`: last hour, all levels, all services,
    /// static mode.
    pub fn for_host(host: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            host: host.into(),
            time_range: TimeRange::lookback(now, DEFAULT_LOOKBACK_SECS),
            level: LEVEL_ALL.to_string(),
            service: ServiceFilter::any(),
            real_time: false,
        }
    }

    /// The catalog level this configuration filters on, if any.
    pub fn severity(&self) -> Option<Severity> {
        Severity::from_code(&self.level)
    }

    /// Label for the level selection, for panel headers.
    pub fn level_label(&self) -> String {
        severity::display_level(&self.level)
    }
}

// =============================================================================
// Log records (routed output of the transport)
// =============================================================================

/// One log record delivered for a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    /// Record time. `None` if the agent's timestamp could not be parsed.
    pub timestamp: Option<DateTime<Utc>>,

    /// Raw priority code as reported by the agent.
    pub level: Option<String>,

    pub message: String,

    /// Unit or syslog identifier that produced the record.
    pub target: Option<String>,
}

impl LogRecord {
    pub fn severity(&self) -> Option<Severity> {
        self.level.as_deref().and_then(Severity::from_code)
    }
}

// =============================================================================
// Unit catalog (service choices reported by an agent)
// =============================================================================

/// Service choices an agent reports for its host, grouped the way the agent
/// groups them. Each group maps to a service token prefix understood by the
/// query builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCatalog {
    /// systemd service units (token `unit:<name>`).
    #[serde(default)]
    pub systemd: Vec<String>,

    /// Users as `name:uid` (token `user:<name>:<uid>`).
    #[serde(default)]
    pub user: Vec<String>,

    /// Journal transports such as `kernel` or `audit` (token `transport:<name>`).
    #[serde(default)]
    pub transport: Vec<String>,
}

impl UnitCatalog {
    pub fn is_empty(&self) -> bool {
        self.systemd.is_empty() && self.user.is_empty() && self.transport.is_empty()
    }

    /// All choices as service filters, in group order.
    pub fn filters(&self) -> Vec<ServiceFilter> {
        let units = self
            .systemd
            .iter()
            .map(|u| ServiceFilter::new(u.clone(), format!("unit:{u}")));
        let users = self
            .user
            .iter()
            .map(|u| ServiceFilter::new(format!("user {u}"), format!("user:{u}")));
        let transports = self
            .transport
            .iter()
            .map(|t| ServiceFilter::new(format!("transport {t}"), format!("transport:{t}")));
        units.chain(users).chain(transports).collect()
    }
}
