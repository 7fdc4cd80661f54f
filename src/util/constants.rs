// LogPilot - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "LogPilot";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "LogPilot";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Client identity
// =============================================================================

/// Sentinel value of the client identity while no session is active.
///
/// The transport layer treats a frame addressed to this identity as stale.
pub const INACTIVE_CLIENT_ID: u32 = 0;

/// Exclusive upper bound of the client identity generation range.
pub const DEFAULT_CLIENT_ID_MAX: u32 = 100_000;

/// Smallest accepted upper bound for the identity range. Anything lower
/// makes accidental collisions between concurrent sessions likely.
pub const MIN_CLIENT_ID_MAX: u32 = 1_000;

/// Largest accepted upper bound for the identity range.
pub const ABSOLUTE_MAX_CLIENT_ID_MAX: u32 = u32::MAX;

/// How many times session creation re-draws an identity that came back as
/// the inactive sentinel before giving up.
pub const MAX_IDENTITY_DRAWS: usize = 8;

// =============================================================================
// Host directory
// =============================================================================

/// Path of the host directory endpoint, relative to the server base URL.
pub const HOST_LIST_PATH: &str = "/plugin/logs/api/ip_list";

/// Base URL used when neither the CLI nor config.toml provides one.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:9995";

/// Success code carried in the host directory JSON envelope.
pub const HOST_LIST_SUCCESS_CODE: i64 = 200;

/// HTTP request timeout for host directory calls (ms).
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Minimum user-configurable request timeout (ms).
pub const MIN_REQUEST_TIMEOUT_MS: u64 = 500;

/// Maximum user-configurable request timeout (ms).
pub const MAX_REQUEST_TIMEOUT_MS: u64 = 60_000;

// =============================================================================
// Queries and records
// =============================================================================

/// Time pattern used for journalctl `--since`/`--until` and the search form.
pub const QUERY_TIME_PATTERN: &str = "YYYY-MM-DD HH:ii:ss";

/// Number of entries requested per page in static (non-tail) queries.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Default lookback window of a freshly opened search form (seconds).
pub const DEFAULT_LOOKBACK_SECS: i64 = 3_600;

/// Default number of records kept per host panel.
pub const DEFAULT_MAX_RECORDS_PER_HOST: usize = 5_000;

/// Minimum user-configurable per-host record cap.
pub const MIN_MAX_RECORDS_PER_HOST: usize = 100;

/// Maximum user-configurable per-host record cap.
pub const ABSOLUTE_MAX_RECORDS_PER_HOST: usize = 200_000;

// =============================================================================
// Replay transport
// =============================================================================

/// How often the replay reader polls its source file for appended frames (ms).
pub const REPLAY_POLL_INTERVAL_MS: u64 = 250;

/// How often the cancel flag is checked within each replay poll sleep (ms).
pub const REPLAY_CANCEL_CHECK_INTERVAL_MS: u64 = 50;

/// Maximum length of one frame line. Longer lines are discarded with a
/// warning instead of growing the line buffer without bound.
pub const MAX_FRAME_LINE_BYTES: usize = 1024 * 1024; // 1 MiB

// =============================================================================
// WebSocket transport
// =============================================================================

/// Path of the server's websocket proxy, relative to the server base URL.
pub const WS_PROXY_PATH: &str = "/ws/proxy";

/// Handshake header carrying the client identity. Lower case because the
/// `http` header map rejects upper-case static names.
pub const CLIENT_ID_HEADER: &str = "clientid";

/// Port the log agent listens on; the proxy dials `<host>:<port>`.
pub const AGENT_PORT: u16 = 9995;

/// Read timeout of a host link socket (ms). Bounds how long queued
/// requests and cancellation wait behind a quiet connection.
pub const LINK_READ_TIMEOUT_MS: u64 = 100;

// =============================================================================
// Per-frame UI message budgets
// =============================================================================

/// Maximum number of transport frames routed by the UI loop per frame.
pub const MAX_TRANSPORT_FRAMES_PER_FRAME: usize = 500;

/// Maximum number of session events handled by the UI loop per frame.
pub const MAX_SESSION_EVENTS_PER_FRAME: usize = 200;

/// Maximum number of non-fatal warnings kept for display.
pub const MAX_WARNINGS: usize = 1_000;

// =============================================================================
// UI defaults
// =============================================================================

/// Default UI body font size in points.
pub const DEFAULT_FONT_SIZE: f32 = 14.5;

/// Minimum user-configurable UI font size (points).
pub const MIN_FONT_SIZE: f32 = 10.0;

/// Maximum user-configurable UI font size (points).
pub const MAX_FONT_SIZE: f32 = 24.0;

/// Repaint cadence while streaming is enabled (ms).
pub const STREAM_REPAINT_INTERVAL_MS: u64 = 250;

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
