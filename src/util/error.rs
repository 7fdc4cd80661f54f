// LogPilot - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// All errors preserve the causal chain for diagnostic logging.
//
// The session manager itself never fails on its mutating operations; the
// variants here cover identity creation, query construction, wire decoding,
// transport I/O, the host directory and configuration loading.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all LogPilot operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum LogPilotError {
    /// Session creation failed.
    Session(SessionError),

    /// A search configuration could not be turned into an agent query.
    Query(QueryError),

    /// A wire frame could not be encoded or decoded.
    Frame(FrameError),

    /// The log transport rejected an operation.
    Transport(TransportError),

    /// The host directory call failed.
    HostDirectory(HostDirectoryError),

    /// Configuration loading or validation failed.
    Config(ConfigError),
}

impl fmt::Display for LogPilotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(e) => write!(f, "Session error: {e}"),
            Self::Query(e) => write!(f, "Query error: {e}"),
            Self::Frame(e) => write!(f, "Frame error: {e}"),
            Self::Transport(e) => write!(f, "Transport error: {e}"),
            Self::HostDirectory(e) => write!(f, "Host directory error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
        }
    }
}

impl std::error::Error for LogPilotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Session(e) => Some(e),
            Self::Query(e) => Some(e),
            Self::Frame(e) => Some(e),
            Self::Transport(e) => Some(e),
            Self::HostDirectory(e) => Some(e),
            Self::Config(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

/// Errors related to session lifecycle.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionError {
    /// The identity generator only produced the inactive sentinel.
    ZeroIdentity { attempts: usize },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroIdentity { attempts } => write!(
                f,
                "identity generator returned 0 on all {attempts} attempts; \
                 a live session needs a non-zero client id"
            ),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<SessionError> for LogPilotError {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

// ---------------------------------------------------------------------------
// Query errors
// ---------------------------------------------------------------------------

/// Errors raised while building an agent query from a search configuration.
#[derive(Debug, PartialEq, Eq)]
pub enum QueryError {
    /// The time range ends before it starts.
    InvertedTimeRange {
        host: String,
        start: String,
        end: String,
    },

    /// The service token has a recognised prefix but a malformed body.
    InvalidServiceToken { host: String, token: String },
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvertedTimeRange { host, start, end } => write!(
                f,
                "search for '{host}' has start '{start}' after end '{end}'"
            ),
            Self::InvalidServiceToken { host, token } => {
                write!(f, "search for '{host}' has malformed service '{token}'")
            }
        }
    }
}

impl std::error::Error for QueryError {}

impl From<QueryError> for LogPilotError {
    fn from(e: QueryError) -> Self {
        Self::Query(e)
    }
}

// ---------------------------------------------------------------------------
// Frame errors
// ---------------------------------------------------------------------------

/// Errors related to transport frame encoding and decoding.
#[derive(Debug)]
pub enum FrameError {
    /// The frame is not valid JSON or does not match the envelope shape.
    Json { source: serde_json::Error },

    /// The envelope carries a message type this client does not know.
    UnknownMessageType { code: u8 },

    /// A data frame carries a payload type this client does not know.
    UnknownDataType { code: u8 },

    /// The payload is present but has the wrong shape for its type.
    MalformedPayload { reason: String },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json { source } => write!(f, "invalid frame JSON: {source}"),
            Self::UnknownMessageType { code } => write!(f, "unknown message type {code}"),
            Self::UnknownDataType { code } => write!(f, "unknown data payload type {code}"),
            Self::MalformedPayload { reason } => write!(f, "malformed payload: {reason}"),
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json { source } => Some(source),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for FrameError {
    fn from(source: serde_json::Error) -> Self {
        Self::Json { source }
    }
}

impl From<FrameError> for LogPilotError {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Errors surfaced by a log transport implementation.
#[derive(Debug)]
pub enum TransportError {
    /// An operation needs an open channel but the transport is closed.
    NotOpen,

    /// The transport was asked to operate with the inactive identity.
    InactiveIdentity,

    /// A request carried an identity other than the one the channel was
    /// opened with.
    IdentityMismatch { expected: u32, got: u32 },

    /// No frame source was configured for this run.
    Unavailable,

    /// A per-host request named a host that is not subscribed.
    NotSubscribed { host: String },

    /// The server URL cannot carry a websocket connection.
    UnsupportedUrl { url: String },

    /// The websocket connection to the proxy could not be established.
    Connect { url: String, reason: String },

    /// The frame source could not be opened.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOpen => write!(f, "transport channel is not open"),
            Self::InactiveIdentity => {
                write!(f, "transport cannot be used with the inactive client id")
            }
            Self::Unavailable => write!(f, "no log transport is available"),
            Self::NotSubscribed { host } => write!(f, "host '{host}' is not subscribed"),
            Self::UnsupportedUrl { url } => {
                write!(f, "'{url}' is not an http:// or ws:// server URL")
            }
            Self::Connect { url, reason } => write!(f, "cannot connect to '{url}': {reason}"),
            Self::IdentityMismatch { expected, got } => write!(
                f,
                "transport is open for client {expected}, request came from client {got}"
            ),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<TransportError> for LogPilotError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Host directory errors
// ---------------------------------------------------------------------------

/// Errors related to fetching the searchable host list.
#[derive(Debug)]
pub enum HostDirectoryError {
    /// The HTTP client could not be constructed.
    Client { source: reqwest::Error },

    /// The request failed before a response arrived (DNS, connect, timeout).
    Request { url: String, source: reqwest::Error },

    /// The server answered with a non-success HTTP status.
    Status { url: String, status: u16 },

    /// The response body is not the expected JSON envelope.
    Decode { url: String, source: reqwest::Error },

    /// The envelope reports a failure code.
    Rejected { url: String, code: i64, msg: String },
}

impl fmt::Display for HostDirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client { source } => write!(f, "cannot build HTTP client: {source}"),
            Self::Request { url, source } => write!(f, "request to '{url}' failed: {source}"),
            Self::Status { url, status } => {
                write!(f, "'{url}' answered with HTTP status {status}")
            }
            Self::Decode { url, source } => {
                write!(f, "cannot decode host list from '{url}': {source}")
            }
            Self::Rejected { url, code, msg } => {
                write!(f, "'{url}' rejected the request (code {code}): {msg}")
            }
        }
    }
}

impl std::error::Error for HostDirectoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Client { source } => Some(source),
            Self::Request { source, .. } => Some(source),
            Self::Decode { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<HostDirectoryError> for LogPilotError {
    fn from(e: HostDirectoryError) -> Self {
        Self::HostDirectory(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for LogPilotError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Convenience type alias for LogPilot results.
pub type Result<T> = std::result::Result<T, LogPilotError>;
