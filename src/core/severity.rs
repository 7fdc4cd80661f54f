// LogPilot - core/severity.rs
//
// Syslog severity catalog: the eight journald priority codes, most severe
// first. Codes travel as strings ("0".."7") in search configurations and on
// the wire, so lookups are keyed by the string code.
//
// Codes outside the catalog are not rejected here; they are passed through
// to the query layer untouched.

use serde::{Deserialize, Serialize};

/// Level sentinel meaning "no severity filter".
pub const LEVEL_ALL: &str = "all";

/// Syslog severity levels, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Informational,
    Debug,
}

impl Severity {
    /// Returns all variants in catalog order (most severe first).
    pub fn all() -> &'static [Severity] {
        &[
            Severity::Emergency,
            Severity::Alert,
            Severity::Critical,
            Severity::Error,
            Severity::Warning,
            Severity::Notice,
            Severity::Informational,
            Severity::Debug,
        ]
    }

    /// Numeric string code as used by journald `PRIORITY`.
    pub fn code(&self) -> &'static str {
        match self {
            Severity::Emergency => "0",
            Severity::Alert => "1",
            Severity::Critical => "2",
            Severity::Error => "3",
            Severity::Warning => "4",
            Severity::Notice => "5",
            Severity::Informational => "6",
            Severity::Debug => "7",
        }
    }

    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Emergency => "emergency",
            Severity::Alert => "alert",
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Notice => "notice",
            Severity::Informational => "informational",
            Severity::Debug => "debug",
        }
    }

    /// Look up a level by its string code. Surrounding whitespace is ignored.
    pub fn from_code(code: &str) -> Option<Severity> {
        let code = code.trim();
        Severity::all().iter().copied().find(|s| s.code() == code)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Translate a level code into its label, or `None` if the code is not in
/// the catalog (including the `LEVEL_ALL` sentinel).
pub fn label_for_code(code: &str) -> Option<&'static str> {
    Severity::from_code(code).map(|s| s.label())
}

/// Display text for a level selection: the catalog label, "all" for the
/// sentinel, and the raw code for anything unrecognised.
pub fn display_level(code: &str) -> String {
    if code.is_empty() || code == LEVEL_ALL {
        return LEVEL_ALL.to_string();
    }
    label_for_code(code)
        .map(str::to_string)
        .unwrap_or_else(|| code.to_string())
}
