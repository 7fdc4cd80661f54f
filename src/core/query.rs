// LogPilot - core/query.rs
//
// Translation of a host's search configuration into the journalctl option
// set the log agent understands. This is where the checks the session
// manager skips are made: an inverted time range is rejected here.
//
// Service tokens:
//   ""                      no service filter
//   "unit:<name>"           --unit <name>
//   "identifier:<name>"     --identifier <name>
//   "user:<name>:<uid>"     _UID=<uid>
//   "transport:<name>"      _TRANSPORT=<name>
//   anything else           treated as a unit name
//
// Severity codes are passed through as-is, out-of-range ones included;
// the level sentinel "all" (or empty) means no --priority.

use crate::core::datefmt::format_date;
use crate::core::model::{LogRecord, SearchConfig};
use crate::core::severity::LEVEL_ALL;
use crate::util::constants::{DEFAULT_PAGE_SIZE, QUERY_TIME_PATTERN};
use crate::util::error::QueryError;
use serde::{Deserialize, Serialize};

/// Window into a static result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub from: usize,
    pub size: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            from: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Page {
    /// The page after this one.
    pub fn next(&self) -> Self {
        Self {
            from: self.from + self.size,
            size: self.size,
        }
    }

    /// The page before this one, clamped at the start.
    pub fn previous(&self) -> Self {
        Self {
            from: self.from.saturating_sub(self.size),
            size: self.size,
        }
    }
}

/// journalctl options as exchanged with the agent (`joptions` on the wire).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalQuery {
    pub since: String,
    pub until: String,
    pub unit: String,
    pub identifier: String,
    pub severity: String,
    pub transport: String,
    /// true = static paged query, false = follow.
    pub notail: bool,
    /// `name:uid`.
    pub user: String,
    pub from: usize,
    pub size: usize,
}

impl JournalQuery {
    /// Build the agent query for `config`.
    ///
    /// The time range only matters for static queries, so an inverted range
    /// is rejected only when `real_time` is off; follow queries carry no
    /// `since`/`until`.
    pub fn from_config(config: &SearchConfig, page: Page) -> Result<Self, QueryError> {
        let mut query = JournalQuery {
            notail: !config.real_time,
            from: page.from,
            size: page.size,
            ..Default::default()
        };

        if query.notail {
            let since = format_date(&config.time_range.start, QUERY_TIME_PATTERN);
            let until = format_date(&config.time_range.end, QUERY_TIME_PATTERN);
            if !config.time_range.is_ordered() {
                return Err(QueryError::InvertedTimeRange {
                    host: config.host.clone(),
                    start: since,
                    end: until,
                });
            }
            query.since = since;
            query.until = until;
        }

        let level = config.level.trim();
        if !level.is_empty() && level != LEVEL_ALL {
            query.severity = level.to_string();
        }

        apply_service(&mut query, &config.host, config.service.value.trim())?;
        Ok(query)
    }

    /// Whether `record` satisfies the filters journalctl would apply for
    /// this query, judged from the fields a record carries.
    ///
    /// `--priority N` keeps codes `0..=N`, `A..B` keeps `A..=B`. A unit
    /// matches the record's target with or without the `.service` suffix;
    /// an identifier must match it exactly. Transport and user filters
    /// cannot be checked from a record and always pass, as do records with
    /// no level or target when the matching filter is set.
    pub fn admits(&self, record: &LogRecord) -> bool {
        if let (Some(range), Some(code)) = (
            priority_range(&self.severity),
            record.level.as_deref().and_then(|l| l.trim().parse::<u8>().ok()),
        ) {
            if !range.contains(&code) {
                return false;
            }
        }

        let Some(target) = record.target.as_deref() else {
            return true;
        };
        if !self.unit.is_empty() {
            let unit = self.unit.as_str();
            let bare = target.strip_suffix(".service").unwrap_or(target);
            if target != unit && bare != unit.strip_suffix(".service").unwrap_or(unit) {
                return false;
            }
        }
        if !self.identifier.is_empty() && target != self.identifier {
            return false;
        }
        true
    }
}

/// Codes selected by a journalctl `--priority` value; `None` when the value
/// is empty or not numeric.
fn priority_range(severity: &str) -> Option<std::ops::RangeInclusive<u8>> {
    let severity = severity.trim();
    if severity.is_empty() {
        return None;
    }
    match severity.split_once("..") {
        Some((low, high)) => {
            let low = low.trim().parse().ok()?;
            let high = high.trim().parse().ok()?;
            Some(low..=high)
        }
        None => Some(0..=severity.parse().ok()?),
    }
}

fn apply_service(query: &mut JournalQuery, host: &str, token: &str) -> Result<(), QueryError> {
    if token.is_empty() {
        return Ok(());
    }

    let invalid = || QueryError::InvalidServiceToken {
        host: host.to_string(),
        token: token.to_string(),
    };

    let non_empty = |body: &str| -> Result<String, QueryError> {
        if body.is_empty() {
            Err(invalid())
        } else {
            Ok(body.to_string())
        }
    };

    if let Some(name) = token.strip_prefix("unit:") {
        query.unit = non_empty(name)?;
    } else if let Some(name) = token.strip_prefix("identifier:") {
        query.identifier = non_empty(name)?;
    } else if let Some(name) = token.strip_prefix("transport:") {
        query.transport = non_empty(name)?;
    } else if let Some(user) = token.strip_prefix("user:") {
        // The agent reads the uid after the first ':'.
        match user.split_once(':') {
            Some((name, uid)) if !name.is_empty() && !uid.is_empty() => {
                query.user = user.to_string();
            }
            _ => return Err(invalid()),
        }
    } else {
        query.unit = token.to_string();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{ServiceFilter, TimeRange};
    use chrono::{TimeZone, Utc};

    fn config(level: &str, service: &str, real_time: bool) -> SearchConfig {
        SearchConfig {
            host: "10.1.1.1".into(),
            time_range: TimeRange::new(
                Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
                Utc.with_ymd_and_hms(2024, 1, 2, 13, 14, 15).unwrap(),
            ),
            level: level.into(),
            service: ServiceFilter::new("label", service),
            real_time,
        }
    }

    #[test]
    fn test_static_query_formats_time_range() {
        let q = JournalQuery::from_config(&config("3", "unit:sshd", false), Page::default())
            .unwrap();
        assert!(q.notail);
        assert_eq!(q.since, "2024-01-02 03:04:05");
        assert_eq!(q.until, "2024-01-02 13:14:15");
        assert_eq!(q.severity, "3");
        assert_eq!(q.unit, "sshd");
        assert_eq!((q.from, q.size), (0, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn test_follow_query_has_no_time_range() {
        let q = JournalQuery::from_config(&config("3", "", true), Page::default()).unwrap();
        assert!(!q.notail);
        assert!(q.since.is_empty());
        assert!(q.until.is_empty());
    }

    #[test]
    fn test_inverted_range_rejected_for_static_query() {
        let mut c = config("3", "", false);
        std::mem::swap(&mut c.time_range.start, &mut c.time_range.end);
        let err = JournalQuery::from_config(&c, Page::default()).unwrap_err();
        assert!(matches!(err, QueryError::InvertedTimeRange { .. }));

        c.real_time = true;
        assert!(JournalQuery::from_config(&c, Page::default()).is_ok());
    }

    #[test]
    fn test_level_all_means_no_priority() {
        let q = JournalQuery::from_config(&config(LEVEL_ALL, "", false), Page::default()).unwrap();
        assert!(q.severity.is_empty());
        let q = JournalQuery::from_config(&config("", "", false), Page::default()).unwrap();
        assert!(q.severity.is_empty());
    }

    #[test]
    fn test_out_of_range_level_passes_through() {
        let q = JournalQuery::from_config(&config("9", "", false), Page::default()).unwrap();
        assert_eq!(q.severity, "9");
    }

    #[test]
    fn test_service_tokens() {
        let build = |token: &str| JournalQuery::from_config(&config("3", token, false), Page::default());

        assert_eq!(build("nginx.service").unwrap().unit, "nginx.service");
        assert_eq!(build("identifier:kernel").unwrap().identifier, "kernel");
        assert_eq!(build("transport:audit").unwrap().transport, "audit");
        assert_eq!(build("user:root:0").unwrap().user, "root:0");

        for bad in ["unit:", "user:root", "user::0", "transport:"] {
            assert!(
                matches!(build(bad), Err(QueryError::InvalidServiceToken { .. })),
                "token {bad:?} should be rejected"
            );
        }
    }

    fn record(level: Option<&str>, target: Option<&str>) -> LogRecord {
        LogRecord {
            timestamp: None,
            level: level.map(str::to_string),
            message: "m".into(),
            target: target.map(str::to_string),
        }
    }

    #[test]
    fn test_priority_keeps_codes_up_to_the_level() {
        let q = JournalQuery {
            severity: "3".into(),
            ..Default::default()
        };
        assert!(q.admits(&record(Some("0"), None)));
        assert!(q.admits(&record(Some("3"), None)));
        assert!(!q.admits(&record(Some("4"), None)));
        assert!(!q.admits(&record(Some("7"), None)));
        // Nothing to judge by.
        assert!(q.admits(&record(None, None)));

        let ranged = JournalQuery {
            severity: "2..4".into(),
            ..Default::default()
        };
        assert!(!ranged.admits(&record(Some("1"), None)));
        assert!(ranged.admits(&record(Some("4"), None)));

        assert!(JournalQuery::default().admits(&record(Some("7"), None)));
    }

    #[test]
    fn test_unit_and_identifier_match_target() {
        let unit = JournalQuery {
            unit: "sshd".into(),
            ..Default::default()
        };
        assert!(unit.admits(&record(None, Some("sshd.service"))));
        assert!(unit.admits(&record(None, Some("sshd"))));
        assert!(!unit.admits(&record(None, Some("nginx.service"))));
        assert!(unit.admits(&record(None, None)));

        let ident = JournalQuery {
            identifier: "kernel".into(),
            transport: "kernel".into(),
            ..Default::default()
        };
        assert!(ident.admits(&record(None, Some("kernel"))));
        assert!(!ident.admits(&record(None, Some("sshd.service"))));
    }

    #[test]
    fn test_paging() {
        let first = Page { from: 0, size: 20 };
        let q = JournalQuery::from_config(&config("3", "", false), first.next()).unwrap();
        assert_eq!((q.from, q.size), (20, 20));
        assert_eq!(first.next().next().previous(), first.next());
        assert_eq!(first.previous(), first);
    }
}
