// LogPilot - core/datefmt.rs
//
// Pattern-based date formatting for panel timestamps and agent queries.
//
// The pattern language is a chain of substitutions applied in a fixed
// order over the progressively rewritten string:
//   - doubled tokens (yyyy, yy, mm, dd, hh, ii, ss) replace their FIRST
//     occurrence only, zero-padded to two digits (yyyy is the full year);
//   - single-letter tokens (m, d, h, i, s, w, W) replace EVERY occurrence,
//     unpadded.
// Longer tokens run before shorter ones so `yyyy` is never eaten by `yy`
// and `mm` is never split into two `m`s. Letters in literal text are
// substituted too, so patterns should keep prose out of the format string.
//
// Time zone is the caller's choice: pass a `DateTime<Utc>` for agent
// queries, a `DateTime<Local>` for display.

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Timelike, Utc};

/// Weekday names indexed by days-from-Sunday, used by the `W` directive.
pub const WEEKDAY_NAMES: [&str; 7] = ["日", "一", "二", "三", "四", "五", "六"];

/// chrono equivalent of `QUERY_TIME_PATTERN`, used for parsing form input.
const QUERY_TIME_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One substitution step in the formatting chain.
enum Step<'a> {
    /// Replace the leftmost occurrence of any of the tokens.
    First(&'a [&'a str], String),
    /// Replace every occurrence of any of the characters.
    Every(&'a [char], String),
}

/// Format `datetime` according to `pattern`.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use logpilot::core::datefmt::format_date;
///
/// let dt = Utc.timestamp_opt(1_533_686_888, 0).unwrap();
/// assert_eq!(format_date(&dt, "YYYY-MM-DD HH:ii:ss"), "2018-08-08 00:08:08");
/// ```
pub fn format_date<Tz: TimeZone>(datetime: &DateTime<Tz>, pattern: &str) -> String {
    let year = datetime.year();
    let month = datetime.month();
    let day = datetime.day();
    let hour = datetime.hour();
    let minute = datetime.minute();
    let second = datetime.second();
    let weekday = datetime.weekday().num_days_from_sunday() as usize;

    let steps = [
        Step::First(&["yyyy", "YYYY"], year.to_string()),
        Step::First(&["yy", "YY"], pad_zero(year.rem_euclid(100), 2)),
        Step::First(&["mm", "MM"], pad_zero(month, 2)),
        Step::Every(&['m', 'M'], month.to_string()),
        Step::First(&["dd", "DD"], pad_zero(day, 2)),
        Step::Every(&['d', 'D'], day.to_string()),
        Step::First(&["hh", "HH"], pad_zero(hour, 2)),
        Step::Every(&['h', 'H'], hour.to_string()),
        Step::First(&["ii", "II"], pad_zero(minute, 2)),
        Step::Every(&['i', 'I'], minute.to_string()),
        Step::First(&["ss", "SS"], pad_zero(second, 2)),
        Step::Every(&['s', 'S'], second.to_string()),
        Step::Every(&['w'], weekday.to_string()),
        Step::Every(&['W'], WEEKDAY_NAMES[weekday].to_string()),
    ];

    steps
        .iter()
        .fold(pattern.to_string(), |text, step| match step {
            Step::First(tokens, value) => replace_first(&text, tokens, value),
            Step::Every(chars, value) => replace_every(&text, chars, value),
        })
}

/// Parse text shaped like `QUERY_TIME_PATTERN` (`2024-01-02 15:04:05`) as a
/// UTC instant. Returns `None` for anything else.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text.trim(), QUERY_TIME_PARSE_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Left-pad the decimal rendering of `value` with `'0'` until it is at least
/// `width` characters long. Longer values are returned unchanged.
pub fn pad_zero(value: impl std::fmt::Display, width: usize) -> String {
    let mut text = value.to_string();
    while text.chars().count() < width {
        text.insert(0, '0');
    }
    text
}

fn replace_first(text: &str, tokens: &[&str], value: &str) -> String {
    // Leftmost match wins; on a tie the earlier token in the list wins.
    let hit = tokens
        .iter()
        .filter_map(|token| text.find(token).map(|pos| (pos, token.len())))
        .min_by_key(|&(pos, _)| pos);

    match hit {
        Some((pos, len)) => {
            let mut out = String::with_capacity(text.len() + value.len());
            out.push_str(&text[..pos]);
            out.push_str(value);
            out.push_str(&text[pos + len..]);
            out
        }
        None => text.to_string(),
    }
}

fn replace_every(text: &str, chars: &[char], value: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if chars.contains(&c) {
            out.push_str(value);
        } else {
            out.push(c);
        }
    }
    out
}
