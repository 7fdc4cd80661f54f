// LogPilot - core/frame.rs
//
// Wire envelope exchanged with the log transport, one JSON object per frame:
//
//   { "client_id": 4242, "host": "10.0.0.5", "type": 4,
//     "joptions": { ...JournalQuery... },      // control frames only
//     "data": { "type": 0, "data": ... } }     // data frames only
//
// Message type codes follow the agent protocol. Data frames carry either
// log entries (payload type 0: a single entry in follow mode, or a page
// `{ total, hits }` in static mode) or the host's unit catalog (payload
// type 1). A null payload means the agent hit an abnormal read and has
// nothing to deliver.

use crate::core::model::{LogRecord, UnitCatalog};
use crate::core::query::JournalQuery;
use crate::util::error::FrameError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    UpdateOptions,
    AgentAddr,
    UnitList,
    Connected,
    Data,
    UpdatePage,
    DialFailed,
}

impl MessageKind {
    pub fn code(&self) -> u8 {
        match self {
            MessageKind::UpdateOptions => 0,
            MessageKind::AgentAddr => 1,
            MessageKind::UnitList => 2,
            MessageKind::Connected => 3,
            MessageKind::Data => 4,
            MessageKind::UpdatePage => 5,
            MessageKind::DialFailed => 6,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, FrameError> {
        Ok(match code {
            0 => MessageKind::UpdateOptions,
            1 => MessageKind::AgentAddr,
            2 => MessageKind::UnitList,
            3 => MessageKind::Connected,
            4 => MessageKind::Data,
            5 => MessageKind::UpdatePage,
            6 => MessageKind::DialFailed,
            other => return Err(FrameError::UnknownMessageType { code: other }),
        })
    }
}

const DATA_LOG_ENTRIES: u8 = 0;
const DATA_UNITS: u8 = 1;

/// One frame on the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Identity of the client session the frame belongs to.
    #[serde(default)]
    pub client_id: u32,

    #[serde(default)]
    pub host: String,

    #[serde(rename = "type")]
    pub kind: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joptions: Option<JournalQuery>,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

/// Decoded content of a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    /// Follow-mode entries (zero or one per agent frame).
    Records(Vec<LogRecord>),
    /// One page of a static query.
    Page { total: usize, records: Vec<LogRecord> },
    /// Service choices for the host.
    Units(UnitCatalog),
    /// The agent connection for the host is up.
    Connected,
    /// The server could not reach the host's agent.
    DialFailed(String),
    /// Client-to-agent control messages echoed back; nothing to display.
    Control(MessageKind),
}

impl Frame {
    fn control(kind: MessageKind, client_id: u32, host: &str, query: Option<JournalQuery>) -> Self {
        Self {
            client_id,
            host: host.to_string(),
            kind: kind.code(),
            joptions: query,
            data: Value::Null,
        }
    }

    /// Ask the host's agent to (re)start a query.
    pub fn update_options(client_id: u32, host: &str, query: JournalQuery) -> Self {
        Self::control(MessageKind::UpdateOptions, client_id, host, Some(query))
    }

    /// Ask the host's agent for its unit catalog.
    pub fn unit_list(client_id: u32, host: &str) -> Self {
        Self::control(MessageKind::UnitList, client_id, host, None)
    }

    /// Ask the host's agent for another page of the running static query.
    pub fn update_page(client_id: u32, host: &str, query: JournalQuery) -> Self {
        Self::control(MessageKind::UpdatePage, client_id, host, Some(query))
    }

    /// First message on a proxy connection: the agent address to dial.
    pub fn agent_addr(client_id: u32, host: &str, addr: &str) -> Self {
        Self {
            data: Value::String(addr.to_string()),
            ..Self::control(MessageKind::AgentAddr, client_id, host, None)
        }
    }

    /// Dial failure raised on the client side, shaped like the server's.
    pub fn dial_failed(client_id: u32, host: &str, reason: &str) -> Self {
        Self {
            data: Value::String(reason.to_string()),
            ..Self::control(MessageKind::DialFailed, client_id, host, None)
        }
    }

    /// Parse one JSON frame.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialise to a single JSON line (no trailing newline).
    pub fn to_line(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn message_kind(&self) -> Result<MessageKind, FrameError> {
        MessageKind::from_code(self.kind)
    }

    /// Cut a data frame down to what `query` asks for.
    ///
    /// Follow-mode entries are dropped for static queries and pages for
    /// follow queries; entries that remain must pass `JournalQuery::admits`.
    /// A page keeps the total the agent reported. Frames that are not log
    /// entries, or that cannot be decoded, pass through for the consumer to
    /// report. Returns `None` when nothing is left to deliver.
    pub fn restrict_to(&self, query: &JournalQuery) -> Option<Frame> {
        if self.message_kind().ok() != Some(MessageKind::Data) {
            return Some(self.clone());
        }
        let Ok(envelope) = serde_json::from_value::<DataEnvelope>(self.data.clone()) else {
            return Some(self.clone());
        };
        if envelope.kind != DATA_LOG_ENTRIES {
            return Some(self.clone());
        }

        let admitted = |entry: &Value| {
            serde_json::from_value::<RawEntry>(entry.clone())
                .map(|raw| query.admits(&raw.into_record()))
                .unwrap_or(true)
        };

        match envelope.data {
            Value::Object(mut page) if page.contains_key("hits") => {
                if !query.notail {
                    return None;
                }
                if let Some(Value::Array(hits)) = page.get_mut("hits") {
                    hits.retain(|hit| admitted(hit));
                }
                let mut frame = self.clone();
                frame.data = serde_json::json!({
                    "type": DATA_LOG_ENTRIES,
                    "data": Value::Object(page),
                });
                Some(frame)
            }
            entry @ Value::Object(_) => {
                (!query.notail && admitted(&entry)).then(|| self.clone())
            }
            _ => Some(self.clone()),
        }
    }

    /// Decode the frame's content.
    pub fn payload(&self) -> Result<FramePayload, FrameError> {
        match self.message_kind()? {
            MessageKind::Data => decode_data(&self.data),
            MessageKind::Connected => Ok(FramePayload::Connected),
            MessageKind::DialFailed => Ok(FramePayload::DialFailed(match &self.data {
                Value::String(reason) => reason.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            })),
            other => Ok(FramePayload::Control(other)),
        }
    }
}

#[derive(Deserialize)]
struct DataEnvelope {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct RawPage {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    hits: Vec<RawEntry>,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(default)]
    timestamp: Value,
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    targetname: Option<String>,
}

impl RawEntry {
    fn into_record(self) -> LogRecord {
        LogRecord {
            timestamp: parse_millis(&self.timestamp),
            level: self.level.filter(|l| !l.is_empty()),
            message: self.message.unwrap_or_default(),
            target: self.targetname.filter(|t| !t.is_empty()),
        }
    }
}

fn decode_data(data: &Value) -> Result<FramePayload, FrameError> {
    let envelope: DataEnvelope = serde_json::from_value(data.clone())?;
    match envelope.kind {
        DATA_LOG_ENTRIES => decode_entries(envelope.data),
        DATA_UNITS => {
            if envelope.data.is_null() {
                return Ok(FramePayload::Units(UnitCatalog::default()));
            }
            Ok(FramePayload::Units(serde_json::from_value(envelope.data)?))
        }
        other => Err(FrameError::UnknownDataType { code: other }),
    }
}

fn decode_entries(data: Value) -> Result<FramePayload, FrameError> {
    match data {
        Value::Null => Ok(FramePayload::Records(Vec::new())),
        Value::Object(ref map) if map.contains_key("hits") => {
            let page: RawPage = serde_json::from_value(data)?;
            Ok(FramePayload::Page {
                total: page.total,
                records: page.hits.into_iter().map(RawEntry::into_record).collect(),
            })
        }
        Value::Object(_) => {
            let entry: RawEntry = serde_json::from_value(data)?;
            Ok(FramePayload::Records(vec![entry.into_record()]))
        }
        other => Err(FrameError::MalformedPayload {
            reason: format!("expected log entry object, got {other}"),
        }),
    }
}

/// The agent sends millisecond timestamps as decimal strings; numbers are
/// accepted too.
fn parse_millis(value: &Value) -> Option<DateTime<Utc>> {
    let millis = match value {
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    Utc.timestamp_millis_opt(millis).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_follow_entry_decodes_to_single_record() {
        let line = r#"{"client_id":7,"host":"10.0.0.5","type":4,
            "data":{"type":0,"data":{"timestamp":"1533686888000","level":"3",
            "message":"boom","targetname":"sshd.service"}}}"#;
        let frame = Frame::parse(line).unwrap();
        assert_eq!(frame.client_id, 7);
        assert_eq!(frame.host, "10.0.0.5");

        let FramePayload::Records(records) = frame.payload().unwrap() else {
            panic!("expected records");
        };
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.message, "boom");
        assert_eq!(r.level.as_deref(), Some("3"));
        assert_eq!(r.target.as_deref(), Some("sshd.service"));
        assert_eq!(r.timestamp.unwrap().timestamp(), 1_533_686_888);
    }

    #[test]
    fn test_page_decodes_total_and_hits() {
        let frame = Frame {
            client_id: 1,
            host: "h".into(),
            kind: MessageKind::Data.code(),
            joptions: None,
            data: json!({"type": 0, "data": {"total": 120, "hits": [
                {"timestamp": "1000", "message": "a"},
                {"timestamp": 2000, "message": "b", "level": ""}
            ]}}),
        };
        match frame.payload().unwrap() {
            FramePayload::Page { total, records } => {
                assert_eq!(total, 120);
                assert_eq!(records.len(), 2);
                assert_eq!(records[1].timestamp.unwrap().timestamp_millis(), 2000);
                assert_eq!(records[1].level, None);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_null_entry_payload_is_empty() {
        let frame = Frame::parse(r#"{"type":4,"data":{"type":0,"data":null}}"#).unwrap();
        assert_eq!(frame.payload().unwrap(), FramePayload::Records(Vec::new()));
    }

    #[test]
    fn test_unit_catalog_payload() {
        let frame = Frame::parse(
            r#"{"type":4,"data":{"type":1,"data":{"systemd":["sshd"],"transport":["kernel"]}}}"#,
        )
        .unwrap();
        let FramePayload::Units(units) = frame.payload().unwrap() else {
            panic!("expected units");
        };
        assert_eq!(units.systemd, vec!["sshd"]);
        assert!(units.user.is_empty());
        assert_eq!(units.transport, vec!["kernel"]);
    }

    #[test]
    fn test_connection_frames() {
        let connected = Frame::parse(r#"{"type":3}"#).unwrap();
        assert_eq!(connected.payload().unwrap(), FramePayload::Connected);

        let failed = Frame::parse(r#"{"type":6,"data":"dial tcp: refused"}"#).unwrap();
        assert_eq!(
            failed.payload().unwrap(),
            FramePayload::DialFailed("dial tcp: refused".into())
        );
    }

    #[test]
    fn test_control_frame_serialises_joptions() {
        let query = JournalQuery {
            unit: "sshd".into(),
            notail: true,
            size: 50,
            ..Default::default()
        };
        let frame = Frame::update_options(42, "10.0.0.5", query.clone());
        let line = frame.to_line().unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], 0);
        assert_eq!(value["client_id"], 42);
        assert_eq!(value["joptions"]["unit"], "sshd");
        assert!(value.get("data").is_none());

        assert_eq!(Frame::parse(&line).unwrap().joptions, Some(query));
        assert_eq!(
            Frame::unit_list(42, "h").payload().unwrap(),
            FramePayload::Control(MessageKind::UnitList)
        );
    }

    fn entry_frame(level: &str, target: &str) -> Frame {
        Frame::parse(&format!(
            r#"{{"client_id":1,"host":"h","type":4,"data":{{"type":0,"data":{{"level":"{level}","message":"m","targetname":"{target}"}}}}}}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_restrict_drops_live_entries_for_static_queries() {
        let follow = JournalQuery::default();
        let static_query = JournalQuery {
            notail: true,
            ..Default::default()
        };
        let entry = entry_frame("6", "sshd.service");
        assert_eq!(entry.restrict_to(&follow), Some(entry.clone()));
        assert_eq!(entry.restrict_to(&static_query), None);
    }

    #[test]
    fn test_restrict_filters_entries_by_level_and_unit() {
        let query = JournalQuery {
            severity: "3".into(),
            unit: "sshd".into(),
            ..Default::default()
        };
        assert!(entry_frame("3", "sshd.service").restrict_to(&query).is_some());
        assert!(entry_frame("7", "sshd.service").restrict_to(&query).is_none());
        assert!(entry_frame("2", "cron.service").restrict_to(&query).is_none());
    }

    #[test]
    fn test_restrict_filters_page_hits_and_keeps_total() {
        let page = Frame {
            client_id: 1,
            host: "h".into(),
            kind: MessageKind::Data.code(),
            joptions: None,
            data: json!({"type": 0, "data": {"total": 9, "hits": [
                {"level": "2", "message": "kept"},
                {"level": "6", "message": "dropped"}
            ]}}),
        };
        let query = JournalQuery {
            severity: "3".into(),
            notail: true,
            ..Default::default()
        };
        let FramePayload::Page { total, records } = page.restrict_to(&query).unwrap().payload().unwrap()
        else {
            panic!("expected a page");
        };
        assert_eq!(total, 9);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "kept");

        assert_eq!(page.restrict_to(&JournalQuery::default()), None);
    }

    #[test]
    fn test_restrict_passes_non_entry_frames() {
        let connected = Frame::parse(r#"{"host":"h","type":3}"#).unwrap();
        let units = Frame::parse(r#"{"host":"h","type":4,"data":{"type":1,"data":{"systemd":["a"]}}}"#)
            .unwrap();
        let query = JournalQuery {
            notail: true,
            severity: "0".into(),
            ..Default::default()
        };
        assert_eq!(connected.restrict_to(&query), Some(connected.clone()));
        assert_eq!(units.restrict_to(&query), Some(units.clone()));
    }

    #[test]
    fn test_agent_addr_and_client_side_dial_failure() {
        let line = Frame::agent_addr(3, "10.0.0.5", "10.0.0.5:9995").to_line().unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], 1);
        assert_eq!(value["data"], "10.0.0.5:9995");

        assert_eq!(
            Frame::dial_failed(3, "h", "refused").payload().unwrap(),
            FramePayload::DialFailed("refused".into())
        );
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(Frame::parse("not json"), Err(FrameError::Json { .. })));
        assert!(matches!(
            Frame::parse(r#"{"type":99}"#).unwrap().payload(),
            Err(FrameError::UnknownMessageType { code: 99 })
        ));
        assert!(matches!(
            Frame::parse(r#"{"type":4,"data":{"type":5}}"#).unwrap().payload(),
            Err(FrameError::UnknownDataType { code: 5 })
        ));
        assert!(matches!(
            Frame::parse(r#"{"type":4,"data":{"type":0,"data":[1,2]}}"#).unwrap().payload(),
            Err(FrameError::MalformedPayload { .. })
        ));
    }
}
