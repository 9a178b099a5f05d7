use crate::error::{RaffleError, Result};
use crate::types::{ParticipantRecord, SharedSessionState, Winner};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

pub const SESSION_EXPORT_VERSION: &str = "1.0";

pub fn export_document(winners: &[Winner]) -> Result<String> {
    Ok(serde_json::to_string_pretty(winners)?)
}

/// Full session snapshot, readable back with [`import_session`].
pub fn export_session(state: &SharedSessionState, now: DateTime<Utc>) -> Result<String> {
    let mut document = serde_json::to_value(state)?;

    if let Value::Object(map) = &mut document {
        map.insert("exportedAt".to_string(), Value::from(timestamp(now)));
        map.insert("version".to_string(), Value::from(SESSION_EXPORT_VERSION));
    }

    Ok(serde_json::to_string_pretty(&document)?)
}

/// Parse and validate a session snapshot. Nothing is applied here; the
/// caller decides what to do with the result.
pub fn import_session(text: &str, total_prizes: u32, now: DateTime<Utc>) -> Result<SharedSessionState> {
    let document: Value = serde_json::from_str(text)
        .map_err(|e| RaffleError::invalid_format(format!("not a JSON document: {}", e)))?;

    if let Some(version) = document.get("version").and_then(Value::as_str) {
        if version != SESSION_EXPORT_VERSION {
            tracing::warn!("Importing session exported with version {}", version);
        }
    }

    SharedSessionState::from_value(document, total_prizes, now)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantList<'a> {
    employees: &'a [ParticipantRecord],
    exported_at: String,
    count: usize,
}

pub fn export_participant_list(pool: &[ParticipantRecord], now: DateTime<Utc>) -> Result<String> {
    let list = ParticipantList {
        employees: pool,
        exported_at: timestamp(now),
        count: pool.len(),
    };
    Ok(serde_json::to_string_pretty(&list)?)
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::PrizeLedger;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn session() -> SharedSessionState {
        let mut ledger = PrizeLedger::new(10);
        ledger
            .record_draw(Winner::new(
                ParticipantRecord::new("1001", "Alice", "HR"),
                now(),
                "01/03/2026 16:00:00".to_string(),
                1,
            ))
            .unwrap();

        SharedSessionState {
            participant_pool: vec![
                ParticipantRecord::new("1001", "Alice", "HR"),
                ParticipantRecord::new("1002", "Bob", ""),
            ],
            prize_ledger: ledger,
            last_updated: now(),
        }
    }

    #[test]
    fn test_session_export_metadata() {
        let text = export_session(&session(), now()).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["version"], "1.0");
        assert_eq!(value["exportedAt"], "2026-03-01T09:00:00.000Z");
        assert_eq!(value["prizeLedger"]["remaining"], 9);
        assert_eq!(value["lastUpdated"], now().timestamp_millis());
    }

    #[test]
    fn test_session_import_accepts_export() {
        let text = export_session(&session(), now()).unwrap();
        assert_eq!(import_session(&text, 10, now()).unwrap(), session());
    }

    #[test]
    fn test_session_import_rejections() {
        let cases = [
            "not json",
            r#"{"prizeLedger": {"remaining": 10, "winners": []}}"#,
            r#"{"participantPool": "x", "prizeLedger": {"remaining": 10, "winners": []}}"#,
            r#"{"participantPool": []}"#,
            r#"{"participantPool": [], "prizeLedger": null}"#,
        ];

        for case in cases {
            assert!(
                matches!(import_session(case, 10, now()), Err(RaffleError::InvalidFormat(_))),
                "accepted {}",
                case
            );
        }
    }

    #[test]
    fn test_session_import_defaults_last_updated() {
        let text = r#"{"participantPool": [], "prizeLedger": {"remaining": 10, "winners": []}}"#;
        assert_eq!(import_session(text, 10, now()).unwrap().last_updated, now());
    }

    #[test]
    fn test_participant_list_shape() {
        let state = session();
        let value: Value =
            serde_json::from_str(&export_participant_list(&state.participant_pool, now()).unwrap())
                .unwrap();

        assert_eq!(value["count"], 2);
        assert_eq!(value["employees"][1]["id"], "1002");
        assert!(value["exportedAt"].is_string());
    }

    #[test]
    fn test_winner_document_is_pretty_array() {
        let text = export_document(session().prize_ledger.winners()).unwrap();
        assert!(text.starts_with("[\n"));

        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["prizeRank"], 1);
    }
}
