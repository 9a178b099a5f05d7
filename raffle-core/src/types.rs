use crate::error::{RaffleError, Result};
use crate::ledger::PrizeLedger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// One eligible participant. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub department: String,
}

impl ParticipantRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, department: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            department: department.into(),
        }
    }
}

/// A participant stamped with the moment and rank of their draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    #[serde(flatten)]
    pub participant: ParticipantRecord,
    pub created_at: DateTime<Utc>,
    pub display_timestamp: String,
    pub prize_rank: u32,
}

impl Winner {
    pub fn new(
        participant: ParticipantRecord,
        created_at: DateTime<Utc>,
        display_timestamp: String,
        prize_rank: u32,
    ) -> Self {
        Self {
            participant,
            created_at,
            display_timestamp,
            prize_rank,
        }
    }

    pub fn id(&self) -> &str {
        &self.participant.id
    }

    pub fn name(&self) -> &str {
        &self.participant.name
    }

    pub fn department(&self) -> &str {
        &self.participant.department
    }
}

/// The unit of synchronization: always read and written whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedSessionState {
    pub participant_pool: Vec<ParticipantRecord>,
    pub prize_ledger: PrizeLedger,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
}

impl SharedSessionState {
    pub fn initial(total_prizes: u32, now: DateTime<Utc>) -> Self {
        Self {
            participant_pool: Vec::new(),
            prize_ledger: PrizeLedger::new(total_prizes),
            last_updated: now,
        }
    }

    /// Parse an untyped document and validate it before it reaches the
    /// ledger or pool types. A missing `lastUpdated` is stamped with `now`.
    pub fn from_value(mut value: Value, total_prizes: u32, now: DateTime<Utc>) -> Result<Self> {
        let doc = value
            .as_object_mut()
            .ok_or_else(|| RaffleError::invalid_format("document is not an object"))?;

        if !matches!(doc.get("participantPool"), Some(Value::Array(_))) {
            return Err(RaffleError::invalid_format(
                "participantPool is missing or invalid",
            ));
        }

        if doc.get("prizeLedger").map_or(true, Value::is_null) {
            return Err(RaffleError::invalid_format("prizeLedger is missing"));
        }

        if doc.get("lastUpdated").map_or(true, Value::is_null) {
            doc.insert("lastUpdated".to_string(), Value::from(now.timestamp_millis()));
        }

        let state: Self = serde_json::from_value(value)
            .map_err(|e| RaffleError::invalid_format(format!("malformed document: {}", e)))?;
        state.validate(total_prizes)?;

        Ok(state)
    }

    pub fn validate(&self, total_prizes: u32) -> Result<()> {
        if let Some(pos) = self.participant_pool.iter().position(|p| p.id.trim().is_empty()) {
            return Err(RaffleError::invalid_format(format!(
                "participant at index {} has an empty id",
                pos
            )));
        }

        self.prize_ledger
            .check_invariants(total_prizes)
            .map_err(RaffleError::InvalidFormat)
    }

    /// Participants who have not won yet, in pool order.
    pub fn available_participants(&self) -> Vec<&ParticipantRecord> {
        let drawn: HashSet<&str> = self.prize_ledger.winner_ids().collect();
        self.participant_pool
            .iter()
            .filter(|p| !drawn.contains(p.id.as_str()))
            .collect()
    }

    /// Content hash over pool and ledger; `lastUpdated` is left out so that
    /// re-stamped but otherwise identical documents compare equal.
    pub fn content_digest(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&self.participant_pool)?);
        hasher.update(serde_json::to_vec(&self.prize_ledger)?);
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Partial update merged into the cached [`SharedSessionState`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub participant_pool: Option<Vec<ParticipantRecord>>,
    pub prize_ledger: Option<PrizeLedger>,
}

impl SessionPatch {
    pub fn pool(participant_pool: Vec<ParticipantRecord>) -> Self {
        Self {
            participant_pool: Some(participant_pool),
            prize_ledger: None,
        }
    }

    pub fn ledger(prize_ledger: PrizeLedger) -> Self {
        Self {
            participant_pool: None,
            prize_ledger: Some(prize_ledger),
        }
    }

    pub fn replace(state: SharedSessionState) -> Self {
        Self {
            participant_pool: Some(state.participant_pool),
            prize_ledger: Some(state.prize_ledger),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.participant_pool.is_none() && self.prize_ledger.is_none()
    }

    pub fn apply_to(self, state: &mut SharedSessionState, now: DateTime<Utc>) {
        if let Some(pool) = self.participant_pool {
            state.participant_pool = pool;
        }
        if let Some(ledger) = self.prize_ledger {
            state.prize_ledger = ledger;
        }
        state.last_updated = now;
    }
}
