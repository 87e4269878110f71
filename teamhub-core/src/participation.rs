//! Attendance answers (RSVPs) and the per-event participation ledger.
//!
//! Each event holds exactly one current answer per member. A new answer
//! replaces the previous one; no history is kept. The ledger is stored as
//! a JSON object blob next to the event record.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::HubResult;

/// A member's attendance answer for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationType {
    Join,
    JoinLate,
    LeaveEarly,
    Absent,
    #[default]
    Unanswered,
}

impl ParticipationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipationType::Join => "join",
            ParticipationType::JoinLate => "join_late",
            ParticipationType::LeaveEarly => "leave_early",
            ParticipationType::Absent => "absent",
            ParticipationType::Unanswered => "unanswered",
        }
    }

    /// Parse a stored answer. Unknown or empty values read as `Unanswered`.
    pub fn parse(s: &str) -> Self {
        match s {
            "join" => ParticipationType::Join,
            "join_late" => ParticipationType::JoinLate,
            "leave_early" => ParticipationType::LeaveEarly,
            "absent" => ParticipationType::Absent,
            _ => ParticipationType::Unanswered,
        }
    }

    /// Attends at least part of the event.
    pub fn join_anyhow(&self) -> bool {
        matches!(
            self,
            ParticipationType::Join | ParticipationType::JoinLate | ParticipationType::LeaveEarly
        )
    }

    pub fn is_unanswered(&self) -> bool {
        *self == ParticipationType::Unanswered
    }

    /// Label used in chat messages.
    pub fn label(&self) -> &'static str {
        match self {
            ParticipationType::Join => "出席",
            ParticipationType::JoinLate => "遅参",
            ParticipationType::LeaveEarly => "早退",
            ParticipationType::Absent => "欠席",
            ParticipationType::Unanswered => "未回答",
        }
    }
}

impl<'de> Deserialize<'de> for ParticipationType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .map(ParticipationType::parse)
            .unwrap_or_default())
    }
}

impl fmt::Display for ParticipationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One member's answer, with a snapshot of their profile at answer time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Participation {
    #[serde(rename = "type", default)]
    pub kind: ParticipationType,
    /// Free-form answer details (arrival time, reason, ...).
    #[serde(default, deserialize_with = "null_as_empty")]
    pub params: BTreeMap<String, serde_json::Value>,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Profile picture URL
    #[serde(default)]
    pub picture: String,
    /// Role title (position)
    #[serde(default)]
    pub title: String,
}

fn null_as_empty<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// Current answers for one event, keyed by member id.
pub type Participations = BTreeMap<String, Participation>;

/// Replace-or-insert the answer of `member_id`.
///
/// Callers must run this inside the store's read-modify-write transaction.
pub fn upsert(
    mut participations: Participations,
    member_id: impl Into<String>,
    answer: Participation,
) -> Participations {
    participations.insert(member_id.into(), answer);
    participations
}

/// Decode a stored blob. A blank blob is an empty ledger.
pub fn decode(blob: &str) -> HubResult<Participations> {
    if blob.trim().is_empty() {
        return Ok(Participations::new());
    }
    Ok(serde_json::from_str(blob)?)
}

pub fn encode(participations: &Participations) -> HubResult<String> {
    Ok(serde_json::to_string(participations)?)
}
