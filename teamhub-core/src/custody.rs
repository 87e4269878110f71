//! Append-only custody ledger: who holds which piece of equipment.
//!
//! Every hand-off appends a record under its equipment. The current
//! holder is the record with the newest timestamp. Equipment without any
//! record is *unmanaged*, which is a different situation from "the
//! holder is known but not coming".

use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::equipment::Equipment;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustodyRecord {
    /// Store-assigned id; zero until appended.
    #[serde(default)]
    pub id: i64,
    pub equipment_id: i64,
    pub member_id: String,
    #[serde(rename = "ts", with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub comment: String,
}

/// Build the record for a hand-off. The store assigns its id on append.
pub fn record_custody(
    equipment_id: i64,
    member_id: impl Into<String>,
    timestamp: DateTime<Utc>,
    comment: impl Into<String>,
) -> CustodyRecord {
    CustodyRecord {
        id: 0,
        equipment_id,
        member_id: member_id.into(),
        timestamp,
        comment: comment.into(),
    }
}

/// The newest record, regardless of input order. `None` means unmanaged.
pub fn current_holder(records: &[CustodyRecord]) -> Option<&CustodyRecord> {
    records.iter().max_by_key(|r| (r.timestamp, r.id))
}

pub fn has_been_updated_since(records: &[CustodyRecord], cutoff: DateTime<Utc>) -> bool {
    current_holder(records).is_some_and(|r| r.timestamp > cutoff)
}

/// An equipment item with the custody history that was loaded for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEquipment {
    #[serde(flatten)]
    pub equipment: Equipment,
    #[serde(default)]
    pub history: Vec<CustodyRecord>,
}

impl TrackedEquipment {
    pub fn new(equipment: Equipment, history: Vec<CustodyRecord>) -> Self {
        TrackedEquipment { equipment, history }
    }

    pub fn current_holder(&self) -> Option<&CustodyRecord> {
        current_holder(&self.history)
    }

    pub fn is_unmanaged(&self) -> bool {
        self.history.is_empty()
    }

    pub fn has_been_updated_since(&self, cutoff: DateTime<Utc>) -> bool {
        has_been_updated_since(&self.history, cutoff)
    }
}

/// Attach custody history to each item, newest first, at most `limit`
/// records each.
///
/// Lookups are best-effort: a failed lookup is logged and the item is
/// carried with an empty history, so it reads as unmanaged instead of
/// aborting the batch.
pub fn track_all(
    store: &dyn Store,
    equipment: Vec<Equipment>,
    limit: Option<usize>,
) -> Vec<TrackedEquipment> {
    equipment
        .into_iter()
        .map(|item| {
            let history = match store.query_custody_records(item.id, limit) {
                Ok(history) => history,
                Err(e) => {
                    warn!(equipment = item.id, name = %item.name, error = %e, "custody lookup failed");
                    Vec::new()
                }
            };
            TrackedEquipment::new(item, history)
        })
        .collect()
}

/// Custody health of the whole equipment inventory.
#[derive(Debug, Clone, Serialize)]
pub struct CustodySummary {
    /// Nobody has ever reported holding these.
    pub unmanaged: Vec<Equipment>,
    /// Practice equipment whose latest report is not newer than `since`.
    pub not_updated: Vec<TrackedEquipment>,
    #[serde(with = "ts_milliseconds")]
    pub since: DateTime<Utc>,
}

impl CustodySummary {
    pub fn collect(items: &[TrackedEquipment], since: DateTime<Utc>) -> Self {
        let mut summary = CustodySummary {
            unmanaged: Vec::new(),
            not_updated: Vec::new(),
            since,
        };
        for item in items {
            if item.is_unmanaged() {
                summary.unmanaged.push(item.equipment.clone());
            } else if item.equipment.for_practice && !item.has_been_updated_since(since) {
                summary.not_updated.push(item.clone());
            }
        }
        summary
    }
}

/// Equipment with no custody report since a reference event ended.
#[derive(Debug, Clone, Serialize)]
pub struct UnreportedScan {
    /// In rotation but never reported at all.
    pub never_reported: Vec<Equipment>,
    /// Last reported before the reference event ended.
    pub unreported: Vec<TrackedEquipment>,
    #[serde(with = "ts_milliseconds")]
    pub event_end: DateTime<Utc>,
}

impl UnreportedScan {
    pub fn collect(items: &[TrackedEquipment], event_end: DateTime<Utc>) -> Self {
        let mut scan = UnreportedScan {
            never_reported: Vec::new(),
            unreported: Vec::new(),
            event_end,
        };
        for item in items.iter().filter(|i| i.equipment.is_in_rotation()) {
            match item.current_holder() {
                None => scan.never_reported.push(item.equipment.clone()),
                Some(latest) if latest.timestamp < event_end => scan.unreported.push(item.clone()),
                Some(_) => {}
            }
        }
        scan
    }

    pub fn is_empty(&self) -> bool {
        self.never_reported.is_empty() && self.unreported.is_empty()
    }
}
