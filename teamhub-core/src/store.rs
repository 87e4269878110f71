//! Document store contract and an in-memory implementation.
//!
//! The engine never talks to a database directly. Callers hand it
//! snapshots read through [`Store`], and write back through it.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::EVENT_QUERY_LIMIT;
use crate::custody::CustodyRecord;
use crate::equipment::Equipment;
use crate::error::{HubError, HubResult};
use crate::event::Event;
use crate::member::{Member, MemberStatus};
use crate::time_window::TimeRange;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberFilter {
    pub include_deleted: bool,
}

/// Storage collaborator.
///
/// All methods take `&self`; implementations do their own locking.
pub trait Store: Send + Sync {
    fn get_event(&self, id: &str) -> HubResult<Option<Event>>;

    /// Events starting inside `range`, latest start first, at most
    /// [`EVENT_QUERY_LIMIT`].
    fn query_events(&self, range: &TimeRange) -> HubResult<Vec<Event>>;

    /// Every event starting strictly after `after`, earliest first.
    fn upcoming_events(&self, after: DateTime<Utc>) -> HubResult<Vec<Event>>;

    /// Earliest event starting strictly after `after`.
    fn next_event(&self, after: DateTime<Utc>) -> HubResult<Option<Event>>;

    /// Create or overwrite.
    fn put_event(&self, event: Event) -> HubResult<()>;

    fn delete_event(&self, id: &str) -> HubResult<()>;

    /// Atomic read-modify-write of one event. `f` sees the current
    /// record; nothing is written if it fails.
    fn update_event(
        &self,
        id: &str,
        f: &mut dyn FnMut(&mut Event) -> HubResult<()>,
    ) -> HubResult<Event>;

    fn get_equipment(&self, id: i64) -> HubResult<Option<Equipment>>;

    fn query_equipment(&self) -> HubResult<Vec<Equipment>>;

    /// Assigns a fresh id.
    fn create_equipment(&self, equipment: Equipment) -> HubResult<Equipment>;

    fn update_equipment(&self, equipment: Equipment) -> HubResult<Equipment>;

    /// Removes the item and every custody record under it.
    fn delete_equipment(&self, id: i64) -> HubResult<Equipment>;

    /// Newest first.
    fn query_custody_records(
        &self,
        equipment_id: i64,
        limit: Option<usize>,
    ) -> HubResult<Vec<CustodyRecord>>;

    /// Appends under the record's equipment and assigns an id.
    fn append_custody(&self, record: CustodyRecord) -> HubResult<CustodyRecord>;

    fn revoke_custody(&self, equipment_id: i64, record_id: i64) -> HubResult<CustodyRecord>;

    fn get_member(&self, id: &str) -> HubResult<Option<Member>>;

    fn query_members(&self, filter: &MemberFilter) -> HubResult<Vec<Member>>;

    fn put_member(&self, member: Member) -> HubResult<()>;

    /// Atomic read-modify-write of one member. `f` sees the current
    /// record (if any) and returns the one to store.
    fn upsert_member(
        &self,
        id: &str,
        f: &mut dyn FnMut(Option<&Member>) -> HubResult<Member>,
    ) -> HubResult<Member>;
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    events: BTreeMap<String, Event>,
    #[serde(default)]
    equipment: BTreeMap<i64, Equipment>,
    /// Keyed by equipment id; records in append order.
    #[serde(default)]
    custody: HashMap<i64, Vec<CustodyRecord>>,
    #[serde(default)]
    members: BTreeMap<String, Member>,
    #[serde(default)]
    next_id: i64,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// An in-memory store, optionally persisted as a JSON snapshot.
///
/// With a backing file every successful write rewrites the snapshot.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the snapshot at `path`, or start empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> HubResult<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)
                .map_err(|e| HubError::Store(format!("corrupt snapshot {}: {e}", path.display())))?
        } else {
            Tables::default()
        };
        debug!(path = %path.display(), "opened store snapshot");
        Ok(MemoryStore {
            tables: RwLock::new(tables),
            path: Some(path),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` against a copy of the tables and commit only if it succeeds
    /// and the snapshot (if any) was written.
    fn transact<T>(&self, f: impl FnOnce(&mut Tables) -> HubResult<T>) -> HubResult<T> {
        let mut guard = self.write();
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        self.persist(&draft)?;
        *guard = draft;
        Ok(out)
    }

    fn persist(&self, tables: &Tables) -> HubResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(tables)
            .map_err(|e| HubError::Store(format!("could not serialize snapshot: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl Store for MemoryStore {
    fn get_event(&self, id: &str) -> HubResult<Option<Event>> {
        Ok(self.read().events.get(id).cloned())
    }

    fn query_events(&self, range: &TimeRange) -> HubResult<Vec<Event>> {
        let mut events: Vec<Event> = self
            .read()
            .events
            .values()
            .filter(|e| range.contains(e.start_time))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        events.truncate(EVENT_QUERY_LIMIT);
        Ok(events)
    }

    fn upcoming_events(&self, after: DateTime<Utc>) -> HubResult<Vec<Event>> {
        let mut events: Vec<Event> = self
            .read()
            .events
            .values()
            .filter(|e| e.start_time > after)
            .cloned()
            .collect();
        events.sort_by(|a, b| (a.start_time, &a.id).cmp(&(b.start_time, &b.id)));
        Ok(events)
    }

    fn next_event(&self, after: DateTime<Utc>) -> HubResult<Option<Event>> {
        Ok(self
            .read()
            .events
            .values()
            .filter(|e| e.start_time > after)
            .min_by_key(|e| e.start_time)
            .cloned())
    }

    fn put_event(&self, event: Event) -> HubResult<()> {
        self.transact(|t| {
            t.events.insert(event.id.clone(), event);
            Ok(())
        })
    }

    fn delete_event(&self, id: &str) -> HubResult<()> {
        self.transact(|t| {
            t.events
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| HubError::EventNotFound(id.to_string()))
        })
    }

    fn update_event(
        &self,
        id: &str,
        f: &mut dyn FnMut(&mut Event) -> HubResult<()>,
    ) -> HubResult<Event> {
        self.transact(|t| {
            let event = t
                .events
                .get_mut(id)
                .ok_or_else(|| HubError::EventNotFound(id.to_string()))?;
            f(event)?;
            Ok(event.clone())
        })
    }

    fn get_equipment(&self, id: i64) -> HubResult<Option<Equipment>> {
        Ok(self.read().equipment.get(&id).cloned())
    }

    fn query_equipment(&self) -> HubResult<Vec<Equipment>> {
        Ok(self.read().equipment.values().cloned().collect())
    }

    fn create_equipment(&self, mut equipment: Equipment) -> HubResult<Equipment> {
        self.transact(|t| {
            equipment.id = t.allocate_id();
            t.equipment.insert(equipment.id, equipment.clone());
            Ok(equipment)
        })
    }

    fn update_equipment(&self, equipment: Equipment) -> HubResult<Equipment> {
        self.transact(|t| {
            let slot = t
                .equipment
                .get_mut(&equipment.id)
                .ok_or(HubError::EquipmentNotFound(equipment.id))?;
            *slot = equipment.clone();
            Ok(equipment)
        })
    }

    fn delete_equipment(&self, id: i64) -> HubResult<Equipment> {
        self.transact(|t| {
            let removed = t
                .equipment
                .remove(&id)
                .ok_or(HubError::EquipmentNotFound(id))?;
            t.custody.remove(&id);
            Ok(removed)
        })
    }

    fn query_custody_records(
        &self,
        equipment_id: i64,
        limit: Option<usize>,
    ) -> HubResult<Vec<CustodyRecord>> {
        let tables = self.read();
        let mut records = tables.custody.get(&equipment_id).cloned().unwrap_or_default();
        records.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    fn append_custody(&self, mut record: CustodyRecord) -> HubResult<CustodyRecord> {
        self.transact(|t| {
            if !t.equipment.contains_key(&record.equipment_id) {
                return Err(HubError::EquipmentNotFound(record.equipment_id));
            }
            record.id = t.allocate_id();
            t.custody
                .entry(record.equipment_id)
                .or_default()
                .push(record.clone());
            Ok(record)
        })
    }

    fn revoke_custody(&self, equipment_id: i64, record_id: i64) -> HubResult<CustodyRecord> {
        self.transact(|t| {
            let not_found = HubError::CustodyRecordNotFound {
                equipment: equipment_id,
                record: record_id,
            };
            let Some(records) = t.custody.get_mut(&equipment_id) else {
                return Err(not_found);
            };
            let Some(pos) = records.iter().position(|r| r.id == record_id) else {
                return Err(not_found);
            };
            Ok(records.remove(pos))
        })
    }

    fn get_member(&self, id: &str) -> HubResult<Option<Member>> {
        Ok(self.read().members.get(id).cloned())
    }

    fn query_members(&self, filter: &MemberFilter) -> HubResult<Vec<Member>> {
        Ok(self
            .read()
            .members
            .values()
            .filter(|m| filter.include_deleted || m.status != MemberStatus::Deleted)
            .cloned()
            .collect())
    }

    fn put_member(&self, member: Member) -> HubResult<()> {
        self.transact(|t| {
            t.members.insert(member.id.clone(), member);
            Ok(())
        })
    }

    fn upsert_member(
        &self,
        id: &str,
        f: &mut dyn FnMut(Option<&Member>) -> HubResult<Member>,
    ) -> HubResult<Member> {
        self.transact(|t| {
            let member = f(t.members.get(id))?;
            t.members.insert(id.to_string(), member.clone());
            Ok(member)
        })
    }
}
