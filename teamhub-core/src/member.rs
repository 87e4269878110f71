//! Team members synced from the chat workspace.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::MEMBER_CACHE_MISS_GRACE;
use crate::error::{HubError, HubResult};
use crate::store::{MemberFilter, Store};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Chat user id
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    /// Free-text role (position) from the chat profile, e.g. "QB / Captain"
    #[serde(default)]
    pub role_title: String,
    #[serde(default)]
    pub picture_url: String,
    #[serde(default)]
    pub status: MemberStatus,
    /// Jersey number. Zero is a valid number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
    #[serde(default)]
    pub is_bot: bool,
}

/// Participation state of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    /// Regular member; expected to answer every RSVP.
    #[default]
    Active,
    /// Joins some activities only; no RSVP expected.
    Limited,
    /// Dormant; no RSVP expected.
    Inactive,
    /// Left the team.
    Deleted,
}

impl Member {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Member {
            id: id.into(),
            display_name: display_name.into(),
            role_title: String::new(),
            picture_url: String::new(),
            status: MemberStatus::Active,
            number: None,
            is_bot: false,
        }
    }

    pub fn with_role(mut self, role_title: impl Into<String>) -> Self {
        self.role_title = role_title.into();
        self
    }

    pub fn with_status(mut self, status: MemberStatus) -> Self {
        self.status = status;
        self
    }

    /// Only active members appear in roll-calls and RSVP reminders.
    pub fn is_expected_to_rsvp(&self) -> bool {
        self.status == MemberStatus::Active
    }

    /// Whether the member can be mentioned in a chat reminder.
    pub fn is_mentionable(&self) -> bool {
        self.status != MemberStatus::Deleted && !self.is_bot
    }
}

/// What the chat directory knows about a member.
///
/// Status and jersey number are kept by the team, so a directory sync
/// never carries them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MemberProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role_title: String,
    #[serde(default)]
    pub picture_url: String,
    #[serde(default)]
    pub is_bot: bool,
    /// The account was removed from the workspace.
    #[serde(default)]
    pub deleted: bool,
}

impl MemberProfile {
    /// Overlay the profile on the stored record, if any.
    ///
    /// A removed account becomes `Deleted`; a deleted member who shows up
    /// again becomes `Active`. Any other status and the number are kept.
    pub fn merge_into(&self, existing: Option<&Member>) -> Member {
        let mut member = existing
            .cloned()
            .unwrap_or_else(|| Member::new(self.id.clone(), ""));
        member.display_name = self.display_name.clone();
        member.role_title = self.role_title.clone();
        member.picture_url = self.picture_url.clone();
        member.is_bot = self.is_bot;
        if self.deleted {
            member.status = MemberStatus::Deleted;
        } else if member.status == MemberStatus::Deleted {
            member.status = MemberStatus::Active;
        }
        member
    }
}

/// Team-owned fields; `None` leaves the field as it is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct MemberProps {
    #[serde(default)]
    pub status: Option<MemberStatus>,
    #[serde(default)]
    pub number: Option<u32>,
}

impl MemberProps {
    pub fn apply(&self, member: &mut Member) {
        if let Some(status) = self.status {
            member.status = status;
        }
        if let Some(number) = self.number {
            member.number = Some(number);
        }
    }
}

/// Compiled role patterns, keyed by their source text.
///
/// Patterns are matched case-insensitively anywhere in a role title. The
/// same few patterns are reused for every report, so compiled forms are
/// kept for the life of the cache.
#[derive(Debug, Default)]
pub struct RolePatternCache {
    compiled: RwLock<HashMap<String, Regex>>,
}

impl RolePatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pattern: &str) -> HubResult<Regex> {
        if let Some(exp) = self.read().get(pattern) {
            return Ok(exp.clone());
        }

        let exp = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| HubError::InvalidRolePattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

        self.compiled
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(pattern.to_string(), exp.clone());
        Ok(exp)
    }

    /// Compile every pattern up front so a bad one rejects the whole request.
    pub fn get_all(&self, patterns: &[String]) -> HubResult<Vec<(String, Regex)>> {
        patterns
            .iter()
            .map(|p| self.get(p).map(|exp| (p.clone(), exp)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Regex>> {
        self.compiled
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct Snapshot {
    loaded_at: Instant,
    members: HashMap<String, Member>,
}

/// Member lookup cache with a time-to-live.
///
/// The whole member table is loaded at once. An expired snapshot
/// triggers a reload, and so does a miss once the snapshot is older than
/// the miss grace period. Unknown ids looked up again right away are
/// answered from the snapshot. `invalidate` drops the snapshot so the
/// next lookup reloads (member sync calls this).
pub struct MemberCache {
    ttl: Duration,
    miss_grace: Duration,
    snapshot: RwLock<Option<Snapshot>>,
}

impl MemberCache {
    pub fn new(ttl: Duration) -> Self {
        MemberCache {
            ttl,
            miss_grace: MEMBER_CACHE_MISS_GRACE,
            snapshot: RwLock::new(None),
        }
    }

    pub fn with_miss_grace(mut self, miss_grace: Duration) -> Self {
        self.miss_grace = miss_grace;
        self
    }

    pub fn get(&self, store: &dyn Store, id: &str) -> HubResult<Member> {
        {
            let guard = self
                .snapshot
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(snapshot) = guard.as_ref() {
                let age = snapshot.loaded_at.elapsed();
                if age < self.ttl {
                    match snapshot.members.get(id) {
                        Some(member) => return Ok(member.clone()),
                        None if age < self.miss_grace => {
                            return Err(HubError::MemberNotFound(id.to_string()));
                        }
                        None => {}
                    }
                }
            }
        }

        let members = self.reload(store)?;
        members
            .get(id)
            .cloned()
            .ok_or_else(|| HubError::MemberNotFound(id.to_string()))
    }

    pub fn invalidate(&self) {
        *self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    fn reload(&self, store: &dyn Store) -> HubResult<HashMap<String, Member>> {
        let members: HashMap<String, Member> = store
            .query_members(&MemberFilter::default())?
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();
        debug!(count = members.len(), "member cache reloaded");

        *self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Snapshot {
            loaded_at: Instant::now(),
            members: members.clone(),
        });
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_status_gates_rsvp() {
        let m = Member::new("U1", "A");
        assert!(m.is_expected_to_rsvp());
        assert!(!m.clone().with_status(MemberStatus::Limited).is_expected_to_rsvp());
        assert!(!m.clone().with_status(MemberStatus::Inactive).is_expected_to_rsvp());
        assert!(!m.with_status(MemberStatus::Deleted).is_expected_to_rsvp());
    }

    #[test]
    fn test_status_defaults_to_active() {
        let m: Member = serde_json::from_str(r#"{"id":"U1"}"#).unwrap();
        assert_eq!(m.status, MemberStatus::Active);
        assert_eq!(m.number, None);

        let m: Member = serde_json::from_str(r#"{"id":"U1","number":0}"#).unwrap();
        assert_eq!(m.number, Some(0));
    }

    #[test]
    fn test_role_pattern_cache_is_case_insensitive() {
        let cache = RolePatternCache::new();
        let qb = cache.get("qb").unwrap();
        assert!(qb.is_match("QB / Captain"));
        assert!(!qb.is_match("RB"));

        cache.get("qb").unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_role_pattern_cache_rejects_bad_pattern() {
        let cache = RolePatternCache::new();
        let err = cache.get_all(&["qb".to_string(), "(".to_string()]).unwrap_err();
        assert!(matches!(err, HubError::InvalidRolePattern { .. }));
    }

    #[test]
    fn test_member_cache_reloads_on_miss_and_invalidate() {
        let store = MemoryStore::new();
        store.put_member(Member::new("U1", "A")).unwrap();

        let cache = MemberCache::new(Duration::from_secs(600)).with_miss_grace(Duration::ZERO);
        assert_eq!(cache.get(&store, "U1").unwrap().display_name, "A");

        store.put_member(Member::new("U2", "B")).unwrap();
        assert_eq!(cache.get(&store, "U2").unwrap().display_name, "B");

        store.put_member(Member::new("U1", "A2")).unwrap();
        assert_eq!(cache.get(&store, "U1").unwrap().display_name, "A");
        cache.invalidate();
        assert_eq!(cache.get(&store, "U1").unwrap().display_name, "A2");

        assert!(matches!(
            cache.get(&store, "nobody"),
            Err(HubError::MemberNotFound(_))
        ));
    }

    #[test]
    fn test_member_cache_does_not_reload_for_repeated_misses() {
        let store = MemoryStore::new();
        store.put_member(Member::new("U1", "A")).unwrap();

        let cache = MemberCache::new(Duration::from_secs(600))
            .with_miss_grace(Duration::from_secs(600));
        cache.get(&store, "U1").unwrap();

        // Added behind the cache's back: not visible until the grace runs out.
        store.put_member(Member::new("U2", "B")).unwrap();
        for _ in 0..3 {
            assert!(matches!(
                cache.get(&store, "U2"),
                Err(HubError::MemberNotFound(_))
            ));
        }
        cache.invalidate();
        assert_eq!(cache.get(&store, "U2").unwrap().display_name, "B");
    }

    #[test]
    fn test_profile_merge_keeps_team_fields() {
        let stored = Member {
            number: Some(0),
            ..Member::new("U1", "Taro").with_status(MemberStatus::Inactive)
        };
        let profile = MemberProfile {
            id: "U1".into(),
            display_name: "Taro Y".into(),
            role_title: "QB".into(),
            ..Default::default()
        };
        let merged = profile.merge_into(Some(&stored));
        assert_eq!(merged.display_name, "Taro Y");
        assert_eq!(merged.role_title, "QB");
        assert_eq!(merged.status, MemberStatus::Inactive);
        assert_eq!(merged.number, Some(0));

        let fresh = profile.merge_into(None);
        assert_eq!(fresh.id, "U1");
        assert_eq!(fresh.status, MemberStatus::Active);
        assert_eq!(fresh.number, None);
    }

    #[test]
    fn test_profile_merge_tracks_removed_accounts() {
        let stored = Member::new("U1", "Taro").with_status(MemberStatus::Limited);
        let removed = MemberProfile {
            id: "U1".into(),
            deleted: true,
            ..Default::default()
        };
        let merged = removed.merge_into(Some(&stored));
        assert_eq!(merged.status, MemberStatus::Deleted);

        let back = MemberProfile {
            id: "U1".into(),
            ..Default::default()
        };
        assert_eq!(back.merge_into(Some(&merged)).status, MemberStatus::Active);
    }

    #[test]
    fn test_props_only_touch_given_fields() {
        let mut member = Member::new("U1", "Taro");
        MemberProps {
            number: Some(12),
            ..Default::default()
        }
        .apply(&mut member);
        assert_eq!(member.number, Some(12));
        assert_eq!(member.status, MemberStatus::Active);

        let props: MemberProps = serde_json::from_str(r#"{"status":"limited"}"#).unwrap();
        props.apply(&mut member);
        assert_eq!(member.status, MemberStatus::Limited);
        assert_eq!(member.number, Some(12));
    }

    #[test]
    fn test_member_cache_expires() {
        let store = MemoryStore::new();
        store.put_member(Member::new("U1", "A")).unwrap();

        let cache = MemberCache::new(Duration::ZERO);
        cache.get(&store, "U1").unwrap();
        store.put_member(Member::new("U1", "A2")).unwrap();
        assert_eq!(cache.get(&store, "U1").unwrap().display_name, "A2");
    }
}
