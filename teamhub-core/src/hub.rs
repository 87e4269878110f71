//! The hub: store, chat and caches wired to the scheduled jobs and the
//! answer flow.
//!
//! Every job takes `now` explicitly. Chat posts are best-effort; a
//! failed post is logged and never fails the job.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::allocation::{EquipmentAllocation, plan};
use crate::chat::{ChatClient, post_best_effort};
use crate::config::HubConfig;
use crate::constants::DEFAULT_EVENT_WINDOW_HOURS;
use crate::custody::{
    CustodyRecord, CustodySummary, TrackedEquipment, UnreportedScan, record_custody, track_all,
};
use crate::error::{HubError, HubResult};
use crate::event::{Event, ReminderKind, should_skip_reminders};
use crate::final_call::{FinalCallReport, aggregate};
use crate::member::{Member, MemberCache, MemberProfile, MemberProps, RolePatternCache};
use crate::messages::{self, MessageContext};
use crate::participation::{Participation, ParticipationType, upsert};
use crate::rsvp::{RsvpChangePolicy, RsvpCounts, RsvpSummary};
use crate::store::{MemberFilter, Store};
use crate::time_window::{TimeRange, reminder_window};

/// Result of a scheduled job: either it ran, or there was nothing to do.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TaskOutcome<T> {
    Done(T),
    Skipped {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        event: Option<Box<Event>>,
    },
}

impl<T> TaskOutcome<T> {
    fn not_found() -> Self {
        TaskOutcome::Skipped {
            message: "not found".into(),
            event: None,
        }
    }

    fn skipped(event: Event) -> Self {
        TaskOutcome::Skipped {
            message: format!("should skip reminders: {}", event.title),
            event: Some(Box::new(event)),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TaskOutcome::Skipped { .. })
    }

    pub fn done(self) -> Option<T> {
        match self {
            TaskOutcome::Done(value) => Some(value),
            TaskOutcome::Skipped { .. } => None,
        }
    }
}

/// A member's answer as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RsvpAnswer {
    #[serde(rename = "type")]
    pub kind: ParticipationType,
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutcome {
    pub event: Event,
    /// Set when the change was announced as a last-minute change.
    pub announced: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRequest {
    pub event: Event,
    pub posted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnreportedOutcome {
    pub offset_hours: i64,
    pub event: Event,
    pub scan: UnreportedScan,
}

#[derive(Debug, Clone, Serialize)]
pub struct RsvpCheck {
    pub event: Event,
    pub summary: RsvpCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RsvpCheckOutcome {
    /// Dry run: the full partition, nothing posted.
    Dry(RsvpSummary),
    Posted(RsvpCheck),
}

#[derive(Debug, Clone, Serialize)]
pub struct ConditioningCheck {
    pub channel: String,
    pub position: String,
    pub label: String,
    pub event: Event,
    pub posted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalCall {
    pub roles: Vec<String>,
    pub channel: String,
    pub event: Event,
    pub report: FinalCallReport,
}

pub struct Hub {
    store: Arc<dyn Store>,
    chat: Arc<dyn ChatClient>,
    config: HubConfig,
    timezone: Tz,
    policy: RsvpChangePolicy,
    messages: MessageContext,
    members: MemberCache,
    role_patterns: RolePatternCache,
}

impl Hub {
    pub fn new(
        config: HubConfig,
        store: Arc<dyn Store>,
        chat: Arc<dyn ChatClient>,
    ) -> HubResult<Self> {
        Ok(Hub {
            timezone: config.timezone()?,
            policy: config.rsvp_policy(),
            messages: config.message_context()?,
            members: MemberCache::new(config.member_cache_ttl()),
            role_patterns: RolePatternCache::new(),
            store,
            chat,
            config,
        })
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    // Events

    pub fn get_event(&self, id: &str) -> HubResult<Event> {
        self.store
            .get_event(id)?
            .ok_or_else(|| HubError::EventNotFound(id.to_string()))
    }

    /// Without bounds: every event starting after `now`, earliest first.
    ///
    /// With bounds: events in `[from, to)`, latest first. One missing
    /// bound is filled in 24 hours from the other.
    pub fn list_events(
        &self,
        now: DateTime<Utc>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> HubResult<Vec<Event>> {
        let window = Duration::hours(DEFAULT_EVENT_WINDOW_HOURS);
        let out_of_range = || HubError::InvalidTimeRange("window is out of range".into());
        let range = match (from, to) {
            (None, None) => return self.store.upcoming_events(now),
            (Some(from), None) => {
                let to = from.checked_add_signed(window).ok_or_else(out_of_range)?;
                TimeRange::new(from, to)?
            }
            (None, Some(to)) => {
                let from = to.checked_sub_signed(window).ok_or_else(out_of_range)?;
                TimeRange::new(from, to)?
            }
            (Some(from), Some(to)) => TimeRange::new(from, to)?,
        };
        self.store.query_events(&range)
    }

    /// Calendar sync: create or replace, keeping answers already recorded.
    pub fn sync_event(&self, mut event: Event) -> HubResult<Event> {
        if let Some(existing) = self.store.get_event(&event.id)?
            && event.participations_json.trim().is_empty()
        {
            event.participations_json = existing.participations_json;
        }
        event.participations()?;
        self.store.put_event(event.clone())?;
        info!(event = %event.id, tag = %event.tag(), "event synced");
        Ok(event)
    }

    pub fn delete_event(&self, id: &str) -> HubResult<()> {
        self.store.delete_event(id)
    }

    /// Record `member_id`'s answer and announce it when it is a
    /// last-minute change.
    pub fn answer_event(
        &self,
        event_id: &str,
        member_id: &str,
        answer: RsvpAnswer,
        now: DateTime<Utc>,
    ) -> HubResult<AnswerOutcome> {
        let member = self.members.get(self.store.as_ref(), member_id)?;

        let mut previous = None;
        let event = self.store.update_event(event_id, &mut |event: &mut Event| {
            let participations = event.participations()?;
            previous = participations.get(member_id).map(|p| p.kind);
            let entry = Participation {
                kind: answer.kind,
                params: answer.params.clone(),
                name: member.display_name.clone(),
                picture: member.picture_url.clone(),
                title: member.role_title.clone(),
            };
            event.set_participations(&upsert(participations, member_id, entry))
        })?;

        let announce = previous.is_some_and(|prev| {
            self.policy
                .should_notify(event.tag(), event.start_time, now, prev, answer.kind)
        });
        if let (true, Some(prev)) = (announce, previous) {
            let msg = messages::last_minute_rsvp_change(
                &self.messages,
                &member,
                &event,
                prev,
                answer.kind,
            );
            post_best_effort(self.chat.as_ref(), &self.config.rsvp_change_channel, &msg);
        }

        Ok(AnswerOutcome {
            event,
            announced: announce,
        })
    }

    // Equipment

    pub fn get_equipment(&self, id: i64) -> HubResult<TrackedEquipment> {
        let equipment = self
            .store
            .get_equipment(id)?
            .ok_or(HubError::EquipmentNotFound(id))?;
        let history = self.store.query_custody_records(id, None)?;
        Ok(TrackedEquipment::new(equipment, history))
    }

    /// Every item with its latest custody record.
    pub fn list_equipment(&self) -> HubResult<Vec<TrackedEquipment>> {
        let equipment = self.store.query_equipment()?;
        Ok(track_all(self.store.as_ref(), equipment, Some(1)))
    }

    /// One hand-off covering several items at once. Every id must exist;
    /// nothing is recorded otherwise.
    pub fn report_custody(
        &self,
        equipment_ids: &[i64],
        member_id: &str,
        timestamp: DateTime<Utc>,
        comment: &str,
    ) -> HubResult<Vec<CustodyRecord>> {
        for id in equipment_ids {
            if self.store.get_equipment(*id)?.is_none() {
                return Err(HubError::EquipmentNotFound(*id));
            }
        }
        equipment_ids
            .iter()
            .map(|id| {
                self.store
                    .append_custody(record_custody(*id, member_id, timestamp, comment))
            })
            .collect()
    }

    pub fn revoke_custody(&self, equipment_id: i64, record_id: i64) -> HubResult<CustodyRecord> {
        let record = self.store.revoke_custody(equipment_id, record_id)?;
        info!(equipment = equipment_id, record = record_id, "custody record revoked");
        Ok(record)
    }

    // Members

    /// Direct lookup, deleted members included.
    pub fn get_member(&self, id: &str) -> HubResult<Member> {
        self.store
            .get_member(id)?
            .ok_or_else(|| HubError::MemberNotFound(id.to_string()))
    }

    pub fn list_members(&self, filter: &MemberFilter) -> HubResult<Vec<Member>> {
        self.store.query_members(filter)
    }

    /// Directory sync: overlay the profile on the stored member and drop
    /// the cached snapshot. Status and number survive the sync.
    pub fn sync_member(&self, profile: MemberProfile) -> HubResult<Member> {
        let mut merge =
            |existing: Option<&Member>| -> HubResult<Member> { Ok(profile.merge_into(existing)) };
        let member = self.store.upsert_member(&profile.id, &mut merge)?;
        self.members.invalidate();
        Ok(member)
    }

    /// Change team-owned fields of a known member.
    pub fn update_member_props(&self, id: &str, props: MemberProps) -> HubResult<Member> {
        let member = self.store.upsert_member(id, &mut |existing: Option<&Member>| {
            let mut member = existing
                .cloned()
                .ok_or_else(|| HubError::MemberNotFound(id.to_string()))?;
            props.apply(&mut member);
            Ok(member)
        })?;
        self.members.invalidate();
        info!(member = %id, status = ?member.status, "member props updated");
        Ok(member)
    }

    // Scheduled jobs

    /// The day before: ask holders of needed equipment to bring it.
    pub fn remind_bring(&self, now: DateTime<Utc>) -> HubResult<TaskOutcome<EquipmentAllocation>> {
        let Some(event) = self.upcoming_event(now)? else {
            return Ok(TaskOutcome::not_found());
        };
        if should_skip_reminders(event.tag(), ReminderKind::Equipment) {
            return Ok(TaskOutcome::skipped(event));
        }

        let participations = event.participations()?;
        let alloc = plan(&event, &self.list_equipment()?, &participations);
        if alloc.is_empty() {
            info!(event = %event.id, "no equipment to bring");
        } else {
            let msg = messages::equipment_bring_reminder(&alloc);
            post_best_effort(self.chat.as_ref(), &self.config.default_channel, &msg);
        }
        Ok(TaskOutcome::Done(alloc))
    }

    /// After an event that started in today's `from`..`to` window: ask
    /// whoever took equipment home to report it.
    pub fn remind_report(
        &self,
        now: DateTime<Utc>,
        from: &str,
        to: &str,
    ) -> HubResult<TaskOutcome<ReportRequest>> {
        let range = reminder_window(now, from, to, self.timezone)?;
        let Some(event) = self.store.query_events(&range)?.into_iter().next() else {
            return Ok(TaskOutcome::not_found());
        };
        if should_skip_reminders(event.tag(), ReminderKind::Equipment) {
            return Ok(TaskOutcome::skipped(event));
        }

        let msg = messages::equipment_report_request(&self.messages, &event);
        let posted =
            post_best_effort(self.chat.as_ref(), &self.config.default_channel, &msg).is_some();
        Ok(TaskOutcome::Done(ReportRequest { event, posted }))
    }

    /// Equipment without a report since the latest event that started at
    /// least `offset_hours` ago. The offset must be non-negative.
    pub fn scan_unreported(
        &self,
        now: DateTime<Utc>,
        offset_hours: i64,
        channel: Option<&str>,
    ) -> HubResult<TaskOutcome<UnreportedOutcome>> {
        let cutoff = (offset_hours >= 0)
            .then_some(offset_hours)
            .and_then(Duration::try_hours)
            .and_then(|offset| now.checked_sub_signed(offset))
            .ok_or_else(|| {
                HubError::InvalidTimeRange(format!("offset out of range: {offset_hours}h"))
            })?;
        let range = TimeRange::until(cutoff);
        let Some(event) = self.store.query_events(&range)?.into_iter().next() else {
            return Ok(TaskOutcome::not_found());
        };

        let scan = UnreportedScan::collect(&self.list_equipment()?, event.end_time);
        if scan.is_empty() {
            info!(event = %event.id, "all equipment reported");
        } else {
            warn!(
                event = %event.id,
                never_reported = scan.never_reported.len(),
                unreported = scan.unreported.len(),
                "equipment without custody report"
            );
            let msg = messages::unreported_scan(&self.messages, &event, &scan);
            post_best_effort(self.chat.as_ref(), self.channel(channel), &msg);
        }
        Ok(TaskOutcome::Done(UnreportedOutcome {
            offset_hours,
            event,
            scan,
        }))
    }

    /// Before or after an event that starts in today's `from`..`to`
    /// window: ask one position group to fill in the conditioning sheet.
    pub fn remind_conditioning(
        &self,
        now: DateTime<Utc>,
        from: &str,
        to: &str,
        channel: &str,
        position: &str,
        label: &str,
    ) -> HubResult<TaskOutcome<ConditioningCheck>> {
        for (name, value) in [("channel", channel), ("position", position), ("label", label)] {
            if value.trim().is_empty() {
                return Err(HubError::MissingParameter(name));
            }
        }
        let range = reminder_window(now, from, to, self.timezone)?;
        let Some(event) = self.store.query_events(&range)?.into_iter().next() else {
            return Ok(TaskOutcome::not_found());
        };
        if should_skip_reminders(event.tag(), ReminderKind::Conditioning) {
            return Ok(TaskOutcome::skipped(event));
        }

        let msg = messages::conditioning_check(&self.messages, &event, label, position)?;
        let posted = post_best_effort(self.chat.as_ref(), channel, &msg).is_some();
        Ok(TaskOutcome::Done(ConditioningCheck {
            channel: channel.to_string(),
            position: position.to_string(),
            label: label.to_string(),
            event,
            posted,
        }))
    }

    /// Inventory-wide custody health.
    pub fn custody_summary(&self, now: DateTime<Utc>) -> HubResult<CustodySummary> {
        let since = now - self.config.stale_custody_window();
        let summary = CustodySummary::collect(&self.list_equipment()?, since);
        for item in &summary.unmanaged {
            warn!(equipment = item.id, name = %item.name, "nobody manages this equipment");
        }
        let msg = messages::custody_summary(&self.messages, &summary);
        post_best_effort(self.chat.as_ref(), &self.config.default_channel, &msg);
        Ok(summary)
    }

    /// Answer counts for the next event, plus a threaded nudge to those
    /// who have not answered.
    pub fn check_rsvp(
        &self,
        now: DateTime<Utc>,
        channel: Option<&str>,
        dry: bool,
    ) -> HubResult<TaskOutcome<RsvpCheckOutcome>> {
        let Some(event) = self.store.next_event(now)? else {
            return Ok(TaskOutcome::not_found());
        };
        if should_skip_reminders(event.tag(), ReminderKind::Rsvp) {
            return Ok(TaskOutcome::skipped(event));
        }

        let participations = event.participations()?;
        let members = self.store.query_members(&MemberFilter::default())?;
        let summary = RsvpSummary::collect(&participations, &members);
        if dry {
            return Ok(TaskOutcome::Done(RsvpCheckOutcome::Dry(summary)));
        }

        let channel = self.channel(channel);
        let counts = summary.counts();
        let headline = messages::rsvp_check(&self.messages, &event, counts);
        let timestamp = post_best_effort(self.chat.as_ref(), channel, &headline);
        if let Some(ts) = &timestamp
            && counts.unanswered > 0
        {
            let reminder = messages::rsvp_reminder(&self.messages, &event, &summary).in_thread(ts);
            post_best_effort(self.chat.as_ref(), channel, &reminder);
        }

        Ok(TaskOutcome::Done(RsvpCheckOutcome::Posted(RsvpCheck {
            event,
            summary: counts,
            timestamp,
        })))
    }

    /// Roll-call by role for the next event within a day.
    pub fn final_call(
        &self,
        now: DateTime<Utc>,
        roles: &[String],
        channel: Option<&str>,
    ) -> HubResult<TaskOutcome<FinalCall>> {
        let Some(event) = self.upcoming_event(now)? else {
            return Ok(TaskOutcome::not_found());
        };
        if should_skip_reminders(event.tag(), ReminderKind::FinalCall) {
            return Ok(TaskOutcome::skipped(event));
        }

        let participations = event.participations()?;
        let members = self.store.query_members(&MemberFilter::default())?;
        let report = aggregate(&participations, &members, roles, &self.role_patterns)?;

        let channel = self.channel(channel).to_string();
        let msg = messages::final_call(&self.messages, &event, roles, &report);
        post_best_effort(self.chat.as_ref(), &channel, &msg);

        Ok(TaskOutcome::Done(FinalCall {
            roles: roles.to_vec(),
            channel,
            event,
            report,
        }))
    }

    /// The earliest event starting within the next day.
    fn upcoming_event(&self, now: DateTime<Utc>) -> HubResult<Option<Event>> {
        let horizon = TimeRange::starting(now);
        Ok(self
            .store
            .next_event(now)?
            .filter(|e| horizon.contains(e.start_time)))
    }

    fn channel<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(&self.config.default_channel)
    }
}
