//! RSVP change alarms and the periodic answer summary.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::constants::DEFAULT_LAST_MINUTE_THRESHOLD_HOURS;
use crate::event::EventTag;
use crate::member::Member;
use crate::participation::{ParticipationType, Participations};

/// Decides whether a changed answer is a last-minute change worth announcing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RsvpChangePolicy {
    /// Changes at or under this distance from the event start are disruptive.
    pub threshold: Duration,
}

impl Default for RsvpChangePolicy {
    fn default() -> Self {
        RsvpChangePolicy {
            threshold: Duration::hours(DEFAULT_LAST_MINUTE_THRESHOLD_HOURS),
        }
    }
}

impl RsvpChangePolicy {
    pub fn new(threshold: Duration) -> Self {
        RsvpChangePolicy { threshold }
    }

    /// - no-op changes are silent
    /// - games alarm only when a player drops out, however early
    /// - ignored events and meetings never alarm
    /// - everything else alarms within the threshold
    pub fn should_notify(
        &self,
        tag: EventTag,
        event_start: DateTime<Utc>,
        now: DateTime<Utc>,
        prev: ParticipationType,
        next: ParticipationType,
    ) -> bool {
        if prev == next {
            return false;
        }
        match tag {
            EventTag::Game => next == ParticipationType::Absent,
            EventTag::Ignore | EventTag::Meeting => false,
            EventTag::Practice | EventTag::Event | EventTag::Unknown => {
                event_start - now <= self.threshold
            }
        }
    }
}

/// Who has answered the next event, over the members expected to answer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RsvpSummary {
    pub join: Vec<Member>,
    pub absent: Vec<Member>,
    pub unanswered: Vec<Member>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RsvpCounts {
    pub join: usize,
    pub absent: usize,
    pub unanswered: usize,
}

impl RsvpSummary {
    pub fn collect(participations: &Participations, members: &[Member]) -> Self {
        let mut summary = RsvpSummary::default();
        for member in members.iter().filter(|m| m.is_expected_to_rsvp()) {
            match participations.get(&member.id).map(|p| p.kind) {
                Some(ParticipationType::Absent) => summary.absent.push(member.clone()),
                Some(kind) if kind.join_anyhow() => summary.join.push(member.clone()),
                _ => summary.unanswered.push(member.clone()),
            }
        }
        summary
    }

    pub fn counts(&self) -> RsvpCounts {
        RsvpCounts {
            join: self.join.len(),
            absent: self.absent.len(),
            unanswered: self.unanswered.len(),
        }
    }

    /// Unanswered members that can actually be pinged.
    pub fn mentionable_unanswered(&self) -> impl Iterator<Item = &Member> {
        self.unanswered.iter().filter(|m| m.is_mentionable())
    }
}
