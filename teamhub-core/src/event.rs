//! Calendar events and their title-derived classification.
//!
//! Events are imported from the team calendar. The only thing the hub
//! reads from an event to decide what it is for is its title: a hashtag
//! marker such as `#練習` / `#practice` or `#試合` / `#game`.

use std::fmt;
use std::sync::LazyLock;

use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::HubResult;
use crate::participation::{self, Participations};

/// A calendar event.
///
/// `participations_json` is the encoded [`Participations`] blob stored
/// alongside the event record; use [`Event::participations`] to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    /// Start instant, serialized as epoch milliseconds.
    #[serde(with = "ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub end_time: DateTime<Utc>,
    #[serde(default, rename = "participations_json_str")]
    pub participations_json: String,
}

impl Event {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Event {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            location: String::new(),
            start_time,
            end_time,
            participations_json: String::new(),
        }
    }

    /// Derived from the title on every call; never persisted.
    pub fn tag(&self) -> EventTag {
        EventTag::classify(&self.title)
    }

    pub fn participations(&self) -> HubResult<Participations> {
        participation::decode(&self.participations_json)
    }

    pub fn set_participations(&mut self, participations: &Participations) -> HubResult<()> {
        self.participations_json = participation::encode(participations)?;
        Ok(())
    }
}

/// What an event is for, as told by its title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventTag {
    Practice,
    Game,
    Ignore,
    Meeting,
    Event,
    Unknown,
}

static PRACTICE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[#＃](?:練習|practice\b)").expect("valid regex"));
static GAME_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[#＃](?:試合|game\b)").expect("valid regex"));
static IGNORE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[#＃]ignore\b").expect("valid regex"));
static MEETING_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[#＃](?:ミーティング|meeting\b|mtg\b)").expect("valid regex")
});
static EVENT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[#＃](?:イベント|event\b)").expect("valid regex"));

impl EventTag {
    /// Classify a title. Markers are tested in a fixed precedence order
    /// (practice, game, ignore, meeting, event) and the first match wins.
    pub fn classify(title: &str) -> EventTag {
        let markers: [(&Regex, EventTag); 5] = [
            (&PRACTICE_MARKER, EventTag::Practice),
            (&GAME_MARKER, EventTag::Game),
            (&IGNORE_MARKER, EventTag::Ignore),
            (&MEETING_MARKER, EventTag::Meeting),
            (&EVENT_MARKER, EventTag::Event),
        ];

        markers
            .into_iter()
            .find(|(marker, _)| marker.is_match(title))
            .map(|(_, tag)| tag)
            .unwrap_or(EventTag::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventTag::Practice => "practice",
            EventTag::Game => "game",
            EventTag::Ignore => "ignore",
            EventTag::Meeting => "meeting",
            EventTag::Event => "event",
            EventTag::Unknown => "unknown",
        }
    }

    /// Label used in chat messages.
    pub fn label(&self) -> &'static str {
        match self {
            EventTag::Practice => "練習",
            EventTag::Game => "試合",
            EventTag::Meeting => "ミーティング",
            EventTag::Event => "イベント",
            EventTag::Ignore | EventTag::Unknown => "予定",
        }
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kinds of reminder a scheduled job can send for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    Rsvp,
    Equipment,
    Conditioning,
    FinalCall,
}

/// Generic calendar "events" only take part in RSVP collection; ignored
/// events and meetings take part in nothing.
pub fn should_skip_reminders(tag: EventTag, kind: ReminderKind) -> bool {
    match tag {
        EventTag::Ignore | EventTag::Meeting => true,
        EventTag::Event => kind != ReminderKind::Rsvp,
        EventTag::Practice | EventTag::Game | EventTag::Unknown => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_classify_markers() {
        assert_eq!(EventTag::classify("#練習 グラウンド"), EventTag::Practice);
        assert_eq!(EventTag::classify("＃練習 全体"), EventTag::Practice);
        assert_eq!(EventTag::classify("#practice Friday Lift"), EventTag::Practice);
        assert_eq!(EventTag::classify("#試合 vs Eagles"), EventTag::Game);
        assert_eq!(EventTag::classify("#GAME vs Eagles"), EventTag::Game);
        assert_eq!(EventTag::classify("Film session #ignore"), EventTag::Ignore);
        assert_eq!(EventTag::classify("#MTG coaches"), EventTag::Meeting);
        assert_eq!(EventTag::classify("#event BBQ"), EventTag::Event);
        assert_eq!(EventTag::classify("Dinner"), EventTag::Unknown);
    }

    #[test]
    fn test_classify_precedence() {
        assert_eq!(EventTag::classify("#ignore #練習"), EventTag::Practice);
        assert_eq!(EventTag::classify("#event #試合"), EventTag::Game);
        assert_eq!(EventTag::classify("#練習 #試合"), EventTag::Practice);
        assert_eq!(EventTag::classify("#meeting #ignore"), EventTag::Ignore);
    }

    #[test]
    fn test_classify_requires_whole_word() {
        assert_eq!(EventTag::classify("#gameday"), EventTag::Unknown);
        assert_eq!(EventTag::classify("#events"), EventTag::Unknown);
    }

    #[test]
    fn test_should_skip_reminders() {
        assert!(should_skip_reminders(EventTag::Ignore, ReminderKind::Rsvp));
        assert!(should_skip_reminders(EventTag::Meeting, ReminderKind::Rsvp));
        assert!(!should_skip_reminders(EventTag::Event, ReminderKind::Rsvp));
        assert!(should_skip_reminders(EventTag::Event, ReminderKind::Equipment));
        assert!(should_skip_reminders(EventTag::Event, ReminderKind::Conditioning));
        assert!(!should_skip_reminders(EventTag::Practice, ReminderKind::Equipment));
        assert!(!should_skip_reminders(EventTag::Game, ReminderKind::FinalCall));
    }

    #[test]
    fn test_event_json_uses_millis() {
        let start = Utc.with_ymd_and_hms(2025, 3, 20, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap();
        let event = Event::new("ev1", "#練習", start, end);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["start_time"], start.timestamp_millis());
        assert_eq!(json["participations_json_str"], "");

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
