//! Event participation and equipment custody rules for the team hub.
//!
//! - `event` classifies events from their titles
//! - `participation` and `rsvp` keep attendance answers and decide which
//!   changes are announced
//! - `custody` and `allocation` track who holds what and who has to bring it
//! - `final_call` builds roll-calls by role
//! - `hub` wires all of it to a [`Store`] and a [`ChatClient`]

pub mod allocation;
pub mod chat;
pub mod config;
pub mod constants;
pub mod custody;
pub mod equipment;
pub mod error;
pub mod event;
pub mod final_call;
pub mod hub;
pub mod logging;
pub mod member;
pub mod messages;
pub mod participation;
pub mod rsvp;
pub mod store;
pub mod time_window;

pub use allocation::EquipmentAllocation;
pub use chat::{Block, Button, ChatClient, ChatMessage, LogChat, SlackClient, Text};
pub use config::HubConfig;
pub use custody::{CustodyRecord, CustodySummary, TrackedEquipment, UnreportedScan};
pub use equipment::{Equipment, ExceptionList};
pub use error::{HubError, HubResult};
pub use event::{Event, EventTag, ReminderKind, should_skip_reminders};
pub use final_call::FinalCallReport;
pub use hub::{Hub, RsvpAnswer, TaskOutcome};
pub use member::{Member, MemberCache, MemberProfile, MemberProps, MemberStatus, RolePatternCache};
pub use participation::{Participation, ParticipationType, Participations};
pub use rsvp::{RsvpChangePolicy, RsvpSummary};
pub use store::{MemberFilter, MemoryStore, Store};
pub use time_window::TimeRange;
