//! Shared team equipment and which events it is needed for.

use serde::{Deserialize, Serialize};

use crate::constants::NEEDS_CHARGE_PREFIXES;
use crate::event::{Event, EventTag};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    /// Store-assigned id; zero until created.
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub for_practice: bool,
    #[serde(default)]
    pub for_game: bool,
    /// Free text. May embed an exception list, see [`ExceptionList`].
    #[serde(default)]
    pub description: String,
}

impl Equipment {
    pub fn new(name: impl Into<String>) -> Self {
        Equipment {
            id: 0,
            name: name.into(),
            for_practice: false,
            for_game: false,
            description: String::new(),
        }
    }

    pub fn for_practice(mut self) -> Self {
        self.for_practice = true;
        self
    }

    pub fn for_game(mut self) -> Self {
        self.for_game = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Used for practices or games at all.
    pub fn is_in_rotation(&self) -> bool {
        self.for_practice || self.for_game
    }

    /// Battery-powered items (cameras etc.) are marked in reminders so
    /// their holder charges them beforehand.
    pub fn needs_charge(&self) -> bool {
        NEEDS_CHARGE_PREFIXES
            .iter()
            .any(|prefix| self.name.starts_with(prefix))
    }

    pub fn exceptions(&self) -> ExceptionList {
        ExceptionList::parse(&self.description)
    }

    /// Whether this item must be brought to an event with the given tag and title.
    pub fn is_eligible_for(&self, tag: EventTag, title: &str) -> bool {
        let by_flag = match tag {
            EventTag::Game => self.for_game,
            EventTag::Practice => self.for_practice,
            _ => false,
        };
        by_flag && !self.exceptions().matches(title)
    }

    pub fn should_bring_for(&self, event: &Event) -> bool {
        self.is_eligible_for(event.tag(), &event.title)
    }
}

/// Title substrings for which an item is not needed.
///
/// Written inside the description as `!(item[,item...])`, e.g.
/// `"Keep dry !(Friday, Lift)"`. Items are trimmed and empty items are
/// dropped. The first list with at least one item wins; `!()` and an
/// unterminated `!(` contribute nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionList(Vec<String>);

impl ExceptionList {
    pub fn parse(description: &str) -> Self {
        let mut rest = description;
        while let Some(open) = rest.find("!(") {
            let body_start = open + 2;
            let Some(close) = rest[body_start..].find(')') else {
                break;
            };
            let body = &rest[body_start..body_start + close];
            let items: Vec<String> = body
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(String::from)
                .collect();
            if !items.is_empty() {
                return ExceptionList(items);
            }
            rest = &rest[body_start + close + 1..];
        }
        ExceptionList::default()
    }

    pub fn items(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, title: &str) -> bool {
        self.0.iter().any(|item| title.contains(item.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exception_list() {
        assert_eq!(ExceptionList::parse("").items(), &[] as &[String]);
        assert_eq!(ExceptionList::parse("plain text").items(), &[] as &[String]);
        assert_eq!(ExceptionList::parse("!(Friday)").items(), &["Friday"]);
        assert_eq!(
            ExceptionList::parse("Bag A !(Friday, Lift ,,) keep dry").items(),
            &["Friday", "Lift"]
        );
        assert_eq!(ExceptionList::parse("!() then !(Sat)").items(), &["Sat"]);
        assert_eq!(ExceptionList::parse("!( , )").items(), &[] as &[String]);
        assert_eq!(ExceptionList::parse("!(Friday").items(), &[] as &[String]);
        assert_eq!(ExceptionList::parse("!(水曜,朝練)").items(), &["水曜", "朝練"]);
    }

    #[test]
    fn test_exception_overrides_practice_flag() {
        let bag = Equipment::new("Ball bag")
            .for_practice()
            .with_description("!(Friday)");
        assert!(!bag.is_eligible_for(EventTag::Practice, "#practice Friday Lift"));
        assert!(bag.is_eligible_for(EventTag::Practice, "#practice Sunday"));
    }

    #[test]
    fn test_eligibility_by_tag() {
        let game_only = Equipment::new("Chains").for_game();
        assert!(game_only.is_eligible_for(EventTag::Game, "#試合"));
        assert!(!game_only.is_eligible_for(EventTag::Practice, "#練習"));

        let both = Equipment::new("Cones").for_practice().for_game();
        assert!(both.is_eligible_for(EventTag::Practice, "#練習"));
        assert!(both.is_eligible_for(EventTag::Game, "#試合"));
        assert!(!both.is_eligible_for(EventTag::Event, "#event BBQ"));
        assert!(!both.is_eligible_for(EventTag::Unknown, "dinner"));

        let neither = Equipment::new("Spare jerseys");
        assert!(!neither.is_eligible_for(EventTag::Practice, "#練習"));
    }

    #[test]
    fn test_exception_applies_to_games() {
        let tent = Equipment::new("Tent")
            .for_game()
            .with_description("!(Home)");
        assert!(!tent.is_eligible_for(EventTag::Game, "#game Home vs Eagles"));
        assert!(tent.is_eligible_for(EventTag::Game, "#game Away at Eagles"));
    }

    #[test]
    fn test_needs_charge() {
        assert!(Equipment::new("ビデオカメラ").needs_charge());
        assert!(Equipment::new("Video camera").needs_charge());
        assert!(!Equipment::new("Cones").needs_charge());
    }
}
