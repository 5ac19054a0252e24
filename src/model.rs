//! Record model for weekly entries
//!
//! A weekly entry is identified by its ISO week (`WeekId`) and carries a short
//! status tag plus two free-form text fields. Writes go through
//! `SaveEntryInput`, which has create-or-update merge semantics: each storage
//! layer resolves unset fields against its own current copy of the record.

use crate::error::{WeeklogError, WeeklogResult};
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest valid ISO week number
pub const MIN_WEEK: u8 = 1;

/// Highest valid ISO week number (only years starting on Thursday, or on
/// Wednesday in a leap year, actually have one)
pub const MAX_WEEK: u8 = 53;

/// Number of ISO weeks in the given ISO week-numbering year (52 or 53)
pub fn iso_weeks_in_year(year: i32) -> u8 {
    if NaiveDate::from_isoywd_opt(year, 53, Weekday::Mon).is_some() {
        53
    } else {
        52
    }
}

/// Composite key of a weekly entry
///
/// `year` is the ISO week-numbering year, which can differ from the calendar
/// year around January 1st. Ordering is year-major, week-minor; range queries
/// rely on this.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct WeekId {
    pub year: i32,
    pub week: u8,
}

impl WeekId {
    /// Create a key, rejecting week numbers outside 1..=53
    pub fn new(year: i32, week: u8) -> WeeklogResult<Self> {
        let id = Self { year, week };
        id.validate()?;
        Ok(id)
    }

    /// The ISO week containing today
    pub fn current() -> Self {
        let iso = Utc::now().date_naive().iso_week();
        Self {
            year: iso.year(),
            week: iso.week() as u8,
        }
    }

    /// Re-check the week range. Layers call this at their boundary before
    /// touching persistence, so a malformed key can never reach a backend.
    pub fn validate(&self) -> WeeklogResult<()> {
        if self.week < MIN_WEEK || self.week > MAX_WEEK {
            return Err(WeeklogError::InvalidWeek {
                year: self.year,
                week: self.week,
            });
        }
        Ok(())
    }

    /// First key of a year
    pub fn first_of_year(year: i32) -> Self {
        Self {
            year,
            week: MIN_WEEK,
        }
    }

    /// Last possible key of a year (week 53 even for 52-week years, so range
    /// queries built from it tolerate both year lengths)
    pub fn last_of_year(year: i32) -> Self {
        Self {
            year,
            week: MAX_WEEK,
        }
    }
}

impl fmt::Display for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

/// Fixed set of status tags a week can carry
///
/// Unknown strings decode to the `Unknown` sentinel instead of failing, so a
/// record written by a newer version still loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum StatusIcon {
    Great,
    Good,
    Neutral,
    Tough,
    Bad,
    #[default]
    Unknown,
}

impl StatusIcon {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusIcon::Great => "😀",
            StatusIcon::Good => "🙂",
            StatusIcon::Neutral => "😐",
            StatusIcon::Tough => "😕",
            StatusIcon::Bad => "😞",
            StatusIcon::Unknown => "❔",
        }
    }
}

impl From<&str> for StatusIcon {
    fn from(s: &str) -> Self {
        match s {
            "😀" => StatusIcon::Great,
            "🙂" => StatusIcon::Good,
            "😐" => StatusIcon::Neutral,
            "😕" => StatusIcon::Tough,
            "😞" => StatusIcon::Bad,
            _ => StatusIcon::Unknown,
        }
    }
}

impl From<String> for StatusIcon {
    fn from(s: String) -> Self {
        StatusIcon::from(s.as_str())
    }
}

impl From<StatusIcon> for String {
    fn from(icon: StatusIcon) -> Self {
        icon.as_str().to_string()
    }
}

impl fmt::Display for StatusIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted weekly entry
///
/// Identity is entirely determined by `week_id`; no two records in one layer
/// may share a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyEntry {
    pub week_id: WeekId,
    pub status_icon: StatusIcon,
    pub achievements: String,
    pub challenges: String,
}

impl WeeklyEntry {
    /// A record with documented defaults for every payload field
    pub fn empty(week_id: WeekId) -> Self {
        Self {
            week_id,
            status_icon: StatusIcon::Unknown,
            achievements: String::new(),
            challenges: String::new(),
        }
    }
}

/// Write-side DTO with partial-update semantics
///
/// Unset fields are taken from the record currently stored in the layer the
/// save lands on, or from defaults when the record does not exist yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEntryInput {
    pub week_id: WeekId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_icon: Option<StatusIcon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievements: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenges: Option<String>,
}

impl SaveEntryInput {
    /// An input that sets no payload fields
    pub fn new(week_id: WeekId) -> Self {
        Self {
            week_id,
            status_icon: None,
            achievements: None,
            challenges: None,
        }
    }

    pub fn status_icon(mut self, icon: StatusIcon) -> Self {
        self.status_icon = Some(icon);
        self
    }

    pub fn achievements(mut self, text: impl Into<String>) -> Self {
        self.achievements = Some(text.into());
        self
    }

    pub fn challenges(mut self, text: impl Into<String>) -> Self {
        self.challenges = Some(text.into());
        self
    }

    /// Resolve this input against the layer's current copy of the record.
    ///
    /// Each layer runs this independently against its own state; layers that
    /// receive the same input at different times may diverge until sync
    /// reconciles them.
    pub fn merge_into(&self, existing: Option<&WeeklyEntry>) -> WeeklyEntry {
        match existing {
            Some(current) => WeeklyEntry {
                week_id: self.week_id,
                status_icon: self.status_icon.unwrap_or(current.status_icon),
                achievements: self
                    .achievements
                    .clone()
                    .unwrap_or_else(|| current.achievements.clone()),
                challenges: self
                    .challenges
                    .clone()
                    .unwrap_or_else(|| current.challenges.clone()),
            },
            None => WeeklyEntry {
                week_id: self.week_id,
                status_icon: self.status_icon.unwrap_or_default(),
                achievements: self.achievements.clone().unwrap_or_default(),
                challenges: self.challenges.clone().unwrap_or_default(),
            },
        }
    }
}

impl From<WeeklyEntry> for SaveEntryInput {
    /// A fully-specified input; merging it anywhere reproduces `entry` exactly.
    /// Fan-out uses this so secondary layers land on the resolved values.
    fn from(entry: WeeklyEntry) -> Self {
        Self {
            week_id: entry.week_id,
            status_icon: Some(entry.status_icon),
            achievements: Some(entry.achievements),
            challenges: Some(entry.challenges),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_week_id_ordering_is_year_major() {
        let a = WeekId { year: 2023, week: 52 };
        let b = WeekId { year: 2024, week: 1 };
        let c = WeekId { year: 2024, week: 15 };
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_week_id_rejects_out_of_range_weeks() {
        assert!(WeekId::new(2024, 0).is_err());
        assert!(WeekId::new(2024, 54).is_err());
        assert!(WeekId::new(2024, 1).is_ok());
        assert!(WeekId::new(2024, 53).is_ok());
    }

    #[test]
    fn test_iso_weeks_in_year() {
        // 2015 and 2020 start on Thursday / leap-Wednesday
        assert_eq!(iso_weeks_in_year(2015), 53);
        assert_eq!(iso_weeks_in_year(2020), 53);
        assert_eq!(iso_weeks_in_year(2023), 52);
        assert_eq!(iso_weeks_in_year(2024), 52);
    }

    #[test]
    fn test_merge_create_uses_defaults() {
        let id = WeekId::new(2024, 15).unwrap();
        let input = SaveEntryInput::new(id).achievements("A");
        let entry = input.merge_into(None);
        assert_eq!(entry.status_icon, StatusIcon::Unknown);
        assert_eq!(entry.achievements, "A");
        assert_eq!(entry.challenges, "");
    }

    #[test]
    fn test_merge_update_preserves_unset_fields() {
        let id = WeekId::new(2024, 15).unwrap();
        let created = SaveEntryInput::new(id)
            .status_icon(StatusIcon::Good)
            .achievements("A")
            .merge_into(None);
        let updated = SaveEntryInput::new(id)
            .challenges("C")
            .merge_into(Some(&created));
        assert_eq!(updated.status_icon, StatusIcon::Good);
        assert_eq!(updated.achievements, "A");
        assert_eq!(updated.challenges, "C");
    }

    #[test]
    fn test_status_icon_unknown_fallback() {
        let icon: StatusIcon = serde_json::from_str("\"🚀\"").unwrap();
        assert_eq!(icon, StatusIcon::Unknown);
        let icon: StatusIcon = serde_json::from_str("\"🙂\"").unwrap();
        assert_eq!(icon, StatusIcon::Good);
    }

    #[test]
    fn test_entry_serde_round_trip() {
        let entry = WeeklyEntry {
            week_id: WeekId { year: 2024, week: 15 },
            status_icon: StatusIcon::Good,
            achievements: "shipped".to_string(),
            challenges: "scope".to_string(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"weekId\""));
        assert!(json.contains("\"statusIcon\""));
        let back: WeeklyEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_full_input_round_trips_entry() {
        let entry = WeeklyEntry {
            week_id: WeekId { year: 2024, week: 2 },
            status_icon: StatusIcon::Bad,
            achievements: "a".to_string(),
            challenges: "c".to_string(),
        };
        let input = SaveEntryInput::from(entry.clone());
        assert_eq!(input.merge_into(None), entry);
    }
}
