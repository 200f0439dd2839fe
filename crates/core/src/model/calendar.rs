use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{EventId, UserId};
use crate::model::user::Role;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CalendarError {
    #[error("event title cannot be empty")]
    EmptyTitle,

    #[error("event end must not be before its start")]
    EndBeforeStart,

    #[error("recurrence end date must not be before the event start")]
    RecurrenceEndBeforeStart,

    #[error("a recurrence end date requires a recurrence")]
    RecurrenceEndWithoutRecurrence,

    #[error("query range end must not be before its start")]
    InvalidRange,

    #[error("unknown {kind}: {value}")]
    UnknownEnum { kind: &'static str, value: String },
}

//
// ─── RECURRENCE ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Recurrence {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Recurrence::None => "NONE",
            Recurrence::Daily => "DAILY",
            Recurrence::Weekly => "WEEKLY",
            Recurrence::Monthly => "MONTHLY",
            Recurrence::Yearly => "YEARLY",
        }
    }

    /// # Errors
    ///
    /// Returns `CalendarError::UnknownEnum` for unrecognized values.
    pub fn parse(s: &str) -> Result<Self, CalendarError> {
        match s {
            "NONE" => Ok(Recurrence::None),
            "DAILY" => Ok(Recurrence::Daily),
            "WEEKLY" => Ok(Recurrence::Weekly),
            "MONTHLY" => Ok(Recurrence::Monthly),
            "YEARLY" => Ok(Recurrence::Yearly),
            other => Err(CalendarError::UnknownEnum {
                kind: "recurrence",
                value: other.to_owned(),
            }),
        }
    }

    #[must_use]
    pub fn is_recurring(self) -> bool {
        self != Recurrence::None
    }
}

//
// ─── AUDIENCE ──────────────────────────────────────────────────────────────────
//

/// Who sees an event or announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Audience {
    #[default]
    All,
    Administrators,
    Instructors,
    Students,
}

impl Audience {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Audience::All => "ALL",
            Audience::Administrators => "ADMINISTRATORS",
            Audience::Instructors => "INSTRUCTORS",
            Audience::Students => "STUDENTS",
        }
    }

    /// # Errors
    ///
    /// Returns `CalendarError::UnknownEnum` for unrecognized values.
    pub fn parse(s: &str) -> Result<Self, CalendarError> {
        match s {
            "ALL" => Ok(Audience::All),
            "ADMINISTRATORS" => Ok(Audience::Administrators),
            "INSTRUCTORS" => Ok(Audience::Instructors),
            "STUDENTS" => Ok(Audience::Students),
            other => Err(CalendarError::UnknownEnum {
                kind: "audience",
                value: other.to_owned(),
            }),
        }
    }

    /// Administrators see everything.
    #[must_use]
    pub fn includes(self, role: Role) -> bool {
        match (self, role) {
            (Audience::All, _) | (_, Role::Administrator) => true,
            (Audience::Instructors, Role::Instructor) => true,
            (Audience::Students, Role::Student) => true,
            _ => false,
        }
    }

    /// The single role targeted, or `None` for everyone.
    #[must_use]
    pub fn role(self) -> Option<Role> {
        match self {
            Audience::All => None,
            Audience::Administrators => Some(Role::Administrator),
            Audience::Instructors => Some(Role::Instructor),
            Audience::Students => Some(Role::Student),
        }
    }
}

//
// ─── EVENT ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub id: EventId,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub audience: Audience,
    pub recurrence: Recurrence,
    pub recurrence_end_date: Option<DateTime<Utc>>,
    pub created_by: UserId,
}

/// Input for creating or replacing an event definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    #[serde(default)]
    pub audience: Audience,
    #[serde(default)]
    pub recurrence: Recurrence,
    pub recurrence_end_date: Option<DateTime<Utc>>,
}

impl EventDraft {
    /// # Errors
    ///
    /// Returns `CalendarError` when the title is blank or the dates are inconsistent.
    pub fn validate(mut self) -> Result<Self, CalendarError> {
        self.title = self.title.trim().to_owned();
        if self.title.is_empty() {
            return Err(CalendarError::EmptyTitle);
        }
        if self.end < self.start {
            return Err(CalendarError::EndBeforeStart);
        }
        if let Some(until) = self.recurrence_end_date {
            if !self.recurrence.is_recurring() {
                return Err(CalendarError::RecurrenceEndWithoutRecurrence);
            }
            if until < self.start {
                return Err(CalendarError::RecurrenceEndBeforeStart);
            }
        }
        self.description = self.description.filter(|d| !d.trim().is_empty());
        self.location = self.location.filter(|l| !l.trim().is_empty());
        Ok(self)
    }
}

/// One concrete calendar instance, either a pass-through of a single event
/// or an expansion of a recurring one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    /// Base id for single events, `"{base}-{YYYY-MM-DD}"` for expansions.
    pub id: String,
    pub parent_id: Option<EventId>,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub audience: Audience,
    pub recurrence: Recurrence,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn draft() -> EventDraft {
        EventDraft {
            title: "Town hall".into(),
            description: None,
            location: None,
            start: fixed_now(),
            end: fixed_now() + Duration::hours(1),
            all_day: false,
            audience: Audience::All,
            recurrence: Recurrence::None,
            recurrence_end_date: None,
        }
    }

    #[test]
    fn end_before_start_is_rejected() {
        let mut d = draft();
        d.end = d.start - Duration::minutes(1);
        assert_eq!(d.validate().unwrap_err(), CalendarError::EndBeforeStart);
    }

    #[test]
    fn recurrence_end_needs_recurrence() {
        let mut d = draft();
        d.recurrence_end_date = Some(fixed_now() + Duration::days(30));
        assert_eq!(
            d.validate().unwrap_err(),
            CalendarError::RecurrenceEndWithoutRecurrence
        );
    }

    #[test]
    fn audience_visibility() {
        assert!(Audience::All.includes(Role::Student));
        assert!(Audience::Students.includes(Role::Administrator));
        assert!(!Audience::Instructors.includes(Role::Student));
        assert!(Audience::Instructors.includes(Role::Instructor));
    }
}
