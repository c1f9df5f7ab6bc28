use chrono::{DateTime, Duration, Utc};

use crate::error::DateUnparseable;
use crate::model::Task;
use crate::tasks::due::parse_due;

/// Hours ahead of now that still count as "due soon" (inclusive).
pub const DUE_SOON_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrgencyState {
    Completed,
    Overdue,
    DueSoon,
    Normal,
    /// Incomplete task whose due date could not be parsed.
    Unknown,
}

impl UrgencyState {
    /// Badge text; `Normal` has none.
    pub fn badge(self) -> Option<&'static str> {
        match self {
            UrgencyState::Completed => Some("Completed"),
            UrgencyState::Overdue   => Some("Overdue"),
            UrgencyState::DueSoon   => Some("Due Soon"),
            UrgencyState::Unknown   => Some("Date Error"),
            UrgencyState::Normal    => None,
        }
    }
}

/// One task's urgency at one instant, with the parsed due date kept for
/// sorting and display.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified<'a> {
    pub task:  &'a Task,
    pub due:   Result<DateTime<Utc>, DateUnparseable>,
    pub state: UrgencyState,
}

impl<'a> Classified<'a> {
    pub fn new(task: &'a Task, now: DateTime<Utc>) -> Self {
        let due = parse_due(task);
        let state = match (&due, task.completed) {
            (_, true)       => UrgencyState::Completed,
            (Err(_), false) => UrgencyState::Unknown,
            (Ok(d), false)  => classify_due(*d, now),
        };
        Self { task, due, state }
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> { self.due.as_ref().ok().copied() }

    /// Sort key for the due-date order: unparseable dates sit at the epoch.
    pub fn sort_instant(&self) -> DateTime<Utc> { self.due_date().unwrap_or_default() }

    pub fn hours_until_due(&self, now: DateTime<Utc>) -> Option<f64> {
        self.due_date().map(|d| (d - now).num_milliseconds() as f64 / 3_600_000.0)
    }
}

/// Date-based state of an incomplete task due at `due`.
///
/// `due < now` is overdue; `now <= due <= now + 24h` is due soon, both ends
/// inclusive to the millisecond.
pub fn classify_due(due: DateTime<Utc>, now: DateTime<Utc>) -> UrgencyState {
    let until = due - now;
    if until < Duration::zero() {
        UrgencyState::Overdue
    } else if until <= Duration::hours(DUE_SOON_HOURS) {
        UrgencyState::DueSoon
    } else {
        UrgencyState::Normal
    }
}

pub fn classify(task: &Task, now: DateTime<Utc>) -> UrgencyState {
    Classified::new(task, now).state
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap() }

    fn due_in(d: Duration) -> Task {
        Task::new(1, "t").with_due((now() + d).to_rfc3339())
    }

    #[test]
    fn completed_wins_over_any_date() {
        for task in [
            due_in(Duration::hours(-48)),
            due_in(Duration::hours(2)),
            Task::new(2, "no date"),
            Task::new(3, "garbage").with_due("whenever"),
        ] {
            assert_eq!(classify(&task.with_completed(true), now()), UrgencyState::Completed);
        }
    }

    #[test]
    fn past_due_is_overdue() {
        assert_eq!(classify(&due_in(Duration::milliseconds(-1)), now()), UrgencyState::Overdue);
        assert_eq!(classify(&due_in(Duration::days(-3)), now()), UrgencyState::Overdue);
    }

    #[test]
    fn boundaries_are_due_soon() {
        assert_eq!(classify(&due_in(Duration::zero()), now()), UrgencyState::DueSoon);
        assert_eq!(classify(&due_in(Duration::hours(24)), now()), UrgencyState::DueSoon);
        assert_eq!(
            classify(&due_in(Duration::hours(24) + Duration::milliseconds(1)), now()),
            UrgencyState::Normal
        );
    }

    #[test]
    fn unparseable_is_unknown() {
        assert_eq!(classify(&Task::new(1, "t"), now()), UrgencyState::Unknown);
        assert_eq!(classify(&Task::new(1, "t").with_due("soonish"), now()), UrgencyState::Unknown);
    }

    #[test]
    fn hours_until_due_is_fractional() {
        let task = due_in(Duration::minutes(90));
        let c = Classified::new(&task, now());
        assert_eq!(c.hours_until_due(now()), Some(1.5));
    }

    #[test]
    fn unparseable_sorts_at_epoch() {
        let task = Task::new(1, "t");
        assert_eq!(Classified::new(&task, now()).sort_instant().timestamp(), 0);
    }
}
