//! View derivation: filter, search, sort, display rows and statistics.
//!
//! Everything here is a pure function of the task slice, an explicit
//! [`ViewQuery`] and one `now` instant. A render pass classifies each task
//! exactly once and derives rows and counts from that single classification,
//! so the list and the counters can never disagree.

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use feruca::Collator;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::model::Task;
use crate::tasks::diagnostics::{Diagnostic, DiagnosticSink, Silent};
use crate::tasks::urgency::{Classified, UrgencyState};

pub const DATE_ERROR: &str = "Date Error";

// ─── Selectors ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskFilter {
    #[default]
    All,
    Pending,
    Completed,
    Overdue,
    DueSoon,
}

impl TaskFilter {
    pub const ALL: [TaskFilter; 5] = [
        TaskFilter::All,
        TaskFilter::Pending,
        TaskFilter::Completed,
        TaskFilter::Overdue,
        TaskFilter::DueSoon,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskFilter::All       => "all",
            TaskFilter::Pending   => "pending",
            TaskFilter::Completed => "completed",
            TaskFilter::Overdue   => "overdue",
            TaskFilter::DueSoon   => "dueSoon",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskFilter::All       => "All",
            TaskFilter::Pending   => "Pending",
            TaskFilter::Completed => "Completed",
            TaskFilter::Overdue   => "Overdue",
            TaskFilter::DueSoon   => "Due Soon",
        }
    }

    /// The date-based filters pass exactly the tasks classified into the
    /// matching urgency state.
    pub fn accepts(self, task: &Task, state: UrgencyState) -> bool {
        match self {
            TaskFilter::All       => true,
            TaskFilter::Pending   => !task.completed,
            TaskFilter::Completed => task.completed,
            TaskFilter::Overdue   => state == UrgencyState::Overdue,
            TaskFilter::DueSoon   => state == UrgencyState::DueSoon,
        }
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for TaskFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskFilter::ALL.into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown filter `{s}` (expected all, pending, completed, overdue or dueSoon)"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    DueDate,
    Priority,
    Title,
}

impl SortKey {
    pub const ALL: [SortKey; 3] = [SortKey::DueDate, SortKey::Priority, SortKey::Title];

    /// dueDate → priority → title → dueDate …
    pub fn next(self) -> Self {
        match self {
            SortKey::DueDate  => SortKey::Priority,
            SortKey::Priority => SortKey::Title,
            SortKey::Title    => SortKey::DueDate,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::DueDate  => "dueDate",
            SortKey::Priority => "priority",
            SortKey::Title    => "title",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortKey::ALL.into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown sort `{s}` (expected dueDate, priority or title)"))
    }
}

/// Everything a view depends on besides the tasks and the clock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewQuery {
    pub filter: TaskFilter,
    pub sort:   SortKey,
    pub search: String,
}

impl ViewQuery {
    pub fn new(filter: TaskFilter, sort: SortKey) -> Self {
        Self { filter, sort, search: String::new() }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    /// Case-insensitive substring match on title or description. Blank search
    /// text matches everything.
    pub fn matches_search(&self, task: &Task) -> bool {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        task.title.to_lowercase().contains(&needle)
            || task.description.as_deref().is_some_and(|d| d.to_lowercase().contains(&needle))
    }
}

// ─── Outputs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub due_soon:  usize,
    pub overdue:   usize,
    pub completed: usize,
    pub total:     usize,
    pub pending:   usize,
    /// Incomplete tasks with no usable due date.
    pub unknown:   usize,
}

impl Statistics {
    fn tally(&mut self, state: UrgencyState) {
        self.total += 1;
        match state {
            UrgencyState::Completed => { self.completed += 1; return; }
            UrgencyState::Overdue   => self.overdue  += 1,
            UrgencyState::DueSoon   => self.due_soon += 1,
            UrgencyState::Unknown   => self.unknown  += 1,
            UrgencyState::Normal    => {}
        }
        self.pending += 1;
    }

    pub fn from_classified(items: &[Classified<'_>]) -> Self {
        items.iter().fold(Statistics::default(), |mut s, c| { s.tally(c.state); s })
    }
}

/// One display row.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow<'a> {
    pub task:               &'a Task,
    pub urgency:            UrgencyState,
    pub due:                Option<DateTime<Utc>>,
    pub formatted_due_date: String,
    pub relative_due_text:  Option<String>,
}

impl<'a> ViewRow<'a> {
    fn new(c: Classified<'a>, now: DateTime<Utc>) -> Self {
        let due = c.due_date();
        Self {
            task:               c.task,
            urgency:            c.state,
            due,
            formatted_due_date: due.map_or_else(|| DATE_ERROR.to_owned(), format_due),
            relative_due_text:  due.map(|d| relative_due_text(d, now)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPass<'a> {
    pub now:   DateTime<Utc>,
    pub rows:  Vec<ViewRow<'a>>,
    pub stats: Statistics,
}

// ─── Engine ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
pub struct ViewEngine<'s> {
    sink: &'s dyn DiagnosticSink,
}

impl ViewEngine<'static> {
    pub fn silent() -> Self { Self { sink: &Silent } }
}

impl Default for ViewEngine<'static> {
    fn default() -> Self { Self::silent() }
}

impl<'s> ViewEngine<'s> {
    pub fn with_sink(sink: &'s dyn DiagnosticSink) -> Self { Self { sink } }

    pub fn classify_all<'a>(&self, tasks: &'a [Task], now: DateTime<Utc>) -> Vec<Classified<'a>> {
        tasks.iter().map(|task| {
            let c = Classified::new(task, now);
            if let Err(error) = &c.due {
                self.sink.record(&Diagnostic::DateUnparseable { task, error });
            }
            self.sink.record(&Diagnostic::Classified {
                task,
                state: c.state,
                hours_until_due: c.hours_until_due(now),
            });
            c
        }).collect()
    }

    pub fn statistics(&self, tasks: &[Task], now: DateTime<Utc>) -> Statistics {
        let stats = Statistics::from_classified(&self.classify_all(tasks, now));
        self.sink.record(&Diagnostic::Summary { stats: &stats });
        stats
    }

    /// Filter, search and sort `tasks` for display, with statistics over the
    /// whole unfiltered collection, all against the same `now`.
    pub fn render<'a>(&self, tasks: &'a [Task], query: &ViewQuery, now: DateTime<Utc>) -> RenderPass<'a> {
        let classified = self.classify_all(tasks, now);
        let stats = Statistics::from_classified(&classified);
        self.sink.record(&Diagnostic::Summary { stats: &stats });

        let mut visible: Vec<Classified<'a>> = classified.into_iter()
            .filter(|c| query.filter.accepts(c.task, c.state))
            .filter(|c| query.matches_search(c.task))
            .collect();
        sort_classified(&mut visible, query.sort);

        let rows = visible.into_iter().map(|c| ViewRow::new(c, now)).collect();
        RenderPass { now, rows, stats }
    }
}

// ─── Free-standing operations ─────────────────────────────────────────────────

pub fn filter_tasks<'a>(tasks: &'a [Task], filter: TaskFilter, now: DateTime<Utc>) -> Vec<&'a Task> {
    tasks.iter()
        .filter(|t| filter.accepts(t, Classified::new(t, now).state))
        .collect()
}

/// Stable sort by `key`; see [`sort_classified`].
pub fn sort_tasks(tasks: &mut [&Task], key: SortKey, now: DateTime<Utc>) {
    let mut items: Vec<Classified<'_>> = tasks.iter().map(|t| Classified::new(*t, now)).collect();
    sort_classified(&mut items, key);
    for (slot, c) in tasks.iter_mut().zip(items) {
        *slot = c.task;
    }
}

pub fn statistics(tasks: &[Task], now: DateTime<Utc>) -> Statistics {
    ViewEngine::silent().statistics(tasks, now)
}

/// Stable in every key. Completed tasks keep their real due date; tasks
/// without one sort as if due at the Unix epoch.
pub fn sort_classified(items: &mut [Classified<'_>], key: SortKey) {
    match key {
        SortKey::DueDate  => items.sort_by_key(|c| c.sort_instant()),
        SortKey::Priority => items.sort_by_key(|c| c.task.priority.rank()),
        SortKey::Title    => {
            let mut collator = Collator::default();
            items.sort_by(|a, b| compare_titles(&mut collator, &a.task.title, &b.task.title));
        }
    }
}

/// Unicode collation in the CLDR root order: accents and case only break
/// ties between otherwise equal letters, so `Éclair` sorts with the e's.
/// Exact text is the final tie-break.
pub fn compare_titles(collator: &mut Collator, a: &str, b: &str) -> Ordering {
    collator.collate(a, b).then_with(|| a.cmp(b))
}

// ─── Date text ────────────────────────────────────────────────────────────────

/// `Mar 15, 2025, 09:30 AM` in local time.
pub fn format_due(due: DateTime<Utc>) -> String {
    format_due_in(due, &Local)
}

pub fn format_due_in<Tz: TimeZone>(due: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    due.with_timezone(tz).format("%b %-d, %Y, %I:%M %p").to_string()
}

/// `in 3 days`, `in 5 hours`, `2 days overdue`, `1 hour overdue`.
pub fn relative_due_text(due: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let until   = due - now;
    let overdue = until < Duration::zero();
    let span    = if overdue { -until } else { until };
    let days    = span.num_days();
    let hours   = (span - Duration::days(days)).num_hours();

    match (overdue, days > 0) {
        (true,  true)  => format!("{days} {} overdue", plural(days, "day")),
        (true,  false) => format!("{hours} {} overdue", plural(hours, "hour")),
        (false, true)  => format!("in {days} {}", plural(days, "day")),
        (false, false) => format!("in {hours} {}", plural(hours, "hour")),
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 { unit.to_owned() } else { format!("{unit}s") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use chrono::FixedOffset;
    use std::cell::RefCell;

    fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap() }

    fn task(id: i64, title: &str, due: Duration) -> Task {
        Task::new(id, title).with_due((now() + due).to_rfc3339())
    }

    fn ids(pass: &RenderPass<'_>) -> Vec<String> {
        pass.rows.iter().map(|r| r.task.id.to_string()).collect()
    }

    /// A: completed, due yesterday. B: due in 2h. C: due in 48h.
    fn scenario() -> Vec<Task> {
        vec![
            task(1, "A", Duration::hours(-24)).with_completed(true),
            task(2, "B", Duration::hours(2)),
            task(3, "C", Duration::hours(48)),
        ]
    }

    #[test]
    fn scenario_statistics() {
        let stats = statistics(&scenario(), now());
        assert_eq!(stats, Statistics {
            due_soon: 1, overdue: 0, completed: 1, total: 3, pending: 2, unknown: 0,
        });
    }

    #[test]
    fn scenario_filters() {
        let tasks = scenario();
        let engine = ViewEngine::silent();
        let overdue = engine.render(&tasks, &ViewQuery::new(TaskFilter::Overdue, SortKey::DueDate), now());
        assert!(overdue.rows.is_empty());
        let soon = engine.render(&tasks, &ViewQuery::new(TaskFilter::DueSoon, SortKey::DueDate), now());
        assert_eq!(ids(&soon), ["2"]);
    }

    #[test]
    fn scenario_date_sort_keeps_completed_dates() {
        let tasks = scenario();
        let pass = ViewEngine::silent().render(&tasks, &ViewQuery::default(), now());
        assert_eq!(ids(&pass), ["1", "2", "3"]);
    }

    #[test]
    fn overdue_filter_matches_classification() {
        let tasks = vec![
            task(1, "late", Duration::milliseconds(-1)),
            task(2, "now", Duration::zero()),
            task(3, "done late", Duration::hours(-5)).with_completed(true),
            Task::new(4, "undated"),
        ];
        let pass = ViewEngine::silent()
            .render(&tasks, &ViewQuery::new(TaskFilter::Overdue, SortKey::DueDate), now());
        assert_eq!(ids(&pass), ["1"]);
        assert!(pass.rows.iter().all(|r| r.urgency == UrgencyState::Overdue));
        assert_eq!(pass.stats.overdue, 1);
    }

    #[test]
    fn due_soon_filter_covers_both_boundaries() {
        let tasks = vec![
            task(1, "now", Duration::zero()),
            task(2, "edge", Duration::hours(24)),
            task(3, "past edge", Duration::hours(24) + Duration::milliseconds(1)),
        ];
        let soon = filter_tasks(&tasks, TaskFilter::DueSoon, now());
        assert_eq!(soon.iter().map(|t| t.title.as_str()).collect::<Vec<_>>(), ["now", "edge"]);
        assert_eq!(statistics(&tasks, now()).due_soon, 2);
    }

    #[test]
    fn unparseable_dates_stay_out_of_date_views() {
        let tasks = vec![
            Task::new(1, "garbage").with_due("someday"),
            Task::new(2, "missing"),
            Task::new(3, "done garbage").with_due("someday").with_completed(true),
        ];
        assert!(filter_tasks(&tasks, TaskFilter::Overdue, now()).is_empty());
        assert!(filter_tasks(&tasks, TaskFilter::DueSoon, now()).is_empty());
        assert_eq!(filter_tasks(&tasks, TaskFilter::All, now()).len(), 3);
        assert_eq!(filter_tasks(&tasks, TaskFilter::Pending, now()).len(), 2);
        assert_eq!(filter_tasks(&tasks, TaskFilter::Completed, now()).len(), 1);

        let stats = statistics(&tasks, now());
        assert_eq!((stats.due_soon, stats.overdue), (0, 0));
        assert_eq!((stats.total, stats.unknown, stats.completed), (3, 2, 1));
    }

    #[test]
    fn priority_sort_orders_high_first_and_is_stable() {
        let tasks = vec![
            Task::new(1, "l1").with_priority(Priority::Low),
            Task::new(2, "m1").with_priority(Priority::Medium),
            Task::new(3, "h1").with_priority(Priority::High),
            Task::new(4, "l2").with_priority(Priority::Low),
            Task::new(5, "h2").with_priority(Priority::High),
        ];
        let mut refs: Vec<&Task> = tasks.iter().collect();
        sort_tasks(&mut refs, SortKey::Priority, now());
        let titles: Vec<&str> = refs.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["h1", "h2", "m1", "l1", "l2"]);
    }

    #[test]
    fn title_sort_ignores_case_first_and_is_stable() {
        let tasks = vec![
            Task::new(1, "banana"),
            Task::new(2, "Apple"),
            Task::new(3, "cherry"),
            Task::new(4, "apple"),
            Task::new(5, "Apple"),
        ];
        let pass = ViewEngine::silent()
            .render(&tasks, &ViewQuery::new(TaskFilter::All, SortKey::Title), now());
        // Lowercase before uppercase only among otherwise equal titles.
        assert_eq!(ids(&pass), ["4", "2", "5", "1", "3"]);
    }

    #[test]
    fn title_sort_places_accented_letters_with_their_base_letter() {
        let tasks = vec![
            Task::new(1, "Eggs"),
            Task::new(2, "Éclair"),
            Task::new(3, "Zebra"),
            Task::new(4, "Ärger"),
        ];
        let pass = ViewEngine::silent()
            .render(&tasks, &ViewQuery::new(TaskFilter::All, SortKey::Title), now());
        let titles: Vec<&str> = pass.rows.iter().map(|r| r.task.title.as_str()).collect();
        assert_eq!(titles, ["Ärger", "Éclair", "Eggs", "Zebra"]);
    }

    #[test]
    fn title_comparison_is_total() {
        let mut collator = Collator::default();
        assert_eq!(compare_titles(&mut collator, "resume", "résumé"), Ordering::Less);
        assert_eq!(compare_titles(&mut collator, "Same", "Same"), Ordering::Equal);
    }

    #[test]
    fn date_sort_puts_undated_first() {
        let tasks = vec![
            task(1, "later", Duration::days(3)),
            Task::new(2, "undated"),
            task(3, "sooner", Duration::hours(1)),
            Task::new(4, "also undated").with_due("??"),
        ];
        let pass = ViewEngine::silent().render(&tasks, &ViewQuery::default(), now());
        assert_eq!(ids(&pass), ["2", "4", "3", "1"]);
    }

    #[test]
    fn search_matches_title_or_description() {
        let tasks = vec![
            Task::new(1, "Buy milk"),
            Task::new(2, "Call bank").with_description("About the MILK subscription"),
            Task::new(3, "Walk dog"),
        ];
        let query = ViewQuery::new(TaskFilter::All, SortKey::Title).with_search("  Milk ");
        let pass = ViewEngine::silent().render(&tasks, &query, now());
        assert_eq!(ids(&pass), ["1", "2"]);
        assert_eq!(pass.stats.total, 3);
    }

    #[test]
    fn rows_carry_display_text() {
        let tasks = vec![task(1, "soon", Duration::hours(5)), Task::new(2, "broken").with_due("x")];
        let pass = ViewEngine::silent().render(&tasks, &ViewQuery::default(), now());
        let broken = &pass.rows[0];
        assert_eq!(broken.urgency, UrgencyState::Unknown);
        assert_eq!(broken.formatted_due_date, DATE_ERROR);
        assert_eq!(broken.relative_due_text, None);
        let soon = &pass.rows[1];
        assert_eq!(soon.urgency, UrgencyState::DueSoon);
        assert_eq!(soon.relative_due_text.as_deref(), Some("in 5 hours"));
    }

    #[test]
    fn relative_text() {
        let at = |d: Duration| relative_due_text(now() + d, now());
        assert_eq!(at(Duration::hours(1)), "in 1 hour");
        assert_eq!(at(Duration::minutes(30)), "in 0 hours");
        assert_eq!(at(Duration::hours(49)), "in 2 days");
        assert_eq!(at(Duration::hours(25)), "in 1 day");
        assert_eq!(at(Duration::hours(-2)), "2 hours overdue");
        assert_eq!(at(Duration::hours(-30)), "1 day overdue");
        assert_eq!(at(Duration::days(-4)), "4 days overdue");
    }

    #[test]
    fn formatted_due_date() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let due = Utc.with_ymd_and_hms(2025, 3, 5, 21, 7, 0).unwrap();
        assert_eq!(format_due_in(due, &tz), "Mar 5, 2025, 09:07 PM");
    }

    #[test]
    fn selectors_parse_and_cycle() {
        assert_eq!("dueSoon".parse::<TaskFilter>(), Ok(TaskFilter::DueSoon));
        assert!("due_soon".parse::<TaskFilter>().is_err());
        assert_eq!("title".parse::<SortKey>(), Ok(SortKey::Title));
        let mut key = SortKey::DueDate;
        let mut seen = vec![];
        for _ in 0..4 {
            key = key.next();
            seen.push(key);
        }
        assert_eq!(seen, [SortKey::Priority, SortKey::Title, SortKey::DueDate, SortKey::Priority]);
    }

    #[test]
    fn engine_reports_unparseable_dates_to_sink() {
        let seen = RefCell::new(Vec::new());
        let sink = |d: &Diagnostic<'_>| {
            if let Diagnostic::DateUnparseable { task, .. } = d {
                seen.borrow_mut().push(task.id.to_string());
            }
        };
        let tasks = vec![Task::new(1, "bad").with_due("nope"), task(2, "ok", Duration::hours(3))];
        let stats = ViewEngine::with_sink(&sink).statistics(&tasks, now());
        assert_eq!(stats.unknown, 1);
        assert_eq!(*seen.borrow(), ["1"]);
    }

    #[test]
    fn render_is_idempotent() {
        let tasks = scenario();
        let query = ViewQuery::new(TaskFilter::Pending, SortKey::Priority);
        let engine = ViewEngine::silent();
        assert_eq!(engine.render(&tasks, &query, now()), engine.render(&tasks, &query, now()));
    }
}
