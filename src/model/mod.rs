use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

pub const NO_DESCRIPTION: &str = "No description";

// ─── Identity ─────────────────────────────────────────────────────────────────

/// Server-assigned task id. The service uses integers, but string ids are
/// accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    Num(i64),
    Text(String),
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Num(n)  => write!(f, "{n}"),
            TaskId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for TaskId {
    fn from(n: i64) -> Self { TaskId::Num(n) }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        s.parse::<i64>().map(TaskId::Num).unwrap_or_else(|_| TaskId::Text(s.to_owned()))
    }
}

// ─── Priority ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    /// Sort rank: HIGH first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High   => 0,
            Priority::Medium => 1,
            Priority::Low    => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High   => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low    => "LOW",
        }
    }

    pub fn next(self) -> Self {
        Priority::ALL[(self.rank() as usize + 1) % Priority::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Priority::ALL[(self.rank() as usize + Priority::ALL.len() - 1) % Priority::ALL.len()]
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Priority {
    type Err = String;

    /// Case-sensitive, matching the wire format.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL.into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown priority `{s}` (expected HIGH, MEDIUM or LOW)"))
    }
}

// ─── Due-date candidates ──────────────────────────────────────────────────────

/// The record fields that may carry a due date, in lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DueField {
    FormattedDueDate,
    DueDate,
    DueDateTime,
    Due,
}

impl DueField {
    pub const PRECEDENCE: [DueField; 4] = [
        DueField::FormattedDueDate,
        DueField::DueDate,
        DueField::DueDateTime,
        DueField::Due,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            DueField::FormattedDueDate => "formattedDueDate",
            DueField::DueDate          => "dueDate",
            DueField::DueDateTime      => "dueDateTime",
            DueField::Due              => "due",
        }
    }
}

impl fmt::Display for DueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.wire_name()) }
}

/// Raw due-date values exactly as the service sent them. Shapes vary
/// (strings, `[y, m, d, h, mi, s]` arrays, `{year, month, day}` objects), so
/// they stay untyped until `tasks::due` normalizes them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DueDateFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_due_date: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date:           Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date_time:      Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due:                Option<Value>,
}

impl DueDateFields {
    pub fn get(&self, field: DueField) -> Option<&Value> {
        match field {
            DueField::FormattedDueDate => self.formatted_due_date.as_ref(),
            DueField::DueDate          => self.due_date.as_ref(),
            DueField::DueDateTime      => self.due_date_time.as_ref(),
            DueField::Due              => self.due.as_ref(),
        }
    }

    pub fn set(&mut self, field: DueField, value: Option<Value>) {
        match field {
            DueField::FormattedDueDate => self.formatted_due_date = value,
            DueField::DueDate          => self.due_date           = value,
            DueField::DueDateTime      => self.due_date_time      = value,
            DueField::Due              => self.due                = value,
        }
    }
}

// ─── Task ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id:          TaskId,
    pub title:       String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub due:         DueDateFields,
    #[serde(default)]
    pub priority:    Priority,
    #[serde(default)]
    pub completed:   bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at:  Option<String>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(), title: title.into(),
            description: None, due: DueDateFields::default(),
            priority: Priority::Medium, completed: false, created_at: None,
        }
    }

    /// Sets the service's primary `dueDate` field.
    pub fn with_due(self, value: impl Into<Value>) -> Self {
        self.with_due_field(DueField::DueDate, value)
    }

    pub fn with_due_field(mut self, field: DueField, value: impl Into<Value>) -> Self {
        self.due.set(field, Some(value.into()));
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    pub fn description_or_placeholder(&self) -> &str {
        match self.description.as_deref() {
            Some(d) if !d.trim().is_empty() => d,
            _ => NO_DESCRIPTION,
        }
    }
}

// ─── Creation / update input ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title:       String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub due_date:    String,
    pub priority:    Priority,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, due_date: impl Into<String>) -> Self {
        Self {
            title: title.into(), description: None,
            due_date: due_date.into(), priority: Priority::Medium,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        validate_due_input(&self.due_date)
    }

    /// Normalizes form input (trimmed title, `:00` seconds appended to
    /// minute-precision dates, blank description dropped) and validates it.
    pub fn prepared(self) -> Result<Self, ValidationError> {
        let draft = Self {
            title:       self.title.trim().to_owned(),
            description: self.description.map(|d| d.trim().to_owned()).filter(|d| !d.is_empty()),
            due_date:    complete_due_input(&self.due_date),
            priority:    self.priority,
        };
        draft.validate()?;
        Ok(draft)
    }
}

/// Partial update. Only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title:       Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date:    Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority:    Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed:   Option<bool>,
}

impl TaskPatch {
    /// A full replacement built from a prepared draft.
    pub fn from_draft(draft: TaskDraft, completed: bool) -> Self {
        Self {
            title:       Some(draft.title),
            description: Some(draft.description.unwrap_or_default()),
            due_date:    Some(draft.due_date),
            priority:    Some(draft.priority),
            completed:   Some(completed),
        }
    }

    pub fn is_empty(&self) -> bool { *self == TaskPatch::default() }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ValidationError::MissingTitle);
        }
        match self.due_date.as_deref() {
            Some(due) => validate_due_input(due),
            None      => Ok(()),
        }
    }
}

// ─── Due-date input helpers ───────────────────────────────────────────────────

/// `YYYY-MM-DDTHH:MM` (what a datetime-local field yields) gains `:00`.
pub fn complete_due_input(input: &str) -> String {
    let s = input.trim();
    if NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").is_ok() {
        format!("{s}:00")
    } else {
        s.to_owned()
    }
}

/// True for ISO-8601 combined date-times, with or without an offset.
pub fn is_combined_date_time(s: &str) -> bool {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || DateTime::parse_from_rfc3339(s).is_ok_and(|_| s.contains('T'))
}

fn validate_due_input(due: &str) -> Result<(), ValidationError> {
    let due = due.trim();
    if due.is_empty() {
        return Err(ValidationError::MissingDueDate);
    }
    if !is_combined_date_time(due) {
        return Err(ValidationError::InvalidDueDate(due.to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_deserializes_from_service_json() {
        let t: Task = serde_json::from_value(json!({
            "id": 3,
            "title": "File taxes",
            "description": "",
            "dueDate": "2025-04-15T17:00:00",
            "priority": "HIGH",
            "completed": false,
            "createdAt": "2025-03-01T08:00:00"
        })).unwrap();
        assert_eq!(t.id, TaskId::Num(3));
        assert_eq!(t.priority, Priority::High);
        assert_eq!(t.due.due_date, Some(json!("2025-04-15T17:00:00")));
        assert_eq!(t.due.formatted_due_date, None);
        assert_eq!(t.description_or_placeholder(), NO_DESCRIPTION);
    }

    #[test]
    fn task_defaults_priority_and_completion() {
        let t: Task = serde_json::from_value(json!({
            "id": "abc", "title": "Loose record", "due": [2025, 3, 15]
        })).unwrap();
        assert_eq!(t.id, TaskId::Text("abc".into()));
        assert_eq!(t.priority, Priority::Medium);
        assert!(!t.completed);
        assert_eq!(t.due.get(DueField::Due), Some(&json!([2025, 3, 15])));
    }

    #[test]
    fn priority_is_case_sensitive() {
        assert_eq!("LOW".parse::<Priority>(), Ok(Priority::Low));
        assert!("low".parse::<Priority>().is_err());
        assert!(serde_json::from_value::<Priority>(json!("high")).is_err());
    }

    #[test]
    fn priority_cycles() {
        assert_eq!(Priority::High.next(), Priority::Medium);
        assert_eq!(Priority::Low.next(), Priority::High);
        assert_eq!(Priority::High.prev(), Priority::Low);
    }

    #[test]
    fn task_id_from_str_prefers_numbers() {
        assert_eq!(TaskId::from("42"), TaskId::Num(42));
        assert_eq!(TaskId::from("x-1"), TaskId::Text("x-1".into()));
        assert_eq!(TaskId::Num(7).to_string(), "7");
    }

    #[test]
    fn draft_requires_title_and_due_date() {
        assert_eq!(
            TaskDraft::new("  ", "2025-03-15T09:30:00").validate(),
            Err(ValidationError::MissingTitle)
        );
        assert_eq!(
            TaskDraft::new("Call mom", "").validate(),
            Err(ValidationError::MissingDueDate)
        );
        assert_eq!(
            TaskDraft::new("Call mom", "next tuesday").validate(),
            Err(ValidationError::InvalidDueDate("next tuesday".into()))
        );
    }

    #[test]
    fn prepared_draft_completes_seconds() {
        let d = TaskDraft::new(" Call mom ", "2025-03-15T09:30")
            .with_description("   ")
            .prepared()
            .unwrap();
        assert_eq!(d.title, "Call mom");
        assert_eq!(d.due_date, "2025-03-15T09:30:00");
        assert_eq!(d.description, None);
    }

    #[test]
    fn draft_serializes_camel_case() {
        let d = TaskDraft::new("Ship", "2025-03-15T09:30:00").with_priority(Priority::Low);
        assert_eq!(
            serde_json::to_value(&d).unwrap(),
            json!({"title": "Ship", "dueDate": "2025-03-15T09:30:00", "priority": "LOW"})
        );
    }

    #[test]
    fn patch_only_sends_set_fields() {
        let p = TaskPatch { completed: Some(true), ..TaskPatch::default() };
        assert_eq!(serde_json::to_value(&p).unwrap(), json!({"completed": true}));
        assert!(!p.is_empty());
        assert!(TaskPatch::default().is_empty());
    }

    #[test]
    fn patch_validates_carried_fields() {
        let blank = TaskPatch { title: Some(String::new()), ..TaskPatch::default() };
        assert_eq!(blank.validate(), Err(ValidationError::MissingTitle));
        let bad_due = TaskPatch { due_date: Some("soon".into()), ..TaskPatch::default() };
        assert_eq!(bad_due.validate(), Err(ValidationError::InvalidDueDate("soon".into())));
        assert_eq!(TaskPatch::default().validate(), Ok(()));
    }

    #[test]
    fn combined_date_time_detection() {
        assert!(is_combined_date_time("2025-03-15T09:30:00"));
        assert!(is_combined_date_time("2025-03-15T09:30:00.250"));
        assert!(is_combined_date_time("2025-03-15T09:30:00Z"));
        assert!(!is_combined_date_time("2025-03-15"));
        assert!(!is_combined_date_time("2025-03-15 09:30:00"));
    }
}
