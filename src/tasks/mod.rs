//! Due-date normalization, urgency classification and view derivation.

pub mod diagnostics;
pub mod due;
pub mod urgency;
pub mod view;

pub use diagnostics::{Diagnostic, DiagnosticSink, Silent, TracingSink};
pub use due::{normalize, parse_due};
pub use urgency::{classify, Classified, UrgencyState};
pub use view::{
    filter_tasks, format_due, relative_due_text, sort_tasks, statistics,
    RenderPass, SortKey, Statistics, TaskFilter, ViewEngine, ViewQuery, ViewRow,
};
