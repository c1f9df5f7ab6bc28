//! Optional observability hook for the view engine.
//!
//! The engine never logs on its own. Callers hand it a [`DiagnosticSink`]:
//! [`Silent`] drops everything, [`TracingSink`] forwards to `tracing`, and any
//! `Fn(&Diagnostic)` closure works as an ad-hoc sink.

use crate::error::DateUnparseable;
use crate::model::Task;
use crate::tasks::urgency::UrgencyState;
use crate::tasks::view::Statistics;

#[derive(Debug)]
pub enum Diagnostic<'a> {
    /// Data-quality signal, not an engine failure.
    DateUnparseable { task: &'a Task, error: &'a DateUnparseable },
    Classified { task: &'a Task, state: UrgencyState, hours_until_due: Option<f64> },
    Summary { stats: &'a Statistics },
}

pub trait DiagnosticSink {
    fn record(&self, diagnostic: &Diagnostic<'_>);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl DiagnosticSink for Silent {
    fn record(&self, _: &Diagnostic<'_>) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, diagnostic: &Diagnostic<'_>) {
        match diagnostic {
            Diagnostic::DateUnparseable { task, error } => {
                tracing::warn!(task_id = %task.id, title = %task.title, "{error}");
            }
            Diagnostic::Classified { task, state, hours_until_due } => {
                tracing::debug!(
                    task_id = %task.id,
                    title = %task.title,
                    ?state,
                    ?hours_until_due,
                    "classified"
                );
            }
            Diagnostic::Summary { stats } => {
                tracing::debug!(
                    due_soon = stats.due_soon,
                    overdue = stats.overdue,
                    completed = stats.completed,
                    unknown = stats.unknown,
                    total = stats.total,
                    "statistics"
                );
            }
        }
    }
}

impl<F> DiagnosticSink for F
where
    F: Fn(&Diagnostic<'_>),
{
    fn record(&self, diagnostic: &Diagnostic<'_>) { self(diagnostic) }
}
