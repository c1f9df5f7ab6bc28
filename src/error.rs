//! Error types for the task board.

use thiserror::Error;

use crate::model::DueField;

/// A due-date value that could not be resolved to an instant.
///
/// Never fatal: the task classifies as `Unknown` and stays out of the
/// date-based filters and counts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateUnparseable {
    #[error("no due date present")]
    Absent,

    #[error("unrecognised due date in `{field}`: {value}")]
    Malformed { field: DueField, value: String },
}

/// Rejected task input, reported before any network round trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Task title is required!")]
    MissingTitle,

    #[error("Due date is required!")]
    MissingDueDate,

    #[error("Due date `{0}` is not a date-time like 2025-03-15T09:30")]
    InvalidDueDate(String),
}

/// Any failure talking to the remote task service.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("task service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, Error>;
