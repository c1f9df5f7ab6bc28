//! Remote task service access.
//!
//! [`TaskSource`] is the seam between the board and wherever tasks live.
//! [`http::HttpTaskSource`] talks to the REST service; [`worker::SyncWorker`]
//! drives any source from a background task.

pub mod http;
pub mod worker;

use std::future::Future;

use crate::error::{self, TransportError};
use crate::model::{Task, TaskDraft, TaskId, TaskPatch};

pub trait TaskSource: Send + Sync {
    fn fetch_all(&self) -> impl Future<Output = Result<Vec<Task>, TransportError>> + Send;

    fn create(&self, draft: &TaskDraft) -> impl Future<Output = Result<Task, TransportError>> + Send;

    fn update(
        &self,
        id:    &TaskId,
        patch: &TaskPatch,
    ) -> impl Future<Output = Result<Task, TransportError>> + Send;

    fn delete(&self, id: &TaskId) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn set_completed(
        &self,
        id:        &TaskId,
        completed: bool,
    ) -> impl Future<Output = Result<Task, TransportError>> + Send;
}

/// Prepare and validate `draft`, then create it. Invalid input never reaches
/// the source.
pub async fn submit_draft<S: TaskSource>(source: &S, draft: TaskDraft) -> error::Result<Task> {
    let draft = draft.prepared()?;
    Ok(source.create(&draft).await?)
}

pub async fn submit_patch<S: TaskSource>(source: &S, id: &TaskId, patch: TaskPatch) -> error::Result<Task> {
    patch.validate()?;
    Ok(source.update(id, &patch).await?)
}
