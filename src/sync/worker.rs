//! Background sync worker: a Tokio task that owns the [`TaskSource`] and runs
//! one command at a time, re-fetching after every successful mutation.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Duration;

use crate::model::{Task, TaskDraft, TaskId, TaskPatch};
use crate::sync::{submit_draft, submit_patch, TaskSource};

// ─── Channel types ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SyncCommand {
    Refresh,
    Create(TaskDraft),
    Update(TaskId, TaskPatch),
    Delete(TaskId),
    SetCompleted(TaskId, bool),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Loading,
    /// A fresh snapshot of the whole collection.
    Loaded(Vec<Task>),
    /// A mutation succeeded; a `Loading`/`Loaded` pair follows.
    Mutated(String),
    Failed(String),
}

// ─── Worker handle ────────────────────────────────────────────────────────────

pub struct SyncWorker {
    pub cmd_tx:   mpsc::Sender<SyncCommand>,
    pub event_rx: Arc<Mutex<mpsc::Receiver<SyncEvent>>>,
}

impl SyncWorker {
    /// Spawn the background worker. With `interval` set, it also refreshes on
    /// that period; the first tick is skipped so startup loads only once.
    pub fn spawn<S>(source: S, interval: Option<Duration>) -> Self
    where
        S: TaskSource + 'static,
    {
        let (cmd_tx,   mut cmd_rx)   = mpsc::channel::<SyncCommand>(32);
        let (event_tx,     event_rx) = mpsc::channel::<SyncEvent>(64);

        tokio::spawn(async move {
            let mut ticker = interval.map(tokio::time::interval);
            if let Some(t) = ticker.as_mut() {
                t.tick().await;
            }

            loop {
                let cmd = tokio::select! {
                    cmd = cmd_rx.recv() => cmd,
                    _ = next_tick(&mut ticker) => Some(SyncCommand::Refresh),
                };
                match cmd {
                    Some(SyncCommand::Shutdown) | None => break,
                    Some(cmd) => {
                        if !handle(&source, cmd, &event_tx).await {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Sync worker stopped");
        });

        SyncWorker { cmd_tx, event_rx: Arc::new(Mutex::new(event_rx)) }
    }

    pub async fn refresh(&self)  { self.send(SyncCommand::Refresh).await; }
    pub async fn shutdown(&self) { self.send(SyncCommand::Shutdown).await; }

    pub async fn create(&self, draft: TaskDraft) {
        self.send(SyncCommand::Create(draft)).await;
    }

    pub async fn update(&self, id: TaskId, patch: TaskPatch) {
        self.send(SyncCommand::Update(id, patch)).await;
    }

    pub async fn delete(&self, id: TaskId) {
        self.send(SyncCommand::Delete(id)).await;
    }

    pub async fn set_completed(&self, id: TaskId, completed: bool) {
        self.send(SyncCommand::SetCompleted(id, completed)).await;
    }

    /// Everything the worker has emitted so far, without waiting.
    pub fn drain(&self) -> Vec<SyncEvent> {
        let mut buf = Vec::new();
        if let Ok(mut rx) = self.event_rx.try_lock() {
            while let Ok(ev) = rx.try_recv() { buf.push(ev); }
        }
        buf
    }

    /// Next event, or `None` once the worker has stopped.
    pub async fn next_event(&self) -> Option<SyncEvent> {
        self.event_rx.lock().await.recv().await
    }

    async fn send(&self, cmd: SyncCommand) {
        if self.cmd_tx.send(cmd).await.is_err() {
            tracing::warn!("sync worker is gone; command dropped");
        }
    }
}

async fn next_tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(t) => { t.tick().await; }
        None    => std::future::pending::<()>().await,
    }
}

// ─── Command handling ─────────────────────────────────────────────────────────

/// Returns false once nobody is listening for events.
async fn handle<S: TaskSource>(source: &S, cmd: SyncCommand, tx: &mpsc::Sender<SyncEvent>) -> bool {
    let outcome = match cmd {
        SyncCommand::Refresh => return load(source, tx).await,
        SyncCommand::Shutdown => return false,

        SyncCommand::Create(draft) => submit_draft(source, draft).await
            .map(|t| format!("Created \"{}\"", t.title)),

        SyncCommand::Update(id, patch) => submit_patch(source, &id, patch).await
            .map(|t| format!("Updated \"{}\"", t.title)),

        SyncCommand::Delete(id) => source.delete(&id).await
            .map(|()| format!("Deleted task {id}"))
            .map_err(Into::into),

        SyncCommand::SetCompleted(id, completed) => source.set_completed(&id, completed).await
            .map(|t| if completed {
                format!("Completed \"{}\"", t.title)
            } else {
                format!("Reopened \"{}\"", t.title)
            })
            .map_err(Into::into),
    };

    match outcome {
        Ok(message) => {
            tracing::info!("{message}");
            tx.send(SyncEvent::Mutated(message)).await.is_ok() && load(source, tx).await
        }
        Err(e) => {
            tracing::warn!("task mutation failed: {e}");
            tx.send(SyncEvent::Failed(e.to_string())).await.is_ok()
        }
    }
}

async fn load<S: TaskSource>(source: &S, tx: &mpsc::Sender<SyncEvent>) -> bool {
    if tx.send(SyncEvent::Loading).await.is_err() {
        return false;
    }
    let event = match source.fetch_all().await {
        Ok(tasks) => {
            tracing::info!(count = tasks.len(), "tasks loaded");
            SyncEvent::Loaded(tasks)
        }
        Err(e) => {
            tracing::warn!("fetch failed: {e}");
            SyncEvent::Failed(e.to_string())
        }
    };
    tx.send(event).await.is_ok()
}
