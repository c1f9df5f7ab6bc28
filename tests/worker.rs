use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use taskboard::error::TransportError;
use taskboard::model::{Task, TaskDraft, TaskId, TaskPatch};
use taskboard::sync::worker::{SyncEvent, SyncWorker};
use taskboard::sync::TaskSource;

#[derive(Default)]
struct MemorySource {
    tasks:   Mutex<Vec<Task>>,
    next_id: AtomicI64,
    offline: AtomicBool,
}

impl MemorySource {
    fn with(tasks: Vec<Task>) -> Self {
        Self { next_id: AtomicI64::new(100), tasks: Mutex::new(tasks), ..Self::default() }
    }

    fn online(&self) -> Result<(), TransportError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(TransportError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }

    fn not_found(id: &TaskId) -> TransportError {
        TransportError::Status { status: 404, message: format!("Task {id} not found") }
    }
}

impl TaskSource for MemorySource {
    async fn fetch_all(&self) -> Result<Vec<Task>, TransportError> {
        self.online()?;
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn create(&self, draft: &TaskDraft) -> Result<Task, TransportError> {
        self.online()?;
        let mut task = Task::new(self.next_id.fetch_add(1, Ordering::SeqCst), draft.title.clone())
            .with_due(draft.due_date.clone())
            .with_priority(draft.priority);
        task.description = draft.description.clone();
        self.tasks.lock().unwrap().push(task.clone());
        Ok(task)
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, TransportError> {
        self.online()?;
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks.iter_mut().find(|t| &t.id == id).ok_or_else(|| Self::not_found(id))?;
        if let Some(title) = &patch.title { task.title = title.clone(); }
        if let Some(p) = patch.priority { task.priority = p; }
        if let Some(c) = patch.completed { task.completed = c; }
        Ok(task.clone())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), TransportError> {
        self.online()?;
        let mut tasks = self.tasks.lock().unwrap();
        let before = tasks.len();
        tasks.retain(|t| &t.id != id);
        if tasks.len() == before { Err(Self::not_found(id)) } else { Ok(()) }
    }

    async fn set_completed(&self, id: &TaskId, completed: bool) -> Result<Task, TransportError> {
        self.online()?;
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks.iter_mut().find(|t| &t.id == id).ok_or_else(|| Self::not_found(id))?;
        task.completed = completed;
        Ok(task.clone())
    }
}

async fn next(worker: &SyncWorker) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(5), worker.next_event())
        .await
        .expect("worker went quiet")
        .expect("worker stopped")
}

async fn loaded(worker: &SyncWorker) -> Vec<Task> {
    assert_eq!(next(worker).await, SyncEvent::Loading);
    match next(worker).await {
        SyncEvent::Loaded(tasks) => tasks,
        other => panic!("expected Loaded, got {other:?}"),
    }
}

fn seed() -> Vec<Task> {
    vec![
        Task::new(1, "Write report").with_due("2025-03-15T09:30:00"),
        Task::new(2, "Call plumber").with_due("2025-03-16T14:00:00"),
    ]
}

#[tokio::test]
async fn refresh_emits_loading_then_loaded() {
    let worker = SyncWorker::spawn(MemorySource::with(seed()), None);
    worker.refresh().await;
    let tasks = loaded(&worker).await;
    assert_eq!(tasks.len(), 2);
    worker.shutdown().await;
}

#[tokio::test]
async fn create_is_followed_by_a_refetch() {
    let worker = SyncWorker::spawn(MemorySource::with(seed()), None);
    worker.create(TaskDraft::new(" Renew passport ", "2025-04-01T10:00")).await;

    assert_eq!(next(&worker).await, SyncEvent::Mutated("Created \"Renew passport\"".into()));
    let tasks = loaded(&worker).await;
    assert_eq!(tasks.len(), 3);
    let created = tasks.iter().find(|t| t.id == TaskId::Num(100)).unwrap();
    assert_eq!(created.title, "Renew passport");
    assert_eq!(created.due.due_date, Some("2025-04-01T10:00:00".into()));
}

#[tokio::test]
async fn invalid_draft_fails_without_touching_the_source() {
    let worker = SyncWorker::spawn(MemorySource::with(seed()), None);
    worker.create(TaskDraft::new("   ", "2025-04-01T10:00")).await;
    assert_eq!(next(&worker).await, SyncEvent::Failed("Task title is required!".into()));

    worker.refresh().await;
    assert_eq!(loaded(&worker).await.len(), 2);
}

#[tokio::test]
async fn toggle_and_delete_round_trip() {
    let worker = SyncWorker::spawn(MemorySource::with(seed()), None);

    worker.set_completed(TaskId::Num(2), true).await;
    assert_eq!(next(&worker).await, SyncEvent::Mutated("Completed \"Call plumber\"".into()));
    let tasks = loaded(&worker).await;
    assert!(tasks.iter().find(|t| t.id == TaskId::Num(2)).unwrap().completed);

    worker.delete(TaskId::Num(1)).await;
    assert_eq!(next(&worker).await, SyncEvent::Mutated("Deleted task 1".into()));
    let tasks = loaded(&worker).await;
    assert_eq!(tasks.iter().map(|t| t.id.clone()).collect::<Vec<_>>(), [TaskId::Num(2)]);
}

#[tokio::test]
async fn update_applies_patch() {
    let worker = SyncWorker::spawn(MemorySource::with(seed()), None);
    let patch = TaskPatch { title: Some("Write final report".into()), ..TaskPatch::default() };
    worker.update(TaskId::Num(1), patch).await;
    assert_eq!(next(&worker).await, SyncEvent::Mutated("Updated \"Write final report\"".into()));
    let tasks = loaded(&worker).await;
    assert_eq!(tasks[0].title, "Write final report");
}

#[tokio::test]
async fn failed_mutation_reports_and_does_not_refetch() {
    let worker = SyncWorker::spawn(MemorySource::with(seed()), None);
    worker.delete(TaskId::Num(42)).await;
    assert_eq!(
        next(&worker).await,
        SyncEvent::Failed("server returned 404: Task 42 not found".into())
    );

    worker.refresh().await;
    assert_eq!(next(&worker).await, SyncEvent::Loading);
}

#[tokio::test]
async fn unreachable_source_fails_the_load() {
    let source = MemorySource::with(seed());
    source.offline.store(true, Ordering::SeqCst);
    let worker = SyncWorker::spawn(source, None);
    worker.refresh().await;
    assert_eq!(next(&worker).await, SyncEvent::Loading);
    assert_eq!(
        next(&worker).await,
        SyncEvent::Failed("task service unavailable: connection refused".into())
    );
}

#[tokio::test(start_paused = true)]
async fn periodic_refresh_fires_on_interval() {
    let worker = SyncWorker::spawn(MemorySource::with(seed()), Some(Duration::from_secs(300)));
    let start = tokio::time::Instant::now();
    // No timeout here: the paused clock would jump straight to it.
    assert_eq!(worker.next_event().await, Some(SyncEvent::Loading));
    assert!(matches!(worker.next_event().await, Some(SyncEvent::Loaded(tasks)) if tasks.len() == 2));
    assert!(start.elapsed() >= Duration::from_secs(300));
}

#[tokio::test]
async fn shutdown_closes_the_event_stream() {
    let worker = SyncWorker::spawn(MemorySource::with(seed()), None);
    worker.shutdown().await;
    let end = tokio::time::timeout(Duration::from_secs(5), worker.next_event()).await.unwrap();
    assert_eq!(end, None);
}
