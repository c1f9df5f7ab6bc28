use anyhow::Result;
use chrono::{DateTime, Duration, Local, Utc};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Instant;

use crate::{
    model::{Task, TaskDraft, TaskPatch},
    sync::worker::{SyncCommand, SyncEvent, SyncWorker},
    tasks::{
        diagnostics::TracingSink,
        view::{RenderPass, TaskFilter, ViewEngine, ViewQuery},
    },
    theme::ThemeConfig,
    ui::{draw, FormField, InputMode, TaskForm, UiState},
};

/// How long a notification stays on screen.
pub const NOTICE_TTL: std::time::Duration = std::time::Duration::from_secs(3);

const FORM_DUE_FORMAT: &str = "%Y-%m-%dT%H:%M";
/// Editing keeps seconds so an untouched due date round-trips exactly.
const EDIT_DUE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// ─── Panel focus model ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    TaskList,
    Form,
    ConfirmDelete,
    Search,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind { Info, Error }

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub message: String,
    pub kind:    NoticeKind,
    pub shown:   Instant,
}

// ─── App state ────────────────────────────────────────────────────────────────

pub struct App {
    pub theme:        ThemeConfig,
    pub theme_idx:    usize,
    pub sync:         Option<SyncWorker>,
    /// Last successfully loaded collection; only replaced by a new load.
    pub tasks:        Vec<Task>,
    pub query:        ViewQuery,
    pub cursor:       usize,
    pub active_panel: Panel,
    pub ui:           UiState,
    pub sync_status:  String,
    pub loading:      bool,
    pub notification: Option<Notification>,
    pub trace_classification: bool,
    pub running:      bool,
}

impl App {
    pub fn new(theme: ThemeConfig, query: ViewQuery) -> Self {
        Self {
            theme_idx: theme.catalogue_index(),
            theme, sync: None,
            tasks: Vec::new(),
            query, cursor: 0,
            active_panel: Panel::TaskList,
            ui: UiState::default(),
            sync_status: String::new(),
            loading: false,
            notification: None,
            trace_classification: false,
            running: true,
        }
    }

    pub fn attach_sync_worker(&mut self, w: SyncWorker) { self.sync = Some(w); }

    /// The current view of the collection at `now`.
    pub fn render(&self, now: DateTime<Utc>) -> RenderPass<'_> {
        ViewEngine::silent().render(&self.tasks, &self.query, now)
    }

    pub fn selected(&self, now: DateTime<Utc>) -> Option<&Task> {
        self.render(now).rows.get(self.cursor).map(|r| r.task)
    }

    // ── TUI loop ──────────────────────────────────────────────────────────────

    pub async fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend  = CrosstermBackend::new(stdout);
        let mut term = Terminal::new(backend)?;

        let result = self.event_loop(&mut term).await;

        disable_raw_mode()?;
        execute!(term.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
        term.show_cursor()?;
        result
    }

    async fn event_loop(
        &mut self,
        term: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<()> {
        if let Some(ref w) = self.sync { w.refresh().await; }

        let tick = std::time::Duration::from_millis(50);
        while self.running {
            self.expire_notification(Instant::now());
            term.draw(|f| draw(f, self))?;

            let pending = self.sync.as_ref().map(SyncWorker::drain).unwrap_or_default();
            for ev in pending { self.on_sync_event(ev, Utc::now()); }

            if event::poll(tick)? {
                if let Event::Key(key) = event::read()? {
                    if let Some(cmd) = self.on_key(key, Utc::now()) {
                        self.dispatch(cmd).await;
                    }
                }
            }
        }

        if let Some(ref w) = self.sync { w.shutdown().await; }
        Ok(())
    }

    async fn dispatch(&mut self, cmd: SyncCommand) {
        match self.sync {
            Some(ref w) => {
                if w.cmd_tx.send(cmd).await.is_err() {
                    self.notify(NoticeKind::Error, "Sync worker stopped");
                }
            }
            None => self.notify(NoticeKind::Error, "Not connected to a task service"),
        }
    }

    // ── Sync events ───────────────────────────────────────────────────────────

    pub fn on_sync_event(&mut self, ev: SyncEvent, now: DateTime<Utc>) {
        match ev {
            SyncEvent::Loading => {
                self.loading     = true;
                self.sync_status = "⟳ Loading…".into();
            }
            SyncEvent::Loaded(tasks) => {
                self.loading = false;
                self.tasks   = tasks;
                if self.trace_classification {
                    ViewEngine::with_sink(&TracingSink).statistics(&self.tasks, now);
                }
                self.sync_status = format!(
                    "✓ {} tasks  {}",
                    self.tasks.len(),
                    now.with_timezone(&Local).format("%H:%M"),
                );
                self.clamp_cursor(now);
            }
            SyncEvent::Mutated(msg) => self.notify(NoticeKind::Info, msg),
            SyncEvent::Failed(msg) => {
                self.loading     = false;
                self.sync_status = "✗ offline".into();
                self.notify(NoticeKind::Error, msg);
            }
        }
    }

    pub fn notify(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.notification = Some(Notification { message: message.into(), kind, shown: Instant::now() });
    }

    pub fn expire_notification(&mut self, now: Instant) {
        if self.notification.as_ref().is_some_and(|n| now.duration_since(n.shown) >= NOTICE_TTL) {
            self.notification = None;
        }
    }

    // ── Input ─────────────────────────────────────────────────────────────────

    /// Apply a key press. Returns the command to hand the sync worker, if any.
    pub fn on_key(&mut self, key: KeyEvent, now: DateTime<Utc>) -> Option<SyncCommand> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.running = false;
            return None;
        }

        match self.active_panel {
            Panel::TaskList      => self.key_tasks(key, now),
            Panel::Form          => self.key_form(key),
            Panel::ConfirmDelete => self.key_confirm(key),
            Panel::Search        => { self.key_search(key, now); None }
            Panel::Help          => { self.active_panel = Panel::TaskList; None }
        }
    }

    fn key_tasks(&mut self, key: KeyEvent, now: DateTime<Utc>) -> Option<SyncCommand> {
        match key.code {
            KeyCode::Char('q') => self.running = false,
            KeyCode::Char('?') => self.active_panel = Panel::Help,
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cursor + 1 < self.render(now).rows.len() { self.cursor += 1; }
            }
            KeyCode::Up | KeyCode::Char('k') => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Char('g') | KeyCode::Home => self.cursor = 0,
            KeyCode::Char('G') | KeyCode::End  => {
                self.cursor = self.render(now).rows.len().saturating_sub(1);
            }
            KeyCode::Char(c @ '1'..='5') => {
                let idx = c as usize - '1' as usize;
                self.set_filter(TaskFilter::ALL[idx], now);
            }
            KeyCode::Char('s') => {
                self.query.sort = self.query.sort.next();
                self.cursor = 0;
            }
            KeyCode::Char('/') => {
                self.active_panel  = Panel::Search;
                self.ui.input_mode = InputMode::Insert;
            }
            KeyCode::Esc => {
                self.query.search.clear();
                self.clamp_cursor(now);
            }
            KeyCode::Char('T') => self.cycle_theme(),
            KeyCode::Char('r') => return Some(SyncCommand::Refresh),
            KeyCode::Char('n') => self.open_form(TaskForm {
                due: (Local::now() + Duration::days(1)).format(FORM_DUE_FORMAT).to_string(),
                ..TaskForm::default()
            }),
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(task) = self.selected(now) {
                    let form = edit_form(task);
                    self.open_form(form);
                }
            }
            KeyCode::Char(' ') => {
                return self.selected(now).map(|t| SyncCommand::SetCompleted(t.id.clone(), !t.completed));
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(task) = self.selected(now) {
                    self.ui.pending_delete = Some((task.id.clone(), task.title.clone()));
                    self.active_panel = Panel::ConfirmDelete;
                }
            }
            _ => {}
        }
        None
    }

    fn key_form(&mut self, key: KeyEvent) -> Option<SyncCommand> {
        match key.code {
            KeyCode::Esc   => { self.close_overlay(); return None; }
            KeyCode::Enter => return self.submit_form(),
            _ => {}
        }

        let form = &mut self.ui.form;
        match key.code {
            KeyCode::Tab     => form.field = form.field.next(),
            KeyCode::BackTab => form.field = form.field.prev(),
            KeyCode::Left  if form.field == FormField::Priority => form.priority = form.priority.prev(),
            KeyCode::Right if form.field == FormField::Priority => form.priority = form.priority.next(),
            KeyCode::Char(' ') if form.field == FormField::Priority => form.priority = form.priority.next(),
            KeyCode::Char(c) => {
                if let Some(text) = form.active_text() { text.push(c); }
            }
            KeyCode::Backspace => {
                if let Some(text) = form.active_text() { text.pop(); }
            }
            _ => {}
        }
        None
    }

    /// Validate the form; on failure keep it open with the reason shown.
    fn submit_form(&mut self) -> Option<SyncCommand> {
        let form  = &self.ui.form;
        let draft = TaskDraft::new(form.title.clone(), form.due.clone())
            .with_description(form.description.clone())
            .with_priority(form.priority);

        match draft.prepared() {
            Err(e) => {
                self.notify(NoticeKind::Error, e.to_string());
                None
            }
            Ok(draft) => {
                let cmd = match self.ui.form.editing.clone() {
                    Some((id, completed)) => SyncCommand::Update(id, TaskPatch::from_draft(draft, completed)),
                    None                  => SyncCommand::Create(draft),
                };
                self.close_overlay();
                Some(cmd)
            }
        }
    }

    fn key_confirm(&mut self, key: KeyEvent) -> Option<SyncCommand> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                let cmd = self.ui.pending_delete.take().map(|(id, _)| SyncCommand::Delete(id));
                self.close_overlay();
                cmd
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.close_overlay();
                None
            }
            _ => None,
        }
    }

    fn key_search(&mut self, key: KeyEvent, now: DateTime<Utc>) {
        match key.code {
            KeyCode::Esc => {
                self.query.search.clear();
                self.close_overlay();
            }
            KeyCode::Enter     => self.close_overlay(),
            KeyCode::Char(c)   => self.query.search.push(c),
            KeyCode::Backspace => { self.query.search.pop(); }
            _ => {}
        }
        self.clamp_cursor(now);
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn set_filter(&mut self, filter: TaskFilter, now: DateTime<Utc>) {
        self.query.filter = filter;
        self.cursor = 0;
        self.clamp_cursor(now);
    }

    fn clamp_cursor(&mut self, now: DateTime<Utc>) {
        let len = self.render(now).rows.len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    fn open_form(&mut self, form: TaskForm) {
        self.ui.form       = form;
        self.ui.input_mode = InputMode::Insert;
        self.active_panel  = Panel::Form;
    }

    fn close_overlay(&mut self) {
        self.ui.input_mode     = InputMode::Normal;
        self.ui.pending_delete = None;
        self.active_panel      = Panel::TaskList;
    }

    fn cycle_theme(&mut self) {
        let themes = ThemeConfig::all_themes();
        self.theme_idx = (self.theme_idx + 1) % themes.len();
        self.theme     = themes[self.theme_idx].clone();
        if let Err(e) = self.theme.save() {
            tracing::warn!("saving theme: {e}");
        }
    }
}

/// Form prefilled from `task`. A parseable due date is shown in local
/// minute precision; otherwise the raw text is kept for the user to fix.
fn edit_form(task: &Task) -> TaskForm {
    let due = match crate::tasks::due::parse_due(task) {
        Ok(d)  => d.with_timezone(&Local).format(EDIT_DUE_FORMAT).to_string(),
        Err(_) => crate::tasks::due::first_present(&task.due)
            .and_then(|(_, v)| v.as_str().map(str::to_owned))
            .unwrap_or_default(),
    };
    TaskForm {
        editing:     Some((task.id.clone(), task.completed)),
        title:       task.title.clone(),
        description: task.description.clone().unwrap_or_default(),
        due,
        priority:    task.priority,
        field:       FormField::Title,
    }
}
