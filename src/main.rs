use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use taskboard::app::App;
use taskboard::config::AppConfig;
use taskboard::model::{Priority, TaskDraft, TaskId};
use taskboard::sync::http::HttpTaskSource;
use taskboard::sync::worker::SyncWorker;
use taskboard::sync::{submit_draft, TaskSource};
use taskboard::tasks::diagnostics::{DiagnosticSink, Silent, TracingSink};
use taskboard::tasks::view::{SortKey, TaskFilter, ViewEngine};
use taskboard::theme::ThemeConfig;

#[derive(Debug, Parser)]
#[command(name = "tb", version, about = "Terminal board for a remote task service")]
struct Cli {
    /// Runs the interactive board when omitted
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the task list with urgency and statistics
    List {
        /// all, pending, completed, overdue or dueSoon
        #[arg(long)]
        filter: Option<TaskFilter>,
        /// dueDate, priority or title
        #[arg(long)]
        sort: Option<SortKey>,
        /// Case-insensitive match on title and description
        #[arg(long)]
        search: Option<String>,
    },
    /// Create a task
    Add {
        title: String,
        /// Combined date-time, e.g. 2025-03-15T09:30
        due: String,
        /// HIGH, MEDIUM or LOW
        #[arg(long, default_value_t = Priority::Medium)]
        priority: Priority,
        #[arg(long)]
        description: Option<String>,
    },
    /// Mark a task completed
    Done { id: String },
    /// Mark a task pending again
    Undo { id: String },
    /// Delete a task
    Rm { id: String },
    /// Check that the task service is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = AppConfig::load()?;

    let Some(command) = cli.command else {
        return run_tui(cfg).await;
    };
    init_stderr_logging(&cfg);
    match command {
        Command::List { filter, sort, search } => cmd_list(&cfg, filter, sort, search).await,
        Command::Add { title, due, priority, description } => {
            cmd_add(&cfg, title, due, priority, description).await
        }
        Command::Done { id } => cmd_set_completed(&cfg, &id, true).await,
        Command::Undo { id } => cmd_set_completed(&cfg, &id, false).await,
        Command::Rm { id }   => cmd_rm(&cfg, &id).await,
        Command::Health      => cmd_health(&cfg).await,
    }
}

// ─── Logging ──────────────────────────────────────────────────────────────────

fn env_filter(cfg: &AppConfig) -> EnvFilter {
    let default = if cfg.log.trace_classification { "info,taskboard=debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Logging to stderr so it doesn't interfere with command output.
fn init_stderr_logging(cfg: &AppConfig) {
    tracing_subscriber::registry()
        .with(env_filter(cfg))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ─── One-shot commands ────────────────────────────────────────────────────────

fn source(cfg: &AppConfig) -> Result<HttpTaskSource> {
    Ok(HttpTaskSource::new(&cfg.server)?)
}

async fn cmd_list(
    cfg:    &AppConfig,
    filter: Option<TaskFilter>,
    sort:   Option<SortKey>,
    search: Option<String>,
) -> Result<()> {
    let mut query = cfg.view.query();
    if let Some(f) = filter { query.filter = f; }
    if let Some(s) = sort   { query.sort   = s; }
    if let Some(q) = search { query.search = q; }

    let tasks = source(cfg)?.fetch_all().await
        .with_context(|| format!("loading tasks from {}", cfg.server.base_url))?;

    let sink: &dyn DiagnosticSink = if cfg.log.trace_classification { &TracingSink } else { &Silent };
    let pass = ViewEngine::with_sink(sink).render(&tasks, &query, Utc::now());

    for row in &pass.rows {
        let t = row.task;
        println!(
            "{:>5}  {}  {:<6}  {:<32}  {:<24}  {:<18}  {}",
            t.id.to_string(),
            if t.completed { "[x]" } else { "[ ]" },
            t.priority.as_str(),
            t.title,
            row.formatted_due_date,
            row.relative_due_text.as_deref().unwrap_or(""),
            row.urgency.badge().unwrap_or(""),
        );
    }
    if pass.rows.is_empty() {
        println!("(no tasks match)");
    }

    let s = pass.stats;
    println!(
        "\n{} due soon · {} overdue · {} completed · {} pending · {} total",
        s.due_soon, s.overdue, s.completed, s.pending, s.total,
    );
    if s.unknown > 0 {
        println!("{} task(s) have no readable due date", s.unknown);
    }
    Ok(())
}

async fn cmd_add(
    cfg:         &AppConfig,
    title:       String,
    due:         String,
    priority:    Priority,
    description: Option<String>,
) -> Result<()> {
    let mut draft = TaskDraft::new(title, due).with_priority(priority);
    if let Some(d) = description {
        draft = draft.with_description(d);
    }

    let task = submit_draft(&source(cfg)?, draft).await?;
    println!("Created task {}: {}", task.id, task.title);
    Ok(())
}

async fn cmd_set_completed(cfg: &AppConfig, id: &str, completed: bool) -> Result<()> {
    let id = TaskId::from(id);
    let task = source(cfg)?.set_completed(&id, completed).await?;
    println!("{} task {}: {}", if completed { "Completed" } else { "Reopened" }, task.id, task.title);
    Ok(())
}

async fn cmd_rm(cfg: &AppConfig, id: &str) -> Result<()> {
    let id = TaskId::from(id);
    source(cfg)?.delete(&id).await?;
    println!("Deleted task {id}");
    Ok(())
}

async fn cmd_health(cfg: &AppConfig) -> Result<()> {
    let message = source(cfg)?.health().await?;
    println!("{}: {message}", cfg.server.base_url);
    Ok(())
}

// ─── TUI ─────────────────────────────────────────────────────────────────────

async fn run_tui(cfg: AppConfig) -> Result<()> {
    let log_dir = dirs::data_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("taskboard");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "taskboard.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(env_filter(&cfg))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    tracing::info!(base_url = %cfg.server.base_url, "Starting taskboard");

    let theme = ThemeConfig::load().unwrap_or_else(|e| {
        tracing::warn!("theme: {e}; using the default");
        ThemeConfig::default()
    });
    let worker = SyncWorker::spawn(source(&cfg)?, cfg.sync.refresh_interval());

    let mut app = App::new(theme, cfg.view.query());
    app.trace_classification = cfg.log.trace_classification;
    app.attach_sync_worker(worker);

    app.run().await?;
    Ok(())
}
