use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{block::Title, Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, NoticeKind, Panel};
use crate::model::{Priority, TaskId};
use crate::tasks::urgency::UrgencyState;
use crate::tasks::view::{RenderPass, TaskFilter, ViewRow};

// ─── UI enums / state ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum InputMode { #[default] Normal, Insert }

/// Focused field of the task form.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    #[default]
    Title,
    Description,
    Due,
    Priority,
}

impl FormField {
    pub fn next(self) -> Self {
        match self {
            FormField::Title       => FormField::Description,
            FormField::Description => FormField::Due,
            FormField::Due         => FormField::Priority,
            FormField::Priority    => FormField::Title,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            FormField::Title       => FormField::Priority,
            FormField::Description => FormField::Title,
            FormField::Due         => FormField::Description,
            FormField::Priority    => FormField::Due,
        }
    }
}

/// New/edit task form. `editing` is set when the form edits an existing task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskForm {
    pub editing:     Option<(TaskId, bool)>,
    pub title:       String,
    pub description: String,
    pub due:         String,
    pub priority:    Priority,
    pub field:       FormField,
}

impl TaskForm {
    /// The text buffer behind the focused field, if it has one.
    pub fn active_text(&mut self) -> Option<&mut String> {
        match self.field {
            FormField::Title       => Some(&mut self.title),
            FormField::Description => Some(&mut self.description),
            FormField::Due         => Some(&mut self.due),
            FormField::Priority    => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub input_mode:     InputMode,
    pub form:           TaskForm,
    /// Task awaiting delete confirmation: id and title.
    pub pending_delete: Option<(TaskId, String)>,
}

// ─── Root draw ────────────────────────────────────────────────────────────────

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();
    let pass = app.render(chrono::Utc::now());

    f.render_widget(
        Block::default().style(Style::default().bg(app.theme.bg()).fg(app.theme.fg())),
        area,
    );

    // [ stats(3) | filters(1) | tasks | status_bar(1) ]
    let root = Layout::default().direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ]).split(area);

    draw_stats(f, app, &pass, root[0]);
    draw_filters(f, app, root[1]);
    draw_tasks(f, app, &pass, root[2]);
    draw_statusbar(f, app, root[3]);

    match app.active_panel {
        Panel::Form          => draw_form(f, area, app),
        Panel::ConfirmDelete => draw_confirm(f, area, app),
        Panel::Help          => draw_help(f, area, app),
        Panel::TaskList | Panel::Search => {}
    }
    draw_notification(f, area, app);
}

// ─── Statistics header ────────────────────────────────────────────────────────

fn draw_stats(f: &mut Frame, app: &App, pass: &RenderPass<'_>, area: Rect) {
    let t = &app.theme;
    let s = pass.stats;
    let block = Block::default()
        .title(Title::from(Line::from(Span::styled(
            " Task Board ",
            Style::default().fg(t.accent()).add_modifier(Modifier::BOLD),
        ))))
        .borders(Borders::ALL)
        .border_type(t.border_type())
        .border_style(Style::default().fg(t.border()))
        .style(Style::default().bg(t.bg()));

    let counter = |label: &'static str, n: usize, color| vec![
        Span::styled(format!(" {n} "), Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(format!("{label}   "), Style::default().fg(t.muted())),
    ];

    let mut spans = Vec::new();
    spans.extend(counter("due soon", s.due_soon, t.urgency_color(UrgencyState::DueSoon)));
    spans.extend(counter("overdue", s.overdue, t.urgency_color(UrgencyState::Overdue)));
    spans.extend(counter("completed", s.completed, t.urgency_color(UrgencyState::Completed)));
    spans.extend(counter("pending", s.pending, t.fg()));
    spans.extend(counter("total", s.total, t.accent()));
    if s.unknown > 0 {
        spans.extend(counter("undated", s.unknown, t.urgency_color(UrgencyState::Unknown)));
    }

    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

// ─── Filter / sort / search bar ───────────────────────────────────────────────

fn draw_filters(f: &mut Frame, app: &App, area: Rect) {
    let t = &app.theme;
    let (sel_bg, sel_fg) = t.selected_highlight();
    let mut spans: Vec<Span> = TaskFilter::ALL.iter().enumerate().map(|(i, filter)| {
        let label = format!(" {}:{} ", i + 1, filter.label());
        if *filter == app.query.filter {
            Span::styled(label, Style::default().bg(sel_bg).fg(sel_fg).add_modifier(Modifier::BOLD))
        } else {
            Span::styled(label, Style::default().fg(t.muted()))
        }
    }).collect();

    spans.push(Span::styled(
        format!("   sort: {}", app.query.sort),
        Style::default().fg(t.accent()),
    ));

    let searching = app.active_panel == Panel::Search;
    if searching || !app.query.search.is_empty() {
        spans.push(Span::styled("   /", Style::default().fg(t.muted())));
        spans.push(Span::styled(
            format!("{}{}", app.query.search, if searching { "█" } else { "" }),
            Style::default().fg(t.fg()),
        ));
    }

    f.render_widget(Paragraph::new(Line::from(spans)).style(Style::default().bg(t.bg())), area);
}

// ─── Task list ────────────────────────────────────────────────────────────────

fn draw_tasks(f: &mut Frame, app: &App, pass: &RenderPass<'_>, area: Rect) {
    let t       = &app.theme;
    let focused = app.active_panel == Panel::TaskList;
    let bs      = Style::default().fg(if focused { t.border_active() } else { t.border() });
    let title   = Line::from(Span::styled(
        format!(" {} ({}) ", app.query.filter.label(), pass.rows.len()),
        Style::default().fg(t.accent()),
    ));

    let block = Block::default()
        .title(Title::from(title))
        .borders(Borders::ALL)
        .border_type(t.border_type())
        .border_style(bs)
        .style(Style::default().bg(t.bg()));

    if pass.rows.is_empty() {
        let hint = if app.tasks.is_empty() { "  No tasks yet. Press n to add one." } else { "  No tasks match" };
        f.render_widget(Paragraph::new(hint).block(block).style(Style::default().fg(t.muted())), area);
        return;
    }

    let items: Vec<ListItem> = pass.rows.iter().enumerate()
        .map(|(i, row)| task_item(app, row, i == app.cursor && focused))
        .collect();

    let mut state = ListState::default();
    state.select(Some(app.cursor.min(pass.rows.len() - 1)));
    f.render_stateful_widget(List::new(items).block(block).highlight_symbol("▶ "), area, &mut state);
}

fn task_item<'a>(app: &App, row: &ViewRow<'a>, selected: bool) -> ListItem<'a> {
    let t    = &app.theme;
    let task = row.task;

    let check = if task.completed { " ✔ " } else { " ○ " };
    let (sel_bg, sel_fg) = t.selected_highlight();
    let title_style = if selected {
        Style::default().bg(sel_bg).fg(sel_fg).add_modifier(Modifier::BOLD)
    } else if task.completed {
        Style::default().fg(t.muted()).add_modifier(Modifier::CROSSED_OUT)
    } else {
        Style::default().fg(t.fg())
    };

    let mut head = vec![
        Span::styled(check, Style::default().fg(t.urgency_color(row.urgency))),
        Span::styled(task.title.clone(), title_style),
        Span::raw("  "),
        Span::styled(
            format!("[{}]", task.priority),
            Style::default().fg(t.priority_color(task.priority)),
        ),
    ];
    if let Some(badge) = row.urgency.badge() {
        head.push(Span::styled(
            format!("  {badge}"),
            Style::default().fg(t.urgency_color(row.urgency)).add_modifier(Modifier::BOLD),
        ));
    }

    let mut detail = vec![
        Span::raw("     "),
        Span::styled(row.formatted_due_date.clone(), Style::default().fg(t.muted())),
    ];
    if let Some(rel) = &row.relative_due_text {
        detail.push(Span::styled(format!("  ({rel})"), Style::default().fg(t.urgency_color(row.urgency))));
    }
    detail.push(Span::styled(
        format!("  {}", task.description_or_placeholder()),
        Style::default().fg(t.muted()).add_modifier(Modifier::ITALIC),
    ));

    ListItem::new(Text::from(vec![Line::from(head), Line::from(detail)]))
}

// ─── Status bar ───────────────────────────────────────────────────────────────

fn draw_statusbar(f: &mut Frame, app: &App, area: Rect) {
    let t = &app.theme;
    let (mode_str, mode_style) = match app.ui.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(t.accent()).fg(t.bg()).add_modifier(Modifier::BOLD)),
        InputMode::Insert => (" INSERT ", Style::default().bg(t.success()).fg(t.bg()).add_modifier(Modifier::BOLD)),
    };
    let keys = match app.active_panel {
        Panel::Form          => "  Tab:next field  ←→:priority  Enter:save  Esc:cancel",
        Panel::Search        => "  type to filter  Enter:keep  Esc:clear",
        Panel::ConfirmDelete => "  y:delete  n:keep",
        Panel::TaskList | Panel::Help =>
            "  j/k:move  1-5:filter  s:sort  /:search  n:new  e:edit  Space:done  d:del  r:refresh  ?:help  q:quit",
    };
    let bar = Paragraph::new(Line::from(vec![
        Span::styled(mode_str, mode_style),
        Span::styled(keys, Style::default().fg(t.muted())),
        Span::styled(
            format!("  {}", app.sync_status),
            Style::default().fg(t.muted()).add_modifier(Modifier::ITALIC),
        ),
    ])).style(Style::default().bg(t.popup_bg()));
    f.render_widget(bar, area);
}

// ─── Task form ────────────────────────────────────────────────────────────────

fn draw_form(f: &mut Frame, area: Rect, app: &App) {
    let t    = &app.theme;
    let form = &app.ui.form;
    let rect = centered(64, 50, area);
    f.render_widget(Clear, rect);

    let heading = if form.editing.is_some() { " Edit Task " } else { " New Task " };
    let block = popup_block(app, heading);
    let inner = block.inner(rect);
    f.render_widget(block, rect);

    let acc = Style::default().fg(t.accent()).add_modifier(Modifier::BOLD);
    let dim = Style::default().fg(t.muted());
    let fg  = Style::default().fg(t.fg());

    let field_line = |field: FormField, label: &'static str, value: String| {
        let active = form.field == field;
        let prefix = if active { format!("▶ {label:<12}") } else { format!("  {label:<12}") };
        let cursor = if active && field != FormField::Priority { "█" } else { "" };
        Line::from(vec![
            Span::styled(prefix, if active { acc } else { dim }),
            Span::styled(format!("{value}{cursor}"), if active { fg } else { dim }),
        ])
    };

    let priority = Priority::ALL.iter()
        .map(|p| if *p == form.priority { format!("[{p}]") } else { format!(" {p} ") })
        .collect::<Vec<_>>()
        .join(" ");

    let lines = vec![
        Line::from(""),
        field_line(FormField::Title, "Title", form.title.clone()),
        Line::from(""),
        field_line(FormField::Description, "Description", form.description.clone()),
        Line::from(""),
        field_line(FormField::Due, "Due", form.due.clone()),
        Line::from(Span::styled("                YYYY-MM-DDTHH:MM", dim)),
        Line::from(""),
        field_line(FormField::Priority, "Priority", priority),
        Line::from(""),
        Line::from(Span::styled("  Tab: next field   Enter: save   Esc: cancel", dim)),
    ];

    f.render_widget(Paragraph::new(lines).style(Style::default().bg(t.popup_bg())), inner);
}

// ─── Delete confirmation ──────────────────────────────────────────────────────

fn draw_confirm(f: &mut Frame, area: Rect, app: &App) {
    let t    = &app.theme;
    let rect = centered(50, 20, area);
    f.render_widget(Clear, rect);

    let title = app.ui.pending_delete.as_ref().map_or("", |(_, title)| title.as_str());
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(format!("Delete \"{title}\"?"), Style::default().fg(t.fg()))),
        Line::from(""),
        Line::from(Span::styled("y: delete    n / Esc: keep", Style::default().fg(t.muted()))),
    ];
    f.render_widget(
        Paragraph::new(lines).block(popup_block(app, " Confirm ")).alignment(Alignment::Center),
        rect,
    );
}

// ─── Notification toast ───────────────────────────────────────────────────────

fn draw_notification(f: &mut Frame, area: Rect, app: &App) {
    let Some(note) = &app.notification else { return; };
    let t     = &app.theme;
    let width = u16::try_from(note.message.chars().count() + 4).unwrap_or(u16::MAX).min(area.width);
    let rect  = Rect { x: area.width.saturating_sub(width), y: 0, width, height: 3u16.min(area.height) };
    let color = match note.kind {
        NoticeKind::Info  => t.success(),
        NoticeKind::Error => t.error(),
    };
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(note.message.as_str())
            .block(Block::default().borders(Borders::ALL).border_type(t.border_type())
                .border_style(Style::default().fg(color)))
            .style(Style::default().bg(t.popup_bg()).fg(color)),
        rect,
    );
}

// ─── Help overlay ────────────────────────────────────────────────────────────

fn draw_help(f: &mut Frame, area: Rect, app: &App) {
    let t    = &app.theme;
    let rect = centered(64, 80, area);
    f.render_widget(Clear, rect);

    let accent = Style::default().fg(t.accent()).add_modifier(Modifier::BOLD);
    let dim    = Style::default().fg(t.muted());
    let lines  = vec![
        Line::from(""),
        Line::from(Span::styled("  Navigation", accent)),
        Line::from(Span::styled("  j/k  ↓↑            Move selection", dim)),
        Line::from(Span::styled("  g / G              First / last task", dim)),
        Line::from(""),
        Line::from(Span::styled("  View", accent)),
        Line::from(Span::styled("  1-5                All / Pending / Completed / Overdue / Due Soon", dim)),
        Line::from(Span::styled("  s                  Cycle sort: due date → priority → title", dim)),
        Line::from(Span::styled("  /                  Search title and description", dim)),
        Line::from(Span::styled("  T                  Cycle theme", dim)),
        Line::from(""),
        Line::from(Span::styled("  Tasks", accent)),
        Line::from(Span::styled("  n                  New task", dim)),
        Line::from(Span::styled("  e / Enter          Edit selected task", dim)),
        Line::from(Span::styled("  Space              Toggle complete", dim)),
        Line::from(Span::styled("  d / Del            Delete (asks first)", dim)),
        Line::from(Span::styled("  r                  Reload from server", dim)),
        Line::from(""),
        Line::from(Span::styled("  General", accent)),
        Line::from(Span::styled("  ?                  Toggle help", dim)),
        Line::from(Span::styled("  Esc                Cancel / back", dim)),
        Line::from(Span::styled("  q                  Quit", dim)),
    ];

    f.render_widget(
        Paragraph::new(lines).block(popup_block(app, " Keyboard Shortcuts "))
            .style(Style::default().fg(t.fg()))
            .wrap(Wrap { trim: false }),
        rect,
    );
}

// ─── Utilities ────────────────────────────────────────────────────────────────

fn popup_block<'a>(app: &App, title: &'a str) -> Block<'a> {
    let t = &app.theme;
    Block::default()
        .title(Title::from(Line::from(Span::styled(
            title,
            Style::default().fg(t.accent()).add_modifier(Modifier::BOLD),
        ))))
        .borders(Borders::ALL)
        .border_type(t.border_type())
        .border_style(Style::default().fg(t.border_active()))
        .style(Style::default().bg(t.popup_bg()))
}

fn centered(pct_x: u16, pct_y: u16, r: Rect) -> Rect {
    let vert = Layout::default().direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - pct_y) / 2),
            Constraint::Percentage(pct_y),
            Constraint::Percentage((100 - pct_y) / 2),
        ]).split(r);
    Layout::default().direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - pct_x) / 2),
            Constraint::Percentage(pct_x),
            Constraint::Percentage((100 - pct_x) / 2),
        ]).split(vert[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_fields_cycle_both_ways() {
        let mut field = FormField::Title;
        for _ in 0..4 { field = field.next(); }
        assert_eq!(field, FormField::Title);
        assert_eq!(FormField::Title.prev(), FormField::Priority);
    }

    #[test]
    fn priority_field_has_no_text_buffer() {
        let mut form = TaskForm { field: FormField::Priority, ..TaskForm::default() };
        assert!(form.active_text().is_none());
        form.field = FormField::Due;
        form.active_text().unwrap().push('x');
        assert_eq!(form.due, "x");
    }
}
