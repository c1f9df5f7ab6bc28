use anyhow::Result;
use ratatui::style::Color;
use ratatui::widgets::BorderType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::config_dir;
use crate::model::Priority;
use crate::tasks::urgency::UrgencyState;

/// `#rrggbb` → RGB; anything else renders as the terminal default.
pub fn hex_to_color(hex: &str) -> Color {
    let h = hex.trim_start_matches('#');
    if h.len() != 6 || !h.is_ascii() { return Color::Reset; }
    let channel = |i: usize| u8::from_str_radix(&h[i..i + 2], 16).ok();
    match (channel(0), channel(2), channel(4)) {
        (Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
        _ => Color::Reset,
    }
}

fn default_border_style() -> String { "rounded".to_owned() }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeConfig {
    pub name: String,
    // Backgrounds
    pub bg_primary: String, pub bg_popup: String,
    // Borders
    pub border_normal: String, pub border_focused: String,
    // Text
    pub text_primary: String, pub text_muted: String, pub text_accent: String,
    pub selected_bg: String, pub selected_fg: String,
    // Urgency
    pub overdue: String, pub due_soon: String, pub completed: String, pub date_error: String,
    // Priority
    pub priority_high: String, pub priority_medium: String, pub priority_low: String,
    /// Border style: "rounded" | "double" | "thick" | "plain"
    #[serde(default = "default_border_style")]
    pub border_style: String,
}

impl ThemeConfig {
    // ── Color accessors ───────────────────────────────────────────────────────
    pub fn bg(&self)            -> Color { hex_to_color(&self.bg_primary) }
    pub fn popup_bg(&self)      -> Color { hex_to_color(&self.bg_popup) }
    pub fn border(&self)        -> Color { hex_to_color(&self.border_normal) }
    pub fn border_active(&self) -> Color { hex_to_color(&self.border_focused) }
    pub fn fg(&self)            -> Color { hex_to_color(&self.text_primary) }
    pub fn muted(&self)         -> Color { hex_to_color(&self.text_muted) }
    pub fn accent(&self)        -> Color { hex_to_color(&self.text_accent) }
    pub fn error(&self)         -> Color { hex_to_color(&self.overdue) }
    pub fn success(&self)       -> Color { hex_to_color(&self.completed) }

    pub fn selected_highlight(&self) -> (Color, Color) {
        (hex_to_color(&self.selected_bg), hex_to_color(&self.selected_fg))
    }

    pub fn urgency_color(&self, state: UrgencyState) -> Color {
        match state {
            UrgencyState::Overdue   => hex_to_color(&self.overdue),
            UrgencyState::DueSoon   => hex_to_color(&self.due_soon),
            UrgencyState::Completed => hex_to_color(&self.completed),
            UrgencyState::Unknown   => hex_to_color(&self.date_error),
            UrgencyState::Normal    => self.fg(),
        }
    }

    pub fn priority_color(&self, priority: Priority) -> Color {
        match priority {
            Priority::High   => hex_to_color(&self.priority_high),
            Priority::Medium => hex_to_color(&self.priority_medium),
            Priority::Low    => hex_to_color(&self.priority_low),
        }
    }

    pub fn border_type(&self) -> BorderType {
        match self.border_style.as_str() {
            "double" => BorderType::Double,
            "thick"  => BorderType::Thick,
            "plain"  => BorderType::Plain,
            _        => BorderType::Rounded,
        }
    }

    // ── Persistence ───────────────────────────────────────────────────────────
    pub fn load() -> Result<Self> {
        let path = theme_path();
        if path.exists() {
            Ok(toml::from_str(&std::fs::read_to_string(&path)?)?)
        } else {
            let t = ThemeConfig::default();
            t.save()?;
            Ok(t)
        }
    }

    pub fn save(&self) -> Result<()> {
        let dir = config_dir();
        std::fs::create_dir_all(&dir)?;
        std::fs::write(theme_path(), toml::to_string_pretty(self)?)?;
        Ok(())
    }

    // ── Theme catalogue ───────────────────────────────────────────────────────
    pub fn all_themes() -> Vec<ThemeConfig> {
        vec![
            ThemeConfig::default(),    // Catppuccin Mocha
            ThemeConfig::nord(),
            ThemeConfig::gruvbox(),
            ThemeConfig::dracula(),
        ]
    }

    /// Position of this theme in [`all_themes`](Self::all_themes), 0 for custom ones.
    pub fn catalogue_index(&self) -> usize {
        Self::all_themes().iter().position(|t| t.name == self.name).unwrap_or(0)
    }

    // ── Built-in themes ───────────────────────────────────────────────────────

    pub fn nord() -> Self { Self {
        name: "nord".into(),
        bg_primary: "#2e3440".into(), bg_popup: "#434c5e".into(),
        border_normal: "#4c566a".into(), border_focused: "#88c0d0".into(),
        text_primary: "#eceff4".into(), text_muted: "#616e88".into(), text_accent: "#88c0d0".into(),
        selected_bg: "#81a1c1".into(), selected_fg: "#2e3440".into(),
        overdue: "#bf616a".into(), due_soon: "#ebcb8b".into(),
        completed: "#a3be8c".into(), date_error: "#d08770".into(),
        priority_high: "#bf616a".into(), priority_medium: "#ebcb8b".into(), priority_low: "#8fbcbb".into(),
        border_style: "rounded".into(),
    }}

    pub fn gruvbox() -> Self { Self {
        name: "gruvbox".into(),
        bg_primary: "#282828".into(), bg_popup: "#3c3836".into(),
        border_normal: "#504945".into(), border_focused: "#d79921".into(),
        text_primary: "#ebdbb2".into(), text_muted: "#7c6f64".into(), text_accent: "#d79921".into(),
        selected_bg: "#689d6a".into(), selected_fg: "#282828".into(),
        overdue: "#fb4934".into(), due_soon: "#fabd2f".into(),
        completed: "#b8bb26".into(), date_error: "#fe8019".into(),
        priority_high: "#fb4934".into(), priority_medium: "#fabd2f".into(), priority_low: "#83a598".into(),
        border_style: "plain".into(),
    }}

    pub fn dracula() -> Self { Self {
        name: "dracula".into(),
        bg_primary: "#282a36".into(), bg_popup: "#44475a".into(),
        border_normal: "#6272a4".into(), border_focused: "#bd93f9".into(),
        text_primary: "#f8f8f2".into(), text_muted: "#6272a4".into(), text_accent: "#bd93f9".into(),
        selected_bg: "#ff79c6".into(), selected_fg: "#282a36".into(),
        overdue: "#ff5555".into(), due_soon: "#f1fa8c".into(),
        completed: "#50fa7b".into(), date_error: "#ffb86c".into(),
        priority_high: "#ff5555".into(), priority_medium: "#f1fa8c".into(), priority_low: "#8be9fd".into(),
        border_style: "double".into(),
    }}
}

impl Default for ThemeConfig {
    fn default() -> Self { Self {
        name: "catppuccin-mocha".into(),
        bg_primary: "#1e1e2e".into(), bg_popup: "#313244".into(),
        border_normal: "#45475a".into(), border_focused: "#89b4fa".into(),
        text_primary: "#cdd6f4".into(), text_muted: "#6c7086".into(), text_accent: "#89b4fa".into(),
        selected_bg: "#89b4fa".into(), selected_fg: "#1e1e2e".into(),
        overdue: "#f38ba8".into(), due_soon: "#f9e2af".into(),
        completed: "#a6e3a1".into(), date_error: "#fab387".into(),
        priority_high: "#f38ba8".into(), priority_medium: "#f9e2af".into(), priority_low: "#94e2d5".into(),
        border_style: "rounded".into(),
    }}
}

fn theme_path() -> PathBuf { config_dir().join("theme.toml") }
