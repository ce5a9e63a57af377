use std::path::PathBuf;

use ratatui::style::{Color, Modifier, Style};

use podium_core::log_debug;

pub(crate) struct UiTheme {
    pub(crate) base: Style,
    pub(crate) bar: Style,
    pub(crate) border: Style,
    pub(crate) title: Style,
    pub(crate) table_header: Style,
    pub(crate) focus: Style,
    pub(crate) label: Style,
    pub(crate) label_focus: Style,
    pub(crate) accent: Style,
    pub(crate) warn: Style,
}

impl UiTheme {
    pub(crate) fn from_name(name: &str) -> Self {
        match name {
            "midnight" => Self::midnight(),
            _ => Self::default_theme(),
        }
    }

    fn default_theme() -> Self {
        Self {
            base: Style::default(),
            bar: Style::default().fg(Color::Black).bg(Color::Cyan),
            border: Style::default(),
            title: Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            table_header: Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::BOLD),
            focus: Style::default().bg(Color::DarkGray),
            label: Style::default().fg(Color::Gray),
            label_focus: Style::default().fg(Color::Yellow),
            accent: Style::default().fg(Color::Cyan),
            warn: Style::default().fg(Color::Yellow),
        }
    }

    fn midnight() -> Self {
        let ink = Color::Rgb(205, 214, 244);
        let night = Color::Rgb(17, 17, 27);
        let panel = Color::Rgb(30, 30, 46);
        let gold = Color::Rgb(249, 226, 175);
        let sky = Color::Rgb(137, 220, 235);
        Self {
            base: Style::default().fg(ink).bg(night),
            bar: Style::default().fg(night).bg(sky),
            border: Style::default().fg(panel),
            title: Style::default()
                .fg(night)
                .bg(sky)
                .add_modifier(Modifier::BOLD),
            table_header: Style::default().fg(sky).add_modifier(Modifier::BOLD),
            focus: Style::default().bg(panel),
            label: Style::default().fg(Color::Rgb(108, 112, 134)),
            label_focus: Style::default().fg(gold),
            accent: Style::default().fg(sky),
            warn: Style::default().fg(gold),
        }
    }
}

pub(crate) fn load_ui_theme() -> UiTheme {
    let name = match load_config_text() {
        Some(content) => theme_name_from(&content),
        None => "default".to_string(),
    };
    UiTheme::from_name(&name)
}

fn theme_name_from(content: &str) -> String {
    let value: toml::Value = match toml::from_str(content) {
        Ok(value) => value,
        Err(_) => {
            log_debug("config warn: invalid podium.toml, using default theme");
            return "default".to_string();
        }
    };
    value
        .get("ui")
        .and_then(|ui| ui.get("theme"))
        .and_then(|v| v.as_str())
        .unwrap_or("default")
        .to_string()
}

fn load_config_text() -> Option<String> {
    let mut candidates = vec![PathBuf::from("podium.toml")];
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")));
    if let Some(base) = base {
        candidates.push(base.join("podium").join("podium.toml"));
    }
    candidates
        .into_iter()
        .find_map(|path| std::fs::read_to_string(path).ok())
}
