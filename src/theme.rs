use crate::model::ApplicationStatus;
use ratatui::style::{Color, Modifier, Style};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ThemeMode {
    #[allow(dead_code)]
    Light,
    Dark,
}

#[derive(Clone, Debug)]
pub struct Theme {
    #[allow(dead_code)]
    pub mode: ThemeMode,
    pub bg: Color,
    pub fg: Color,
    pub accent: Color,
    pub frame: Color,
    pub selected: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub muted: Color,
}

impl Theme {
    pub fn ledger_dark() -> Self {
        Self {
            mode: ThemeMode::Dark,
            bg: Color::Rgb(22, 26, 29),
            fg: Color::White,
            accent: Color::Rgb(64, 160, 255),
            frame: Color::Rgb(90, 96, 104),
            selected: Color::Rgb(255, 170, 0),
            success: Color::Green,
            warning: Color::Rgb(230, 180, 60),
            error: Color::Red,
            muted: Color::DarkGray,
        }
    }

    #[allow(dead_code)]
    pub fn ledger_light() -> Self {
        Self {
            mode: ThemeMode::Light,
            bg: Color::Rgb(245, 246, 248),
            fg: Color::Rgb(22, 24, 26),
            accent: Color::Rgb(30, 110, 210),
            frame: Color::Rgb(196, 200, 208),
            selected: Color::Rgb(200, 120, 0),
            success: Color::Rgb(0, 140, 0),
            warning: Color::Rgb(170, 120, 20),
            error: Color::Rgb(190, 0, 0),
            muted: Color::Rgb(120, 124, 132),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::ledger_dark()
    }
}

// Style helpers that use the theme
impl Theme {
    pub fn border_focused(&self) -> Style {
        Style::default().fg(self.selected)
    }

    pub fn border_unfocused(&self) -> Style {
        Style::default().fg(self.frame)
    }

    pub fn text_active_bold(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text_editing_bold(&self) -> Style {
        Style::default()
            .fg(self.selected)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text_muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn text_error(&self) -> Style {
        Style::default().fg(self.error)
    }

    pub fn text_success(&self) -> Style {
        Style::default().fg(self.success)
    }

    pub fn list_cursor_style(&self) -> Style {
        Style::default()
            .fg(self.bg)
            .bg(self.selected)
            .add_modifier(Modifier::BOLD)
    }

    pub fn status_color(&self, status: ApplicationStatus) -> Color {
        match status {
            ApplicationStatus::Pending => self.warning,
            ApplicationStatus::Registered => self.accent,
            ApplicationStatus::Approved => self.success,
            ApplicationStatus::Rejected => self.error,
        }
    }

    pub fn toast_color(&self, level: crate::ui::ToastLevel) -> Color {
        match level {
            crate::ui::ToastLevel::Success => self.success,
            crate::ui::ToastLevel::Error => self.error,
            crate::ui::ToastLevel::Info => self.accent,
        }
    }
}

// Shared shorthands for widgets that render without a theme handle
pub const ACCENT: Color = Color::Rgb(64, 160, 255);
pub const MUTED: Color = Color::DarkGray;

// Legacy helper functions that use the default theme
pub fn border_focused() -> Style {
    Theme::default().border_focused()
}

pub fn text_muted() -> Style {
    Theme::default().text_muted()
}

pub fn text_error() -> Style {
    Theme::default().text_error()
}

pub fn list_cursor_style() -> Style {
    Theme::default().list_cursor_style()
}
