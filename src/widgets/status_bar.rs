use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::*;

use crate::ui::AppState;

pub const SPINNER: [&str; 6] = ["⠋", "⠙", "⠸", "⠴", "⠦", "⠇"];

fn status_spans(state: &AppState) -> Vec<Span<'static>> {
    let mut spans: Vec<Span> = Vec::new();
    if let Some(msg) = &state.status_text {
        let spinner = SPINNER[state.tick as usize % SPINNER.len()];
        spans.push(Span::raw(format!(" {spinner} {msg}")));
    }
    if let Some(t) = &state.toast {
        if !spans.is_empty() {
            spans.push(Span::raw("  |  "));
        }
        let color = state.theme.toast_color(t.level);
        let tag = match t.level {
            crate::ui::ToastLevel::Success => "[OK]",
            crate::ui::ToastLevel::Error => "[ERROR]",
            crate::ui::ToastLevel::Info => "[INFO]",
        };
        spans.push(Span::styled(
            format!("{tag} "),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(t.text.clone(), Style::default().fg(color)));
    }
    if matches!(state.view, crate::ui::View::Register) {
        if !spans.is_empty() {
            spans.push(Span::raw("  |  "));
        }
        let focus = match state.panel_focus {
            crate::ui::PanelPane::A => "address",
            crate::ui::PanelPane::B => "form",
        };
        spans.push(Span::styled(
            format!("focus: {focus}"),
            Style::default().fg(Color::Magenta),
        ));
        if let Some(reg) = &state.register {
            if reg.form.form.editing {
                spans.push(Span::raw("  |  editing"));
            }
        }
    }
    if !state.session.authenticated() {
        if !spans.is_empty() {
            spans.push(Span::raw("  |  "));
        }
        spans.push(Span::styled(
            "not signed in",
            Style::default().fg(state.theme.warning),
        ));
    }
    spans
}

pub fn draw_footer_combined(f: &mut Frame, area: Rect, state: &AppState, help_text: &str) {
    let mut spans = status_spans(state);
    if !spans.is_empty() {
        spans.push(Span::raw("  |  "));
    }
    spans.push(Span::styled(
        help_text.to_string(),
        Style::default().fg(Color::DarkGray),
    ));
    let p = Paragraph::new(Line::from(spans));
    f.render_widget(p, area);
}
