use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::ui::AppState;

/// Top banner: centered logo (or the configured header text) over a bottom
/// border that picks up the accent color while a load is running.
pub fn draw_header(f: &mut Frame, area: Rect, state: &AppState) {
    let border = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(if state.status_text.is_some() {
            state.theme.accent
        } else {
            state.theme.muted
        }));
    let inner = border.inner(area);
    f.render_widget(border, area);

    let logo = if state.logo_lines.is_empty() {
        vec![
            String::new(),
            state
                .config
                .header
                .clone()
                .unwrap_or_else(|| "taxreg-tui".to_string()),
            String::new(),
        ]
    } else {
        state.logo_lines.clone()
    };
    let lw = logo
        .iter()
        .map(|s| s.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let lx = if inner.width > lw {
        inner.x + (inner.width - lw) / 2
    } else {
        inner.x
    };
    let style = Style::default()
        .fg(state.theme.fg)
        .add_modifier(Modifier::BOLD);
    for (i, s) in logo.iter().enumerate() {
        let row = Rect {
            x: lx,
            y: inner.y.saturating_add(i as u16),
            width: lw.min(inner.width),
            height: 1,
        };
        if row.y >= inner.y + inner.height {
            break;
        }
        f.render_widget(Paragraph::new(Line::from(Span::styled(s.clone(), style))), row);
    }
}
