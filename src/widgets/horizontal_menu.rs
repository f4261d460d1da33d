use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Tabs};

use crate::ui::AppState;

pub fn draw_horizontal_menu(f: &mut Frame, area: Rect, state: &AppState) {
    let theme = &state.theme;
    let current_index = state.horizontal_tab_index;

    let mut titles: Vec<Line> = Vec::new();
    if state.config.horizontal_menu.is_empty() {
        titles.push(tab_line("F1", "Main", current_index == 0, theme));
    } else {
        for (i, item) in state.config.horizontal_menu.iter().enumerate() {
            let fn_key = format!("F{}", i + 1);
            titles.push(tab_line(&fn_key, &item.title, i == current_index, theme));
        }
    }

    let tabs = Tabs::new(titles)
        .select(current_index)
        .style(Style::default().fg(theme.fg))
        .highlight_style(
            Style::default()
                .fg(theme.selected)
                .add_modifier(Modifier::BOLD),
        )
        .divider(Span::styled(" │ ", Style::default().fg(theme.frame)));

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(theme.frame));
    f.render_widget(tabs.block(block), area);
}

fn tab_line<'a>(fn_key: &str, title: &str, selected: bool, theme: &crate::theme::Theme) -> Line<'a> {
    let text_style = if selected {
        Style::default()
            .fg(theme.selected)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.muted)
    };
    let key_style = if selected {
        Style::default()
            .fg(theme.accent)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.muted)
    };
    Line::from(vec![
        Span::styled("[", Style::default().fg(theme.frame)),
        Span::styled(fn_key.to_string(), key_style),
        Span::styled("]", Style::default().fg(theme.frame)),
        Span::raw(" "),
        Span::styled(title.to_string(), text_style),
    ])
}

/// Handle F-key presses for the tab bar. Returns Some(config_path) when a new
/// screen config should be loaded.
pub fn handle_function_key(state: &mut AppState, key_num: u8) -> Option<String> {
    let index = (key_num - 1) as usize;

    if state.config.horizontal_menu.is_empty() {
        if key_num == 1 {
            state.horizontal_tab_index = 0;
        }
        return None;
    }

    if index < state.config.horizontal_menu.len() {
        // Same tab pressed again: nothing to do
        if state.horizontal_tab_index == index {
            return None;
        }
        state.horizontal_tab_index = index;
        state.config.horizontal_menu[index].config.clone()
    } else {
        None
    }
}
