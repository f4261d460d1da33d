use ratatui::prelude::*;
use ratatui::widgets::*;

use crate::model::ApplicationStatus;
use crate::nav::flatten::flatten_nodes;
use crate::nav::keys::menu_key;
use crate::ui::AppState;
use crate::widgets::chrome::panel_block;
use crate::widgets::status_bar::SPINNER;

#[allow(dead_code)]
pub(crate) fn compute_scroll_window(total: usize, selected: usize, inner_h: u16) -> (usize, usize) {
    if inner_h == 0 || total == 0 {
        return (0, 0);
    }
    let sel = selected.min(total.saturating_sub(1));
    let ih = inner_h as usize;
    let start = sel.saturating_sub(ih - 1);
    let end = (start + ih).min(total);
    (start, end)
}

/// Badge for a roster entry's application status, when the record carries one.
fn status_span(val: &serde_json::Value) -> Option<Span<'static>> {
    let status = val
        .get("status")
        .and_then(|s| s.as_str())
        .and_then(ApplicationStatus::parse)?;
    Some(Span::styled(
        format!("  [{}]", status.label()),
        Style::default()
            .fg(crate::theme::Theme::default().status_color(status))
            .add_modifier(Modifier::BOLD),
    ))
}

pub fn draw_menu(f: &mut Frame, area: Rect, state: &AppState) {
    let nodes = flatten_nodes(state);
    let inner_h = area.height.saturating_sub(2); // account for borders
    let total = nodes.len();
    let ih = inner_h as usize;
    let max_start = total.saturating_sub(ih);
    let start = state.menu_offset.min(max_start);
    let end = (start + ih).min(total);
    let items: Vec<ListItem> = nodes
        .iter()
        .enumerate()
        .skip(start)
        .take(end - start)
        .map(|(idx, node)| {
            let is_sel = idx == state.selected;
            let sel = if is_sel { "> " } else { "  " };
            match node {
                crate::ui::FlatNode::Header { idx, depth } => {
                    let m = &state.config.menu[*idx];
                    let indent = "  ".repeat(*depth);
                    ListItem::new(format!("{sel}{indent}{}", m.title))
                        .style(Style::default().fg(Color::Yellow))
                }
                crate::ui::FlatNode::Menu { idx, depth } => {
                    let m = &state.config.menu[*idx];
                    let indent = "  ".repeat(*depth);
                    let mut text = m.title.clone();
                    if crate::ui::is_lazy(m) || crate::ui::is_autoload(m) {
                        let key = menu_key(m);
                        let chevron = if state.expanded.contains(&key) {
                            "▾"
                        } else {
                            "▸"
                        };
                        text = if state.loading.contains(&key) {
                            let spinner = SPINNER[state.tick as usize % SPINNER.len()];
                            format!("{chevron} {text} ({spinner} loading)")
                        } else if state.children.contains_key(&key) {
                            format!("{chevron} {text} (loaded)")
                        } else if let Some(hint) = &m.initial_text {
                            format!("{chevron} {text} — {hint}")
                        } else {
                            format!("{chevron} {text}")
                        };
                    } else if let Some(w) = &m.widget {
                        match w.as_str() {
                            "register" => text.push_str("  [form]"),
                            "dashboard" => text.push_str("  [status]"),
                            _ => {}
                        }
                    }
                    ListItem::new(format!("{sel}{indent}{text}"))
                }
                crate::ui::FlatNode::Child { key, val, depth } => {
                    let indent = "  ".repeat(*depth);
                    let title = crate::ui::title_from_value(val);
                    if crate::ui::is_lazy_value(val) {
                        let chevron = if state.expanded.contains(key) {
                            "▾"
                        } else {
                            "▸"
                        };
                        let text = if state.loading.contains(key) {
                            let spinner = SPINNER[state.tick as usize % SPINNER.len()];
                            format!("{chevron} {title} ({spinner} loading)")
                        } else {
                            format!("{chevron} {title}")
                        };
                        let mut spans =
                            vec![Span::raw(format!("{sel}{indent}{text}"))];
                        if let Some(badge) = status_span(val) {
                            spans.push(badge);
                        }
                        ListItem::new(Line::from(spans))
                    } else {
                        let mut spans = vec![Span::raw(format!("{sel}{indent}• {title}"))];
                        if let Some(badge) = status_span(val) {
                            spans.push(badge);
                        }
                        ListItem::new(Line::from(spans))
                    }
                }
            }
        })
        .collect();
    let block = panel_block(
        "Menu",
        // Highlight when this pane is where input goes
        !matches!(state.view, crate::ui::View::Register),
    );
    let list = List::new(items).block(block);
    f.render_widget(list, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_keeps_selected_visible() {
        // total 20, height 5 -> window size 5
        let (s1, e1) = compute_scroll_window(20, 0, 5);
        assert_eq!((s1, e1), (0, 5));
        let (s2, e2) = compute_scroll_window(20, 4, 5);
        assert_eq!((s2, e2), (0, 5));
        let (s3, e3) = compute_scroll_window(20, 5, 5);
        assert_eq!((s3, e3), (1, 6));
        let (s4, e4) = compute_scroll_window(20, 19, 5);
        assert_eq!((s4, e4), (15, 20));
    }

    #[test]
    fn roster_entries_show_status_badges() {
        let badge = status_span(&serde_json::json!({"status": "APPROVED"})).unwrap();
        assert_eq!(badge.content.as_ref(), "  [Approved]");
        assert!(status_span(&serde_json::json!({"status": "weird"})).is_none());
        assert!(status_span(&serde_json::json!({"name": "no status"})).is_none());
    }
}
