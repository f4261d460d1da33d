use crate::graph::engine::SelectionEngine;
use crate::graph::store::SlotStatus;
use crate::model::SlotSpec;
use crate::theme::Theme;
use crate::widgets::chrome::panel_block_themed;
use crate::widgets::status_bar::SPINNER;
use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, Paragraph};

pub const OPTIONS_VISIBLE: usize = 8;

/// Cursor state for the address chain. Everything the chain actually knows
/// (selections, options, load status) lives in the selection engine; this is
/// only where the user is looking.
#[derive(Debug, Default)]
pub struct CascadeState {
    pub cursor: usize,
    pub open: bool,
    pub option_cursor: usize,
    pub option_offset: usize,
}

/// What a key press asks the app to do with the chain.
#[derive(Debug, PartialEq, Eq)]
pub enum CascadeAction {
    Pick { slot: String, key: Option<String> },
    Reload { slot: String },
}

fn selection_label(engine: &SelectionEngine, name: &str) -> Option<String> {
    let slot = engine.slot(name);
    let key = slot.selected.as_deref()?;
    Some(
        slot.options
            .iter()
            .find(|o| o.key == key)
            .map(|o| o.label.clone())
            .unwrap_or_else(|| key.to_string()),
    )
}

/// A slot row can be opened when its options are loaded; retried when failed;
/// loaded on demand when its parent already has a selection (or it is the
/// root).
fn row_hint(engine: &SelectionEngine, name: &str) -> &'static str {
    let slot = engine.slot(name);
    match slot.status {
        SlotStatus::Loading => "loading",
        SlotStatus::Failed => "r retry",
        SlotStatus::Loaded => "Enter to choose",
        SlotStatus::Idle => {
            let parent_selected = match &slot.parent {
                Some(p) => engine.slot(p).selected.is_some(),
                None => true,
            };
            if parent_selected {
                "Enter to load"
            } else {
                "select above first"
            }
        }
    }
}

pub fn draw_cascade(
    f: &mut Frame,
    area: Rect,
    slots: &[SlotSpec],
    cs: &CascadeState,
    engine: &SelectionEngine,
    theme: &Theme,
    focused: bool,
    tick: u64,
) {
    let block = panel_block_themed("Address", focused, theme);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut y = inner.y;
    for (i, spec) in slots.iter().enumerate() {
        if y >= inner.y + inner.height {
            break;
        }
        let slot = engine.slot(&spec.name);
        let is_cursor = focused && i == cs.cursor;
        let sel_mark = if is_cursor { "> " } else { "  " };
        let mut spans: Vec<Span> = vec![
            Span::raw(sel_mark),
            Span::styled(
                format!("{}: ", spec.title),
                Style::default().fg(theme.accent),
            ),
        ];
        match (&slot.selected, slot.status) {
            (Some(_), _) => {
                let label = selection_label(engine, &spec.name).unwrap_or_default();
                spans.push(Span::styled(label, Style::default().fg(theme.fg)));
            }
            (None, SlotStatus::Loading) => {
                let spinner = SPINNER[tick as usize % SPINNER.len()];
                spans.push(Span::styled(
                    format!("{spinner} loading"),
                    theme.text_muted(),
                ));
            }
            (None, SlotStatus::Failed) => {
                let msg = slot.error.as_deref().unwrap_or("load failed");
                spans.push(Span::styled(msg.to_string(), theme.text_error()));
            }
            (None, _) => {
                spans.push(Span::styled("(none)", theme.text_muted()));
            }
        }
        spans.push(Span::styled(
            format!("  [{}]", row_hint(engine, &spec.name)),
            theme.text_muted(),
        ));
        let row = Rect {
            x: inner.x,
            y,
            width: inner.width,
            height: 1,
        };
        let style = if is_cursor && !cs.open {
            theme.text_editing_bold()
        } else {
            Style::default()
        };
        f.render_widget(Paragraph::new(Line::from(spans)).style(style), row);
        y = y.saturating_add(1);

        // Dropdown under the row the user is choosing from
        if cs.open && i == cs.cursor {
            let options = &slot.options;
            let visible = OPTIONS_VISIBLE.min(options.len());
            let start = cs.option_offset.min(options.len().saturating_sub(visible));
            let end = (start + visible).min(options.len());
            let items: Vec<ListItem> = options[start..end]
                .iter()
                .enumerate()
                .map(|(j, o)| {
                    let idx = start + j;
                    let marker = if Some(o.key.as_str()) == slot.selected.as_deref() {
                        "✓ "
                    } else {
                        "  "
                    };
                    let item = ListItem::new(format!("   {marker}{}", o.label));
                    if idx == cs.option_cursor {
                        item.style(theme.list_cursor_style())
                    } else {
                        item
                    }
                })
                .collect();
            let h = (end - start) as u16;
            let list_area = Rect {
                x: inner.x,
                y,
                width: inner.width,
                height: h.min((inner.y + inner.height).saturating_sub(y)),
            };
            f.render_widget(List::new(items), list_area);
            y = y.saturating_add(h);
        }
    }
}

/// Key handling for the chain. Returns the action the app should run; cursor
/// movement is absorbed here.
pub fn handle_key(
    cs: &mut CascadeState,
    slots: &[SlotSpec],
    engine: &SelectionEngine,
    key: KeyCode,
) -> Option<CascadeAction> {
    if slots.is_empty() {
        return None;
    }
    if cs.open {
        let slot = engine.slot(&slots[cs.cursor].name);
        let total = slot.options.len();
        match key {
            KeyCode::Up => {
                cs.option_cursor = cs.option_cursor.saturating_sub(1);
            }
            KeyCode::Down => {
                if cs.option_cursor + 1 < total {
                    cs.option_cursor += 1;
                }
            }
            KeyCode::Enter => {
                cs.open = false;
                if let Some(opt) = slot.options.get(cs.option_cursor) {
                    return Some(CascadeAction::Pick {
                        slot: slot.name.clone(),
                        key: Some(opt.key.clone()),
                    });
                }
            }
            KeyCode::Esc => {
                cs.open = false;
            }
            _ => {}
        }
        // Keep the cursor inside the visible window
        if cs.option_cursor < cs.option_offset {
            cs.option_offset = cs.option_cursor;
        } else if cs.option_cursor >= cs.option_offset + OPTIONS_VISIBLE {
            cs.option_offset = cs.option_cursor + 1 - OPTIONS_VISIBLE;
        }
        return None;
    }
    match key {
        KeyCode::Up => {
            cs.cursor = cs.cursor.saturating_sub(1);
        }
        KeyCode::Down => {
            if cs.cursor + 1 < slots.len() {
                cs.cursor += 1;
            }
        }
        KeyCode::Enter => {
            let spec = &slots[cs.cursor];
            let slot = engine.slot(&spec.name);
            match slot.status {
                SlotStatus::Loaded => {
                    cs.open = true;
                    cs.option_cursor = slot
                        .selected
                        .as_deref()
                        .and_then(|k| slot.options.iter().position(|o| o.key == k))
                        .unwrap_or(0);
                    cs.option_offset = cs.option_cursor.saturating_sub(OPTIONS_VISIBLE - 1);
                }
                SlotStatus::Failed | SlotStatus::Idle => {
                    let parent_selected = match &slot.parent {
                        Some(p) => engine.slot(p).selected.is_some(),
                        None => true,
                    };
                    if parent_selected {
                        return Some(CascadeAction::Reload {
                            slot: spec.name.clone(),
                        });
                    }
                }
                SlotStatus::Loading => {}
            }
        }
        KeyCode::Char('r') | KeyCode::Char('R') => {
            let spec = &slots[cs.cursor];
            let slot = engine.slot(&spec.name);
            let parent_selected = match &slot.parent {
                Some(p) => engine.slot(p).selected.is_some(),
                None => true,
            };
            if parent_selected {
                return Some(CascadeAction::Reload {
                    slot: spec.name.clone(),
                });
            }
        }
        KeyCode::Backspace | KeyCode::Delete => {
            let spec = &slots[cs.cursor];
            if engine.slot(&spec.name).selected.is_some() {
                return Some(CascadeAction::Pick {
                    slot: spec.name.clone(),
                    key: None,
                });
            }
        }
        _ => {}
    }
    None
}
