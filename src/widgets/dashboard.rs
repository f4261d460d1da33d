use crate::graph::engine::SelectionEngine;
use crate::graph::store::SlotStatus;
use crate::model::{DocumentKind, PanelSpec};
use crate::theme::Theme;
use crate::widgets::chrome::panel_block_themed;
use crate::widgets::detail::value_lines;
use crate::widgets::status_bar::SPINNER;
use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Cursor over the panel group; which panel is open (and what it holds) is
/// the engine's state.
#[derive(Debug, Default)]
pub struct DashboardState {
    pub cursor: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DashboardAction {
    Activate(String),
}

fn panel_badge(engine: &SelectionEngine, name: &str, tick: u64) -> (String, bool) {
    let p = engine.panel(name);
    let badge = if p.active {
        match p.status {
            SlotStatus::Loading => {
                format!("{} loading", SPINNER[tick as usize % SPINNER.len()])
            }
            SlotStatus::Loaded => "open".to_string(),
            SlotStatus::Failed => "failed".to_string(),
            SlotStatus::Idle => "open".to_string(),
        }
    } else {
        String::new()
    };
    (badge, p.active)
}

/// Check document records for type codes this client does not know. The
/// backend has shipped bad codes before; show them instead of guessing.
fn unknown_document_codes(content: &serde_json::Value) -> Vec<String> {
    let records = crate::services::directory::normalize_list_response(content);
    let mut unknown = Vec::new();
    for rec in &records {
        if let Some(code) = rec
            .get("document_type")
            .or_else(|| rec.get("type"))
            .and_then(|s| s.as_str())
        {
            if DocumentKind::from_code(code).is_err() && !unknown.contains(&code.to_string()) {
                unknown.push(code.to_string());
            }
        }
    }
    unknown
}

/// Required documents the payload has no record for yet.
fn missing_document_kinds(content: &serde_json::Value) -> Vec<DocumentKind> {
    let records = crate::services::directory::normalize_list_response(content);
    if records.is_empty() {
        return Vec::new();
    }
    let present: Vec<DocumentKind> = records
        .iter()
        .filter_map(|rec| {
            rec.get("document_type")
                .or_else(|| rec.get("type"))
                .and_then(|s| s.as_str())
                .and_then(|code| DocumentKind::from_code(code).ok())
        })
        .collect();
    DocumentKind::ALL
        .into_iter()
        .filter(|k| !present.contains(k))
        .collect()
}

pub fn draw_dashboard(
    f: &mut Frame,
    area: Rect,
    specs: &[PanelSpec],
    ds: &DashboardState,
    engine: &SelectionEngine,
    theme: &Theme,
    focused: bool,
    tick: u64,
) {
    let block = panel_block_themed("My Application", focused, theme);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut y = inner.y;
    for (i, spec) in specs.iter().enumerate() {
        if y >= inner.y + inner.height {
            break;
        }
        let (badge, active) = panel_badge(engine, &spec.name, tick);
        let is_cursor = focused && i == ds.cursor;
        let sel_mark = if is_cursor { "> " } else { "  " };
        let chevron = if active { "▾" } else { "▸" };
        let mut spans = vec![
            Span::raw(sel_mark),
            Span::raw(format!("{chevron} ")),
            Span::styled(
                spec.title.clone(),
                if active {
                    theme.text_active_bold()
                } else {
                    Style::default().fg(theme.fg)
                },
            ),
        ];
        if !badge.is_empty() {
            spans.push(Span::styled(format!("  ({badge})"), theme.text_muted()));
        }
        let row = Rect {
            x: inner.x,
            y,
            width: inner.width,
            height: 1,
        };
        f.render_widget(Paragraph::new(Line::from(spans)), row);
        y = y.saturating_add(1);

        if !active {
            continue;
        }
        // Body of the open panel
        let p = engine.panel(&spec.name);
        let mut body: Vec<Line> = Vec::new();
        match p.status {
            SlotStatus::Failed => {
                let msg = p.error.as_deref().unwrap_or("load failed");
                body.push(Line::from(Span::styled(
                    format!("   {msg}"),
                    theme.text_error(),
                )));
                body.push(Line::from(Span::styled(
                    "   r to retry".to_string(),
                    theme.text_muted(),
                )));
            }
            SlotStatus::Loaded => {
                if let Some(content) = &p.content {
                    for code in unknown_document_codes(content) {
                        body.push(Line::from(Span::styled(
                            format!("   unknown document type: {code}"),
                            theme.text_error(),
                        )));
                    }
                    let missing = missing_document_kinds(content);
                    if !missing.is_empty() {
                        let names: Vec<&str> = missing.iter().map(|k| k.label()).collect();
                        body.push(Line::from(Span::styled(
                            format!("   still required: {}", names.join(", ")),
                            Style::default().fg(theme.warning),
                        )));
                    }
                    let mut content_lines = Vec::new();
                    value_lines(content, 3, &mut content_lines);
                    if content_lines.is_empty() {
                        body.push(Line::from(Span::styled(
                            "   nothing here yet".to_string(),
                            theme.text_muted(),
                        )));
                    }
                    body.extend(content_lines);
                }
            }
            _ => {}
        }
        let avail = (inner.y + inner.height).saturating_sub(y);
        let h = (body.len() as u16).min(avail);
        if h > 0 {
            let body_area = Rect {
                x: inner.x,
                y,
                width: inner.width,
                height: h,
            };
            f.render_widget(Paragraph::new(body), body_area);
            y = y.saturating_add(h);
        }
    }
}

/// Up/Down move the cursor, Enter (or the panel number) opens a section,
/// r refreshes the open one.
pub fn handle_key(
    ds: &mut DashboardState,
    specs: &[PanelSpec],
    engine: &SelectionEngine,
    key: KeyCode,
) -> Option<DashboardAction> {
    if specs.is_empty() {
        return None;
    }
    match key {
        KeyCode::Up => {
            ds.cursor = ds.cursor.saturating_sub(1);
            None
        }
        KeyCode::Down => {
            if ds.cursor + 1 < specs.len() {
                ds.cursor += 1;
            }
            None
        }
        KeyCode::Enter | KeyCode::Char(' ') => {
            Some(DashboardAction::Activate(specs[ds.cursor].name.clone()))
        }
        KeyCode::Char(c) if c.is_ascii_digit() => {
            let idx = (c as usize).saturating_sub('1' as usize);
            if idx < specs.len() {
                ds.cursor = idx;
                Some(DashboardAction::Activate(specs[idx].name.clone()))
            } else {
                None
            }
        }
        KeyCode::Char('r') | KeyCode::Char('R') => specs
            .iter()
            .find(|s| engine.panel(&s.name).active)
            .map(|s| DashboardAction::Activate(s.name.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn specs() -> Vec<PanelSpec> {
        vec![
            PanelSpec {
                name: "under_review".into(),
                title: "Under Review".into(),
                command: "${GATEWAY_BIN} applications status --tin ${CONTEXT}".into(),
            },
            PanelSpec {
                name: "my_documents".into(),
                title: "My Documents".into(),
                command: "${GATEWAY_BIN} documents list --tin ${CONTEXT}".into(),
            },
        ]
    }

    fn engine() -> SelectionEngine {
        let mut eng = SelectionEngine::new();
        eng.add_panel("under_review");
        eng.add_panel("my_documents");
        eng
    }

    #[test]
    fn enter_activates_the_panel_under_the_cursor() {
        let eng = engine();
        let mut ds = DashboardState::default();
        let specs = specs();
        let _ = handle_key(&mut ds, &specs, &eng, KeyCode::Down);
        assert_eq!(
            handle_key(&mut ds, &specs, &eng, KeyCode::Enter),
            Some(DashboardAction::Activate("my_documents".into()))
        );
    }

    #[test]
    fn digit_shortcut_jumps_and_activates() {
        let eng = engine();
        let mut ds = DashboardState::default();
        assert_eq!(
            handle_key(&mut ds, &specs(), &eng, KeyCode::Char('2')),
            Some(DashboardAction::Activate("my_documents".into()))
        );
        assert_eq!(ds.cursor, 1);
        assert_eq!(handle_key(&mut ds, &specs(), &eng, KeyCode::Char('9')), None);
    }

    #[test]
    fn refresh_targets_the_active_panel_only() {
        let mut eng = engine();
        let mut ds = DashboardState::default();
        assert_eq!(handle_key(&mut ds, &specs(), &eng, KeyCode::Char('r')), None);
        eng.activate_panel("under_review", "tin");
        assert_eq!(
            handle_key(&mut ds, &specs(), &eng, KeyCode::Char('r')),
            Some(DashboardAction::Activate("under_review".into()))
        );
    }

    #[test]
    fn unknown_document_codes_are_surfaced() {
        let content = json!({"data": [
            {"document_type": "DEGREE", "verified": true},
            {"document_type": "SELFIE", "verified": false},
        ]});
        assert_eq!(unknown_document_codes(&content), vec!["SELFIE".to_string()]);
    }

    #[test]
    fn missing_required_documents_are_listed() {
        let content = json!({"data": [
            {"document_type": "DEGREE"},
            {"document_type": "NATIONAL_ID"},
        ]});
        let missing = missing_document_kinds(&content);
        assert_eq!(
            missing,
            vec![
                crate::model::DocumentKind::PoliceClearance,
                crate::model::DocumentKind::TaxClearance
            ]
        );
        // An empty payload stays quiet instead of claiming everything missing.
        assert!(missing_document_kinds(&json!({"data": []})).is_empty());
    }
}
