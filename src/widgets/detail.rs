use crate::model::{rejection_marks_reapplied, ApplicationStatus};
use crate::widgets::chrome::panel_block;
use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Pretty viewer for application/document payloads: filtered tree view with a
/// raw-JSON toggle. Status fields render in lifecycle colors, and a rejected
/// application gets a reapply hint unless the reason already carries the
/// reapplied marker.
pub struct DetailViewerWidget {
    pub title: String,
    pub json_pretty: String,
    json_value: serde_json::Value,
    mode_raw: bool,
    wrap: bool,
    scroll_y: u16,
    last_viewport_h: u16,
}

impl DetailViewerWidget {
    pub fn new(title: impl Into<String>, value: serde_json::Value) -> Self {
        let title = title.into();
        let json_pretty =
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
        Self {
            title,
            json_pretty,
            json_value: value,
            mode_raw: false,
            wrap: false,
            scroll_y: 0,
            last_viewport_h: 0,
        }
    }
}

fn is_empty_value(v: &serde_json::Value) -> bool {
    match v {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Array(arr) => arr.is_empty(),
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn is_technical_field(key: &str, v: &serde_json::Value) -> bool {
    match key {
        // Transport metadata: never interesting in the detail view
        "version" | "ts" | "request_id" | "type" => true,
        // Skip ok=true, keep ok=false to highlight errors
        "ok" => v.as_bool().unwrap_or(false),
        _ => false,
    }
}

fn value_preview_span(key: &str, v: &serde_json::Value) -> Span<'static> {
    if let Some(s) = v.as_str() {
        if key.eq_ignore_ascii_case("status") {
            if let Some(st) = ApplicationStatus::parse(s) {
                return Span::styled(
                    st.label().to_string(),
                    Style::default()
                        .fg(crate::theme::Theme::default().status_color(st))
                        .add_modifier(Modifier::BOLD),
                );
            }
        }
    }
    match v {
        serde_json::Value::Null => Span::styled("null", Style::default().fg(crate::theme::MUTED)),
        serde_json::Value::Bool(b) => {
            Span::styled(b.to_string(), Style::default().fg(Color::Magenta))
        }
        serde_json::Value::Number(n) => {
            Span::styled(n.to_string(), Style::default().fg(Color::Yellow))
        }
        serde_json::Value::String(s) => Span::styled(s.clone(), Style::default().fg(Color::Green)),
        serde_json::Value::Array(arr) => Span::styled(
            format!("[{} items]", arr.len()),
            Style::default().fg(crate::theme::MUTED),
        ),
        serde_json::Value::Object(map) => Span::styled(
            format!("{{{} keys}}", map.len()),
            Style::default().fg(crate::theme::MUTED),
        ),
    }
}

/// Hint shown under a rejected application. None when the lifecycle does not
/// call for one.
fn reapply_hint(obj: &serde_json::Map<String, serde_json::Value>) -> Option<Line<'static>> {
    let status = obj
        .get("status")
        .and_then(|s| s.as_str())
        .and_then(ApplicationStatus::parse)?;
    if status != ApplicationStatus::Rejected {
        return None;
    }
    let reason = obj
        .get("rejection_reason")
        .or_else(|| obj.get("reason"))
        .and_then(|s| s.as_str())
        .unwrap_or("");
    if rejection_marks_reapplied(reason) {
        Some(Line::from(Span::styled(
            "Already reapplied; awaiting a new decision.",
            Style::default().fg(crate::theme::MUTED),
        )))
    } else {
        Some(Line::from(Span::styled(
            "You may correct the listed issues and submit a new application.",
            Style::default().fg(crate::theme::ACCENT),
        )))
    }
}

/// Build the filtered pretty-tree lines for a payload. Shared with the
/// dashboard panels.
pub fn value_lines(v: &serde_json::Value, indent: usize, lines: &mut Vec<Line<'static>>) {
    if is_empty_value(v) {
        return;
    }
    let indent_sp = " ".repeat(indent);
    match v {
        serde_json::Value::Array(arr) => {
            for item in arr {
                if is_empty_value(item) {
                    continue;
                }
                match item {
                    serde_json::Value::Object(_) => {
                        lines.push(Line::from(vec![
                            Span::raw(indent_sp.clone()),
                            Span::raw("• "),
                        ]));
                        value_lines(item, indent + 2, lines);
                    }
                    _ => {
                        lines.push(Line::from(vec![
                            Span::raw(indent_sp.clone()),
                            Span::raw("• "),
                            value_preview_span("", item),
                        ]));
                    }
                }
            }
        }
        serde_json::Value::Object(map) => {
            for (k, val) in map.iter() {
                if is_empty_value(val) || is_technical_field(k, val) {
                    continue;
                }
                match val {
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        lines.push(Line::from(vec![
                            Span::raw(indent_sp.clone()),
                            Span::styled(format!("{k}: "), Style::default().fg(Color::Cyan)),
                        ]));
                        value_lines(val, indent + 2, lines);
                    }
                    _ => {
                        lines.push(Line::from(vec![
                            Span::raw(indent_sp.clone()),
                            Span::styled(format!("{k}: "), Style::default().fg(Color::Cyan)),
                            value_preview_span(k, val),
                        ]));
                    }
                }
            }
            if let Some(hint) = reapply_hint(map) {
                let mut spans = vec![Span::raw(indent_sp)];
                spans.extend(hint.spans);
                lines.push(Line::from(spans));
            }
        }
        other => {
            let mut spans = vec![Span::raw(indent_sp)];
            spans.push(value_preview_span("", other));
            lines.push(Line::from(spans));
        }
    }
}

impl crate::widgets::Widget for DetailViewerWidget {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, _tick: u64) {
        let mut lines: Vec<Line> = Vec::new();
        if self.mode_raw {
            for l in self.json_pretty.lines() {
                lines.push(Line::from(l.to_string()));
            }
        } else {
            lines.push(Line::from(vec![Span::styled(
                "j raw JSON  •  Ctrl+C copy  •  Backspace back",
                Style::default().fg(crate::theme::MUTED),
            )]));
            value_lines(&self.json_value, 0, &mut lines);
        }
        self.last_viewport_h = area.height.saturating_sub(2);
        let total = lines.len() as u16;
        let max_scroll = total.saturating_sub(self.last_viewport_h);
        if self.scroll_y > max_scroll {
            self.scroll_y = max_scroll;
        }
        let block = panel_block(&self.title, focused);
        let p = Paragraph::new(lines)
            .block(block)
            .wrap(ratatui::widgets::Wrap { trim: !self.wrap })
            .scroll((self.scroll_y, 0));
        f.render_widget(p, area);
    }

    fn on_key(&mut self, key: KeyCode) -> Vec<crate::app::Effect> {
        match key {
            KeyCode::Up => {
                if self.scroll_y > 0 {
                    self.scroll_y -= 1;
                }
            }
            KeyCode::Down => self.scroll_y = self.scroll_y.saturating_add(1),
            KeyCode::PageUp => {
                self.scroll_y = self.scroll_y.saturating_sub(self.last_viewport_h);
            }
            KeyCode::PageDown => {
                self.scroll_y = self.scroll_y.saturating_add(self.last_viewport_h);
            }
            KeyCode::Home => self.scroll_y = 0,
            KeyCode::End => {
                let max_scroll = self
                    .json_pretty
                    .lines()
                    .count()
                    .saturating_sub(self.last_viewport_h as usize) as u16;
                self.scroll_y = max_scroll;
            }
            KeyCode::Char('w') | KeyCode::Char('W') => self.wrap = !self.wrap,
            KeyCode::Char('j') | KeyCode::Char('J') => {
                self.mode_raw = !self.mode_raw;
                self.scroll_y = 0;
            }
            _ => {}
        }
        Vec::new()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rendered(v: &serde_json::Value) -> String {
        let mut lines = Vec::new();
        value_lines(v, 0, &mut lines);
        lines
            .iter()
            .map(|l| {
                l.spans
                    .iter()
                    .map(|s| s.content.as_ref())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn technical_fields_and_empties_are_filtered() {
        let v = json!({
            "ok": true,
            "type": "result",
            "ts": "2024-01-01",
            "status": "PENDING",
            "notes": "",
            "documents": []
        });
        let out = rendered(&v);
        assert!(out.contains("Pending"));
        assert!(!out.contains("ts"));
        assert!(!out.contains("notes"));
    }

    #[test]
    fn rejected_applications_get_the_reapply_hint() {
        let v = json!({"status": "REJECTED", "rejection_reason": "Degree certificate missing"});
        let out = rendered(&v);
        assert!(out.contains("submit a new application"));
    }

    #[test]
    fn viewer_renders_and_scroll_keys_stay_in_bounds() {
        use crate::widgets::Widget;
        use crossterm::event::KeyCode;
        use ratatui::prelude::Rect;
        let mut w = DetailViewerWidget::new(
            "Application",
            json!({"status": "APPROVED", "certificate": "TA-2024-0042"}),
        );
        let backend = ratatui::backend::TestBackend::new(60, 10);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let _ = terminal.draw(|f| {
            let area = Rect {
                x: 0,
                y: 0,
                width: 60,
                height: 10,
            };
            w.render(f, area, true, 0);
        });
        // Scrolling above the top clamps at zero
        let _ = w.on_key(KeyCode::Up);
        let _ = w.on_key(KeyCode::PageUp);
        let _ = w.on_key(KeyCode::Char('j'));
        let _ = w.on_key(KeyCode::End);
        let _ = w.on_key(KeyCode::Home);
        assert_eq!(w.scroll_y, 0);
    }

    #[test]
    fn reapplied_rejections_do_not_offer_reapply() {
        let v = json!({
            "status": "REJECTED",
            "rejection_reason": "Degree certificate missing. Reapplied 2024-05-01."
        });
        let out = rendered(&v);
        assert!(out.contains("Already reapplied"));
        assert!(!out.contains("submit a new application"));
    }
}
