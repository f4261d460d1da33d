use crate::widgets::form::{draw_form, FieldKind, FieldValue, FormState, OPTIONS_VISIBLE};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use std::collections::HashMap;
use tui_textarea::TextArea;

pub struct FormWidget {
    pub form: FormState,
    // TextArea editors keyed by field name, kept across edit sessions
    ta_map: HashMap<String, TextArea<'static>>,
}

impl FormWidget {
    pub fn new(form: FormState) -> Self {
        let mut ta_map: HashMap<String, TextArea<'static>> = HashMap::new();
        for f in &form.fields {
            if let FieldKind::TextArea { .. } = f.kind {
                let mut ta = TextArea::default();
                if let FieldValue::Text(txt) = &f.value {
                    if !txt.is_empty() {
                        ta.insert_str(txt);
                    }
                }
                ta.set_block(
                    ratatui::widgets::Block::default()
                        .borders(ratatui::widgets::Borders::ALL)
                        .title(format!("Editing: {} — Ctrl+S Save • Esc Cancel", f.label)),
                );
                ta_map.insert(f.name.clone(), ta);
            }
        }
        Self { form, ta_map }
    }

    fn selected_is_textarea(&self) -> bool {
        self.form
            .fields
            .get(self.form.selected)
            .map(|f| matches!(f.kind, FieldKind::TextArea { .. }))
            .unwrap_or(false)
    }

    pub fn editing_textarea(&self) -> bool {
        self.form.editing && self.selected_is_textarea()
    }

    /// Save the textarea buffer back into the field. Wired to Ctrl+S.
    pub fn commit_textarea(&mut self) -> bool {
        if !self.editing_textarea() {
            return false;
        }
        if let Some(fld) = self.form.fields.get_mut(self.form.selected) {
            if let Some(ta) = self.ta_map.get(&fld.name) {
                fld.value = FieldValue::Text(ta.lines().join("\n"));
                self.form.editing = false;
                self.form.message = None;
                return true;
            }
        }
        false
    }

    /// Map backend validation details onto fields: the error envelope carries
    /// `data.details.errors[]` with `loc` ending in the field name.
    pub fn apply_submit_errors(&mut self, envelope: &serde_json::Value) -> usize {
        let mut applied = 0;
        let errors = envelope
            .get("data")
            .and_then(|d| d.get("details"))
            .and_then(|d| d.get("errors"))
            .and_then(|e| e.as_array())
            .cloned()
            .unwrap_or_default();
        for err in &errors {
            let Some(name) = err
                .get("loc")
                .and_then(|l| l.as_array())
                .and_then(|l| l.last())
                .and_then(|s| s.as_str())
            else {
                continue;
            };
            let msg = err
                .get("msg")
                .and_then(|s| s.as_str())
                .unwrap_or("invalid")
                .to_string();
            if let Some(fld) = self.form.fields.iter_mut().find(|f| f.name == name) {
                fld.error = Some(msg);
                applied += 1;
            }
        }
        if applied > 0 {
            self.form.message = Some("Backend rejected some fields".into());
        }
        applied
    }
}

impl crate::widgets::Widget for FormWidget {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, tick: u64) {
        draw_form(f, area, &self.form, focused, tick);
        // Textarea modal over the form while editing a multi-line field
        if self.editing_textarea() {
            if let Some(fld) = self.form.fields.get(self.form.selected) {
                if let Some(ta) = self.ta_map.get_mut(&fld.name) {
                    let h = area.height.saturating_sub(4).clamp(3, 8);
                    let modal = Rect {
                        x: area.x + 2,
                        y: area.y + area.height.saturating_sub(h + 1),
                        width: area.width.saturating_sub(4),
                        height: h,
                    };
                    f.render_widget(ratatui::widgets::Clear, modal);
                    f.render_widget(&*ta, modal);
                }
            }
        }
    }

    fn on_key(&mut self, key: KeyCode) -> Vec<crate::app::Effect> {
        if self.form.disabled {
            return Vec::new();
        }
        let total = self.form.fields.len();
        if self.form.editing {
            if self.selected_is_textarea() {
                match key {
                    KeyCode::Esc => {
                        self.form.editing = false;
                    }
                    code => {
                        if let Some(fld) = self.form.fields.get(self.form.selected) {
                            if let Some(ta) = self.ta_map.get_mut(&fld.name) {
                                ta.input(KeyEvent::new(code, KeyModifiers::NONE));
                            }
                        }
                    }
                }
                return Vec::new();
            }
            let Some(fld) = self.form.fields.get_mut(self.form.selected) else {
                self.form.editing = false;
                return Vec::new();
            };
            match &mut fld.kind {
                FieldKind::Select {
                    options,
                    selected,
                    cursor,
                    offset,
                } => match key {
                    KeyCode::Up => {
                        *cursor = cursor.saturating_sub(1);
                        if *cursor < *offset {
                            *offset = *cursor;
                        }
                    }
                    KeyCode::Down => {
                        if *cursor + 1 < options.len() {
                            *cursor += 1;
                        }
                        if *cursor >= *offset + OPTIONS_VISIBLE {
                            *offset = *cursor + 1 - OPTIONS_VISIBLE;
                        }
                    }
                    KeyCode::Enter => {
                        *selected = Some(*cursor);
                        fld.error = None;
                        self.form.editing = false;
                    }
                    KeyCode::Esc => {
                        self.form.editing = false;
                    }
                    _ => {}
                },
                _ => match key {
                    KeyCode::Enter | KeyCode::Esc => {
                        self.form.editing = false;
                    }
                    KeyCode::Backspace => {
                        if let FieldValue::Text(s) = &mut fld.value {
                            s.pop();
                        }
                    }
                    KeyCode::Char(c) => {
                        if let FieldValue::Text(s) = &mut fld.value {
                            s.push(c);
                        }
                    }
                    _ => {}
                },
            }
            return Vec::new();
        }
        match key {
            KeyCode::Up => {
                self.form.selected = self.form.selected.saturating_sub(1);
            }
            KeyCode::Down => {
                // One past the last field is the submit row
                if self.form.selected < total {
                    self.form.selected += 1;
                }
            }
            KeyCode::Enter => {
                if self.form.on_submit_row() {
                    // Submission is the app's call; ui.rs intercepts this row.
                    return Vec::new();
                }
                if let Some(fld) = self.form.fields.get_mut(self.form.selected) {
                    match &mut fld.kind {
                        FieldKind::Checkbox => {
                            if let FieldValue::Bool(b) = &mut fld.value {
                                *b = !*b;
                                fld.error = None;
                            }
                        }
                        FieldKind::Select {
                            options,
                            selected,
                            cursor,
                            offset,
                        } => {
                            if !options.is_empty() {
                                *cursor = selected.unwrap_or(0);
                                *offset = cursor.saturating_sub(OPTIONS_VISIBLE - 1);
                                self.form.editing = true;
                            }
                        }
                        _ => {
                            self.form.editing = true;
                        }
                    }
                }
            }
            KeyCode::Char(' ') => {
                if let Some(fld) = self.form.fields.get_mut(self.form.selected) {
                    if let (FieldKind::Checkbox, FieldValue::Bool(b)) =
                        (&fld.kind, &mut fld.value)
                    {
                        *b = !*b;
                        fld.error = None;
                    }
                }
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
