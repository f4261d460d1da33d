use crate::model::FieldSpec;
use crate::widgets::chrome::panel_block;
use ratatui::prelude::*;
use ratatui::widgets::*;

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
}

#[derive(Clone, Debug)]
pub enum FieldKind {
    Text,
    TextArea {
        edit_lines: usize,
    },
    Select {
        options: Vec<String>,
        selected: Option<usize>,
        cursor: usize,
        offset: usize,
    },
    Checkbox,
    /// Path to a PDF the gateway uploads on submit.
    Document,
}

pub const OPTIONS_VISIBLE: usize = 6;

#[derive(Clone, Debug)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub required: bool,
    pub kind: FieldKind,
    pub value: FieldValue,
    pub error: Option<String>,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub pattern: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct FormState {
    pub title: String,
    pub fields: Vec<FormField>,
    // Index into fields; one past the end is the submit row.
    pub selected: usize,
    pub editing: bool,
    pub message: Option<String>,
    pub submit_command: String,
    pub disabled: bool,
}

impl FormState {
    pub fn on_submit_row(&self) -> bool {
        self.selected >= self.fields.len()
    }
}

pub fn form_from_spec(title: impl Into<String>, specs: &[FieldSpec], submit_command: &str) -> FormState {
    let fields = specs
        .iter()
        .map(|s| {
            let kind = match s.kind.as_deref().unwrap_or("text") {
                "textarea" => FieldKind::TextArea { edit_lines: 4 },
                "select" => FieldKind::Select {
                    options: s.options.clone(),
                    selected: None,
                    cursor: 0,
                    offset: 0,
                },
                "checkbox" => FieldKind::Checkbox,
                "document" => FieldKind::Document,
                _ => FieldKind::Text,
            };
            let value = match kind {
                FieldKind::Checkbox => FieldValue::Bool(false),
                _ => FieldValue::Text(String::new()),
            };
            FormField {
                name: s.name.clone(),
                label: s.label.clone(),
                required: s.required,
                kind,
                value,
                error: None,
                min_len: s.min_len,
                max_len: s.max_len,
                pattern: s.pattern.clone(),
            }
        })
        .collect();
    FormState {
        title: title.into(),
        fields,
        submit_command: submit_command.to_string(),
        ..Default::default()
    }
}

pub fn kebab_case(name: &str) -> String {
    name.replace('_', "-")
}

fn shell_quote(s: &str) -> String {
    if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '"') {
        format!("\"{}\"", s.replace('"', "\\\""))
    } else {
        s.to_string()
    }
}

/// Build the submit command line from the filled fields. Empty optional
/// fields are omitted; checkboxes become bare flags.
pub fn build_cmdline(form: &FormState) -> Option<String> {
    if form.submit_command.is_empty() {
        return None;
    }
    let mut out = form.submit_command.clone();
    for fld in &form.fields {
        let flag = format!("--{}", kebab_case(&fld.name));
        match (&fld.kind, &fld.value) {
            (FieldKind::Checkbox, FieldValue::Bool(b)) => {
                if *b {
                    out.push(' ');
                    out.push_str(&flag);
                }
            }
            (FieldKind::Select { options, selected, .. }, _) => {
                if let Some(i) = selected {
                    if let Some(v) = options.get(*i) {
                        out.push(' ');
                        out.push_str(&flag);
                        out.push(' ');
                        out.push_str(&shell_quote(v));
                    }
                }
            }
            (_, FieldValue::Text(s)) => {
                if !s.is_empty() {
                    out.push(' ');
                    out.push_str(&flag);
                    out.push(' ');
                    out.push_str(&shell_quote(s));
                }
            }
            _ => {}
        }
    }
    Some(out)
}

fn validate_field(fld: &mut FormField) {
    fld.error = None;
    let text = match (&fld.kind, &fld.value) {
        (FieldKind::Select { selected, .. }, _) => {
            if fld.required && selected.is_none() {
                fld.error = Some("required".into());
            }
            return;
        }
        (FieldKind::Checkbox, FieldValue::Bool(b)) => {
            if fld.required && !*b {
                fld.error = Some("must be accepted".into());
            }
            return;
        }
        (_, FieldValue::Text(s)) => s.clone(),
        _ => return,
    };
    if text.is_empty() {
        if fld.required {
            fld.error = Some("required".into());
        }
        return;
    }
    if let Some(min) = fld.min_len {
        if text.chars().count() < min {
            fld.error = Some(format!("at least {min} characters"));
            return;
        }
    }
    if let Some(max) = fld.max_len {
        if text.chars().count() > max {
            fld.error = Some(format!("at most {max} characters"));
            return;
        }
    }
    if let Some(pat) = &fld.pattern {
        if let Ok(re) = regex::Regex::new(pat) {
            if !re.is_match(&text) {
                fld.error = Some("invalid format".into());
                return;
            }
        }
    }
    if matches!(fld.kind, FieldKind::Document) && !text.to_ascii_lowercase().ends_with(".pdf") {
        fld.error = Some("must be a .pdf file".into());
    }
}

/// Validate every field; false (and a form message) when anything failed.
pub fn validate_form(form: &mut FormState) -> bool {
    let mut ok = true;
    for fld in &mut form.fields {
        validate_field(fld);
        if fld.error.is_some() {
            ok = false;
        }
    }
    form.message = if ok {
        None
    } else {
        Some("Fix the highlighted fields".into())
    };
    ok
}

fn value_display(fld: &FormField) -> (String, bool) {
    match (&fld.kind, &fld.value) {
        (FieldKind::Checkbox, FieldValue::Bool(b)) => {
            (if *b { "[x]" } else { "[ ]" }.to_string(), *b)
        }
        (FieldKind::Select { options, selected, .. }, _) => match selected {
            Some(i) => (options.get(*i).cloned().unwrap_or_default(), true),
            None => ("(choose)".to_string(), false),
        },
        (FieldKind::TextArea { .. }, FieldValue::Text(s)) => {
            let first = s.lines().next().unwrap_or("").to_string();
            if s.lines().count() > 1 {
                (format!("{first} …"), !s.is_empty())
            } else {
                (first, !s.is_empty())
            }
        }
        (FieldKind::Document, FieldValue::Text(s)) => {
            if s.is_empty() {
                ("(path to .pdf)".to_string(), false)
            } else if s.to_ascii_lowercase().ends_with(".pdf") {
                (format!("{s} ✓"), true)
            } else {
                (format!("{s} ✗"), true)
            }
        }
        (_, FieldValue::Text(s)) => (s.clone(), !s.is_empty()),
        _ => (String::new(), false),
    }
}

pub fn draw_form(f: &mut Frame, area: Rect, form: &FormState, focused: bool, tick: u64) {
    let block = panel_block(&form.title, focused);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut y = inner.y;
    for (i, fld) in form.fields.iter().enumerate() {
        if y >= inner.y + inner.height {
            break;
        }
        let is_sel = focused && i == form.selected;
        let marker = if is_sel { "> " } else { "  " };
        let (display, has_value) = value_display(fld);
        let required = if fld.required { "*" } else { "" };
        let mut spans = vec![
            Span::raw(marker),
            Span::styled(
                format!("{}{}: ", fld.label, required),
                crate::theme::Theme::default().text_active_bold(),
            ),
        ];
        let editing_this = form.editing && is_sel;
        let value_style = if editing_this {
            let cursor_on = tick % 2 == 0;
            if cursor_on {
                crate::theme::Theme::default().text_editing_bold()
            } else {
                Style::default()
            }
        } else if has_value {
            Style::default()
        } else {
            crate::theme::text_muted()
        };
        spans.push(Span::styled(
            if editing_this && matches!(fld.kind, FieldKind::Text | FieldKind::Document) {
                format!("{display}_")
            } else {
                display
            },
            value_style,
        ));
        if let Some(err) = &fld.error {
            spans.push(Span::styled(format!("  {err}"), crate::theme::text_error()));
        }
        let row = Rect {
            x: inner.x,
            y,
            width: inner.width,
            height: 1,
        };
        f.render_widget(Paragraph::new(Line::from(spans)), row);
        y = y.saturating_add(1);

        // Select editor window under the row while editing
        if editing_this {
            if let FieldKind::Select {
                options,
                cursor,
                offset,
                ..
            } = &fld.kind
            {
                let visible = OPTIONS_VISIBLE.min(options.len());
                let start = (*offset).min(options.len().saturating_sub(visible));
                let end = (start + visible).min(options.len());
                for (j, opt) in options[start..end].iter().enumerate() {
                    if y >= inner.y + inner.height {
                        break;
                    }
                    let idx = start + j;
                    let row = Rect {
                        x: inner.x,
                        y,
                        width: inner.width,
                        height: 1,
                    };
                    let style = if idx == *cursor {
                        crate::theme::list_cursor_style()
                    } else {
                        Style::default()
                    };
                    f.render_widget(
                        Paragraph::new(format!("     {opt}")).style(style),
                        row,
                    );
                    y = y.saturating_add(1);
                }
            }
        }
    }
    // Submit row
    if y < inner.y + inner.height {
        let is_sel = focused && form.on_submit_row();
        let style = if form.disabled {
            crate::theme::text_muted()
        } else if is_sel {
            crate::theme::list_cursor_style()
        } else {
            crate::theme::Theme::default().text_active_bold()
        };
        let label = if form.disabled {
            "[ Submitting… ]"
        } else {
            "[ Submit ]"
        };
        let row = Rect {
            x: inner.x,
            y: y.saturating_add(1).min(inner.y + inner.height - 1),
            width: inner.width,
            height: 1,
        };
        f.render_widget(
            Paragraph::new(format!("  {label}")).style(style),
            row,
        );
        y = row.y.saturating_add(1);
    }
    if let Some(msg) = &form.message {
        if y < inner.y + inner.height {
            let row = Rect {
                x: inner.x,
                y,
                width: inner.width,
                height: 1,
            };
            f.render_widget(
                Paragraph::new(format!("  {msg}")).style(crate::theme::text_error()),
                row,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_field(name: &str, value: &str, required: bool) -> FormField {
        FormField {
            name: name.into(),
            label: name.into(),
            required,
            kind: FieldKind::Text,
            value: FieldValue::Text(value.into()),
            error: None,
            min_len: None,
            max_len: None,
            pattern: None,
        }
    }

    #[test]
    fn kebab_case_maps_field_names_to_flags() {
        assert_eq!(kebab_case("full_name"), "full-name");
        assert_eq!(kebab_case("tin"), "tin");
    }

    #[test]
    fn build_cmdline_quotes_and_skips_empties() {
        let mut form = FormState {
            submit_command: "${GATEWAY_BIN} applications submit".into(),
            ..Default::default()
        };
        form.fields.push(text_field("full_name", "Umutoni Aline", true));
        form.fields.push(text_field("phone", "", false));
        form.fields.push(FormField {
            name: "declaration".into(),
            label: "Declaration".into(),
            required: true,
            kind: FieldKind::Checkbox,
            value: FieldValue::Bool(true),
            error: None,
            min_len: None,
            max_len: None,
            pattern: None,
        });
        form.fields.push(FormField {
            name: "category".into(),
            label: "Category".into(),
            required: true,
            kind: FieldKind::Select {
                options: vec!["individual".into(), "company".into()],
                selected: Some(1),
                cursor: 0,
                offset: 0,
            },
            value: FieldValue::Text(String::new()),
            error: None,
            min_len: None,
            max_len: None,
            pattern: None,
        });
        let cmd = build_cmdline(&form).unwrap();
        assert_eq!(
            cmd,
            "${GATEWAY_BIN} applications submit --full-name \"Umutoni Aline\" --declaration --category company"
        );
    }

    #[test]
    fn validate_flags_missing_required_and_bad_patterns() {
        let mut form = FormState::default();
        form.fields.push(text_field("full_name", "", true));
        let mut tin = text_field("tin", "12AB", true);
        tin.pattern = Some(r"^\d{9}$".into());
        form.fields.push(tin);
        assert!(!validate_form(&mut form));
        assert_eq!(form.fields[0].error.as_deref(), Some("required"));
        assert_eq!(form.fields[1].error.as_deref(), Some("invalid format"));
        assert!(form.message.is_some());

        form.fields[0].value = FieldValue::Text("Umutoni Aline".into());
        form.fields[1].value = FieldValue::Text("102345678".into());
        assert!(validate_form(&mut form));
        assert!(form.message.is_none());
    }

    #[test]
    fn document_fields_must_point_at_pdfs() {
        let mut form = FormState::default();
        form.fields.push(FormField {
            name: "degree".into(),
            label: "Degree".into(),
            required: true,
            kind: FieldKind::Document,
            value: FieldValue::Text("/tmp/degree.docx".into()),
            error: None,
            min_len: None,
            max_len: None,
            pattern: None,
        });
        assert!(!validate_form(&mut form));
        assert_eq!(form.fields[0].error.as_deref(), Some("must be a .pdf file"));
        form.fields[0].value = FieldValue::Text("/tmp/Degree.PDF".into());
        assert!(validate_form(&mut form));
    }

    #[test]
    fn form_from_spec_maps_kinds() {
        let specs = vec![
            FieldSpec {
                name: "full_name".into(),
                label: "Full name".into(),
                required: true,
                ..Default::default()
            },
            FieldSpec {
                name: "remarks".into(),
                label: "Remarks".into(),
                kind: Some("textarea".into()),
                ..Default::default()
            },
            FieldSpec {
                name: "degree".into(),
                label: "Degree".into(),
                kind: Some("document".into()),
                required: true,
                ..Default::default()
            },
        ];
        let form = form_from_spec("New Application", &specs, "${GATEWAY_BIN} applications submit");
        assert_eq!(form.fields.len(), 3);
        assert!(matches!(form.fields[1].kind, FieldKind::TextArea { .. }));
        assert!(matches!(form.fields[2].kind, FieldKind::Document));
        assert!(form.fields[0].required);
    }
}
