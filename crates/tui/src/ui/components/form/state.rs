//! Editing state for an [`InputRequest`].
//!
//! One widget state per field, a focused field, and the key handling that
//! turns keystrokes into either an edit, a submit or a cancel. Validation is
//! not done here; the palette hands the collected [`FormValues`] to the step
//! driver or the tool finalizer and gets the same request back with errors.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use skitz_types::{FieldKind, FieldSpec, FieldValue, FormValues, InputRequest};

use crate::ui::components::common::TextInputState;

#[derive(Clone, Debug, PartialEq)]
pub enum FieldState {
    Text(TextInputState),
    Select { cursor: usize },
    MultiSelect { cursor: usize, selected: Vec<bool> },
    Confirm(bool),
}

impl FieldState {
    fn for_spec(spec: &FieldSpec) -> Self {
        match spec.kind {
            FieldKind::Text | FieldKind::LongText => {
                let text = spec.default.as_ref().map(FieldValue::display).unwrap_or_default();
                FieldState::Text(TextInputState::with_text(text))
            }
            FieldKind::SingleSelect => {
                let preferred = spec.default.as_ref().and_then(FieldValue::as_text);
                let cursor = preferred
                    .and_then(|value| spec.choices.iter().position(|choice| choice.value == value))
                    .or_else(|| spec.choices.iter().position(|choice| choice.enabled))
                    .unwrap_or(0);
                FieldState::Select { cursor }
            }
            FieldKind::MultiSelect => {
                let defaults = match &spec.default {
                    Some(FieldValue::Choices(values)) => values.clone(),
                    _ => Vec::new(),
                };
                let selected = spec.choices.iter().map(|choice| defaults.contains(&choice.value)).collect();
                FieldState::MultiSelect { cursor: 0, selected }
            }
            FieldKind::Confirm => FieldState::Confirm(matches!(spec.default, Some(FieldValue::Bool(true)))),
        }
    }

    fn value(&self, spec: &FieldSpec) -> FieldValue {
        match self {
            FieldState::Text(input) => FieldValue::Text(input.input().to_string()),
            FieldState::Select { cursor } => {
                let value = spec
                    .choices
                    .get(*cursor)
                    .filter(|choice| choice.enabled)
                    .map(|choice| choice.value.clone())
                    .unwrap_or_default();
                FieldValue::Text(value)
            }
            FieldState::MultiSelect { selected, .. } => FieldValue::Choices(
                spec.choices
                    .iter()
                    .zip(selected)
                    .filter(|(choice, picked)| **picked && choice.enabled)
                    .map(|(choice, _)| choice.value.clone())
                    .collect(),
            ),
            FieldState::Confirm(flag) => FieldValue::Bool(*flag),
        }
    }
}

/// What a key did to the form.
#[derive(Clone, Debug, PartialEq)]
pub enum FormEvent {
    /// Edited or moved; nothing for the caller to do.
    Handled,
    /// The user finished the form.
    Submit(FormValues),
    Cancel,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FormState {
    request: InputRequest,
    fields: Vec<FieldState>,
    focus: usize,
}

impl FormState {
    pub fn new(request: InputRequest) -> Self {
        let fields = request.fields.iter().map(FieldState::for_spec).collect();
        let focus = request
            .fields
            .iter()
            .position(|field| request.errors.get(&field.id).is_some())
            .unwrap_or(0);
        Self { request, fields, focus }
    }

    /// Show `request`, keeping what the user typed when it is the same step.
    ///
    /// A select keeps its cursor only while its choices are unchanged, so a
    /// list that finished loading starts at its first real option.
    pub fn replace(&mut self, request: InputRequest) {
        if request.step != self.request.step {
            *self = Self::new(request);
            return;
        }

        let fields = request
            .fields
            .iter()
            .map(|spec| {
                let previous = self
                    .request
                    .fields
                    .iter()
                    .position(|old| old.id == spec.id && old.kind == spec.kind && old.choices == spec.choices);
                match previous {
                    Some(index) => self.fields[index].clone(),
                    None => FieldState::for_spec(spec),
                }
            })
            .collect();
        let focus = request
            .fields
            .iter()
            .position(|field| request.errors.get(&field.id).is_some())
            .unwrap_or_else(|| self.focus.min(request.fields.len().saturating_sub(1)));
        self.request = request;
        self.fields = fields;
        self.focus = focus;
    }

    pub fn request(&self) -> &InputRequest {
        &self.request
    }

    pub fn step(&self) -> &str {
        &self.request.step
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn field_state(&self, index: usize) -> Option<&FieldState> {
        self.fields.get(index)
    }

    pub fn values(&self) -> FormValues {
        let mut values = FormValues::new();
        for (spec, state) in self.request.fields.iter().zip(&self.fields) {
            values.insert(spec.id.clone(), state.value(spec));
        }
        values
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FormEvent {
        if key.code == KeyCode::Esc {
            return FormEvent::Cancel;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
            return FormEvent::Submit(self.values());
        }
        match key.code {
            KeyCode::Tab => {
                self.focus_next();
                return FormEvent::Handled;
            }
            KeyCode::BackTab => {
                self.focus_previous();
                return FormEvent::Handled;
            }
            _ => {}
        }

        let Some(spec) = self.request.fields.get(self.focus) else {
            // A form without fields (e.g. a bare confirmation notice).
            return match key.code {
                KeyCode::Enter => FormEvent::Submit(FormValues::new()),
                _ => FormEvent::Handled,
            };
        };
        let is_last = self.focus + 1 >= self.fields.len();
        let choice_count = spec.choices.len();
        let kind = spec.kind;

        match (&mut self.fields[self.focus], key.code) {
            (FieldState::Text(input), KeyCode::Enter) if kind == FieldKind::LongText && !is_last => {
                input.insert_char('\n');
                FormEvent::Handled
            }
            (FieldState::Text(input), KeyCode::Char(c)) => {
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    match c {
                        'w' => input.delete_word(),
                        'u' => input.clear(),
                        'j' if kind == FieldKind::LongText => input.insert_char('\n'),
                        _ => {}
                    }
                } else {
                    input.insert_char(c);
                }
                FormEvent::Handled
            }
            (FieldState::Text(input), KeyCode::Backspace) => {
                input.backspace();
                FormEvent::Handled
            }
            (FieldState::Text(input), KeyCode::Delete) => {
                input.delete();
                FormEvent::Handled
            }
            (FieldState::Text(input), KeyCode::Left) => {
                input.move_left();
                FormEvent::Handled
            }
            (FieldState::Text(input), KeyCode::Right) => {
                input.move_right();
                FormEvent::Handled
            }
            (FieldState::Text(input), KeyCode::Home) => {
                input.move_home();
                FormEvent::Handled
            }
            (FieldState::Text(input), KeyCode::End) => {
                input.move_end();
                FormEvent::Handled
            }
            (FieldState::Text(_), KeyCode::Up) => {
                self.focus_previous();
                FormEvent::Handled
            }
            (FieldState::Text(_), KeyCode::Down) => {
                self.focus_next();
                FormEvent::Handled
            }
            (FieldState::Select { cursor } | FieldState::MultiSelect { cursor, .. }, KeyCode::Up) => {
                *cursor = wrap_previous(*cursor, choice_count);
                FormEvent::Handled
            }
            (FieldState::Select { cursor } | FieldState::MultiSelect { cursor, .. }, KeyCode::Down) => {
                *cursor = wrap_next(*cursor, choice_count);
                FormEvent::Handled
            }
            (FieldState::MultiSelect { cursor, selected }, KeyCode::Char(' ')) => {
                if let Some(picked) = selected.get_mut(*cursor) {
                    *picked = !*picked;
                }
                FormEvent::Handled
            }
            (FieldState::Confirm(flag), KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right) => {
                *flag = !*flag;
                FormEvent::Handled
            }
            (FieldState::Confirm(flag), KeyCode::Char('y' | 'Y')) => {
                *flag = true;
                self.enter_or_submit(is_last)
            }
            (FieldState::Confirm(flag), KeyCode::Char('n' | 'N')) => {
                *flag = false;
                self.enter_or_submit(is_last)
            }
            (_, KeyCode::Enter) => self.enter_or_submit(is_last),
            _ => FormEvent::Handled,
        }
    }

    fn enter_or_submit(&mut self, is_last: bool) -> FormEvent {
        if is_last {
            FormEvent::Submit(self.values())
        } else {
            self.focus_next();
            FormEvent::Handled
        }
    }

    fn focus_next(&mut self) {
        self.focus = wrap_next(self.focus, self.fields.len());
    }

    fn focus_previous(&mut self) {
        self.focus = wrap_previous(self.focus, self.fields.len());
    }
}

fn wrap_next(index: usize, len: usize) -> usize {
    if len == 0 { 0 } else { (index + 1) % len }
}

fn wrap_previous(index: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else if index == 0 {
        len - 1
    } else {
        index - 1
    }
}

#[cfg(test)]
mod tests {
    use skitz_types::{FieldChoice, FieldErrors};

    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(form: &mut FormState, text: &str) {
        for c in text.chars() {
            form.handle_key(key(KeyCode::Char(c)));
        }
    }

    fn account_request(choices: Vec<FieldChoice>) -> InputRequest {
        InputRequest::new("account", "Select account", vec![FieldSpec::select("account", "Account", choices).required()])
    }

    #[test]
    fn enter_moves_through_fields_then_submits() {
        let request = InputRequest::new(
            "details",
            "Details",
            vec![
                FieldSpec::text("name", "Name").required(),
                FieldSpec::confirm("enabled", "Enabled").default_value(FieldValue::Bool(true)),
            ],
        );
        let mut form = FormState::new(request);
        type_text(&mut form, "notes");
        assert_eq!(form.handle_key(key(KeyCode::Enter)), FormEvent::Handled);
        assert_eq!(form.focus(), 1);

        let FormEvent::Submit(values) = form.handle_key(key(KeyCode::Char('n'))) else {
            panic!("expected submit");
        };
        assert_eq!(values.text("name"), Some("notes"));
        assert!(!values.flag("enabled"));
    }

    #[test]
    fn select_wraps_and_skips_disabled_values() {
        let mut form = FormState::new(account_request(vec![
            FieldChoice::new("Main", "main"),
            FieldChoice::new("Backup", "backup"),
        ]));
        form.handle_key(key(KeyCode::Up));
        assert_eq!(form.values().text("account"), Some("backup"));
        form.handle_key(key(KeyCode::Down));
        assert_eq!(form.values().text("account"), Some("main"));

        let loading = FormState::new(account_request(vec![FieldChoice::placeholder("Loading accounts...")]));
        assert_eq!(loading.values().text("account"), None);
    }

    #[test]
    fn replacing_with_errors_keeps_typed_text() {
        let request = InputRequest::new("name", "Name", vec![FieldSpec::text("name", "Resource Name").required()]);
        let mut form = FormState::new(request.clone());
        type_text(&mut form, "Git");

        form.replace(request.with_errors(FieldErrors::single("name", "Resource 'git' already exists")));
        assert_eq!(form.values().raw_text("name"), Some("Git"));
        assert_eq!(form.request().errors.get("name"), Some("Resource 'git' already exists"));
    }

    #[test]
    fn loaded_choices_reset_the_select_cursor() {
        let mut form = FormState::new(account_request(vec![FieldChoice::placeholder("Loading accounts...")]));
        form.replace(account_request(vec![FieldChoice::new("Main", "main")]));
        assert_eq!(form.values().text("account"), Some("main"));
    }

    #[test]
    fn long_text_enter_inserts_newlines_until_last_field() {
        let request = InputRequest::new(
            "code",
            "Paste code",
            vec![FieldSpec::long_text("code", "Code"), FieldSpec::text("language", "Language")],
        );
        let mut form = FormState::new(request);
        type_text(&mut form, "fn a() {}");
        form.handle_key(key(KeyCode::Enter));
        type_text(&mut form, "fn b() {}");
        assert_eq!(form.values().raw_text("code"), Some("fn a() {}\nfn b() {}"));

        let submit = form.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
        assert!(matches!(submit, FormEvent::Submit(_)));
        assert_eq!(form.handle_key(key(KeyCode::Esc)), FormEvent::Cancel);
    }

    #[test]
    fn multi_select_toggles_with_space() {
        let request = InputRequest::new(
            "regions",
            "Regions",
            vec![FieldSpec::multi_select(
                "regions",
                "Regions",
                vec![FieldChoice::new("East", "eastus"), FieldChoice::new("West", "westus")],
            )],
        );
        let mut form = FormState::new(request);
        form.handle_key(key(KeyCode::Char(' ')));
        form.handle_key(key(KeyCode::Down));
        form.handle_key(key(KeyCode::Char(' ')));
        form.handle_key(key(KeyCode::Up));
        form.handle_key(key(KeyCode::Char(' ')));
        assert_eq!(form.values().choices("regions"), vec!["westus".to_string()]);
    }
}
