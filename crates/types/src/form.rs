//! Field descriptors and submitted values for interactive input steps.
//!
//! A step that needs input describes it as an [`InputRequest`]: an ordered list
//! of [`FieldSpec`]s, any per-field errors from the previous attempt, and an
//! optional notice line. The UI renders the fields, and whatever the user
//! submits comes back as [`FormValues`].

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Key used in [`FieldErrors`] for errors that do not belong to a single field.
pub const FORM_ERROR_KEY: &str = "_form";

/// The widget used to collect a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    LongText,
    SingleSelect,
    MultiSelect,
    Confirm,
}

/// One option of a select field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChoice {
    pub label: String,
    pub value: String,
    pub hint: Option<String>,
    /// Disabled choices are shown but cannot be picked (e.g. "Loading accounts...").
    pub enabled: bool,
}

impl FieldChoice {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            hint: None,
            enabled: true,
        }
    }

    /// A non-selectable line standing in for options that are not available.
    pub fn placeholder(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: String::new(),
            hint: None,
            enabled: false,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Named format checks applied to text values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Validator {
    NonEmpty,
    Integer,
    PositiveInteger,
    Number,
    Url,
    /// Lowercase letters, digits and dashes.
    Slug,
    /// Value must start with the given prefix.
    Prefix(String),
    Json,
}

static SLUG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug pattern"));

impl Validator {
    /// Check a raw (already trimmed) value. Empty values are left to the `required` check.
    pub fn check(&self, raw: &str) -> Result<(), String> {
        if raw.is_empty() && !matches!(self, Validator::NonEmpty) {
            return Ok(());
        }
        match self {
            Validator::NonEmpty if raw.is_empty() => Err("must not be empty".to_string()),
            Validator::NonEmpty => Ok(()),
            Validator::Integer => raw.parse::<i64>().map(|_| ()).map_err(|_| "must be a whole number".to_string()),
            Validator::PositiveInteger => match raw.parse::<u64>() {
                Ok(value) if value > 0 => Ok(()),
                _ => Err("must be a positive whole number".to_string()),
            },
            Validator::Number => raw.parse::<f64>().map(|_| ()).map_err(|_| "must be a number".to_string()),
            Validator::Url => match url::Url::parse(raw) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
                Ok(_) => Err("must be an http(s) URL".to_string()),
                Err(error) => Err(format!("invalid URL: {error}")),
            },
            Validator::Slug if SLUG_PATTERN.is_match(raw) => Ok(()),
            Validator::Slug => Err("use lowercase letters, digits and dashes".to_string()),
            Validator::Prefix(prefix) if raw.starts_with(prefix.as_str()) => Ok(()),
            Validator::Prefix(prefix) => Err(format!("must start with '{prefix}'")),
            Validator::Json => serde_json::from_str::<serde_json::Value>(raw)
                .map(|_| ())
                .map_err(|error| format!("invalid JSON: {error}")),
        }
    }
}

/// Describes one input field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub placeholder: Option<String>,
    pub kind: FieldKind,
    pub required: bool,
    pub choices: Vec<FieldChoice>,
    pub default: Option<FieldValue>,
    pub validator: Option<Validator>,
}

impl FieldSpec {
    fn with_kind(id: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            placeholder: None,
            kind,
            required: false,
            choices: Vec::new(),
            default: None,
            validator: None,
        }
    }

    pub fn text(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_kind(id, label, FieldKind::Text)
    }

    pub fn long_text(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_kind(id, label, FieldKind::LongText)
    }

    pub fn select(id: impl Into<String>, label: impl Into<String>, choices: Vec<FieldChoice>) -> Self {
        let mut spec = Self::with_kind(id, label, FieldKind::SingleSelect);
        spec.choices = choices;
        spec
    }

    pub fn multi_select(id: impl Into<String>, label: impl Into<String>, choices: Vec<FieldChoice>) -> Self {
        let mut spec = Self::with_kind(id, label, FieldKind::MultiSelect);
        spec.choices = choices;
        spec
    }

    pub fn confirm(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_kind(id, label, FieldKind::Confirm)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn default_value(mut self, value: FieldValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn validate_with(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Choices that can actually be picked.
    pub fn enabled_choices(&self) -> impl Iterator<Item = &FieldChoice> {
        self.choices.iter().filter(|choice| choice.enabled)
    }
}

/// A submitted value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Text fields and single selects.
    Text(String),
    Choices(Vec<String>),
    Bool(bool),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::Choices(values) => values.is_empty(),
            FieldValue::Bool(_) => false,
        }
    }

    /// Text rendering used when a value is shown back to the user or coerced later.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Choices(values) => values.join(", "),
            FieldValue::Bool(flag) => flag.to_string(),
        }
    }
}

/// Values submitted for an input step, in field order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormValues(IndexMap<String, FieldValue>);

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, value: FieldValue) {
        self.0.insert(id.into(), value);
    }

    pub fn with(mut self, id: impl Into<String>, value: FieldValue) -> Self {
        self.insert(id, value);
        self
    }

    pub fn with_text(self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.with(id, FieldValue::Text(text.into()))
    }

    pub fn get(&self, id: &str) -> Option<&FieldValue> {
        self.0.get(id)
    }

    /// Trimmed text value; `None` for missing or blank values.
    pub fn text(&self, id: &str) -> Option<&str> {
        self.0
            .get(id)
            .and_then(FieldValue::as_text)
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Raw text value without trimming (code, prompts).
    pub fn raw_text(&self, id: &str) -> Option<&str> {
        self.0.get(id).and_then(FieldValue::as_text)
    }

    pub fn flag(&self, id: &str) -> bool {
        matches!(self.0.get(id), Some(FieldValue::Bool(true)))
    }

    pub fn choices(&self, id: &str) -> Vec<String> {
        match self.0.get(id) {
            Some(FieldValue::Choices(values)) => values.clone(),
            Some(FieldValue::Text(text)) if !text.trim().is_empty() => vec![text.trim().to_string()],
            _ => Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Per-field validation errors, keyed by field id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors(IndexMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single error attached to one field.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Error that is not tied to one field.
    pub fn form(message: impl Into<String>) -> Self {
        Self::single(FORM_ERROR_KEY, message)
    }

    /// Record an error; the first error for a field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn form_error(&self) -> Option<&str> {
        self.get(FORM_ERROR_KEY)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

/// Everything needed to render one input step.
#[derive(Clone, Debug, PartialEq)]
pub struct InputRequest {
    /// Stable key of the step; the UI keeps typed values while the key stays the same.
    pub step: String,
    pub title: String,
    pub fields: Vec<FieldSpec>,
    pub errors: FieldErrors,
    /// Inline line shown above the fields (load errors, hints).
    pub notice: Option<String>,
}

impl InputRequest {
    pub fn new(step: impl Into<String>, title: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            step: step.into(),
            title: title.into(),
            fields,
            errors: FieldErrors::new(),
            notice: None,
        }
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }

    pub fn with_errors(mut self, errors: FieldErrors) -> Self {
        self.errors = errors;
        self
    }

    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.id == id)
    }
}

/// Check `values` against the `required` flags, choice lists and validators of `fields`.
pub fn validate_form(fields: &[FieldSpec], values: &FormValues) -> FieldErrors {
    let mut errors = FieldErrors::new();
    for field in fields {
        let value = values.get(&field.id);
        let blank = value.is_none_or(FieldValue::is_blank);
        if blank {
            if field.required {
                errors.add(&field.id, format!("{} is required", field.label));
            }
            continue;
        }

        match (field.kind, value) {
            (FieldKind::SingleSelect, Some(FieldValue::Text(selected))) => {
                if !field.enabled_choices().any(|choice| choice.value == selected.trim()) {
                    errors.add(&field.id, "select one of the available options");
                }
            }
            (FieldKind::MultiSelect, Some(FieldValue::Choices(selected))) => {
                if let Some(unknown) = selected.iter().find(|item| !field.enabled_choices().any(|choice| &choice.value == *item)) {
                    errors.add(&field.id, format!("unknown option '{unknown}'"));
                }
            }
            (FieldKind::Text | FieldKind::LongText, Some(FieldValue::Text(text))) => {
                if let Some(validator) = &field.validator
                    && let Err(message) = validator.check(text.trim())
                {
                    errors.add(&field.id, format!("{} {}", field.label, message));
                }
            }
            _ => {}
        }
    }
    errors
}
