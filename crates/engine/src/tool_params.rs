//! Parameter collection for MCP tools invoked straight from the palette.
//!
//! A tool's JSON schema is mapped onto form fields once, the user fills them
//! in (optionally pre-filled by an AI completion), and the submitted text is
//! coerced back into typed JSON arguments. Coercion failures are reported per
//! field, the same way wizard validation errors are.

use serde_json::{Map, Number, Value};
use skitz_types::{
    ActionDescriptor, AiProviderConfig, FieldChoice, FieldErrors, FieldKind, FieldSpec, FieldValue, FormValues, InputRequest, McpTool,
    Validator, validate_form,
};

/// JSON type of a tool parameter, as far as the form cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    fn of(schema: &Value) -> Self {
        let declared = match schema.get("type") {
            Some(Value::String(kind)) => Some(kind.as_str()),
            Some(Value::Array(kinds)) => kinds.iter().filter_map(Value::as_str).find(|kind| *kind != "null"),
            _ => None,
        };
        match declared {
            Some("integer") => ParamType::Integer,
            Some("number") => ParamType::Number,
            Some("boolean") => ParamType::Boolean,
            Some("array") => ParamType::Array,
            Some("object") => ParamType::Object,
            _ => ParamType::String,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

fn enum_values(schema: &Value) -> Option<&Vec<Value>> {
    schema.get("enum").and_then(Value::as_array).filter(|values| !values.is_empty())
}

/// Text shown for a JSON value inside a form field.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        other => other.to_string(),
    }
}

fn field_value(param: ParamType, value: &Value) -> FieldValue {
    match (param, value) {
        (ParamType::Boolean, Value::Bool(flag)) => FieldValue::Bool(*flag),
        _ => FieldValue::Text(display_value(value)),
    }
}

fn field_for(tool: &McpTool, name: &str) -> FieldSpec {
    let empty = Value::Null;
    let schema = tool.parameter_schema(name).unwrap_or(&empty);
    let param = ParamType::of(schema);

    let mut field = if let Some(values) = enum_values(schema) {
        let choices = values.iter().map(|value| FieldChoice::new(display_value(value), display_value(value))).collect();
        FieldSpec::select(name, name, choices)
    } else {
        match param {
            ParamType::Boolean => FieldSpec::confirm(name, name),
            ParamType::Integer => FieldSpec::text(name, name).validate_with(Validator::Integer),
            ParamType::Number => FieldSpec::text(name, name).validate_with(Validator::Number),
            ParamType::Array | ParamType::Object => FieldSpec::long_text(name, name).validate_with(Validator::Json),
            ParamType::String if schema.get("format").and_then(Value::as_str) == Some("uri") => {
                FieldSpec::text(name, name).validate_with(Validator::Url)
            }
            ParamType::String => FieldSpec::text(name, name),
        }
    };

    if let Some(description) = schema.get("description").and_then(Value::as_str) {
        field = field.describe(description);
    }
    if let Some(default) = schema.get("default") {
        field = field.default_value(field_value(param, default));
    }
    if param != ParamType::Boolean && tool.is_required(name) {
        field = field.required();
    }
    field
}

/// Form fields for every parameter of `tool`, in alphabetical order.
pub fn tool_fields(tool: &McpTool) -> Vec<FieldSpec> {
    tool.parameter_names().iter().map(|name| field_for(tool, name)).collect()
}

/// The parameter form for `tool`, with `prefill` values replacing schema defaults.
pub fn tool_request(tool: &McpTool, prefill: Option<&Map<String, Value>>) -> InputRequest {
    let fields = tool_fields(tool)
        .into_iter()
        .map(|field| match prefill.and_then(|values| values.get(&field.id)) {
            Some(value) if !value.is_null() => {
                let param = ParamType::of(tool.parameter_schema(&field.id).unwrap_or(&Value::Null));
                field.default_value(field_value(param, value))
            }
            _ => field,
        })
        .collect();

    let mut request = InputRequest::new(tool.palette_id(), tool.name.clone(), fields);
    if !tool.description.is_empty() {
        request = request.with_notice(tool.description.clone());
    }
    if prefill.is_some() {
        let notice = request.notice.take().map(|text| format!("{text} (pre-filled by AI, review before running)"));
        request.notice = notice.or_else(|| Some("Pre-filled by AI, review before running".to_string()));
    }
    request
}

/// Coerce submitted form values into typed tool arguments.
///
/// Blank optional fields are left out. Values that do not fit the declared
/// type come back as per-field errors.
pub fn finalize_arguments(tool: &McpTool, values: &FormValues) -> Result<Map<String, Value>, FieldErrors> {
    let fields = tool_fields(tool);
    let mut errors = validate_form(&fields, values);
    let mut arguments = Map::new();

    for field in &fields {
        if errors.get(&field.id).is_some() {
            continue;
        }
        let Some(value) = values.get(&field.id).filter(|value| !value.is_blank()) else {
            continue;
        };
        let schema = tool.parameter_schema(&field.id).unwrap_or(&Value::Null);
        match coerce(schema, field, value) {
            Ok(coerced) => {
                arguments.insert(field.id.clone(), coerced);
            }
            Err(message) => errors.add(&field.id, message),
        }
    }

    if errors.is_empty() { Ok(arguments) } else { Err(errors) }
}

fn coerce(schema: &Value, field: &FieldSpec, value: &FieldValue) -> Result<Value, String> {
    let param = ParamType::of(schema);
    if let FieldValue::Bool(flag) = value {
        return Ok(Value::Bool(*flag));
    }
    let raw = value.display();
    let text = raw.trim();

    // Enum values keep their declared JSON type.
    if let Some(allowed) = enum_values(schema) {
        return allowed
            .iter()
            .find(|candidate| display_value(candidate) == text)
            .cloned()
            .ok_or_else(|| format!("'{text}' is not one of the allowed values"));
    }

    match param {
        ParamType::Boolean => match text.to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
            "false" | "no" | "n" | "0" => Ok(Value::Bool(false)),
            _ => Err("must be true or false".to_string()),
        },
        ParamType::Integer => text
            .parse::<i64>()
            .map(|number| Value::Number(number.into()))
            .map_err(|_| "must be a whole number".to_string()),
        ParamType::Number => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| "must be a number".to_string()),
        ParamType::Array | ParamType::Object => {
            let parsed: Value = serde_json::from_str(text).map_err(|error| format!("invalid JSON: {error}"))?;
            let matches = match param {
                ParamType::Array => parsed.is_array(),
                _ => parsed.is_object(),
            };
            if matches {
                Ok(parsed)
            } else {
                Err(format!("expected a JSON {}", param.name()))
            }
        }
        ParamType::String if field.kind == FieldKind::LongText => Ok(Value::String(raw)),
        ParamType::String => Ok(Value::String(text.to_string())),
    }
}

/// One line per parameter: name, type, whether it is required, description.
pub fn describe_schema(tool: &McpTool) -> String {
    tool.parameter_names()
        .iter()
        .map(|name| {
            let schema = tool.parameter_schema(name).unwrap_or(&Value::Null);
            let mut line = format!("- {name} ({}", ParamType::of(schema).name());
            if tool.is_required(name) {
                line.push_str(", required");
            }
            line.push(')');
            if let Some(values) = enum_values(schema) {
                let allowed: Vec<String> = values.iter().map(display_value).collect();
                line.push_str(&format!(" one of [{}]", allowed.join(", ")));
            }
            if let Some(description) = schema.get("description").and_then(Value::as_str) {
                line.push_str(": ");
                line.push_str(description);
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// AI completion that proposes arguments for `tool` from a free-form task.
pub fn prefill_descriptor(tool: &McpTool, task: &str, provider: &AiProviderConfig) -> ActionDescriptor {
    let system = format!(
        "You fill in arguments for the MCP tool `{}`. {}\n\nParameters:\n{}\n\n\
         Respond with a single JSON object whose keys are parameter names. \
         Leave out parameters you cannot infer from the task.",
        tool.name,
        tool.description,
        describe_schema(tool)
    );
    ActionDescriptor::AiCompletion {
        provider: provider.clone(),
        system,
        prompt: task.to_string(),
        expect_json: true,
    }
}

/// Parse an AI prefill answer into an argument object, tolerating code fences.
pub fn parse_prefill(output: &str) -> Result<Map<String, Value>, String> {
    let mut text = output.trim();
    if let Some(fenced) = text.strip_prefix("```") {
        let body = fenced.split_once('\n').map_or("", |(_, rest)| rest);
        text = body.trim_end().strip_suffix("```").unwrap_or(body).trim();
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(arguments)) => Ok(arguments),
        Ok(_) => Err("AI response was not a JSON object".to_string()),
        Err(error) => Err(format!("AI response was not valid JSON: {error}")),
    }
}
