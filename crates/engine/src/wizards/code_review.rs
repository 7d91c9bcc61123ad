//! Send code to the BIA junior agent on the configured MCP server for review.

use std::path::PathBuf;

use serde_json::{Map, Value};
use skitz_types::config::DEFAULT_MCP_SERVER_NAME;
use skitz_types::{ActionDescriptor, ActionResult, FieldChoice, FieldErrors, FieldSpec, FieldValue, FormValues, InputRequest, McpServerConfig, WizardKind};

use crate::context::StepContext;
use crate::wizard::{AsyncResource, AsyncStep, RegistryError, StepPlan, StepSpec, StepTable, TerminalResult};

const TITLE: &str = "BIA Code Review";
const REVIEW_TOOL: &str = "bia_junior_agent";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodeSource {
    Paste,
    File,
}

/// Largest file accepted for review.
pub const MAX_REVIEW_FILE_BYTES: u64 = 512 * 1024;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CodeReviewData {
    pub source: Option<CodeSource>,
    pub path: Option<String>,
    pub file: AsyncResource<()>,
    pub code: Option<String>,
    pub review: AsyncResource<String>,
}

pub fn table() -> Result<StepTable<CodeReviewData>, RegistryError> {
    StepTable::new(
        WizardKind::CodeReview,
        vec![
            StepSpec::input("method", plan_method, submit_method),
            StepSpec::input("source", plan_source, submit_source),
            StepSpec::fetch("read", plan_read, submit_read, complete_read),
            StepSpec::action("review", plan_review, complete_review),
        ],
    )
}

fn plan_method(_data: &mut CodeReviewData, _ctx: &StepContext<'_>) -> StepPlan {
    StepPlan::Input(InputRequest::new(
        "method",
        "How would you like to provide code?",
        vec![
            FieldSpec::select(
                "method",
                "Input method",
                vec![
                    FieldChoice::new("Paste code directly", "paste"),
                    FieldChoice::new("Enter file path", "file"),
                ],
            )
            .required()
            .default_value(FieldValue::Text("paste".into())),
        ],
    ))
}

fn submit_method(data: &mut CodeReviewData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    data.source = Some(match values.text("method") {
        Some("file") => CodeSource::File,
        _ => CodeSource::Paste,
    });
    Ok(())
}

fn plan_source(data: &mut CodeReviewData, _ctx: &StepContext<'_>) -> StepPlan {
    let request = match data.source {
        Some(CodeSource::File) => file_request(None),
        _ => InputRequest::new(
            "source-paste",
            "Paste your code",
            vec![
                FieldSpec::long_text("code", "Code")
                    .required()
                    .placeholder("# Your Python code here\ndef hello():\n    print('Hello')"),
            ],
        ),
    };
    StepPlan::Input(request)
}

fn file_request(path: Option<&str>) -> InputRequest {
    let mut field = FieldSpec::text("path", "File path").required().placeholder("/path/to/file.py");
    if let Some(path) = path {
        field = field.default_value(FieldValue::Text(path.to_string()));
    }
    InputRequest::new("source-file", "File to review", vec![field])
}

fn submit_source(data: &mut CodeReviewData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    if data.source == Some(CodeSource::File) {
        data.path = values.text("path").map(str::to_string);
        data.file.reset();
        return Ok(());
    }

    let code = values.raw_text("code").unwrap_or_default();
    if code.trim().is_empty() {
        return Err(FieldErrors::single("code", "No code provided"));
    }
    data.code = Some(code.to_string());
    Ok(())
}

/// Loads the chosen file off the UI loop. A failed read stays on this step.
fn plan_read(data: &mut CodeReviewData, _ctx: &StepContext<'_>) -> StepPlan {
    if data.source != Some(CodeSource::File) || data.file.loaded().is_some() {
        return StepPlan::Skip;
    }
    let Some(path) = data.path.clone() else {
        return StepPlan::Input(file_request(None).with_errors(FieldErrors::single("path", "No file selected")));
    };

    match &data.file {
        AsyncResource::NotAttempted => {
            data.file.begin();
            StepPlan::Async(AsyncStep::load(
                ActionDescriptor::ReadFile {
                    path: PathBuf::from(&path),
                    max_bytes: MAX_REVIEW_FILE_BYTES,
                },
                format!("Reading {path}..."),
            ))
        }
        AsyncResource::Loading => StepPlan::Input(file_request(Some(&path)).with_notice(format!("Reading {path}..."))),
        AsyncResource::Failed(error) => {
            StepPlan::Input(file_request(Some(&path)).with_errors(FieldErrors::single("path", error.clone())))
        }
        AsyncResource::Loaded(()) => StepPlan::Skip,
    }
}

fn submit_read(data: &mut CodeReviewData, _values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    match data.file.error() {
        Some(error) => Err(FieldErrors::single("path", error)),
        None => Ok(()),
    }
}

fn complete_read(data: &mut CodeReviewData, result: &ActionResult) {
    if !result.success {
        data.file.finish(Err(format!("Failed to read file: {}", result.message())));
        return;
    }
    if result.output.trim().is_empty() {
        data.file.finish(Err("No code provided".to_string()));
        return;
    }
    data.code = Some(result.output.clone());
    data.file.finish(Ok(()));
}

/// The MCP server reviews go to: the default server when configured, otherwise the first one.
fn review_server(ctx: &StepContext<'_>) -> Option<McpServerConfig> {
    if !ctx.config.mcp.enabled {
        return None;
    }
    let servers = &ctx.config.mcp.servers;
    servers
        .iter()
        .find(|server| server.name == DEFAULT_MCP_SERVER_NAME)
        .or_else(|| servers.first())
        .cloned()
}

fn plan_review(data: &mut CodeReviewData, ctx: &StepContext<'_>) -> StepPlan {
    if let Some(feedback) = data.review.loaded() {
        return StepPlan::Terminal(TerminalResult::success(TITLE, feedback.clone()));
    }
    if let Some(error) = data.review.error() {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, format!("Error: {error}")));
    }

    let Some(code) = data.code.clone() else {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, "No code provided"));
    };
    let Some(server) = review_server(ctx) else {
        return StepPlan::Terminal(TerminalResult::failure(
            TITLE,
            "No MCP server configured. Enable MCP and add a server under Preferences.",
        ));
    };

    let mut arguments = Map::new();
    arguments.insert("code".into(), Value::String(code));
    data.review.begin();
    StepPlan::Async(AsyncStep::execute(
        ActionDescriptor::McpCallTool {
            server: server.name,
            url: server.url,
            tool: REVIEW_TOOL.to_string(),
            arguments,
        },
        "Reviewing code with BIA...",
    ))
}

fn complete_review(data: &mut CodeReviewData, result: &ActionResult) {
    let outcome = if result.success {
        Ok(extract_feedback(&result.output))
    } else {
        Err(result.message().to_string())
    };
    data.review.finish(outcome);
}

/// Structured tool output carries the review under `feedback` or `text`.
fn extract_feedback(output: &str) -> String {
    serde_json::from_str::<Value>(output)
        .ok()
        .and_then(|value| {
            ["feedback", "text"]
                .iter()
                .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| output.to_string())
}
