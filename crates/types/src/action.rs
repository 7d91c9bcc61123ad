//! External action descriptors, correlation ids and results.
//!
//! Every side effect the palette asks for (shelling out to a CLI, calling an
//! AI endpoint, talking to an MCP server, touching a resource file) is
//! described by an [`ActionDescriptor`] and dispatched as an
//! [`ActionRequest`]. The request carries a [`RequestId`] so that the
//! completion can be matched against whatever is still waiting for it.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::AiProviderConfig;

/// Timeout applied to status probes and listing calls.
pub const SHORT_ACTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout applied to AI calls, deployments and tool invocations.
pub const LONG_ACTION_TIMEOUT: Duration = Duration::from_secs(120);

/// Process-wide correlation id attached to every dispatched action.
///
/// Ids are handed out from a monotonically increasing counter, so a
/// completion can never be mistaken for one issued later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    /// Allocate the next id.
    pub fn next() -> Self {
        static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// How long an action may run before it is reported as failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Deadline {
    /// Status checks and listings (~5 s).
    Short,
    /// AI calls, deployments and tool calls (~120 s).
    #[default]
    Long,
}

impl Deadline {
    pub fn duration(self) -> Duration {
        match self {
            Deadline::Short => SHORT_ACTION_TIMEOUT,
            Deadline::Long => LONG_ACTION_TIMEOUT,
        }
    }
}

/// Description of a side effect to run outside the UI loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ActionDescriptor {
    /// Run a local program and capture its combined output.
    Process {
        program: String,
        args: Vec<String>,
        #[serde(default)]
        env: Vec<(String, String)>,
    },
    /// Ask an AI provider for a completion.
    AiCompletion {
        provider: AiProviderConfig,
        system: String,
        prompt: String,
        /// Request a JSON object response.
        expect_json: bool,
    },
    /// List the tools exposed by an MCP server.
    McpListTools { server: String, url: String },
    /// Invoke a tool on an MCP server.
    McpCallTool {
        server: String,
        url: String,
        tool: String,
        arguments: Map<String, Value>,
    },
    /// Write a text file. With `create_new` the write fails when the file exists.
    WriteFile { path: PathBuf, contents: String, create_new: bool },
    /// Remove a file.
    RemoveFile { path: PathBuf },
    /// Read a text file of at most `max_bytes` bytes.
    ReadFile { path: PathBuf, max_bytes: u64 },
}

impl ActionDescriptor {
    /// Short, secret-free label used in logs and history.
    pub fn summary(&self) -> String {
        match self {
            ActionDescriptor::Process { program, args, .. } => {
                let head: Vec<&str> = args.iter().take(3).map(String::as_str).collect();
                format!("{program} {}", head.join(" "))
            }
            ActionDescriptor::AiCompletion { provider, .. } => format!("ai:{} completion", provider.name),
            ActionDescriptor::McpListTools { server, .. } => format!("mcp:{server} tools/list"),
            ActionDescriptor::McpCallTool { server, tool, .. } => format!("mcp:{server}:{tool}"),
            ActionDescriptor::WriteFile { path, .. } => format!("write {}", path.display()),
            ActionDescriptor::RemoveFile { path } => format!("remove {}", path.display()),
            ActionDescriptor::ReadFile { path, .. } => format!("read {}", path.display()),
        }
    }
}

/// Outcome of an external action.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// Failure that still carries whatever the action printed.
    pub fn failure_with_output(error: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            error: Some(error.into()),
        }
    }

    /// The text worth showing to a user: the error for failures, the output otherwise.
    pub fn message(&self) -> &str {
        match (&self.error, self.success) {
            (Some(error), false) if !error.trim().is_empty() => error,
            _ => &self.output,
        }
    }
}

/// Who is waiting for a completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionOrigin {
    /// The palette's active wizard or pending tool.
    Palette,
    /// Background discovery of an MCP server's tools.
    ToolDiscovery { server: String },
}

/// A dispatched action.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionRequest {
    pub id: RequestId,
    pub origin: ActionOrigin,
    pub descriptor: ActionDescriptor,
    pub deadline: Deadline,
}

/// Completion delivered back into the UI loop, exactly once per request.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionCompletion {
    pub request_id: RequestId,
    pub origin: ActionOrigin,
    pub result: ActionResult,
}
