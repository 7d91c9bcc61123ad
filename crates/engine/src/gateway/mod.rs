//! External action gateway.
//!
//! Everything the palette cannot do synchronously goes through
//! [`ActionGateway::invoke`]: shelling out to a CLI, calling an AI endpoint,
//! talking to an MCP server, or touching a resource file. Callers wrap the call
//! in [`invoke_with_deadline`] (or [`run_request`], which also isolates panics)
//! so that every dispatch produces exactly one [`ActionResult`].

mod ai;
mod files;
mod mcp;
mod process;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use skitz_types::{ActionCompletion, ActionDescriptor, ActionRequest, ActionResult, Deadline};
use tracing::{debug, warn};

use mcp::McpHttpClient;

/// Substring of the failure reported when a program is not installed.
pub const PROGRAM_NOT_FOUND: &str = "command not found";

/// Runs external actions on behalf of the palette.
#[async_trait]
pub trait ActionGateway: Send + Sync {
    async fn invoke(&self, descriptor: &ActionDescriptor) -> ActionResult;
}

/// Invoke `descriptor`, turning an expired deadline into a failure result.
pub async fn invoke_with_deadline(gateway: &dyn ActionGateway, descriptor: &ActionDescriptor, deadline: Deadline) -> ActionResult {
    let limit = deadline.duration();
    match tokio::time::timeout(limit, gateway.invoke(descriptor)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(action = %descriptor.summary(), timeout_secs = limit.as_secs(), "action timed out");
            ActionResult::failure(format!("Timed out after {}s", limit.as_secs()))
        }
    }
}

/// Run a dispatched request to completion.
///
/// The invocation runs on its own task so that a panic inside a gateway
/// becomes a failure result instead of losing the completion.
pub async fn run_request(gateway: Arc<dyn ActionGateway>, request: ActionRequest) -> ActionCompletion {
    let ActionRequest {
        id,
        origin,
        descriptor,
        deadline,
    } = request;
    debug!(request = %id, action = %descriptor.summary(), ?deadline, "invoking action");

    let task = tokio::spawn(async move { invoke_with_deadline(gateway.as_ref(), &descriptor, deadline).await });
    let result = match task.await {
        Ok(result) => result,
        Err(join_error) => {
            warn!(request = %id, error = %join_error, "action task failed");
            ActionResult::failure(format!("Action failed unexpectedly: {join_error}"))
        }
    };
    debug!(request = %id, success = result.success, "action finished");

    ActionCompletion {
        request_id: id,
        origin,
        result,
    }
}

/// Gateway backed by local processes, HTTP and the filesystem.
#[derive(Clone, Debug)]
pub struct DefaultGateway {
    http: reqwest::Client,
}

impl DefaultGateway {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("skitz/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ActionGateway for DefaultGateway {
    async fn invoke(&self, descriptor: &ActionDescriptor) -> ActionResult {
        match descriptor {
            ActionDescriptor::Process { program, args, env } => process::run(program, args, env).await,
            ActionDescriptor::AiCompletion {
                provider,
                system,
                prompt,
                expect_json,
            } => ai::complete(&self.http, provider, system, prompt, *expect_json).await,
            ActionDescriptor::McpListTools { server, url } => McpHttpClient::new(self.http.clone(), server, url).list_tools().await,
            ActionDescriptor::McpCallTool {
                server,
                url,
                tool,
                arguments,
            } => McpHttpClient::new(self.http.clone(), server, url).call_tool(tool, arguments).await,
            ActionDescriptor::WriteFile {
                path,
                contents,
                create_new,
            } => files::write(path, contents, *create_new).await,
            ActionDescriptor::RemoveFile { path } => files::remove(path).await,
            ActionDescriptor::ReadFile { path, max_bytes } => files::read(path, *max_bytes).await,
        }
    }
}

type Responder = dyn Fn(&ActionDescriptor) -> ActionResult + Send + Sync;

/// Gateway that answers from a closure and records every call.
///
/// Used in tests and for `--dry-run` sessions where nothing should leave the machine.
pub struct ScriptedGateway {
    responder: Box<Responder>,
    delay: Option<Duration>,
    calls: Mutex<Vec<ActionDescriptor>>,
}

impl ScriptedGateway {
    pub fn new(responder: impl Fn(&ActionDescriptor) -> ActionResult + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with `result`.
    pub fn always(result: ActionResult) -> Self {
        Self::new(move |_| result.clone())
    }

    /// Wait before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<ActionDescriptor> {
        self.calls.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl ActionGateway for ScriptedGateway {
    async fn invoke(&self, descriptor: &ActionDescriptor) -> ActionResult {
        self.calls.lock().expect("lock poisoned").push(descriptor.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(descriptor)
    }
}

/// Flatten an error and its sources into one line.
pub(crate) fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
