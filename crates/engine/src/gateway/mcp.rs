//! Minimal MCP client over streamable HTTP.
//!
//! Each call performs its own `initialize` handshake, so no session state is
//! kept between palette actions. Responses may arrive either as a JSON body
//! or as a `text/event-stream` carrying the JSON-RPC reply in a `data:` line.

use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use serde_json::{Map, Value, json};
use skitz_types::ActionResult;
use tracing::{debug, warn};

use super::error_chain;

const PROTOCOL_VERSION: &str = "2025-03-26";
const SESSION_HEADER: &str = "Mcp-Session-Id";

pub struct McpHttpClient {
    http: Client,
    server: String,
    url: String,
    session: Option<HeaderValue>,
    next_id: u64,
}

impl McpHttpClient {
    pub fn new(http: Client, server: &str, url: &str) -> Self {
        Self {
            http,
            server: server.to_string(),
            url: url.to_string(),
            session: None,
            next_id: 1,
        }
    }

    /// `tools/list`; the output is the JSON result object (`{"tools": [...]}`).
    pub async fn list_tools(mut self) -> ActionResult {
        match self.session_request("tools/list", json!({})).await {
            Ok(result) => ActionResult::ok(result.to_string()),
            Err(error) => self.failure("tools/list", error),
        }
    }

    /// `tools/call`; the output is the tool's text content.
    pub async fn call_tool(mut self, tool: &str, arguments: &Map<String, Value>) -> ActionResult {
        let params = json!({ "name": tool, "arguments": arguments });
        match self.session_request("tools/call", params).await {
            Ok(result) => tool_result(&result),
            Err(error) => self.failure(tool, error),
        }
    }

    fn failure(&self, operation: &str, error: String) -> ActionResult {
        warn!(server = %self.server, operation, error = %error, "MCP request failed");
        ActionResult::failure(error)
    }

    async fn session_request(&mut self, method: &str, params: Value) -> Result<Value, String> {
        self.initialize().await?;
        self.request(method, params).await
    }

    async fn initialize(&mut self) -> Result<(), String> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": "skitz", "version": env!("CARGO_PKG_VERSION") },
        });
        self.request("initialize", params).await?;
        self.notify("notifications/initialized").await?;
        debug!(server = %self.server, session = self.session.is_some(), "MCP session initialized");
        Ok(())
    }

    async fn notify(&self, method: &str) -> Result<(), String> {
        let body = json!({ "jsonrpc": "2.0", "method": method });
        let response = self.post(&body).send().await.map_err(|error| error_chain(&error))?;
        if !response.status().is_success() {
            return Err(format!("{method} rejected with HTTP {}", response.status().as_u16()));
        }
        Ok(())
    }

    async fn request(&mut self, method: &str, params: Value) -> Result<Value, String> {
        let id = self.next_id;
        self.next_id += 1;
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });

        let response = self.post(&body).send().await.map_err(|error| error_chain(&error))?;
        let status = response.status();
        if let Some(session) = response.headers().get(SESSION_HEADER) {
            self.session = Some(session.clone());
        }
        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("text/event-stream"));
        let text = response.text().await.map_err(|error| error_chain(&error))?;
        if !status.is_success() {
            return Err(format!("{method} failed with HTTP {}: {}", status.as_u16(), text.trim()));
        }

        let reply = if is_stream {
            find_sse_reply(&text, id).ok_or_else(|| format!("{method}: no reply in event stream"))?
        } else {
            serde_json::from_str(&text).map_err(|error| format!("{method}: invalid JSON reply: {error}"))?
        };
        rpc_result(reply)
    }

    fn post(&self, body: &Value) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .post(&self.url)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(body);
        if let Some(session) = &self.session {
            request = request.header(SESSION_HEADER, session.clone());
        }
        request
    }
}

/// The JSON-RPC reply with `id` among the `data:` lines of an event stream.
fn find_sse_reply(stream: &str, id: u64) -> Option<Value> {
    stream
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<Value>(data.trim()).ok())
        .find(|value| value.get("id").and_then(Value::as_u64) == Some(id))
}

fn rpc_result(reply: Value) -> Result<Value, String> {
    if let Some(error) = reply.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = error.get("message").and_then(Value::as_str).unwrap_or("unknown error");
        return Err(format!("MCP error {code}: {message}"));
    }
    reply.get("result").cloned().ok_or_else(|| "MCP reply carried no result".to_string())
}

/// Map a `tools/call` result to an action result.
fn tool_result(result: &Value) -> ActionResult {
    let text: Vec<&str> = result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    let output = if text.is_empty() {
        result.get("structuredContent").map(Value::to_string).unwrap_or_default()
    } else {
        text.join("\n")
    };

    if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
        let message = if output.is_empty() { "Tool reported an error".to_string() } else { output };
        ActionResult::failure(message)
    } else {
        ActionResult::ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_stream_reply_is_matched_by_id() {
        let stream = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n\n\
                      event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"tools\":[]}}\n\n";
        let reply = find_sse_reply(stream, 2).unwrap();
        assert_eq!(rpc_result(reply).unwrap(), json!({ "tools": [] }));
        assert!(find_sse_reply(stream, 3).is_none());
    }

    #[test]
    fn rpc_errors_are_reported() {
        let reply = json!({ "jsonrpc": "2.0", "id": 1, "error": { "code": -32601, "message": "Method not found" } });
        assert_eq!(rpc_result(reply), Err("MCP error -32601: Method not found".to_string()));
    }

    #[test]
    fn tool_errors_become_failures() {
        let result = json!({ "content": [{ "type": "text", "text": "bad input" }], "isError": true });
        assert_eq!(tool_result(&result), ActionResult::failure("bad input"));

        let result = json!({ "content": [{ "type": "text", "text": "line one" }, { "type": "text", "text": "line two" }] });
        assert_eq!(tool_result(&result), ActionResult::ok("line one\nline two"));

        let result = json!({ "content": [], "structuredContent": { "feedback": "ok" } });
        assert_eq!(tool_result(&result).output, r#"{"feedback":"ok"}"#);
    }
}
