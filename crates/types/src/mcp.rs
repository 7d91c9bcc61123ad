use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool advertised by an MCP server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    /// Name of the server (from config) that exposes the tool.
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub server_url: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Value,
}

impl McpTool {
    /// Palette item id: `mcp:<server>:<tool>`.
    pub fn palette_id(&self) -> String {
        format!("mcp:{}:{}", self.server, self.name)
    }

    /// Parameter names sorted alphabetically.
    pub fn parameter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .input_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| properties.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn parameter_schema(&self, name: &str) -> Option<&Value> {
        self.input_schema.get("properties").and_then(|properties| properties.get(name))
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .is_some_and(|required| required.iter().any(|entry| entry.as_str() == Some(name)))
    }

    pub fn has_parameters(&self) -> bool {
        !self.parameter_names().is_empty()
    }
}

#[derive(Deserialize)]
struct ToolListPayload {
    #[serde(default)]
    tools: Vec<McpTool>,
}

/// Parse a `tools/list` result payload and stamp each tool with its server.
pub fn parse_tool_list(server: &str, server_url: &str, payload: &str) -> Result<Vec<McpTool>, serde_json::Error> {
    let parsed: ToolListPayload = serde_json::from_str(payload)?;
    Ok(parsed
        .tools
        .into_iter()
        .map(|mut tool| {
            tool.server = server.to_string();
            tool.server_url = server_url.to_string();
            tool
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_list_is_stamped_with_server() {
        let payload = r#"{"tools":[{"name":"search","description":"Search docs","inputSchema":{"type":"object","properties":{"query":{"type":"string"},"limit":{"type":"integer"}},"required":["query"]}}]}"#;
        let tools = parse_tool_list("docs", "http://localhost:9000/mcp", payload).unwrap();
        assert_eq!(tools.len(), 1);
        let tool = &tools[0];
        assert_eq!(tool.palette_id(), "mcp:docs:search");
        assert_eq!(tool.parameter_names(), vec!["limit".to_string(), "query".to_string()]);
        assert!(tool.is_required("query"));
        assert!(!tool.is_required("limit"));
    }
}
