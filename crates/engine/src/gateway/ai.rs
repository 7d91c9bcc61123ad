//! Chat completions against OpenAI-compatible and Anthropic endpoints.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use skitz_types::{ActionResult, AiProviderConfig, AiProviderType};
use skitz_util::{redact_sensitive, truncate_display};
use tracing::{debug, warn};

use super::error_chain;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 4096;
const ERROR_BODY_WIDTH: usize = 300;

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: Option<String>,
}

pub(super) async fn complete(client: &Client, provider: &AiProviderConfig, system: &str, prompt: &str, expect_json: bool) -> ActionResult {
    debug!(provider = %provider.name, model = %provider.model(), expect_json, "requesting completion");
    let outcome = match provider.provider_type {
        AiProviderType::Anthropic => anthropic(client, provider, system, prompt).await,
        _ => openai_compatible(client, provider, system, prompt, expect_json).await,
    };
    match outcome {
        Ok(text) => ActionResult::ok(text),
        Err(error) => {
            warn!(provider = %provider.name, error = %redact_sensitive(&error), "completion failed");
            ActionResult::failure(error)
        }
    }
}

fn endpoint(provider: &AiProviderConfig, path: &str) -> String {
    format!("{}/{path}", provider.base_url().trim_end_matches('/'))
}

async fn openai_compatible(
    client: &Client,
    provider: &AiProviderConfig,
    system: &str,
    prompt: &str,
    expect_json: bool,
) -> Result<String, String> {
    let mut messages = Vec::new();
    if !system.is_empty() {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({ "role": "user", "content": prompt }));

    let mut body = json!({ "model": provider.model(), "messages": messages });
    if expect_json {
        body["response_format"] = json!({ "type": "json_object" });
    }

    let mut request = client.post(endpoint(provider, "chat/completions")).json(&body);
    if let Some(key) = provider.api_key.as_deref().filter(|key| !key.is_empty()) {
        request = request.bearer_auth(key);
    }
    let payload = send(request).await?;
    let parsed: ChatResponse = serde_json::from_value(payload).map_err(|error| format!("Unexpected response: {error}"))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| "Response contained no message".to_string())
}

async fn anthropic(client: &Client, provider: &AiProviderConfig, system: &str, prompt: &str) -> Result<String, String> {
    let mut body = json!({
        "model": provider.model(),
        "max_tokens": ANTHROPIC_MAX_TOKENS,
        "messages": [{ "role": "user", "content": prompt }],
    });
    if !system.is_empty() {
        body["system"] = Value::String(system.to_string());
    }

    let request = client
        .post(endpoint(provider, "messages"))
        .header("x-api-key", provider.api_key.as_deref().unwrap_or_default())
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&body);
    let payload = send(request).await?;
    let parsed: AnthropicResponse = serde_json::from_value(payload).map_err(|error| format!("Unexpected response: {error}"))?;
    let text: Vec<String> = parsed.content.into_iter().filter_map(|block| block.text).collect();
    if text.is_empty() {
        return Err("Response contained no text".to_string());
    }
    Ok(text.join("\n"))
}

async fn send(request: reqwest::RequestBuilder) -> Result<Value, String> {
    let response = request.send().await.map_err(|error| error_chain(&error))?;
    let status = response.status();
    let body = response.text().await.map_err(|error| error_chain(&error))?;
    if !status.is_success() {
        return Err(format!("HTTP {}: {}", status.as_u16(), truncate_display(body.trim(), ERROR_BODY_WIDTH)));
    }
    serde_json::from_str(&body).map_err(|error| format!("Invalid JSON response: {error}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_tolerate_trailing_slashes() {
        let provider = AiProviderConfig {
            name: "local".into(),
            provider_type: AiProviderType::Ollama,
            base_url: Some("http://localhost:11434/v1/".into()),
            ..AiProviderConfig::default()
        };
        assert_eq!(endpoint(&provider, "chat/completions"), "http://localhost:11434/v1/chat/completions");
    }

    #[tokio::test]
    async fn refused_connections_mention_the_cause() {
        let provider = AiProviderConfig {
            name: "nowhere".into(),
            provider_type: AiProviderType::OpenaiCompatible,
            base_url: Some("http://127.0.0.1:9".into()),
            enabled: true,
            ..AiProviderConfig::default()
        };
        let client = Client::new();
        let result = complete(&client, &provider, "", "Hi", false).await;
        assert!(!result.success);
        assert!(!result.message().is_empty());
    }
}
