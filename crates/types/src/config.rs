//! Persisted application configuration model.
//!
//! The YAML file carries a schema `version`; loading and migration live in
//! `skitz-util`. Mutations coming out of wizards are expressed as
//! [`ConfigChange`] values so that the palette never writes the file itself.

use serde::{Deserialize, Serialize};

/// Schema version written by this build.
pub const CURRENT_CONFIG_VERSION: u32 = 2;

/// Default MCP server registered by the version 2 migration.
pub const DEFAULT_MCP_SERVER_NAME: &str = "bldrspec-ai";
pub const DEFAULT_MCP_SERVER_URL: &str = "http://localhost:8080/mcp";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Missing versions deserialize as 0 so that old files are migrated.
    #[serde(default)]
    pub version: u32,
    pub history: HistoryConfig,
    /// Favorite resource commands, in the order they were added.
    pub favorites: Vec<String>,
    pub ai: AiConfig,
    pub mcp: McpConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            history: HistoryConfig::default(),
            favorites: Vec::new(),
            ai: AiConfig::default(),
            mcp: McpConfig::default(),
        }
    }
}

impl AppConfig {
    /// The provider AI calls should go to: the configured default when enabled,
    /// otherwise the first enabled provider.
    pub fn active_provider(&self) -> Option<&AiProviderConfig> {
        let enabled = |provider: &&AiProviderConfig| provider.enabled;
        self.ai
            .default_provider
            .as_deref()
            .and_then(|name| self.ai.providers.iter().filter(enabled).find(|provider| provider.name == name))
            .or_else(|| self.ai.providers.iter().find(|provider| provider.enabled))
    }

    pub fn is_favorite(&self, command: &str) -> bool {
        self.favorites.iter().any(|favorite| favorite == command)
    }

    pub fn provider(&self, name: &str) -> Option<&AiProviderConfig> {
        self.ai.providers.iter().find(|provider| provider.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub max_items: usize,
    pub display_count: usize,
    pub persist: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_items: 50,
            display_count: 5,
            persist: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Pre-provider single key; folded into `providers` by the version 2 migration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,
    pub providers: Vec<AiProviderConfig>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AiProviderType {
    #[default]
    Openai,
    Anthropic,
    Ollama,
    OpenaiCompatible,
}

impl AiProviderType {
    pub const ALL: [AiProviderType; 4] = [
        AiProviderType::Openai,
        AiProviderType::Anthropic,
        AiProviderType::Ollama,
        AiProviderType::OpenaiCompatible,
    ];

    pub fn id(self) -> &'static str {
        match self {
            AiProviderType::Openai => "openai",
            AiProviderType::Anthropic => "anthropic",
            AiProviderType::Ollama => "ollama",
            AiProviderType::OpenaiCompatible => "openai-compatible",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AiProviderType::Openai => "OpenAI",
            AiProviderType::Anthropic => "Anthropic",
            AiProviderType::Ollama => "Ollama (local)",
            AiProviderType::OpenaiCompatible => "OpenAI-compatible endpoint",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// Expected API key prefix, when the provider issues recognizable keys.
    pub fn key_prefix(self) -> Option<&'static str> {
        match self {
            AiProviderType::Anthropic => Some("sk-ant-"),
            AiProviderType::Openai => Some("sk-"),
            AiProviderType::Ollama | AiProviderType::OpenaiCompatible => None,
        }
    }

    pub fn requires_api_key(self) -> bool {
        !matches!(self, AiProviderType::Ollama)
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            AiProviderType::Openai | AiProviderType::OpenaiCompatible => "https://api.openai.com/v1",
            AiProviderType::Anthropic => "https://api.anthropic.com/v1",
            AiProviderType::Ollama => "http://localhost:11434/v1",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            AiProviderType::Openai | AiProviderType::OpenaiCompatible => "gpt-4o-mini",
            AiProviderType::Anthropic => "claude-3-5-sonnet-latest",
            AiProviderType::Ollama => "llama3.1",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiProviderConfig {
    pub name: String,
    pub provider_type: AiProviderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    pub enabled: bool,
}

impl AiProviderConfig {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(self.provider_type.default_base_url())
    }

    pub fn model(&self) -> &str {
        self.default_model
            .as_deref()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or(self.provider_type.default_model())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    pub enabled: bool,
    pub refresh_seconds: u64,
    pub servers: Vec<McpServerConfig>,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_seconds: 60,
            servers: vec![McpServerConfig::default_server()],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    pub url: String,
}

impl McpServerConfig {
    pub fn default_server() -> Self {
        Self {
            name: DEFAULT_MCP_SERVER_NAME.to_string(),
            url: DEFAULT_MCP_SERVER_URL.to_string(),
        }
    }
}

/// A settings mutation produced by a wizard and applied by the runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigChange {
    /// Insert a provider, or replace the one with the same name.
    UpsertProvider(AiProviderConfig),
    RemoveProvider(String),
    SetDefaultProvider(String),
    SetHistory(HistoryConfig),
    SetMcp { enabled: bool, refresh_seconds: u64 },
    /// Insert a server, or replace the one with the same name.
    UpsertMcpServer(McpServerConfig),
    RemoveMcpServer(String),
    /// Add a resource command to the favorites or drop it from them.
    SetFavorite { command: String, favorite: bool },
}

impl ConfigChange {
    /// Apply the change in place.
    pub fn apply(&self, config: &mut AppConfig) {
        match self {
            ConfigChange::UpsertProvider(provider) => {
                match config.ai.providers.iter_mut().find(|existing| existing.name == provider.name) {
                    Some(existing) => *existing = provider.clone(),
                    None => config.ai.providers.push(provider.clone()),
                }
                if config.ai.default_provider.is_none() {
                    config.ai.default_provider = Some(provider.name.clone());
                }
            }
            ConfigChange::RemoveProvider(name) => {
                config.ai.providers.retain(|provider| &provider.name != name);
                if config.ai.default_provider.as_ref() == Some(name) {
                    config.ai.default_provider = config.ai.providers.first().map(|provider| provider.name.clone());
                }
            }
            ConfigChange::SetDefaultProvider(name) => {
                config.ai.default_provider = Some(name.clone());
            }
            ConfigChange::SetHistory(history) => {
                config.history = history.clone();
            }
            ConfigChange::SetMcp { enabled, refresh_seconds } => {
                config.mcp.enabled = *enabled;
                config.mcp.refresh_seconds = *refresh_seconds;
            }
            ConfigChange::UpsertMcpServer(server) => {
                match config.mcp.servers.iter_mut().find(|existing| existing.name == server.name) {
                    Some(existing) => *existing = server.clone(),
                    None => config.mcp.servers.push(server.clone()),
                }
            }
            ConfigChange::RemoveMcpServer(name) => {
                config.mcp.servers.retain(|server| &server.name != name);
            }
            ConfigChange::SetFavorite { command, favorite } => {
                if !*favorite {
                    config.favorites.retain(|existing| existing != command);
                } else if !config.is_favorite(command) {
                    config.favorites.push(command.clone());
                }
            }
        }
    }

    /// One-line description for notifications.
    pub fn describe(&self) -> String {
        match self {
            ConfigChange::UpsertProvider(provider) => format!("Saved provider '{}'", provider.name),
            ConfigChange::RemoveProvider(name) => format!("Removed provider '{name}'"),
            ConfigChange::SetDefaultProvider(name) => format!("Default provider set to '{name}'"),
            ConfigChange::SetHistory(_) => "History settings updated".to_string(),
            ConfigChange::SetMcp { .. } => "MCP settings updated".to_string(),
            ConfigChange::UpsertMcpServer(server) => format!("Saved MCP server '{}'", server.name),
            ConfigChange::RemoveMcpServer(name) => format!("Removed MCP server '{name}'"),
            ConfigChange::SetFavorite { command, favorite: true } => format!("Favorited: {command}"),
            ConfigChange::SetFavorite { command, favorite: false } => format!("Unfavorited: {command}"),
        }
    }
}
