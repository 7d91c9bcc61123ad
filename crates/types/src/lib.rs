//! Shared type definitions for the skitz dashboard.
//!
//! Plain data that crosses crate boundaries: form descriptors, action
//! descriptors and results, the configuration model, and the `Msg` / `Effect`
//! enums that connect the palette state machine to the runtime.

pub mod action;
pub mod config;
pub mod form;
pub mod mcp;
pub mod wizard;

pub use action::{
    ActionCompletion, ActionDescriptor, ActionOrigin, ActionRequest, ActionResult, Deadline, LONG_ACTION_TIMEOUT, RequestId,
    SHORT_ACTION_TIMEOUT,
};
pub use config::{AiProviderConfig, AiProviderType, AppConfig, ConfigChange, HistoryConfig, McpConfig, McpServerConfig};
pub use form::{FieldChoice, FieldErrors, FieldKind, FieldSpec, FieldValue, FormValues, InputRequest, Validator, validate_form};
pub use mcp::McpTool;
pub use wizard::WizardKind;

/// Severity of a transient notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A short message shown in the corner of the dashboard for a few seconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub text: String,
}

impl Notification {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            text: text.into(),
        }
    }

    pub fn icon(&self) -> &'static str {
        match self.level {
            NotificationLevel::Info => "ℹ",
            NotificationLevel::Success => "✓",
            NotificationLevel::Warning => "⚠",
            NotificationLevel::Error => "✗",
        }
    }
}

/// A finished palette action, recorded in command history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandRecord {
    /// What ran, e.g. `deploy` or `mcp:docs:search`.
    pub command: String,
    /// Tool family, e.g. `wizard` or `mcp`.
    pub tool: String,
    pub success: bool,
}

/// Messages that can be sent to update the application state.
#[derive(Debug, Clone)]
pub enum Msg {
    /// Periodic UI tick (notification expiry, throbbers)
    Tick,
    /// Terminal resized
    Resize(u16, u16),
    /// A dispatched external action finished
    ActionCompleted(ActionCompletion),
}

/// Side effects requested by state transitions.
///
/// Components never perform I/O themselves; they return effects and the
/// runtime turns them into spawned tasks or store writes.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Run an external action and deliver `Msg::ActionCompleted` when done
    InvokeAction(ActionRequest),
    /// Show a transient notification
    Notify(Notification),
    /// Apply a settings change and persist the config file
    ApplyConfig(ConfigChange),
    /// Append an entry to command history
    RecordCommand(CommandRecord),
    /// Re-list tools on every configured MCP server
    RefreshTools,
    /// Re-scan the resources directory
    ReloadResources,
    /// Drop all command history
    ClearHistory,
}
