//! Manage AI providers: add, edit, remove, and pick the default.
//!
//! New and edited providers get a one-message connection test before they are
//! saved. A failed test does not block saving; the user is asked first.

use skitz_types::{
    ActionDescriptor, ActionResult, AiProviderConfig, AiProviderType, ConfigChange, Deadline, FieldChoice, FieldErrors, FieldSpec,
    FieldValue, FormValues, InputRequest, Validator, WizardKind,
};

use crate::context::StepContext;
use crate::wizard::{AsyncResource, AsyncStep, RegistryError, StepPlan, StepSpec, StepTable, TerminalResult};

const TITLE: &str = "AI Providers";
const TEST_PROMPT: &str = "Hi";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderAction {
    Add,
    Edit(String),
    Remove(String),
    SetDefault,
}

impl ProviderAction {
    fn parse(raw: &str) -> Option<Self> {
        match raw.split_once(':') {
            Some(("edit", name)) => Some(ProviderAction::Edit(name.to_string())),
            Some(("remove", name)) => Some(ProviderAction::Remove(name.to_string())),
            None if raw == "add" => Some(ProviderAction::Add),
            None if raw == "default" => Some(ProviderAction::SetDefault),
            _ => None,
        }
    }

    fn edits_provider(&self) -> bool {
        matches!(self, ProviderAction::Add | ProviderAction::Edit(_))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigureProviderData {
    pub action: Option<ProviderAction>,
    pub provider_type: Option<AiProviderType>,
    pub draft: Option<AiProviderConfig>,
    pub connection: AsyncResource<()>,
    pub save_anyway: bool,
    pub default_choice: Option<String>,
}

pub fn table() -> Result<StepTable<ConfigureProviderData>, RegistryError> {
    StepTable::new(
        WizardKind::ConfigureProvider,
        vec![
            StepSpec::input("action", plan_action, submit_action),
            StepSpec::input("default", plan_default, submit_default),
            StepSpec::input("type", plan_type, submit_type),
            StepSpec::input("details", plan_details, submit_details),
            StepSpec::fetch("test", plan_test, submit_test, complete_test),
            StepSpec::terminal("save", plan_save),
        ],
    )
}

fn status(provider: &AiProviderConfig) -> &'static str {
    if provider.enabled { "enabled" } else { "disabled" }
}

fn plan_action(_data: &mut ConfigureProviderData, ctx: &StepContext<'_>) -> StepPlan {
    let providers = &ctx.config.ai.providers;
    let mut options = vec![FieldChoice::new("Add Provider", "add")];
    for provider in providers {
        options.push(FieldChoice::new(
            format!("Edit: {} [{}] ({})", provider.name, provider.provider_type.id(), status(provider)),
            format!("edit:{}", provider.name),
        ));
        options.push(FieldChoice::new(format!("Remove: {}", provider.name), format!("remove:{}", provider.name)));
    }
    if !providers.is_empty() {
        options.push(FieldChoice::new("Set Default Provider", "default"));
    }

    let notice = match ctx.config.active_provider() {
        Some(active) => format!("{} provider(s) configured, using '{}'", providers.len(), active.name),
        None => "No AI providers configured".to_string(),
    };
    StepPlan::Input(
        InputRequest::new("action", "AI Providers", vec![FieldSpec::select("action", "Action", options).required()]).with_notice(notice),
    )
}

fn submit_action(data: &mut ConfigureProviderData, values: &FormValues, ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    let action = values
        .text("action")
        .and_then(ProviderAction::parse)
        .ok_or_else(|| FieldErrors::single("action", "select one of the available options"))?;

    *data = ConfigureProviderData::default();
    if let ProviderAction::Edit(name) = &action {
        let existing = ctx
            .config
            .provider(name)
            .ok_or_else(|| FieldErrors::single("action", format!("Provider '{name}' no longer exists")))?;
        data.provider_type = Some(existing.provider_type);
        data.draft = Some(existing.clone());
    }
    data.action = Some(action);
    Ok(())
}

fn plan_default(data: &mut ConfigureProviderData, ctx: &StepContext<'_>) -> StepPlan {
    if data.action != Some(ProviderAction::SetDefault) {
        return StepPlan::Skip;
    }
    let current = ctx.config.ai.default_provider.as_deref();
    let options: Vec<FieldChoice> = ctx
        .config
        .ai
        .providers
        .iter()
        .filter(|provider| provider.enabled)
        .map(|provider| {
            let label = if Some(provider.name.as_str()) == current {
                format!("{} (current)", provider.name)
            } else {
                provider.name.clone()
            };
            FieldChoice::new(label, provider.name.clone())
        })
        .collect();
    if options.is_empty() {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, "No enabled providers"));
    }
    StepPlan::Input(InputRequest::new(
        "default",
        "Set Default Provider",
        vec![FieldSpec::select("provider", "Provider", options).required()],
    ))
}

fn submit_default(data: &mut ConfigureProviderData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    data.default_choice = values.text("provider").map(str::to_string);
    Ok(())
}

fn plan_type(data: &mut ConfigureProviderData, _ctx: &StepContext<'_>) -> StepPlan {
    if !data.action.as_ref().is_some_and(ProviderAction::edits_provider) {
        return StepPlan::Skip;
    }
    let options = AiProviderType::ALL
        .iter()
        .map(|kind| FieldChoice::new(type_label(*kind), kind.id()))
        .collect();
    let mut field = FieldSpec::select("type", "Provider Type", options).required();
    if let Some(current) = data.provider_type {
        field = field.default_value(FieldValue::Text(current.id().into()));
    }
    StepPlan::Input(InputRequest::new("type", "Provider Type", vec![field]))
}

fn type_label(kind: AiProviderType) -> &'static str {
    match kind {
        AiProviderType::Openai => "OpenAI",
        AiProviderType::Anthropic => "Anthropic (Claude)",
        AiProviderType::Ollama => "Ollama (Local)",
        AiProviderType::OpenaiCompatible => "OpenAI Compatible",
    }
}

fn submit_type(data: &mut ConfigureProviderData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    let kind = values
        .text("type")
        .and_then(AiProviderType::from_id)
        .ok_or_else(|| FieldErrors::single("type", "select one of the available options"))?;
    data.provider_type = Some(kind);
    Ok(())
}

fn plan_details(data: &mut ConfigureProviderData, _ctx: &StepContext<'_>) -> StepPlan {
    let (Some(action), Some(kind)) = (data.action.as_ref(), data.provider_type) else {
        return StepPlan::Skip;
    };
    if !action.edits_provider() {
        return StepPlan::Skip;
    }
    let existing = data.draft.as_ref();

    let mut fields = Vec::new();
    if *action == ProviderAction::Add {
        fields.push(
            FieldSpec::text("name", "Name")
                .describe("Name for this provider")
                .default_value(FieldValue::Text(kind.id().into())),
        );
    }
    if kind.requires_api_key() {
        let description = match kind {
            AiProviderType::Anthropic => "Anthropic API key (starts with sk-ant-)",
            AiProviderType::Openai => "OpenAI API key (starts with sk-)",
            _ => "API key",
        };
        let mut key = FieldSpec::text("api_key", "API Key").describe(description);
        if existing.and_then(|provider| provider.api_key.as_ref()).is_some() {
            key = key.placeholder("leave blank to keep the current key");
        } else {
            key = key.required();
        }
        fields.push(key);
    }
    if matches!(kind, AiProviderType::Ollama | AiProviderType::OpenaiCompatible) {
        let current = existing
            .and_then(|provider| provider.base_url.clone())
            .unwrap_or_else(|| kind.default_base_url().to_string());
        fields.push(
            FieldSpec::text("base_url", "Base URL")
                .required()
                .validate_with(Validator::Url)
                .default_value(FieldValue::Text(current)),
        );
    }
    let model = existing
        .and_then(|provider| provider.default_model.clone())
        .unwrap_or_else(|| kind.default_model().to_string());
    fields.push(FieldSpec::text("model", "Default Model").default_value(FieldValue::Text(model)));
    fields.push(
        FieldSpec::confirm("enabled", "Enabled").default_value(FieldValue::Bool(existing.is_none_or(|provider| provider.enabled))),
    );

    let title = match action {
        ProviderAction::Edit(name) => format!("Edit {name}"),
        _ => format!("Add {}", type_label(kind)),
    };
    StepPlan::Input(InputRequest::new("details", title, fields))
}

fn submit_details(data: &mut ConfigureProviderData, values: &FormValues, ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    let (Some(action), Some(kind)) = (data.action.clone(), data.provider_type) else {
        return Err(FieldErrors::form("Choose an action and provider type first"));
    };

    let name = match &action {
        ProviderAction::Edit(name) => name.clone(),
        _ => values.text("name").unwrap_or(kind.id()).to_string(),
    };
    if action == ProviderAction::Add && ctx.config.provider(&name).is_some() {
        return Err(FieldErrors::single("name", format!("Provider '{name}' already exists")));
    }

    let api_key = match values.text("api_key") {
        Some(key) => {
            if let Some(prefix) = kind.key_prefix()
                && !key.starts_with(prefix)
            {
                let message = match kind {
                    AiProviderType::Anthropic => "Anthropic keys start with sk-ant-",
                    _ => "OpenAI keys start with sk-",
                };
                return Err(FieldErrors::single("api_key", message));
            }
            Some(key.to_string())
        }
        None if kind.requires_api_key() => data.draft.as_ref().and_then(|provider| provider.api_key.clone()),
        None => None,
    };

    data.draft = Some(AiProviderConfig {
        name,
        provider_type: kind,
        api_key,
        base_url: values.text("base_url").map(str::to_string),
        default_model: values.text("model").map(str::to_string),
        enabled: values.flag("enabled"),
    });
    data.connection.reset();
    data.save_anyway = false;
    Ok(())
}

fn plan_test(data: &mut ConfigureProviderData, _ctx: &StepContext<'_>) -> StepPlan {
    if !data.action.as_ref().is_some_and(ProviderAction::edits_provider) {
        return StepPlan::Skip;
    }
    let Some(draft) = data.draft.clone() else {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, "No provider details entered"));
    };

    match data.connection.clone() {
        AsyncResource::Loaded(()) => StepPlan::Skip,
        AsyncResource::Failed(error) => StepPlan::Input(
            InputRequest::new(
                "test-failed",
                "Connection Test Failed",
                vec![FieldSpec::confirm("save_anyway", "Save anyway?").default_value(FieldValue::Bool(false))],
            )
            .with_notice(friendly_connection_error(&error)),
        ),
        AsyncResource::Loading => StepPlan::Input(
            InputRequest::new("test", "Testing Connection", Vec::new()).with_notice(format!("Testing {}...", draft.name)),
        ),
        AsyncResource::NotAttempted => {
            data.connection.begin();
            StepPlan::Async(
                AsyncStep::execute(
                    ActionDescriptor::AiCompletion {
                        provider: draft.clone(),
                        system: String::new(),
                        prompt: TEST_PROMPT.to_string(),
                        expect_json: false,
                    },
                    format!("Testing connection to {}...", draft.name),
                )
                .with_deadline(Deadline::Short)
                .advance_on_success(),
            )
        }
    }
}

fn submit_test(data: &mut ConfigureProviderData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    data.save_anyway = values.flag("save_anyway");
    Ok(())
}

fn complete_test(data: &mut ConfigureProviderData, result: &ActionResult) {
    let outcome = if result.success {
        Ok(())
    } else {
        Err(result.message().to_string())
    };
    data.connection.finish(outcome);
}

/// Map transport errors to something a user can act on.
fn friendly_connection_error(error: &str) -> String {
    let lowered = error.to_lowercase();
    if lowered.contains("401") {
        "Authentication failed - check your API key".to_string()
    } else if lowered.contains("connection refused") {
        "Connection refused - is the server running?".to_string()
    } else {
        format!("Connection failed: {error}")
    }
}

fn plan_save(data: &mut ConfigureProviderData, _ctx: &StepContext<'_>) -> StepPlan {
    let result = match data.action.clone() {
        Some(ProviderAction::Remove(name)) => {
            TerminalResult::success(TITLE, format!("Removed {name}")).with_config_change(ConfigChange::RemoveProvider(name))
        }
        Some(ProviderAction::SetDefault) => match data.default_choice.clone() {
            Some(name) => TerminalResult::success(TITLE, format!("Default provider: {name}"))
                .with_config_change(ConfigChange::SetDefaultProvider(name)),
            None => TerminalResult::failure(TITLE, "No provider selected"),
        },
        Some(action @ (ProviderAction::Add | ProviderAction::Edit(_))) => match data.draft.clone() {
            Some(_) if data.connection.error().is_some() && !data.save_anyway => {
                TerminalResult::failure(TITLE, "Provider not saved")
            }
            Some(provider) => {
                let verb = if action == ProviderAction::Add { "added" } else { "updated" };
                TerminalResult::success(TITLE, format!("Provider {} {verb}", provider.name))
                    .with_config_change(ConfigChange::UpsertProvider(provider))
            }
            None => TerminalResult::failure(TITLE, "No provider details entered"),
        },
        None => TerminalResult::failure(TITLE, "No action selected"),
    };
    StepPlan::Terminal(result)
}
