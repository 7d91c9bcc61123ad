use skitz_types::{
    ConfigChange, FieldChoice, FieldErrors, FieldSpec, FieldValue, FormValues, HistoryConfig, InputRequest, McpServerConfig, Validator,
    WizardKind,
};

use crate::context::StepContext;
use crate::wizard::{RegistryError, StepPlan, StepSpec, StepTable, TerminalResult};

const TITLE: &str = "Preferences";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreferenceSection {
    History,
    Mcp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum McpAction {
    Add,
    Edit(String),
    Remove(String),
    Toggle,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PreferencesData {
    pub section: Option<PreferenceSection>,
    pub history: Option<HistoryConfig>,
    pub mcp_action: Option<McpAction>,
    pub server: Option<McpServerConfig>,
}

pub fn table() -> Result<StepTable<PreferencesData>, RegistryError> {
    StepTable::new(
        WizardKind::Preferences,
        vec![
            StepSpec::input("section", plan_section, submit_section),
            StepSpec::input("settings", plan_settings, submit_settings),
            StepSpec::input("server", plan_server, submit_server),
            StepSpec::terminal("save", plan_save),
        ],
    )
}

fn plan_section(_data: &mut PreferencesData, _ctx: &StepContext<'_>) -> StepPlan {
    StepPlan::Input(InputRequest::new(
        "section",
        "Preferences",
        vec![
            FieldSpec::select(
                "section",
                "Section",
                vec![FieldChoice::new("History Settings", "history"), FieldChoice::new("MCP Servers", "mcp")],
            )
            .required(),
        ],
    ))
}

fn submit_section(data: &mut PreferencesData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    *data = PreferencesData::default();
    data.section = match values.text("section") {
        Some("history") => Some(PreferenceSection::History),
        Some("mcp") => Some(PreferenceSection::Mcp),
        _ => return Err(FieldErrors::single("section", "select one of the available options")),
    };
    Ok(())
}

fn plan_settings(data: &mut PreferencesData, ctx: &StepContext<'_>) -> StepPlan {
    match data.section {
        Some(PreferenceSection::History) => {
            let history = &ctx.config.history;
            StepPlan::Input(InputRequest::new(
                "settings-history",
                "History Settings",
                vec![
                    FieldSpec::confirm("enabled", "Enable History").default_value(FieldValue::Bool(history.enabled)),
                    FieldSpec::text("max_items", "Max Items")
                        .describe("Maximum number of history items to keep")
                        .validate_with(Validator::PositiveInteger)
                        .default_value(FieldValue::Text(history.max_items.to_string())),
                    FieldSpec::text("display_count", "Display Count")
                        .describe("Number of recent items to show in the palette")
                        .validate_with(Validator::PositiveInteger)
                        .default_value(FieldValue::Text(history.display_count.to_string())),
                ],
            ))
        }
        Some(PreferenceSection::Mcp) => {
            let mcp = &ctx.config.mcp;
            let mut options = vec![FieldChoice::new("Add New Server", "add")];
            for server in &mcp.servers {
                options.push(FieldChoice::new(format!("Edit: {}", server.name), format!("edit:{}", server.name)).with_hint(server.url.clone()));
                options.push(FieldChoice::new(format!("Remove: {}", server.name), format!("remove:{}", server.name)));
            }
            let state = if mcp.enabled { "on" } else { "off" };
            options.push(FieldChoice::new(format!("Toggle MCP (currently {state})"), "toggle"));
            StepPlan::Input(
                InputRequest::new("settings-mcp", "MCP Servers", vec![FieldSpec::select("action", "Action", options).required()])
                    .with_notice(format!("{} server(s) configured", mcp.servers.len())),
            )
        }
        None => StepPlan::Terminal(TerminalResult::failure(TITLE, "No section selected")),
    }
}

fn submit_settings(data: &mut PreferencesData, values: &FormValues, ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    match data.section {
        Some(PreferenceSection::History) => {
            let current = &ctx.config.history;
            // Blank counts keep the current value.
            let count = |id: &str, fallback: usize| values.text(id).and_then(|raw| raw.parse().ok()).unwrap_or(fallback);
            data.history = Some(HistoryConfig {
                enabled: values.flag("enabled"),
                max_items: count("max_items", current.max_items),
                display_count: count("display_count", current.display_count),
                persist: current.persist,
            });
        }
        Some(PreferenceSection::Mcp) => {
            let raw = values.text("action").unwrap_or_default();
            data.mcp_action = Some(match raw.split_once(':') {
                Some(("edit", name)) => McpAction::Edit(name.to_string()),
                Some(("remove", name)) => McpAction::Remove(name.to_string()),
                None if raw == "add" => McpAction::Add,
                None if raw == "toggle" => McpAction::Toggle,
                _ => return Err(FieldErrors::single("action", "select one of the available options")),
            });
        }
        None => return Err(FieldErrors::form("No section selected")),
    }
    Ok(())
}

fn plan_server(data: &mut PreferencesData, ctx: &StepContext<'_>) -> StepPlan {
    let existing = match &data.mcp_action {
        Some(McpAction::Add) => None,
        Some(McpAction::Edit(name)) => ctx.config.mcp.servers.iter().find(|server| &server.name == name),
        _ => return StepPlan::Skip,
    };

    let mut name = FieldSpec::text("name", "Server Name").required().placeholder("my-server");
    let mut url = FieldSpec::text("url", "Server URL")
        .required()
        .placeholder("http://localhost:8001/mcp/")
        .validate_with(Validator::Url);
    if let Some(server) = existing {
        name = name.default_value(FieldValue::Text(server.name.clone()));
        url = url.default_value(FieldValue::Text(server.url.clone()));
    }
    let title = if existing.is_some() { "Edit MCP Server" } else { "Add MCP Server" };
    StepPlan::Input(InputRequest::new("server", title, vec![name, url]))
}

fn submit_server(data: &mut PreferencesData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    let (Some(name), Some(url)) = (values.text("name"), values.text("url")) else {
        return Err(FieldErrors::form("Name and URL are required"));
    };
    data.server = Some(McpServerConfig {
        name: name.to_string(),
        url: url.to_string(),
    });
    Ok(())
}

fn plan_save(data: &mut PreferencesData, ctx: &StepContext<'_>) -> StepPlan {
    let result = match (&data.section, &data.mcp_action) {
        (Some(PreferenceSection::History), _) => match data.history.clone() {
            Some(history) => TerminalResult::success(TITLE, "History settings saved").with_config_change(ConfigChange::SetHistory(history)),
            None => TerminalResult::failure(TITLE, "No history settings entered"),
        },
        (_, Some(McpAction::Toggle)) => {
            let enabled = !ctx.config.mcp.enabled;
            let state = if enabled { "enabled" } else { "disabled" };
            TerminalResult::success(TITLE, format!("MCP {state}")).with_config_change(ConfigChange::SetMcp {
                enabled,
                refresh_seconds: ctx.config.mcp.refresh_seconds,
            })
        }
        (_, Some(McpAction::Remove(name))) => {
            TerminalResult::success(TITLE, format!("Removed {name}")).with_config_change(ConfigChange::RemoveMcpServer(name.clone()))
        }
        (_, Some(action @ (McpAction::Add | McpAction::Edit(_)))) => match data.server.clone() {
            Some(server) => {
                let mut result = TerminalResult::success(TITLE, "MCP server saved");
                if let McpAction::Edit(previous) = action
                    && previous != &server.name
                {
                    result = result.with_config_change(ConfigChange::RemoveMcpServer(previous.clone()));
                }
                result.with_config_change(ConfigChange::UpsertMcpServer(server))
            }
            None => TerminalResult::failure(TITLE, "Name and URL are required"),
        },
        _ => TerminalResult::failure(TITLE, "Nothing to save"),
    };
    StepPlan::Terminal(result)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use skitz_types::AppConfig;

    use super::*;
    use crate::wizard::{StepDriver, StepOutcome, WizardRegistry};

    fn driver() -> StepDriver {
        StepDriver::new(Arc::new(WizardRegistry::with_builtin().unwrap()))
    }

    #[test]
    fn history_counts_must_be_positive() {
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp"));
        let driver = driver();
        let (mut state, _) = driver.start(WizardKind::Preferences, &ctx);
        driver.submit(&mut state, &FormValues::new().with_text("section", "history"), &ctx);

        let values = FormValues::new()
            .with("enabled", FieldValue::Bool(true))
            .with_text("max_items", "0")
            .with_text("display_count", "3");
        let outcome = driver.submit(&mut state, &values, &ctx);
        let StepOutcome::RenderInput(request) = outcome else { panic!("expected inline error") };
        assert!(request.errors.get("max_items").is_some());

        let values = FormValues::new()
            .with("enabled", FieldValue::Bool(false))
            .with_text("max_items", "20")
            .with_text("display_count", "3");
        let outcome = driver.submit(&mut state, &values, &ctx);
        let StepOutcome::Terminal(result) = outcome else { panic!("expected terminal, got {outcome:?}") };
        assert_eq!(result.message, "History settings saved");
        let [ConfigChange::SetHistory(history)] = result.config_changes.as_slice() else {
            panic!("expected one history change");
        };
        assert!(!history.enabled);
        assert_eq!((history.max_items, history.display_count), (20, 3));
        assert!(history.persist);
    }

    #[test]
    fn toggle_flips_mcp_without_server_form() {
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp"));
        let driver = driver();
        let (mut state, _) = driver.start(WizardKind::Preferences, &ctx);
        driver.submit(&mut state, &FormValues::new().with_text("section", "mcp"), &ctx);

        let outcome = driver.submit(&mut state, &FormValues::new().with_text("action", "toggle"), &ctx);
        let StepOutcome::Terminal(result) = outcome else { panic!("expected terminal") };
        assert_eq!(result.message, "MCP disabled");
        assert_eq!(
            result.config_changes,
            vec![ConfigChange::SetMcp {
                enabled: false,
                refresh_seconds: 60
            }]
        );
    }

    #[test]
    fn renaming_a_server_replaces_the_old_entry() {
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp"));
        let driver = driver();
        let (mut state, _) = driver.start(WizardKind::Preferences, &ctx);
        driver.submit(&mut state, &FormValues::new().with_text("section", "mcp"), &ctx);
        let edit = format!("edit:{}", skitz_types::config::DEFAULT_MCP_SERVER_NAME);
        let outcome = driver.submit(&mut state, &FormValues::new().with_text("action", edit), &ctx);
        let StepOutcome::RenderInput(request) = outcome else { panic!("expected server form") };
        assert_eq!(request.title, "Edit MCP Server");

        let bad = FormValues::new().with_text("name", "docs").with_text("url", "not a url");
        let StepOutcome::RenderInput(request) = driver.submit(&mut state, &bad, &ctx) else {
            panic!("expected url error");
        };
        assert!(request.errors.get("url").is_some());

        let good = FormValues::new().with_text("name", "docs").with_text("url", "http://localhost:8001/mcp/");
        let StepOutcome::Terminal(result) = driver.submit(&mut state, &good, &ctx) else {
            panic!("expected terminal");
        };
        assert_eq!(result.config_changes.len(), 2);
        assert!(matches!(&result.config_changes[0], ConfigChange::RemoveMcpServer(name) if name == skitz_types::config::DEFAULT_MCP_SERVER_NAME));
        assert!(matches!(&result.config_changes[1], ConfigChange::UpsertMcpServer(server) if server.name == "docs"));
    }
}
