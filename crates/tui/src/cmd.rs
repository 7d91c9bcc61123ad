//! # Effect execution
//!
//! State transitions in [`App`] and the palette only *describe* side effects
//! as [`Effect`]s. This module is the imperative shell that carries them out:
//! spawning external actions on the gateway, persisting config changes,
//! writing command history and rescanning resources.
//!
//! External actions never block the UI loop. Each one is spawned as a task and
//! returned in [`CommandBatch::pending`]; the runtime feeds the resulting
//! [`skitz_types::ActionCompletion`] back into [`App::update`].

use std::sync::Arc;
use std::time::Instant;

use skitz_engine::{ActionGateway, run_request};
use skitz_types::{
    ActionCompletion, ActionDescriptor, ActionOrigin, ActionRequest, ConfigChange, Deadline, Effect, Notification, RequestId,
};
use skitz_util::HistoryEntry;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::app::App;

/// Result of executing one round of effects.
#[derive(Debug, Default)]
pub struct CommandBatch {
    /// Spawned external actions.
    pub pending: Vec<JoinHandle<ActionCompletion>>,
    /// Effects produced while executing this batch, to run next.
    pub follow_up: Vec<Effect>,
}

/// Execute `effects` against `app`, spawning external actions on `gateway`.
pub fn run_from_effects(app: &mut App, effects: Vec<Effect>, gateway: &Arc<dyn ActionGateway>) -> CommandBatch {
    let mut batch = CommandBatch::default();
    for effect in effects {
        match effect {
            Effect::InvokeAction(request) => batch.pending.push(spawn_action(gateway, request)),
            Effect::Notify(notification) => app.notify(notification),
            Effect::ApplyConfig(change) => apply_config(app, &change, &mut batch),
            Effect::RecordCommand(record) => {
                if !app.config.history.enabled {
                    debug!(command = %record.command, "history disabled; not recording");
                    continue;
                }
                if let Err(error) = app.ctx.history.record(HistoryEntry::from(record)) {
                    warn!(error = %error, "could not record command history");
                }
                app.refresh_recent();
            }
            Effect::RefreshTools => refresh_tools(app, gateway, &mut batch),
            Effect::ReloadResources => app.reload_resources(),
            Effect::ClearHistory => match app.ctx.history.clear() {
                Ok(()) => {
                    app.refresh_recent();
                    app.notify(Notification::success("History cleared"));
                }
                Err(error) => {
                    warn!(error = %error, "could not clear command history");
                    app.notify(Notification::error(format!("Could not clear history: {error}")));
                }
            },
        }
    }
    batch
}

fn spawn_action(gateway: &Arc<dyn ActionGateway>, request: ActionRequest) -> JoinHandle<ActionCompletion> {
    tokio::spawn(run_request(Arc::clone(gateway), request))
}

fn apply_config(app: &mut App, change: &ConfigChange, batch: &mut CommandBatch) {
    let config = match app.ctx.config_store.apply(change) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to save configuration");
            app.notify(Notification::error(format!("Could not save settings: {err}")));
            return;
        }
    };

    if let Err(error) = app.ctx.history.set_limit(config.history.max_items) {
        warn!(error = %error, "could not apply history limit");
    }
    app.set_config(config);
    app.refresh_recent();

    if matches!(
        change,
        ConfigChange::SetMcp { .. } | ConfigChange::UpsertMcpServer(_) | ConfigChange::RemoveMcpServer(_)
    ) {
        batch.follow_up.push(Effect::RefreshTools);
    }
}

fn refresh_tools(app: &mut App, gateway: &Arc<dyn ActionGateway>, batch: &mut CommandBatch) {
    app.mark_tools_refreshed(Instant::now());
    if !app.config.mcp.enabled {
        debug!("MCP disabled; skipping tool refresh");
        return;
    }
    let servers = app.config.mcp.servers.clone();
    for server in servers {
        let request = ActionRequest {
            id: RequestId::next(),
            origin: ActionOrigin::ToolDiscovery {
                server: server.name.clone(),
            },
            descriptor: ActionDescriptor::McpListTools {
                server: server.name.clone(),
                url: server.url,
            },
            deadline: Deadline::Short,
        };
        app.track_discovery(&server.name, request.id);
        batch.pending.push(spawn_action(gateway, request));
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use skitz_engine::{ScriptedGateway, WizardRegistry};
    use skitz_types::{ActionResult, AppConfig, CommandRecord, HistoryConfig, McpServerConfig, Msg};
    use skitz_util::{ConfigStore, InMemoryHistoryStore};

    use super::*;
    use crate::app::SharedCtx;

    fn app_with(config: AppConfig) -> App {
        let ctx = SharedCtx {
            config_store: Arc::new(ConfigStore::ephemeral(config)),
            history: Arc::new(InMemoryHistoryStore::new(50)),
            resources_dir: std::env::temp_dir().join("skitz-cmd-tests-missing"),
        };
        App::new(ctx, Arc::new(WizardRegistry::with_builtin().unwrap()))
    }

    fn record(command: &str) -> Effect {
        Effect::RecordCommand(CommandRecord {
            command: command.into(),
            tool: "wizard".into(),
            success: true,
        })
    }

    #[tokio::test]
    async fn invoked_actions_complete_with_their_request_id() {
        let mut app = app_with(AppConfig::default());
        let gateway: Arc<dyn ActionGateway> = Arc::new(ScriptedGateway::always(ActionResult::ok("done")));
        let request = ActionRequest {
            id: RequestId::next(),
            origin: ActionOrigin::Palette,
            descriptor: ActionDescriptor::Process {
                program: "true".into(),
                args: Vec::new(),
                env: Vec::new(),
            },
            deadline: Deadline::Short,
        };
        let id = request.id;

        let mut batch = run_from_effects(&mut app, vec![Effect::InvokeAction(request)], &gateway);
        assert_eq!(batch.pending.len(), 1);
        let completion = batch.pending.pop().unwrap().await.unwrap();
        assert_eq!(completion.request_id, id);
        assert_eq!(completion.result.output, "done");
    }

    #[tokio::test]
    async fn commands_are_recorded_newest_first() {
        let mut app = app_with(AppConfig::default());
        let gateway: Arc<dyn ActionGateway> = Arc::new(ScriptedGateway::always(ActionResult::ok("")));
        run_from_effects(&mut app, vec![record("deploy"), record("research")], &gateway);

        let commands: Vec<&str> = app.recent.iter().map(|entry| entry.command.as_str()).collect();
        assert_eq!(commands, vec!["research", "deploy"]);
    }

    #[tokio::test]
    async fn nothing_is_recorded_when_history_is_disabled() {
        let mut config = AppConfig::default();
        config.history.enabled = false;
        let mut app = app_with(config);
        let gateway: Arc<dyn ActionGateway> = Arc::new(ScriptedGateway::always(ActionResult::ok("")));
        run_from_effects(&mut app, vec![record("deploy")], &gateway);

        assert!(app.ctx.history.recent(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn lowering_max_items_truncates_history() {
        let mut app = app_with(AppConfig::default());
        let gateway: Arc<dyn ActionGateway> = Arc::new(ScriptedGateway::always(ActionResult::ok("")));
        run_from_effects(&mut app, vec![record("a"), record("b"), record("c")], &gateway);

        let history = HistoryConfig {
            max_items: 2,
            ..HistoryConfig::default()
        };
        run_from_effects(&mut app, vec![Effect::ApplyConfig(ConfigChange::SetHistory(history))], &gateway);

        assert_eq!(app.config.history.max_items, 2);
        assert_eq!(app.ctx.history.recent(10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn clearing_history_notifies() {
        let mut app = app_with(AppConfig::default());
        let gateway: Arc<dyn ActionGateway> = Arc::new(ScriptedGateway::always(ActionResult::ok("")));
        run_from_effects(&mut app, vec![record("deploy"), Effect::ClearHistory], &gateway);

        assert!(app.recent.is_empty());
        assert!(app.notifications.visible().any(|n| n.text == "History cleared"));
    }

    #[tokio::test]
    async fn mcp_changes_trigger_a_tool_refresh() {
        let mut app = app_with(AppConfig::default());
        let payload = json!({ "tools": [{ "name": "search", "inputSchema": {} }] }).to_string();
        let gateway: Arc<dyn ActionGateway> = Arc::new(ScriptedGateway::always(ActionResult::ok(payload)));

        let server = McpServerConfig {
            name: "docs".into(),
            url: "http://localhost:9000/mcp".into(),
        };
        let batch = run_from_effects(
            &mut app,
            vec![
                Effect::ApplyConfig(ConfigChange::SetMcp {
                    enabled: true,
                    refresh_seconds: 60,
                }),
                Effect::ApplyConfig(ConfigChange::UpsertMcpServer(server)),
            ],
            &gateway,
        );
        assert!(batch.follow_up.contains(&Effect::RefreshTools));

        let mut batch = run_from_effects(&mut app, vec![Effect::RefreshTools], &gateway);
        let servers: Vec<String> = app.config.mcp.servers.iter().map(|server| server.name.clone()).collect();
        assert_eq!(batch.pending.len(), servers.len());
        for handle in batch.pending.drain(..) {
            let completion = handle.await.unwrap();
            app.update(Msg::ActionCompleted(completion));
        }
        assert!(app.tools().iter().any(|tool| tool.palette_id() == "mcp:docs:search"));
    }

    #[tokio::test]
    async fn refresh_is_skipped_when_mcp_is_disabled() {
        let mut config = AppConfig::default();
        config.mcp.enabled = false;
        let mut app = app_with(config);
        let gateway: Arc<dyn ActionGateway> = Arc::new(ScriptedGateway::always(ActionResult::ok("{}")));

        let batch = run_from_effects(&mut app, vec![Effect::RefreshTools], &gateway);
        assert!(batch.pending.is_empty());
    }

    #[tokio::test]
    async fn only_the_latest_refresh_is_applied() {
        let mut config = AppConfig::default();
        config.mcp.enabled = true;
        config.mcp.servers = vec![McpServerConfig {
            name: "docs".into(),
            url: "http://localhost:9000/mcp".into(),
        }];
        let mut app = app_with(config);
        let payload = json!({ "tools": [{ "name": "search", "inputSchema": {} }] }).to_string();
        let gateway: Arc<dyn ActionGateway> = Arc::new(ScriptedGateway::always(ActionResult::ok(payload)));

        let mut first = run_from_effects(&mut app, vec![Effect::RefreshTools], &gateway);
        let mut second = run_from_effects(&mut app, vec![Effect::RefreshTools], &gateway);

        let stale = first.pending.pop().unwrap().await.unwrap();
        app.update(Msg::ActionCompleted(stale));
        assert!(app.tools().is_empty());

        let latest = second.pending.pop().unwrap().await.unwrap();
        app.update(Msg::ActionCompleted(latest));
        assert_eq!(app.tools().len(), 1);
    }
}
