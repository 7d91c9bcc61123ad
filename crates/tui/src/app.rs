//! Application state for the skitz dashboard.
//!
//! `App` owns the dashboard data (resources, recent history, discovered MCP
//! tools), the notification queue and the command palette. Key presses and
//! runtime messages are turned into [`Effect`]s here; the runtime executes them.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use indexmap::IndexMap;
use ratatui::widgets::ListState;
use skitz_engine::{StepContext, StepDriver, WizardRegistry};
use skitz_types::mcp::parse_tool_list;
use skitz_types::{ActionCompletion, ActionOrigin, AppConfig, Effect, McpTool, Msg, Notification, RequestId};
use skitz_util::{ConfigStore, HistoryEntry, HistoryStore, Resource, list_resources};
use tracing::{debug, warn};

use crate::ui::components::notifications::Notifications;
use crate::ui::components::palette::{PaletteContext, PaletteMode, PaletteState, build_items};

/// Long-lived services shared by the app and the effect runner.
pub struct SharedCtx {
    pub config_store: Arc<ConfigStore>,
    pub history: Arc<dyn HistoryStore>,
    pub resources_dir: PathBuf,
}

/// Which dashboard list has the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DashboardFocus {
    #[default]
    Resources,
    History,
}

pub struct App {
    pub ctx: SharedCtx,
    /// Last persisted configuration.
    pub config: AppConfig,
    pub resources: Vec<Resource>,
    /// Most recent history entries, newest first.
    pub recent: Vec<HistoryEntry>,
    pub palette: PaletteState,
    pub notifications: Notifications,
    pub focus: DashboardFocus,
    pub resource_list: ListState,
    pub history_list: ListState,
    pub throbber_idx: usize,
    pub should_quit: bool,
    tools_by_server: IndexMap<String, Vec<McpTool>>,
    tools: Vec<McpTool>,
    /// Latest `tools/list` request per server; older replies are dropped.
    discovery_requests: HashMap<String, RequestId>,
    last_tool_refresh: Option<Instant>,
}

impl App {
    pub fn new(ctx: SharedCtx, registry: Arc<WizardRegistry>) -> Self {
        let config = ctx.config_store.snapshot();
        let mut app = Self {
            ctx,
            config,
            resources: Vec::new(),
            recent: Vec::new(),
            palette: PaletteState::new(StepDriver::new(registry)),
            notifications: Notifications::default(),
            focus: DashboardFocus::default(),
            resource_list: ListState::default(),
            history_list: ListState::default(),
            throbber_idx: 0,
            should_quit: false,
            tools_by_server: IndexMap::new(),
            tools: Vec::new(),
            discovery_requests: HashMap::new(),
            last_tool_refresh: None,
        };
        app.reload_resources();
        app.refresh_recent();
        app
    }

    /// Borrow the palette mutably next to the read-only context it works against.
    fn palette_parts(&mut self) -> (&mut PaletteState, PaletteContext<'_>) {
        let ctx = PaletteContext {
            step: StepContext::new(&self.config, &self.resources, &self.ctx.resources_dir),
            tools: &self.tools,
        };
        (&mut self.palette, ctx)
    }

    pub fn tools(&self) -> &[McpTool] {
        &self.tools
    }

    // ----- Messages -----

    pub fn update(&mut self, msg: Msg) -> Vec<Effect> {
        match msg {
            Msg::Tick => self.tick(Instant::now()),
            Msg::Resize(..) => Vec::new(),
            Msg::ActionCompleted(completion) => self.handle_completion(completion),
        }
    }

    fn tick(&mut self, now: Instant) -> Vec<Effect> {
        self.notifications.expire(now);
        if self.palette.is_busy() {
            self.throbber_idx = self.throbber_idx.wrapping_add(1);
        }
        if self.tool_refresh_due(now) {
            vec![Effect::RefreshTools]
        } else {
            Vec::new()
        }
    }

    fn tool_refresh_due(&self, now: Instant) -> bool {
        let mcp = &self.config.mcp;
        if !mcp.enabled || mcp.servers.is_empty() || mcp.refresh_seconds == 0 {
            return false;
        }
        self.last_tool_refresh
            .is_some_and(|last| now.duration_since(last) >= Duration::from_secs(mcp.refresh_seconds))
    }

    fn handle_completion(&mut self, completion: ActionCompletion) -> Vec<Effect> {
        let ActionCompletion { request_id, origin, result } = completion;
        match origin {
            ActionOrigin::Palette => {
                let (palette, ctx) = self.palette_parts();
                palette.handle_completion(request_id, &result, &ctx)
            }
            ActionOrigin::ToolDiscovery { server } => {
                if self.discovery_requests.get(&server) != Some(&request_id) {
                    debug!(server = %server, request = %request_id, "dropping stale tool list");
                    return Vec::new();
                }
                self.discovery_requests.remove(&server);
                let Some(url) = self.config.mcp.servers.iter().find(|s| s.name == server).map(|s| s.url.clone()) else {
                    debug!(server = %server, "ignoring tools from a server that is no longer configured");
                    return Vec::new();
                };
                if !result.success {
                    warn!(server = %server, error = %result.message(), "MCP tool discovery failed");
                    self.set_server_tools(&server, Vec::new());
                    return vec![Effect::Notify(Notification::warning(format!("MCP server {server}: {}", result.message())))];
                }
                match parse_tool_list(&server, &url, &result.output) {
                    Ok(tools) => {
                        debug!(server = %server, count = tools.len(), "discovered MCP tools");
                        self.set_server_tools(&server, tools);
                        Vec::new()
                    }
                    Err(error) => {
                        warn!(server = %server, error = %error, "unreadable MCP tool list");
                        vec![Effect::Notify(Notification::warning(format!("MCP server {server}: {error}")))]
                    }
                }
            }
        }
    }

    // ----- Keys -----

    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        if control && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return Vec::new();
        }
        if control && key.code == KeyCode::Char('p') {
            if self.palette.mode() == PaletteMode::Executing {
                // Running actions cannot be abandoned; wait for the result.
                return Vec::new();
            }
            if self.palette.is_open() {
                self.palette.close();
            } else {
                self.open_palette();
            }
            return Vec::new();
        }
        if self.palette.is_open() {
            let (palette, ctx) = self.palette_parts();
            return palette.handle_key(key, &ctx);
        }

        match key.code {
            KeyCode::Char(':') => self.open_palette(),
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab | KeyCode::BackTab => {
                self.focus = match self.focus {
                    DashboardFocus::Resources => DashboardFocus::History,
                    DashboardFocus::History => DashboardFocus::Resources,
                };
            }
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            _ => {}
        }
        Vec::new()
    }

    pub fn open_palette(&mut self) {
        let (palette, ctx) = self.palette_parts();
        palette.open(&ctx);
    }

    fn move_selection(&mut self, delta: isize) {
        let (list, len) = match self.focus {
            DashboardFocus::Resources => (&mut self.resource_list, self.resources.len()),
            DashboardFocus::History => (&mut self.history_list, self.recent.len()),
        };
        if len == 0 {
            list.select(None);
            return;
        }
        let current = list.selected().unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(len as isize) as usize;
        list.select(Some(next));
    }

    // ----- State refreshes driven by effects -----

    pub fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification, Instant::now());
    }

    /// Adopt a newly persisted configuration.
    pub fn set_config(&mut self, config: AppConfig) {
        let configured: Vec<&str> = config.mcp.servers.iter().map(|server| server.name.as_str()).collect();
        let enabled = config.mcp.enabled;
        self.tools_by_server.retain(|server, _| enabled && configured.contains(&server.as_str()));
        self.discovery_requests
            .retain(|server, _| enabled && configured.contains(&server.as_str()));
        self.config = config;
        self.rebuild_tools();
    }

    pub fn reload_resources(&mut self) {
        self.resources = list_resources(&self.ctx.resources_dir).unwrap_or_else(|error| {
            warn!(dir = %self.ctx.resources_dir.display(), error = %error, "could not list resources");
            Vec::new()
        });
        clamp_selection(&mut self.resource_list, self.resources.len());
    }

    pub fn refresh_recent(&mut self) {
        let count = self.config.history.display_count;
        self.recent = self.ctx.history.recent(count).unwrap_or_else(|error| {
            warn!(error = %error, "could not read command history");
            Vec::new()
        });
        clamp_selection(&mut self.history_list, self.recent.len());
    }

    /// Remember the newest discovery request sent to `server`.
    pub fn track_discovery(&mut self, server: &str, request_id: RequestId) {
        self.discovery_requests.insert(server.to_string(), request_id);
    }

    pub fn mark_tools_refreshed(&mut self, now: Instant) {
        self.last_tool_refresh = Some(now);
    }

    fn set_server_tools(&mut self, server: &str, tools: Vec<McpTool>) {
        self.tools_by_server.insert(server.to_string(), tools);
        self.rebuild_tools();
    }

    fn rebuild_tools(&mut self) {
        self.tools = self.tools_by_server.values().flatten().cloned().collect();
        let items = build_items(self.palette.registry().kinds(), &self.tools);
        self.palette.set_items(items);
    }
}

fn clamp_selection(list: &mut ListState, len: usize) {
    match (list.selected(), len) {
        (_, 0) => list.select(None),
        (None, _) => list.select(Some(0)),
        (Some(index), len) if index >= len => list.select(Some(len - 1)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use skitz_types::{ActionResult, AiProviderConfig, AiProviderType, McpServerConfig};
    use skitz_util::InMemoryHistoryStore;

    use super::*;

    fn app_with(config: AppConfig) -> App {
        let dir = tempfile::tempdir().unwrap();
        let ctx = SharedCtx {
            config_store: Arc::new(ConfigStore::ephemeral(config)),
            history: Arc::new(InMemoryHistoryStore::new(10)),
            resources_dir: dir.path().to_path_buf(),
        };
        App::new(ctx, Arc::new(WizardRegistry::with_builtin().unwrap()))
    }

    fn docs_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.mcp.enabled = true;
        config.mcp.servers = vec![McpServerConfig {
            name: "docs".into(),
            url: "http://localhost:9000/mcp".into(),
        }];
        config
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    /// Deliver a tool list for `server` as the reply to the latest refresh.
    fn discovered(app: &mut App, server: &str, result: ActionResult) -> Vec<Effect> {
        let request_id = RequestId::next();
        app.track_discovery(server, request_id);
        app.update(Msg::ActionCompleted(ActionCompletion {
            request_id,
            origin: ActionOrigin::ToolDiscovery { server: server.into() },
            result,
        }))
    }

    fn tool_list(names: &[&str]) -> ActionResult {
        let tools: Vec<_> = names.iter().map(|name| json!({ "name": name, "inputSchema": {} })).collect();
        ActionResult::ok(json!({ "tools": tools }).to_string())
    }

    #[test]
    fn palette_opens_with_colon_and_toggles_with_ctrl_p() {
        let mut app = app_with(AppConfig::default());
        app.handle_key(key(KeyCode::Char(':')));
        assert_eq!(app.palette.mode(), PaletteMode::Searching);

        // Typed characters go to the palette, not the dashboard.
        app.handle_key(key(KeyCode::Char('q')));
        assert!(!app.should_quit);

        app.handle_key(ctrl('p'));
        assert!(!app.palette.is_open());
        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn ctrl_p_does_not_abandon_a_running_action() {
        let mut config = AppConfig::default();
        config.ai.providers.push(AiProviderConfig {
            name: "work".into(),
            provider_type: AiProviderType::Openai,
            api_key: Some("sk-test".into()),
            enabled: true,
            ..AiProviderConfig::default()
        });
        let mut app = app_with(config);

        app.handle_key(key(KeyCode::Char(':')));
        type_text(&mut app, "deep research");
        app.handle_key(key(KeyCode::Enter));
        type_text(&mut app, "rust async runtimes");
        app.handle_key(key(KeyCode::Enter));
        let effects = app.handle_key(key(KeyCode::Enter));
        assert!(effects.iter().any(|effect| matches!(effect, Effect::InvokeAction(_))));
        assert_eq!(app.palette.mode(), PaletteMode::Executing);

        app.handle_key(ctrl('p'));
        assert_eq!(app.palette.mode(), PaletteMode::Executing);
        assert!(app.palette.active_wizard().is_some());
    }

    #[test]
    fn discovered_tools_become_palette_items() {
        let mut app = app_with(docs_config());
        let payload = json!({ "tools": [{ "name": "search", "description": "Search docs", "inputSchema": {} }] });
        let effects = discovered(&mut app, "docs", ActionResult::ok(payload.to_string()));
        assert!(effects.is_empty());
        assert_eq!(app.tools().len(), 1);

        app.open_palette();
        assert!(app.palette.visible_items().any(|item| item.id == "mcp:docs:search"));
    }

    #[test]
    fn failed_discovery_warns_and_clears_server_tools() {
        let mut app = app_with(docs_config());
        let effects = discovered(&mut app, "docs", ActionResult::failure("connection refused"));
        assert!(matches!(effects.as_slice(), [Effect::Notify(n)] if n.text.contains("connection refused")));
        assert!(app.tools().is_empty());
    }

    #[test]
    fn removing_a_server_drops_its_tools() {
        let mut app = app_with(docs_config());
        discovered(&mut app, "docs", tool_list(&["search"]));

        let mut config = docs_config();
        config.mcp.servers.clear();
        app.set_config(config);
        assert!(app.tools().is_empty());
    }

    #[test]
    fn older_tool_lists_do_not_replace_newer_ones() {
        let mut app = app_with(docs_config());
        let older = RequestId::next();
        let newer = RequestId::next();
        app.track_discovery("docs", older);
        app.track_discovery("docs", newer);

        let reply = |request_id, names: &[&str]| {
            Msg::ActionCompleted(ActionCompletion {
                request_id,
                origin: ActionOrigin::ToolDiscovery { server: "docs".into() },
                result: tool_list(names),
            })
        };
        app.update(reply(newer, &["fresh"]));
        app.update(reply(older, &["stale"]));

        let names: Vec<&str> = app.tools().iter().map(|tool| tool.name.as_str()).collect();
        assert_eq!(names, vec!["fresh"]);
    }

    #[test]
    fn untracked_tool_lists_are_ignored() {
        let mut app = app_with(docs_config());
        app.update(Msg::ActionCompleted(ActionCompletion {
            request_id: RequestId::next(),
            origin: ActionOrigin::ToolDiscovery { server: "docs".into() },
            result: tool_list(&["search"]),
        }));
        assert!(app.tools().is_empty());
    }

    #[test]
    fn tool_refresh_is_due_after_the_interval() {
        let mut config = docs_config();
        config.mcp.refresh_seconds = 30;
        let mut app = app_with(config);
        let start = Instant::now();
        assert!(!app.tool_refresh_due(start));

        app.mark_tools_refreshed(start);
        assert!(!app.tool_refresh_due(start + Duration::from_secs(10)));
        assert!(app.tool_refresh_due(start + Duration::from_secs(30)));
    }

    #[test]
    fn dashboard_selection_wraps() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "# A\n").unwrap();
        std::fs::write(dir.path().join("b.md"), "# B\n").unwrap();
        let ctx = SharedCtx {
            config_store: Arc::new(ConfigStore::ephemeral(AppConfig::default())),
            history: Arc::new(InMemoryHistoryStore::new(10)),
            resources_dir: dir.path().to_path_buf(),
        };
        let mut app = App::new(ctx, Arc::new(WizardRegistry::with_builtin().unwrap()));
        assert_eq!(app.resource_list.selected(), Some(0));
        app.handle_key(key(KeyCode::Up));
        assert_eq!(app.resource_list.selected(), Some(1));
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.resource_list.selected(), Some(0));
    }
}
