//! Command palette dispatcher.
//!
//! The palette owns everything about the flow the user is in: the search
//! line and filtered item list, at most one active wizard run, at most one
//! pending MCP tool, the form being edited, and the result being shown. The
//! rest of the application is passed in read-only as a [`PaletteContext`].
//!
//! Every dispatched action carries a [`RequestId`]. Completions are matched
//! against the id the current flow is waiting for; anything else belongs to a
//! flow that was cancelled or replaced and is dropped.
//!
//! Mode machine:
//!
//! ```text
//! Idle -> Searching -> CollectingParams <-> Searching
//!                   -> AwaitingFreeformAiInput -> Executing
//!                   -> Executing -> ShowingResult -> Idle
//! ```

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use skitz_engine::{
    AsyncKind, PendingAction, StepContext, StepDriver, StepOutcome, TerminalResult, WizardRegistry, WizardState, finalize_arguments, parse_prefill,
    prefill_descriptor, tool_request,
};
use skitz_types::{
    ActionOrigin, ActionRequest, ActionResult, CommandRecord, Deadline, Effect, FormValues, InputRequest, McpTool, Notification,
    RequestId, WizardKind,
};
use skitz_util::{RESULT_DISPLAY_WIDTH, display_safe};
use tracing::debug;

use super::items::{DirectAction, PaletteAction, PaletteItem, build_items, filter_items};
use crate::ui::components::common::TextInputState;
use crate::ui::components::form::{FormEvent, FormState};

/// Read-only application state the palette works against.
#[derive(Clone, Copy, Debug)]
pub struct PaletteContext<'a> {
    pub step: StepContext<'a>,
    /// Tools discovered on the configured MCP servers.
    pub tools: &'a [McpTool],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PaletteMode {
    #[default]
    Idle,
    Searching,
    CollectingParams,
    AwaitingFreeformAiInput,
    Executing,
    ShowingResult,
}

/// Final outcome shown to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultView {
    pub title: String,
    pub body: String,
    pub success: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolStage {
    /// Parameters are being entered, or the AI task is being typed.
    Collecting,
    Prefilling(RequestId),
    Calling(RequestId),
}

/// An MCP tool selected from the palette.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingTool {
    pub tool: McpTool,
    pub stage: ToolStage,
}

impl PendingTool {
    fn waits_for(&self, request_id: RequestId) -> bool {
        match self.stage {
            ToolStage::Prefilling(id) | ToolStage::Calling(id) => id == request_id,
            ToolStage::Collecting => false,
        }
    }
}

pub struct PaletteState {
    driver: StepDriver,
    mode: PaletteMode,
    query: TextInputState,
    items: Vec<PaletteItem>,
    filtered: Vec<usize>,
    cursor: usize,
    active_wizard: Option<WizardState>,
    pending_tool: Option<PendingTool>,
    form: Option<FormState>,
    ai_task: TextInputState,
    result: Option<ResultView>,
    loading_text: Option<String>,
}

impl PaletteState {
    pub fn new(driver: StepDriver) -> Self {
        Self {
            driver,
            mode: PaletteMode::Idle,
            query: TextInputState::new(),
            items: Vec::new(),
            filtered: Vec::new(),
            cursor: 0,
            active_wizard: None,
            pending_tool: None,
            form: None,
            ai_task: TextInputState::new(),
            result: None,
            loading_text: None,
        }
    }

    // ----- Getters -----

    pub fn registry(&self) -> &WizardRegistry {
        self.driver.registry()
    }

    pub fn mode(&self) -> PaletteMode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.mode != PaletteMode::Idle
    }

    pub fn query(&self) -> &TextInputState {
        &self.query
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Items matching the current query, in list order.
    pub fn visible_items(&self) -> impl Iterator<Item = &PaletteItem> {
        self.filtered.iter().filter_map(|&index| self.items.get(index))
    }

    pub fn selected_item(&self) -> Option<&PaletteItem> {
        self.filtered.get(self.cursor).and_then(|&index| self.items.get(index))
    }

    pub fn form(&self) -> Option<&FormState> {
        self.form.as_ref()
    }

    pub fn ai_task(&self) -> &TextInputState {
        &self.ai_task
    }

    pub fn result(&self) -> Option<&ResultView> {
        self.result.as_ref()
    }

    pub fn loading_text(&self) -> Option<&str> {
        self.loading_text.as_deref()
    }

    pub fn active_wizard(&self) -> Option<&WizardState> {
        self.active_wizard.as_ref()
    }

    pub fn pending_tool(&self) -> Option<&PendingTool> {
        self.pending_tool.as_ref()
    }

    /// Whether an action dispatched by the palette is still outstanding.
    pub fn is_busy(&self) -> bool {
        self.active_wizard.as_ref().is_some_and(WizardState::is_waiting)
            || self.pending_tool.as_ref().is_some_and(|pending| pending.stage != ToolStage::Collecting)
    }

    // ----- Lifecycle -----

    pub fn open(&mut self, ctx: &PaletteContext<'_>) {
        self.reset();
        self.mode = PaletteMode::Searching;
        let items = build_items(self.driver.registry().kinds(), ctx.tools);
        self.set_items(items);
    }

    /// Close the palette, discarding any flow in progress.
    ///
    /// Dispatched actions keep running; their completions are dropped.
    pub fn close(&mut self) {
        if let Some(wizard) = &self.active_wizard {
            debug!(wizard = %wizard.kind(), run = wizard.run(), "discarding wizard run");
        }
        self.reset();
    }

    /// Replace the item list, keeping the query and clamping the cursor.
    pub fn set_items(&mut self, items: Vec<PaletteItem>) {
        self.items = items;
        self.filtered = filter_items(&self.items, self.query.input());
        self.clamp_cursor();
    }

    fn reset(&mut self) {
        self.mode = PaletteMode::Idle;
        self.query.clear();
        self.filtered = (0..self.items.len()).collect();
        self.cursor = 0;
        self.discard_flow();
        self.result = None;
    }

    fn discard_flow(&mut self) {
        self.active_wizard = None;
        self.pending_tool = None;
        self.form = None;
        self.ai_task.clear();
        self.loading_text = None;
    }

    fn back_to_search(&mut self) {
        self.discard_flow();
        self.mode = PaletteMode::Searching;
    }

    // ----- Search list -----

    fn refilter(&mut self) {
        self.filtered = filter_items(&self.items, self.query.input());
        self.cursor = 0;
    }

    fn clamp_cursor(&mut self) {
        self.cursor = self.cursor.min(self.filtered.len().saturating_sub(1));
    }

    pub fn select_next(&mut self) {
        let len = self.filtered.len();
        self.cursor = if len == 0 { 0 } else { (self.cursor + 1) % len };
    }

    pub fn select_previous(&mut self) {
        let len = self.filtered.len();
        self.cursor = match (len, self.cursor) {
            (0, _) => 0,
            (_, 0) => len - 1,
            (_, cursor) => cursor.min(len) - 1,
        };
    }

    // ----- Event routing -----

    pub fn handle_key(&mut self, key: KeyEvent, ctx: &PaletteContext<'_>) -> Vec<Effect> {
        match self.mode {
            PaletteMode::Idle => Vec::new(),
            PaletteMode::Searching => self.handle_search_key(key, ctx),
            PaletteMode::CollectingParams => self.handle_form_key(key, ctx),
            PaletteMode::AwaitingFreeformAiInput => self.handle_task_key(key, ctx),
            PaletteMode::Executing => Vec::new(),
            PaletteMode::ShowingResult => {
                if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                    self.close();
                }
                Vec::new()
            }
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent, ctx: &PaletteContext<'_>) -> Vec<Effect> {
        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.close(),
            KeyCode::Up => self.select_previous(),
            KeyCode::Down | KeyCode::Tab => self.select_next(),
            KeyCode::Left => self.query.move_left(),
            KeyCode::Right => self.query.move_right(),
            KeyCode::Backspace => {
                self.query.backspace();
                self.refilter();
            }
            KeyCode::Enter => {
                if let Some(item) = self.selected_item().cloned() {
                    return self.run_item(item, ctx);
                }
            }
            KeyCode::Char('a') if control => return self.begin_ai_task(ctx),
            KeyCode::Char('u') if control => {
                self.query.clear();
                self.refilter();
            }
            KeyCode::Char(c) if !control => {
                self.query.insert_char(c);
                self.refilter();
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_form_key(&mut self, key: KeyEvent, ctx: &PaletteContext<'_>) -> Vec<Effect> {
        let Some(form) = self.form.as_mut() else {
            self.back_to_search();
            return Vec::new();
        };
        match form.handle_key(key) {
            FormEvent::Handled => Vec::new(),
            FormEvent::Cancel => {
                debug!("parameter collection cancelled");
                self.back_to_search();
                Vec::new()
            }
            FormEvent::Submit(values) => self.submit_form(values, ctx),
        }
    }

    fn handle_task_key(&mut self, key: KeyEvent, ctx: &PaletteContext<'_>) -> Vec<Effect> {
        match key.code {
            KeyCode::Esc => self.back_to_search(),
            KeyCode::Enter => return self.dispatch_prefill(ctx),
            KeyCode::Backspace => self.ai_task.backspace(),
            KeyCode::Left => self.ai_task.move_left(),
            KeyCode::Right => self.ai_task.move_right(),
            KeyCode::Char('w') if key.modifiers.contains(KeyModifiers::CONTROL) => self.ai_task.delete_word(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => self.ai_task.insert_char(c),
            _ => {}
        }
        Vec::new()
    }

    /// Route the completion of a dispatched action to the flow waiting for it.
    pub fn handle_completion(&mut self, request_id: RequestId, result: &ActionResult, ctx: &PaletteContext<'_>) -> Vec<Effect> {
        if let Some(wizard) = self.active_wizard.as_mut()
            && wizard.waits_for(request_id)
        {
            return match self.driver.complete(wizard, request_id, result, &ctx.step) {
                Some(outcome) => self.apply_outcome(outcome),
                None => Vec::new(),
            };
        }

        if let Some(pending) = self.pending_tool.clone()
            && pending.waits_for(request_id)
        {
            return match pending.stage {
                ToolStage::Prefilling(_) => {
                    self.apply_prefill(&pending.tool, result);
                    Vec::new()
                }
                _ => self.finish_tool(&pending.tool, result),
            };
        }

        debug!(
            request = %request_id,
            mode = ?self.mode,
            success = result.success,
            "dropping completion for a flow that is no longer active"
        );
        Vec::new()
    }

    // ----- Items -----

    fn run_item(&mut self, item: PaletteItem, ctx: &PaletteContext<'_>) -> Vec<Effect> {
        debug!(item = %item.id, "running palette item");
        match item.action {
            PaletteAction::StartWizard(kind) => self.start_wizard(kind, ctx),
            PaletteAction::McpTool(tool) => self.start_tool(tool),
            PaletteAction::Direct(DirectAction::ReloadTools) => {
                self.close();
                vec![Effect::RefreshTools, Effect::Notify(Notification::info("Reloading MCP tools..."))]
            }
            PaletteAction::Direct(DirectAction::ClearHistory) => {
                self.close();
                vec![Effect::ClearHistory]
            }
            PaletteAction::Direct(DirectAction::CreateScript) => {
                vec![Effect::Notify(Notification::info("Create script is coming soon"))]
            }
        }
    }

    /// Start a fresh run of `kind`, discarding any flow in progress.
    pub fn start_wizard(&mut self, kind: WizardKind, ctx: &PaletteContext<'_>) -> Vec<Effect> {
        self.discard_flow();
        self.result = None;
        let (state, outcome) = self.driver.start(kind, &ctx.step);
        self.active_wizard = Some(state);
        self.apply_outcome(outcome)
    }

    fn start_tool(&mut self, tool: McpTool) -> Vec<Effect> {
        self.discard_flow();
        self.result = None;
        if !tool.has_parameters() {
            self.pending_tool = Some(PendingTool {
                tool: tool.clone(),
                stage: ToolStage::Collecting,
            });
            return self.dispatch_tool_call(&tool, serde_json::Map::new());
        }
        self.show_form(tool_request(&tool, None));
        self.pending_tool = Some(PendingTool {
            tool,
            stage: ToolStage::Collecting,
        });
        Vec::new()
    }

    fn begin_ai_task(&mut self, ctx: &PaletteContext<'_>) -> Vec<Effect> {
        let Some(PaletteAction::McpTool(tool)) = self.selected_item().map(|item| item.action.clone()) else {
            return Vec::new();
        };
        if ctx.step.config.active_provider().is_none() {
            return vec![Effect::Notify(Notification::warning(
                "No AI provider configured. Add one with the AI Providers wizard.",
            ))];
        }
        self.discard_flow();
        self.pending_tool = Some(PendingTool {
            tool,
            stage: ToolStage::Collecting,
        });
        self.mode = PaletteMode::AwaitingFreeformAiInput;
        Vec::new()
    }

    // ----- Forms -----

    fn show_form(&mut self, request: InputRequest) {
        match self.form.as_mut() {
            Some(form) => form.replace(request),
            None => self.form = Some(FormState::new(request)),
        }
        self.mode = PaletteMode::CollectingParams;
    }

    fn submit_form(&mut self, values: FormValues, ctx: &PaletteContext<'_>) -> Vec<Effect> {
        if let Some(wizard) = self.active_wizard.as_mut() {
            let outcome = self.driver.submit(wizard, &values, &ctx.step);
            return self.apply_outcome(outcome);
        }

        let Some(pending) = self.pending_tool.clone() else {
            self.back_to_search();
            return Vec::new();
        };
        match finalize_arguments(&pending.tool, &values) {
            Ok(arguments) => self.dispatch_tool_call(&pending.tool, arguments),
            Err(errors) => {
                if let Some(form) = self.form.as_mut() {
                    let request = form.request().clone().with_errors(errors);
                    form.replace(request);
                }
                Vec::new()
            }
        }
    }

    // ----- Wizard outcomes -----

    fn apply_outcome(&mut self, outcome: StepOutcome) -> Vec<Effect> {
        match outcome {
            StepOutcome::RenderInput(request) => {
                self.loading_text = None;
                self.show_form(request);
                Vec::new()
            }
            StepOutcome::RunAsync(action) => self.dispatch_step_action(action),
            StepOutcome::Terminal(result) => self.finish_wizard(result),
            StepOutcome::Waiting(_) => Vec::new(),
        }
    }

    fn dispatch_step_action(&mut self, action: PendingAction) -> Vec<Effect> {
        let PendingAction {
            request_id,
            descriptor,
            deadline,
            kind,
            loading_text,
            placeholder,
        } = action;

        match (kind, placeholder) {
            (AsyncKind::Load, Some(request)) => self.show_form(request),
            _ => {
                self.form = None;
                self.mode = PaletteMode::Executing;
            }
        }
        self.loading_text = Some(loading_text);

        vec![Effect::InvokeAction(ActionRequest {
            id: request_id,
            origin: ActionOrigin::Palette,
            descriptor,
            deadline,
        })]
    }

    fn finish_wizard(&mut self, result: TerminalResult) -> Vec<Effect> {
        let kind = self.active_wizard.take().map(|wizard| wizard.kind());
        let mut effects = Vec::new();
        if let Some(kind) = kind {
            effects.push(Effect::RecordCommand(CommandRecord {
                command: kind.id().to_string(),
                tool: "wizard".to_string(),
                success: result.success,
            }));
        }
        effects.extend(result.config_changes.iter().cloned().map(Effect::ApplyConfig));
        if result.reload_resources {
            effects.push(Effect::ReloadResources);
        }

        self.show_result(ResultView {
            title: result.title,
            body: display_safe(&result.message, RESULT_DISPLAY_WIDTH),
            success: result.success,
        });
        effects
    }

    fn show_result(&mut self, result: ResultView) {
        self.discard_flow();
        self.result = Some(result);
        self.mode = PaletteMode::ShowingResult;
    }

    // ----- Tools -----

    fn dispatch_tool_call(&mut self, tool: &McpTool, arguments: serde_json::Map<String, serde_json::Value>) -> Vec<Effect> {
        let request_id = RequestId::next();
        if let Some(pending) = self.pending_tool.as_mut() {
            pending.stage = ToolStage::Calling(request_id);
        }
        self.form = None;
        self.mode = PaletteMode::Executing;
        self.loading_text = Some(format!("Running {}...", tool.name));

        vec![Effect::InvokeAction(ActionRequest {
            id: request_id,
            origin: ActionOrigin::Palette,
            descriptor: skitz_types::ActionDescriptor::McpCallTool {
                server: tool.server.clone(),
                url: tool.server_url.clone(),
                tool: tool.name.clone(),
                arguments,
            },
            deadline: Deadline::Long,
        })]
    }

    fn dispatch_prefill(&mut self, ctx: &PaletteContext<'_>) -> Vec<Effect> {
        let task = self.ai_task.input().trim().to_string();
        if task.is_empty() {
            return Vec::new();
        }
        let Some(pending) = self.pending_tool.as_mut() else {
            self.back_to_search();
            return Vec::new();
        };
        let Some(provider) = ctx.step.config.active_provider() else {
            return vec![Effect::Notify(Notification::warning(
                "No AI provider configured. Add one with the AI Providers wizard.",
            ))];
        };

        let request_id = RequestId::next();
        pending.stage = ToolStage::Prefilling(request_id);
        let descriptor = prefill_descriptor(&pending.tool, &task, provider);
        self.loading_text = Some(format!("Asking {} to fill in {}...", provider.name, pending.tool.name));
        self.mode = PaletteMode::Executing;

        vec![Effect::InvokeAction(ActionRequest {
            id: request_id,
            origin: ActionOrigin::Palette,
            descriptor,
            deadline: Deadline::Long,
        })]
    }

    /// Show the tool form with the AI's suggestions, or empty with the reason it is not pre-filled.
    fn apply_prefill(&mut self, tool: &McpTool, result: &ActionResult) {
        let prefill = if result.success {
            parse_prefill(&result.output)
        } else {
            Err(result.message().to_string())
        };
        let request = match prefill {
            Ok(arguments) => tool_request(tool, Some(&arguments)),
            Err(error) => {
                debug!(tool = %tool.palette_id(), error = %error, "AI prefill failed");
                tool_request(tool, None).with_notice(format!("AI could not fill in the parameters: {}", display_safe(&error, 200)))
            }
        };

        if let Some(pending) = self.pending_tool.as_mut() {
            pending.stage = ToolStage::Collecting;
        }
        self.ai_task.clear();
        self.loading_text = None;
        self.form = None;
        self.show_form(request);
    }

    fn finish_tool(&mut self, tool: &McpTool, result: &ActionResult) -> Vec<Effect> {
        let record = Effect::RecordCommand(CommandRecord {
            command: tool.palette_id(),
            tool: "mcp".to_string(),
            success: result.success,
        });
        let body = if result.message().trim().is_empty() {
            "(no output)".to_string()
        } else {
            display_safe(result.message(), RESULT_DISPLAY_WIDTH)
        };
        self.show_result(ResultView {
            title: tool.name.clone(),
            body,
            success: result.success,
        });
        vec![record]
    }
}
