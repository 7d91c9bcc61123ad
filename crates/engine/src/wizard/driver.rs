//! Drives a [`WizardState`] through its step table.
//!
//! The driver is stateless apart from the shared registry. Every call takes the
//! run by `&mut` and returns what the caller should do next. Structural errors
//! (unknown kinds, malformed plans, indices past the end) are logged and
//! reported as a terminal failure instead of panicking.

use std::sync::Arc;

use skitz_types::{ActionDescriptor, ActionResult, Deadline, FormValues, InputRequest, RequestId, WizardKind, validate_form};
use tracing::{debug, error};

use crate::context::StepContext;
use crate::wizard::error::DriverError;
use crate::wizard::registry::{WizardProgram, WizardRegistry};
use crate::wizard::state::{PendingStep, WizardState};
use crate::wizard::step::{AsyncKind, Completion, StepPlan, TerminalResult};

/// An action the caller must dispatch on behalf of the run.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingAction {
    pub request_id: RequestId,
    pub descriptor: ActionDescriptor,
    pub deadline: Deadline,
    pub kind: AsyncKind,
    pub loading_text: String,
    /// Form to keep showing while a load runs behind it.
    pub placeholder: Option<InputRequest>,
}

/// What the caller should do after a driver call.
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    /// Show a form for the current step.
    RenderInput(InputRequest),
    /// Dispatch an action and feed its completion back through [`StepDriver::complete`].
    RunAsync(PendingAction),
    /// The run is over.
    Terminal(TerminalResult),
    /// The run is still waiting on the given action; nothing to do.
    Waiting(RequestId),
}

impl StepOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepOutcome::Terminal(_))
    }
}

#[derive(Clone)]
pub struct StepDriver {
    registry: Arc<WizardRegistry>,
}

impl StepDriver {
    pub fn new(registry: Arc<WizardRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &WizardRegistry {
        &self.registry
    }

    /// Create a fresh run of `kind` and advance it to its first outcome.
    pub fn start(&self, kind: WizardKind, ctx: &StepContext<'_>) -> (WizardState, StepOutcome) {
        let mut state = WizardState::new(kind);
        debug!(wizard = %kind, run = state.run(), "starting wizard");
        let outcome = self.advance(&mut state, ctx);
        (state, outcome)
    }

    /// Plan the current step, skipping steps that do not apply.
    pub fn advance(&self, state: &mut WizardState, ctx: &StepContext<'_>) -> StepOutcome {
        let result = self
            .registry
            .program(state.kind())
            .and_then(|program| self.run_from(state, program, ctx, None));
        self.settle(state, result)
    }

    /// Submit values for the current input step.
    ///
    /// Invalid values re-render the same step with errors and leave the data
    /// untouched. Valid values move the run forward by exactly one step before
    /// it is advanced again.
    pub fn submit(&self, state: &mut WizardState, values: &FormValues, ctx: &StepContext<'_>) -> StepOutcome {
        let result = self.try_submit(state, values, ctx);
        self.settle(state, result)
    }

    /// Feed the result of a dispatched action back into the run.
    ///
    /// Returns `None` when the run is not waiting for `request_id`; the
    /// completion belongs to an earlier dispatch and is dropped.
    pub fn complete(
        &self,
        state: &mut WizardState,
        request_id: RequestId,
        result: &ActionResult,
        ctx: &StepContext<'_>,
    ) -> Option<StepOutcome> {
        let Some(pending) = state.pending.filter(|pending| pending.request_id == request_id) else {
            debug!(
                wizard = %state.kind(),
                run = state.run(),
                request = %request_id,
                expected = ?state.pending.map(|pending| pending.request_id.to_string()),
                "dropping stale completion"
            );
            return None;
        };
        state.pending = None;

        let result = self.try_complete(state, pending, result, ctx);
        Some(self.settle(state, result))
    }

    fn try_submit(&self, state: &mut WizardState, values: &FormValues, ctx: &StepContext<'_>) -> Result<StepOutcome, DriverError> {
        let program = self.registry.program(state.kind())?;
        let index = state.step_index;

        let plan = program.plan(index, &mut state.data, ctx)?;
        if let Some(pending) = state.pending {
            // Still loading what this step displays.
            return Ok(match plan {
                StepPlan::Input(request) => StepOutcome::RenderInput(request),
                _ => StepOutcome::Waiting(pending.request_id),
            });
        }

        let request = match plan {
            StepPlan::Input(request) => request,
            other => return self.run_from(state, program, ctx, Some(other)),
        };

        let errors = validate_form(&request.fields, values);
        if !errors.is_empty() {
            return Ok(StepOutcome::RenderInput(request.with_errors(errors)));
        }

        if let Err(errors) = program.submit(index, &mut state.data, values, ctx)? {
            return Ok(StepOutcome::RenderInput(request.with_errors(errors)));
        }

        state.step_index += 1;
        debug!(wizard = %state.kind(), run = state.run(), step = state.step_index, "step submitted");
        self.run_from(state, program, ctx, None)
    }

    fn try_complete(
        &self,
        state: &mut WizardState,
        pending: PendingStep,
        result: &ActionResult,
        ctx: &StepContext<'_>,
    ) -> Result<StepOutcome, DriverError> {
        let program = self.registry.program(state.kind())?;
        program.complete(pending.step_index, &mut state.data, result)?;
        debug!(
            wizard = %state.kind(),
            run = state.run(),
            request = %pending.request_id,
            success = result.success,
            "action completed"
        );

        state.step_index = pending.step_index;
        if pending.completion == Completion::Advance && result.success {
            state.step_index += 1;
        }
        self.run_from(state, program, ctx, None)
    }

    fn run_from(
        &self,
        state: &mut WizardState,
        program: &dyn WizardProgram,
        ctx: &StepContext<'_>,
        carried: Option<StepPlan>,
    ) -> Result<StepOutcome, DriverError> {
        let kind = state.kind();
        let mut carried = carried;

        for _ in 0..=program.len() {
            let index = state.step_index;
            let (step, role) = program.step(index).ok_or(DriverError::StepOutOfRange { kind, index })?;
            let plan = match carried.take() {
                Some(plan) => plan,
                None => program.plan(index, &mut state.data, ctx)?,
            };

            if !role.permits(&plan) {
                return Err(DriverError::RoleViolation {
                    kind,
                    step,
                    role: role.name(),
                    plan: plan.name(),
                });
            }

            match plan {
                StepPlan::Skip => {
                    if index + 1 >= program.len() {
                        return Err(DriverError::SkipLoop { kind });
                    }
                    debug!(wizard = %kind, step, "skipping step");
                    state.step_index += 1;
                }
                StepPlan::Input(request) => return Ok(StepOutcome::RenderInput(request)),
                StepPlan::Terminal(result) => return Ok(StepOutcome::Terminal(result)),
                StepPlan::Async(async_step) => {
                    if state.pending.is_some() {
                        return Err(DriverError::DuplicateDispatch { kind, step });
                    }
                    let request_id = RequestId::next();
                    state.pending = Some(PendingStep {
                        request_id,
                        step_index: index,
                        completion: async_step.completion,
                    });
                    let placeholder = match async_step.kind {
                        AsyncKind::Load => match program.plan(index, &mut state.data, ctx)? {
                            StepPlan::Input(request) => Some(request),
                            _ => None,
                        },
                        AsyncKind::Execute => None,
                    };
                    debug!(
                        wizard = %kind,
                        run = state.run(),
                        step,
                        request = %request_id,
                        action = %async_step.descriptor.summary(),
                        "dispatching step action"
                    );
                    return Ok(StepOutcome::RunAsync(PendingAction {
                        request_id,
                        descriptor: async_step.descriptor,
                        deadline: async_step.deadline,
                        kind: async_step.kind,
                        loading_text: async_step.loading_text,
                        placeholder,
                    }));
                }
            }
        }

        Err(DriverError::SkipLoop { kind })
    }

    fn settle(&self, state: &mut WizardState, result: Result<StepOutcome, DriverError>) -> StepOutcome {
        match result {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(wizard = %state.kind(), run = state.run(), step = state.step_index, error = %err, "wizard structural error");
                state.pending = None;
                StepOutcome::Terminal(TerminalResult::failure(
                    state.kind().title(),
                    format!("Something went wrong in this wizard: {err}"),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use skitz_types::{AppConfig, FieldValue};

    use super::*;
    use crate::wizard::WizardRegistry;
    use crate::wizards::{AddResourceData, DeployData};

    const ACCOUNTS: &str = r#"[{"name":"main","resourceGroup":"rg","location":"eastus","endpoint":"https://main.openai.azure.com/","kind":"OpenAI"}]"#;

    fn driver() -> StepDriver {
        StepDriver::new(Arc::new(WizardRegistry::with_builtin().unwrap()))
    }

    fn expect_load(outcome: StepOutcome) -> PendingAction {
        match outcome {
            StepOutcome::RunAsync(action) => action,
            other => panic!("expected an async action, got {other:?}"),
        }
    }

    #[test]
    fn valid_submits_advance_one_step_at_a_time() {
        let config = AppConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let ctx = StepContext::new(&config, &[], dir.path());
        let driver = driver();
        let (mut state, _) = driver.start(WizardKind::AddResource, &ctx);
        assert_eq!(state.step_index(), 0);

        // Invalid input leaves the index alone.
        let outcome = driver.submit(&mut state, &FormValues::new().with_text("name", "  "), &ctx);
        let StepOutcome::RenderInput(request) = outcome else { panic!("expected the name form again") };
        assert!(!request.errors.is_empty());
        assert_eq!(state.step_index(), 0);

        driver.submit(&mut state, &FormValues::new().with_text("name", "notes"), &ctx);
        assert_eq!(state.step_index(), 1);
        driver.submit(&mut state, &FormValues::new().with_text("template", "blank"), &ctx);
        assert_eq!(state.step_index(), 2);
        let outcome = driver.submit(&mut state, &FormValues::new().with("create", FieldValue::Bool(true)), &ctx);
        assert_eq!(state.step_index(), 3);
        assert!(matches!(outcome, StepOutcome::RunAsync(_)));
    }

    #[test]
    fn restarting_a_kind_starts_from_empty_data() {
        let config = AppConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let ctx = StepContext::new(&config, &[], dir.path());
        let driver = driver();

        let (mut first, _) = driver.start(WizardKind::AddResource, &ctx);
        driver.submit(&mut first, &FormValues::new().with_text("name", "notes"), &ctx);
        assert!(first.payload::<AddResourceData>().unwrap().slug.is_some());
        drop(first);

        let (second, _) = driver.start(WizardKind::AddResource, &ctx);
        assert_eq!(second.payload::<AddResourceData>(), Some(&AddResourceData::default()));
        assert_eq!(second.step_index(), 0);
    }

    #[test]
    fn loaded_resources_are_not_requested_again() {
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp"));
        let driver = driver();
        let (mut state, outcome) = driver.start(WizardKind::Deploy, &ctx);
        let load = expect_load(outcome);

        let outcome = driver.complete(&mut state, load.request_id, &ActionResult::ok(ACCOUNTS), &ctx).unwrap();
        assert!(matches!(outcome, StepOutcome::RenderInput(_)));

        for _ in 0..3 {
            let outcome = driver.advance(&mut state, &ctx);
            let StepOutcome::RenderInput(request) = outcome else { panic!("expected the account form") };
            assert_eq!(request.fields[0].choices[0].value, "main");
            assert!(!state.is_waiting());
        }
    }

    #[test]
    fn failed_resources_show_the_cached_error() {
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp"));
        let driver = driver();
        let (mut state, outcome) = driver.start(WizardKind::Deploy, &ctx);
        let load = expect_load(outcome);

        let failure = ActionResult::failure("ERROR: Please run 'az login' to setup account.");
        driver.complete(&mut state, load.request_id, &failure, &ctx).unwrap();

        for _ in 0..2 {
            let StepOutcome::RenderInput(request) = driver.advance(&mut state, &ctx) else {
                panic!("expected the account form");
            };
            assert_eq!(request.notice.as_deref(), Some("ERROR: Please run 'az login' to setup account."));
            assert!(!request.fields[0].choices[0].enabled);
            assert_eq!(state.step_index(), 0);
            assert!(!state.is_waiting());
        }
        assert!(state.payload::<DeployData>().unwrap().accounts.error().is_some());
    }

    #[test]
    fn completion_from_a_cancelled_run_of_the_same_kind_is_dropped() {
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp"));
        let driver = driver();

        let (first, outcome) = driver.start(WizardKind::Deploy, &ctx);
        let stale = expect_load(outcome);
        drop(first);

        let (mut second, outcome) = driver.start(WizardKind::Deploy, &ctx);
        let current = expect_load(outcome);
        assert_ne!(stale.request_id, current.request_id);

        assert!(driver.complete(&mut second, stale.request_id, &ActionResult::ok(ACCOUNTS), &ctx).is_none());
        assert!(second.waits_for(current.request_id));
        assert!(second.payload::<DeployData>().unwrap().accounts.is_loading());

        let outcome = driver.complete(&mut second, current.request_id, &ActionResult::ok(ACCOUNTS), &ctx);
        assert!(matches!(outcome, Some(StepOutcome::RenderInput(_))));
    }

    #[test]
    fn submitting_while_loading_re_renders_the_placeholder() {
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp"));
        let driver = driver();
        let (mut state, outcome) = driver.start(WizardKind::Deploy, &ctx);
        let load = expect_load(outcome);
        assert!(load.placeholder.is_some());

        let outcome = driver.submit(&mut state, &FormValues::new().with_text("account", "main"), &ctx);
        assert!(matches!(outcome, StepOutcome::RenderInput(_)));
        assert_eq!(state.step_index(), 0);
        assert!(state.waits_for(load.request_id));
    }

    #[test]
    fn out_of_range_index_is_a_terminal_failure() {
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp"));
        let driver = driver();
        let mut state = WizardState::new(WizardKind::Research);
        state.step_index = 42;

        let outcome = driver.advance(&mut state, &ctx);
        let StepOutcome::Terminal(result) = outcome else { panic!("expected terminal failure") };
        assert!(!result.success);
        assert!(result.message.starts_with("Something went wrong in this wizard"));
    }

    #[test]
    fn unregistered_kind_is_a_terminal_failure() {
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp"));
        let driver = StepDriver::new(Arc::new(WizardRegistry::new()));
        let (_, outcome) = driver.start(WizardKind::Deploy, &ctx);
        assert!(matches!(outcome, StepOutcome::Terminal(TerminalResult { success: false, .. })));
    }
}
