//! Step definitions and validated step tables.
//!
//! A wizard is an ordered list of [`StepSpec`]s. Each step has a `plan`
//! function that looks at the wizard's typed data and decides what happens
//! now ([`StepPlan`]): ask for input, dispatch an action, finish, or skip.
//! Input steps declare a `submit` handler; steps that dispatch actions declare
//! a `complete` handler that merges the result back into the data.
//!
//! The [`StepRole`] of a step restricts which plans it may produce. Tables are
//! checked when they are built, and the driver checks every plan against the
//! role at run time.

use std::collections::HashSet;

use skitz_types::{ActionDescriptor, ActionResult, ConfigChange, Deadline, FieldErrors, FormValues, InputRequest, WizardKind};

use crate::context::StepContext;
use crate::wizard::error::RegistryError;

/// What a step is allowed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepRole {
    /// Collects input; may skip itself or end the run early.
    Input,
    /// Loads something, then collects input that depends on it.
    Fetch,
    /// Dispatches an action and reports its outcome.
    Action,
    /// Produces the final result.
    Terminal,
}

impl StepRole {
    pub fn name(self) -> &'static str {
        match self {
            StepRole::Input => "input",
            StepRole::Fetch => "fetch",
            StepRole::Action => "action",
            StepRole::Terminal => "terminal",
        }
    }

    pub fn permits(self, plan: &StepPlan) -> bool {
        match (self, plan) {
            (StepRole::Terminal, StepPlan::Terminal(_)) => true,
            (StepRole::Terminal, _) => false,
            (StepRole::Input, StepPlan::Async(_)) => false,
            (StepRole::Action, StepPlan::Input(_)) => false,
            _ => true,
        }
    }

    fn needs_submit(self) -> bool {
        matches!(self, StepRole::Input | StepRole::Fetch)
    }

    fn needs_complete(self) -> bool {
        matches!(self, StepRole::Fetch | StepRole::Action)
    }

    fn can_finish(self) -> bool {
        matches!(self, StepRole::Action | StepRole::Terminal)
    }
}

/// What to do once an action completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Re-plan the same step (load-then-display, execute-then-report).
    Stay,
    /// Move to the next step on success; re-plan the same step on failure.
    Advance,
}

/// How the UI should present a pending action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AsyncKind {
    /// Background load behind an input step; the user may cancel.
    Load,
    /// Blocking execution; input is ignored until it completes.
    Execute,
}

/// An action a step wants dispatched.
#[derive(Clone, Debug, PartialEq)]
pub struct AsyncStep {
    pub descriptor: ActionDescriptor,
    pub deadline: Deadline,
    pub completion: Completion,
    pub kind: AsyncKind,
    pub loading_text: String,
}

impl AsyncStep {
    /// Short-deadline load whose result is displayed by the same step.
    pub fn load(descriptor: ActionDescriptor, loading_text: impl Into<String>) -> Self {
        Self {
            descriptor,
            deadline: Deadline::Short,
            completion: Completion::Stay,
            kind: AsyncKind::Load,
            loading_text: loading_text.into(),
        }
    }

    /// Long-deadline execution whose result is reported by the same step.
    pub fn execute(descriptor: ActionDescriptor, loading_text: impl Into<String>) -> Self {
        Self {
            descriptor,
            deadline: Deadline::Long,
            completion: Completion::Stay,
            kind: AsyncKind::Execute,
            loading_text: loading_text.into(),
        }
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn advance_on_success(mut self) -> Self {
        self.completion = Completion::Advance;
        self
    }
}

/// Final outcome of a wizard run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerminalResult {
    pub title: String,
    pub message: String,
    pub success: bool,
    /// Settings mutations to apply and persist.
    pub config_changes: Vec<ConfigChange>,
    /// The resources directory changed.
    pub reload_resources: bool,
}

impl TerminalResult {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            success: true,
            config_changes: Vec::new(),
            reload_resources: false,
        }
    }

    pub fn failure(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::success(title, message)
        }
    }

    pub fn with_config_change(mut self, change: ConfigChange) -> Self {
        self.config_changes.push(change);
        self
    }

    pub fn reloading_resources(mut self) -> Self {
        self.reload_resources = true;
        self
    }
}

/// The decision a step makes when it is (re-)entered.
#[derive(Clone, Debug, PartialEq)]
pub enum StepPlan {
    Input(InputRequest),
    Async(AsyncStep),
    Terminal(TerminalResult),
    /// Step does not apply to this run; move on.
    Skip,
}

impl StepPlan {
    pub fn name(&self) -> &'static str {
        match self {
            StepPlan::Input(_) => "input",
            StepPlan::Async(_) => "async",
            StepPlan::Terminal(_) => "terminal",
            StepPlan::Skip => "skip",
        }
    }
}

pub type PlanFn<D> = fn(&mut D, &StepContext<'_>) -> StepPlan;
pub type SubmitFn<D> = fn(&mut D, &FormValues, &StepContext<'_>) -> Result<(), FieldErrors>;
pub type CompleteFn<D> = fn(&mut D, &ActionResult);

/// One row of a step table.
pub struct StepSpec<D> {
    pub id: &'static str,
    pub role: StepRole,
    pub plan: PlanFn<D>,
    pub submit: Option<SubmitFn<D>>,
    pub complete: Option<CompleteFn<D>>,
}

impl<D> StepSpec<D> {
    pub fn new(id: &'static str, role: StepRole, plan: PlanFn<D>) -> Self {
        Self {
            id,
            role,
            plan,
            submit: None,
            complete: None,
        }
    }

    pub fn input(id: &'static str, plan: PlanFn<D>, submit: SubmitFn<D>) -> Self {
        Self::new(id, StepRole::Input, plan).on_submit(submit)
    }

    pub fn fetch(id: &'static str, plan: PlanFn<D>, submit: SubmitFn<D>, complete: CompleteFn<D>) -> Self {
        Self::new(id, StepRole::Fetch, plan).on_submit(submit).on_complete(complete)
    }

    pub fn action(id: &'static str, plan: PlanFn<D>, complete: CompleteFn<D>) -> Self {
        Self::new(id, StepRole::Action, plan).on_complete(complete)
    }

    pub fn terminal(id: &'static str, plan: PlanFn<D>) -> Self {
        Self::new(id, StepRole::Terminal, plan)
    }

    pub fn on_submit(mut self, submit: SubmitFn<D>) -> Self {
        self.submit = Some(submit);
        self
    }

    pub fn on_complete(mut self, complete: CompleteFn<D>) -> Self {
        self.complete = Some(complete);
        self
    }
}

/// An ordered, validated list of steps for one wizard kind.
pub struct StepTable<D> {
    kind: WizardKind,
    steps: Vec<StepSpec<D>>,
}

impl<D> StepTable<D> {
    /// Build a table, rejecting malformed step lists.
    pub fn new(kind: WizardKind, steps: Vec<StepSpec<D>>) -> Result<Self, RegistryError> {
        let Some(last) = steps.last() else {
            return Err(RegistryError::EmptyTable { kind });
        };
        if !last.role.can_finish() {
            return Err(RegistryError::NotTerminating { kind, step: last.id });
        }

        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.id) {
                return Err(RegistryError::DuplicateStep { kind, step: step.id });
            }
            if step.role.needs_submit() && step.submit.is_none() {
                return Err(RegistryError::MissingSubmit { kind, step: step.id });
            }
            if step.role.needs_complete() && step.complete.is_none() {
                return Err(RegistryError::MissingComplete { kind, step: step.id });
            }
        }

        Ok(Self { kind, steps })
    }

    pub fn kind(&self) -> WizardKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&StepSpec<D>> {
        self.steps.get(index)
    }

    pub fn step_ids(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Data;

    fn ask(_: &mut Data, _: &StepContext<'_>) -> StepPlan {
        StepPlan::Input(InputRequest::new("ask", "Ask", Vec::new()))
    }

    fn finish(_: &mut Data, _: &StepContext<'_>) -> StepPlan {
        StepPlan::Terminal(TerminalResult::success("Done", "ok"))
    }

    fn accept(_: &mut Data, _: &FormValues, _: &StepContext<'_>) -> Result<(), FieldErrors> {
        Ok(())
    }

    fn merge(_: &mut Data, _: &ActionResult) {}

    #[test]
    fn rejects_empty_tables() {
        let result = StepTable::<Data>::new(WizardKind::Research, Vec::new());
        assert!(matches!(result, Err(RegistryError::EmptyTable { .. })));
    }

    #[test]
    fn rejects_duplicate_step_ids() {
        let result = StepTable::new(
            WizardKind::Research,
            vec![StepSpec::input("ask", ask, accept), StepSpec::input("ask", ask, accept), StepSpec::terminal("done", finish)],
        );
        assert_eq!(
            result.err(),
            Some(RegistryError::DuplicateStep {
                kind: WizardKind::Research,
                step: "ask"
            })
        );
    }

    #[test]
    fn rejects_missing_handlers() {
        let result = StepTable::new(
            WizardKind::Research,
            vec![StepSpec::new("ask", StepRole::Input, ask), StepSpec::terminal("done", finish)],
        );
        assert!(matches!(result, Err(RegistryError::MissingSubmit { step: "ask", .. })));

        let result = StepTable::new(
            WizardKind::Research,
            vec![StepSpec::new("load", StepRole::Fetch, ask).on_submit(accept), StepSpec::terminal("done", finish)],
        );
        assert!(matches!(result, Err(RegistryError::MissingComplete { step: "load", .. })));
    }

    #[test]
    fn rejects_tables_that_cannot_finish() {
        let result = StepTable::new(WizardKind::Research, vec![StepSpec::input("ask", ask, accept)]);
        assert!(matches!(result, Err(RegistryError::NotTerminating { step: "ask", .. })));
    }

    #[test]
    fn accepts_well_formed_tables() {
        let table = StepTable::new(
            WizardKind::Research,
            vec![StepSpec::input("ask", ask, accept), StepSpec::action("run", finish, merge)],
        )
        .unwrap();
        assert_eq!(table.step_ids(), vec!["ask", "run"]);
    }

    #[test]
    fn roles_restrict_plans() {
        let input = StepPlan::Input(InputRequest::new("s", "t", Vec::new()));
        let terminal = StepPlan::Terminal(TerminalResult::success("t", "m"));
        assert!(StepRole::Input.permits(&input));
        assert!(StepRole::Input.permits(&terminal));
        assert!(!StepRole::Action.permits(&input));
        assert!(!StepRole::Terminal.permits(&StepPlan::Skip));
        assert!(StepRole::Fetch.permits(&input));
    }
}
