//! Run a `^run` command from a resource file, or toggle it as a favorite.

use std::env;

use skitz_types::{
    ActionDescriptor, ActionResult, ConfigChange, FieldChoice, FieldErrors, FieldSpec, FieldValue, FormValues, InputRequest, WizardKind,
};
use skitz_util::{ResourceCommand, display_safe};

use crate::context::StepContext;
use crate::wizard::{AsyncResource, AsyncStep, RegistryError, StepPlan, StepSpec, StepTable, TerminalResult};
use crate::wizards::cli_failure;

const TITLE: &str = "Run Command";
const DEFAULT_SHELL: &str = "/bin/sh";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CommandAction {
    #[default]
    Run,
    ToggleFavorite,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunCommandData {
    pub resource: Option<String>,
    pub command: Option<ResourceCommand>,
    pub action: CommandAction,
    pub input: Option<String>,
    pub output: AsyncResource<String>,
}

pub fn table() -> Result<StepTable<RunCommandData>, RegistryError> {
    StepTable::new(
        WizardKind::RunCommand,
        vec![
            StepSpec::input("pick", plan_pick, submit_pick),
            StepSpec::input("input", plan_input, submit_input),
            StepSpec::action("run", plan_run, complete_run),
        ],
    )
}

fn choice_value(resource: &str, command: &ResourceCommand) -> String {
    format!("{resource}:{}", command.line)
}

fn plan_pick(_data: &mut RunCommandData, ctx: &StepContext<'_>) -> StepPlan {
    let mut favorites = Vec::new();
    let mut others = Vec::new();
    for resource in ctx.resources {
        for command in &resource.commands {
            let hint = if command.description.is_empty() {
                resource.title.clone()
            } else {
                format!("{} ({})", command.description, resource.title)
            };
            let value = choice_value(&resource.name, command);
            if ctx.config.is_favorite(&command.command) {
                favorites.push(FieldChoice::new(format!("⭐ {}", command.command), value).with_hint(hint));
            } else {
                others.push(FieldChoice::new(command.command.clone(), value).with_hint(hint));
            }
        }
    }
    if favorites.is_empty() && others.is_empty() {
        return StepPlan::Terminal(TerminalResult::failure(
            TITLE,
            "No runnable commands. Mark a command with ^run in a resource file.",
        ));
    }
    favorites.extend(others);

    StepPlan::Input(InputRequest::new(
        "pick",
        "Select Command",
        vec![
            FieldSpec::select("command", "Command", favorites).required(),
            FieldSpec::select(
                "action",
                "Action",
                vec![
                    FieldChoice::new("Run it", "run"),
                    FieldChoice::new("Toggle favorite", "favorite"),
                ],
            )
            .default_value(FieldValue::Text("run".into())),
        ],
    ))
}

fn submit_pick(data: &mut RunCommandData, values: &FormValues, ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    let selected = values.text("command").unwrap_or_default();
    let (resource, command) = ctx
        .resources
        .iter()
        .flat_map(|resource| resource.commands.iter().map(move |command| (resource, command)))
        .find(|(resource, command)| choice_value(&resource.name, command) == selected)
        .ok_or_else(|| FieldErrors::single("command", "That command is no longer in its resource file"))?;

    data.resource = Some(resource.name.clone());
    data.command = Some(command.clone());
    data.action = match values.text("action") {
        Some("favorite") => CommandAction::ToggleFavorite,
        _ => CommandAction::Run,
    };
    Ok(())
}

fn plan_input(data: &mut RunCommandData, _ctx: &StepContext<'_>) -> StepPlan {
    if data.action != CommandAction::Run {
        return StepPlan::Skip;
    }
    let Some(command) = &data.command else {
        return StepPlan::Skip;
    };
    let Some(var) = &command.input_var else {
        return StepPlan::Skip;
    };
    StepPlan::Input(
        InputRequest::new("input", format!("Value for {var}"), vec![FieldSpec::text("value", var.clone()).required()])
            .with_notice(command.command.clone()),
    )
}

fn submit_input(data: &mut RunCommandData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    data.input = values.text("value").map(str::to_string);
    Ok(())
}

fn shell() -> String {
    env::var("SHELL")
        .ok()
        .filter(|shell| !shell.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SHELL.to_string())
}

fn plan_run(data: &mut RunCommandData, ctx: &StepContext<'_>) -> StepPlan {
    let Some(command) = data.command.clone() else {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, "No command selected"));
    };

    if data.action == CommandAction::ToggleFavorite {
        let change = ConfigChange::SetFavorite {
            command: command.command.clone(),
            favorite: !ctx.config.is_favorite(&command.command),
        };
        return StepPlan::Terminal(TerminalResult::success(TITLE, change.describe()).with_config_change(change));
    }

    let rendered = command.render(data.input.as_deref());
    if let Some(output) = data.output.loaded() {
        let body = if output.trim().is_empty() { "(no output)" } else { output.as_str() };
        return StepPlan::Terminal(TerminalResult::success(TITLE, format!("$ {rendered}\n\n{body}")));
    }
    if let Some(error) = data.output.error() {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, format!("$ {rendered}\n\n{error}")));
    }

    data.output.begin();
    StepPlan::Async(AsyncStep::execute(
        ActionDescriptor::Process {
            program: shell(),
            args: vec!["-c".to_string(), rendered.clone()],
            env: Vec::new(),
        },
        format!("Running {}...", display_safe(&rendered, 40)),
    ))
}

fn complete_run(data: &mut RunCommandData, result: &ActionResult) {
    let outcome = if result.success {
        Ok(result.output.clone())
    } else {
        Err(cli_failure(result, "The shell could not be started. Set $SHELL to a valid shell."))
    };
    data.output.finish(outcome);
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use skitz_types::AppConfig;
    use skitz_util::{Resource, parse_commands};

    use super::*;
    use crate::wizard::{StepDriver, StepOutcome, WizardRegistry};

    fn git_resource() -> Resource {
        Resource {
            name: "git".into(),
            path: Path::new("/tmp/resources/git.md").to_path_buf(),
            title: "Git".into(),
            summary: None,
            commands: parse_commands("# Git\n`git status` Show status ^run\n`git checkout {{branch}}` Switch ^run:branch\n"),
        }
    }

    fn driver() -> StepDriver {
        StepDriver::new(Arc::new(WizardRegistry::with_builtin().unwrap()))
    }

    fn shell_line(outcome: StepOutcome) -> (ActionDescriptor, skitz_types::RequestId) {
        let StepOutcome::RunAsync(action) = outcome else { panic!("expected a process, got {outcome:?}") };
        (action.descriptor, action.request_id)
    }

    #[test]
    fn no_annotated_commands_ends_immediately() {
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp/resources"));
        let (_, outcome) = driver().start(WizardKind::RunCommand, &ctx);
        let StepOutcome::Terminal(result) = outcome else { panic!("expected terminal") };
        assert!(!result.success);
    }

    #[test]
    fn plain_command_runs_in_the_shell() {
        let config = AppConfig::default();
        let resources = vec![git_resource()];
        let ctx = StepContext::new(&config, &resources, Path::new("/tmp/resources"));
        let driver = driver();
        let (mut state, _) = driver.start(WizardKind::RunCommand, &ctx);

        let outcome = driver.submit(&mut state, &FormValues::new().with_text("command", "git:2"), &ctx);
        let (descriptor, request_id) = shell_line(outcome);
        let ActionDescriptor::Process { args, .. } = descriptor else { panic!("expected a process") };
        assert_eq!(args, vec!["-c", "git status"]);

        let outcome = driver
            .complete(&mut state, request_id, &ActionResult::ok("On branch main\n"), &ctx)
            .unwrap();
        let StepOutcome::Terminal(result) = outcome else { panic!("expected terminal") };
        assert!(result.success);
        assert!(result.message.starts_with("$ git status"));
        assert!(result.message.contains("On branch main"));
    }

    #[test]
    fn placeholder_is_asked_for_before_running() {
        let config = AppConfig::default();
        let resources = vec![git_resource()];
        let ctx = StepContext::new(&config, &resources, Path::new("/tmp/resources"));
        let driver = driver();
        let (mut state, _) = driver.start(WizardKind::RunCommand, &ctx);

        let outcome = driver.submit(&mut state, &FormValues::new().with_text("command", "git:3"), &ctx);
        let StepOutcome::RenderInput(request) = outcome else { panic!("expected the branch prompt, got {outcome:?}") };
        assert!(request.field("value").is_some());
        assert_eq!(state.step_index(), 1);

        let outcome = driver.submit(&mut state, &FormValues::new().with_text("value", "main"), &ctx);
        let (descriptor, _) = shell_line(outcome);
        let ActionDescriptor::Process { args, .. } = descriptor else { panic!("expected a process") };
        assert_eq!(args[1], "git checkout main");
    }

    #[test]
    fn toggling_a_favorite_returns_a_config_change() {
        let mut config = AppConfig::default();
        let resources = vec![git_resource()];
        let driver = driver();
        let values = FormValues::new().with_text("command", "git:2").with_text("action", "favorite");

        let ctx = StepContext::new(&config, &resources, Path::new("/tmp/resources"));
        let (mut state, _) = driver.start(WizardKind::RunCommand, &ctx);
        let StepOutcome::Terminal(result) = driver.submit(&mut state, &values, &ctx) else { panic!("expected terminal") };
        assert_eq!(
            result.config_changes,
            vec![ConfigChange::SetFavorite {
                command: "git status".into(),
                favorite: true,
            }]
        );

        config.favorites.push("git status".into());
        let ctx = StepContext::new(&config, &resources, Path::new("/tmp/resources"));
        let (mut state, outcome) = driver.start(WizardKind::RunCommand, &ctx);
        let StepOutcome::RenderInput(request) = outcome else { panic!("expected the picker") };
        let choices = &request.field("command").unwrap().choices;
        assert!(choices[0].label.starts_with('⭐'));

        let StepOutcome::Terminal(result) = driver.submit(&mut state, &values, &ctx) else { panic!("expected terminal") };
        assert!(matches!(&result.config_changes[0], ConfigChange::SetFavorite { favorite: false, .. }));
    }

    #[test]
    fn failing_command_reports_its_error() {
        let mut data = RunCommandData {
            command: Some(git_resource().commands[0].clone()),
            ..RunCommandData::default()
        };
        complete_run(&mut data, &ActionResult::failure("fatal: not a git repository"));
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp/resources"));
        let StepPlan::Terminal(result) = plan_run(&mut data, &ctx) else { panic!("expected terminal") };
        assert!(!result.success);
        assert!(result.message.contains("not a git repository"));
    }
}
