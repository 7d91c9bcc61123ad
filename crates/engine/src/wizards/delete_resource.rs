use skitz_types::{ActionDescriptor, ActionResult, FieldChoice, FieldErrors, FieldSpec, FieldValue, FormValues, InputRequest, WizardKind};
use skitz_util::Resource;

use crate::context::StepContext;
use crate::wizard::{AsyncResource, AsyncStep, RegistryError, StepPlan, StepSpec, StepTable, TerminalResult};

const TITLE: &str = "Delete Resource";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeleteResourceData {
    pub target: Option<Resource>,
    pub confirmed: bool,
    pub removed: AsyncResource<()>,
}

pub fn table() -> Result<StepTable<DeleteResourceData>, RegistryError> {
    StepTable::new(
        WizardKind::DeleteResource,
        vec![
            StepSpec::input("pick", plan_pick, submit_pick),
            StepSpec::input("confirm", plan_confirm, submit_confirm),
            StepSpec::action("remove", plan_remove, complete_remove),
        ],
    )
}

fn plan_pick(_data: &mut DeleteResourceData, ctx: &StepContext<'_>) -> StepPlan {
    if ctx.resources.is_empty() {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, "No resources to delete"));
    }
    let options = ctx
        .resources
        .iter()
        .map(|resource| FieldChoice::new(resource.title.clone(), resource.name.clone()).with_hint(resource.name.clone()))
        .collect();
    StepPlan::Input(InputRequest::new(
        "pick",
        "Select Resource",
        vec![FieldSpec::select("resource", "Resource", options).required()],
    ))
}

fn submit_pick(data: &mut DeleteResourceData, values: &FormValues, ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    let name = values.text("resource").unwrap_or_default();
    let resource = ctx
        .resources
        .iter()
        .find(|resource| resource.name == name)
        .ok_or_else(|| FieldErrors::single("resource", format!("Resource '{name}' no longer exists")))?;
    data.target = Some(resource.clone());
    Ok(())
}

fn plan_confirm(data: &mut DeleteResourceData, _ctx: &StepContext<'_>) -> StepPlan {
    let name = data.target.as_ref().map(|resource| resource.name.as_str()).unwrap_or_default();
    StepPlan::Input(
        InputRequest::new(
            "confirm",
            "Confirm",
            vec![FieldSpec::confirm("delete", format!("Delete '{name}'?")).default_value(FieldValue::Bool(false))],
        )
        .with_notice("This removes the file from disk."),
    )
}

fn submit_confirm(data: &mut DeleteResourceData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    data.confirmed = values.flag("delete");
    Ok(())
}

fn plan_remove(data: &mut DeleteResourceData, _ctx: &StepContext<'_>) -> StepPlan {
    let Some(target) = data.target.clone() else {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, "No resource selected"));
    };
    if data.removed.loaded().is_some() {
        return StepPlan::Terminal(TerminalResult::success(TITLE, format!("Deleted resource: {}", target.name)).reloading_resources());
    }
    if let Some(error) = data.removed.error() {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, format!("Failed to delete '{}': {error}", target.name)));
    }
    if !data.confirmed {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, "Cancelled"));
    }

    data.removed.begin();
    StepPlan::Async(AsyncStep::execute(
        ActionDescriptor::RemoveFile { path: target.path },
        format!("Deleting {}...", target.name),
    ))
}

fn complete_remove(data: &mut DeleteResourceData, result: &ActionResult) {
    let outcome = if result.success {
        Ok(())
    } else {
        Err(result.message().to_string())
    };
    data.removed.finish(outcome);
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use skitz_types::AppConfig;

    use super::*;
    use crate::wizard::{StepDriver, StepOutcome, WizardRegistry};

    fn resource(name: &str) -> Resource {
        Resource {
            name: name.into(),
            path: Path::new("/tmp/resources").join(format!("{name}.md")),
            title: name.to_uppercase(),
            summary: None,
            commands: Vec::new(),
        }
    }

    #[test]
    fn nothing_to_delete_ends_immediately() {
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp/resources"));
        let driver = StepDriver::new(Arc::new(WizardRegistry::with_builtin().unwrap()));
        let (_, outcome) = driver.start(WizardKind::DeleteResource, &ctx);
        let StepOutcome::Terminal(result) = outcome else { panic!("expected terminal") };
        assert_eq!(result.message, "No resources to delete");
    }

    #[test]
    fn confirmed_delete_removes_file_and_reloads() {
        let config = AppConfig::default();
        let resources = vec![resource("docker"), resource("git")];
        let ctx = StepContext::new(&config, &resources, Path::new("/tmp/resources"));
        let driver = StepDriver::new(Arc::new(WizardRegistry::with_builtin().unwrap()));
        let (mut state, _) = driver.start(WizardKind::DeleteResource, &ctx);

        driver.submit(&mut state, &FormValues::new().with_text("resource", "git"), &ctx);
        let outcome = driver.submit(&mut state, &FormValues::new().with("delete", FieldValue::Bool(true)), &ctx);
        let StepOutcome::RunAsync(action) = outcome else { panic!("expected removal") };
        assert_eq!(
            action.descriptor,
            ActionDescriptor::RemoveFile {
                path: Path::new("/tmp/resources/git.md").to_path_buf()
            }
        );

        let outcome = driver.complete(&mut state, action.request_id, &ActionResult::ok(""), &ctx).unwrap();
        let StepOutcome::Terminal(result) = outcome else { panic!("expected terminal") };
        assert!(result.success && result.reload_resources);
    }

    #[test]
    fn failed_removal_reports_error_without_reload() {
        let mut data = DeleteResourceData {
            target: Some(resource("git")),
            confirmed: true,
            ..DeleteResourceData::default()
        };
        complete_remove(&mut data, &ActionResult::failure("permission denied"));
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp/resources"));
        let StepPlan::Terminal(result) = plan_remove(&mut data, &ctx) else { panic!("expected terminal") };
        assert!(!result.success);
        assert!(!result.reload_resources);
        assert!(result.message.contains("permission denied"));
    }
}
