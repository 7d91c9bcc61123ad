use std::path::PathBuf;

use skitz_types::{ActionDescriptor, ActionResult, FieldChoice, FieldErrors, FieldSpec, FieldValue, FormValues, InputRequest, WizardKind};
use skitz_util::{ResourceTemplate, resource_path, slugify};

use crate::context::StepContext;
use crate::wizard::{AsyncResource, AsyncStep, RegistryError, StepPlan, StepSpec, StepTable, TerminalResult};

const TITLE: &str = "Add Resource";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AddResourceData {
    pub slug: Option<String>,
    pub template: Option<ResourceTemplate>,
    pub confirmed: bool,
    pub created: AsyncResource<PathBuf>,
}

pub fn table() -> Result<StepTable<AddResourceData>, RegistryError> {
    StepTable::new(
        WizardKind::AddResource,
        vec![
            StepSpec::input("name", plan_name, submit_name),
            StepSpec::input("template", plan_template, submit_template),
            StepSpec::input("confirm", plan_confirm, submit_confirm),
            StepSpec::action("create", plan_create, complete_create),
        ],
    )
}

fn plan_name(_data: &mut AddResourceData, _ctx: &StepContext<'_>) -> StepPlan {
    StepPlan::Input(InputRequest::new(
        "name",
        "New Resource",
        vec![
            FieldSpec::text("name", "Resource Name")
                .required()
                .placeholder("my-resource")
                .describe("Lowercase name used for the file, e.g. my-resource"),
        ],
    ))
}

fn submit_name(data: &mut AddResourceData, values: &FormValues, ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    let slug = slugify(values.text("name").unwrap_or_default());
    if slug.is_empty() {
        return Err(FieldErrors::single("name", "Resource name must contain letters or digits"));
    }
    if ctx.resources.iter().any(|resource| resource.name == slug) || resource_path(ctx.resources_dir, &slug).exists() {
        return Err(FieldErrors::single("name", format!("Resource '{slug}' already exists")));
    }
    data.slug = Some(slug);
    Ok(())
}

fn plan_template(_data: &mut AddResourceData, _ctx: &StepContext<'_>) -> StepPlan {
    let options = ResourceTemplate::ALL
        .iter()
        .map(|template| FieldChoice::new(template.label(), template.id()))
        .collect();
    StepPlan::Input(InputRequest::new(
        "template",
        "Choose a Template",
        vec![
            FieldSpec::select("template", "Template", options)
                .required()
                .default_value(FieldValue::Text(ResourceTemplate::Commands.id().into())),
        ],
    ))
}

fn submit_template(data: &mut AddResourceData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    let template = values
        .text("template")
        .and_then(ResourceTemplate::from_id)
        .ok_or_else(|| FieldErrors::single("template", "select one of the available options"))?;
    data.template = Some(template);
    Ok(())
}

fn plan_confirm(data: &mut AddResourceData, _ctx: &StepContext<'_>) -> StepPlan {
    let slug = data.slug.as_deref().unwrap_or_default();
    let template = data.template.map(ResourceTemplate::id).unwrap_or_default();
    StepPlan::Input(InputRequest::new(
        "confirm",
        "Confirm",
        vec![
            FieldSpec::confirm("create", format!("Create '{slug}' with '{template}' template?"))
                .default_value(FieldValue::Bool(true)),
        ],
    ))
}

fn submit_confirm(data: &mut AddResourceData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    data.confirmed = values.flag("create");
    Ok(())
}

fn plan_create(data: &mut AddResourceData, ctx: &StepContext<'_>) -> StepPlan {
    let slug = data.slug.clone().unwrap_or_default();
    if let Some(path) = data.created.loaded() {
        return StepPlan::Terminal(
            TerminalResult::success(TITLE, format!("Created resource: {slug}\n\n{}", path.display())).reloading_resources(),
        );
    }
    if let Some(error) = data.created.error() {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, format!("Failed to create '{slug}': {error}")));
    }
    if !data.confirmed {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, "Cancelled"));
    }

    let template = data.template.unwrap_or(ResourceTemplate::Blank);
    data.created.begin();
    StepPlan::Async(AsyncStep::execute(
        ActionDescriptor::WriteFile {
            path: resource_path(ctx.resources_dir, &slug),
            contents: template.render(&slug),
            create_new: true,
        },
        format!("Creating {slug}..."),
    ))
}

fn complete_create(data: &mut AddResourceData, result: &ActionResult) {
    let outcome = if result.success {
        Ok(PathBuf::from(result.output.trim()))
    } else {
        Err(result.message().to_string())
    };
    data.created.finish(outcome);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use skitz_types::AppConfig;
    use skitz_util::Resource;
    use tempfile::tempdir;

    use super::*;
    use crate::wizard::{StepDriver, StepOutcome, WizardRegistry};

    fn driver() -> StepDriver {
        StepDriver::new(Arc::new(WizardRegistry::with_builtin().unwrap()))
    }

    #[test]
    fn duplicate_names_are_rejected_inline() {
        let dir = tempdir().unwrap();
        let config = AppConfig::default();
        let existing = vec![Resource {
            name: "git".into(),
            path: dir.path().join("git.md"),
            title: "Git".into(),
            summary: None,
            commands: Vec::new(),
        }];
        let ctx = StepContext::new(&config, &existing, dir.path());
        let driver = driver();
        let (mut state, _) = driver.start(WizardKind::AddResource, &ctx);

        let outcome = driver.submit(&mut state, &FormValues::new().with_text("name", "Git"), &ctx);
        let StepOutcome::RenderInput(request) = outcome else { panic!("expected inline error") };
        assert_eq!(request.errors.get("name"), Some("Resource 'git' already exists"));
        assert_eq!(state.step_index(), 0);
    }

    #[test]
    fn confirmed_create_writes_template_and_reloads() {
        let dir = tempdir().unwrap();
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], dir.path());
        let driver = driver();
        let (mut state, _) = driver.start(WizardKind::AddResource, &ctx);

        driver.submit(&mut state, &FormValues::new().with_text("name", "My Notes"), &ctx);
        driver.submit(&mut state, &FormValues::new().with_text("template", "detailed"), &ctx);
        let outcome = driver.submit(&mut state, &FormValues::new().with("create", FieldValue::Bool(true)), &ctx);
        let StepOutcome::RunAsync(action) = outcome else { panic!("expected a write, got {outcome:?}") };
        let ActionDescriptor::WriteFile { path, contents, create_new } = &action.descriptor else {
            panic!("expected WriteFile");
        };
        assert_eq!(path, &dir.path().join("my-notes.md"));
        assert!(contents.starts_with("# my-notes"));
        assert!(create_new);

        let done = ActionResult::ok(path.display().to_string());
        let outcome = driver.complete(&mut state, action.request_id, &done, &ctx).unwrap();
        let StepOutcome::Terminal(result) = outcome else { panic!("expected terminal") };
        assert!(result.success);
        assert!(result.reload_resources);
        assert!(result.message.starts_with("Created resource: my-notes"));
    }

    #[test]
    fn declining_confirmation_cancels() {
        let dir = tempdir().unwrap();
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], dir.path());
        let driver = driver();
        let (mut state, _) = driver.start(WizardKind::AddResource, &ctx);

        driver.submit(&mut state, &FormValues::new().with_text("name", "scratch"), &ctx);
        driver.submit(&mut state, &FormValues::new().with_text("template", "blank"), &ctx);
        let outcome = driver.submit(&mut state, &FormValues::new().with("create", FieldValue::Bool(false)), &ctx);
        let StepOutcome::Terminal(result) = outcome else { panic!("expected cancel") };
        assert!(!result.success);
        assert!(!result.reload_resources);
        assert!(!state.is_waiting());
    }
}
