//! Deploy an agent backed by an Azure AI model deployment.
//!
//! Loads the user's Azure AI accounts, then the model deployments of the
//! chosen account, collects the deployment method and task prompt, fetches the
//! account key and finally creates a container instance (or queues a pipeline
//! run) that executes the prompt.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use skitz_types::{ActionResult, Deadline, FieldChoice, FieldErrors, FieldSpec, FieldValue, FormValues, InputRequest, Validator, WizardKind};

use crate::context::StepContext;
use crate::wizard::{AsyncResource, AsyncStep, RegistryError, StepPlan, StepSpec, StepTable, TerminalResult};
use crate::wizards::{cli_failure, loaded_choices, process};

const TITLE: &str = "Deploy Agent";
const AZURE_CLI_REQUIRED: &str =
    "Azure CLI is required but not installed. Install from: https://docs.microsoft.com/en-us/cli/azure/install-azure-cli";
const NO_ACCOUNTS: &str = "No Azure AI accounts found. Create one at: https://ai.azure.com";
const AGENT_IMAGE: &str = "python:3.11-slim";

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct AzureAccount {
    pub name: String,
    #[serde(rename = "resourceGroup")]
    pub resource_group: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub kind: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ModelDeployment {
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl ModelDeployment {
    fn label(&self) -> String {
        match (&self.model, &self.version) {
            (Some(model), Some(version)) if !version.is_empty() => format!("{} ({model} v{version})", self.name),
            (Some(model), _) if !model.is_empty() => format!("{} ({model})", self.name),
            _ => self.name.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeployMethod {
    /// Azure Container Instance, runs once.
    ContainerInstance,
    /// Azure DevOps pipeline run.
    Pipeline,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineTarget {
    pub organization: String,
    pub project: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeployData {
    pub accounts: AsyncResource<Vec<AzureAccount>>,
    pub account: Option<AzureAccount>,
    pub deployments: AsyncResource<Vec<ModelDeployment>>,
    pub deployment: Option<ModelDeployment>,
    pub method: Option<DeployMethod>,
    pub agent_name: Option<String>,
    pub pipeline: Option<PipelineTarget>,
    pub prompt: Option<String>,
    pub api_key: AsyncResource<String>,
    pub deployed: AsyncResource<String>,
}

pub fn table() -> Result<StepTable<DeployData>, RegistryError> {
    StepTable::new(
        WizardKind::Deploy,
        vec![
            StepSpec::fetch("account", plan_account, submit_account, complete_accounts),
            StepSpec::fetch("deployment", plan_deployment, submit_deployment, complete_deployments),
            StepSpec::input("method", plan_method, submit_method),
            StepSpec::input("pipeline", plan_pipeline, submit_pipeline),
            StepSpec::input("prompt", plan_prompt, submit_prompt),
            StepSpec::action("credentials", plan_credentials, complete_credentials),
            StepSpec::action("deploy", plan_deploy, complete_deploy),
        ],
    )
}

fn list_accounts_args() -> Vec<&'static str> {
    vec![
        "cognitiveservices",
        "account",
        "list",
        "--query",
        "[?kind=='OpenAI' || kind=='CognitiveServices'].{name:name, resourceGroup:resourceGroup, location:location, endpoint:properties.endpoint, kind:kind}",
        "-o",
        "json",
    ]
}

fn plan_account(data: &mut DeployData, _ctx: &StepContext<'_>) -> StepPlan {
    if !data.accounts.is_attempted() {
        data.accounts.begin();
        return StepPlan::Async(AsyncStep::load(process("az", &list_accounts_args()), "Loading Azure AI accounts..."));
    }

    let (choices, notice) = loaded_choices(&data.accounts, "accounts", |account| {
        FieldChoice::new(format!("{} ({}, {})", account.name, account.kind, account.location), &account.name)
    });
    let mut request = InputRequest::new(
        "account",
        "Select Azure AI account",
        vec![FieldSpec::select("account", "Account", choices).required()],
    );
    if let Some(notice) = notice {
        request = request.with_notice(notice);
    }
    StepPlan::Input(request)
}

fn complete_accounts(data: &mut DeployData, result: &ActionResult) {
    let outcome = if result.success {
        serde_json::from_str::<Vec<AzureAccount>>(&result.output)
            .map_err(|err| format!("Unexpected output from az: {err}"))
            .and_then(|accounts| if accounts.is_empty() { Err(NO_ACCOUNTS.to_string()) } else { Ok(accounts) })
    } else {
        Err(cli_failure(result, AZURE_CLI_REQUIRED))
    };
    data.accounts.finish(outcome);
}

fn submit_account(data: &mut DeployData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    let selected = values.text("account").unwrap_or_default();
    let account = data
        .accounts
        .loaded()
        .and_then(|accounts| accounts.iter().find(|account| account.name == selected))
        .cloned()
        .ok_or_else(|| FieldErrors::single("account", "select one of the loaded accounts"))?;

    if data.account.as_ref() != Some(&account) {
        data.deployments.reset();
        data.deployment = None;
    }
    data.account = Some(account);
    Ok(())
}

fn plan_deployment(data: &mut DeployData, _ctx: &StepContext<'_>) -> StepPlan {
    let Some(account) = data.account.clone() else {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, "No Azure AI account selected"));
    };

    if !data.deployments.is_attempted() {
        data.deployments.begin();
        let descriptor = process(
            "az",
            &[
                "cognitiveservices",
                "account",
                "deployment",
                "list",
                "--resource-group",
                &account.resource_group,
                "--name",
                &account.name,
                "--query",
                "[].{name:name, model:properties.model.name, version:properties.model.version, sku:sku.name, capacity:sku.capacity}",
                "-o",
                "json",
            ],
        );
        return StepPlan::Async(AsyncStep::load(descriptor, "Loading model deployments..."));
    }

    let (choices, notice) = loaded_choices(&data.deployments, "deployments", |deployment| {
        FieldChoice::new(deployment.label(), &deployment.name)
    });
    let mut request = InputRequest::new(
        "deployment",
        "Select model deployment",
        vec![FieldSpec::select("deployment", "Deployment", choices).required()],
    );
    if let Some(notice) = notice {
        request = request.with_notice(notice);
    }
    StepPlan::Input(request)
}

fn complete_deployments(data: &mut DeployData, result: &ActionResult) {
    let account = data.account.as_ref().map(|account| account.name.clone()).unwrap_or_default();
    let outcome = if result.success {
        serde_json::from_str::<Vec<ModelDeployment>>(&result.output)
            .map_err(|err| format!("Unexpected output from az: {err}"))
            .and_then(|deployments| {
                if deployments.is_empty() {
                    Err(format!(
                        "No model deployments found in account '{account}'. Deploy a model at: https://ai.azure.com"
                    ))
                } else {
                    Ok(deployments)
                }
            })
    } else {
        Err(cli_failure(result, AZURE_CLI_REQUIRED))
    };
    data.deployments.finish(outcome);
}

fn submit_deployment(data: &mut DeployData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    let selected = values.text("deployment").unwrap_or_default();
    let deployment = data
        .deployments
        .loaded()
        .and_then(|deployments| deployments.iter().find(|deployment| deployment.name == selected))
        .cloned()
        .ok_or_else(|| FieldErrors::single("deployment", "select one of the loaded deployments"))?;
    data.deployment = Some(deployment);
    Ok(())
}

fn default_agent_name() -> String {
    let seconds = SystemTime::now().duration_since(UNIX_EPOCH).map(|elapsed| elapsed.as_secs()).unwrap_or_default();
    format!("agent-{seconds}")
}

fn plan_method(_data: &mut DeployData, _ctx: &StepContext<'_>) -> StepPlan {
    StepPlan::Input(InputRequest::new(
        "method",
        "Deployment method",
        vec![
            FieldSpec::select(
                "method",
                "Method",
                vec![
                    FieldChoice::new("Azure Container Instance (run once)", "aci"),
                    FieldChoice::new("Azure Pipeline (CI/CD)", "pipeline"),
                ],
            )
            .required()
            .default_value(FieldValue::Text("aci".into())),
            FieldSpec::text("agent_name", "Agent name")
                .required()
                .validate_with(Validator::Slug)
                .default_value(FieldValue::Text(default_agent_name())),
        ],
    ))
}

fn submit_method(data: &mut DeployData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    let method = match values.text("method") {
        Some("pipeline") => DeployMethod::Pipeline,
        _ => DeployMethod::ContainerInstance,
    };
    data.method = Some(method);
    data.agent_name = values.text("agent_name").map(str::to_string);
    Ok(())
}

fn plan_pipeline(data: &mut DeployData, _ctx: &StepContext<'_>) -> StepPlan {
    if data.method != Some(DeployMethod::Pipeline) {
        return StepPlan::Skip;
    }
    StepPlan::Input(InputRequest::new(
        "pipeline",
        "Azure DevOps pipeline",
        vec![
            FieldSpec::text("organization", "Organization URL")
                .required()
                .placeholder("https://dev.azure.com/my-org")
                .validate_with(Validator::Url),
            FieldSpec::text("project", "Project").required(),
        ],
    ))
}

fn submit_pipeline(data: &mut DeployData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    let (Some(organization), Some(project)) = (values.text("organization"), values.text("project")) else {
        return Err(FieldErrors::form("Organization and project are required"));
    };
    data.pipeline = Some(PipelineTarget {
        organization: organization.to_string(),
        project: project.to_string(),
    });
    Ok(())
}

fn plan_prompt(_data: &mut DeployData, _ctx: &StepContext<'_>) -> StepPlan {
    StepPlan::Input(InputRequest::new(
        "prompt",
        "Task for the agent",
        vec![
            FieldSpec::long_text("prompt", "Task prompt")
                .required()
                .placeholder("Review this PR and suggest improvements..."),
        ],
    ))
}

fn submit_prompt(data: &mut DeployData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    match values.text("prompt") {
        Some(prompt) => {
            data.prompt = Some(prompt.to_string());
            Ok(())
        }
        None => Err(FieldErrors::single("prompt", "No task prompt provided")),
    }
}

fn plan_credentials(data: &mut DeployData, _ctx: &StepContext<'_>) -> StepPlan {
    if data.method == Some(DeployMethod::Pipeline) {
        return StepPlan::Skip;
    }
    if let Some(error) = data.api_key.error() {
        return StepPlan::Terminal(TerminalResult::failure(
            TITLE,
            format!("Failed to retrieve Azure AI API key\n\n{error}"),
        ));
    }
    if data.api_key.loaded().is_some() {
        return StepPlan::Skip;
    }
    let Some(account) = data.account.clone() else {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, "No Azure AI account selected"));
    };

    data.api_key.begin();
    let descriptor = process(
        "az",
        &[
            "cognitiveservices",
            "account",
            "keys",
            "list",
            "--resource-group",
            &account.resource_group,
            "--name",
            &account.name,
            "--query",
            "key1",
            "-o",
            "tsv",
        ],
    );
    StepPlan::Async(
        AsyncStep::execute(descriptor, "Fetching account key...")
            .with_deadline(Deadline::Short)
            .advance_on_success(),
    )
}

fn complete_credentials(data: &mut DeployData, result: &ActionResult) {
    let key = result.output.trim();
    let outcome = if result.success && !key.is_empty() {
        Ok(key.to_string())
    } else if result.success {
        Err("The account returned an empty key".to_string())
    } else {
        Err(cli_failure(result, AZURE_CLI_REQUIRED))
    };
    data.api_key.finish(outcome);
}

fn plan_deploy(data: &mut DeployData, _ctx: &StepContext<'_>) -> StepPlan {
    if let Some(summary) = data.deployed.loaded() {
        return StepPlan::Terminal(TerminalResult::success(TITLE, format!("✓ Deployment successful!\n\n{summary}")));
    }
    if let Some(error) = data.deployed.error() {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, format!("Deployment failed:\n\n{error}")));
    }

    let (Some(account), Some(deployment), Some(prompt)) = (&data.account, &data.deployment, &data.prompt) else {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, "Deployment details are incomplete"));
    };
    let agent_name = data.agent_name.clone().unwrap_or_else(default_agent_name);
    let endpoint = account.endpoint.clone().unwrap_or_default();

    let descriptor = match (data.method, &data.pipeline) {
        (Some(DeployMethod::Pipeline), Some(pipeline)) => process(
            "az",
            &[
                "pipelines",
                "run",
                "--org",
                &pipeline.organization,
                "--project",
                &pipeline.project,
                "--name",
                &agent_name,
                "--variables",
                &format!("AZURE_OPENAI_ENDPOINT={endpoint}"),
                &format!("AZURE_OPENAI_DEPLOYMENT={}", deployment.name),
                &format!("AGENT_PROMPT={prompt}"),
            ],
        ),
        (Some(DeployMethod::Pipeline), None) => {
            return StepPlan::Terminal(TerminalResult::failure(TITLE, "Pipeline organization and project are missing"));
        }
        _ => {
            let Some(api_key) = data.api_key.loaded() else {
                return StepPlan::Terminal(TerminalResult::failure(TITLE, "Failed to retrieve Azure AI API key"));
            };
            process(
                "az",
                &[
                    "container",
                    "create",
                    "--resource-group",
                    &account.resource_group,
                    "--name",
                    &agent_name,
                    "--image",
                    AGENT_IMAGE,
                    "--restart-policy",
                    "Never",
                    "--location",
                    &account.location,
                    "--environment-variables",
                    &format!("AZURE_OPENAI_ENDPOINT={endpoint}"),
                    &format!("AZURE_OPENAI_DEPLOYMENT={}", deployment.name),
                    &format!("AGENT_PROMPT={prompt}"),
                    "--secure-environment-variables",
                    &format!("AZURE_OPENAI_API_KEY={api_key}"),
                    "--command-line",
                    &agent_script(),
                ],
            )
        }
    };

    data.agent_name = Some(agent_name);
    data.deployed.begin();
    StepPlan::Async(AsyncStep::execute(descriptor, "Deploying agent..."))
}

fn agent_script() -> String {
    concat!(
        "/bin/sh -c 'pip install openai && python3 -c \"",
        "import os; from openai import AzureOpenAI; ",
        "client = AzureOpenAI(azure_endpoint=os.environ[\\\"AZURE_OPENAI_ENDPOINT\\\"], ",
        "api_key=os.environ[\\\"AZURE_OPENAI_API_KEY\\\"], api_version=\\\"2024-02-15-preview\\\"); ",
        "response = client.chat.completions.create(model=os.environ[\\\"AZURE_OPENAI_DEPLOYMENT\\\"], ",
        "messages=[{\\\"role\\\": \\\"user\\\", \\\"content\\\": os.environ[\\\"AGENT_PROMPT\\\"]}]); ",
        "print(response.choices[0].message.content)\"'"
    )
    .to_string()
}

fn complete_deploy(data: &mut DeployData, result: &ActionResult) {
    if !result.success {
        data.deployed.finish(Err(cli_failure(result, AZURE_CLI_REQUIRED)));
        return;
    }

    let agent = data.agent_name.clone().unwrap_or_default();
    let model = data
        .deployment
        .as_ref()
        .map(|deployment| deployment.model.clone().unwrap_or_else(|| deployment.name.clone()))
        .unwrap_or_default();
    let summary = match (data.method, &data.account, &data.pipeline) {
        (Some(DeployMethod::Pipeline), _, Some(pipeline)) => format!(
            "Pipeline '{agent}' queued in {}/{}\n\nModel: {model}\n\nSet AZURE_OPENAI_API_KEY as a secret pipeline variable before the run starts.",
            pipeline.organization, pipeline.project
        ),
        (_, Some(account), _) => format!(
            "Container '{agent}' deployed successfully!\n\nResource Group: {}\nLocation: {}\nModel: {model}\n\nTo view logs:\naz container logs --resource-group {} --name {agent} --follow",
            account.resource_group, account.location, account.resource_group
        ),
        _ => format!("Agent '{agent}' deployed"),
    };
    data.deployed.finish(Ok(summary));
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use skitz_types::{ActionDescriptor, AppConfig};

    use super::*;
    use crate::wizard::{AsyncKind, StepDriver, StepOutcome, WizardRegistry};

    fn driver() -> StepDriver {
        StepDriver::new(Arc::new(WizardRegistry::with_builtin().unwrap()))
    }

    fn accounts_json() -> String {
        r#"[{"name":"main","resourceGroup":"rg-ai","location":"eastus","endpoint":"https://main.openai.azure.com/","kind":"OpenAI"}]"#.to_string()
    }

    #[test]
    fn first_step_dispatches_account_load_with_placeholder() {
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp"));
        let (state, outcome) = driver().start(WizardKind::Deploy, &ctx);

        let StepOutcome::RunAsync(action) = outcome else {
            panic!("expected account load, got {outcome:?}");
        };
        assert_eq!(action.kind, AsyncKind::Load);
        assert_eq!(action.deadline, Deadline::Short);
        assert!(matches!(&action.descriptor, ActionDescriptor::Process { program, .. } if program == "az"));
        let placeholder = action.placeholder.expect("form shown while loading");
        assert!(!placeholder.fields[0].choices[0].enabled);
        assert!(state.waits_for(action.request_id));
    }

    #[test]
    fn empty_account_list_is_reported_inline_without_reloading() {
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp"));
        let driver = driver();
        let (mut state, outcome) = driver.start(WizardKind::Deploy, &ctx);
        let StepOutcome::RunAsync(action) = outcome else { panic!("expected load") };

        let outcome = driver.complete(&mut state, action.request_id, &ActionResult::ok("[]"), &ctx).unwrap();
        let StepOutcome::RenderInput(request) = outcome else {
            panic!("expected inline error, got {outcome:?}");
        };
        assert_eq!(request.notice.as_deref(), Some(NO_ACCOUNTS));
        assert_eq!(request.fields[0].choices[0].label, "Unable to load accounts");
        assert_eq!(state.step_index(), 0);

        // Re-entering the step does not dispatch the load again.
        let outcome = driver.advance(&mut state, &ctx);
        assert!(matches!(outcome, StepOutcome::RenderInput(_)));
        assert!(!state.is_waiting());
        assert_eq!(state.step_index(), 0);
    }

    #[test]
    fn missing_cli_maps_to_install_hint() {
        let mut data = DeployData::default();
        data.accounts.begin();
        complete_accounts(&mut data, &ActionResult::failure("az: command not found"));
        assert_eq!(data.accounts.error(), Some(AZURE_CLI_REQUIRED));
    }

    #[test]
    fn container_deploy_runs_key_fetch_then_create() {
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp"));
        let driver = driver();
        let (mut state, outcome) = driver.start(WizardKind::Deploy, &ctx);
        let StepOutcome::RunAsync(load) = outcome else { panic!("expected load") };
        driver.complete(&mut state, load.request_id, &ActionResult::ok(accounts_json()), &ctx);

        let outcome = driver.submit(&mut state, &FormValues::new().with_text("account", "main"), &ctx);
        let StepOutcome::RunAsync(load) = outcome else { panic!("expected deployment load, got {outcome:?}") };
        assert_eq!(state.step_index(), 1);
        driver.complete(
            &mut state,
            load.request_id,
            &ActionResult::ok(r#"[{"name":"gpt4o","model":"gpt-4o","version":"2024-05-13"}]"#),
            &ctx,
        );

        driver.submit(&mut state, &FormValues::new().with_text("deployment", "gpt4o"), &ctx);
        let outcome = driver.submit(
            &mut state,
            &FormValues::new().with_text("method", "aci").with_text("agent_name", "agent-1"),
            &ctx,
        );
        assert!(matches!(&outcome, StepOutcome::RenderInput(request) if request.step == "prompt"));

        let outcome = driver.submit(&mut state, &FormValues::new().with_text("prompt", "Summarize the logs"), &ctx);
        let StepOutcome::RunAsync(key) = outcome else { panic!("expected key fetch, got {outcome:?}") };
        assert_eq!(key.kind, AsyncKind::Execute);

        let outcome = driver.complete(&mut state, key.request_id, &ActionResult::ok("secret-key\n"), &ctx).unwrap();
        let StepOutcome::RunAsync(deploy) = outcome else { panic!("expected deploy, got {outcome:?}") };
        let ActionDescriptor::Process { args, .. } = &deploy.descriptor else { panic!("expected process") };
        assert!(args.contains(&"AZURE_OPENAI_API_KEY=secret-key".to_string()));
        assert!(args.contains(&"rg-ai".to_string()));

        let outcome = driver.complete(&mut state, deploy.request_id, &ActionResult::ok("{}"), &ctx).unwrap();
        let StepOutcome::Terminal(result) = outcome else { panic!("expected result") };
        assert!(result.success);
        assert!(result.message.contains("Container 'agent-1' deployed successfully!"));
    }

    #[test]
    fn failed_key_fetch_ends_the_run() {
        let mut data = DeployData {
            method: Some(DeployMethod::ContainerInstance),
            ..DeployData::default()
        };
        data.api_key.begin();
        complete_credentials(&mut data, &ActionResult::failure("AuthorizationFailed"));
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp"));
        let StepPlan::Terminal(result) = plan_credentials(&mut data, &ctx) else {
            panic!("expected terminal failure");
        };
        assert!(!result.success);
        assert!(result.message.contains("AuthorizationFailed"));
    }

    #[test]
    fn pipeline_step_is_skipped_for_container_deploys() {
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp"));
        let mut data = DeployData {
            method: Some(DeployMethod::ContainerInstance),
            ..DeployData::default()
        };
        assert_eq!(plan_pipeline(&mut data, &ctx), StepPlan::Skip);
        data.method = Some(DeployMethod::Pipeline);
        assert!(matches!(plan_pipeline(&mut data, &ctx), StepPlan::Input(_)));
    }
}
