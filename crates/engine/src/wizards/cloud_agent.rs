//! Run, list and stop AI agents on Azure, AWS or GCP.
//!
//! Azure actions and the AWS/GCP listings shell out to the provider CLI.
//! The remaining actions print the commands to run by hand.

use serde::Deserialize;
use skitz_types::{ActionResult, FieldChoice, FieldErrors, FieldSpec, FieldValue, FormValues, InputRequest, Validator, WizardKind};

use crate::context::StepContext;
use crate::wizard::{AsyncResource, AsyncStep, RegistryError, StepPlan, StepSpec, StepTable, TerminalResult};
use crate::wizards::{cli_failure, process};

const TITLE: &str = "Cloud Agent";
const AGENT_RESOURCE_GROUP: &str = "skitz-agents";
const AGENT_IMAGE: &str = "python:3.11-slim";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloudProvider {
    Azure,
    Aws,
    Gcp,
}

impl CloudProvider {
    const ALL: [CloudProvider; 3] = [CloudProvider::Azure, CloudProvider::Aws, CloudProvider::Gcp];

    fn id(self) -> &'static str {
        match self {
            CloudProvider::Azure => "azure",
            CloudProvider::Aws => "aws",
            CloudProvider::Gcp => "gcp",
        }
    }

    fn label(self) -> &'static str {
        match self {
            CloudProvider::Azure => "Azure (ACI, Azure AI)",
            CloudProvider::Aws => "AWS (Lambda, Bedrock)",
            CloudProvider::Gcp => "GCP (Cloud Run, Vertex AI)",
        }
    }

    fn install_hint(self) -> &'static str {
        match self {
            CloudProvider::Azure => {
                "Azure CLI is required but not installed. Install from: https://docs.microsoft.com/en-us/cli/azure/install-azure-cli"
            }
            CloudProvider::Aws => "AWS CLI is required but not installed. Install from: https://aws.amazon.com/cli/",
            CloudProvider::Gcp => "Google Cloud SDK is required but not installed. Install from: https://cloud.google.com/sdk/docs/install",
        }
    }

    fn regions(self) -> &'static [(&'static str, &'static str)] {
        match self {
            CloudProvider::Azure => &[
                ("East US", "eastus"),
                ("West US 2", "westus2"),
                ("West Europe", "westeurope"),
                ("North Europe", "northeurope"),
                ("Southeast Asia", "southeastasia"),
            ],
            CloudProvider::Aws => &[
                ("US East (N. Virginia)", "us-east-1"),
                ("US West (Oregon)", "us-west-2"),
                ("EU (Ireland)", "eu-west-1"),
                ("EU (Frankfurt)", "eu-central-1"),
                ("Asia Pacific (Singapore)", "ap-southeast-1"),
            ],
            CloudProvider::Gcp => &[
                ("US Central (Iowa)", "us-central1"),
                ("US East (S. Carolina)", "us-east1"),
                ("Europe West (Belgium)", "europe-west1"),
                ("Asia East (Taiwan)", "asia-east1"),
            ],
        }
    }

    fn models(self) -> &'static [(&'static str, &'static str)] {
        match self {
            CloudProvider::Azure => &[("GPT-4o", "gpt-4o"), ("GPT-4o Mini", "gpt-4o-mini"), ("GPT-4 Turbo", "gpt-4-turbo")],
            CloudProvider::Aws => &[
                ("Claude 3.5 Sonnet", "anthropic.claude-3-5-sonnet-20240620-v1:0"),
                ("Claude 3 Haiku", "anthropic.claude-3-haiku-20240307-v1:0"),
                ("Titan Text Express", "amazon.titan-text-express-v1"),
            ],
            CloudProvider::Gcp => &[
                ("Gemini 1.5 Pro", "gemini-1.5-pro"),
                ("Gemini 1.5 Flash", "gemini-1.5-flash"),
                ("PaLM 2", "text-bison"),
            ],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloudAction {
    RunAgent,
    ExecuteTask,
    ListAgents,
    StopAgent,
}

impl CloudAction {
    const ALL: [CloudAction; 4] = [
        CloudAction::RunAgent,
        CloudAction::ExecuteTask,
        CloudAction::ListAgents,
        CloudAction::StopAgent,
    ];

    fn id(self) -> &'static str {
        match self {
            CloudAction::RunAgent => "run_agent",
            CloudAction::ExecuteTask => "execute_task",
            CloudAction::ListAgents => "list_agents",
            CloudAction::StopAgent => "stop_agent",
        }
    }

    fn label(self) -> &'static str {
        match self {
            CloudAction::RunAgent => "Run Agent - Deploy and run an AI agent",
            CloudAction::ExecuteTask => "Execute Task - Run a one-time task",
            CloudAction::ListAgents => "List Agents - View running agents",
            CloudAction::StopAgent => "Stop Agent - Terminate a running agent",
        }
    }
}

/// Parameters collected for the chosen action.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CloudParams {
    pub agent_name: Option<String>,
    pub region: Option<String>,
    pub model: Option<String>,
    pub prompt: Option<String>,
    pub task: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CloudAgentData {
    pub provider: Option<CloudProvider>,
    pub action: Option<CloudAction>,
    pub params: CloudParams,
    pub outcome: AsyncResource<(String, String)>,
}

pub fn table() -> Result<StepTable<CloudAgentData>, RegistryError> {
    StepTable::new(
        WizardKind::CloudAgent,
        vec![
            StepSpec::input("provider", plan_provider, submit_provider),
            StepSpec::input("action", plan_action, submit_action),
            StepSpec::input("params", plan_params, submit_params),
            StepSpec::action("execute", plan_execute, complete_execute),
        ],
    )
}

fn choices(options: &[(&str, &str)]) -> Vec<FieldChoice> {
    options.iter().map(|(label, value)| FieldChoice::new(*label, *value)).collect()
}

fn plan_provider(_data: &mut CloudAgentData, _ctx: &StepContext<'_>) -> StepPlan {
    let options = CloudProvider::ALL
        .iter()
        .map(|provider| FieldChoice::new(provider.label(), provider.id()))
        .collect();
    StepPlan::Input(InputRequest::new(
        "provider",
        "Select Cloud Provider",
        vec![FieldSpec::select("provider", "Provider", options).required()],
    ))
}

fn submit_provider(data: &mut CloudAgentData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    let selected = values.text("provider").unwrap_or_default();
    let provider = CloudProvider::ALL
        .into_iter()
        .find(|provider| provider.id() == selected)
        .ok_or_else(|| FieldErrors::single("provider", "select one of the available options"))?;
    data.provider = Some(provider);
    Ok(())
}

fn plan_action(data: &mut CloudAgentData, _ctx: &StepContext<'_>) -> StepPlan {
    let provider = data.provider.map(CloudProvider::id).unwrap_or_default();
    let options = CloudAction::ALL.iter().map(|action| FieldChoice::new(action.label(), action.id())).collect();
    StepPlan::Input(
        InputRequest::new("action", "Select Action", vec![FieldSpec::select("action", "Action", options).required()])
            .with_notice(format!("Available actions for {provider}")),
    )
}

fn submit_action(data: &mut CloudAgentData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    let selected = values.text("action").unwrap_or_default();
    let action = CloudAction::ALL
        .into_iter()
        .find(|action| action.id() == selected)
        .ok_or_else(|| FieldErrors::single("action", "select one of the available options"))?;
    data.action = Some(action);
    data.params = CloudParams::default();
    Ok(())
}

fn param_fields(provider: CloudProvider, action: CloudAction) -> Vec<FieldSpec> {
    let region = FieldSpec::select("region", "Region", choices(provider.regions())).required();
    match action {
        CloudAction::RunAgent => vec![
            FieldSpec::text("agent_name", "Agent name")
                .placeholder("my-agent")
                .validate_with(Validator::Slug),
            region,
            FieldSpec::select("model", "Model", choices(provider.models())).required(),
            FieldSpec::long_text("prompt", "Task prompt")
                .required()
                .placeholder("Analyze the data and provide insights..."),
        ],
        CloudAction::ExecuteTask => vec![
            region,
            FieldSpec::long_text("task", "Task command")
                .required()
                .placeholder("python script.py --analyze"),
        ],
        CloudAction::ListAgents => {
            let mut options = vec![FieldChoice::new("All Regions", "all")];
            options.extend(choices(provider.regions()));
            vec![
                FieldSpec::select("region", "Region", options)
                    .describe("Filter by region (optional)")
                    .default_value(FieldValue::Text("all".into())),
            ]
        }
        CloudAction::StopAgent => vec![
            FieldSpec::text("agent_name", "Agent name")
                .required()
                .placeholder("agent-1234567890"),
        ],
    }
}

fn plan_params(data: &mut CloudAgentData, _ctx: &StepContext<'_>) -> StepPlan {
    let (Some(provider), Some(action)) = (data.provider, data.action) else {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, "No provider or action selected"));
    };
    let fields = param_fields(provider, action);
    if fields.is_empty() {
        return StepPlan::Skip;
    }
    StepPlan::Input(InputRequest::new(
        format!("params-{}-{}", provider.id(), action.id()),
        format!("{} on {}", action.label().split(" - ").next().unwrap_or_default(), provider.id()),
        fields,
    ))
}

fn submit_params(data: &mut CloudAgentData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    let owned = |id: &str| values.text(id).map(str::to_string);
    data.params = CloudParams {
        agent_name: owned("agent_name"),
        region: owned("region"),
        model: owned("model"),
        prompt: owned("prompt"),
        task: owned("task"),
    };
    Ok(())
}

fn plan_execute(data: &mut CloudAgentData, _ctx: &StepContext<'_>) -> StepPlan {
    if let Some((title, output)) = data.outcome.loaded() {
        return StepPlan::Terminal(TerminalResult::success(title.clone(), output.clone()));
    }
    if let Some(error) = data.outcome.error() {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, error.to_string()));
    }

    let (Some(provider), Some(action)) = (data.provider, data.action) else {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, "No provider or action selected"));
    };
    let params = &data.params;
    let region = params.region.clone().unwrap_or_else(|| "all".into());
    let name = params.agent_name.clone().unwrap_or_else(generated_name);

    let descriptor = match (provider, action) {
        (CloudProvider::Azure, CloudAction::RunAgent) => {
            let model = params.model.clone().unwrap_or_default();
            let prompt = params.prompt.clone().unwrap_or_default();
            process(
                "az",
                &[
                    "container",
                    "create",
                    "--resource-group",
                    AGENT_RESOURCE_GROUP,
                    "--name",
                    &name,
                    "--image",
                    AGENT_IMAGE,
                    "--restart-policy",
                    "Never",
                    "--location",
                    &region,
                    "--environment-variables",
                    &format!("AGENT_MODEL={model}"),
                    &format!("AGENT_PROMPT={prompt}"),
                    "--command-line",
                    "/bin/sh -c 'pip install openai && python3 -c \"import os; from openai import AzureOpenAI; client = AzureOpenAI(azure_endpoint=os.environ.get(\\\"AZURE_OPENAI_ENDPOINT\\\", \\\"\\\"), api_key=os.environ.get(\\\"AZURE_OPENAI_API_KEY\\\", \\\"\\\"), api_version=\\\"2024-02-15-preview\\\"); r = client.chat.completions.create(model=os.environ[\\\"AGENT_MODEL\\\"], messages=[{\\\"role\\\": \\\"user\\\", \\\"content\\\": os.environ[\\\"AGENT_PROMPT\\\"]}]); print(r.choices[0].message.content)\"'",
                ],
            )
        }
        (CloudProvider::Azure, CloudAction::ListAgents) => {
            process("az", &["container", "list", "--resource-group", AGENT_RESOURCE_GROUP, "-o", "json"])
        }
        (CloudProvider::Azure, CloudAction::StopAgent) => process(
            "az",
            &["container", "delete", "--resource-group", AGENT_RESOURCE_GROUP, "--name", &name, "--yes"],
        ),
        (CloudProvider::Aws, CloudAction::ListAgents) => {
            let mut args = vec![
                "lambda",
                "list-functions",
                "--query",
                "Functions[?starts_with(FunctionName, 'agent-')]",
                "--output",
                "json",
            ];
            if region != "all" {
                args.extend(["--region", region.as_str()]);
            }
            process("aws", &args)
        }
        (CloudProvider::Gcp, CloudAction::ListAgents) => {
            let region_flag = format!("--region={region}");
            let mut args = vec!["run", "services", "list", "--format=json"];
            if region != "all" {
                args.push(region_flag.as_str());
            }
            process("gcloud", &args)
        }
        _ => return StepPlan::Terminal(manual_instructions(provider, action, &name, &region, params)),
    };

    data.params.agent_name = Some(name);
    data.outcome.begin();
    StepPlan::Async(AsyncStep::execute(descriptor, "Executing cloud action..."))
}

fn generated_name() -> String {
    let seconds = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    format!("agent-{seconds}")
}

/// Actions that are not automated: tell the user what to run.
fn manual_instructions(provider: CloudProvider, action: CloudAction, name: &str, region: &str, params: &CloudParams) -> TerminalResult {
    let model = params.model.as_deref().unwrap_or_default();
    let task = params.task.as_deref().unwrap_or_default();
    let (title, message) = match (provider, action) {
        (CloudProvider::Azure, _) => (
            "Azure Task",
            format!(
                "Task execution would run in Azure Container Instances.\n\nRegion: {region}\nCommand: {task}\n\nTo execute manually:\naz container create --resource-group {AGENT_RESOURCE_GROUP} --name task-$(date +%s) --image {AGENT_IMAGE} --command-line \"{task}\" --restart-policy Never"
            ),
        ),
        (CloudProvider::Aws, CloudAction::RunAgent) => (
            "AWS Agent",
            format!(
                "AWS Bedrock agent deployment prepared.\n\nAgent: {name}\nRegion: {region}\nModel: {model}\n\nTo deploy using AWS Lambda + Bedrock:\naws lambda create-function --function-name {name} --runtime python3.11 --handler lambda.handler --role arn:aws:iam::ACCOUNT:role/lambda-bedrock-role\n\nOr use ECS for longer-running tasks:\naws ecs run-task --cluster agents --task-definition bedrock-agent"
            ),
        ),
        (CloudProvider::Aws, CloudAction::StopAgent) => (
            "Stop AWS Agent",
            format!(
                "To delete Lambda function '{name}':\n\naws lambda delete-function --function-name {name}\n\nTo stop an ECS task:\naws ecs stop-task --cluster agents --task <task-arn>"
            ),
        ),
        (CloudProvider::Aws, _) => (
            "AWS Task",
            format!(
                "AWS task execution prepared.\n\nRegion: {region}\nCommand: {task}\n\nExecute via Lambda:\naws lambda invoke --function-name task-runner --payload '{{\"cmd\":\"{task}\"}}' response.json"
            ),
        ),
        (CloudProvider::Gcp, CloudAction::RunAgent) => (
            "GCP Agent",
            format!(
                "GCP Vertex AI agent deployment prepared.\n\nAgent: {name}\nRegion: {region}\nModel: {model}\n\nTo deploy using Cloud Run:\ngcloud run deploy {name} --image {AGENT_IMAGE} --region {region} --allow-unauthenticated\n\nTo invoke Vertex AI directly:\ngcloud ai models predict --model={model} --region={region}"
            ),
        ),
        (CloudProvider::Gcp, CloudAction::StopAgent) => (
            "Stop GCP Agent",
            format!("To delete Cloud Run service '{name}':\n\ngcloud run services delete {name} --quiet"),
        ),
        (CloudProvider::Gcp, _) => (
            "GCP Task",
            format!(
                "GCP task execution prepared.\n\nRegion: {region}\nCommand: {task}\n\nExecute via Cloud Run Jobs:\ngcloud run jobs create task-$(date +%s) --image {AGENT_IMAGE} --command \"{task}\" --region {region} --execute-now"
            ),
        ),
    };
    TerminalResult::success(title, message)
}

#[derive(Deserialize)]
struct AzureContainer {
    name: String,
    #[serde(default)]
    location: String,
    #[serde(default, rename = "provisioningState")]
    provisioning_state: String,
}

#[derive(Deserialize)]
struct LambdaFunction {
    #[serde(rename = "FunctionName")]
    function_name: String,
    #[serde(default, rename = "Runtime")]
    runtime: String,
    #[serde(default, rename = "LastModified")]
    last_modified: String,
}

#[derive(Deserialize)]
struct RunService {
    #[serde(default)]
    metadata: RunMetadata,
    #[serde(default)]
    status: RunStatus,
}

#[derive(Default, Deserialize)]
struct RunMetadata {
    #[serde(default)]
    name: String,
}

#[derive(Default, Deserialize)]
struct RunStatus {
    #[serde(default)]
    url: String,
}

fn table_rows(header: &[&str], rows: impl Iterator<Item = Vec<String>>) -> String {
    let mut out = format!("| {} |\n|{}|\n", header.join(" | "), vec!["---"; header.len()].join("|"));
    for row in rows {
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out
}

fn complete_execute(data: &mut CloudAgentData, result: &ActionResult) {
    let (Some(provider), Some(action)) = (data.provider, data.action) else {
        data.outcome.finish(Err("No provider or action selected".into()));
        return;
    };
    if !result.success {
        let error = cli_failure(result, provider.install_hint());
        let message = if provider == CloudProvider::Azure && error.contains("ResourceGroupNotFound") {
            let region = data.params.region.as_deref().unwrap_or("eastus");
            format!(
                "Resource group '{AGENT_RESOURCE_GROUP}' not found.\n\nCreate it first with:\naz group create --name {AGENT_RESOURCE_GROUP} --location {region}\n\nThen try again."
            )
        } else {
            error
        };
        data.outcome.finish(Err(message));
        return;
    }

    let name = data.params.agent_name.clone().unwrap_or_default();
    let output = result.output.as_str();
    let outcome = match (provider, action) {
        (CloudProvider::Azure, CloudAction::RunAgent) => Ok((
            "Azure Agent - Deployed!".to_string(),
            format!(
                "Agent '{name}' deployed successfully!\n\nRegion: {}\nModel: {}\n\nView logs:\naz container logs --resource-group {AGENT_RESOURCE_GROUP} --name {name} --follow\n\nStop agent:\naz container delete --resource-group {AGENT_RESOURCE_GROUP} --name {name} -y",
                data.params.region.as_deref().unwrap_or_default(),
                data.params.model.as_deref().unwrap_or_default(),
            ),
        )),
        (CloudProvider::Azure, CloudAction::StopAgent) => {
            Ok(("Agent Stopped".to_string(), format!("Agent '{name}' has been stopped and deleted.")))
        }
        (CloudProvider::Azure, _) => serde_json::from_str::<Vec<AzureContainer>>(output)
            .map_err(|_| "Failed to parse agent list".to_string())
            .map(|containers| {
                if containers.is_empty() {
                    ("Azure Agents".to_string(), format!("No agents running in resource group '{AGENT_RESOURCE_GROUP}'"))
                } else {
                    let body = table_rows(
                        &["Name", "Region", "Status"],
                        containers.iter().map(|c| vec![c.name.clone(), c.location.clone(), c.provisioning_state.clone()]),
                    );
                    (format!("Azure Agents ({})", containers.len()), body)
                }
            }),
        (CloudProvider::Aws, _) => match serde_json::from_str::<Vec<LambdaFunction>>(output) {
            Ok(functions) if !functions.is_empty() => {
                let body = table_rows(
                    &["Function", "Runtime", "Last Modified"],
                    functions.iter().map(|f| vec![f.function_name.clone(), f.runtime.clone(), f.last_modified.clone()]),
                );
                Ok((format!("AWS Agents ({})", functions.len()), body))
            }
            _ => Ok((
                "AWS Agents".to_string(),
                "No agent functions found (looking for functions starting with 'agent-')".to_string(),
            )),
        },
        (CloudProvider::Gcp, _) => match serde_json::from_str::<Vec<RunService>>(output) {
            Ok(services) if !services.is_empty() => {
                let body = table_rows(
                    &["Service", "URL"],
                    services.iter().map(|s| vec![s.metadata.name.clone(), s.status.url.clone()]),
                );
                Ok((format!("GCP Services ({})", services.len()), body))
            }
            _ => Ok(("GCP Agents".to_string(), "No Cloud Run services found".to_string())),
        },
    };
    data.outcome.finish(outcome);
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use skitz_types::{ActionDescriptor, AppConfig};

    use super::*;
    use crate::wizard::{StepDriver, StepOutcome, WizardRegistry};

    fn descriptor_program(descriptor: &ActionDescriptor) -> Option<&str> {
        match descriptor {
            ActionDescriptor::Process { program, .. } => Some(program),
            _ => None,
        }
    }

    fn run_to_execute(provider: &str, action: &str, params: FormValues) -> (StepDriver, crate::wizard::WizardState, StepOutcome) {
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp"));
        let driver = StepDriver::new(Arc::new(WizardRegistry::with_builtin().unwrap()));
        let (mut state, _) = driver.start(WizardKind::CloudAgent, &ctx);
        driver.submit(&mut state, &FormValues::new().with_text("provider", provider), &ctx);
        driver.submit(&mut state, &FormValues::new().with_text("action", action), &ctx);
        let outcome = driver.submit(&mut state, &params, &ctx);
        (driver, state, outcome)
    }

    #[test]
    fn azure_listing_shells_out_to_az() {
        let (driver, mut state, outcome) = run_to_execute("azure", "list_agents", FormValues::new().with_text("region", "all"));
        let StepOutcome::RunAsync(action) = outcome else { panic!("expected dispatch, got {outcome:?}") };
        assert_eq!(descriptor_program(&action.descriptor), Some("az"));
        assert_eq!(state.step_index(), 3);

        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp"));
        let listing = r#"[{"name":"agent-1","location":"eastus","provisioningState":"Succeeded"}]"#;
        let outcome = driver.complete(&mut state, action.request_id, &ActionResult::ok(listing), &ctx).unwrap();
        let StepOutcome::Terminal(result) = outcome else { panic!("expected result") };
        assert_eq!(result.title, "Azure Agents (1)");
        assert!(result.message.contains("| agent-1 | eastus | Succeeded |"));
    }

    #[test]
    fn gcp_run_agent_prints_instructions() {
        let params = FormValues::new()
            .with_text("agent_name", "agent-7")
            .with_text("region", "us-central1")
            .with_text("model", "gemini-1.5-pro")
            .with_text("prompt", "hello");
        let (_, state, outcome) = run_to_execute("gcp", "run_agent", params);
        let StepOutcome::Terminal(result) = outcome else { panic!("expected instructions, got {outcome:?}") };
        assert!(result.message.contains("gcloud run deploy agent-7"));
        assert!(!state.is_waiting());
    }

    #[test]
    fn missing_resource_group_gets_a_hint() {
        let mut data = CloudAgentData {
            provider: Some(CloudProvider::Azure),
            action: Some(CloudAction::RunAgent),
            ..CloudAgentData::default()
        };
        data.params.region = Some("westeurope".into());
        complete_execute(&mut data, &ActionResult::failure("(ResourceGroupNotFound) Resource group 'skitz-agents' could not be found."));
        let error = data.outcome.error().unwrap();
        assert!(error.contains("az group create --name skitz-agents --location westeurope"));
    }

    #[test]
    fn invalid_region_choice_is_rejected() {
        let (_, state, outcome) = run_to_execute("aws", "execute_task", FormValues::new().with_text("region", "mars-1").with_text("task", "ls"));
        let StepOutcome::RenderInput(request) = outcome else { panic!("expected validation error") };
        assert!(request.errors.get("region").is_some());
        assert_eq!(state.step_index(), 2);
    }
}
