use skitz_types::{ActionDescriptor, ActionResult, FieldChoice, FieldErrors, FieldSpec, FieldValue, FormValues, InputRequest, WizardKind};

use crate::context::StepContext;
use crate::wizard::{AsyncResource, AsyncStep, RegistryError, StepPlan, StepSpec, StepTable, TerminalResult};

const TITLE: &str = "Deep Research";

const RESEARCH_SYSTEM_PROMPT: &str = "You are a research assistant. Produce a well structured markdown report with a short summary, \
key findings as bullet points, and a list of open questions. Be factual and say when you are unsure.";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResearchDepth {
    Quick,
    #[default]
    Standard,
    Deep,
}

impl ResearchDepth {
    const ALL: [ResearchDepth; 3] = [ResearchDepth::Quick, ResearchDepth::Standard, ResearchDepth::Deep];

    fn id(self) -> &'static str {
        match self {
            ResearchDepth::Quick => "quick",
            ResearchDepth::Standard => "standard",
            ResearchDepth::Deep => "deep",
        }
    }

    fn label(self) -> &'static str {
        match self {
            ResearchDepth::Quick => "Quick - A few paragraphs",
            ResearchDepth::Standard => "Standard - A structured overview",
            ResearchDepth::Deep => "Deep - A detailed report",
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            ResearchDepth::Quick => "Keep it brief: at most three short paragraphs.",
            ResearchDepth::Standard => "Cover the main aspects in a structured overview.",
            ResearchDepth::Deep => "Go into depth: background, trade-offs, examples and references to follow up on.",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResearchData {
    pub topic: Option<String>,
    pub depth: ResearchDepth,
    pub report: AsyncResource<String>,
}

pub fn table() -> Result<StepTable<ResearchData>, RegistryError> {
    StepTable::new(
        WizardKind::Research,
        vec![
            StepSpec::input("topic", plan_topic, submit_topic),
            StepSpec::input("depth", plan_depth, submit_depth),
            StepSpec::action("research", plan_research, complete_research),
        ],
    )
}

fn plan_topic(_data: &mut ResearchData, _ctx: &StepContext<'_>) -> StepPlan {
    StepPlan::Input(InputRequest::new(
        "topic",
        "Research Topic",
        vec![
            FieldSpec::long_text("topic", "Topic")
                .required()
                .placeholder("What would you like to research?"),
        ],
    ))
}

fn submit_topic(data: &mut ResearchData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    data.topic = values.text("topic").map(str::to_string);
    Ok(())
}

fn plan_depth(_data: &mut ResearchData, _ctx: &StepContext<'_>) -> StepPlan {
    let options = ResearchDepth::ALL.iter().map(|depth| FieldChoice::new(depth.label(), depth.id())).collect();
    StepPlan::Input(InputRequest::new(
        "depth",
        "Research Depth",
        vec![
            FieldSpec::select("depth", "Depth", options)
                .required()
                .default_value(FieldValue::Text(ResearchDepth::Standard.id().into())),
        ],
    ))
}

fn submit_depth(data: &mut ResearchData, values: &FormValues, _ctx: &StepContext<'_>) -> Result<(), FieldErrors> {
    let selected = values.text("depth").unwrap_or_default();
    data.depth = ResearchDepth::ALL
        .into_iter()
        .find(|depth| depth.id() == selected)
        .ok_or_else(|| FieldErrors::single("depth", "select one of the available options"))?;
    Ok(())
}

fn plan_research(data: &mut ResearchData, ctx: &StepContext<'_>) -> StepPlan {
    if let Some(report) = data.report.loaded() {
        return StepPlan::Terminal(TerminalResult::success(TITLE, report.clone()));
    }
    if let Some(error) = data.report.error() {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, format!("Research failed: {error}")));
    }
    let Some(topic) = data.topic.clone() else {
        return StepPlan::Terminal(TerminalResult::failure(TITLE, "No topic provided"));
    };
    let Some(provider) = ctx.config.active_provider() else {
        return StepPlan::Terminal(TerminalResult::failure(
            TITLE,
            "No AI provider configured. Add one with the AI Providers wizard.",
        ));
    };

    data.report.begin();
    StepPlan::Async(AsyncStep::execute(
        ActionDescriptor::AiCompletion {
            provider: provider.clone(),
            system: format!("{RESEARCH_SYSTEM_PROMPT} {}", data.depth.instruction()),
            prompt: topic,
            expect_json: false,
        },
        format!("Researching with {}...", provider.name),
    ))
}

fn complete_research(data: &mut ResearchData, result: &ActionResult) {
    let outcome = if result.success {
        Ok(result.output.clone())
    } else {
        Err(result.message().to_string())
    };
    data.report.finish(outcome);
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use skitz_types::{AiProviderConfig, AiProviderType, AppConfig};

    use super::*;
    use crate::wizard::{StepDriver, StepOutcome, WizardRegistry};

    #[test]
    fn research_uses_active_provider_and_depth() {
        let mut config = AppConfig::default();
        config.ai.providers.push(AiProviderConfig {
            name: "claude".into(),
            provider_type: AiProviderType::Anthropic,
            api_key: Some("sk-ant-test".into()),
            enabled: true,
            ..AiProviderConfig::default()
        });
        let ctx = StepContext::new(&config, &[], Path::new("/tmp"));
        let driver = StepDriver::new(Arc::new(WizardRegistry::with_builtin().unwrap()));
        let (mut state, _) = driver.start(WizardKind::Research, &ctx);

        driver.submit(&mut state, &FormValues::new().with_text("topic", "Rust async runtimes"), &ctx);
        let outcome = driver.submit(&mut state, &FormValues::new().with_text("depth", "quick"), &ctx);
        let StepOutcome::RunAsync(action) = outcome else { panic!("expected AI call") };
        let ActionDescriptor::AiCompletion { provider, system, prompt, .. } = &action.descriptor else {
            panic!("expected completion");
        };
        assert_eq!(provider.name, "claude");
        assert_eq!(prompt, "Rust async runtimes");
        assert!(system.contains("three short paragraphs"));

        let outcome = driver.complete(&mut state, action.request_id, &ActionResult::ok("## Summary"), &ctx).unwrap();
        assert_eq!(outcome, StepOutcome::Terminal(TerminalResult::success(TITLE, "## Summary")));
    }

    #[test]
    fn missing_provider_fails_without_dispatch() {
        let config = AppConfig::default();
        let ctx = StepContext::new(&config, &[], Path::new("/tmp"));
        let mut data = ResearchData {
            topic: Some("anything".into()),
            ..ResearchData::default()
        };
        let StepPlan::Terminal(result) = plan_research(&mut data, &ctx) else { panic!("expected failure") };
        assert!(!result.success);
        assert!(!data.report.is_attempted());
    }
}
