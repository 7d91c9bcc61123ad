use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifies which step table governs a wizard run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WizardKind {
    Deploy,
    CodeReview,
    CloudAgent,
    RunCommand,
    AddResource,
    DeleteResource,
    ConfigureProvider,
    Preferences,
    Research,
}

impl WizardKind {
    pub const ALL: [WizardKind; 9] = [
        WizardKind::CodeReview,
        WizardKind::Deploy,
        WizardKind::CloudAgent,
        WizardKind::Research,
        WizardKind::RunCommand,
        WizardKind::AddResource,
        WizardKind::DeleteResource,
        WizardKind::ConfigureProvider,
        WizardKind::Preferences,
    ];

    /// Stable identifier used in palette item ids, history and the CLI.
    pub fn id(self) -> &'static str {
        match self {
            WizardKind::Deploy => "deploy",
            WizardKind::CodeReview => "code-review",
            WizardKind::CloudAgent => "cloud-agent",
            WizardKind::RunCommand => "run-command",
            WizardKind::AddResource => "add-resource",
            WizardKind::DeleteResource => "delete-resource",
            WizardKind::ConfigureProvider => "configure-provider",
            WizardKind::Preferences => "preferences",
            WizardKind::Research => "research",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            WizardKind::Deploy => "Deploy Agent",
            WizardKind::CodeReview => "BIA Code Review",
            WizardKind::CloudAgent => "Cloud Agent",
            WizardKind::RunCommand => "Run Command",
            WizardKind::AddResource => "Add Resource",
            WizardKind::DeleteResource => "Delete Resource",
            WizardKind::ConfigureProvider => "AI Providers",
            WizardKind::Preferences => "Preferences",
            WizardKind::Research => "Deep Research",
        }
    }

    pub fn subtitle(self) -> &'static str {
        match self {
            WizardKind::Deploy => "Deploy an AI agent to Azure",
            WizardKind::CodeReview => "Review code for business impact",
            WizardKind::CloudAgent => "Run and manage agents on Azure, AWS or GCP",
            WizardKind::RunCommand => "Run or favorite a ^run command from a resource",
            WizardKind::AddResource => "Create a new resource file",
            WizardKind::DeleteResource => "Remove a resource file",
            WizardKind::ConfigureProvider => "Add, edit or remove AI providers",
            WizardKind::Preferences => "History and MCP settings",
            WizardKind::Research => "Research a topic with the configured AI",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            WizardKind::Deploy => "🚀",
            WizardKind::CodeReview => "🔍",
            WizardKind::CloudAgent => "☁",
            WizardKind::RunCommand => "▶",
            WizardKind::AddResource => "➕",
            WizardKind::DeleteResource => "🗑",
            WizardKind::ConfigureProvider => "🤖",
            WizardKind::Preferences => "⚙",
            WizardKind::Research => "📚",
        }
    }

    pub fn category(self) -> &'static str {
        match self {
            WizardKind::Deploy | WizardKind::CloudAgent => "cloud",
            WizardKind::CodeReview | WizardKind::Research => "ai",
            WizardKind::RunCommand | WizardKind::AddResource | WizardKind::DeleteResource => "resources",
            WizardKind::ConfigureProvider | WizardKind::Preferences => "settings",
        }
    }
}

impl fmt::Display for WizardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for WizardKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WizardKind::ALL
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown wizard kind '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_from_str() {
        for kind in WizardKind::ALL {
            assert_eq!(kind.id().parse::<WizardKind>(), Ok(kind));
        }
        assert!("nope".parse::<WizardKind>().is_err());
    }

    #[test]
    fn serde_uses_kebab_case_ids() {
        let encoded = serde_json::to_string(&WizardKind::ConfigureProvider).unwrap();
        assert_eq!(encoded, "\"configure-provider\"");
    }
}
