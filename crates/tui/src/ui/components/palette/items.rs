//! Palette entries and search filtering.

use skitz_types::{McpTool, WizardKind};

/// Actions that run immediately without a wizard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectAction {
    ReloadTools,
    ClearHistory,
    CreateScript,
}

impl DirectAction {
    pub const ALL: [DirectAction; 3] = [DirectAction::ReloadTools, DirectAction::ClearHistory, DirectAction::CreateScript];

    fn item(self) -> PaletteItem {
        let (id, icon, title, subtitle) = match self {
            DirectAction::ReloadTools => ("reload-tools", "🔄", "Reload MCP Tools", "Ask configured MCP servers for their tools"),
            DirectAction::ClearHistory => ("clear-history", "🧹", "Clear History", "Forget recent commands"),
            DirectAction::CreateScript => ("create-script", "📝", "Create Script", "Generate a script from a resource"),
        };
        PaletteItem {
            id: id.to_string(),
            icon: icon.to_string(),
            title: title.to_string(),
            subtitle: subtitle.to_string(),
            category: "actions".to_string(),
            action: PaletteAction::Direct(self),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PaletteAction {
    StartWizard(WizardKind),
    McpTool(McpTool),
    Direct(DirectAction),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PaletteItem {
    pub id: String,
    pub icon: String,
    pub title: String,
    /// Full text; the list view truncates it.
    pub subtitle: String,
    pub category: String,
    pub action: PaletteAction,
}

impl PaletteItem {
    pub fn wizard(kind: WizardKind) -> Self {
        Self {
            id: kind.id().to_string(),
            icon: kind.icon().to_string(),
            title: kind.title().to_string(),
            subtitle: kind.subtitle().to_string(),
            category: kind.category().to_string(),
            action: PaletteAction::StartWizard(kind),
        }
    }

    pub fn tool(tool: &McpTool) -> Self {
        let subtitle = if tool.description.is_empty() {
            format!("MCP tool on {}", tool.server)
        } else {
            tool.description.clone()
        };
        Self {
            id: tool.palette_id(),
            icon: "🔧".to_string(),
            title: tool.name.clone(),
            subtitle,
            category: format!("mcp:{}", tool.server),
            action: PaletteAction::McpTool(tool.clone()),
        }
    }

    fn matches(&self, needle: &str) -> bool {
        [&self.title, &self.subtitle, &self.category]
            .into_iter()
            .any(|text| text.to_lowercase().contains(needle))
    }
}

/// Every palette entry: wizards in registry order, discovered tools, then direct actions.
pub fn build_items(wizards: impl IntoIterator<Item = WizardKind>, tools: &[McpTool]) -> Vec<PaletteItem> {
    wizards
        .into_iter()
        .map(PaletteItem::wizard)
        .chain(tools.iter().map(PaletteItem::tool))
        .chain(DirectAction::ALL.into_iter().map(DirectAction::item))
        .collect()
}

/// Indices of the items matching `query`, in list order.
///
/// Case-insensitive substring match over title, subtitle and category; a blank
/// query matches everything.
pub fn filter_items(items: &[PaletteItem], query: &str) -> Vec<usize> {
    let needle = query.trim().to_lowercase();
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| needle.is_empty() || item.matches(&needle))
        .map(|(index, _)| index)
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn two_wizards() -> Vec<PaletteItem> {
        build_items([WizardKind::Deploy, WizardKind::CodeReview], &[])
            .into_iter()
            .filter(|item| matches!(item.action, PaletteAction::StartWizard(_)))
            .collect()
    }

    #[test]
    fn query_matches_title_case_insensitively() {
        let items = two_wizards();
        let titles: Vec<&str> = filter_items(&items, "dep").iter().map(|&index| items[index].title.as_str()).collect();
        assert_eq!(titles, vec!["Deploy Agent"]);
        assert_eq!(filter_items(&items, "REVIEW"), vec![1]);
    }

    #[test]
    fn blank_query_keeps_every_item_in_order() {
        let items = build_items(WizardKind::ALL, &[]);
        assert_eq!(filter_items(&items, "  "), (0..items.len()).collect::<Vec<_>>());
    }

    #[test]
    fn subtitle_and_category_are_searched() {
        let items = build_items(WizardKind::ALL, &[]);
        let by_subtitle = filter_items(&items, "business impact");
        assert_eq!(by_subtitle.len(), 1);
        assert_eq!(items[by_subtitle[0]].action, PaletteAction::StartWizard(WizardKind::CodeReview));

        let settings: Vec<&str> = filter_items(&items, "settings").iter().map(|&index| items[index].id.as_str()).collect();
        assert_eq!(settings, vec!["configure-provider", "preferences"]);
    }

    #[test]
    fn tools_are_listed_between_wizards_and_actions() {
        let tool = McpTool {
            server: "docs".into(),
            server_url: "http://localhost:9000/mcp".into(),
            name: "search".into(),
            description: String::new(),
            input_schema: json!({}),
        };
        let items = build_items([WizardKind::Research], &[tool]);
        assert_eq!(items[1].id, "mcp:docs:search");
        assert_eq!(items[1].subtitle, "MCP tool on docs");
        assert!(matches!(items.last().map(|item| &item.action), Some(PaletteAction::Direct(DirectAction::CreateScript))));
        assert_eq!(filter_items(&items, "mcp:docs"), vec![1]);
    }

    #[test]
    fn long_tool_descriptions_are_searched_in_full() {
        let description = format!("{} Supports fuzzy lookups across archived pages.", "Searches the team documentation index. ".repeat(3));
        let tool = McpTool {
            server: "docs".into(),
            server_url: "http://localhost:9000/mcp".into(),
            name: "search".into(),
            description: description.clone(),
            input_schema: json!({}),
        };
        let items = build_items([WizardKind::Research], &[tool]);
        assert_eq!(items[1].subtitle, description);
        assert_eq!(filter_items(&items, "archived pages"), vec![1]);
    }
}
