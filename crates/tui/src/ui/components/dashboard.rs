//! Main view: resources on the left, favorites and recent commands on the right.

use chrono::{DateTime, Utc};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, List, ListItem, Paragraph},
};

use crate::app::{App, DashboardFocus};
use crate::ui::components::component::Component;
use crate::ui::theme::Theme;

#[derive(Debug, Default)]
pub struct DashboardComponent;

impl Component for DashboardComponent {
    fn render(&mut self, frame: &mut Frame, rect: Rect, app: &App, theme: &dyn Theme) {
        frame.render_widget(Block::default().style(theme.background_style()), rect);
        let [header, body, footer] =
            Layout::vertical([Constraint::Length(1), Constraint::Min(3), Constraint::Length(1)]).areas(rect);

        let provider = app
            .config
            .active_provider()
            .map(|provider| format!("AI: {}", provider.name))
            .unwrap_or_else(|| "AI: not configured".to_string());
        let tools = format!("MCP tools: {}", app.tools().len());
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(" skitz ", theme.accent_emphasis_style().add_modifier(Modifier::BOLD)),
                Span::styled(format!(" {provider}  {tools}"), theme.text_secondary_style()),
            ])),
            header,
        );

        let [left, right] = Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(body);
        let favorites_height = (app.config.favorites.len().clamp(1, 6) + 2) as u16;
        let [favorites, recent] = Layout::vertical([Constraint::Length(favorites_height), Constraint::Min(3)]).areas(right);
        self.render_resources(frame, left, app, theme);
        self.render_favorites(frame, favorites, app, theme);
        self.render_history(frame, recent, app, theme);

        frame.render_widget(
            Paragraph::new(Span::styled(
                " Ctrl+P or : palette  Tab switch list  ↑↓ move  q quit",
                theme.text_muted_style(),
            )),
            footer,
        );
    }
}

impl DashboardComponent {
    fn render_resources(&self, frame: &mut Frame, area: Rect, app: &App, theme: &dyn Theme) {
        let focused = app.focus == DashboardFocus::Resources;
        let block = panel(" Resources ", focused, theme);

        if app.resources.is_empty() {
            let text = format!(
                "No resources in {}. Use \"Add Resource\" from the palette.",
                app.ctx.resources_dir.display()
            );
            frame.render_widget(Paragraph::new(Span::styled(text, theme.text_muted_style())).block(block), area);
            return;
        }

        let items: Vec<ListItem> = app
            .resources
            .iter()
            .map(|resource| {
                let mut spans = vec![Span::styled(resource.title.clone(), theme.text_primary_style())];
                if !resource.commands.is_empty() {
                    spans.push(Span::styled(format!("  ▶ {}", resource.commands.len()), theme.accent_secondary_style()));
                }
                if let Some(summary) = &resource.summary {
                    spans.push(Span::styled(format!("  {summary}"), theme.text_muted_style()));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();
        let mut state = app.resource_list.clone();
        let list = List::new(items).block(block).highlight_style(if focused {
            theme.selection_style()
        } else {
            theme.text_secondary_style()
        });
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_favorites(&self, frame: &mut Frame, area: Rect, app: &App, theme: &dyn Theme) {
        let block = panel(" Favorites ", false, theme);
        if app.config.favorites.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled("Star a command with \"Run Command\".", theme.text_muted_style())).block(block),
                area,
            );
            return;
        }
        let items: Vec<ListItem> = app
            .config
            .favorites
            .iter()
            .map(|command| {
                ListItem::new(Line::from(vec![
                    Span::styled("⭐ ", theme.status_warning()),
                    Span::styled(command.clone(), theme.text_primary_style()),
                ]))
            })
            .collect();
        frame.render_widget(List::new(items).block(block), area);
    }

    fn render_history(&self, frame: &mut Frame, area: Rect, app: &App, theme: &dyn Theme) {
        let focused = app.focus == DashboardFocus::History;
        let block = panel(" Recent ", focused, theme);

        if !app.config.history.enabled {
            frame.render_widget(
                Paragraph::new(Span::styled("History is disabled in preferences.", theme.text_muted_style())).block(block),
                area,
            );
            return;
        }
        if app.recent.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled("Nothing run yet.", theme.text_muted_style())).block(block),
                area,
            );
            return;
        }

        let items: Vec<ListItem> = app
            .recent
            .iter()
            .map(|entry| {
                let (icon, style) = if entry.success {
                    ("✓", theme.status_success())
                } else {
                    ("✗", theme.status_error())
                };
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{icon} "), style),
                    Span::styled(entry.command.clone(), theme.text_primary_style()),
                    Span::styled(
                        format!("  {} {}", entry.tool, age(entry.timestamp, Utc::now())),
                        theme.text_muted_style(),
                    ),
                ]))
            })
            .collect();
        let mut state = app.history_list.clone();
        let list = List::new(items).block(block).highlight_style(if focused {
            theme.selection_style()
        } else {
            theme.text_secondary_style()
        });
        frame.render_stateful_widget(list, area, &mut state);
    }
}

fn panel<'a>(title: &'a str, focused: bool, theme: &dyn Theme) -> Block<'a> {
    Block::default()
        .title(Span::styled(title, theme.text_secondary_style()))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme.border_style(focused))
}

/// Short relative age, e.g. `just now`, `5m ago`, `3h ago`, `2d ago`.
fn age(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(timestamp);
    match elapsed.num_seconds() {
        ..60 => "just now".to_string(),
        60..3600 => format!("{}m ago", elapsed.num_minutes()),
        3600..86400 => format!("{}h ago", elapsed.num_hours()),
        _ => format!("{}d ago", elapsed.num_days()),
    }
}
