//! Command palette overlay.

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

use skitz_util::{SUBTITLE_DISPLAY_WIDTH, truncate_display};

use super::state::{PaletteMode, PaletteState};
use crate::app::App;
use crate::ui::components::component::Component;
use crate::ui::components::form::render_form;
use crate::ui::theme::Theme;
use crate::ui::utils::centered_rect;

static FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Debug, Default)]
pub struct PaletteComponent {
    list_state: ListState,
}

impl Component for PaletteComponent {
    fn render(&mut self, frame: &mut Frame, rect: Rect, app: &App, theme: &dyn Theme) {
        let palette = &app.palette;
        if !palette.is_open() {
            return;
        }

        let area = centered_rect(70, 70, rect);
        frame.render_widget(Clear, area);
        let block = Block::default()
            .title(Span::styled(title(palette), theme.accent_emphasis_style()))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme.border_style(true))
            .style(theme.modal_background_style());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [body, footer] = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(inner);
        let spinner = FRAMES[app.throbber_idx % FRAMES.len()];

        match palette.mode() {
            PaletteMode::Idle => {}
            PaletteMode::Searching => self.render_search(frame, body, palette, theme),
            PaletteMode::CollectingParams => render_collecting(frame, body, palette, spinner, theme),
            PaletteMode::AwaitingFreeformAiInput => render_ai_task(frame, body, palette, theme),
            PaletteMode::Executing => {
                let text = palette.loading_text().unwrap_or("Working...");
                let line = Line::from(vec![
                    Span::styled(format!("{spinner} "), theme.accent_secondary_style()),
                    Span::styled(text.to_string(), theme.text_primary_style()),
                ]);
                frame.render_widget(Paragraph::new(line), body);
            }
            PaletteMode::ShowingResult => render_result(frame, body, palette, theme),
        }

        frame.render_widget(
            Paragraph::new(Span::styled(hint_text(palette.mode()), theme.text_muted_style())),
            footer,
        );
    }
}

impl PaletteComponent {
    fn render_search(&mut self, frame: &mut Frame, area: Rect, palette: &PaletteState, theme: &dyn Theme) {
        let [input, list] = Layout::vertical([Constraint::Length(2), Constraint::Min(1)]).areas(area);

        let query = palette.query();
        let line = if query.input().is_empty() {
            Line::from(vec![
                Span::styled("› ", theme.accent_emphasis_style()),
                Span::styled("Search wizards, tools and actions", theme.text_muted_style()),
            ])
        } else {
            Line::from(vec![
                Span::styled("› ", theme.accent_emphasis_style()),
                Span::styled(query.input().to_string(), theme.text_primary_style()),
            ])
        };
        frame.render_widget(Paragraph::new(line), input);
        let (_, col) = query.cursor_position();
        frame.set_cursor_position(Position::new(input.x.saturating_add(2 + col as u16), input.y));

        let items: Vec<ListItem> = palette
            .visible_items()
            .map(|item| {
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{} ", item.icon)),
                    Span::styled(item.title.clone(), theme.text_primary_style().add_modifier(Modifier::BOLD)),
                    Span::styled(
                        format!("  {}", truncate_display(&item.subtitle, SUBTITLE_DISPLAY_WIDTH)),
                        theme.text_secondary_style(),
                    ),
                    Span::styled(format!("  [{}]", item.category), theme.text_muted_style()),
                ]))
            })
            .collect();
        if items.is_empty() {
            frame.render_widget(Paragraph::new(Span::styled("No matches", theme.text_muted_style())), list);
            return;
        }

        self.list_state.select(Some(palette.cursor()));
        let widget = List::new(items).highlight_style(theme.selection_style()).highlight_symbol("▸ ");
        frame.render_stateful_widget(widget, list, &mut self.list_state);
    }
}

fn render_collecting(frame: &mut Frame, area: Rect, palette: &PaletteState, spinner: &str, theme: &dyn Theme) {
    let form_area = match palette.loading_text() {
        Some(text) => {
            let [status, rest] = Layout::vertical([Constraint::Length(1), Constraint::Min(1)]).areas(area);
            let line = Line::from(vec![
                Span::styled(format!("{spinner} "), theme.accent_secondary_style()),
                Span::styled(text.to_string(), theme.text_secondary_style()),
            ]);
            frame.render_widget(Paragraph::new(line), status);
            rest
        }
        None => area,
    };
    if let Some(form) = palette.form() {
        render_form(frame, form_area, form, theme);
    }
}

fn render_ai_task(frame: &mut Frame, area: Rect, palette: &PaletteState, theme: &dyn Theme) {
    let tool = palette.pending_tool().map(|pending| pending.tool.name.as_str()).unwrap_or_default();
    let [title, input] = Layout::vertical([Constraint::Length(2), Constraint::Min(1)]).areas(area);
    frame.render_widget(
        Paragraph::new(Span::styled(
            format!("Describe what {tool} should do; AI will fill in the parameters."),
            theme.accent_emphasis_style(),
        )),
        title,
    );
    let task = palette.ai_task();
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("› ", theme.accent_emphasis_style()),
            Span::styled(task.input().to_string(), theme.text_primary_style()),
        ])),
        input,
    );
    let (_, col) = task.cursor_position();
    frame.set_cursor_position(Position::new(input.x.saturating_add(2 + col as u16), input.y));
}

fn render_result(frame: &mut Frame, area: Rect, palette: &PaletteState, theme: &dyn Theme) {
    let Some(result) = palette.result() else {
        return;
    };
    let (icon, style) = if result.success {
        ("✓", theme.status_success())
    } else {
        ("✗", theme.status_error())
    };
    let mut lines = vec![
        Line::from(Span::styled(format!("{icon} {}", result.title), style.add_modifier(Modifier::BOLD))),
        Line::default(),
    ];
    lines.extend(
        result
            .body
            .lines()
            .map(|text| Line::from(Span::styled(text.to_string(), theme.text_primary_style()))),
    );
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

/// Wizard name and current step while a wizard runs.
fn title(palette: &PaletteState) -> String {
    let Some(wizard) = palette.active_wizard() else {
        return " Command Palette ".to_string();
    };
    match palette.form() {
        Some(form) => format!(" {} › {} ", wizard.kind().title(), form.step()),
        None => format!(" {} ", wizard.kind().title()),
    }
}

fn hint_text(mode: PaletteMode) -> &'static str {
    match mode {
        PaletteMode::Searching => "↑↓ select  Enter run  Ctrl+A fill tool with AI  Esc close",
        PaletteMode::CollectingParams => "Tab next field  Enter continue  Ctrl+S submit  Esc back",
        PaletteMode::AwaitingFreeformAiInput => "Enter ask AI  Esc back",
        PaletteMode::Executing => "Waiting for the action to finish",
        PaletteMode::ShowingResult => "Enter or Esc close",
        PaletteMode::Idle => "",
    }
}
