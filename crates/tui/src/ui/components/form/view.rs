//! Renders a step form inside the palette.

use ratatui::{
    Frame,
    layout::{Position, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use skitz_types::FieldKind;

use super::state::{FieldState, FormState};
use crate::ui::theme::Theme;

const INDENT: &str = "  ";

/// Draw `form` into `area`, placing the terminal cursor in the focused text field.
pub fn render_form(frame: &mut Frame, area: Rect, form: &FormState, theme: &dyn Theme) {
    let request = form.request();
    let mut lines: Vec<Line> = Vec::new();
    let mut focus_row = 0usize;
    let mut cursor: Option<(usize, usize)> = None;

    lines.push(Line::from(Span::styled(
        request.title.clone(),
        theme.accent_emphasis_style().add_modifier(Modifier::BOLD),
    )));
    if let Some(notice) = &request.notice {
        for text in notice.lines() {
            lines.push(Line::from(Span::styled(text.to_string(), theme.status_warning())));
        }
    }
    lines.push(Line::default());

    for (index, spec) in request.fields.iter().enumerate() {
        let focused = index == form.focus();
        if focused {
            focus_row = lines.len();
        }

        let marker = if focused { "› " } else { INDENT };
        let label_style = if focused {
            theme.text_primary_style().add_modifier(Modifier::BOLD)
        } else {
            theme.text_secondary_style()
        };
        let mut label = vec![Span::styled(format!("{marker}{}", spec.label), label_style)];
        if spec.required {
            label.push(Span::styled(" *", theme.status_error()));
        }
        if let Some(description) = &spec.description {
            label.push(Span::styled(format!("  {description}"), theme.text_muted_style()));
        }
        lines.push(Line::from(label));

        match form.field_state(index) {
            Some(FieldState::Text(input)) => {
                if input.input().is_empty() {
                    let placeholder = spec.placeholder.clone().unwrap_or_default();
                    lines.push(Line::from(Span::styled(format!("{INDENT}{placeholder}"), theme.text_muted_style())));
                    if focused {
                        cursor = Some((lines.len() - 1, 0));
                    }
                } else {
                    let first = lines.len();
                    for text in input.input().split('\n') {
                        lines.push(Line::from(Span::styled(format!("{INDENT}{text}"), theme.text_primary_style())));
                    }
                    if focused {
                        let (line, col) = input.cursor_position();
                        cursor = Some((first + line, col));
                    }
                }
            }
            Some(FieldState::Select { cursor: selected }) => {
                for (choice_index, choice) in spec.choices.iter().enumerate() {
                    let mark = if choice_index == *selected { "(•)" } else { "( )" };
                    let style = choice_style(theme, focused && choice_index == *selected, choice.enabled);
                    lines.push(choice_line(mark, &choice.label, choice.hint.as_deref(), style, theme));
                }
            }
            Some(FieldState::MultiSelect { cursor: at, selected }) => {
                for (choice_index, choice) in spec.choices.iter().enumerate() {
                    let mark = if selected.get(choice_index).copied().unwrap_or(false) { "[x]" } else { "[ ]" };
                    let style = choice_style(theme, focused && choice_index == *at, choice.enabled);
                    lines.push(choice_line(mark, &choice.label, choice.hint.as_deref(), style, theme));
                }
            }
            Some(FieldState::Confirm(value)) => {
                let (yes, no) = if *value {
                    (theme.selection_style(), theme.text_muted_style())
                } else {
                    (theme.text_muted_style(), theme.selection_style())
                };
                lines.push(Line::from(vec![
                    Span::raw(INDENT),
                    Span::styled(" Yes ", yes),
                    Span::raw(" "),
                    Span::styled(" No ", no),
                ]));
            }
            None => {}
        }

        if let Some(error) = request.errors.get(&spec.id) {
            lines.push(Line::from(Span::styled(format!("{INDENT}✗ {error}"), theme.status_error())));
        }
        lines.push(Line::default());
    }

    for (field, error) in request.errors.iter() {
        if request.field(field).is_none() {
            lines.push(Line::from(Span::styled(format!("✗ {error}"), theme.status_error())));
        }
    }

    if request.fields.iter().any(|spec| spec.kind == FieldKind::LongText) {
        lines.push(Line::from(Span::styled(
            "Enter: new line  Ctrl+S: submit",
            theme.text_muted_style(),
        )));
    }

    let height = usize::from(area.height);
    let scroll = if height > 0 && focus_row + 3 > height { focus_row + 3 - height } else { 0 };
    frame.render_widget(Paragraph::new(lines).scroll((scroll as u16, 0)), area);

    if let Some((row, col)) = cursor
        && row >= scroll
        && row - scroll < height
    {
        let x = area.x.saturating_add((INDENT.len() + col) as u16);
        let y = area.y.saturating_add((row - scroll) as u16);
        if x < area.right() {
            frame.set_cursor_position(Position::new(x, y));
        }
    }
}

fn choice_style(theme: &dyn Theme, highlighted: bool, enabled: bool) -> Style {
    match (highlighted, enabled) {
        (_, false) => theme.text_muted_style().add_modifier(Modifier::ITALIC),
        (true, true) => theme.selection_style(),
        (false, true) => theme.text_primary_style(),
    }
}

fn choice_line<'a>(mark: &str, label: &str, hint: Option<&str>, style: Style, theme: &dyn Theme) -> Line<'a> {
    let mut spans = vec![Span::raw(INDENT), Span::styled(format!("{mark} {label}"), style)];
    if let Some(hint) = hint {
        spans.push(Span::styled(format!("  {hint}"), theme.text_muted_style()));
    }
    Line::from(spans)
}
