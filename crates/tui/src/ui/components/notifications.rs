//! Transient notifications shown in the corner of the dashboard.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};
use skitz_types::Notification;

use crate::app::App;
use crate::ui::components::component::Component;
use crate::ui::theme::Theme;

pub const NOTIFICATION_TTL: Duration = Duration::from_secs(3);
const MAX_VISIBLE: usize = 3;
const TOAST_TEXT_WIDTH: usize = 48;

#[derive(Debug, Default)]
pub struct Notifications {
    entries: VecDeque<(Notification, Instant)>,
}

impl Notifications {
    pub fn push(&mut self, notification: Notification, now: Instant) {
        self.entries.push_back((notification, now + NOTIFICATION_TTL));
        while self.entries.len() > MAX_VISIBLE {
            self.entries.pop_front();
        }
    }

    /// Drop expired notifications; returns whether anything changed.
    pub fn expire(&mut self, now: Instant) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(_, expires_at)| *expires_at > now);
        before != self.entries.len()
    }

    pub fn visible(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter().map(|(notification, _)| notification)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Toasts stacked in the top-right corner.
#[derive(Debug, Default)]
pub struct NotificationsComponent;

impl Component for NotificationsComponent {
    fn render(&mut self, frame: &mut Frame, rect: Rect, app: &App, theme: &dyn Theme) {
        let max_text_width = usize::from(rect.width.saturating_sub(6)).clamp(8, TOAST_TEXT_WIDTH);
        let mut y = rect.y.saturating_add(1);
        for notification in app.notifications.visible() {
            let text = format!("{} {}", notification.icon(), notification.text);
            let lines: Vec<Line> = textwrap::wrap(&text, max_text_width)
                .into_iter()
                .map(|line| Line::from(Span::styled(line.into_owned(), theme.status_style(notification.level))))
                .collect();
            let text_width = lines.iter().map(Line::width).max().unwrap_or(0);
            let width = (text_width as u16).saturating_add(4);
            let height = (lines.len() as u16).saturating_add(2);
            if y.saturating_add(height) > rect.bottom() {
                break;
            }
            let area = Rect::new(rect.right().saturating_sub(width + 1), y, width, height).intersection(rect);
            frame.render_widget(Clear, area);
            frame.render_widget(
                Paragraph::new(lines).block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_type(BorderType::Rounded)
                        .border_style(theme.status_style(notification.level))
                        .style(theme.modal_background_style()),
                ),
                area,
            );
            y = y.saturating_add(height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_expire_after_their_ttl() {
        let start = Instant::now();
        let mut notifications = Notifications::default();
        notifications.push(Notification::success("Saved"), start);
        notifications.push(Notification::info("Later"), start + Duration::from_secs(2));

        assert!(!notifications.expire(start + Duration::from_secs(1)));
        assert!(notifications.expire(start + NOTIFICATION_TTL));
        let texts: Vec<&str> = notifications.visible().map(|notification| notification.text.as_str()).collect();
        assert_eq!(texts, vec!["Later"]);
    }

    #[test]
    fn only_the_newest_few_are_kept() {
        let now = Instant::now();
        let mut notifications = Notifications::default();
        for index in 0..5 {
            notifications.push(Notification::info(format!("n{index}")), now);
        }
        let texts: Vec<&str> = notifications.visible().map(|notification| notification.text.as_str()).collect();
        assert_eq!(texts, vec!["n2", "n3", "n4"]);
    }
}
