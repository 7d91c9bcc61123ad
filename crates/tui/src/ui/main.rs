//! Top-level frame layout.

use ratatui::Frame;

use crate::app::App;
use crate::ui::components::{Component, DashboardComponent, NotificationsComponent, PaletteComponent};
use crate::ui::theme::Theme;

/// Views drawn every frame, back to front.
#[derive(Debug, Default)]
pub struct MainView {
    dashboard: DashboardComponent,
    palette: PaletteComponent,
    notifications: NotificationsComponent,
}

impl MainView {
    /// Dashboard, then the palette overlay when open, then notification toasts.
    pub fn draw(&mut self, frame: &mut Frame, app: &App, theme: &dyn Theme) {
        let area = frame.area();
        self.dashboard.render(frame, area, app, theme);
        if app.palette.is_open() {
            self.palette.render(frame, area, app, theme);
        }
        if !app.notifications.is_empty() {
            self.notifications.render(frame, area, app, theme);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ratatui::{Terminal, backend::TestBackend};
    use skitz_engine::WizardRegistry;
    use skitz_types::{AppConfig, Notification};
    use skitz_util::{ConfigStore, InMemoryHistoryStore};

    use super::*;
    use crate::app::SharedCtx;
    use crate::ui::theme::DraculaTheme;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn palette_overlay_and_toasts_are_drawn_over_the_dashboard() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("setup.md"), "# Setup guide\nInstall things.\n").unwrap();
        let ctx = SharedCtx {
            config_store: Arc::new(ConfigStore::ephemeral(AppConfig::default())),
            history: Arc::new(InMemoryHistoryStore::new(10)),
            resources_dir: dir.path().to_path_buf(),
        };
        let mut app = App::new(ctx, Arc::new(WizardRegistry::with_builtin().unwrap()));
        let theme = DraculaTheme::new();
        let mut view = MainView::default();
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();

        terminal.draw(|frame| view.draw(frame, &app, &theme)).unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("Setup guide"));
        assert!(!text.contains("Command Palette"));

        app.open_palette();
        app.notify(Notification::success("Saved"));
        terminal.draw(|frame| view.draw(frame, &app, &theme)).unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("Command Palette"));
        assert!(text.contains("Deploy Agent"));
        assert!(text.contains("Saved"));
    }

    #[test]
    fn dashboard_lists_favorites_and_runnable_command_counts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("git.md"),
            "# Git\n`git status` Show status ^run\n`git pull` Update ^run\n",
        )
        .unwrap();
        let config = AppConfig {
            favorites: vec!["git status".into()],
            ..AppConfig::default()
        };
        let ctx = SharedCtx {
            config_store: Arc::new(ConfigStore::ephemeral(config)),
            history: Arc::new(InMemoryHistoryStore::new(10)),
            resources_dir: dir.path().to_path_buf(),
        };
        let app = App::new(ctx, Arc::new(WizardRegistry::with_builtin().unwrap()));
        let theme = DraculaTheme::new();
        let mut view = MainView::default();
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();

        terminal.draw(|frame| view.draw(frame, &app, &theme)).unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("Favorites"));
        assert!(text.contains("git status"));
        assert!(text.contains("▶ 2"));
    }
}
