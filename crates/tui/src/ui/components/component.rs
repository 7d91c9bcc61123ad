//! Component trait shared by the dashboard panels and overlays.
//!
//! Components render from [`App`] state. Input handling lives in
//! [`App::handle_key`], which returns effects for the runtime; a component
//! that needs to react to keys does so through the state it renders.

use ratatui::{Frame, layout::Rect};

use crate::app::App;
use crate::ui::theme::Theme;

pub trait Component {
    /// Draw the component into `rect`.
    fn render(&mut self, frame: &mut Frame, rect: Rect, app: &App, theme: &dyn Theme);
}
