pub mod items;
pub mod state;
pub mod view;

pub use items::build_items;
pub use state::{PaletteContext, PaletteMode, PaletteState};
pub use view::PaletteComponent;
