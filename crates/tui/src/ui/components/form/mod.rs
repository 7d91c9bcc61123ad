//! Step forms: editable state for an [`skitz_types::InputRequest`] and its view.

pub mod state;
pub mod view;

pub use state::{FormEvent, FormState};
pub use view::render_form;
