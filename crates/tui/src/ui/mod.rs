//! Terminal UI: components, theme, layout helpers and the event loop.

pub mod components;
pub mod main;
pub mod runtime;
pub mod theme;
pub mod utils;
