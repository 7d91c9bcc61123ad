//! UI components: dashboard, command palette, step forms, notifications.

pub mod common;
pub mod component;
pub mod dashboard;
pub mod form;
pub mod notifications;
pub mod palette;

pub use component::Component;
pub use dashboard::DashboardComponent;
pub use notifications::NotificationsComponent;
pub use palette::PaletteComponent;
