//! Persistence and text helpers shared by the skitz crates.

pub mod config_store;
pub mod history_store;
pub mod path_processing;
pub mod resources;
pub mod text_processing;

pub use config_store::{CONFIG_PATH_ENV, ConfigError, ConfigStore, default_config_path};
pub use history_store::{HISTORY_PATH_ENV, HistoryEntry, HistoryStore, HistoryStoreError, InMemoryHistoryStore, JsonHistoryStore};
pub use path_processing::{app_config_dir, app_data_dir, default_resources_dir, expand_tilde};
pub use resources::{Resource, ResourceCommand, ResourceError, ResourceTemplate, list_resources, parse_commands, resource_path, slugify};
pub use text_processing::{RESULT_DISPLAY_WIDTH, SUBTITLE_DISPLAY_WIDTH, display_safe, first_line, redact_sensitive, truncate_display};
