//! Built-in wizard step tables.
//!
//! Each module owns one typed data struct and a `table()` constructor. Steps
//! only ever read fields written by earlier steps.

pub mod add_resource;
pub mod cloud_agent;
pub mod code_review;
pub mod configure_provider;
pub mod delete_resource;
pub mod deploy;
pub mod preferences;
pub mod research;
pub mod run_command;

pub use add_resource::AddResourceData;
pub use cloud_agent::CloudAgentData;
pub use code_review::CodeReviewData;
pub use configure_provider::ConfigureProviderData;
pub use delete_resource::DeleteResourceData;
pub use deploy::DeployData;
pub use preferences::PreferencesData;
pub use research::ResearchData;
pub use run_command::RunCommandData;

use skitz_types::{ActionDescriptor, ActionResult, FieldChoice};

use crate::gateway::PROGRAM_NOT_FOUND;
use crate::wizard::AsyncResource;

pub(crate) fn process(program: &str, args: &[&str]) -> ActionDescriptor {
    ActionDescriptor::Process {
        program: program.to_string(),
        args: args.iter().map(|arg| arg.to_string()).collect(),
        env: Vec::new(),
    }
}

/// Error text for a failed CLI call; a missing binary maps to `install_hint`.
pub(crate) fn cli_failure(result: &ActionResult, install_hint: &str) -> String {
    let message = result.message().trim();
    if message.contains(PROGRAM_NOT_FOUND) {
        install_hint.to_string()
    } else if message.is_empty() {
        "Command failed without output".to_string()
    } else {
        message.to_string()
    }
}

/// Choices and notice line for a select backed by a loaded list.
///
/// While the list is loading a disabled placeholder stands in for the options;
/// after a failure the cached error becomes the notice and the placeholder
/// says the options are unavailable.
pub(crate) fn loaded_choices<T>(
    resource: &AsyncResource<Vec<T>>,
    noun: &str,
    to_choice: impl Fn(&T) -> FieldChoice,
) -> (Vec<FieldChoice>, Option<String>) {
    match resource {
        AsyncResource::Loaded(items) => (items.iter().map(to_choice).collect(), None),
        AsyncResource::Failed(error) => (vec![FieldChoice::placeholder(format!("Unable to load {noun}"))], Some(error.clone())),
        AsyncResource::NotAttempted | AsyncResource::Loading => (
            vec![FieldChoice::placeholder(format!("Loading {noun}..."))],
            Some(format!("Loading {noun}...")),
        ),
    }
}
