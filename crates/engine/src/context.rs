use std::path::Path;

use skitz_types::AppConfig;
use skitz_util::Resource;

/// Read-only view of application state handed to wizard steps.
///
/// Steps never mutate anything outside their own data; settings changes are
/// returned as `ConfigChange`s on the terminal result instead.
#[derive(Clone, Copy, Debug)]
pub struct StepContext<'a> {
    pub config: &'a AppConfig,
    pub resources: &'a [Resource],
    pub resources_dir: &'a Path,
}

impl<'a> StepContext<'a> {
    pub fn new(config: &'a AppConfig, resources: &'a [Resource], resources_dir: &'a Path) -> Self {
        Self {
            config,
            resources,
            resources_dir,
        }
    }
}
