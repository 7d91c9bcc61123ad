use std::env;
use std::path::PathBuf;

use dirs_next::{config_dir, data_dir, home_dir};

/// Application directory name under the platform config/data dirs.
pub const APP_DIR_NAME: &str = "skitz";

/// Environment variable overriding the resources directory.
pub const RESOURCES_DIR_ENV: &str = "SKITZ_RESOURCES_DIR";

pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    if trimmed == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = trimmed.strip_prefix("~/").or_else(|| trimmed.strip_prefix("~\\")) {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(trimmed)
}

/// Resolve a path from `env_var` when set and non-blank, otherwise `fallback`.
pub fn path_from_env_or(env_var: &str, fallback: impl FnOnce() -> PathBuf) -> PathBuf {
    match env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => expand_tilde(&value),
        _ => fallback(),
    }
}

/// `~/.config/skitz` on most platforms.
pub fn app_config_dir() -> PathBuf {
    config_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR_NAME)
}

/// `~/.local/share/skitz` on most platforms.
pub fn app_data_dir() -> PathBuf {
    data_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR_NAME)
}

pub fn default_resources_dir() -> PathBuf {
    path_from_env_or(RESOURCES_DIR_ENV, || app_config_dir().join("resources"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilde_expands_to_home() {
        let home = home_dir().unwrap_or_else(|| PathBuf::from("~"));
        assert_eq!(expand_tilde("~/notes"), home.join("notes"));
        assert_eq!(expand_tilde(" /tmp/x "), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn resources_dir_honors_env_override() {
        temp_env::with_var(RESOURCES_DIR_ENV, Some("/tmp/skitz-resources"), || {
            assert_eq!(default_resources_dir(), PathBuf::from("/tmp/skitz-resources"));
        });
        temp_env::with_var(RESOURCES_DIR_ENV, Some("  "), || {
            assert_eq!(default_resources_dir(), app_config_dir().join("resources"));
        });
    }
}
