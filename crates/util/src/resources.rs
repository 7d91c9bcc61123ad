//! Markdown resource files shown on the dashboard.
//!
//! A resource is any `*.md` file in the resources directory except the
//! `*-detail.md` companions. Its name is the file stem.
//!
//! Lines of the form `` `command` description ^run `` mark runnable commands.
//! With `^run:var` the command contains a `{{var}}` placeholder that is
//! filled in before it runs.

use std::fs;
use std::path::{Path, PathBuf};

use heck::ToKebabCase;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

const DETAIL_SUFFIX: &str = "-detail.md";

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("failed to read resources directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A resource file discovered on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub path: PathBuf,
    /// First `# ` heading, or the name when the file has none.
    pub title: String,
    /// First non-heading, non-blank line.
    pub summary: Option<String>,
    /// Commands annotated with `^run`, in file order.
    pub commands: Vec<ResourceCommand>,
}

/// A runnable command found in a resource file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceCommand {
    /// 1-based line number in the resource file.
    pub line: usize,
    /// Command text as written, placeholders included.
    pub command: String,
    pub description: String,
    /// Name of the `{{var}}` placeholder the user fills in.
    pub input_var: Option<String>,
}

impl ResourceCommand {
    /// The command with its placeholder replaced by `input`.
    pub fn render(&self, input: Option<&str>) -> String {
        match (&self.input_var, input) {
            (Some(var), Some(input)) => self.command.replace(&format!("{{{{{var}}}}}"), input),
            _ => self.command.clone(),
        }
    }
}

static RUN_ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`]+)`\s*([^^]*?)\s*\^run(?::(\w+))?").expect("run annotation pattern"));

/// Collect the `^run` commands in `content`.
pub fn parse_commands(content: &str) -> Vec<ResourceCommand> {
    content
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let captures = RUN_ANNOTATION.captures(line)?;
            Some(ResourceCommand {
                line: index + 1,
                command: captures[1].trim().to_string(),
                description: captures.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
                input_var: captures.get(3).map(|m| m.as_str().to_string()),
            })
        })
        .collect()
}

/// Starting content for a new resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceTemplate {
    Blank,
    Commands,
    Detailed,
}

impl ResourceTemplate {
    pub const ALL: [ResourceTemplate; 3] = [ResourceTemplate::Blank, ResourceTemplate::Commands, ResourceTemplate::Detailed];

    pub fn id(self) -> &'static str {
        match self {
            ResourceTemplate::Blank => "blank",
            ResourceTemplate::Commands => "commands",
            ResourceTemplate::Detailed => "detailed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResourceTemplate::Blank => "Blank - Empty resource file",
            ResourceTemplate::Commands => "Commands - Basic command structure",
            ResourceTemplate::Detailed => "Detailed - Full sections layout",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|template| template.id() == id)
    }

    pub fn render(self, name: &str) -> String {
        match self {
            ResourceTemplate::Blank => format!("# {name}\n\n"),
            ResourceTemplate::Commands => {
                format!("# {name}\n\n## Commands\n\n`example-command` Example description ^run\n")
            }
            ResourceTemplate::Detailed => format!(
                "# {name}\n\n## Overview\n\nAdd overview here.\n\n## Commands\n\n`example-command` Example description ^run\n\n## Configuration\n\nAdd configuration notes here.\n"
            ),
        }
    }
}

/// Turn a display name into a file stem: `"My Notes"` becomes `"my-notes"`.
pub fn slugify(name: &str) -> String {
    name.trim().to_kebab_case()
}

/// Path of the resource file for `slug` inside `dir`.
pub fn resource_path(dir: &Path, slug: &str) -> PathBuf {
    dir.join(format!("{slug}.md"))
}

/// List resources in `dir`, sorted by name. A missing directory yields an empty list.
pub fn list_resources(dir: &Path) -> Result<Vec<Resource>, ResourceError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %dir.display(), "Resources directory does not exist");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(ResourceError::ReadDir {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    let mut resources: Vec<Resource> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_resource_file(path))
        .filter_map(|path| {
            let name = path.file_stem()?.to_string_lossy().to_string();
            let content = fs::read_to_string(&path).unwrap_or_default();
            let (title, summary) = describe(&content);
            Some(Resource {
                title: title.unwrap_or_else(|| name.clone()),
                name,
                path,
                summary,
                commands: parse_commands(&content),
            })
        })
        .collect();
    resources.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(resources)
}

fn is_resource_file(path: &Path) -> bool {
    let Some(file_name) = path.file_name().map(|name| name.to_string_lossy()) else {
        return false;
    };
    path.is_file() && file_name.ends_with(".md") && !file_name.ends_with(DETAIL_SUFFIX)
}

fn describe(content: &str) -> (Option<String>, Option<String>) {
    let title = content
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string());
    let summary = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string);
    (title, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn slugify_lowercases_and_dashes() {
        assert_eq!(slugify("My Notes"), "my-notes");
        assert_eq!(slugify("  docker  "), "docker");
    }

    #[test]
    fn templates_render_with_name() {
        assert_eq!(ResourceTemplate::Blank.render("git"), "# git\n\n");
        assert!(ResourceTemplate::Commands.render("git").contains("## Commands"));
        assert!(ResourceTemplate::Detailed.render("git").contains("## Configuration"));
        assert_eq!(ResourceTemplate::from_id("detailed"), Some(ResourceTemplate::Detailed));
    }

    #[test]
    fn lists_markdown_files_without_detail_companions() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("git.md"), "# Git\n\nVersion control\n").unwrap();
        fs::write(dir.path().join("git-detail.md"), "## More\n").unwrap();
        fs::write(dir.path().join("docker.md"), "`docker ps` list ^run\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let resources = list_resources(dir.path()).unwrap();
        let names: Vec<&str> = resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["docker", "git"]);
        assert_eq!(resources[1].title, "Git");
        assert_eq!(resources[1].summary.as_deref(), Some("Version control"));
        assert_eq!(resources[0].title, "docker");
        assert_eq!(resources[0].commands.len(), 1);
        assert!(resources[1].commands.is_empty());
    }

    #[test]
    fn run_annotations_become_commands() {
        let content = "# Git\n\n`git status` Show working tree ^run\n`git log` not runnable\n`git checkout {{branch}}` Switch branch ^run:branch\n";
        let commands = parse_commands(content);
        assert_eq!(commands.len(), 2);

        assert_eq!(commands[0].line, 3);
        assert_eq!(commands[0].command, "git status");
        assert_eq!(commands[0].description, "Show working tree");
        assert_eq!(commands[0].input_var, None);

        assert_eq!(commands[1].line, 5);
        assert_eq!(commands[1].input_var.as_deref(), Some("branch"));
        assert_eq!(commands[1].render(Some("main")), "git checkout main");
        assert_eq!(commands[1].render(None), "git checkout {{branch}}");
    }

    #[test]
    fn commands_template_is_runnable() {
        let commands = parse_commands(&ResourceTemplate::Commands.render("demo"));
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].command, "example-command");
        assert_eq!(commands[0].description, "Example description");
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        assert!(list_resources(&dir.path().join("absent")).unwrap().is_empty());
    }
}
