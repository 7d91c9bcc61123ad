use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use skitz_engine::{ActionGateway, DefaultGateway, ScriptedGateway, WizardRegistry};
use skitz_types::{ActionDescriptor, ActionResult};
use skitz_util::{ConfigStore, HistoryStore, InMemoryHistoryStore, JsonHistoryStore, app_data_dir, default_resources_dir, expand_tilde};
use skitz_tui::TuiOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "skitz.log";

#[derive(Debug, Parser)]
#[command(name = "skitz", version, about = "Terminal dashboard for resources, wizards and MCP tools")]
struct Cli {
    /// Config file (defaults to ~/.config/skitz/config.yaml or $SKITZ_CONFIG_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory holding resource markdown files
    #[arg(long, global = true, value_name = "PATH")]
    resources_dir: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `skitz_engine=trace` (overrides RUST_LOG)
    #[arg(long, global = true, value_name = "FILTER")]
    log_level: Option<String>,

    /// Do not run external actions; every action reports what it would have done
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the registered wizards and their steps
    Wizards,
    /// Inspect the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the path of the configuration file
    Path,
    /// Print the effective configuration as YAML (API keys redacted)
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Command::Wizards) => print_wizards(),
        Some(Command::Config { action }) => run_config_command(&cli, action),
        None => {
            let log_path = init_tracing(cli.log_level.as_deref())?;
            info!(log = %log_path.display(), "starting dashboard");
            run_dashboard(&cli).await
        }
    }
}

/// Install a file-backed subscriber; the dashboard owns stdout.
fn init_tracing(level: Option<&str>) -> Result<PathBuf> {
    let dir = app_data_dir();
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    let filter = match level {
        Some(level) => EnvFilter::try_new(level).with_context(|| format!("invalid log filter `{level}`"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
    Ok(path)
}

fn load_config(cli: &Cli) -> Result<ConfigStore> {
    ConfigStore::load(cli.config.clone()).context("load configuration")
}

async fn run_dashboard(cli: &Cli) -> Result<()> {
    let config_store = Arc::new(load_config(cli)?);
    let config = config_store.snapshot();

    let history: Arc<dyn HistoryStore> = if config.history.persist {
        match JsonHistoryStore::new(None, config.history.max_items) {
            Ok(store) => Arc::new(store),
            Err(error) => {
                warn!(error = %error, "history file unavailable; keeping history in memory");
                Arc::new(InMemoryHistoryStore::new(config.history.max_items))
            }
        }
    } else {
        Arc::new(InMemoryHistoryStore::new(config.history.max_items))
    };

    let resources_dir = cli
        .resources_dir
        .as_deref()
        .map(|dir| expand_tilde(&dir.to_string_lossy()))
        .unwrap_or_else(default_resources_dir);

    let registry = Arc::new(WizardRegistry::with_builtin().context("build wizard registry")?);
    let gateway: Arc<dyn ActionGateway> = if cli.dry_run {
        info!("dry run: external actions are simulated");
        Arc::new(dry_run_gateway())
    } else {
        Arc::new(DefaultGateway::new().context("create action gateway")?)
    };

    skitz_tui::run(TuiOptions {
        config_store,
        history,
        resources_dir,
        registry,
        gateway,
    })
    .await
}

fn dry_run_gateway() -> ScriptedGateway {
    ScriptedGateway::new(|descriptor| match descriptor {
        ActionDescriptor::McpListTools { .. } => ActionResult::ok(r#"{"tools":[]}"#),
        other => ActionResult::ok(format!("[dry run] {}", other.summary())),
    })
}

fn print_wizards() -> Result<()> {
    let registry = WizardRegistry::with_builtin().context("build wizard registry")?;
    for kind in registry.kinds() {
        let steps = registry.step_ids(kind).unwrap_or_default().join(" → ");
        println!("{:<20} {:<18} {steps}", kind.id(), kind.title());
    }
    Ok(())
}

fn run_config_command(cli: &Cli, action: &ConfigCommand) -> Result<()> {
    let store = load_config(cli)?;
    match action {
        ConfigCommand::Path => println!("{}", store.path().display()),
        ConfigCommand::Show => {
            let mut config = store.snapshot();
            for provider in &mut config.ai.providers {
                if provider.api_key.is_some() {
                    provider.api_key = Some("[REDACTED]".to_string());
                }
            }
            print!("{}", serde_yaml::to_string(&config).context("serialize configuration")?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_before_and_after_subcommands() {
        let cli = Cli::try_parse_from(["skitz", "--config", "/tmp/c.yaml", "config", "path"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/c.yaml")));
        assert!(matches!(cli.command, Some(Command::Config { action: ConfigCommand::Path })));

        let cli = Cli::try_parse_from(["skitz", "wizards", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn no_subcommand_runs_the_dashboard() {
        let cli = Cli::try_parse_from(["skitz", "--dry-run", "--resources-dir", "~/docs"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.dry_run);
    }

    #[tokio::test]
    async fn dry_run_gateway_never_touches_the_system() {
        let gateway = dry_run_gateway();
        let result = gateway
            .invoke(&ActionDescriptor::Process {
                program: "az".into(),
                args: vec!["account".into(), "show".into()],
                env: Vec::new(),
            })
            .await;
        assert!(result.success);
        assert!(result.output.starts_with("[dry run] az account show"));
        assert_eq!(gateway.calls().len(), 1);
    }
}
