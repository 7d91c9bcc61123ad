//! # skitz TUI
//!
//! Terminal dashboard for browsing documentation resources and driving
//! multi-step wizards from a command palette.
//!
//! ## Architecture
//!
//! - `app` holds all UI state. Key presses and runtime messages update it
//!   and return [`skitz_types::Effect`]s.
//! - The command palette (`ui::components::palette`) owns the active wizard
//!   run or MCP tool and correlates every completion by request id.
//! - `cmd` executes effects: external actions are spawned on the
//!   [`skitz_engine::ActionGateway`], settings are persisted, history is
//!   recorded.
//! - `ui::runtime` owns the terminal and the event loop.

mod app;
mod cmd;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use skitz_engine::{ActionGateway, WizardRegistry};
use skitz_util::{ConfigStore, HistoryStore};

use crate::app::SharedCtx;

/// Everything the dashboard needs from the caller.
pub struct TuiOptions {
    pub config_store: Arc<ConfigStore>,
    pub history: Arc<dyn HistoryStore>,
    pub resources_dir: PathBuf,
    pub registry: Arc<WizardRegistry>,
    pub gateway: Arc<dyn ActionGateway>,
}

/// Run the dashboard until the user quits.
///
/// # Errors
///
/// Fails when the terminal cannot be put into (or restored from) raw mode,
/// or when drawing to it fails.
pub async fn run(options: TuiOptions) -> Result<()> {
    let TuiOptions {
        config_store,
        history,
        resources_dir,
        registry,
        gateway,
    } = options;
    let ctx = SharedCtx {
        config_store,
        history,
        resources_dir,
    };
    ui::runtime::run_app(ctx, registry, gateway).await
}
