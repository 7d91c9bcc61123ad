//! # Skitz Engine
//!
//! The engine owns everything the command palette does that is not drawing:
//! the wizard step tables and the driver that walks them, the parameter forms
//! for MCP tools, and the gateway that runs external actions.
//!
//! ## Usage
//!
//! ```rust
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use skitz_engine::{StepContext, StepDriver, StepOutcome, WizardRegistry};
//! use skitz_types::{AppConfig, WizardKind};
//!
//! let registry = Arc::new(WizardRegistry::with_builtin()?);
//! let driver = StepDriver::new(registry);
//! let config = AppConfig::default();
//! let ctx = StepContext::new(&config, &[], Path::new("resources"));
//!
//! let (state, outcome) = driver.start(WizardKind::Research, &ctx);
//! assert_eq!(state.step_index(), 0);
//! assert!(matches!(outcome, StepOutcome::RenderInput(_)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`wizard`**: step tables, run state, registry and driver
//! - **`wizards`**: the built-in step tables, one module per wizard kind
//! - **`tool_params`**: forms and argument maps derived from MCP tool schemas
//! - **`gateway`**: process, HTTP, MCP and filesystem actions with deadlines

pub mod context;
pub mod gateway;
pub mod tool_params;
pub mod wizard;
pub mod wizards;

pub use context::StepContext;
pub use gateway::{ActionGateway, DefaultGateway, PROGRAM_NOT_FOUND, ScriptedGateway, invoke_with_deadline, run_request};
pub use tool_params::{ParamType, describe_schema, finalize_arguments, parse_prefill, prefill_descriptor, tool_fields, tool_request};
pub use wizard::{
    AsyncKind, AsyncResource, DriverError, PendingAction, RegistryError, StepDriver, StepOutcome, TerminalResult, WizardData,
    WizardRegistry, WizardState,
};
