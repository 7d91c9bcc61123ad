//! Generic multi-step wizard machinery: step tables, run state, the registry
//! and the driver that moves a run between steps.

pub mod driver;
pub mod error;
pub mod registry;
pub mod state;
pub mod step;

pub use driver::{PendingAction, StepDriver, StepOutcome};
pub use error::{DriverError, RegistryError};
pub use registry::WizardRegistry;
pub use state::{AsyncResource, PendingStep, WizardData, WizardPayload, WizardState};
pub use step::{AsyncKind, AsyncStep, Completion, StepPlan, StepRole, StepSpec, StepTable, TerminalResult};
