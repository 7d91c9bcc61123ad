use skitz_types::WizardKind;
use thiserror::Error;

/// Problems found while building step tables or the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("wizard '{kind}' has no steps")]
    EmptyTable { kind: WizardKind },
    #[error("wizard '{kind}' declares step '{step}' more than once")]
    DuplicateStep { kind: WizardKind, step: &'static str },
    #[error("wizard '{kind}' step '{step}' collects input but has no submit handler")]
    MissingSubmit { kind: WizardKind, step: &'static str },
    #[error("wizard '{kind}' step '{step}' dispatches actions but has no completion handler")]
    MissingComplete { kind: WizardKind, step: &'static str },
    #[error("wizard '{kind}' ends with step '{step}', which can never finish the run")]
    NotTerminating { kind: WizardKind, step: &'static str },
    #[error("wizard '{kind}' is registered twice")]
    DuplicateKind { kind: WizardKind },
    #[error("step table for '{kind}' is built over data for '{data}'")]
    DataKindMismatch { kind: WizardKind, data: WizardKind },
}

/// Structural errors found while driving a wizard run.
///
/// These never reach the user verbatim as a crash: the driver logs them and
/// turns them into a terminal failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("no step table registered for wizard '{0}'")]
    UnknownKind(WizardKind),
    #[error("wizard '{kind}' has no step at index {index}")]
    StepOutOfRange { kind: WizardKind, index: usize },
    #[error("wizard '{kind}' run carries data for a different wizard")]
    DataMismatch { kind: WizardKind },
    #[error("wizard '{kind}' step '{step}' ({role}) may not produce a {plan} plan")]
    RoleViolation {
        kind: WizardKind,
        step: &'static str,
        role: &'static str,
        plan: &'static str,
    },
    #[error("wizard '{kind}' step '{step}' asked for a second action while one is pending")]
    DuplicateDispatch { kind: WizardKind, step: &'static str },
    #[error("wizard '{kind}' step '{step}' has no {handler} handler")]
    MissingHandler {
        kind: WizardKind,
        step: &'static str,
        handler: &'static str,
    },
    #[error("wizard '{kind}' skipped past every remaining step")]
    SkipLoop { kind: WizardKind },
}
