use indexmap::IndexMap;
use skitz_types::{ActionResult, FieldErrors, FormValues, WizardKind};

use crate::context::StepContext;
use crate::wizard::error::{DriverError, RegistryError};
use crate::wizard::state::{WizardData, WizardPayload};
use crate::wizard::step::{StepPlan, StepRole, StepSpec, StepTable};
use crate::wizards;

/// Type-erased access to one wizard's step table.
pub(crate) trait WizardProgram: Send + Sync {
    fn len(&self) -> usize;
    fn step(&self, index: usize) -> Option<(&'static str, StepRole)>;
    fn step_ids(&self) -> Vec<&'static str>;
    fn plan(&self, index: usize, data: &mut WizardData, ctx: &StepContext<'_>) -> Result<StepPlan, DriverError>;
    fn submit(
        &self,
        index: usize,
        data: &mut WizardData,
        values: &FormValues,
        ctx: &StepContext<'_>,
    ) -> Result<Result<(), FieldErrors>, DriverError>;
    fn complete(&self, index: usize, data: &mut WizardData, result: &ActionResult) -> Result<(), DriverError>;
}

impl<D: WizardPayload> StepTable<D> {
    fn spec_at(&self, index: usize) -> Result<&StepSpec<D>, DriverError> {
        self.step(index).ok_or(DriverError::StepOutOfRange { kind: self.kind(), index })
    }

    fn data_mut<'a>(&self, data: &'a mut WizardData) -> Result<&'a mut D, DriverError> {
        D::from_data_mut(data).ok_or(DriverError::DataMismatch { kind: self.kind() })
    }
}

impl<D: WizardPayload + Sync> WizardProgram for StepTable<D> {
    fn len(&self) -> usize {
        StepTable::len(self)
    }

    fn step(&self, index: usize) -> Option<(&'static str, StepRole)> {
        StepTable::step(self, index).map(|spec| (spec.id, spec.role))
    }

    fn step_ids(&self) -> Vec<&'static str> {
        StepTable::step_ids(self)
    }

    fn plan(&self, index: usize, data: &mut WizardData, ctx: &StepContext<'_>) -> Result<StepPlan, DriverError> {
        let spec = self.spec_at(index)?;
        let data = self.data_mut(data)?;
        Ok((spec.plan)(data, ctx))
    }

    fn submit(
        &self,
        index: usize,
        data: &mut WizardData,
        values: &FormValues,
        ctx: &StepContext<'_>,
    ) -> Result<Result<(), FieldErrors>, DriverError> {
        let spec = self.spec_at(index)?;
        let submit = spec.submit.ok_or(DriverError::MissingHandler {
            kind: self.kind(),
            step: spec.id,
            handler: "submit",
        })?;
        let data = self.data_mut(data)?;
        Ok(submit(data, values, ctx))
    }

    fn complete(&self, index: usize, data: &mut WizardData, result: &ActionResult) -> Result<(), DriverError> {
        let spec = self.spec_at(index)?;
        let complete = spec.complete.ok_or(DriverError::MissingHandler {
            kind: self.kind(),
            step: spec.id,
            handler: "complete",
        })?;
        let data = self.data_mut(data)?;
        complete(data, result);
        Ok(())
    }
}

/// Step tables for every wizard kind, validated when registered.
#[derive(Default)]
pub struct WizardRegistry {
    programs: IndexMap<WizardKind, Box<dyn WizardProgram>>,
}

impl WizardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in wizard.
    pub fn with_builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(wizards::deploy::table()?)?;
        registry.register(wizards::code_review::table()?)?;
        registry.register(wizards::cloud_agent::table()?)?;
        registry.register(wizards::add_resource::table()?)?;
        registry.register(wizards::delete_resource::table()?)?;
        registry.register(wizards::configure_provider::table()?)?;
        registry.register(wizards::preferences::table()?)?;
        registry.register(wizards::research::table()?)?;
        registry.register(wizards::run_command::table()?)?;
        Ok(registry)
    }

    pub fn register<D: WizardPayload + Sync>(&mut self, table: StepTable<D>) -> Result<(), RegistryError> {
        let kind = table.kind();
        if kind != D::KIND {
            return Err(RegistryError::DataKindMismatch { kind, data: D::KIND });
        }
        if self.programs.contains_key(&kind) {
            return Err(RegistryError::DuplicateKind { kind });
        }
        self.programs.insert(kind, Box::new(table));
        Ok(())
    }

    pub fn contains(&self, kind: WizardKind) -> bool {
        self.programs.contains_key(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = WizardKind> + '_ {
        self.programs.keys().copied()
    }

    pub fn step_ids(&self, kind: WizardKind) -> Option<Vec<&'static str>> {
        self.programs.get(&kind).map(|program| program.step_ids())
    }

    pub(crate) fn program(&self, kind: WizardKind) -> Result<&dyn WizardProgram, DriverError> {
        self.programs
            .get(&kind)
            .map(|program| program.as_ref())
            .ok_or(DriverError::UnknownKind(kind))
    }
}
