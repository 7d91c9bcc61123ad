use std::sync::atomic::{AtomicU64, Ordering};

use skitz_types::{RequestId, WizardKind};

use crate::wizard::step::Completion;
use crate::wizards::{
    AddResourceData, CloudAgentData, CodeReviewData, ConfigureProviderData, DeleteResourceData, DeployData, PreferencesData, ResearchData,
    RunCommandData,
};

/// A value loaded by an action, tracked through its lifecycle.
///
/// Steps use this to avoid re-dispatching a load once it has been tried:
/// only `NotAttempted` starts a load, and a failure stays visible until the
/// user moves on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AsyncResource<T> {
    #[default]
    NotAttempted,
    Loading,
    Loaded(T),
    Failed(String),
}

impl<T> AsyncResource<T> {
    pub fn is_attempted(&self) -> bool {
        !matches!(self, AsyncResource::NotAttempted)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, AsyncResource::Loading)
    }

    pub fn begin(&mut self) {
        *self = AsyncResource::Loading;
    }

    pub fn finish(&mut self, result: Result<T, String>) {
        *self = match result {
            Ok(value) => AsyncResource::Loaded(value),
            Err(error) => AsyncResource::Failed(error),
        };
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            AsyncResource::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            AsyncResource::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        *self = AsyncResource::NotAttempted;
    }
}

/// The single action a run is waiting on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingStep {
    pub request_id: RequestId,
    pub step_index: usize,
    pub completion: Completion,
}

/// Typed per-kind data of a wizard run.
pub trait WizardPayload: Default + Send + 'static {
    const KIND: WizardKind;

    fn wrap(self) -> WizardData;
    fn from_data(data: &WizardData) -> Option<&Self>;
    fn from_data_mut(data: &mut WizardData) -> Option<&mut Self>;
}

macro_rules! wizard_data {
    ($($variant:ident($data:ident)),+ $(,)?) => {
        /// Accumulated answers and loaded values, one variant per wizard kind.
        #[derive(Clone, Debug, PartialEq)]
        pub enum WizardData {
            $($variant($data),)+
        }

        impl WizardData {
            /// Fresh data for a new run of `kind`.
            pub fn empty(kind: WizardKind) -> Self {
                match kind {
                    $(WizardKind::$variant => WizardData::$variant($data::default()),)+
                }
            }

            pub fn kind(&self) -> WizardKind {
                match self {
                    $(WizardData::$variant(_) => WizardKind::$variant,)+
                }
            }
        }

        $(
            impl WizardPayload for $data {
                const KIND: WizardKind = WizardKind::$variant;

                fn wrap(self) -> WizardData {
                    WizardData::$variant(self)
                }

                fn from_data(data: &WizardData) -> Option<&Self> {
                    match data {
                        WizardData::$variant(inner) => Some(inner),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                fn from_data_mut(data: &mut WizardData) -> Option<&mut Self> {
                    match data {
                        WizardData::$variant(inner) => Some(inner),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }
        )+
    };
}

wizard_data! {
    Deploy(DeployData),
    CodeReview(CodeReviewData),
    CloudAgent(CloudAgentData),
    AddResource(AddResourceData),
    DeleteResource(DeleteResourceData),
    ConfigureProvider(ConfigureProviderData),
    Preferences(PreferencesData),
    Research(ResearchData),
    RunCommand(RunCommandData),
}

/// One run of a wizard.
///
/// Owned by the palette while the wizard is active; discarded when the palette
/// closes or the run finishes.
#[derive(Clone, Debug, PartialEq)]
pub struct WizardState {
    run: u64,
    kind: WizardKind,
    pub(crate) step_index: usize,
    pub(crate) data: WizardData,
    pub(crate) pending: Option<PendingStep>,
}

impl WizardState {
    pub fn new(kind: WizardKind) -> Self {
        static NEXT_RUN: AtomicU64 = AtomicU64::new(1);
        Self {
            run: NEXT_RUN.fetch_add(1, Ordering::Relaxed),
            kind,
            step_index: 0,
            data: WizardData::empty(kind),
            pending: None,
        }
    }

    /// Unique number of this run, used in logs.
    pub fn run(&self) -> u64 {
        self.run
    }

    pub fn kind(&self) -> WizardKind {
        self.kind
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn data(&self) -> &WizardData {
        &self.data
    }

    pub fn pending(&self) -> Option<&PendingStep> {
        self.pending.as_ref()
    }

    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    pub fn waits_for(&self, request_id: RequestId) -> bool {
        self.pending.is_some_and(|pending| pending.request_id == request_id)
    }

    /// Typed view of this run's data.
    pub fn payload<D: WizardPayload>(&self) -> Option<&D> {
        D::from_data(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn async_resource_tracks_attempts() {
        let mut accounts: AsyncResource<Vec<String>> = AsyncResource::default();
        assert!(!accounts.is_attempted());

        accounts.begin();
        assert!(accounts.is_attempted());
        assert!(accounts.is_loading());

        accounts.finish(Err("az not found".into()));
        assert_eq!(accounts.error(), Some("az not found"));
        assert!(accounts.loaded().is_none());

        accounts.finish(Ok(vec!["main".into()]));
        assert_eq!(accounts.loaded().map(Vec::len), Some(1));
    }

    #[test]
    fn new_runs_start_empty_with_matching_data() {
        for kind in WizardKind::ALL {
            let state = WizardState::new(kind);
            assert_eq!(state.step_index(), 0);
            assert_eq!(state.data().kind(), kind);
            assert!(!state.is_waiting());
        }
    }

    #[test]
    fn runs_get_distinct_numbers() {
        let first = WizardState::new(WizardKind::Research);
        let second = WizardState::new(WizardKind::Research);
        assert_ne!(first.run(), second.run());
    }

    #[test]
    fn payload_matches_kind() {
        let state = WizardState::new(WizardKind::Research);
        assert!(state.payload::<ResearchData>().is_some());
        assert!(state.payload::<DeployData>().is_none());
    }
}
