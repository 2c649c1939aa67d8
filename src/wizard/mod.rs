//! Wizard flow controller.
//!
//! The survey is a registry of steps wired by route. A session mounts one
//! step at a time: the step reads its previous answer from the store,
//! revalidates on every edit, and on submit writes its answer and resolves
//! the next route, which is either the static `next_step` or a branch
//! target carrying a one-time back override.

pub mod driver;
pub mod navigator;
pub mod registry;
pub mod runtime;
pub mod session;
pub mod steps;
pub mod validation;

pub use driver::{Outcome, run};
pub use navigator::{HistoryEntry, HistoryNavigator, Navigator};
pub use registry::{
    BranchRule, MANUAL_UPLOAD_DETOUR, ProgressMeta, RecordingMeta, StepDescriptor, StepMetadata,
    StepProps, StepRegistry, ViewKind,
};
pub use runtime::{Navigation, NavigationIntent, StepRuntime};
pub use session::{SubmissionSummary, WizardSession};
pub use steps::survey_registry;
pub use validation::{FieldKind, FieldSpec, StepSchema, StepValidation};
