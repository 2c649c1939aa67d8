//! Step registry: the static, ordered definition of every wizard screen.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

use super::validation::StepSchema;

/// Which screen renders a step. Opaque to the flow controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Splash,
    Introduction,
    Consent,
    RecordingInstructions,
    RecordCough,
    ManualUpload,
    ListenAudio,
    Question,
    ThankYou,
}

impl std::fmt::Display for ViewKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Splash => "splash",
            Self::Introduction => "introduction",
            Self::Consent => "consent",
            Self::RecordingInstructions => "recording_instructions",
            Self::RecordCough => "record_cough",
            Self::ManualUpload => "manual_upload",
            Self::ListenAudio => "listen_audio",
            Self::Question => "question",
            Self::ThankYou => "thank_you",
        };
        write!(f, "{s}")
    }
}

/// Answer-dependent skip: when `field` equals `equals`, go to `target`
/// instead of the static next step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchRule {
    pub field: String,
    pub equals: String,
    pub target: String,
}

/// Progress counters for the questionnaire header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgressMeta {
    pub current: u32,
    pub total: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchRule>,
}

/// Metadata for the cough-recording screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordingMeta {
    /// Sub-flow tag shared by the record/upload/listen screens.
    pub logic: String,
    /// Alternate route reachable as a detour from the capture screen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_upload: Option<String>,
}

/// Per-step metadata, keyed by step kind. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMetadata {
    #[default]
    None,
    Progress(ProgressMeta),
    Recording(RecordingMeta),
}

impl StepMetadata {
    pub fn progress(&self) -> Option<(u32, u32)> {
        match self {
            Self::Progress(p) => Some((p.current, p.total)),
            _ => None,
        }
    }

    pub fn branch(&self) -> Option<&BranchRule> {
        match self {
            Self::Progress(p) => p.branch.as_ref(),
            _ => None,
        }
    }

    /// Resolve a named detour route.
    pub fn detour(&self, name: &str) -> Option<&str> {
        match (self, name) {
            (Self::Recording(r), MANUAL_UPLOAD_DETOUR) => r.manual_upload.as_deref(),
            _ => None,
        }
    }
}

/// Detour name for the manual-upload alternative to recording.
pub const MANUAL_UPLOAD_DETOUR: &str = "manual-upload";

/// One screen in the wizard.
#[derive(Debug, Clone)]
pub struct StepDescriptor {
    /// Fixed base route of the segment, e.g. `/submit-steps`.
    pub base: String,
    /// Route suffix, unique within the registry once joined with `base`.
    pub path: String,
    pub view: ViewKind,
    pub title: String,
    pub store_key: String,
    /// Absent means "use native history back".
    pub previous_step: Option<String>,
    /// Absent means terminal step.
    pub next_step: Option<String>,
    pub metadata: StepMetadata,
    pub schema: StepSchema,
}

impl StepDescriptor {
    pub fn new(base: &str, path: &str, view: ViewKind, store_key: &str) -> Self {
        Self {
            base: base.to_string(),
            path: path.to_string(),
            view,
            title: String::new(),
            store_key: store_key.to_string(),
            previous_step: None,
            next_step: None,
            metadata: StepMetadata::None,
            schema: StepSchema::empty(),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_previous(mut self, route: &str) -> Self {
        self.previous_step = Some(route.to_string());
        self
    }

    pub fn with_next(mut self, route: &str) -> Self {
        self.next_step = Some(route.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: StepMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_schema(mut self, schema: StepSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Full route: base joined with path.
    pub fn route(&self) -> String {
        format!("{}{}", self.base, self.path)
    }

    pub fn is_terminal(&self) -> bool {
        self.next_step.is_none()
    }

    /// The property set handed to a view renderer.
    pub fn props(&self) -> StepProps {
        StepProps {
            store_key: self.store_key.clone(),
            previous_step: self.previous_step.clone(),
            next_step: self.next_step.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Every literal route this step can navigate to.
    fn targets(&self) -> impl Iterator<Item = &str> {
        let detour = match &self.metadata {
            StepMetadata::Recording(r) => r.manual_upload.as_deref(),
            _ => None,
        };
        self.previous_step
            .as_deref()
            .into_iter()
            .chain(self.next_step.as_deref())
            .chain(self.metadata.branch().map(|b| b.target.as_str()))
            .chain(detour)
    }
}

/// View-facing configuration for a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StepProps {
    pub store_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
    #[serde(default)]
    pub metadata: StepMetadata,
}

/// Ordered, immutable set of steps indexed by route.
///
/// List order is the default linear path only; traversal follows each
/// step's `next_step` and branch rule.
#[derive(Debug, Clone)]
pub struct StepRegistry {
    steps: Vec<StepDescriptor>,
    index: HashMap<String, usize>,
}

impl StepRegistry {
    /// Build a registry, rejecting duplicate routes and dangling targets.
    pub fn new(steps: Vec<StepDescriptor>) -> Result<Self, RegistryError> {
        if steps.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut index = HashMap::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            let route = step.route();
            if index.insert(route.clone(), i).is_some() {
                return Err(RegistryError::DuplicateRoute(route));
            }
        }
        for step in &steps {
            if let Some(target) = step.targets().find(|t| !index.contains_key(*t)) {
                return Err(RegistryError::DanglingTarget {
                    from: step.route(),
                    target: target.to_string(),
                });
            }
        }
        Ok(Self { steps, index })
    }

    /// Index a step list that is known to be well formed.
    pub(crate) fn from_trusted(steps: Vec<StepDescriptor>) -> Self {
        let index = steps
            .iter()
            .enumerate()
            .map(|(i, step)| (step.route(), i))
            .collect();
        Self { steps, index }
    }

    pub fn get(&self, route: &str) -> Option<&StepDescriptor> {
        self.index.get(route).map(|&i| &self.steps[i])
    }

    pub fn contains(&self, route: &str) -> bool {
        self.index.contains_key(route)
    }

    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Route of the first step in list order.
    pub fn entry_route(&self) -> Option<String> {
        self.steps.first().map(StepDescriptor::route)
    }
}
