//! Step runtime: what happens while one step is mounted.
//!
//! On mount the runtime seeds the form from the answer store. Every edit
//! re-runs the step schema, so `can_submit` always reflects the current
//! field values. Submit writes the answer in full, resolves the real next
//! route (static or branch) and hands back a `NavigationIntent`. Going back
//! never touches the store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::RuntimeError;
use crate::store::AnswerStore;

use super::registry::StepDescriptor;
use super::validation::StepValidation;

/// Where to go next, plus an optional one-time back target for the
/// destination step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationIntent {
    pub target_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back_override: Option<String>,
}

impl NavigationIntent {
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target_path: target.into(),
            back_override: None,
        }
    }

    pub fn with_back_override(mut self, route: impl Into<String>) -> Self {
        self.back_override = Some(route.into());
        self
    }
}

/// A navigation request produced by a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Push(NavigationIntent),
    /// Defer to the host's native history back.
    HistoryBack,
}

/// A mounted step: its descriptor, live form state and validation.
#[derive(Debug, Clone)]
pub struct StepRuntime {
    descriptor: StepDescriptor,
    route: String,
    form: Map<String, Value>,
    validation: StepValidation,
    back_override: Option<String>,
    active: bool,
}

impl StepRuntime {
    /// Mount a step, seeding fields from the store.
    ///
    /// `back_override` comes from the navigation that led here and replaces
    /// the static `previous_step` for this visit only.
    pub fn mount(
        descriptor: StepDescriptor,
        store: &dyn AnswerStore,
        back_override: Option<String>,
    ) -> Self {
        let form = match store.read(&descriptor.store_key) {
            Some(Value::Object(map)) => map,
            Some(other) => {
                debug!(store_key = %descriptor.store_key, value = %other, "Ignoring non-object answer");
                Map::new()
            }
            None => Map::new(),
        };
        let validation = descriptor.schema.validate(&form);
        let route = descriptor.route();
        debug!(
            route = %route,
            seeded = !form.is_empty(),
            back_override = ?back_override,
            "Step mounted"
        );
        Self {
            descriptor,
            route,
            form,
            validation,
            back_override,
            active: true,
        }
    }

    pub fn descriptor(&self) -> &StepDescriptor {
        &self.descriptor
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn form(&self) -> &Map<String, Value> {
        &self.form
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.form.get(field)
    }

    pub fn validation(&self) -> &StepValidation {
        &self.validation
    }

    pub fn back_override(&self) -> Option<&str> {
        self.back_override.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Forward control state: active and every field valid.
    pub fn can_submit(&self) -> bool {
        self.active && self.validation.is_valid()
    }

    /// Set a field and revalidate the whole form.
    pub fn edit(&mut self, field: &str, value: Value) -> &StepValidation {
        if value.is_null() {
            self.form.remove(field);
        } else {
            self.form.insert(field.to_string(), value);
        }
        self.revalidate()
    }

    /// Remove a field and revalidate.
    pub fn clear(&mut self, field: &str) -> &StepValidation {
        self.form.remove(field);
        self.revalidate()
    }

    fn revalidate(&mut self) -> &StepValidation {
        self.validation = self.descriptor.schema.validate(&self.form);
        &self.validation
    }

    /// Commit the form and resolve the next route.
    ///
    /// The store write happens before the intent is returned, so the
    /// destination step always sees this answer.
    pub fn submit(&mut self, store: &mut dyn AnswerStore) -> Result<NavigationIntent, RuntimeError> {
        if !self.active {
            return Err(RuntimeError::Inactive {
                route: self.route.clone(),
            });
        }
        if !self.validation.is_valid() {
            return Err(RuntimeError::Invalid {
                route: self.route.clone(),
                validation: self.validation.clone(),
            });
        }
        let intent = self.next_intent()?;

        store.write(&self.descriptor.store_key, Value::Object(self.form.clone()));
        self.active = false;

        info!(
            route = %self.route,
            store_key = %self.descriptor.store_key,
            target = %intent.target_path,
            back_override = ?intent.back_override,
            "Step submitted"
        );
        Ok(intent)
    }

    /// Where a submit of the current form would go: branch rule first,
    /// then the static next step. Nothing is written.
    pub fn next_intent(&self) -> Result<NavigationIntent, RuntimeError> {
        if let Some(rule) = self.descriptor.metadata.branch()
            && self.form.get(&rule.field).and_then(Value::as_str) == Some(rule.equals.as_str())
        {
            return Ok(NavigationIntent::to(&rule.target).with_back_override(&self.route));
        }
        match &self.descriptor.next_step {
            Some(next) => Ok(NavigationIntent::to(next)),
            None => Err(RuntimeError::NoNextStep {
                route: self.route.clone(),
            }),
        }
    }

    /// Leave backwards, discarding unsubmitted edits.
    pub fn go_back(&mut self) -> Result<Navigation, RuntimeError> {
        if !self.active {
            return Err(RuntimeError::Inactive {
                route: self.route.clone(),
            });
        }
        self.active = false;
        let target = self
            .back_override
            .as_deref()
            .or(self.descriptor.previous_step.as_deref());
        debug!(route = %self.route, target = ?target, "Step going back");
        Ok(match target {
            Some(route) => Navigation::Push(NavigationIntent::to(route)),
            None => Navigation::HistoryBack,
        })
    }

    /// Take a named alternate route (e.g. manual upload) without submitting.
    pub fn detour(&mut self, name: &str) -> Result<NavigationIntent, RuntimeError> {
        if !self.active {
            return Err(RuntimeError::Inactive {
                route: self.route.clone(),
            });
        }
        let target = self
            .descriptor
            .metadata
            .detour(name)
            .ok_or_else(|| RuntimeError::UnknownDetour {
                route: self.route.clone(),
                name: name.to_string(),
            })?;
        self.active = false;
        debug!(route = %self.route, detour = %name, target = %target, "Step detour");
        Ok(NavigationIntent::to(target))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;
    use crate::wizard::registry::{
        BranchRule, MANUAL_UPLOAD_DETOUR, ProgressMeta, RecordingMeta, StepMetadata, ViewKind,
    };
    use crate::wizard::validation::{FieldSpec, StepSchema};

    fn age_step() -> StepDescriptor {
        StepDescriptor::new("/s", "/s1", ViewKind::Question, "ns:s1")
            .with_next("/s/s2")
            .with_schema(StepSchema::new(vec![FieldSpec::choice(
                "age",
                "Age",
                &["18-30", "30-45", "45+"],
            )]))
    }

    fn smoking_step() -> StepDescriptor {
        StepDescriptor::new("/s", "/smoking", ViewKind::Question, "ns:smoking")
            .with_previous("/s/start")
            .with_next("/s/smoking-detail-1")
            .with_metadata(StepMetadata::Progress(ProgressMeta {
                current: 5,
                total: 16,
                branch: Some(BranchRule {
                    field: "isSmoking".into(),
                    equals: "No, I have never smoked".into(),
                    target: "/s/symptoms".into(),
                }),
            }))
            .with_schema(StepSchema::new(vec![FieldSpec::choice(
                "isSmoking",
                "Do you smoke?",
                &["Yes, current smoker", "Yes, in the past", "No, I have never smoked"],
            )]))
    }

    #[test]
    fn mount_seeds_form_from_store() {
        let mut store = MemoryStore::new();
        store.write("ns:s1", json!({"age": "30-45"}));
        let step = StepRuntime::mount(age_step(), &store, None);
        assert_eq!(step.value("age"), Some(&json!("30-45")));
        assert!(step.can_submit());
    }

    #[test]
    fn empty_store_mounts_blank_and_blocked() {
        let step = StepRuntime::mount(age_step(), &MemoryStore::new(), None);
        assert!(step.form().is_empty());
        assert!(step.is_active());
        assert!(!step.can_submit());
    }

    #[test]
    fn forward_control_tracks_every_edit() {
        let mut step = StepRuntime::mount(age_step(), &MemoryStore::new(), None);
        assert!(!step.can_submit());

        assert!(!step.edit("age", json!("nope")).is_valid());
        assert!(!step.can_submit());

        assert!(step.edit("age", json!("18-30")).is_valid());
        assert!(step.can_submit());

        step.clear("age");
        assert!(!step.can_submit());

        step.edit("age", json!("45+"));
        step.edit("age", Value::Null);
        assert!(!step.can_submit());
    }

    #[test]
    fn submit_writes_store_and_returns_static_next() {
        let mut store = MemoryStore::new();
        let mut step = StepRuntime::mount(age_step(), &store, None);
        step.edit("age", json!("30-45"));

        let intent = step.submit(&mut store).unwrap();
        assert_eq!(intent, NavigationIntent::to("/s/s2"));
        assert_eq!(store.read("ns:s1"), Some(json!({"age": "30-45"})));
        assert!(!step.is_active());
    }

    #[test]
    fn invalid_submit_leaves_store_untouched() {
        let mut store = MemoryStore::new();
        let mut step = StepRuntime::mount(age_step(), &store, None);
        let err = step.submit(&mut store).unwrap_err();
        match err {
            RuntimeError::Invalid { route, validation } => {
                assert_eq!(route, "/s/s1");
                assert!(validation.error_for("age").is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.record().is_empty());
        assert!(step.is_active());
    }

    #[test]
    fn second_submit_is_rejected() {
        let mut store = MemoryStore::new();
        let mut step = StepRuntime::mount(age_step(), &store, None);
        step.edit("age", json!("30-45"));
        step.submit(&mut store).unwrap();
        assert!(matches!(
            step.submit(&mut store),
            Err(RuntimeError::Inactive { .. })
        ));
        assert!(!step.can_submit());
    }

    #[test]
    fn resubmission_replaces_previous_answer() {
        let mut store = MemoryStore::new();
        store.write("ns:s1", json!({"age": "18-30", "stale": true}));
        let mut step = StepRuntime::mount(age_step(), &store, None);
        step.clear("stale");
        step.edit("age", json!("45+"));
        step.submit(&mut store).unwrap();
        assert_eq!(store.read("ns:s1"), Some(json!({"age": "45+"})));
    }

    #[test]
    fn never_smoked_skips_ahead_with_back_override() {
        let mut store = MemoryStore::new();
        let mut step = StepRuntime::mount(smoking_step(), &store, None);
        step.edit("isSmoking", json!("No, I have never smoked"));

        let intent = step.submit(&mut store).unwrap();
        assert_eq!(intent.target_path, "/s/symptoms");
        assert_eq!(intent.back_override.as_deref(), Some("/s/smoking"));
    }

    #[test]
    fn other_smoking_answers_follow_static_chain() {
        for answer in ["Yes, current smoker", "Yes, in the past"] {
            let mut store = MemoryStore::new();
            let mut step = StepRuntime::mount(smoking_step(), &store, None);
            step.edit("isSmoking", json!(answer));
            let intent = step.submit(&mut store).unwrap();
            assert_eq!(intent, NavigationIntent::to("/s/smoking-detail-1"));
        }
    }

    #[test]
    fn terminal_step_has_no_target() {
        let mut store = MemoryStore::new();
        let terminal = StepDescriptor::new("/s", "/done", ViewKind::ThankYou, "ns:done");
        let mut step = StepRuntime::mount(terminal, &store, None);
        assert!(matches!(
            step.submit(&mut store),
            Err(RuntimeError::NoNextStep { route }) if route == "/s/done"
        ));
        assert!(store.record().is_empty());
        assert!(step.is_active());
    }

    #[test]
    fn back_prefers_override_then_static_then_history() {
        let store = MemoryStore::new();

        let mut overridden = StepRuntime::mount(smoking_step(), &store, Some("/s/branch".into()));
        assert_eq!(
            overridden.go_back().unwrap(),
            Navigation::Push(NavigationIntent::to("/s/branch"))
        );

        let mut plain = StepRuntime::mount(smoking_step(), &store, None);
        assert_eq!(
            plain.go_back().unwrap(),
            Navigation::Push(NavigationIntent::to("/s/start"))
        );

        let mut first = StepRuntime::mount(age_step(), &store, None);
        assert_eq!(first.go_back().unwrap(), Navigation::HistoryBack);
        assert!(!first.is_active());
    }

    #[test]
    fn back_discards_unsubmitted_edits() {
        let mut store = MemoryStore::new();
        store.write("ns:s1", json!({"age": "18-30"}));
        let mut step = StepRuntime::mount(age_step(), &store, None);
        step.edit("age", json!("45+"));
        step.go_back().unwrap();
        assert_eq!(store.read("ns:s1"), Some(json!({"age": "18-30"})));
    }

    #[test]
    fn detour_resolves_from_metadata() {
        let store = MemoryStore::new();
        let record = StepDescriptor::new("/s", "/record", ViewKind::RecordCough, "ns:rec")
            .with_next("/s/listen")
            .with_metadata(StepMetadata::Recording(RecordingMeta {
                logic: "recordYourCough".into(),
                manual_upload: Some("/s/upload".into()),
            }));

        let mut step = StepRuntime::mount(record.clone(), &store, None);
        assert!(matches!(
            step.detour("bogus"),
            Err(RuntimeError::UnknownDetour { .. })
        ));
        assert!(step.is_active());
        assert_eq!(
            step.detour(MANUAL_UPLOAD_DETOUR).unwrap(),
            NavigationIntent::to("/s/upload")
        );
        assert!(!step.is_active());
    }

    #[test]
    fn intent_serializes_camel_case() {
        let intent = NavigationIntent::to("/a").with_back_override("/b");
        assert_eq!(
            serde_json::to_value(&intent).unwrap(),
            json!({"targetPath": "/a", "backOverride": "/b"})
        );
        assert_eq!(
            serde_json::to_value(NavigationIntent::to("/a")).unwrap(),
            json!({"targetPath": "/a"})
        );
    }
}
