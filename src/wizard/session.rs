//! WizardSession: binds the registry, an injected answer store and a
//! navigator, and keeps exactly one step mounted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::RuntimeError;
use crate::store::{AnswerRecord, AnswerStore};

use super::navigator::Navigator;
use super::registry::StepRegistry;
use super::runtime::{Navigation, NavigationIntent, StepRuntime};
use super::validation::StepValidation;

/// Everything collected by the time the terminal step is reached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSummary {
    pub session_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub answers: AnswerRecord,
}

/// A running wizard.
pub struct WizardSession<S, N> {
    id: Uuid,
    registry: Arc<StepRegistry>,
    store: S,
    navigator: N,
    entry_route: String,
    step: StepRuntime,
}

impl<S: AnswerStore, N: Navigator> WizardSession<S, N> {
    /// Land on `entry_route` and mount its step.
    pub fn open(
        registry: Arc<StepRegistry>,
        store: S,
        mut navigator: N,
        entry_route: &str,
    ) -> Result<Self, RuntimeError> {
        navigator.push(&NavigationIntent::to(entry_route));
        let step = mount(&registry, &store, &navigator)?;
        let id = Uuid::new_v4();
        info!(session_id = %id, route = %entry_route, answers = store.record().len(), "Wizard session opened");
        Ok(Self {
            id,
            registry,
            store,
            navigator,
            entry_route: entry_route.to_string(),
            step,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// The mounted step.
    pub fn current(&self) -> &StepRuntime {
        &self.step
    }

    pub fn route(&self) -> &str {
        self.step.route()
    }

    pub fn is_complete(&self) -> bool {
        self.step.descriptor().is_terminal()
    }

    /// Edit a field on the mounted step.
    pub fn edit(&mut self, field: &str, value: Value) -> &StepValidation {
        self.step.edit(field, value)
    }

    /// Submit the mounted step and move to wherever it resolves.
    ///
    /// The target is checked before anything is written, so a dangling
    /// route leaves the step mounted and the store untouched.
    pub fn submit(&mut self) -> Result<&StepRuntime, RuntimeError> {
        if self.step.can_submit() {
            let intent = self.step.next_intent()?;
            self.ensure_registered(&intent.target_path)?;
        }
        let intent = self.step.submit(&mut self.store)?;
        self.navigate(&intent)
    }

    /// Go back from the mounted step. The store is never touched.
    pub fn back(&mut self) -> Result<&StepRuntime, RuntimeError> {
        match self.step.go_back()? {
            Navigation::Push(intent) => {
                // Returning to the entry below pops it, so it keeps the
                // back override it was first reached with.
                let returning = self
                    .navigator
                    .previous()
                    .is_some_and(|entry| entry.route == intent.target_path);
                if returning && self.navigator.go_back() {
                    self.step = mount(&self.registry, &self.store, &self.navigator)?;
                    return Ok(&self.step);
                }
                self.navigate(&intent)
            }
            Navigation::HistoryBack => {
                if !self.navigator.go_back() {
                    // Nothing behind us: stay put, but interactive again.
                    self.step = mount(&self.registry, &self.store, &self.navigator)?;
                    return Err(RuntimeError::NoHistory {
                        route: self.step.route().to_string(),
                    });
                }
                self.step = mount(&self.registry, &self.store, &self.navigator)?;
                Ok(&self.step)
            }
        }
    }

    /// Take a named detour from the mounted step.
    pub fn detour(&mut self, name: &str) -> Result<&StepRuntime, RuntimeError> {
        if let Some(target) = self.step.descriptor().metadata.detour(name) {
            self.ensure_registered(target)?;
        }
        let intent = self.step.detour(name)?;
        self.navigate(&intent)
    }

    /// Clear every answer and start over at the entry route.
    pub fn reset(&mut self) -> Result<&StepRuntime, RuntimeError> {
        self.store.reset();
        info!(session_id = %self.id, "Wizard reset");
        let entry = NavigationIntent::to(self.entry_route.as_str());
        self.navigate(&entry)
    }

    /// Snapshot of the answers, stamped now.
    pub fn summary(&self) -> SubmissionSummary {
        SubmissionSummary {
            session_id: self.id,
            completed_at: Utc::now(),
            answers: self.store.record().clone(),
        }
    }

    fn ensure_registered(&self, route: &str) -> Result<(), RuntimeError> {
        if self.registry.contains(route) {
            return Ok(());
        }
        warn!(route = %self.step.route(), target = %route, "Navigation to unknown route");
        Err(RuntimeError::UnknownRoute(route.to_string()))
    }

    fn navigate(&mut self, intent: &NavigationIntent) -> Result<&StepRuntime, RuntimeError> {
        self.ensure_registered(&intent.target_path)?;
        self.navigator.push(intent);
        self.step = mount(&self.registry, &self.store, &self.navigator)?;
        Ok(&self.step)
    }
}

fn mount<S: AnswerStore, N: Navigator>(
    registry: &StepRegistry,
    store: &S,
    navigator: &N,
) -> Result<StepRuntime, RuntimeError> {
    let entry = navigator
        .current()
        .ok_or_else(|| RuntimeError::UnknownRoute(String::new()))?;
    let descriptor = registry
        .get(&entry.route)
        .ok_or_else(|| RuntimeError::UnknownRoute(entry.route.clone()))?;
    Ok(StepRuntime::mount(
        descriptor.clone(),
        store,
        entry.back_override.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;
    use crate::wizard::navigator::HistoryNavigator;
    use crate::wizard::registry::{StepDescriptor, ViewKind};
    use crate::wizard::validation::{FieldSpec, StepSchema};

    fn two_step_registry() -> Arc<StepRegistry> {
        let schema = || StepSchema::new(vec![FieldSpec::choice("age", "Age", &["18-30", "30-45"])]);
        Arc::new(
            StepRegistry::new(vec![
                StepDescriptor::new("/t", "/s1", ViewKind::Question, "S1")
                    .with_next("/t/s2")
                    .with_schema(schema()),
                StepDescriptor::new("/t", "/s2", ViewKind::Question, "S2")
                    .with_previous("/t/s1")
                    .with_next("/t/s3")
                    .with_schema(schema()),
                StepDescriptor::new("/t", "/s3", ViewKind::ThankYou, "S3").with_previous("/t/s2"),
            ])
            .unwrap(),
        )
    }

    fn open() -> WizardSession<MemoryStore, HistoryNavigator> {
        WizardSession::open(
            two_step_registry(),
            MemoryStore::new(),
            HistoryNavigator::new(),
            "/t/s1",
        )
        .unwrap()
    }

    #[test]
    fn open_rejects_unknown_entry() {
        let err = WizardSession::open(
            two_step_registry(),
            MemoryStore::new(),
            HistoryNavigator::new(),
            "/t/nope",
        )
        .err()
        .unwrap();
        assert!(matches!(err, RuntimeError::UnknownRoute(r) if r == "/t/nope"));
    }

    #[test]
    fn submit_then_back_round_trips_answer() {
        let mut session = open();
        session.edit("age", json!("30-45"));
        assert_eq!(session.submit().unwrap().route(), "/t/s2");
        assert_eq!(session.store().read("S1"), Some(json!({"age": "30-45"})));

        let before = session.store().record().clone();
        let step = session.back().unwrap();
        assert_eq!(step.route(), "/t/s1");
        assert_eq!(step.value("age"), Some(&json!("30-45")));
        assert_eq!(session.store().record(), &before);
    }

    #[test]
    fn history_back_at_entry_reports_no_history() {
        let mut session = open();
        let err = session.back().err().unwrap();
        assert!(matches!(err, RuntimeError::NoHistory { route } if route == "/t/s1"));
        assert!(session.current().is_active());
    }

    #[test]
    fn invalid_submit_keeps_step_mounted() {
        let mut session = open();
        assert!(matches!(session.submit(), Err(RuntimeError::Invalid { .. })));
        assert_eq!(session.route(), "/t/s1");
        assert!(session.current().is_active());
    }

    #[test]
    fn terminal_step_completes_and_summarises() {
        let mut session = open();
        session.edit("age", json!("18-30"));
        session.submit().unwrap();
        session.edit("age", json!("30-45"));
        session.submit().unwrap();
        assert!(session.is_complete());

        let summary = session.summary();
        assert_eq!(summary.session_id, session.id());
        assert_eq!(summary.answers.len(), 2);
        assert_eq!(summary.answers["S2"], json!({"age": "30-45"}));
    }

    #[test]
    fn back_pops_instead_of_growing_history() {
        let mut session = open();
        session.edit("age", json!("18-30"));
        session.submit().unwrap();
        assert_eq!(session.navigator().len(), 2);

        session.back().unwrap();
        assert_eq!(session.route(), "/t/s1");
        assert_eq!(session.navigator().len(), 1);
    }

    #[test]
    fn dangling_next_leaves_step_mounted_and_store_untouched() {
        let registry = Arc::new(StepRegistry::from_trusted(vec![
            StepDescriptor::new("/t", "/s1", ViewKind::Question, "S1")
                .with_next("/t/missing")
                .with_schema(StepSchema::new(vec![FieldSpec::choice("age", "Age", &["18-30"])])),
        ]));
        let mut session =
            WizardSession::open(registry, MemoryStore::new(), HistoryNavigator::new(), "/t/s1")
                .unwrap();
        session.edit("age", json!("18-30"));

        let err = session.submit().err().unwrap();
        assert!(matches!(err, RuntimeError::UnknownRoute(r) if r == "/t/missing"));
        assert!(session.current().is_active());
        assert!(session.store().record().is_empty());

        // Still interactive: the user can keep editing.
        session.edit("age", Value::Null);
        assert!(!session.current().can_submit());
    }

    #[test]
    fn reset_clears_store_and_returns_to_entry() {
        let mut session = open();
        session.edit("age", json!("18-30"));
        session.submit().unwrap();
        let step = session.reset().unwrap();
        assert_eq!(step.route(), "/t/s1");
        assert!(step.form().is_empty());
        assert!(session.store().record().is_empty());
    }
}
