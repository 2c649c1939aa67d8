//! View renderer abstraction.
//!
//! A view shows the mounted step and answers with exactly one event. It owns
//! field rendering and message display; the flow decisions stay in the
//! wizard session.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ViewError;
use crate::wizard::{StepRuntime, SubmissionSummary};

/// What the user did on the mounted step.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// Set a field (`Null` clears it).
    Edit { field: String, value: Value },
    Submit,
    Back,
    /// Take a named alternate route, e.g. manual upload.
    Detour(String),
    /// Clear every answer and start over.
    Reset,
    Quit,
}

#[async_trait]
pub trait StepView: Send + Sync {
    /// Render the step and wait for the next user event.
    async fn render(&self, step: &StepRuntime) -> Result<ViewEvent, ViewError>;

    /// Show a transient message (e.g. why the forward action is blocked).
    async fn notice(&self, message: &str) -> Result<(), ViewError>;

    /// Show the end-of-survey screen.
    async fn complete(&self, summary: &SubmissionSummary) -> Result<(), ViewError>;
}
