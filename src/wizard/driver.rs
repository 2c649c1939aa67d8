//! Event loop connecting a `WizardSession` to a `StepView`.

use tracing::{debug, info};

use crate::channels::{StepView, ViewEvent};
use crate::error::{Error, RuntimeError};
use crate::store::AnswerStore;

use super::navigator::Navigator;
use super::session::{SubmissionSummary, WizardSession};

/// How a run ended.
#[derive(Debug, Clone)]
pub enum Outcome {
    Completed(SubmissionSummary),
    Abandoned,
}

/// Feed view events into the session until the terminal step is reached
/// or the user quits.
///
/// Blocked submissions and dead-end backs are reported through the view
/// and the loop carries on; anything else is a configuration fault and
/// ends the run.
pub async fn run<S, N, V>(session: &mut WizardSession<S, N>, view: &V) -> Result<Outcome, Error>
where
    S: AnswerStore,
    N: Navigator,
    V: StepView + ?Sized,
{
    loop {
        if session.is_complete() {
            let summary = session.summary();
            info!(session_id = %summary.session_id, answers = summary.answers.len(), "Survey completed");
            view.complete(&summary).await?;
            return Ok(Outcome::Completed(summary));
        }

        let event = view.render(session.current()).await?;
        debug!(route = %session.route(), event = ?event, "View event");

        let result = match event {
            ViewEvent::Edit { field, value } => {
                session.edit(&field, value);
                Ok(())
            }
            ViewEvent::Submit => session.submit().map(|_| ()),
            ViewEvent::Back => session.back().map(|_| ()),
            ViewEvent::Detour(name) => session.detour(&name).map(|_| ()),
            ViewEvent::Reset => session.reset().map(|_| ()),
            ViewEvent::Quit => {
                info!(session_id = %session.id(), route = %session.route(), "Survey abandoned");
                return Ok(Outcome::Abandoned);
            }
        };

        match result {
            Ok(()) => {}
            Err(RuntimeError::Invalid { validation, .. }) => {
                let message = validation
                    .field_errors
                    .iter()
                    .map(|(field, message)| format!("{field}: {message}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                view.notice(&message).await?;
            }
            Err(e @ (RuntimeError::NoHistory { .. } | RuntimeError::UnknownDetour { .. })) => {
                view.notice(&e.to_string()).await?;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
