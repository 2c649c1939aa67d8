//! View renderers for the wizard.

pub mod cli;
pub mod view;

pub use cli::CliView;
pub use view::{StepView, ViewEvent};
