use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use cough_survey::channels::CliView;
use cough_survey::config::WizardConfig;
use cough_survey::store::FileStore;
use cough_survey::wizard::steps::{checked_survey_registry, country_of};
use cough_survey::wizard::{self, HistoryNavigator, Outcome, WizardSession};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WizardConfig::from_env()?;

    // Keep the guard alive so buffered log lines are flushed on exit.
    let _guard = init_tracing(&config);

    let registry = Arc::new(checked_survey_registry(&config.namespace)?);
    let entry_route = match &config.start_route {
        Some(route) => route.clone(),
        None => registry
            .entry_route()
            .context("survey registry has no entry step")?,
    };

    eprintln!("📋 Cough survey v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Store: {}", config.store_path.display());
    eprintln!("   Namespace: {}", config.namespace);
    eprintln!("   Steps: {}", registry.len());
    eprintln!("   Type `help` for commands, `quit` to leave.\n");

    let store = FileStore::open_with_ttl(&config.store_path, config.store_ttl);
    let mut session = WizardSession::open(
        Arc::clone(&registry),
        store,
        HistoryNavigator::new(),
        &entry_route,
    )
    .with_context(|| format!("failed to open survey at {entry_route}"))?;

    match wizard::run(&mut session, &CliView::new()).await? {
        Outcome::Completed(summary) => {
            if let Some(country) = country_of(&summary.answers, &config.namespace) {
                eprintln!("   Submitted from {country}");
            }
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Outcome::Abandoned => {
            eprintln!("Progress saved to {}.", config.store_path.display());
        }
    }

    Ok(())
}

fn init_tracing(config: &WizardConfig) -> Option<WorkerGuard> {
    let filter = |default: &str| {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "cough-survey.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter("info"))
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        None => {
            // stdout carries the survey itself.
            tracing_subscriber::fmt()
                .with_env_filter(filter("warn"))
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}
