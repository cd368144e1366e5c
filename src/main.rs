mod answer;
mod app;
mod catalog;
mod config;
mod errors;
mod generation;
mod renderer;
mod state;
mod state_machine;
mod structured_logger;
mod survey_paths;
mod tui;

use anyhow::{Context, Result};
use app::{Cli, HeadlessRunner, SurveyScript};
use catalog::Catalog;
use clap::Parser;
use config::SurveyConfig;
use generation::GenerationService;
use state_machine::SurveyStateMachine;
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use structured_logger::StructuredLogger;
use tracing_subscriber::EnvFilter;

const LOG_FILTER_ENV: &str = "SURVEY_LOG";

/// Sends tracing output to `~/.modelx-survey/logs/survey.log`; the terminal
/// belongs to the survey screen.
fn init_tracing() -> Result<()> {
    let path = survey_paths::tracing_log_path()?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;

    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new("modelx_survey=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("[survey] Warning: logging disabled: {:#}", e);
    }

    let config = SurveyConfig::resolve(cli.config.as_deref())?;
    let mut catalog = Catalog::new(config.catalog)?;
    if cli.no_pad {
        catalog = catalog.with_pad_to(None);
    }
    let catalog = Arc::new(catalog);

    if let Some(role) = &cli.print_catalog {
        println!("{}", app::catalog_json(&catalog, role)?);
        return Ok(());
    }

    let service = Arc::new(GenerationService::from_config(&config.generation));

    let log_id = uuid::Uuid::new_v4().to_string();
    let logger = Arc::new(
        StructuredLogger::new(&log_id, &survey_paths::run_logs_dir(&log_id)?)
            .context("Failed to create structured logger")?,
    );
    let pad_to = catalog.pad_to();

    let (machine, snapshot_rx) = SurveyStateMachine::new(catalog, logger.clone());
    tracing::info!(
        %log_id,
        session_id = %snapshot_rx.borrow().session_id,
        log = %logger.path().display(),
        ?pad_to,
        "Survey starting"
    );

    if let Some(path) = &cli.script {
        let script = SurveyScript::load(path)?;
        let report = HeadlessRunner::new(machine, snapshot_rx, &service)
            .run(&script, cli.role.as_deref())
            .await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let snapshot = app::run_tui(
        machine,
        snapshot_rx,
        logger,
        service,
        cli.role.as_deref(),
        cli.debug,
    )
    .await?;

    if cli.dump_answers {
        println!("{}", serde_json::to_string_pretty(&snapshot.answers_by_key)?);
    }
    Ok(())
}
