use crate::generation::GenerationService;
use crate::state_machine::{StateSnapshot, SurveyCommand, SurveyStateMachine};
use crate::structured_logger::StructuredLogger;
use crate::tui::{self, Event, EventHandler, GenerationJob, SurveyApp};
use anyhow::{Context, Result};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

type SurveyTerminal = Terminal<CrosstermBackend<Stdout>>;

pub fn restore_terminal(terminal: &mut SurveyTerminal) -> Result<()> {
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::event::DisableBracketedPaste,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn setup_terminal() -> Result<SurveyTerminal> {
    crossterm::terminal::enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = std::io::stdout();
    crossterm::execute!(
        stdout,
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableBracketedPaste
    )?;

    // Restore the terminal before the panic message is printed
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = crossterm::terminal::disable_raw_mode();
        let _ = crossterm::execute!(
            std::io::stdout(),
            crossterm::terminal::LeaveAlternateScreen,
            crossterm::event::DisableBracketedPaste,
            crossterm::cursor::Show
        );
        original_hook(panic_info);
    }));

    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

/// Runs a generation job off the UI loop and reports back as an event.
fn spawn_generation(
    job: GenerationJob,
    service: Arc<GenerationService>,
    tx: mpsc::UnboundedSender<Event>,
) {
    tokio::spawn(async move {
        let started = Instant::now();
        let mut result = service.generate_pair(job.request).await;
        if let Ok(pair) = result.as_mut() {
            if let Err(e) = service.save_pair(&job.session_id, &job.question_key, pair) {
                tracing::warn!(error = %e, "Could not save generated images");
            }
        }
        // Receiver dropped means the TUI is shutting down
        let _ = tx.send(Event::GenerationFinished {
            ticket: job.ticket,
            result,
            elapsed: started.elapsed(),
        });
    });
}

async fn event_loop(
    terminal: &mut SurveyTerminal,
    app: &mut SurveyApp,
    service: Arc<GenerationService>,
) -> Result<()> {
    let mut events = EventHandler::new(Duration::from_millis(100));
    let tx = events.sender();

    while !app.should_quit {
        terminal.draw(|frame| tui::ui::draw(frame, app))?;

        match events.next().await? {
            Event::Key(key) => {
                if let Some(job) = tui::handle_key(app, key) {
                    tracing::debug!(
                        ticket = job.ticket,
                        question = %job.question_key,
                        "Starting generation"
                    );
                    spawn_generation(job, service.clone(), tx.clone());
                }
            }
            Event::Paste(text) => app.paste(&text),
            Event::Tick => app.tick(),
            Event::Resize => {}
            Event::GenerationFinished {
                ticket,
                result,
                elapsed,
            } => app.finish_generation(ticket, result, elapsed),
        }
    }
    Ok(())
}

/// Runs the interactive survey until the respondent quits.
///
/// Returns the final snapshot so the caller can print the answers.
pub async fn run_tui(
    machine: SurveyStateMachine,
    snapshot_rx: watch::Receiver<StateSnapshot>,
    logger: Arc<StructuredLogger>,
    service: Arc<GenerationService>,
    role: Option<&str>,
    show_debug: bool,
) -> Result<StateSnapshot> {
    let mut app = SurveyApp::new(machine, snapshot_rx, logger, show_debug);
    if let Some(role) = role {
        app.apply(SurveyCommand::SelectRole {
            role_id: role.to_string(),
        });
    }

    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, &mut app, service).await;
    restore_terminal(&mut terminal)?;
    result?;

    Ok(app.snapshot())
}
