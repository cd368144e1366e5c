use super::*;
use crate::catalog::Catalog;
use crate::config::SurveyConfig;
use crate::generation::GeneratedPair;
use crate::state_machine::SurveyStateMachine;
use crate::structured_logger::StructuredLogger;
use ratatui::{backend::TestBackend, Terminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn create_app(pad_to: Option<usize>) -> (SurveyApp, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = Arc::new(
        StructuredLogger::new("ui-test", &temp_dir.path().join("logs"))
            .expect("Failed to create logger"),
    );
    let config = SurveyConfig::default_config().expect("embedded config should be valid");
    let catalog = Catalog::new(config.catalog)
        .expect("catalog should validate")
        .with_pad_to(pad_to);
    let (machine, snapshot_rx) = SurveyStateMachine::new(Arc::new(catalog), logger.clone());
    (SurveyApp::new(machine, snapshot_rx, logger, false), temp_dir)
}

/// Renders the app and returns the screen as one string per row.
fn render(app: &SurveyApp) -> Vec<String> {
    let backend = TestBackend::new(100, 32);
    let mut terminal = Terminal::new(backend).expect("terminal");
    terminal.draw(|frame| draw(frame, app)).expect("draw");

    let buffer = terminal.backend().buffer();
    buffer
        .content()
        .chunks(buffer.area.width as usize)
        .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
        .collect()
}

fn screen_contains(lines: &[String], needle: &str) -> bool {
    lines.iter().any(|line| line.contains(needle))
}

fn image(backend: &str, saved_to: Option<PathBuf>) -> GeneratedImage {
    GeneratedImage {
        bytes: vec![0; 3000],
        width: 64,
        height: 48,
        backend: backend.to_string(),
        saved_to,
    }
}

#[test]
fn test_role_selection_lists_every_role() {
    let (app, _dir) = create_app(Some(10));
    let lines = render(&app);

    assert!(screen_contains(&lines, "Choose your role"));
    assert!(screen_contains(&lines, "> 1. AI explorer"));
    assert!(screen_contains(&lines, "2. Designer / creator"));
    assert!(screen_contains(&lines, "3. AIGC power user"));
}

#[test]
fn test_header_shows_question_position() {
    let (mut app, _dir) = create_app(Some(10));
    app.role_cursor = 1;
    app.select_role();

    let lines = render(&app);
    assert!(screen_contains(&lines, "Question 1 of 10"));
    assert!(screen_contains(&lines, "Designer / creator"));
    assert!(screen_contains(&lines, "Image A: soft grey studio light"));
    assert!(screen_contains(&lines, "No difference"));
}

#[test]
fn test_choice_question_marks_selection() {
    let (mut app, _dir) = create_app(None);
    app.select_role();
    let question = app.snapshot().current_question.expect("question");
    let draft = app.draft.as_mut().expect("draft");
    draft.move_cursor(&question, 1);
    draft.select_cursor(&question);

    let lines = render(&app);
    assert!(screen_contains(&lines, "> (*) Virtual try-on"));
    assert!(screen_contains(&lines, "( ) Turn photos into anime"));
}

#[test]
fn test_scale_question_highlights_value() {
    let (mut app, _dir) = create_app(Some(10));
    app.role_cursor = 1;
    app.select_role();
    // Jump straight to the padded satisfaction question by answering the rest
    while app
        .snapshot()
        .current_question
        .is_some_and(|q| !q.key.starts_with("satisfaction"))
    {
        let snapshot = app.snapshot();
        let question = snapshot.current_question.clone().expect("question");
        if question.is_generative() {
            app.paste("poster");
            let job = app.begin_generation().expect("job");
            app.finish_generation(
                job.ticket,
                Ok(GeneratedPair {
                    first: image("first", None),
                    second: image("second", None),
                }),
                Duration::from_millis(1),
            );
        }
        let draft = app.draft.as_mut().expect("draft");
        draft.select_cursor(&question);
        draft.set_judgment(crate::answer::Judgment::FirstBetter);
        app.confirm();
    }

    let lines = render(&app);
    assert!(screen_contains(&lines, "[5]"));
    assert!(screen_contains(&lines, "Selected: 5"));
    assert!(screen_contains(&lines, "Question 6 of 10"));
}

#[test]
fn test_generation_states_render() {
    let (mut app, _dir) = create_app(None);
    app.select_role();
    app.draft
        .as_mut()
        .expect("draft")
        .set_judgment(crate::answer::Judgment::FirstBetter);
    let question = app.snapshot().current_question.expect("question");
    app.draft.as_mut().expect("draft").select_cursor(&question);
    app.confirm();

    let lines = render(&app);
    assert!(screen_contains(&lines, "Press Enter in the prompt field"));
    assert!(screen_contains(&lines, "Reference image path"));

    app.paste("a cat in a teacup");
    let job = app.begin_generation().expect("job");
    let lines = render(&app);
    assert!(screen_contains(&lines, "Generating images..."));
    assert!(screen_contains(&lines, "a cat in a teacup"));

    app.finish_generation(
        job.ticket,
        Ok(GeneratedPair {
            first: image("brighten", Some(PathBuf::from("/tmp/out/a.png"))),
            second: image("blur", None),
        }),
        Duration::from_millis(3),
    );
    let lines = render(&app);
    assert!(screen_contains(&lines, "64x48 from brighten"));
    assert!(screen_contains(&lines, "64x48 from blur"));
    assert!(screen_contains(&lines, "3 KiB PNG"));
    assert!(screen_contains(&lines, "/tmp/out/a.png"));
}

#[test]
fn test_generation_failure_renders_error() {
    let (mut app, _dir) = create_app(None);
    app.role_cursor = 2;
    app.select_role();
    for _ in 0..2 {
        app.draft
            .as_mut()
            .expect("draft")
            .set_judgment(crate::answer::Judgment::SecondBetter);
        app.confirm();
    }
    app.paste("stress");
    let job = app.begin_generation().expect("job");
    app.finish_generation(
        job.ticket,
        Err(crate::errors::GenerationError::Timeout { seconds: 30 }),
        Duration::from_secs(30),
    );

    let lines = render(&app);
    assert!(screen_contains(&lines, "Generation failed: generation timed out after 30s"));
    // Expert questions never take a reference image
    assert!(!screen_contains(&lines, "Reference image path"));
}

#[test]
fn test_notice_is_shown_in_footer() {
    let (mut app, _dir) = create_app(None);
    app.select_role();
    app.confirm();

    let lines = render(&app);
    assert!(screen_contains(&lines, "please pick one of the options"));
}

#[test]
fn test_back_hint_only_after_first_question() {
    let (mut app, _dir) = create_app(None);
    app.select_role();

    let lines = render(&app);
    assert!(screen_contains(&lines, "Up/Down choose  Enter next  Esc quit"));
    assert!(!screen_contains(&lines, "Ctrl-B back"));

    let question = app.snapshot().current_question.expect("question");
    app.draft.as_mut().expect("draft").select_cursor(&question);
    app.confirm();
    assert_eq!(app.snapshot().step_index, 2);

    let lines = render(&app);
    assert!(screen_contains(&lines, "Ctrl-B back"));
}

#[test]
fn test_write_in_field_appears_when_picked() {
    let (mut app, _dir) = create_app(None);
    app.select_role();
    assert!(!screen_contains(&render(&app), "Tell us more"));

    let question = app.snapshot().current_question.expect("question");
    let draft = app.draft.as_mut().expect("draft");
    draft.move_cursor(&question, 5);
    draft.select_cursor(&question);
    draft.insert_str("comics");

    let lines = render(&app);
    assert!(screen_contains(&lines, "(*) Something else"));
    assert!(screen_contains(&lines, "Tell us more (optional)"));
    assert!(screen_contains(&lines, "comics"));
}

#[test]
fn test_completion_screen() {
    let (mut app, _dir) = create_app(None);
    app.role_cursor = 1;
    app.select_role();
    while app.snapshot().phase == Phase::Asking {
        let question = app.snapshot().current_question.expect("question");
        if question.is_generative() {
            app.paste("poster");
            let job = app.begin_generation().expect("job");
            app.finish_generation(
                job.ticket,
                Ok(GeneratedPair {
                    first: image("first", None),
                    second: image("second", None),
                }),
                Duration::from_millis(1),
            );
        }
        let draft = app.draft.as_mut().expect("draft");
        draft.select_cursor(&question);
        draft.set_judgment(crate::answer::Judgment::FirstBetter);
        app.confirm();
    }

    let lines = render(&app);
    assert!(screen_contains(&lines, "Thank you for taking the survey!"));
    assert!(screen_contains(&lines, "Designer / creator role"));
    assert!(screen_contains(&lines, "Answered 5 of 5 questions."));
    assert!(screen_contains(&lines, "Press r to start over or q to quit."));
}

#[test]
fn test_debug_panel_lists_answers() {
    let (mut app, _dir) = create_app(None);
    app.show_debug = true;
    app.role_cursor = 1;
    app.select_role();
    app.draft
        .as_mut()
        .expect("draft")
        .set_judgment(crate::answer::Judgment::NoDifference);
    app.confirm();

    let lines = render(&app);
    assert!(screen_contains(&lines, "Answers (F2)"));
    assert!(screen_contains(&lines, "\"ab_anatomy\": \"no-difference\""));
}

#[test]
fn test_truncate_to_width() {
    assert_eq!(truncate_to_width("short", 10), "short");
    assert_eq!(truncate_to_width("a much longer caption", 10), "a much ...");
    assert_eq!(truncate_to_width("画像画像画像", 8), "画像...");
}
