pub mod theme;

use crate::answer::Judgment;
use crate::catalog::{Question, QuestionKind, Role};
use crate::generation::GeneratedImage;
use crate::renderer::{GenerateFocus, QuestionDraft};
use crate::state::{GenerationState, Phase};
use crate::state_machine::StateSnapshot;
use crate::tui::app::{NoticeKind, SurveyApp};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Frame,
};
use theme::Theme;
use unicode_width::UnicodeWidthStr;

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

pub fn draw(frame: &mut Frame, app: &SurveyApp) {
    let snapshot = app.snapshot();
    let theme = Theme::for_phase(snapshot.phase);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(2),
        ])
        .split(frame.area());

    draw_header(frame, app, &snapshot, &theme, chunks[0]);

    let body = if app.show_debug {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(chunks[1]);
        draw_debug_panel(frame, &snapshot, &theme, columns[1]);
        columns[0]
    } else {
        chunks[1]
    };

    match snapshot.phase {
        Phase::RoleSelection => draw_role_selection(frame, app, &theme, body),
        Phase::Asking => draw_question(frame, app, &snapshot, &theme, body),
        Phase::Complete => draw_completion(frame, app, &snapshot, &theme, body),
    }

    draw_footer(frame, app, &snapshot, &theme, chunks[2]);
}

fn role_label(app: &SurveyApp, role: Role) -> String {
    app.catalog()
        .role_entry(role)
        .map(|entry| entry.label.clone())
        .unwrap_or_else(|| role.to_string())
}

fn draw_header(
    frame: &mut Frame,
    app: &SurveyApp,
    snapshot: &StateSnapshot,
    theme: &Theme,
    area: Rect,
) {
    let title = match snapshot.role {
        Some(role) => format!(" Model X survey | {} ", role_label(app, role)),
        None => " Model X survey ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(theme.border))
        .style(Style::default().bg(theme.header_bg));

    let label = match snapshot.phase {
        Phase::RoleSelection => "Choose your role".to_string(),
        Phase::Asking => format!(
            "Question {} of {}",
            snapshot.step_index, snapshot.total_questions
        ),
        Phase::Complete => "All done".to_string(),
    };

    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(theme.accent))
        .ratio(snapshot.progress().clamp(0.0, 1.0))
        .label(label);
    frame.render_widget(gauge, area);
}

fn draw_role_selection(frame: &mut Frame, app: &SurveyApp, theme: &Theme, area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled(
            "Which of these describes you best?",
            Style::default().fg(theme.text).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    for (i, role) in Role::ALL.iter().enumerate() {
        let selected = i == app.role_cursor;
        let marker = if selected { "> " } else { "  " };
        let style = if selected {
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.text)
        };
        lines.push(Line::from(Span::styled(
            format!("{}{}. {}", marker, i + 1, role_label(app, *role)),
            style,
        )));
        if let Some(entry) = app.catalog().role_entry(*role) {
            if !entry.description.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("     {}", entry.description),
                    Style::default().fg(theme.muted),
                )));
            }
        }
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Welcome ")
        .border_style(Style::default().fg(theme.border));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn draw_question(
    frame: &mut Frame,
    app: &SurveyApp,
    snapshot: &StateSnapshot,
    theme: &Theme,
    area: Rect,
) {
    let (Some(question), Some(draft)) = (&snapshot.current_question, &app.draft) else {
        return;
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", question.key))
        .border_style(Style::default().fg(theme.border));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut title = vec![Span::styled(
        question.title.clone(),
        Style::default().fg(theme.text).add_modifier(Modifier::BOLD),
    )];
    if question.optional {
        title.push(Span::styled(" (optional)", Style::default().fg(theme.muted)));
    }
    let mut heading = vec![Line::from(title)];
    if !question.description.is_empty() {
        heading.push(Line::from(Span::styled(
            question.description.clone(),
            Style::default().fg(theme.muted),
        )));
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(inner);
    frame.render_widget(
        Paragraph::new(heading).wrap(Wrap { trim: true }),
        rows[0],
    );

    match (&question.kind, draft) {
        (QuestionKind::FreeText { multiline }, QuestionDraft::FreeText { text }) => {
            let height = if *multiline { 8 } else { 3 };
            let field = Rect {
                height: rows[1].height.min(height),
                ..rows[1]
            };
            draw_text_field(frame, " Your answer ", text, true, theme, field);
        }
        (
            QuestionKind::SingleChoice { options, .. },
            QuestionDraft::SingleChoice {
                cursor,
                selected,
                write_in,
            },
        ) => {
            let labels: Vec<&str> = options.iter().map(String::as_str).collect();
            let lines = option_lines(&labels, *cursor, *selected, true, theme);
            let Some(text) = write_in else {
                frame.render_widget(Paragraph::new(lines), rows[1]);
                return;
            };
            let list_height = (lines.len() as u16).min(rows[1].height);
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(list_height), Constraint::Length(3)])
                .split(rows[1]);
            frame.render_widget(Paragraph::new(lines), parts[0]);
            let focused = draft.accepts_text();
            draw_text_field(frame, " Tell us more (optional) ", text, focused, theme, parts[1]);
        }
        (QuestionKind::Scale { min, max, .. }, QuestionDraft::Scale { value }) => {
            frame.render_widget(Paragraph::new(scale_lines(*min, *max, *value, theme)), rows[1]);
        }
        (
            QuestionKind::StaticImageCompare { first, second },
            QuestionDraft::StaticCompare { cursor, judgment },
        ) => {
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(5), Constraint::Min(0)])
                .split(rows[1]);
            draw_image_pair(
                frame,
                [
                    ("Image A", vec![first.clone()]),
                    ("Image B", vec![second.clone()]),
                ],
                theme,
                parts[0],
            );
            frame.render_widget(
                Paragraph::new(judgment_lines(*cursor, *judgment, true, theme)),
                parts[1],
            );
        }
        (
            QuestionKind::GenerateAndCompare { allow_reference },
            QuestionDraft::GenerateCompare {
                prompt,
                reference_path,
                focus,
                cursor,
                judgment,
            },
        ) => {
            let mut constraints = vec![Constraint::Length(3)];
            if *allow_reference {
                constraints.push(Constraint::Length(3));
            }
            constraints.extend([Constraint::Length(6), Constraint::Min(0)]);
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints(constraints)
                .split(rows[1]);

            let mut next = 0;
            draw_text_field(
                frame,
                " Prompt ",
                prompt,
                *focus == GenerateFocus::Prompt,
                theme,
                parts[next],
            );
            next += 1;
            if *allow_reference {
                draw_text_field(
                    frame,
                    " Reference image path (optional) ",
                    reference_path,
                    *focus == GenerateFocus::Reference,
                    theme,
                    parts[next],
                );
                next += 1;
            }
            draw_generation(frame, app, &snapshot.generation, theme, parts[next]);
            frame.render_widget(
                Paragraph::new(judgment_lines(
                    *cursor,
                    *judgment,
                    *focus == GenerateFocus::Judgment,
                    theme,
                )),
                parts[next + 1],
            );
        }
        _ => {}
    }
}

fn draw_text_field(
    frame: &mut Frame,
    title: &str,
    text: &str,
    focused: bool,
    theme: &Theme,
    area: Rect,
) {
    let border = if focused { theme.border_focused } else { theme.border };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title.to_string())
        .border_style(Style::default().fg(border));
    let mut lines: Vec<Line> = text.split('\n').map(|l| Line::from(l.to_string())).collect();
    if focused {
        if let Some(last) = lines.last_mut() {
            last.spans.push(Span::styled("_", Style::default().fg(theme.accent)));
        }
    }
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn option_lines<'a>(
    labels: &[&str],
    cursor: usize,
    selected: Option<usize>,
    focused: bool,
    theme: &Theme,
) -> Vec<Line<'a>> {
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let pointer = if focused && i == cursor { ">" } else { " " };
            let mark = if selected == Some(i) { "(*)" } else { "( )" };
            let style = if focused && i == cursor {
                Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
            } else if selected == Some(i) {
                Style::default().fg(theme.text)
            } else {
                Style::default().fg(theme.muted)
            };
            Line::from(Span::styled(format!("{} {} {}", pointer, mark, label), style))
        })
        .collect()
}

fn judgment_lines<'a>(
    cursor: usize,
    judgment: Option<Judgment>,
    focused: bool,
    theme: &Theme,
) -> Vec<Line<'a>> {
    let labels: Vec<&str> = Judgment::ALL.iter().map(Judgment::label).collect();
    let selected = judgment.and_then(|j| Judgment::ALL.iter().position(|a| *a == j));
    option_lines(&labels, cursor, selected, focused, theme)
}

fn scale_lines<'a>(min: i32, max: i32, value: i32, theme: &Theme) -> Vec<Line<'a>> {
    let cells: Vec<Span> = (min..=max)
        .map(|n| {
            if n == value {
                Span::styled(
                    format!("[{}]", n),
                    Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
                )
            } else {
                Span::styled(format!(" {} ", n), Style::default().fg(theme.muted))
            }
        })
        .collect();
    vec![
        Line::from(cells),
        Line::from(""),
        Line::from(Span::styled(
            format!("Selected: {}  (left/right to change)", value),
            Style::default().fg(theme.text),
        )),
    ]
}

/// Truncates to a display width, appending `...` when shortened.
fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    for c in text.chars() {
        let next = format!("{}{}", out, c);
        if next.width() + 3 > width {
            break;
        }
        out = next;
    }
    out.push_str("...");
    out
}

fn draw_image_pair(frame: &mut Frame, panels: [(&str, Vec<String>); 2], theme: &Theme, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    for ((title, lines), column) in panels.into_iter().zip(columns.iter()) {
        let width = column.width.saturating_sub(2) as usize;
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", title))
            .border_style(Style::default().fg(theme.border));
        let lines: Vec<Line> = lines
            .iter()
            .map(|l| Line::from(truncate_to_width(l, width)))
            .collect();
        frame.render_widget(
            Paragraph::new(lines)
                .block(block)
                .alignment(Alignment::Center),
            *column,
        );
    }
}

fn image_summary(image: &GeneratedImage) -> Vec<String> {
    let mut lines = vec![
        format!("{}x{} from {}", image.width, image.height, image.backend),
        format!("{} KiB PNG", image.bytes.len().div_ceil(1024)),
    ];
    if let Some(path) = &image.saved_to {
        lines.push(path.display().to_string());
    }
    lines
}

fn draw_generation(
    frame: &mut Frame,
    app: &SurveyApp,
    generation: &GenerationState,
    theme: &Theme,
    area: Rect,
) {
    match generation {
        GenerationState::Idle => {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    "Press Enter in the prompt field to generate two images.",
                    Style::default().fg(theme.muted),
                )),
                area,
            );
        }
        GenerationState::Pending { .. } => {
            let spinner = SPINNER[app.spinner_frame % SPINNER.len()];
            frame.render_widget(
                Paragraph::new(Span::styled(
                    format!("{} Generating images...", spinner),
                    Style::default().fg(theme.accent),
                )),
                area,
            );
        }
        GenerationState::Ready { pair, .. } => {
            draw_image_pair(
                frame,
                [
                    ("Image A", image_summary(&pair.first)),
                    ("Image B", image_summary(&pair.second)),
                ],
                theme,
                area,
            );
        }
        GenerationState::Failed { error, .. } => {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    format!("Generation failed: {}", error),
                    Style::default().fg(theme.error),
                ))
                .wrap(Wrap { trim: true }),
                area,
            );
        }
    }
}

fn draw_completion(
    frame: &mut Frame,
    app: &SurveyApp,
    snapshot: &StateSnapshot,
    theme: &Theme,
    area: Rect,
) {
    let role = snapshot
        .role
        .map(|role| role_label(app, role))
        .unwrap_or_else(|| "unknown".to_string());
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Thank you for taking the survey!",
            Style::default().fg(theme.success).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!("Your answers were filed under the {} role.", role)),
        Line::from(format!(
            "Answered {} of {} questions.",
            snapshot.answers.len(),
            snapshot.total_questions
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Press r to start over or q to quit.",
            Style::default().fg(theme.muted),
        )),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Complete ")
        .border_style(Style::default().fg(theme.border));
    frame.render_widget(
        Paragraph::new(lines)
            .block(block)
            .alignment(Alignment::Center),
        area,
    );
}

fn draw_debug_panel(frame: &mut Frame, snapshot: &StateSnapshot, theme: &Theme, area: Rect) {
    let answers = serde_json::to_string_pretty(&snapshot.answers_by_key)
        .unwrap_or_else(|e| format!("<unprintable: {}>", e));
    let mut lines = vec![Line::from(Span::styled(
        format!("step {} / {}", snapshot.step_index, snapshot.total_questions + 1),
        Style::default().fg(theme.muted),
    ))];
    lines.extend(answers.lines().map(|l| Line::from(l.to_string())));

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Answers (F2) ")
        .border_style(Style::default().fg(theme.border));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

/// The back hint only shows where a retreat is possible.
fn footer_hint(snapshot: &StateSnapshot, question: Option<&Question>) -> String {
    match snapshot.phase {
        Phase::RoleSelection => "Up/Down choose  Enter confirm  Esc quit".to_string(),
        Phase::Complete => "r restart  q quit  F2 answers".to_string(),
        Phase::Asking => {
            let keys = match question.map(|q| &q.kind) {
                Some(QuestionKind::FreeText { multiline: true }) => {
                    "Enter next  Alt+Enter new line"
                }
                Some(QuestionKind::GenerateAndCompare { .. }) => {
                    "Tab switch field  Enter generate/confirm"
                }
                Some(QuestionKind::Scale { .. }) => "Left/Right change  Enter next",
                _ => "Up/Down choose  Enter next",
            };
            let back = if snapshot.can_retreat() {
                "  Ctrl-B back"
            } else {
                ""
            };
            format!("{keys}{back}  Esc quit")
        }
    }
}

fn draw_footer(
    frame: &mut Frame,
    app: &SurveyApp,
    snapshot: &StateSnapshot,
    theme: &Theme,
    area: Rect,
) {
    let notice = match &app.notice {
        Some(notice) => {
            let color = match notice.kind {
                NoticeKind::Info => theme.accent,
                NoticeKind::Warning => theme.warning,
                NoticeKind::Error => theme.error,
            };
            Line::from(Span::styled(notice.text.clone(), Style::default().fg(color)))
        }
        None => Line::from(""),
    };
    let hint = Line::from(Span::styled(
        footer_hint(snapshot, snapshot.current_question.as_ref()),
        Style::default().fg(theme.muted),
    ));
    frame.render_widget(Paragraph::new(vec![notice, hint]), area);
}

#[cfg(test)]
#[path = "tests/ui_tests.rs"]
mod tests;
