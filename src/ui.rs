use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Quiz => {
                render_quiz(self, area, buf);
                if self.session.detector().is_warning_open() {
                    render_focus_warning(self, area, buf);
                }
            }
            AppState::Results => render_results(self, area, buf),
        }
    }
}

fn render_quiz(app: &App, area: Rect, buf: &mut Buffer) {
    let session = &app.session;
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    let mut status = vec![
        Span::styled(session.quiz().title.clone(), bold_style),
        Span::raw(format!(
            "  question {}/{}",
            session.current_index() + 1,
            session.quiz().len()
        )),
        Span::raw(format!(
            "  answered {}/{}",
            session.answered_count(),
            session.quiz().len()
        )),
    ];
    if let Some(secs) = session.store().seconds_remaining() {
        status.push(Span::styled(
            format!("  {:.0}s left", secs.ceil()),
            Style::default().fg(Color::Cyan),
        ));
    }
    let focus_losses = session.store().focus_loss_count();
    if focus_losses > 0 {
        status.push(Span::styled(
            format!("  focus lost {}x", focus_losses),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }
    Paragraph::new(Line::from(status)).render(chunks[0], buf);

    Paragraph::new(session.current_question().prompt.clone())
        .style(bold_style)
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);

    let selected = session.selected();
    let choices: Vec<Line> = session
        .current_question()
        .choices
        .iter()
        .enumerate()
        .map(|(idx, choice)| {
            let marker = if selected == Some(idx) { "●" } else { "○" };
            let style = if selected == Some(idx) {
                Style::default().fg(Color::Green).patch(bold_style)
            } else {
                Style::default()
            };
            Line::from(Span::styled(
                format!("{} {}. {}", marker, idx + 1, choice),
                style,
            ))
        })
        .collect();
    Paragraph::new(choices)
        .wrap(Wrap { trim: false })
        .render(chunks[2], buf);

    Paragraph::new(Span::styled(
        "(1-9) choose / (←/→) move / (enter) next or submit / (esc) quit",
        dim_style.add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);
}

fn render_focus_warning(app: &App, area: Rect, buf: &mut Buffer) {
    let count = app.session.store().focus_loss_count();
    let mut lines = vec![
        format!("You left the quiz window ({} so far).", count),
        "Focus changes are recorded with your attempt.".to_string(),
    ];
    if let Some(max) = app.session.settings().max_focus_losses {
        lines.push(format!(
            "The quiz is submitted automatically at {} focus losses.",
            max
        ));
    }
    lines.push(String::new());
    lines.push("Press enter to return to the quiz".to_string());

    let text_width = lines.iter().map(|l| l.width()).max().unwrap_or(0) as u16;
    let width = (text_width + 4).min(area.width);
    let height = (lines.len() as u16 + 2).min(area.height);
    let popup = centered(area, width, height);

    Clear.render(popup, buf);
    Paragraph::new(lines.into_iter().map(Line::from).collect::<Vec<_>>())
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title(" Focus lost "),
        )
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .render(popup, buf);
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(result) = app.session.result() else {
        return;
    };
    let bold_style = Style::default().add_modifier(Modifier::BOLD);

    let focus_style = if result.focus_loss_count == 0 {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Red)
    };

    let lines = vec![
        Line::from(Span::styled(result.title.clone(), bold_style)),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "{}/{} correct ({:.0}%)",
                result.correct,
                result.total,
                result.percentage()
            ),
            Style::default().fg(Color::Magenta).patch(bold_style),
        )),
        Line::from(format!("{} unanswered", result.unanswered)),
        Line::from(Span::styled(
            format!("focus lost {} time(s)", result.focus_loss_count),
            focus_style,
        )),
        Line::from(""),
        Line::from(Span::styled(
            "(r)etry / (n)ew attempt / (esc)ape",
            Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
        )),
    ];

    let height = (lines.len() as u16).min(area.height);
    let target = Rect {
        x: area.x,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: area.width,
        height,
    };
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(target, buf);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    }
}
