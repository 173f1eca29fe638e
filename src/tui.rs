use anyhow::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use tracing::warn;

use sidequest::Database;
use sidequest::models::{Application, Job};

struct TrackerState {
    applications: Vec<Application>,
    statuses: Vec<String>,
    selected: usize,
    scroll_offset: u16,
    job: Option<Job>,
    message: Option<String>,
}

impl TrackerState {
    fn new(applications: Vec<Application>, statuses: Vec<String>) -> Self {
        Self {
            applications,
            statuses,
            selected: 0,
            scroll_offset: 0,
            job: None,
            message: None,
        }
    }

    fn current(&self) -> Option<&Application> {
        self.applications.get(self.selected)
    }

    fn load_job(&mut self, db: &Database) {
        let Some(app) = self.current() else { return };
        self.job = db.get_job(app.job_id).ok().flatten();
    }

    fn next(&mut self) {
        if !self.applications.is_empty() && self.selected < self.applications.len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    /// Move the selected application one place through the configured statuses.
    /// A status outside the list restarts from the first one.
    fn cycle_status(&mut self, db: &Database, forward: bool) {
        if self.statuses.is_empty() {
            return;
        }
        let Some(app) = self.applications.get_mut(self.selected) else { return };
        let Some(id) = app.id else { return };

        let len = self.statuses.len();
        let next = match self.statuses.iter().position(|s| *s == app.status) {
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
            None => 0,
        };
        let status = self.statuses[next].clone();

        match db.update_application_status(id, &status) {
            Ok(()) => {
                self.message = Some(format!("#{} -> {}", id, status));
                app.status = status;
            }
            Err(e) => {
                warn!(id, error = %e, "status update failed");
                self.message = Some(format!("Update failed: {}", e));
            }
        }
    }
}

pub fn run_tracker(db: &Database, status: Option<&str>, statuses: Vec<String>) -> Result<()> {
    let applications = db.list_applications(status)?;
    if applications.is_empty() {
        println!("No applications tracked.");
        return Ok(());
    }

    let mut state = TrackerState::new(applications, statuses);
    state.load_job(db);

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, db);

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut TrackerState,
    db: &Database,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let prev_selected = state.selected;
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
                KeyCode::Char('s') | KeyCode::Right => state.cycle_status(db, true),
                KeyCode::Char('S') | KeyCode::Left => state.cycle_status(db, false),
                _ => {}
            }
            if state.selected != prev_selected {
                list_state.select(Some(state.selected));
                state.message = None;
                state.load_job(db);
            }
        }
    }
    Ok(())
}

fn status_style(status: &str) -> Style {
    match status {
        "Saved" => Style::default(),
        "Applied" => Style::default().fg(Color::Cyan),
        "Phone Screen" | "Interview" => Style::default().fg(Color::Yellow),
        "Offer" | "Accepted" => Style::default().fg(Color::Green),
        "Rejected" => Style::default().fg(Color::Red),
        "Withdrawn" => Style::default().fg(Color::DarkGray),
        _ => Style::default().fg(Color::Magenta),
    }
}

fn draw(frame: &mut Frame, state: &TrackerState, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[0]);

    let items: Vec<ListItem> = state
        .applications
        .iter()
        .map(|app| {
            let (title, company) = app
                .job
                .as_ref()
                .map(|j| (j.title.as_str(), j.company.as_str()))
                .unwrap_or(("?", "?"));
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<13}", app.status), status_style(&app.status)),
                Span::raw(format!("{} | {}", truncate(title, 30), company)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Applications ({}) ", state.applications.len())),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    let detail = Paragraph::new(build_detail(state))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));
    frame.render_widget(detail, chunks[1]);

    let footer = match &state.message {
        Some(msg) => format!(" {}", msg),
        None => " j/k:navigate  J/K:scroll  s/S:next/prev status  q:quit".to_string(),
    };
    frame.render_widget(
        Paragraph::new(footer).style(Style::default().fg(Color::DarkGray)),
        rows[1],
    );
}

fn build_detail(state: &TrackerState) -> Text<'_> {
    let Some(app) = state.current() else {
        return Text::raw("No application selected");
    };

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines: Vec<Line> = Vec::new();

    match &state.job {
        Some(job) => {
            lines.push(Line::from(Span::styled(job.title.as_str(), bold)));
            lines.push(Line::from(format!("at {} ({})", job.company, job.location)));
        }
        None => lines.push(Line::from(format!("Job #{}", app.job_id))),
    }

    lines.push(Line::from(Span::styled(
        format!("Status: {}", app.status),
        status_style(&app.status),
    )));
    if let Some(date) = &app.applied_date {
        lines.push(Line::from(format!("Applied: {}", date)));
    }
    if let Some(step) = &app.next_step {
        let when = app.next_step_date.as_deref().unwrap_or("unscheduled");
        lines.push(Line::from(format!("Next: {} ({})", step, when)));
    }
    lines.push(Line::from(Span::styled(
        format!("Updated {}", app.updated_at),
        dim,
    )));
    lines.push(Line::from(""));

    if !app.notes.is_empty() {
        lines.push(Line::from(Span::styled("Notes", bold)));
        for line in textwrap::fill(&app.notes, 70).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }
        lines.push(Line::from(""));
    }

    if let Some(job) = &state.job {
        if let Some(salary) = &job.salary_text {
            lines.push(Line::from(format!("Pay: {}", salary)));
        }
        if let Some(score) = job.match_score {
            lines.push(Line::from(format!("Match: {:.0}", score)));
            for reason in &job.match_reasons {
                lines.push(Line::from(format!("  + {}", reason)));
            }
        }
        lines.push(Line::from(format!("URL: {}", job.url)));
        lines.push(Line::from(""));

        if job.description.is_empty() {
            lines.push(Line::from(Span::styled("(No description)", dim)));
        } else {
            lines.push(Line::from(Span::styled("Description", bold)));
            for line in job.description.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
    }

    Text::from(lines)
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
