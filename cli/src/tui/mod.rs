mod app;
mod ui;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use enginekit_core::{Action, Config, Field, Precision};
use ratatui::prelude::*;
use std::io;
use std::time::Duration;

use app::{App, AppMode};

pub async fn run(config: &Config, model: Option<&str>) -> Result<()> {
    // Probing and catalog errors surface before the terminal is taken over.
    let mut app = App::new(config)?;
    if let Some(model) = model {
        app.preselect(model)?;
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if app.is_busy() {
        tracing::warn!("Exited while a task was still running");
    }
    result
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                match app.mode {
                    AppMode::Normal => match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => {
                            if app.request_quit() {
                                return Ok(());
                            }
                        }
                        KeyCode::Tab => app.next_focus(),
                        KeyCode::BackTab => app.previous_focus(),
                        KeyCode::Char('j') | KeyCode::Down => app.next(),
                        KeyCode::Char('k') | KeyCode::Up => app.previous(),
                        KeyCode::Char('v') => app.focus = Field::Version,
                        KeyCode::Char('t') => app.focus = Field::Category,
                        KeyCode::Char('m') => app.focus = Field::Model,
                        KeyCode::Char('d') => app.start(Action::Download),
                        KeyCode::Char('1') => app.start(Action::Build(Precision::Fp32)),
                        KeyCode::Char('2') => app.start(Action::Build(Precision::Fp16)),
                        KeyCode::Char('3') => app.start(Action::Build(Precision::Int8)),
                        KeyCode::Char('c') => app.edit_calibration(),
                        KeyCode::Char('x') => app.clear_calibration(),
                        KeyCode::Char('r') => app.reprobe(),
                        KeyCode::Char('l') => app.clear_log(),
                        _ => {}
                    },
                    AppMode::Calibration => match key.code {
                        KeyCode::Esc => app.mode = AppMode::Normal,
                        KeyCode::Enter => app.submit_calibration(),
                        KeyCode::Backspace => {
                            app.input.pop();
                        }
                        KeyCode::Char(c) => app.input.push(c),
                        _ => {}
                    },
                    AppMode::ConfirmQuit => match key.code {
                        KeyCode::Char('y') | KeyCode::Char('Y') => return Ok(()),
                        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                            app.mode = AppMode::Normal
                        }
                        _ => {}
                    },
                    AppMode::Notice => {
                        if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                            app.dismiss_notice();
                        }
                    }
                }
            }
        }

        app.tick();
    }
}
