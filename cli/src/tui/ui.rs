use enginekit_core::controller::Selector;
use enginekit_core::downloaders::release::format_size;
use enginekit_core::{Action, Enablement, Field, Precision};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use std::fmt::Display;

use super::app::{App, AppMode};

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn draw(f: &mut Frame, app: &App) {
    let transfer = app.controller().transfer();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),                                           // Content
            Constraint::Length(if transfer.is_some() { 3 } else { 0 }), // Transfer
            Constraint::Length(3),                                        // Status bar
        ])
        .split(f.area());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(chunks[0]);

    draw_selection(f, app, columns[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(10), Constraint::Min(0)])
        .split(columns[1]);
    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(right[0]);

    draw_engines(f, app, panels[0]);
    draw_system(f, app, panels[1]);
    draw_log(f, app, right[1]);

    if let Some((downloaded, total)) = transfer {
        draw_transfer(f, downloaded, total, chunks[1]);
    }
    draw_status_bar(f, app, chunks[2]);

    match app.mode {
        AppMode::Normal => {}
        AppMode::Calibration => draw_calibration_prompt(f, app),
        AppMode::ConfirmQuit => draw_confirm_quit(f),
        AppMode::Notice => draw_notice(f, app),
    }
}

fn focus_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(title)
}

fn draw_selection(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    let controller = app.controller();
    draw_choice(
        f,
        " Version (v) ",
        controller.versions(),
        app.focus == Field::Version,
        chunks[0],
    );
    draw_choice(
        f,
        " Task (t) ",
        controller.categories(),
        app.focus == Field::Category,
        chunks[1],
    );

    let models = controller.models();
    if models.items().is_empty() {
        let message = Paragraph::new(vec![
            Line::from(""),
            Line::from("No models in this task.").centered(),
        ])
        .block(focus_block(" Models (m) ", app.focus == Field::Model));
        f.render_widget(message, chunks[2]);
        return;
    }

    let items: Vec<ListItem> = models
        .items()
        .iter()
        .map(|m| {
            let downloaded = controller.store().is_downloaded(m);
            ListItem::new(Line::from(vec![
                Span::raw(m.as_str()),
                Span::raw("  "),
                Span::styled(
                    if downloaded { "●" } else { "" },
                    Style::default().fg(Color::Green),
                ),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(focus_block(" Models (m) ", app.focus == Field::Model))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default().with_selected(models.index());
    f.render_stateful_widget(list, chunks[2], &mut state);
}

fn draw_choice<T: Display>(
    f: &mut Frame,
    title: &str,
    selector: &Selector<T>,
    focused: bool,
    area: Rect,
) {
    let line = match selector.selected() {
        Some(v) => Line::from(vec![
            Span::styled("◀ ", Style::default().fg(Color::DarkGray)),
            Span::styled(v.to_string(), Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(" ▶", Style::default().fg(Color::DarkGray)),
        ]),
        None => Line::from(Span::styled("(none)", Style::default().fg(Color::DarkGray))),
    };
    f.render_widget(Paragraph::new(line).block(focus_block(title, focused)), area);
}

fn action_line(key: &str, label: &str, enablement: Enablement, state: Span<'static>) -> Line<'static> {
    let style = if enablement.is_enabled() {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Line::from(vec![
        Span::styled(format!("[{}] ", key), Style::default().fg(Color::Yellow)),
        Span::styled(format!("{:<12}", label), style),
        state,
    ])
}

fn flag(on: bool, yes: &'static str, no: &'static str) -> Span<'static> {
    if on {
        Span::styled(yes, Style::default().fg(Color::Green))
    } else {
        Span::styled(no, Style::default().fg(Color::DarkGray))
    }
}

fn draw_engines(f: &mut Frame, app: &App, area: Rect) {
    let controller = app.controller();
    let status = controller.status().copied().unwrap_or_default();

    let mut lines = vec![action_line(
        "d",
        if status.downloaded { "Re-download" } else { "Download" },
        controller.enablement(Action::Download),
        flag(status.downloaded, "✓ downloaded", "not downloaded"),
    )];
    for (key, precision) in ["1", "2", "3"].into_iter().zip(Precision::ALL) {
        lines.push(action_line(
            key,
            precision.label(),
            controller.enablement(Action::Build(precision)),
            flag(status.is_built(precision), "✓ built", "not built"),
        ));
    }
    lines.push(Line::from(vec![
        Span::styled("[c] ", Style::default().fg(Color::Yellow)),
        Span::raw("Calibration "),
        match controller.calibration() {
            Some(path) => Span::raw(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
            ),
            None => Span::styled("(none)", Style::default().fg(Color::DarkGray)),
        },
    ]));

    if let Some(hint) = app.build_hint() {
        lines.push(Line::from(Span::styled(
            hint,
            Style::default().fg(Color::Yellow),
        )));
    }

    let title = match controller.selected_model() {
        Some(model) => format!(" {} ", model),
        None => " Engine Build ".to_string(),
    };
    let panel = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(panel, area);
}

fn draw_system(f: &mut Frame, app: &App, area: Rect) {
    let controller = app.controller();
    let caps = controller.capabilities();

    let gpu = match &caps.gpu {
        Some(gpu) => Span::styled(gpu.to_string(), Style::default().fg(Color::Green)),
        None => Span::styled("Not available", Style::default().fg(Color::Red)),
    };
    let runtime = if caps.compiler_runtime {
        Span::styled("Installed", Style::default().fg(Color::Green))
    } else {
        Span::styled("Not installed", Style::default().fg(Color::Red))
    };

    let lines = vec![
        Line::from(vec![Span::raw("GPU:      "), gpu]),
        Line::from(vec![Span::raw("TensorRT: "), runtime]),
        Line::from(""),
        Line::from(Span::styled(
            controller.store().weights_dir().display().to_string(),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let panel = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(" System (r) "));
    f.render_widget(panel, area);
}

fn draw_log(f: &mut Frame, app: &App, area: Rect) {
    let controller = app.controller();
    let title = if controller.is_busy() {
        format!(" Log {} working ", SPINNER[app.ticks % SPINNER.len()])
    } else {
        " Log (l: clear) ".to_string()
    };

    let lines: Vec<Line> = log_tail(controller.log(), area.height)
        .iter()
        .map(|l| Line::from(l.as_str()))
        .collect();

    let log = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(log, area);
}

/// The last lines of `log` that fit in a bordered box `height` rows tall.
fn log_tail(log: &[String], height: u16) -> &[String] {
    let visible = usize::from(height.saturating_sub(2));
    &log[log.len().saturating_sub(visible)..]
}

fn draw_transfer(f: &mut Frame, downloaded: u64, total: Option<u64>, area: Rect) {
    let (ratio, label) = match total {
        Some(total) if total > 0 => (
            (downloaded as f64 / total as f64).min(1.0),
            format!("{} / {}", format_size(downloaded), format_size(total)),
        ),
        _ => (0.0, format_size(downloaded)),
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Download "))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio)
        .label(label);
    f.render_widget(gauge, area);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let busy = app.is_busy();
    let status_style = if busy {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let help_text = match app.mode {
        AppMode::Normal => " q: quit | Tab: focus | j/k: select | d: download | 1/2/3: build | c/x: calibration ",
        AppMode::Calibration => " Enter: confirm | Esc: cancel ",
        AppMode::ConfirmQuit => " y: quit | n: stay ",
        AppMode::Notice => " Enter: close ",
    };

    let status = Paragraph::new(Line::from(vec![
        Span::styled(if busy { "⏳ " } else { "" }, Style::default().fg(Color::Yellow)),
        Span::styled(app.status_message.as_str(), status_style),
        Span::raw("  "),
        Span::styled(help_text, Style::default().fg(Color::DarkGray)),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(status, area);
}

fn draw_calibration_prompt(f: &mut Frame, app: &App) {
    let area = centered_rect(70, 5, f.area());
    let prompt = Paragraph::new(vec![
        Line::from(format!("{}▋", app.input)),
        Line::from(Span::styled(
            "Dataset YAML used to calibrate INT8 engines",
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .style(Style::default().fg(Color::Yellow))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Calibration file "),
    );
    f.render_widget(Clear, area);
    f.render_widget(prompt, area);
}

fn draw_confirm_quit(f: &mut Frame) {
    let area = centered_rect(50, 5, f.area());
    let dialog = Paragraph::new(vec![
        Line::from("A task is still running."),
        Line::from("Quit anyway? (y/n)"),
    ])
    .centered()
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Quit "),
    );
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn draw_notice(f: &mut Frame, app: &App) {
    let Some(notice) = app.notice.as_ref() else {
        return;
    };
    let color = if notice.success { Color::Green } else { Color::Red };
    let area = centered_rect(60, 7, f.area());
    let dialog = Paragraph::new(vec![
        Line::from(""),
        Line::from(notice.message.as_str()),
        Line::from(""),
        Line::from(Span::styled("Enter to close", Style::default().fg(Color::DarkGray))),
    ])
    .centered()
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(format!(" {} ", notice.title)),
    );
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

/// A `width`% wide, `height` rows tall rectangle centered in `area`.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width) / 2),
            Constraint::Percentage(width),
            Constraint::Percentage((100 - width) / 2),
        ])
        .split(vertical[1])[1]
}
