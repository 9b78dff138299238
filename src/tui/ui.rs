use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode};
use crate::models::Subscription;

pub fn draw(frame: &mut Frame, app: &App) {
    // Main horizontal split: list on the left, details on the right
    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)])
        .split(frame.area());

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(0),    // Subscription list
            Constraint::Length(1), // Status line
        ])
        .split(main_chunks[0]);

    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Usage gauge
            Constraint::Min(0),    // Details
            Constraint::Length(1), // Key hints
        ])
        .split(main_chunks[1]);

    let now = Utc::now().timestamp();

    render_header(frame, app, left_chunks[0]);
    render_subscription_list(frame, app, left_chunks[1], now);
    render_status(frame, app, left_chunks[2]);

    render_usage(frame, app, right_chunks[0]);
    render_details(frame, app, right_chunks[1], now);
    render_hints(frame, right_chunks[2]);

    match app.input_mode {
        InputMode::Url => render_input(frame, " Subscription URL ", &app.url_input),
        InputMode::Name => render_input(frame, " Name (optional) ", &app.name_input),
        InputMode::ConfirmDelete => render_confirm_delete(frame, app),
        InputMode::Normal => {}
    }

    if app.show_help {
        render_help(frame);
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let now = Utc::now().timestamp();
    let total = app.subscriptions().len();
    let expired = app
        .subscriptions()
        .iter()
        .filter(|s| s.is_expired(now))
        .count();

    let block = Block::default()
        .title(" Subscriptions ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let stats = format!(" {total} Subscriptions | {expired} Expired");
    let paragraph = Paragraph::new(stats).style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, inner);
}

fn render_subscription_list(frame: &mut Frame, app: &App, area: Rect, now: i64) {
    let items: Vec<ListItem> = app
        .subscriptions()
        .iter()
        .map(|subscription| {
            let usage = subscription.usage_ratio();
            let usage_style = Style::default().fg(usage_color(usage));
            let name_style = if subscription.is_expired(now) {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default().fg(Color::White)
            };

            let line = Line::from(vec![
                Span::styled(format!("{:>3.0}% ", usage * 100.0), usage_style),
                Span::styled(subscription.name.clone(), name_style),
                Span::styled(
                    format!("  {}", expiry_label(subscription, now)),
                    Style::default().fg(Color::Blue),
                ),
            ]);

            ListItem::new(line)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    if !app.subscriptions().is_empty() {
        state.select(Some(app.selected_index));
    }

    frame.render_stateful_widget(list, area, &mut state);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let status = app.status_line();
    let (text, color) = match &status {
        Some(status) if status.starts_with("Error") => (status.as_str(), Color::Red),
        Some(status) => (status.as_str(), Color::Yellow),
        None if app.subscriptions().is_empty() => ("Press 'a' to add a subscription", Color::DarkGray),
        None => ("", Color::DarkGray),
    };

    let paragraph = Paragraph::new(text).style(Style::default().fg(color));
    frame.render_widget(paragraph, area);
}

fn render_usage(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Traffic ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let Some(subscription) = app.selected_subscription() else {
        frame.render_widget(Paragraph::new("No subscription selected").block(block), area);
        return;
    };

    let ratio = subscription.usage_ratio();
    let label = format!(
        "{} / {}",
        format_bytes(subscription.used_traffic),
        format_bytes(subscription.total_traffic)
    );
    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(usage_color(ratio)))
        .ratio(ratio)
        .label(label);

    frame.render_widget(gauge, area);
}

fn render_details(frame: &mut Frame, app: &App, area: Rect, now: i64) {
    let block = Block::default()
        .title(" Details ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));

    let text = match app.selected_subscription() {
        Some(subscription) => {
            let field = |label: &'static str, value: String| {
                Line::from(vec![
                    Span::styled(format!("{label:<12}"), Style::default().fg(Color::DarkGray)),
                    Span::raw(value),
                ])
            };
            vec![
                field("Name", subscription.name.clone()),
                field(
                    "URL",
                    subscription.subscription_url.clone().unwrap_or_else(|| "-".to_string()),
                ),
                field(
                    "Website",
                    subscription.official_website.clone().unwrap_or_else(|| "-".to_string()),
                ),
                field(
                    "Expires",
                    format!(
                        "{} ({})",
                        format_timestamp(subscription.expire_time),
                        expiry_label(subscription, now)
                    ),
                ),
                field("Updated", format_timestamp(subscription.last_update_time)),
                field("Identifier", subscription.identifier.clone()),
            ]
        }
        None => vec![Line::from("Nothing to show")],
    };

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_hints(frame: &mut Frame, area: Rect) {
    let hints = "a:add  r:update  R:update all  d:delete  o:website  ?:help  q:quit";
    let paragraph = Paragraph::new(hints).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

fn render_input(frame: &mut Frame, title: &str, value: &str) {
    let area = centered_rect(60, 20, frame.area());

    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let inner = block.inner(area);

    frame.render_widget(Clear, area);
    frame.render_widget(block, area);

    let input_text = format!("> {value}_");
    let paragraph = Paragraph::new(input_text)
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, inner);
}

fn render_confirm_delete(frame: &mut Frame, app: &App) {
    let area = centered_rect(50, 20, frame.area());
    let name = app
        .selected_subscription()
        .map(|s| s.name.as_str())
        .unwrap_or("this subscription");

    let block = Block::default()
        .title(" Confirm delete ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));

    let paragraph = Paragraph::new(format!("Delete {name}?\n\ny: delete   any other key: cancel"))
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame) {
    let area = centered_rect(50, 60, frame.area());

    let help_text = [
        "",
        " Navigation:",
        "   j / ↓    Move down",
        "   k / ↑    Move up",
        "   < / >    First / last",
        "",
        " Actions:",
        "   a        Add subscription",
        "   r        Update selected",
        "   R        Update all",
        "   d        Delete selected",
        "   o        Open official website",
        "",
        " General:",
        "   ?        Toggle this help",
        "   q        Quit",
        "",
        " Press any key to close",
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(help_text.join("\n"))
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn usage_color(ratio: f64) -> Color {
    if ratio >= 0.9 {
        Color::Red
    } else if ratio >= 0.7 {
        Color::Yellow
    } else {
        Color::Green
    }
}

fn expiry_label(subscription: &Subscription, now: i64) -> String {
    if subscription.is_expired(now) {
        return "expired".to_string();
    }
    match subscription.days_until_expiry(now) {
        0 => "expires today".to_string(),
        1 => "1 day left".to_string(),
        days => format!("{days} days left"),
    }
}

fn format_timestamp(epoch_secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(epoch_secs, 0)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_bytes(bytes: i64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

    let mut value = bytes.max(0) as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes.max(0), UNITS[0])
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
