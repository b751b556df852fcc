use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, Gauge, GraphType, Paragraph, Wrap},
    Frame,
};
use crate::app::{App, AppState, InputField};
use crate::config::DATE_FORMAT;

pub fn render(f: &mut Frame, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, app, layout[0]);

    match app.state {
        AppState::Input => render_input(f, app, layout[1]),
        AppState::Loading => render_loading(f, "Fetching market data...", layout[1]),
        AppState::Training => render_training(f, app, layout[1]),
        AppState::Dashboard => render_dashboard(f, app, layout[1]),
    }

    render_footer(f, app, layout[2]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(" Stock Predictor ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::styled(
            match app.state {
                AppState::Input => "Input",
                AppState::Loading => "Loading",
                AppState::Training => "Training",
                AppState::Dashboard => "Dashboard",
            },
            Style::default().fg(Color::Yellow),
        ),
    ];

    if let Some(series) = &app.series {
        if let Some(last) = series.last() {
            spans.push(Span::raw(" | "));
            spans.push(Span::styled(
                format!("{} ${:.2}", series.symbol, last.close),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ));

            if series.len() >= 2 {
                let prev = series.points[series.len() - 2].close;
                let delta = last.close - prev;
                let pct = delta / prev * 100.0;
                let color = if delta >= 0.0 { Color::Green } else { Color::Red };
                spans.push(Span::raw(" "));
                spans.push(Span::styled(
                    format!("({:+.2}, {:+.2}%)", delta, pct),
                    Style::default().fg(color),
                ));
            }
        }
    }

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let hint = match app.state {
        AppState::Input => "Tab: next field | Enter/F1: graph | F2: DP | F3: greedy | F4: predict | F5: deltas | Esc: quit",
        AppState::Loading => "Loading...",
        AppState::Training => "Esc: quit",
        AppState::Dashboard => "F1: graph | F2: DP | F3: greedy | F4: predict | F5: deltas | r: edit | q/Esc: quit",
    };

    let footer = Paragraph::new(Line::from(vec![
        Span::styled(" Controls: ", Style::default().fg(Color::Gray)),
        Span::styled(hint, Style::default().fg(Color::White)),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(footer, area);
}

fn render_input(f: &mut Frame, app: &App, area: Rect) {
    let mut constraints = vec![Constraint::Percentage(15)];
    constraints.extend(InputField::ALL.iter().map(|_| Constraint::Length(3)));
    constraints.push(Constraint::Length(5));
    constraints.push(Constraint::Min(0));

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(60),
            Constraint::Percentage(20),
        ])
        .split(area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(columns[1]);

    for (i, field) in InputField::ALL.iter().enumerate() {
        let focused = *field == app.focus;
        let (border, text) = if focused {
            (Style::default().fg(Color::Cyan), Style::default().fg(Color::Yellow))
        } else {
            (Style::default().fg(Color::DarkGray), Style::default().fg(Color::White))
        };
        let mut value = app.field(*field).to_string();
        if focused {
            value.push('_');
        }
        let input = Paragraph::new(value).style(text).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(format!(" {} ", field.label())),
        );
        f.render_widget(input, chunks[i + 1]);
    }

    let status_area = chunks[InputField::ALL.len() + 1];
    if let Some(err) = &app.error_msg {
        let error = Paragraph::new(err.as_str())
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(" Error "));
        f.render_widget(error, status_area);
    } else if let Some(result) = &app.result_text {
        let result = Paragraph::new(result.as_str())
            .style(Style::default().fg(Color::Green))
            .block(Block::default().borders(Borders::ALL).title(" Result "));
        f.render_widget(result, status_area);
    }
}

fn render_loading(f: &mut Frame, msg: &str, area: Rect) {
    let block = Block::default().borders(Borders::ALL);
    let text = Paragraph::new(msg)
        .alignment(Alignment::Center)
        .block(block);
    f.render_widget(text, area);
}

fn render_training(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    let total = app.train_options.epochs.max(1);
    let done = app.train_log.last().map(|e| e.epoch).unwrap_or(0);
    let ratio = (done as f64 / total as f64).min(1.0);

    let gauge = Gauge::default()
        .block(Block::default().title(" LSTM Training Progress ").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio)
        .label(format!("epoch {}/{}", done, total));
    f.render_widget(gauge, chunks[1]);

    let loss_text = match app.train_log.last() {
        Some(last) => Line::from(vec![
            Span::styled("Train loss: ", Style::default().fg(Color::Gray)),
            Span::styled(format!("{:.6}", last.train_loss), Style::default().fg(Color::Blue)),
            Span::styled("  Val loss: ", Style::default().fg(Color::Gray)),
            Span::styled(format!("{:.6}", last.val_loss), Style::default().fg(Color::Yellow)),
        ]),
        None => Line::from(Span::styled("Waiting for first epoch...", Style::default().fg(Color::Gray))),
    };
    let loss = Paragraph::new(loss_text)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(loss, chunks[2]);

    let visible = chunks[3].height.saturating_sub(2) as usize;
    let skip = app.train_messages.len().saturating_sub(visible);
    let lines: Vec<Line> = app.train_messages[skip..]
        .iter()
        .map(|m| Line::from(Span::styled(m.as_str(), Style::default().fg(Color::Gray))))
        .collect();
    let log = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Log "));
    f.render_widget(log, chunks[3]);
}

fn render_dashboard(f: &mut Frame, app: &App, area: Rect) {
    let constraints = if app.error_msg.is_some() {
        vec![Constraint::Min(0), Constraint::Length(3)]
    } else {
        vec![Constraint::Percentage(100)]
    };

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(constraints)
        .split(area);

    if let Some(series) = &app.series {
        let dashboard_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(72), Constraint::Percentage(28)])
            .split(main_chunks[0]);

        let points: Vec<(f64, f64)> = series
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (i as f64, p.close))
            .collect();

        let x_len = points.len() as f64;
        let x_max = (x_len + app.forecast.len() as f64).max(1.0);

        let mut datasets = vec![Dataset::default()
            .name(series.symbol.as_str())
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&points)];

        // Buy/sell markers sit on the series index of their dates.
        let index_of = |date: chrono::NaiveDate| series.points.iter().position(|p| p.date == date);
        let mut buy_marker: Vec<(f64, f64)> = Vec::new();
        let mut sell_marker: Vec<(f64, f64)> = Vec::new();
        if let Some((_, trade)) = &app.trade {
            if let (Some(buy), Some(sell)) = (trade.buy, trade.sell) {
                if let (Some(bi), Some(si)) = (index_of(buy.date), index_of(sell.date)) {
                    buy_marker.push((bi as f64, buy.close));
                    sell_marker.push((si as f64, sell.close));
                }
            }
        }
        if !buy_marker.is_empty() {
            datasets.push(Dataset::default()
                .name("Buy")
                .marker(symbols::Marker::Block)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Green))
                .data(&buy_marker));
            datasets.push(Dataset::default()
                .name("Sell")
                .marker(symbols::Marker::Block)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Red))
                .data(&sell_marker));
        }

        let mut forecast_points: Vec<(f64, f64)> = Vec::new();
        if !app.forecast.is_empty() {
            if let Some(last) = series.last() {
                forecast_points.push((x_len - 1.0, last.close));
            }
            forecast_points.extend(
                app.forecast
                    .iter()
                    .enumerate()
                    .map(|(idx, p)| (x_len + idx as f64, p.close)),
            );
            datasets.push(Dataset::default()
                .name("LSTM Forecast")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Yellow))
                .data(&forecast_points));
        }

        let (mut min_price, mut max_price) = series.bounds().unwrap_or((0.0, 1.0));
        for p in &app.forecast {
            min_price = min_price.min(p.close);
            max_price = max_price.max(p.close);
        }

        let first_date = series.points.first().map(|p| p.date.format(DATE_FORMAT).to_string()).unwrap_or_default();
        let last_date = app
            .forecast
            .last()
            .or(series.last())
            .map(|p| p.date.format(DATE_FORMAT).to_string())
            .unwrap_or_default();

        let chart = Chart::new(datasets)
            .block(
                Block::default()
                    .title(Span::styled(
                        format!("{} - Daily Close", series.symbol),
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL),
            )
            .x_axis(
                Axis::default()
                    .title("Date")
                    .style(Style::default().fg(Color::Gray))
                    .bounds([0.0, x_max])
                    .labels(vec![
                        Span::styled(first_date, Style::default().fg(Color::Gray)),
                        Span::styled(last_date, Style::default().fg(Color::Gray)),
                    ]),
            )
            .y_axis(
                Axis::default()
                    .title("Close Price")
                    .style(Style::default().fg(Color::Gray))
                    .bounds([min_price * 0.95, max_price * 1.05])
                    .labels(vec![
                        Span::styled(format!("{:.1}", min_price), Style::default().fg(Color::Gray)),
                        Span::styled(format!("{:.1}", max_price), Style::default().fg(Color::Gray)),
                    ]),
            );

        f.render_widget(chart, dashboard_chunks[0]);

        let (low, high) = series.bounds().unwrap_or((0.0, 0.0));
        let mut info_text = vec![
            Line::from(Span::styled("Series", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))),
            Line::from(format!("Days:  {}", series.len())),
            Line::from(format!("Last:  {:.2}", series.last().map(|p| p.close).unwrap_or(0.0))),
            Line::from(Span::styled(format!("High:  {:.2}", high), Style::default().fg(Color::Green))),
            Line::from(Span::styled(format!("Low:   {:.2}", low), Style::default().fg(Color::Red))),
            Line::from(""),
        ];

        if let Some(result) = &app.result_text {
            info_text.push(Line::from(Span::styled("Result", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))));
            for line in result.lines() {
                info_text.push(Line::from(line.to_string()));
            }
            info_text.push(Line::from(""));
        }

        if let Some(last) = app.train_log.last() {
            info_text.push(Line::from(Span::styled("Training", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))));
            info_text.push(Line::from(format!("Epochs: {}", last.epoch)));
            let best = app.train_log.iter().map(|e| e.val_loss).fold(f64::INFINITY, f64::min);
            info_text.push(Line::from(format!("Best val: {:.6}", best)));
        }

        let info_block = Paragraph::new(info_text)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Details"))
            .style(Style::default().fg(Color::White));

        f.render_widget(info_block, dashboard_chunks[1]);
    }

    if let Some(err) = &app.error_msg {
        let error = Paragraph::new(err.as_str())
            .style(Style::default().fg(Color::Red))
            .block(Block::default().borders(Borders::ALL).title("Error"));
        f.render_widget(error, main_chunks[1]);
    }
}
