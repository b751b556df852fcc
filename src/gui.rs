use eframe::egui;
use egui_plot::{Line, MarkerShape, Plot, PlotPoints, PlotUi, Points};
use crate::app::{Action, App, AppState, InputField};
use crate::config::DATE_FORMAT;
use crate::profit::ProfitAlgorithm;
use chrono::{NaiveDate, NaiveTime, TimeZone};

// ──────────────────────────────────────────────────────────────────────────────
// Color Palette
// ──────────────────────────────────────────────────────────────────────────────

const ACCENT_BLUE: egui::Color32 = egui::Color32::from_rgb(59, 130, 246);
const ACCENT_GREEN: egui::Color32 = egui::Color32::from_rgb(34, 197, 94);
const ACCENT_RED: egui::Color32 = egui::Color32::from_rgb(239, 68, 68);
const ACCENT_YELLOW: egui::Color32 = egui::Color32::from_rgb(250, 204, 21);
const ACCENT_ORANGE: egui::Color32 = egui::Color32::from_rgb(251, 146, 60);
const ACCENT_CYAN: egui::Color32 = egui::Color32::from_rgb(34, 211, 238);
const ACCENT_PURPLE: egui::Color32 = egui::Color32::from_rgb(168, 85, 247);

const BG_DARK: egui::Color32 = egui::Color32::from_rgb(15, 15, 20);
const BG_CARD: egui::Color32 = egui::Color32::from_rgb(24, 24, 32);
const BG_ELEVATED: egui::Color32 = egui::Color32::from_rgb(32, 32, 44);
const TEXT_PRIMARY: egui::Color32 = egui::Color32::from_rgb(226, 232, 240);
const TEXT_SECONDARY: egui::Color32 = egui::Color32::from_rgb(148, 163, 184);
const BORDER_SUBTLE: egui::Color32 = egui::Color32::from_rgb(51, 51, 68);

#[derive(PartialEq, Clone, Copy)]
enum GuiTab {
    Prices,
    Train,
}

pub struct GuiApp {
    app: App,
    active_tab: GuiTab,
    train_epochs: String,
    train_batch_size: String,
    train_lr: String,
    train_patience: String,
}

impl GuiApp {
    pub fn new(app: App) -> Self {
        let options = app.train_options.clone();
        Self {
            app,
            active_tab: GuiTab::Prices,
            train_epochs: options.epochs.to_string(),
            train_batch_size: options.batch_size.to_string(),
            train_lr: options.learning_rate.to_string(),
            train_patience: options.patience.to_string(),
        }
    }

    fn apply_theme(ctx: &egui::Context) {
        let mut style = (*ctx.style()).clone();

        style.visuals.window_rounding = egui::Rounding::same(8.0);
        style.visuals.widgets.noninteractive.rounding = egui::Rounding::same(6.0);
        style.visuals.widgets.inactive.rounding = egui::Rounding::same(6.0);
        style.visuals.widgets.active.rounding = egui::Rounding::same(6.0);
        style.visuals.widgets.hovered.rounding = egui::Rounding::same(6.0);

        style.visuals.dark_mode = true;
        style.visuals.panel_fill = BG_DARK;
        style.visuals.window_fill = BG_CARD;
        style.visuals.faint_bg_color = BG_ELEVATED;

        style.visuals.widgets.noninteractive.bg_fill = BG_CARD;
        style.visuals.widgets.noninteractive.fg_stroke = egui::Stroke::new(1.0, TEXT_SECONDARY);
        style.visuals.widgets.inactive.bg_fill = BG_ELEVATED;
        style.visuals.widgets.inactive.fg_stroke = egui::Stroke::new(1.0, TEXT_PRIMARY);
        style.visuals.widgets.hovered.bg_fill = egui::Color32::from_rgb(45, 45, 60);
        style.visuals.widgets.hovered.fg_stroke = egui::Stroke::new(1.0, egui::Color32::WHITE);
        style.visuals.widgets.active.bg_fill = ACCENT_BLUE;
        style.visuals.widgets.active.fg_stroke = egui::Stroke::new(1.0, egui::Color32::WHITE);

        style.visuals.selection.bg_fill = ACCENT_BLUE.linear_multiply(0.4);
        style.visuals.selection.stroke = egui::Stroke::new(1.0, ACCENT_BLUE);

        style.spacing.item_spacing = egui::vec2(8.0, 6.0);

        ctx.set_style(style);
    }

    /// Copies the training fields into the app before a prediction starts.
    fn sync_train_options(&mut self) {
        let options = &mut self.app.train_options;
        if let Ok(v) = self.train_epochs.trim().parse::<usize>() {
            options.epochs = v;
        }
        if let Ok(v) = self.train_batch_size.trim().parse::<usize>() {
            options.batch_size = v.max(1);
        }
        if let Ok(v) = self.train_lr.trim().parse::<f64>() {
            options.learning_rate = v;
        }
        if let Ok(v) = self.train_patience.trim().parse::<usize>() {
            options.patience = v;
        }
    }

    fn trigger(&mut self, action: Action) {
        if action == Action::Predict {
            self.sync_train_options();
        }
        self.app.trigger(action);
    }
}

impl eframe::App for GuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        Self::apply_theme(ctx);
        self.app.tick();
        if self.app.is_busy() {
            ctx.request_repaint();
        }

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                ui.add_space(8.0);
                ui.label(egui::RichText::new("Stock Market Predictor")
                    .size(18.0)
                    .strong()
                    .color(ACCENT_BLUE));
                ui.add_space(4.0);
                ui.label(egui::RichText::new("Max-profit scans and LSTM forecasting")
                    .size(11.0)
                    .color(TEXT_SECONDARY));

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.add_space(8.0);
                    let train_btn = ui.selectable_label(
                        self.active_tab == GuiTab::Train,
                        egui::RichText::new("Training").size(13.0),
                    );
                    let prices_btn = ui.selectable_label(
                        self.active_tab == GuiTab::Prices,
                        egui::RichText::new("Prices").size(13.0),
                    );
                    if prices_btn.clicked() {
                        self.active_tab = GuiTab::Prices;
                    }
                    if train_btn.clicked() {
                        self.active_tab = GuiTab::Train;
                    }
                });
            });
            ui.add_space(4.0);
        });

        egui::SidePanel::left("input_panel")
            .resizable(false)
            .exact_width(300.0)
            .show(ctx, |ui| {
                ui.add_space(8.0);
                self.render_input_card(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| match self.active_tab {
            GuiTab::Prices => self.render_prices_tab(ui),
            GuiTab::Train => self.render_train_tab(ui),
        });
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Input Card
// ──────────────────────────────────────────────────────────────────────────────

impl GuiApp {
    fn render_input_card(&mut self, ui: &mut egui::Ui) {
        egui::Frame::none()
            .fill(BG_CARD)
            .rounding(egui::Rounding::same(12.0))
            .stroke(egui::Stroke::new(1.0, BORDER_SUBTLE))
            .inner_margin(egui::Margin::same(16.0))
            .show(ui, |ui| {
                for field in InputField::ALL {
                    ui.label(egui::RichText::new(field.label())
                        .size(12.0)
                        .color(TEXT_SECONDARY));
                    let hint = match field {
                        InputField::Ticker => "e.g. AAPL",
                        _ => "YYYY-MM-DD",
                    };
                    ui.add(
                        egui::TextEdit::singleline(self.app.field_mut(field))
                            .desired_width(f32::INFINITY)
                            .hint_text(hint),
                    );
                    ui.add_space(4.0);
                }

                ui.add_space(8.0);
                let busy = self.app.is_busy();
                let buttons = [
                    ("Graph", Action::Graph, ACCENT_BLUE),
                    (
                        "Dynamic Programming",
                        Action::Profit(ProfitAlgorithm::DynamicProgramming),
                        ACCENT_PURPLE,
                    ),
                    ("Greedy Algorithm", Action::Profit(ProfitAlgorithm::Greedy), ACCENT_ORANGE),
                    ("Predict", Action::Predict, ACCENT_GREEN),
                ];
                for (label, action, color) in buttons {
                    let btn = ui.add_enabled(
                        !busy,
                        egui::Button::new(
                            egui::RichText::new(label)
                                .size(14.0)
                                .strong()
                                .color(egui::Color32::WHITE),
                        )
                        .fill(color)
                        .rounding(egui::Rounding::same(8.0))
                        .min_size(egui::vec2(ui.available_width(), 34.0)),
                    );
                    if btn.clicked() {
                        self.trigger(action);
                    }
                }
                let deltas = ui.add_enabled(
                    !busy,
                    egui::Button::new(egui::RichText::new("Multi-trade Upper Bound").size(12.0))
                        .rounding(egui::Rounding::same(6.0))
                        .min_size(egui::vec2(ui.available_width(), 26.0)),
                );
                if deltas.clicked() {
                    self.trigger(Action::Profit(ProfitAlgorithm::PositiveDeltas));
                }

                if let Some(result) = &self.app.result_text {
                    ui.add_space(12.0);
                    section_header(ui, "Result");
                    ui.label(egui::RichText::new(result)
                        .size(13.0)
                        .color(ACCENT_GREEN));
                }

                if let Some(err) = &self.app.error_msg {
                    ui.add_space(12.0);
                    egui::Frame::none()
                        .fill(egui::Color32::from_rgba_premultiplied(239, 68, 68, 25))
                        .rounding(egui::Rounding::same(6.0))
                        .inner_margin(egui::Margin::same(8.0))
                        .show(ui, |ui| {
                            ui.label(egui::RichText::new(err)
                                .color(ACCENT_RED)
                                .size(12.0));
                        });
                }
            });
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Prices Tab
// ──────────────────────────────────────────────────────────────────────────────

impl GuiApp {
    fn render_prices_tab(&mut self, ui: &mut egui::Ui) {
        match self.app.state {
            AppState::Loading => render_centered_status(ui, "Fetching Market Data...", None),
            AppState::Training => {
                let total = self.app.train_options.epochs.max(1);
                let done = self.app.train_log.last().map(|e| e.epoch).unwrap_or(0);
                render_centered_status(
                    ui,
                    "Training LSTM Predictor...",
                    Some((done as f32 / total as f32).min(1.0)),
                );
            }
            AppState::Input | AppState::Dashboard => {
                if self.app.series.is_some() {
                    self.render_dashboard(ui);
                } else {
                    let available = ui.available_size();
                    ui.vertical_centered(|ui| {
                        ui.add_space(available.y * 0.3);
                        ui.label(egui::RichText::new("Enter a ticker and date range, then press Graph")
                            .size(14.0)
                            .color(TEXT_SECONDARY));
                    });
                }
            }
        }
    }

    fn render_dashboard(&self, ui: &mut egui::Ui) {
        let Some(series) = &self.app.series else {
            return;
        };

        egui::Frame::none()
            .fill(BG_CARD)
            .inner_margin(egui::Margin::symmetric(12.0, 8.0))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new(&series.symbol)
                        .size(20.0)
                        .strong()
                        .color(ACCENT_CYAN));

                    if let Some(last) = series.last() {
                        ui.add_space(8.0);
                        ui.label(egui::RichText::new(format!("${:.2}", last.close))
                            .size(20.0)
                            .strong()
                            .color(TEXT_PRIMARY));

                        if series.len() >= 2 {
                            let prev = series.points[series.len() - 2].close;
                            let change = last.close - prev;
                            let pct = change / prev * 100.0;
                            let (color, arrow) = if change >= 0.0 {
                                (ACCENT_GREEN, "+")
                            } else {
                                (ACCENT_RED, "")
                            };
                            ui.label(egui::RichText::new(
                                format!("{}{:.2} ({:+.2}%)", arrow, change, pct))
                                .size(14.0)
                                .color(color));
                        }

                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            ui.label(egui::RichText::new(last.date.format(DATE_FORMAT).to_string())
                                .size(11.0)
                                .color(TEXT_SECONDARY));
                        });
                    }
                });
            });

        ui.add_space(4.0);

        let available = ui.available_size();
        let side_panel_width = 240.0_f32.min(available.x * 0.3);

        ui.horizontal(|ui| {
            ui.vertical(|ui| {
                ui.set_width(available.x - side_panel_width - 16.0);
                self.render_chart(ui);
            });

            ui.vertical(|ui| {
                ui.set_width(side_panel_width);
                self.render_side_panel(ui);
            });
        });
    }

    fn render_chart(&self, ui: &mut egui::Ui) {
        egui::Frame::none()
            .fill(BG_CARD)
            .rounding(egui::Rounding::same(8.0))
            .stroke(egui::Stroke::new(1.0, BORDER_SUBTLE))
            .inner_margin(egui::Margin::same(8.0))
            .show(ui, |ui| {
                let plot = Plot::new("price_chart")
                    .legend(egui_plot::Legend::default().position(egui_plot::Corner::LeftTop))
                    .x_axis_formatter(|x, _range| format_ts(x.value, "%b %d %Y"))
                    .label_formatter(|name, value| {
                        format!("{}\nDate: {}\nClose: ${:.2}", name, format_ts(value.x, DATE_FORMAT), value.y)
                    })
                    .y_axis_label("Close Price")
                    .view_aspect(2.0)
                    .allow_drag(true)
                    .allow_zoom(true);

                plot.show(ui, |plot_ui| {
                    self.draw_chart_data(plot_ui);
                });
            });
    }

    fn draw_chart_data(&self, plot_ui: &mut PlotUi) {
        let Some(series) = &self.app.series else {
            return;
        };

        let points: PlotPoints = series
            .points
            .iter()
            .map(|p| [date_x(p.date), p.close])
            .collect();
        plot_ui.line(
            Line::new(points)
                .name("Close Price")
                .color(ACCENT_CYAN)
                .width(1.8),
        );

        if let Some((_, trade)) = &self.app.trade {
            if let (Some(buy), Some(sell)) = (trade.buy, trade.sell) {
                plot_ui.points(
                    Points::new(vec![[date_x(buy.date), buy.close]])
                        .name("Buy")
                        .shape(MarkerShape::Up)
                        .filled(true)
                        .radius(7.0)
                        .color(ACCENT_GREEN),
                );
                plot_ui.points(
                    Points::new(vec![[date_x(sell.date), sell.close]])
                        .name("Sell")
                        .shape(MarkerShape::Down)
                        .filled(true)
                        .radius(7.0)
                        .color(ACCENT_RED),
                );
            }
        }

        if !self.app.forecast.is_empty() {
            let mut forecast: Vec<[f64; 2]> = Vec::with_capacity(self.app.forecast.len() + 1);
            if let Some(last) = series.last() {
                forecast.push([date_x(last.date), last.close]);
            }
            forecast.extend(self.app.forecast.iter().map(|p| [date_x(p.date), p.close]));
            plot_ui.line(
                Line::new(PlotPoints::new(forecast))
                    .name("LSTM Forecast")
                    .color(ACCENT_YELLOW)
                    .style(egui_plot::LineStyle::Dashed { length: 6.0 })
                    .width(2.0),
            );
        }
    }

    fn render_side_panel(&self, ui: &mut egui::Ui) {
        egui::Frame::none()
            .fill(BG_CARD)
            .rounding(egui::Rounding::same(8.0))
            .stroke(egui::Stroke::new(1.0, BORDER_SUBTLE))
            .inner_margin(egui::Margin::same(12.0))
            .show(ui, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    if let Some(series) = &self.app.series {
                        section_header(ui, "Series");
                        stat_row(ui, "Trading days", &series.len().to_string(), TEXT_PRIMARY);
                        if let Some((low, high)) = series.bounds() {
                            stat_row(ui, "High", &format!("${:.2}", high), ACCENT_GREEN);
                            stat_row(ui, "Low", &format!("${:.2}", low), ACCENT_RED);
                        }
                        if let (Some(first), Some(last)) = (series.points.first(), series.last()) {
                            stat_row(ui, "From", &first.date.format(DATE_FORMAT).to_string(), TEXT_SECONDARY);
                            stat_row(ui, "To", &last.date.format(DATE_FORMAT).to_string(), TEXT_SECONDARY);
                        }
                        ui.add_space(8.0);
                        ui.add(egui::Separator::default().spacing(4.0));
                        ui.add_space(8.0);
                    }

                    if let Some((algorithm, trade)) = &self.app.trade {
                        section_header(ui, algorithm.label());
                        let color = if trade.is_profitable() { ACCENT_GREEN } else { TEXT_SECONDARY };
                        stat_row(ui, "Profit / share", &format!("${:.2}", trade.profit), color);
                        if let (Some(buy), Some(sell)) = (trade.buy, trade.sell) {
                            stat_row(ui, "Buy", &buy.date.format(DATE_FORMAT).to_string(), ACCENT_GREEN);
                            stat_row(ui, "Sell", &sell.date.format(DATE_FORMAT).to_string(), ACCENT_RED);
                        }
                        ui.add_space(8.0);
                    }

                    if let (Some(target), Some(series)) = (self.app.forecast.last(), &self.app.series) {
                        section_header(ui, "LSTM Forecast");
                        stat_row(ui, "Target", &target.date.format(DATE_FORMAT).to_string(), TEXT_SECONDARY);
                        stat_row(ui, "Predicted", &format!("${:.2}", target.close), ACCENT_YELLOW);
                        if let Some(last) = series.last() {
                            let pct = (target.close / last.close - 1.0) * 100.0;
                            let color = if pct >= 0.0 { ACCENT_GREEN } else { ACCENT_RED };
                            stat_row(ui, "vs last close", &format!("{:+.1}%", pct), color);
                        }
                    }
                });
            });
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Training Tab
// ──────────────────────────────────────────────────────────────────────────────

impl GuiApp {
    fn render_train_tab(&mut self, ui: &mut egui::Ui) {
        let running = self.app.state == AppState::Training;

        ui.add_space(8.0);
        egui::Frame::none()
            .fill(BG_CARD)
            .rounding(egui::Rounding::same(8.0))
            .stroke(egui::Stroke::new(1.0, BORDER_SUBTLE))
            .inner_margin(egui::Margin::same(16.0))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new("LSTM Hyperparameters")
                        .size(16.0)
                        .strong()
                        .color(TEXT_PRIMARY));

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let (status_text, status_color) = if running {
                            ("Training...", ACCENT_YELLOW)
                        } else if self.app.train_log.is_empty() {
                            ("Ready", TEXT_SECONDARY)
                        } else {
                            ("Completed", ACCENT_GREEN)
                        };
                        ui.label(egui::RichText::new(status_text)
                            .size(12.0)
                            .strong()
                            .color(status_color));
                    });
                });

                ui.add_space(12.0);

                ui.horizontal(|ui| {
                    ui.spacing_mut().item_spacing.x = 16.0;
                    let fields = [
                        ("Epochs", &mut self.train_epochs),
                        ("Batch Size", &mut self.train_batch_size),
                        ("Learning Rate", &mut self.train_lr),
                        ("Patience", &mut self.train_patience),
                    ];
                    for (label, value) in fields {
                        ui.vertical(|ui| {
                            ui.label(egui::RichText::new(label).size(11.0).color(TEXT_SECONDARY));
                            ui.add_enabled(!running, egui::TextEdit::singleline(value).desired_width(80.0));
                        });
                    }
                });

                ui.add_space(6.0);
                let device = if self.app.train_options.use_cuda { "CUDA" } else { "CPU" };
                ui.label(egui::RichText::new(format!("Device: {}", device))
                    .size(11.0)
                    .color(ACCENT_CYAN));
                ui.label(egui::RichText::new("Applied on the next Predict. Changing the ticker or range refits the model.")
                    .size(11.0)
                    .color(TEXT_SECONDARY));
            });

        ui.add_space(8.0);

        if self.app.train_log.is_empty() && self.app.train_messages.is_empty() {
            let available = ui.available_size();
            ui.vertical_centered(|ui| {
                ui.add_space(available.y * 0.2);
                ui.label(egui::RichText::new("No training run yet")
                    .size(20.0)
                    .strong()
                    .color(TEXT_PRIMARY));
                ui.add_space(8.0);
                ui.label(egui::RichText::new("Fill in a predict date and press Predict to fit the LSTM.")
                    .size(13.0)
                    .color(TEXT_SECONDARY));
            });
            return;
        }

        let available = ui.available_size();
        let chart_height = (available.y * 0.6).max(200.0);
        ui.horizontal(|ui| {
            ui.vertical(|ui| {
                ui.set_width(available.x * 0.6);
                self.render_loss_chart(ui, chart_height);
            });
            ui.vertical(|ui| {
                self.render_train_stats_and_log(ui, chart_height);
            });
        });
    }

    fn render_loss_chart(&self, ui: &mut egui::Ui, height: f32) {
        egui::Frame::none()
            .fill(BG_CARD)
            .rounding(egui::Rounding::same(8.0))
            .stroke(egui::Stroke::new(1.0, BORDER_SUBTLE))
            .inner_margin(egui::Margin::same(8.0))
            .show(ui, |ui| {
                section_header(ui, "Training Loss Curve");

                let plot = Plot::new("loss_chart")
                    .legend(egui_plot::Legend::default().position(egui_plot::Corner::RightTop))
                    .x_axis_label("Epoch")
                    .y_axis_label("MSE")
                    .height(height - 40.0)
                    .allow_drag(true)
                    .allow_zoom(true);

                plot.show(ui, |plot_ui| {
                    let train_points: PlotPoints = self.app.train_log.iter()
                        .map(|e| [e.epoch as f64, e.train_loss])
                        .collect();
                    plot_ui.line(
                        Line::new(train_points)
                            .name("Train Loss")
                            .color(ACCENT_BLUE)
                            .width(2.0),
                    );

                    let val_points: PlotPoints = self.app.train_log.iter()
                        .map(|e| [e.epoch as f64, e.val_loss])
                        .collect();
                    plot_ui.line(
                        Line::new(val_points)
                            .name("Val Loss")
                            .color(ACCENT_ORANGE)
                            .width(2.0),
                    );
                });
            });
    }

    fn render_train_stats_and_log(&self, ui: &mut egui::Ui, height: f32) {
        egui::Frame::none()
            .fill(BG_CARD)
            .rounding(egui::Rounding::same(8.0))
            .stroke(egui::Stroke::new(1.0, BORDER_SUBTLE))
            .inner_margin(egui::Margin::same(12.0))
            .show(ui, |ui| {
                section_header(ui, "Training Statistics");

                if let Some(last) = self.app.train_log.last() {
                    stat_row(ui, "Current Epoch", &last.epoch.to_string(), ACCENT_CYAN);
                    stat_row(ui, "Train Loss", &format!("{:.6}", last.train_loss), ACCENT_BLUE);
                    stat_row(ui, "Val Loss", &format!("{:.6}", last.val_loss), ACCENT_ORANGE);

                    let best_val = self.app.train_log.iter()
                        .map(|e| e.val_loss)
                        .fold(f64::INFINITY, f64::min);
                    stat_row(ui, "Best Val Loss", &format!("{:.6}", best_val), ACCENT_GREEN);

                    let total_epochs = self.app.train_options.epochs.max(1);
                    let progress = last.epoch as f32 / total_epochs as f32;
                    ui.add_space(8.0);
                    ui.label(egui::RichText::new(format!("Progress: {}/{}", last.epoch, total_epochs))
                        .size(11.0)
                        .color(TEXT_SECONDARY));
                    ui.add(egui::ProgressBar::new(progress.min(1.0))
                        .fill(ACCENT_BLUE)
                        .animate(self.app.state == AppState::Training));
                } else {
                    ui.label(egui::RichText::new("Waiting for first epoch...")
                        .size(12.0)
                        .color(TEXT_SECONDARY));
                    ui.spinner();
                }
            });

        ui.add_space(8.0);

        let log_height = (height - 200.0).max(100.0);
        egui::Frame::none()
            .fill(BG_CARD)
            .rounding(egui::Rounding::same(8.0))
            .stroke(egui::Stroke::new(1.0, BORDER_SUBTLE))
            .inner_margin(egui::Margin::same(12.0))
            .show(ui, |ui| {
                section_header(ui, "Log");
                egui::ScrollArea::vertical()
                    .max_height(log_height)
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for msg in &self.app.train_messages {
                            ui.label(egui::RichText::new(msg)
                                .size(10.0)
                                .color(TEXT_SECONDARY)
                                .family(egui::FontFamily::Monospace));
                        }
                        for entry in &self.app.train_log {
                            ui.label(egui::RichText::new(
                                format!("Epoch {:>3}: train={:.6}  val={:.6}",
                                    entry.epoch, entry.train_loss, entry.val_loss))
                                .size(10.0)
                                .color(TEXT_SECONDARY)
                                .family(egui::FontFamily::Monospace));
                        }
                    });
            });
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────────────────────────────────────

fn date_x(date: NaiveDate) -> f64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp() as f64
}

fn format_ts(x: f64, fmt: &str) -> String {
    chrono::Utc
        .timestamp_opt(x as i64, 0)
        .single()
        .map(|dt| dt.format(fmt).to_string())
        .unwrap_or_default()
}

fn render_centered_status(ui: &mut egui::Ui, message: &str, progress: Option<f32>) {
    let available = ui.available_size();
    ui.vertical_centered(|ui| {
        ui.add_space(available.y * 0.3);
        ui.label(egui::RichText::new(message).size(16.0).color(TEXT_PRIMARY));

        if let Some(p) = progress {
            ui.add_space(16.0);
            ui.add_sized(
                [300.0, 8.0],
                egui::ProgressBar::new(p)
                    .animate(true)
                    .fill(ACCENT_BLUE),
            );
            ui.add_space(6.0);
            ui.label(
                egui::RichText::new(format!("{:.0}%", p * 100.0))
                    .size(12.0)
                    .color(TEXT_SECONDARY),
            );
        } else {
            ui.add_space(12.0);
            ui.spinner();
        }
    });
}

fn section_header(ui: &mut egui::Ui, text: &str) {
    ui.label(egui::RichText::new(text)
        .size(13.0)
        .strong()
        .color(TEXT_PRIMARY));
    ui.add_space(4.0);
}

fn stat_row(ui: &mut egui::Ui, label: &str, value: &str, color: egui::Color32) {
    ui.horizontal(|ui| {
        ui.label(egui::RichText::new(label).size(11.0).color(TEXT_SECONDARY));
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            ui.label(egui::RichText::new(value).size(12.0).strong().color(color));
        });
    });
}
