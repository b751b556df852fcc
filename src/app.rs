use crate::data::{is_trading_day, parse_date, parse_symbol, DateRange, PricePoint, PriceSeries, PriceSource};
use crate::error::InputError;
use crate::inference;
use crate::profit::{ProfitAlgorithm, TradeResult};
use crate::train::{self, TrainMessage, TrainOptions, TrainedPredictor};
use chrono::NaiveDate;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc::{self, Receiver};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppState {
    Input,
    Loading,
    Training,
    Dashboard,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputField {
    Ticker,
    Start,
    End,
    PredictDate,
}

impl InputField {
    pub const ALL: [InputField; 4] = [
        InputField::Ticker,
        InputField::Start,
        InputField::End,
        InputField::PredictDate,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Ticker => "Ticker Symbol",
            Self::Start => "Start Date (YYYY-MM-DD)",
            Self::End => "End Date (YYYY-MM-DD)",
            Self::PredictDate => "Predict Date (YYYY-MM-DD)",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Ticker => Self::Start,
            Self::Start => Self::End,
            Self::End => Self::PredictDate,
            Self::PredictDate => Self::Ticker,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Self::Ticker => Self::PredictDate,
            Self::Start => Self::Ticker,
            Self::End => Self::Start,
            Self::PredictDate => Self::End,
        }
    }
}

/// What the user asked for: one per button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Graph,
    Profit(ProfitAlgorithm),
    Predict,
}

/// A validated form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub symbol: String,
    pub range: DateRange,
    pub predict_date: Option<NaiveDate>,
}

/// A single training epoch log entry.
#[derive(Clone, Debug)]
pub struct TrainLogEntry {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
}

/// A fitted predictor and the options it was trained with.
#[derive(Clone)]
struct FittedPredictor {
    options: TrainOptions,
    model: Arc<TrainedPredictor>,
}

type ForecastResult = anyhow::Result<(FittedPredictor, Vec<PricePoint>)>;

pub struct App {
    pub should_quit: bool,
    pub state: AppState,
    pub ticker: String,
    pub start_date: String,
    pub end_date: String,
    pub predict_date: String,
    pub focus: InputField,
    pub source: PriceSource,
    pub series: Option<Arc<PriceSeries>>,
    pub trade: Option<(ProfitAlgorithm, TradeResult)>,
    pub result_text: Option<String>,
    pub forecast: Vec<PricePoint>,
    pub error_msg: Option<String>,
    pub train_log: Vec<TrainLogEntry>,
    pub train_messages: Vec<String>,
    pub train_options: TrainOptions,
    loaded: Option<Request>,
    predictor: Option<FittedPredictor>,
    pending: Option<Action>,
    data_rx: Option<Receiver<anyhow::Result<PriceSeries>>>,
    train_rx: Option<Receiver<TrainMessage>>,
    forecast_rx: Option<Receiver<ForecastResult>>,
}

impl App {
    pub fn new(source: PriceSource, train_options: TrainOptions) -> Self {
        Self {
            should_quit: false,
            state: AppState::Input,
            ticker: String::new(),
            start_date: String::new(),
            end_date: String::new(),
            predict_date: String::new(),
            focus: InputField::Ticker,
            source,
            series: None,
            trade: None,
            result_text: None,
            forecast: Vec::new(),
            error_msg: None,
            train_log: Vec::new(),
            train_messages: Vec::new(),
            train_options,
            loaded: None,
            predictor: None,
            pending: None,
            data_rx: None,
            train_rx: None,
            forecast_rx: None,
        }
    }

    pub fn field(&self, field: InputField) -> &str {
        match field {
            InputField::Ticker => &self.ticker,
            InputField::Start => &self.start_date,
            InputField::End => &self.end_date,
            InputField::PredictDate => &self.predict_date,
        }
    }

    pub fn field_mut(&mut self, field: InputField) -> &mut String {
        match field {
            InputField::Ticker => &mut self.ticker,
            InputField::Start => &mut self.start_date,
            InputField::End => &mut self.end_date,
            InputField::PredictDate => &mut self.predict_date,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, AppState::Loading | AppState::Training)
    }

    /// Checks the form for `action`.
    pub fn validate(&self, action: Action) -> Result<Request, InputError> {
        let symbol = self.ticker.trim();
        let start = self.start_date.trim();
        let end = self.end_date.trim();
        if symbol.is_empty() || start.is_empty() || end.is_empty() {
            return Err(InputError::MissingFields);
        }
        let symbol = parse_symbol(symbol)?;
        let range = DateRange::new(parse_date(start)?, parse_date(end)?)?;

        let predict_date = match action {
            Action::Predict => {
                let raw = self.predict_date.trim();
                if raw.is_empty() {
                    return Err(InputError::MissingFields);
                }
                let date = parse_date(raw)?;
                if !is_trading_day(date) {
                    return Err(InputError::PredictDateNotTradingDay { date: raw.to_string() });
                }
                Some(date)
            }
            _ => None,
        };

        Ok(Request {
            symbol,
            range,
            predict_date,
        })
    }

    /// Validates the form and starts `action`, fetching prices first when
    /// the ticker or range changed since the last load.
    pub fn trigger(&mut self, action: Action) {
        if self.is_busy() {
            return;
        }
        let request = match self.validate(action) {
            Ok(req) => req,
            Err(e) => {
                self.error_msg = Some(e.to_string());
                return;
            }
        };
        self.error_msg = None;

        let same_series = self.loaded.as_ref().is_some_and(|loaded| {
            loaded.symbol == request.symbol && loaded.range == request.range
        });
        if same_series && self.series.is_some() {
            self.loaded = Some(request);
            self.apply(action);
            return;
        }

        info!("Loading {} {:?}", request.symbol, request.range);
        self.state = AppState::Loading;
        self.pending = Some(action);
        self.predictor = None;
        let source = self.source.clone();
        let symbol = request.symbol.clone();
        let range = request.range;
        self.loaded = Some(request);

        let (tx, rx) = mpsc::channel(1);
        self.data_rx = Some(rx);
        tokio::spawn(async move {
            let res = source.load(&symbol, &range).await;
            let _ = tx.send(res).await;
        });
    }

    /// Drains finished background work into the visible state.
    pub fn tick(&mut self) {
        if let Some(rx) = &mut self.data_rx {
            if let Ok(res) = rx.try_recv() {
                self.data_rx = None;
                match res {
                    Ok(series) => {
                        info!("Loaded {} closes for {}", series.len(), series.symbol);
                        self.series = Some(Arc::new(series));
                        self.trade = None;
                        self.result_text = None;
                        self.forecast.clear();
                        if let Some(action) = self.pending.take() {
                            self.apply(action);
                        } else {
                            self.state = AppState::Dashboard;
                        }
                    }
                    Err(e) => {
                        warn!("Load failed: {}", e);
                        self.error_msg = Some(e.to_string());
                        self.series = None;
                        self.loaded = None;
                        self.pending = None;
                        self.state = AppState::Input;
                    }
                }
            }
        }

        if let Some(rx) = &mut self.train_rx {
            while let Ok(msg) = rx.try_recv() {
                match msg {
                    TrainMessage::Epoch {
                        epoch,
                        train_loss,
                        val_loss,
                    } => self.train_log.push(TrainLogEntry {
                        epoch,
                        train_loss,
                        val_loss,
                    }),
                    TrainMessage::Log(msg) => self.train_messages.push(msg),
                    TrainMessage::Finished => {}
                    TrainMessage::Error(e) => self.train_messages.push(format!("Error: {}", e)),
                }
            }
        }

        if let Some(rx) = &mut self.forecast_rx {
            if let Ok(res) = rx.try_recv() {
                self.forecast_rx = None;
                self.train_rx = None;
                match res {
                    Ok((fitted, forecast)) => {
                        self.predictor = Some(fitted);
                        self.result_text = forecast.last().map(|p| {
                            format!(
                                "LSTM Predicted Close: ${:.2}\nDate: {}",
                                p.close,
                                p.date.format(crate::config::DATE_FORMAT)
                            )
                        });
                        self.forecast = forecast;
                    }
                    Err(e) => {
                        warn!("Prediction failed: {}", e);
                        self.error_msg = Some(format!("Prediction failed: {}", e));
                    }
                }
                self.state = AppState::Dashboard;
            }
        }
    }

    fn apply(&mut self, action: Action) {
        let Some(series) = self.series.clone() else {
            self.state = AppState::Input;
            return;
        };

        match action {
            Action::Graph => {
                self.trade = None;
                self.result_text = None;
                self.state = AppState::Dashboard;
            }
            Action::Profit(algorithm) => {
                let result = algorithm.run(&series.points);
                info!("{} on {}: profit {:.2}", algorithm.label(), series.symbol, result.profit);
                self.result_text = Some(result.summary(algorithm));
                self.trade = Some((algorithm, result));
                self.state = AppState::Dashboard;
            }
            Action::Predict => {
                let Some(target) = self.loaded.as_ref().and_then(|r| r.predict_date) else {
                    self.error_msg = Some(InputError::MissingFields.to_string());
                    self.state = AppState::Input;
                    return;
                };
                self.start_prediction(series, target);
            }
        }
    }

    fn start_prediction(&mut self, series: Arc<PriceSeries>, target: NaiveDate) {
        self.state = AppState::Training;
        self.forecast.clear();
        self.trade = None;
        self.result_text = None;

        let (res_tx, res_rx) = mpsc::channel(1);
        self.forecast_rx = Some(res_rx);

        let reusable = self
            .predictor
            .clone()
            .filter(|fitted| fitted.options == self.train_options);
        if let Some(fitted) = reusable {
            info!("Reusing fitted predictor for {}", series.symbol);
            tokio::spawn(async move {
                let res = forecast_blocking(fitted, series, target).await;
                let _ = res_tx.send(res).await;
            });
            return;
        }

        self.predictor = None;
        self.train_log.clear();
        self.train_messages.clear();
        let (tx, rx) = mpsc::channel(256);
        self.train_rx = Some(rx);
        let options = self.train_options.clone();

        tokio::spawn(async move {
            let _ = tx
                .send(TrainMessage::Log(format!(
                    "Starting training: epochs={}, batch={}, lr={}, patience={}",
                    options.epochs, options.batch_size, options.learning_rate, options.patience
                )))
                .await;

            let res = match train::train_lstm_model(&series, options.clone(), Some(tx.clone())).await {
                Ok(predictor) => {
                    let _ = tx.send(TrainMessage::Finished).await;
                    let fitted = FittedPredictor {
                        options,
                        model: Arc::new(predictor),
                    };
                    forecast_blocking(fitted, series, target).await
                }
                Err(e) => {
                    let _ = tx.send(TrainMessage::Error(e.to_string())).await;
                    Err(e)
                }
            };
            let _ = res_tx.send(res).await;
        });
    }

    /// Back to the form, keeping the typed values.
    pub fn reset(&mut self) {
        self.state = AppState::Input;
        self.trade = None;
        self.result_text = None;
        self.forecast.clear();
        self.error_msg = None;
    }

    pub async fn run(&mut self, terminal: &mut crate::tui::Tui) -> io::Result<()> {
        while !self.should_quit {
            terminal.draw(|f| crate::ui::render(f, self))?;

            self.tick();

            if event::poll(std::time::Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code, key.modifiers);
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        if let Some(action) = action_for_key(code) {
            self.trigger(action);
            return;
        }

        match self.state {
            AppState::Input => match code {
                KeyCode::Char(c) => self.field_mut(self.focus).push(c),
                KeyCode::Backspace => {
                    self.field_mut(self.focus).pop();
                }
                KeyCode::Tab | KeyCode::Down => self.focus = self.focus.next(),
                KeyCode::BackTab | KeyCode::Up => self.focus = self.focus.prev(),
                KeyCode::Enter => self.trigger(Action::Graph),
                KeyCode::Esc => self.should_quit = true,
                _ => {}
            },
            AppState::Loading | AppState::Training => {
                if code == KeyCode::Esc {
                    self.should_quit = true;
                }
            }
            AppState::Dashboard => match code {
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                KeyCode::Char('r') => self.reset(),
                _ => {}
            },
        }
    }
}

async fn forecast_blocking(
    fitted: FittedPredictor,
    series: Arc<PriceSeries>,
    target: NaiveDate,
) -> ForecastResult {
    tokio::task::spawn_blocking(move || {
        inference::forecast_until(&fitted.model, &series, target).map(|f| (fitted, f))
    })
    .await?
}

/// Function keys mirror the four buttons, plus the multi-trade scan.
pub fn action_for_key(code: KeyCode) -> Option<Action> {
    match code {
        KeyCode::F(1) => Some(Action::Graph),
        KeyCode::F(2) => Some(Action::Profit(ProfitAlgorithm::DynamicProgramming)),
        KeyCode::F(3) => Some(Action::Profit(ProfitAlgorithm::Greedy)),
        KeyCode::F(4) => Some(Action::Predict),
        KeyCode::F(5) => Some(Action::Profit(ProfitAlgorithm::PositiveDeltas)),
        _ => None,
    }
}
