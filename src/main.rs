mod app;
mod config;
mod data;
mod error;
mod gui;
mod inference;
mod models;
mod preprocess;
mod profit;
mod train;
mod tui;
mod ui;

use app::App;
use clap::Parser;
use data::{DateRange, PriceSource};
use profit::ProfitAlgorithm;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use train::TrainOptions;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Stock Market Predictor: closing-price charts, max-profit scans and LSTM forecasts",
    after_help = "EXAMPLES:
    # Interactive terminal UI
    cargo run --release

    # Native window
    cargo run --release -- --gui

    # Headless: best single trade with both scans
    cargo run --release -- --ticker AAPL --start 2023-01-01 --end 2024-01-01

    # Headless: fit the LSTM and forecast through a date
    cargo run --release -- --ticker AAPL --start 2020-01-01 --end 2024-01-01 --predict --predict-date 2024-01-10

    # Offline, from a CSV export with Date and Close columns
    cargo run --release -- --csv prices.csv --ticker AAPL --start 2023-01-01 --end 2024-01-01 --algorithm deltas"
)]
struct Args {
    /// Ticker symbol; with --start and --end runs headless instead of opening a UI
    #[arg(long)]
    ticker: Option<String>,

    /// First day of the range (YYYY-MM-DD, inclusive)
    #[arg(long)]
    start: Option<String>,

    /// Last day of the range (YYYY-MM-DD, exclusive)
    #[arg(long)]
    end: Option<String>,

    /// Profit scan to run headless; repeatable (default: greedy and dp)
    #[arg(long, value_enum)]
    algorithm: Vec<ProfitAlgorithm>,

    /// Fit the LSTM and predict the next close (headless)
    #[arg(long)]
    predict: bool,

    /// Forecast day by day through this date (YYYY-MM-DD); implies --predict
    #[arg(long)]
    predict_date: Option<String>,

    /// Read closing prices from a CSV file instead of Yahoo Finance
    #[arg(long, conflicts_with = "mock")]
    csv: Option<PathBuf>,

    /// Use a random-walk series instead of fetching prices
    #[arg(long)]
    mock: bool,

    /// Launch in GUI mode
    #[arg(long)]
    gui: bool,

    /// Number of epochs for training (default: 100)
    #[arg(long)]
    epochs: Option<usize>,

    /// Batch size for training (default: 32)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Learning rate for training (default: 0.001)
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Early stopping patience: stop after this many epochs without improvement (default: 10)
    #[arg(long)]
    patience: Option<usize>,

    /// Use CUDA GPU acceleration (requires --features cuda at compile time)
    #[arg(long)]
    cuda: bool,
}

impl Args {
    fn source(&self) -> PriceSource {
        match (&self.csv, self.mock) {
            (Some(path), _) => PriceSource::Csv(path.clone()),
            (None, true) => PriceSource::Mock,
            (None, false) => PriceSource::Yahoo,
        }
    }

    fn is_headless(&self) -> bool {
        self.ticker.is_some() || self.start.is_some() || self.end.is_some()
    }
}

fn init_logging(interactive_terminal: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("stock_predictor=info,wgpu_core=error,wgpu_hal=error")
    });

    // The terminal UI owns stdout, so its logs go to a file.
    if interactive_terminal {
        let log_dir = &config::settings().log_dir;
        let file = std::fs::create_dir_all(log_dir)
            .and_then(|_| std::fs::File::create(log_dir.join("stock_predictor.log")));
        match file {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
            Err(_) => {
                tracing_subscriber::fmt()
                    .with_env_filter(EnvFilter::new("off"))
                    .init();
            }
        }
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .init();
}

async fn run_headless(args: &Args, options: TrainOptions) -> anyhow::Result<()> {
    let (Some(ticker), Some(start), Some(end)) = (&args.ticker, &args.start, &args.end) else {
        return Err(error::InputError::MissingFields.into());
    };
    let range = DateRange::new(data::parse_date(start)?, data::parse_date(end)?)?;
    let predict_date = args
        .predict_date
        .as_deref()
        .map(data::parse_date)
        .transpose()?;
    if let Some(date) = predict_date.filter(|d| !data::is_trading_day(*d)) {
        return Err(error::InputError::PredictDateNotTradingDay {
            date: date.format(config::DATE_FORMAT).to_string(),
        }
        .into());
    }

    let series = args.source().load(ticker, &range).await?;
    println!(
        "{}: {} closes from {} to {}",
        series.symbol,
        series.len(),
        series.points[0].date.format(config::DATE_FORMAT),
        series.points[series.len() - 1].date.format(config::DATE_FORMAT)
    );

    let algorithms = if args.algorithm.is_empty() {
        vec![ProfitAlgorithm::Greedy, ProfitAlgorithm::DynamicProgramming]
    } else {
        args.algorithm.clone()
    };
    for algorithm in algorithms {
        println!("\n{}", algorithm.run(&series.points).summary(algorithm));
    }

    if args.predict || predict_date.is_some() {
        let predictor = train::train_lstm_model(&series, options, None).await?;
        info!(
            "Fitted predictor in {} epochs (best loss {:.6})",
            predictor.epochs_completed, predictor.best_loss
        );

        let next = inference::predict_next_close(&predictor, &series)?;
        println!(
            "\nLSTM Predicted Close: ${:.2}\nDate: {}",
            next.close,
            next.date.format(config::DATE_FORMAT)
        );

        if let Some(target) = predict_date {
            let forecast = inference::forecast_until(&predictor, &series, target)?;
            println!("\nForecast through {}:", target.format(config::DATE_FORMAT));
            for point in &forecast {
                println!("  {}  ${:.2}", point.date.format(config::DATE_FORMAT), point.close);
            }
        }
    }

    Ok(())
}

/// Reports a headless run and maps it to the process exit status.
fn headless_status(res: anyhow::Result<()>) -> u8 {
    match res {
        Ok(()) => 0,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() -> io::Result<ExitCode> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load .env: {}", e);
        }
    }

    let args = Args::parse();
    init_logging(!args.gui && !args.is_headless());
    config::init_cpu_parallelism();

    if args.cuda && !cfg!(feature = "cuda") {
        error!(
            "--cuda was requested, but this binary was compiled without CUDA support. Re-run with: cargo run --release --features cuda -- --cuda"
        );
        return Ok(ExitCode::FAILURE);
    }

    let options = TrainOptions::with_overrides(
        args.epochs,
        args.batch_size,
        args.learning_rate,
        args.patience,
        args.cuda,
    );

    if args.is_headless() {
        if args.gui {
            warn!("--gui is ignored when --ticker/--start/--end are given");
        }
        let status = headless_status(run_headless(&args, options).await);
        return Ok(ExitCode::from(status));
    }

    if args.gui {
        let options_native = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([1280.0, 800.0])
                .with_title("Stock Market Predictor"),
            ..Default::default()
        };
        info!("Launching GUI");
        let app = App::new(args.source(), options);
        eframe::run_native(
            "Stock Market Predictor",
            options_native,
            Box::new(|_cc| Ok(Box::new(gui::GuiApp::new(app)))),
        )
        .map_err(|e| io::Error::other(e.to_string()))?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut terminal = tui::init()?;
    let mut app = App::new(args.source(), options);
    let res = app.run(&mut terminal).await;

    tui::restore()?;

    if let Err(e) = res {
        error!("Error: {:?}", e);
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
