use crate::config::{self, get_device, BATCH_SIZE, EPOCHS, LEARNING_RATE, LOOK_BACK, PATIENCE, TRAIN_RATIO};
use crate::data::PriceSeries;
use crate::models::lstm::{LstmShape, PriceLstm};
use crate::preprocess::{prepare_lstm_data, LstmDataset, MinMaxScaler};
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{Optimizer, VarBuilder, VarMap};
use chrono::Utc;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Progress events emitted while fitting, consumed by the front ends.
#[derive(Clone, Debug, PartialEq)]
pub enum TrainMessage {
    Epoch { epoch: usize, train_loss: f64, val_loss: f64 },
    Log(String),
    Finished,
    Error(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrainOptions {
    pub look_back: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub patience: usize,
    pub train_ratio: f64,
    pub use_cuda: bool,
    pub checkpoint_path: PathBuf,
    /// Directory for the JSON run log; `None` skips writing it.
    pub log_dir: Option<PathBuf>,
}

impl Default for TrainOptions {
    fn default() -> Self {
        let settings = config::settings();
        Self {
            look_back: LOOK_BACK,
            epochs: EPOCHS,
            batch_size: BATCH_SIZE,
            learning_rate: LEARNING_RATE,
            patience: PATIENCE,
            train_ratio: TRAIN_RATIO,
            use_cuda: false,
            checkpoint_path: settings.checkpoint_path.clone(),
            log_dir: Some(settings.log_dir.clone()),
        }
    }
}

impl TrainOptions {
    /// Applies CLI overrides on top of the defaults.
    pub fn with_overrides(
        epochs: Option<usize>,
        batch_size: Option<usize>,
        learning_rate: Option<f64>,
        patience: Option<usize>,
        use_cuda: bool,
    ) -> Self {
        let defaults = Self::default();
        Self {
            epochs: epochs.unwrap_or(defaults.epochs),
            batch_size: batch_size.unwrap_or(defaults.batch_size).max(1),
            learning_rate: learning_rate.unwrap_or(defaults.learning_rate),
            patience: patience.unwrap_or(defaults.patience),
            use_cuda,
            ..defaults
        }
    }
}

/// A fitted network together with everything needed to run it on raw prices.
pub struct TrainedPredictor {
    pub model: PriceLstm,
    pub scaler: MinMaxScaler,
    pub look_back: usize,
    pub device: Device,
    pub best_loss: f64,
    pub epochs_completed: usize,
}

#[derive(Serialize)]
struct EpochLogEntry {
    epoch: usize,
    train_loss: f64,
    val_loss: f64,
}

#[derive(Serialize)]
struct TrainingRunLog {
    symbol: String,
    started_at: String,
    finished_at: String,
    use_cuda: bool,
    samples: usize,
    look_back: usize,
    epochs_requested: usize,
    epochs_completed: usize,
    batch_size: usize,
    learning_rate: f64,
    patience: usize,
    best_loss: f64,
    stop_reason: Option<String>,
    epoch_metrics: Vec<EpochLogEntry>,
}

fn persist_training_log(log_dir: &Path, run_log: &TrainingRunLog) -> Result<PathBuf> {
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)?;
    }

    let file_name = format!(
        "training_{}_{}_{}.json",
        run_log.symbol,
        Utc::now().format("%Y%m%d_%H%M%S"),
        std::process::id()
    );
    let file_path = log_dir.join(file_name);

    let file = std::fs::File::create(&file_path)?;
    let writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(writer, run_log)?;

    Ok(file_path)
}

// Progress is best-effort: a full or closed channel never stalls training.
fn notify(tx: Option<&mpsc::Sender<TrainMessage>>, msg: TrainMessage) {
    if let Some(tx) = tx {
        let _ = tx.try_send(msg);
    }
}

fn batch_tensors(
    data: &LstmDataset,
    indices: &[usize],
    look_back: usize,
    device: &Device,
) -> Result<(Tensor, Tensor)> {
    let mut inputs = Vec::with_capacity(indices.len() * look_back);
    let mut targets = Vec::with_capacity(indices.len());
    for &idx in indices {
        inputs.extend(data.inputs[idx].iter().map(|&v| v as f32));
        targets.push(data.targets[idx] as f32);
    }
    let x = Tensor::from_vec(inputs, (indices.len(), look_back, 1), device)?;
    let y = Tensor::from_vec(targets, (indices.len(), 1), device)?;
    Ok((x, y))
}

fn mse(model: &PriceLstm, x: &Tensor, y: &Tensor, train: bool) -> Result<Tensor> {
    let pred = model.forward(x, train)?;
    Ok((pred - y)?.sqr()?.mean_all()?)
}

/// Fits the LSTM predictor on the closes of `series`.
///
/// Runs on the blocking pool; progress goes to `progress` when given.
pub async fn train_lstm_model(
    series: &PriceSeries,
    options: TrainOptions,
    progress: Option<mpsc::Sender<TrainMessage>>,
) -> Result<TrainedPredictor> {
    let series = series.clone();
    tokio::task::spawn_blocking(move || train_blocking(&series, &options, progress.as_ref())).await?
}

pub fn train_blocking(
    series: &PriceSeries,
    options: &TrainOptions,
    progress: Option<&mpsc::Sender<TrainMessage>>,
) -> Result<TrainedPredictor> {
    let started_at = Utc::now();
    let closes = series.closes();
    let scaler = MinMaxScaler::fit(&closes)?;
    let scaled = scaler.transform(&closes);
    let dataset = prepare_lstm_data(&scaled, options.look_back)?;
    let samples = dataset.len();
    let (train_data, val_data) = dataset.split(options.train_ratio);

    if train_data.is_empty() {
        anyhow::bail!(
            "Not enough history to train: {} windows, none left for training",
            samples
        );
    }

    info!(
        "Training {} predictor: {} train / {} val windows, look_back={}, epochs={}, batch={}, lr={}",
        series.symbol,
        train_data.len(),
        val_data.len(),
        options.look_back,
        options.epochs,
        options.batch_size,
        options.learning_rate
    );
    notify(
        progress,
        TrainMessage::Log(format!(
            "Data ready: {} train / {} val windows",
            train_data.len(),
            val_data.len()
        )),
    );
    if val_data.is_empty() {
        warn!("No validation windows; early stopping monitors training loss");
    }

    let device = get_device(options.use_cuda);
    let mut varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let model = PriceLstm::new(LstmShape::default(), vb.pp("predictor"))?;

    let params = candle_nn::ParamsAdamW {
        lr: options.learning_rate,
        weight_decay: 0.0,
        ..Default::default()
    };
    let mut opt = candle_nn::AdamW::new(varmap.all_vars(), params)?;

    let batch_size = options.batch_size.max(1);
    let val_tensors = if val_data.is_empty() {
        None
    } else {
        let all: Vec<usize> = (0..val_data.len()).collect();
        Some(batch_tensors(&val_data, &all, options.look_back, &device)?)
    };

    if let Some(parent) = options.checkpoint_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut best_loss = f64::INFINITY;
    let mut saved_any = false;
    let mut epochs_without_improvement = 0;
    let mut epoch_metrics: Vec<EpochLogEntry> = Vec::with_capacity(options.epochs);
    let mut stop_reason: Option<String> = None;
    let mut indices: Vec<usize> = (0..train_data.len()).collect();

    for epoch in 0..options.epochs {
        let epoch_start = Instant::now();
        indices.shuffle(&mut rand::thread_rng());

        let mut total_train_loss = 0.0;
        let mut num_batches = 0;
        for batch in indices.chunks(batch_size) {
            let (x, y) = batch_tensors(&train_data, batch, options.look_back, &device)?;
            let loss = mse(&model, &x, &y, true)?;
            opt.backward_step(&loss)?;
            total_train_loss += loss.to_scalar::<f32>()? as f64;
            num_batches += 1;
        }
        let train_loss = total_train_loss / num_batches.max(1) as f64;

        let val_loss = match &val_tensors {
            Some((x, y)) => mse(&model, x, y, false)?.to_scalar::<f32>()? as f64,
            None => train_loss,
        };

        epoch_metrics.push(EpochLogEntry {
            epoch: epoch + 1,
            train_loss,
            val_loss,
        });
        notify(
            progress,
            TrainMessage::Epoch {
                epoch: epoch + 1,
                train_loss,
                val_loss,
            },
        );
        tracing::debug!(
            "Epoch {}/{}: train={:.6} val={:.6} ({:.2}s)",
            epoch + 1,
            options.epochs,
            train_loss,
            val_loss,
            epoch_start.elapsed().as_secs_f64()
        );

        if val_loss < best_loss {
            best_loss = val_loss;
            epochs_without_improvement = 0;
            varmap.save(&options.checkpoint_path)?;
            saved_any = true;
        } else {
            epochs_without_improvement += 1;
            if epochs_without_improvement >= options.patience {
                let msg = format!(
                    "Early stopping at epoch {}. Best loss: {:.6}",
                    epoch + 1,
                    best_loss
                );
                info!("{}", msg);
                notify(progress, TrainMessage::Log(msg));
                stop_reason = Some(format!(
                    "early_stopping_after_{}_epochs_without_improvement",
                    options.patience
                ));
                break;
            }
        }
    }

    if saved_any {
        varmap.load(&options.checkpoint_path)?;
        info!(
            "Restored best weights from {} (loss {:.6})",
            options.checkpoint_path.display(),
            best_loss
        );
    }

    let epochs_completed = epoch_metrics.len();
    notify(
        progress,
        TrainMessage::Log(format!("Training complete. Best loss: {:.6}", best_loss)),
    );

    if let Some(log_dir) = &options.log_dir {
        let run_log = TrainingRunLog {
            symbol: series.symbol.clone(),
            started_at: started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            use_cuda: options.use_cuda,
            samples,
            look_back: options.look_back,
            epochs_requested: options.epochs,
            epochs_completed,
            batch_size,
            learning_rate: options.learning_rate,
            patience: options.patience,
            best_loss,
            stop_reason,
            epoch_metrics,
        };
        match persist_training_log(log_dir, &run_log) {
            Ok(path) => info!("Training JSON log saved: {}", path.display()),
            Err(e) => warn!("Failed to save training JSON log: {}", e),
        }
    }

    Ok(TrainedPredictor {
        model,
        scaler,
        look_back: options.look_back,
        device,
        best_loss,
        epochs_completed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_options(dir: &Path, epochs: usize) -> TrainOptions {
        TrainOptions {
            look_back: 10,
            epochs,
            batch_size: 16,
            learning_rate: 1e-2,
            patience: 3,
            train_ratio: 0.8,
            use_cuda: false,
            checkpoint_path: dir.join("best.safetensors"),
            log_dir: Some(dir.join("log")),
        }
    }

    #[tokio::test]
    async fn test_train_model_integration() {
        let dir = tempfile::tempdir().unwrap();
        let series = PriceSeries::new_mock("TEST", 80);
        let (tx, mut rx) = mpsc::channel(256);

        let trained = train_lstm_model(&series, test_options(dir.path(), 4), Some(tx))
            .await
            .unwrap();

        assert_eq!(trained.look_back, 10);
        assert!(trained.epochs_completed >= 1 && trained.epochs_completed <= 4);
        assert!(trained.best_loss.is_finite());
        assert!(dir.path().join("best.safetensors").exists());

        let log_files: Vec<_> = std::fs::read_dir(dir.path().join("log")).unwrap().collect();
        assert_eq!(log_files.len(), 1);

        let mut epochs_seen = 0;
        while let Ok(msg) = rx.try_recv() {
            if let TrainMessage::Epoch { .. } = msg {
                epochs_seen += 1;
            }
        }
        assert_eq!(epochs_seen, trained.epochs_completed);
    }

    /// MSE of `trained` on the same chronological hold-out training used.
    fn holdout_loss(trained: &TrainedPredictor, series: &PriceSeries, options: &TrainOptions) -> f64 {
        let scaled = trained.scaler.transform(&series.closes());
        let dataset = prepare_lstm_data(&scaled, options.look_back).unwrap();
        let (_, val_data) = dataset.split(options.train_ratio);
        let all: Vec<usize> = (0..val_data.len()).collect();
        let (x, y) = batch_tensors(&val_data, &all, options.look_back, &trained.device).unwrap();
        mse(&trained.model, &x, &y, false).unwrap().to_scalar::<f32>().unwrap() as f64
    }

    #[test]
    fn test_best_weights_are_restored() {
        let dir = tempfile::tempdir().unwrap();
        let series = PriceSeries::new_mock("TEST", 80);
        let options = TrainOptions {
            patience: 100,
            log_dir: None,
            ..test_options(dir.path(), 8)
        };

        let trained = train_blocking(&series, &options, None).unwrap();
        assert_eq!(trained.epochs_completed, 8);
        let loss = holdout_loss(&trained, &series, &options);
        assert!(
            (loss - trained.best_loss).abs() < 1e-6,
            "hold-out loss {loss} != best loss {}",
            trained.best_loss
        );
    }

    #[test]
    fn test_stops_after_patience_without_improvement() {
        let dir = tempfile::tempdir().unwrap();
        let series = PriceSeries::new_mock("TEST", 80);
        // A zero learning rate freezes the weights, so the hold-out loss
        // never improves after the first epoch.
        let options = TrainOptions {
            learning_rate: 0.0,
            patience: 2,
            log_dir: None,
            ..test_options(dir.path(), 20)
        };

        let trained = train_blocking(&series, &options, None).unwrap();
        assert_eq!(trained.epochs_completed, 3);
        assert!(trained.epochs_completed < options.epochs);
        let loss = holdout_loss(&trained, &series, &options);
        assert!((loss - trained.best_loss).abs() < 1e-6);
    }

    #[test]
    fn test_train_rejects_short_series() {
        let dir = tempfile::tempdir().unwrap();
        let series = PriceSeries::new_mock("TEST", 10);
        let err = train_blocking(&series, &test_options(dir.path(), 1), None)
            .err()
            .unwrap();
        assert!(err.to_string().contains("must be greater than look_back"));
    }

    #[test]
    fn test_with_overrides() {
        let opts = TrainOptions::with_overrides(Some(5), Some(0), None, Some(2), false);
        assert_eq!(opts.epochs, 5);
        assert_eq!(opts.batch_size, 1);
        assert_eq!(opts.learning_rate, LEARNING_RATE);
        assert_eq!(opts.patience, 2);
        assert_eq!(opts.look_back, LOOK_BACK);
    }
}
