use candle_core::Device;
use rayon::ThreadPoolBuilder;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{info, warn};

static RAYON_INIT: OnceLock<()> = OnceLock::new();
static SETTINGS: OnceLock<Settings> = OnceLock::new();

pub fn init_cpu_parallelism() {
    RAYON_INIT.get_or_init(|| {
        let num_threads = num_cpus::get().max(1);
        match ThreadPoolBuilder::new().num_threads(num_threads).build_global() {
            Ok(_) => info!(
                "Initialized Rayon thread pool with {} threads (all logical CPU cores)",
                num_threads
            ),
            Err(e) => warn!(
                "Rayon thread pool already initialized or unavailable ({}). Using existing configuration.",
                e
            ),
        }
    });
}

/// Runtime paths and cache policy, read once from the environment.
///
/// A `.env` file in the working directory is honored (loaded by `main`
/// through `dotenvy` before the first call).
#[derive(Clone, Debug)]
pub struct Settings {
    pub cache_dir: PathBuf,
    pub cache_ttl_secs: u64,
    pub checkpoint_path: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".cache"),
            cache_ttl_secs: CACHE_TTL_SECS,
            checkpoint_path: PathBuf::from(CHECKPOINT_FILE),
            log_dir: PathBuf::from("log"),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_dir: env_path("STOCK_PREDICTOR_CACHE_DIR").unwrap_or(defaults.cache_dir),
            cache_ttl_secs: match std::env::var("STOCK_PREDICTOR_CACHE_TTL_SECS") {
                Ok(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
                    warn!(
                        "Invalid STOCK_PREDICTOR_CACHE_TTL_SECS={} ; using default {}s",
                        raw, defaults.cache_ttl_secs
                    );
                    defaults.cache_ttl_secs
                }),
                Err(_) => defaults.cache_ttl_secs,
            },
            checkpoint_path: env_path("STOCK_PREDICTOR_CHECKPOINT")
                .unwrap_or(defaults.checkpoint_path),
            log_dir: env_path("STOCK_PREDICTOR_LOG_DIR").unwrap_or(defaults.log_dir),
        }
    }
}

pub fn settings() -> &'static Settings {
    SETTINGS.get_or_init(Settings::from_env)
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

pub fn get_device(use_cuda: bool) -> Device {
    if use_cuda {
        #[cfg(feature = "cuda")]
        {
            match Device::new_cuda(0) {
                Ok(device) => {
                    info!("Using CUDA device 0");
                    return device;
                }
                Err(e) => {
                    warn!("Failed to initialize CUDA: {}. Falling back to CPU.", e);
                }
            }
        }
        #[cfg(not(feature = "cuda"))]
        {
            warn!("--cuda flag set but binary was compiled without the 'cuda' feature. Falling back to CPU.");
        }
    }

    #[cfg(feature = "mkl")]
    info!("Using CPU device with Intel MKL BLAS acceleration");

    #[cfg(not(feature = "mkl"))]
    info!("Using CPU device");

    Device::Cpu
}

// ── Data ────────────────────────────────────────────────────────────────────
pub const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
pub const FETCH_ATTEMPTS: usize = 3;
pub const FETCH_RETRY_DELAY_SECS: u64 = 2;
pub const FETCH_TIMEOUT_SECS: u64 = 15;
/// Cached chart responses younger than this are reused.
pub const CACHE_TTL_SECS: u64 = 86_400;
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ── Predictor ───────────────────────────────────────────────────────────────
pub const LOOK_BACK: usize = 10;
pub const LSTM_UNITS_FIRST: usize = 60;
pub const LSTM_UNITS_SECOND: usize = 120;
pub const DENSE_UNITS: usize = 20;
pub const DROPOUT_RATE: f64 = 0.3;
pub const LEARNING_RATE: f64 = 1e-3;
pub const BATCH_SIZE: usize = 32;
pub const EPOCHS: usize = 100;
/// Epochs without validation improvement before training stops.
pub const PATIENCE: usize = 10;
pub const TRAIN_RATIO: f64 = 0.8;
pub const CHECKPOINT_FILE: &str = "best_lstm_model.safetensors";
/// Upper bound on rolled-forward trading days for a dated forecast.
pub const MAX_FORECAST_DAYS: usize = 365;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert_eq!(s.cache_dir, PathBuf::from(".cache"));
        assert_eq!(s.cache_ttl_secs, 86_400);
        assert_eq!(s.checkpoint_path, PathBuf::from("best_lstm_model.safetensors"));
    }

    #[test]
    fn test_get_device_cpu() {
        assert!(matches!(get_device(false), Device::Cpu));
    }
}
