use crate::error::InputError;
use anyhow::Result;

/// Scales values linearly onto `[0, 1]` using the range seen at fit time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinMaxScaler {
    pub min: f64,
    pub max: f64,
}

impl MinMaxScaler {
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            anyhow::bail!("Cannot fit scaler on an empty series");
        }
        if values.iter().any(|v| !v.is_finite()) {
            anyhow::bail!("Cannot fit scaler on non-finite values");
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(Self { min, max })
    }

    fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn transform_one(&self, value: f64) -> f64 {
        let span = self.span();
        if span == 0.0 {
            return 0.0;
        }
        (value - self.min) / span
    }

    pub fn inverse_one(&self, scaled: f64) -> f64 {
        scaled * self.span() + self.min
    }

    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.transform_one(v)).collect()
    }
}

/// Sliding windows over a scaled series: each input is `look_back` steps,
/// each target the step right after it.
#[derive(Clone, Debug, Default)]
pub struct LstmDataset {
    pub inputs: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl LstmDataset {
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Chronological split; the first `train_ratio` share goes to training.
    pub fn split(self, train_ratio: f64) -> (Self, Self) {
        let n = self.inputs.len();
        let train_size = ((n as f64 * train_ratio) as usize).min(n);

        let (train_inputs, val_inputs) = self.inputs.split_at(train_size);
        let (train_targets, val_targets) = self.targets.split_at(train_size);

        (
            Self {
                inputs: train_inputs.to_vec(),
                targets: train_targets.to_vec(),
            },
            Self {
                inputs: val_inputs.to_vec(),
                targets: val_targets.to_vec(),
            },
        )
    }
}

pub fn prepare_lstm_data(scaled: &[f64], look_back: usize) -> Result<LstmDataset, InputError> {
    if scaled.len() <= look_back {
        return Err(InputError::NotEnoughData {
            len: scaled.len(),
            look_back,
        });
    }

    let count = scaled.len() - look_back;
    let mut inputs = Vec::with_capacity(count);
    let mut targets = Vec::with_capacity(count);
    for i in 0..count {
        inputs.push(scaled[i..i + look_back].to_vec());
        targets.push(scaled[i + look_back]);
    }

    Ok(LstmDataset { inputs, targets })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaler_maps_onto_unit_interval() {
        let scaler = MinMaxScaler::fit(&[10.0, 20.0, 15.0, 30.0]).unwrap();
        assert_eq!(scaler.transform(&[10.0, 20.0, 30.0]), vec![0.0, 0.5, 1.0]);
        // Out-of-range values extrapolate rather than clamp.
        assert_eq!(scaler.transform_one(40.0), 1.5);
        let back: Vec<f64> = [0.0, 0.25, 1.0].iter().map(|&v| scaler.inverse_one(v)).collect();
        assert_eq!(back, vec![10.0, 15.0, 30.0]);
    }

    #[test]
    fn test_scaler_constant_series() {
        let scaler = MinMaxScaler::fit(&[7.0, 7.0, 7.0]).unwrap();
        assert_eq!(scaler.transform(&[7.0, 7.0]), vec![0.0, 0.0]);
        assert_eq!(scaler.inverse_one(0.0), 7.0);
    }

    #[test]
    fn test_scaler_rejects_bad_input() {
        assert!(MinMaxScaler::fit(&[]).is_err());
        assert!(MinMaxScaler::fit(&[1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_prepare_lstm_data() {
        let data: Vec<f64> = (0..15).map(|v| v as f64).collect();
        let ds = prepare_lstm_data(&data, 10).unwrap();
        assert_eq!(ds.len(), 5);
        assert_eq!(ds.inputs[0], (0..10).map(|v| v as f64).collect::<Vec<_>>());
        assert_eq!(ds.targets[0], 10.0);
        assert_eq!(ds.inputs[4][0], 4.0);
        assert_eq!(ds.targets[4], 14.0);
        assert!(ds.inputs.iter().all(|w| w.len() == 10));
    }

    #[test]
    fn test_prepare_lstm_data_too_short() {
        let err = prepare_lstm_data(&[0.0; 10], 10).unwrap_err();
        assert_eq!(err.to_string(), "Data length (10) must be greater than look_back (10)");
        assert!(prepare_lstm_data(&[0.0; 11], 10).is_ok());
    }

    #[test]
    fn test_split_is_chronological() {
        let data: Vec<f64> = (0..20).map(|v| v as f64).collect();
        let ds = prepare_lstm_data(&data, 10).unwrap();
        let (train, val) = ds.split(0.8);
        assert_eq!(train.len(), 8);
        assert_eq!(val.len(), 2);
        assert_eq!(train.targets.last(), Some(&17.0));
        assert_eq!(val.targets, vec![18.0, 19.0]);
    }
}
