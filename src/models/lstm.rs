use candle_core::{DType, Module, Result, Tensor};
use candle_nn::{LSTMConfig, Linear, VarBuilder, LSTM, RNN};

use crate::config::{DENSE_UNITS, DROPOUT_RATE, LSTM_UNITS_FIRST, LSTM_UNITS_SECOND};

// ── Dropout helper ─────────────────────────────────────────────────────────────
/// Inverted dropout: during training, randomly zeros elements with probability `p`
/// and scales remaining elements by 1/(1-p). During inference, returns input unchanged.
pub fn dropout(x: &Tensor, p: f64, train: bool) -> Result<Tensor> {
    if !train || p <= 0.0 || p >= 1.0 {
        return Ok(x.clone());
    }
    let rand_t = Tensor::rand(0.0f32, 1.0f32, x.shape(), x.device())?;
    let threshold = Tensor::full(p as f32, x.shape(), x.device())?;
    // mask: 1.0 where rand >= threshold (keep), 0.0 where rand < threshold (drop)
    let mask = rand_t.ge(&threshold)?.to_dtype(DType::F32)?;
    let scale = 1.0 / (1.0 - p);
    (x.mul(&mask))?.affine(scale, 0.0)
}

/// Layer sizes of [`PriceLstm`].
#[derive(Clone, Copy, Debug)]
pub struct LstmShape {
    pub input_dim: usize,
    pub first_units: usize,
    pub second_units: usize,
    pub dense_units: usize,
    pub dropout_rate: f64,
}

impl Default for LstmShape {
    fn default() -> Self {
        Self {
            input_dim: 1,
            first_units: LSTM_UNITS_FIRST,
            second_units: LSTM_UNITS_SECOND,
            dense_units: DENSE_UNITS,
            dropout_rate: DROPOUT_RATE,
        }
    }
}

// LSTM(first) -> dropout -> LSTM(second) -> dropout -> dense -> dense(1).
// The first LSTM hands its full hidden sequence to the second; the second
// contributes only its final state.
pub struct PriceLstm {
    lstm_seq: LSTM,
    lstm_last: LSTM,
    dense: Linear,
    output: Linear,
    dropout_rate: f64,
}

impl PriceLstm {
    pub fn new(shape: LstmShape, vb: VarBuilder) -> Result<Self> {
        let lstm_seq = candle_nn::lstm(
            shape.input_dim,
            shape.first_units,
            LSTMConfig::default(),
            vb.pp("lstm_0"),
        )?;
        let lstm_last = candle_nn::lstm(
            shape.first_units,
            shape.second_units,
            LSTMConfig::default(),
            vb.pp("lstm_1"),
        )?;
        let dense = candle_nn::linear(shape.second_units, shape.dense_units, vb.pp("dense"))?;
        let output = candle_nn::linear(shape.dense_units, 1, vb.pp("output"))?;
        Ok(Self {
            lstm_seq,
            lstm_last,
            dense,
            output,
            dropout_rate: shape.dropout_rate,
        })
    }

    /// x: [batch, look_back, input_dim] -> [batch, 1]
    pub fn forward(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let states = self.lstm_seq.seq(x)?;
        if states.is_empty() {
            return Err(candle_core::Error::Msg("Empty LSTM sequence".into()));
        }
        let hidden_seq: Vec<Tensor> = states.iter().map(|s| s.h.clone()).collect();
        let hidden_seq = Tensor::stack(&hidden_seq, 1)?;
        let hidden_seq = dropout(&hidden_seq, self.dropout_rate, train)?;

        let states = self.lstm_last.seq(&hidden_seq)?;
        let h_t = states
            .last()
            .ok_or_else(|| candle_core::Error::Msg("Empty LSTM sequence".into()))?
            .h
            .clone();
        let h_t = dropout(&h_t, self.dropout_rate, train)?;

        // No activation between the dense layers.
        let x = self.dense.forward(&h_t)?;
        self.output.forward(&x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use candle_nn::VarMap;

    #[test]
    fn test_forward_shape() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = PriceLstm::new(LstmShape::default(), vb)?;

        let x = Tensor::rand(0.0f32, 1.0f32, (4, 10, 1), &device)?;
        let y = model.forward(&x, false)?;
        assert_eq!(y.dims(), &[4, 1]);

        let y_train = model.forward(&x, true)?;
        assert_eq!(y_train.dims(), &[4, 1]);
        Ok(())
    }

    #[test]
    fn test_eval_forward_is_deterministic() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = PriceLstm::new(LstmShape::default(), vb)?;

        let x = Tensor::rand(0.0f32, 1.0f32, (2, 10, 1), &device)?;
        let a = model.forward(&x, false)?.flatten_all()?.to_vec1::<f32>()?;
        let b = model.forward(&x, false)?.flatten_all()?.to_vec1::<f32>()?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn test_dropout_identity_in_eval() -> Result<()> {
        let x = Tensor::ones((3, 5), DType::F32, &Device::Cpu)?;
        let y = dropout(&x, 0.3, false)?;
        assert_eq!(y.to_vec2::<f32>()?, x.to_vec2::<f32>()?);
        let kept = dropout(&x, 0.5, true)?.flatten_all()?.to_vec1::<f32>()?;
        assert!(kept.iter().all(|&v| v == 0.0 || (v - 2.0).abs() < 1e-6));
        Ok(())
    }
}
