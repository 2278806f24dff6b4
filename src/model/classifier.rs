//! Content-encoder classification head.
//!
//! The content encoder is trained to predict, per frame, the discrete unit a
//! self-supervised speech model assigns to the same 20 ms. This wraps an
//! [`Encoder`] with LayerNorm → Dropout → Linear to produce those logits.

use candle_core::Tensor;
use candle_nn::{Dropout, LayerNorm, Linear, Module, VarBuilder};

use super::encoder::Encoder;
use crate::config::StreamVcConfig;
use crate::{Error, Result};

/// Encoder followed by a per-frame classifier.
#[derive(Debug)]
pub struct EncoderClassifier {
    encoder: Encoder,
    norm: LayerNorm,
    dropout: Dropout,
    linear: Linear,
    num_classes: usize,
}

impl EncoderClassifier {
    /// Wrap `encoder`; head weights live under `vb.pp("norm")` and
    /// `vb.pp("linear")`.
    pub fn new(encoder: Encoder, num_classes: usize, dropout: f32, vb: VarBuilder) -> Result<Self> {
        if num_classes == 0 {
            return Err(Error::Config("num_classes must be positive".into()));
        }
        if !(0.0..1.0).contains(&dropout) {
            return Err(Error::Config(format!("dropout must be in [0, 1), got {dropout}")));
        }
        let in_features = encoder.config().embedding_dim;
        let norm = candle_nn::layer_norm(in_features, 1e-5, vb.pp("norm"))?;
        let linear = candle_nn::linear(in_features, num_classes, vb.pp("linear"))?;
        Ok(Self {
            encoder,
            norm,
            dropout: Dropout::new(dropout),
            linear,
            num_classes,
        })
    }

    /// Build a fresh content encoder and head from `cfg`.
    ///
    /// Encoder weights live under `vb.pp("encoder")`, so a checkpoint reads
    /// `encoder.encoder.1.weight`, `norm.weight`, `linear.weight`.
    pub fn from_config(cfg: &StreamVcConfig, vb: VarBuilder) -> Result<Self> {
        cfg.verify()?;
        let encoder = Encoder::new(cfg.content_encoder, vb.pp("encoder"))?;
        Self::new(encoder, cfg.num_classes, cfg.classifier_dropout, vb)
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    /// Give back the trained encoder.
    pub fn into_encoder(self) -> Encoder {
        self.encoder
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Per-frame logits `[.., frames, num_classes]` for a waveform `[.., samples]`.
    pub fn forward_t(&self, waveform: &Tensor, train: bool) -> Result<Tensor> {
        let xs = self.encoder.forward(waveform)?;
        let xs = self.norm.forward(&xs)?;
        let xs = self.dropout.forward(&xs, train)?;
        Ok(self.linear.forward(&xs)?)
    }

    /// Inference-mode logits.
    pub fn forward(&self, waveform: &Tensor) -> Result<Tensor> {
        self.forward_t(waveform, false)
    }
}
