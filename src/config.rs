//! Configuration for the StreamVC generator.
//!
//! Defaults follow the published StreamVC setup: 16 kHz audio, 320 samples
//! per 20 ms frame, 64-dim content and speaker embeddings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Strides of the four encoder blocks, shallowest first.
pub const ENCODER_STRIDES: [usize; 4] = [2, 4, 5, 8];

/// Strides of the four decoder blocks, deepest first.
pub const DECODER_STRIDES: [usize; 4] = [8, 5, 4, 2];

/// Waveform samples covered by one encoder frame.
pub const SAMPLES_PER_FRAME: usize = 320;

/// Frames of delay between a generator output frame and the input frame it
/// reconstructs.
pub const LOOKAHEAD_FRAMES: usize = 2;

/// Label value excluded from classification accuracy.
pub const IGNORE_INDEX: i64 = -1;

/// Hyperparameters of one [`Encoder`](crate::model::encoder::Encoder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Base channel width; blocks widen it to 2x, 4x, 8x, 16x.
    pub scale: usize,
    /// Size of each output frame embedding.
    pub embedding_dim: usize,
}

/// Hyperparameters of the [`Decoder`](crate::model::decoder::Decoder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub scale: usize,
    pub embedding_dim: usize,
    /// Size of the per-utterance conditioning vector fed to FiLM stages.
    pub conditioning_dim: usize,
}

/// Top-level generator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamVcConfig {
    pub sample_rate: u32,
    pub content_encoder: EncoderConfig,
    pub speech_encoder: EncoderConfig,
    pub decoder: DecoderConfig,
    /// Number of discrete content labels predicted by the classifier head.
    pub num_classes: usize,
    pub classifier_dropout: f32,
}

impl Default for StreamVcConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            content_encoder: EncoderConfig {
                scale: 64,
                embedding_dim: 64,
            },
            speech_encoder: EncoderConfig {
                scale: 32,
                embedding_dim: 64,
            },
            decoder: DecoderConfig {
                scale: 40,
                embedding_dim: 64,
                conditioning_dim: 64,
            },
            num_classes: 100,
            classifier_dropout: 0.1,
        }
    }
}

impl StreamVcConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&text)?;
        cfg.verify()?;
        Ok(cfg)
    }

    /// Check that the encoder, pooling and decoder dimensions line up.
    pub fn verify(&self) -> Result<()> {
        let widths = [
            ("content_encoder.scale", self.content_encoder.scale),
            ("content_encoder.embedding_dim", self.content_encoder.embedding_dim),
            ("speech_encoder.scale", self.speech_encoder.scale),
            ("speech_encoder.embedding_dim", self.speech_encoder.embedding_dim),
            ("decoder.scale", self.decoder.scale),
            ("decoder.embedding_dim", self.decoder.embedding_dim),
            ("decoder.conditioning_dim", self.decoder.conditioning_dim),
            ("num_classes", self.num_classes),
        ];
        if let Some((name, _)) = widths.iter().find(|(_, v)| *v == 0) {
            return Err(Error::Config(format!("{name} must be non-zero")));
        }
        if self.content_encoder.embedding_dim != self.decoder.embedding_dim {
            return Err(Error::Config(format!(
                "content embedding dim {} does not match decoder embedding dim {}",
                self.content_encoder.embedding_dim, self.decoder.embedding_dim
            )));
        }
        if self.speech_encoder.embedding_dim != self.decoder.conditioning_dim {
            return Err(Error::Config(format!(
                "speech embedding dim {} does not match decoder conditioning dim {}",
                self.speech_encoder.embedding_dim, self.decoder.conditioning_dim
            )));
        }
        if !(0.0..1.0).contains(&self.classifier_dropout) {
            return Err(Error::Config(format!(
                "classifier_dropout must be in [0, 1), got {}",
                self.classifier_dropout
            )));
        }
        verify_strides()
    }

    /// Encoder frames per second.
    pub fn frame_rate(&self) -> f64 {
        self.sample_rate as f64 / SAMPLES_PER_FRAME as f64
    }
}

/// Verify that the encoder downsamples by exactly [`SAMPLES_PER_FRAME`] and
/// the decoder upsamples by the same factor.
pub fn verify_strides() -> Result<()> {
    let down: usize = ENCODER_STRIDES.iter().product();
    let up: usize = DECODER_STRIDES.iter().product();
    if down != SAMPLES_PER_FRAME || up != down {
        return Err(Error::Config(format!(
            "stride products down={down} up={up}, expected {SAMPLES_PER_FRAME}"
        )));
    }
    Ok(())
}
