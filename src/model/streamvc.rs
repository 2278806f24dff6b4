//! StreamVC generator: content encoder + speaker encoder + conditional decoder.
//!
//! ```text
//! source ─→ content_encoder ────────────────────→ [B, F, E] ─┐
//!                                                            ├→ decoder → [B, F*320]
//! target ─→ speech_encoder → speech_pooling ───→ [B, E_spk] ─┘
//! ```

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;

use super::decoder::Decoder;
use super::encoder::Encoder;
use super::pooling::LearnablePooling;
use crate::Result;
use crate::config::StreamVcConfig;

/// Voice-conversion generator.
#[derive(Debug)]
pub struct StreamVc {
    content_encoder: Encoder,
    speech_encoder: Encoder,
    speech_pooling: LearnablePooling,
    decoder: Decoder,
    cfg: StreamVcConfig,
}

impl StreamVc {
    /// Build every component. Pass a `VarBuilder` backed by a `VarMap` to get
    /// trainable parameters, or by a checkpoint to load them.
    pub fn new(cfg: &StreamVcConfig, vb: VarBuilder) -> Result<Self> {
        cfg.verify()?;
        let content_encoder = Encoder::new(cfg.content_encoder, vb.pp("content_encoder"))?;
        let speech_encoder = Encoder::new(cfg.speech_encoder, vb.pp("speech_encoder"))?;
        let speech_pooling =
            LearnablePooling::new(cfg.speech_encoder.embedding_dim, vb.pp("speech_pooling"))?;
        let decoder = Decoder::new(cfg.decoder, vb.pp("decoder"))?;

        tracing::debug!(
            "StreamVc: {} Hz, {:.0} frames/s, content dim {}, speaker dim {}",
            cfg.sample_rate,
            cfg.frame_rate(),
            cfg.content_encoder.embedding_dim,
            cfg.decoder.conditioning_dim
        );

        Ok(Self {
            content_encoder,
            speech_encoder,
            speech_pooling,
            decoder,
            cfg: cfg.clone(),
        })
    }

    /// Load weights from safetensors files.
    pub fn from_safetensors<P: AsRef<Path>>(
        cfg: &StreamVcConfig,
        paths: &[P],
        dtype: DType,
        device: &Device,
    ) -> Result<Self> {
        tracing::info!("Loading StreamVC weights from {} file(s)", paths.len());
        // SAFETY: the checkpoint files are not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(paths, dtype, device)? };
        Self::new(cfg, vb)
    }

    pub fn config(&self) -> &StreamVcConfig {
        &self.cfg
    }

    pub fn content_encoder(&self) -> &Encoder {
        &self.content_encoder
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Content embeddings `[.., frames, E]` of a waveform `[.., samples]`.
    pub fn content_embeddings(&self, waveform: &Tensor) -> Result<Tensor> {
        self.content_encoder.forward(waveform)
    }

    /// Speaker conditioning vector `[.., E_spk]` of a reference waveform.
    pub fn speaker_embedding(&self, waveform: &Tensor) -> Result<Tensor> {
        let frames = self.speech_encoder.forward(waveform)?;
        self.speech_pooling.forward(&frames)
    }

    /// Re-synthesize `source` content with the voice of `target`.
    ///
    /// Both are `[.., samples]` with matching leading axes; the output has
    /// `floor(source_samples / 320) * 320` samples.
    pub fn forward(&self, source: &Tensor, target: &Tensor) -> Result<Tensor> {
        let content = self.content_embeddings(source)?;
        let speaker = self.speaker_embedding(target)?;
        tracing::debug!(
            "StreamVc forward: content {:?}, speaker {:?}",
            content.dims(),
            speaker.dims()
        );
        self.decoder.forward(&content, &speaker)
    }

    /// Decode precomputed content embeddings with a precomputed speaker vector.
    pub fn convert(&self, content: &Tensor, speaker: &Tensor) -> Result<Tensor> {
        self.decoder.forward(content, speaker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DecoderConfig, EncoderConfig, SAMPLES_PER_FRAME};
    use candle_nn::VarMap;

    fn tiny_config() -> StreamVcConfig {
        StreamVcConfig {
            content_encoder: EncoderConfig {
                scale: 2,
                embedding_dim: 8,
            },
            speech_encoder: EncoderConfig {
                scale: 2,
                embedding_dim: 6,
            },
            decoder: DecoderConfig {
                scale: 2,
                embedding_dim: 8,
                conditioning_dim: 6,
            },
            ..Default::default()
        }
    }

    #[test]
    fn converts_to_source_length() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = StreamVc::new(&tiny_config(), vb).unwrap();
        let source = Tensor::randn(0f32, 0.1, (2, 3300), &device).unwrap();
        let target = Tensor::randn(0f32, 0.1, (2, 2000), &device).unwrap();
        let speaker = model.speaker_embedding(&target).unwrap();
        assert_eq!(speaker.dims(), &[2, 6]);
        let out = model.forward(&source, &target).unwrap();
        assert_eq!(out.dims(), &[2, 10 * SAMPLES_PER_FRAME]);
    }

    #[test]
    fn inconsistent_config_rejected() {
        let device = Device::Cpu;
        let vb = VarBuilder::zeros(DType::F32, &device);
        let mut cfg = tiny_config();
        cfg.decoder.conditioning_dim = 7;
        assert!(StreamVc::new(&cfg, vb).is_err());
    }

    #[test]
    fn safetensors_roundtrip() {
        let device = Device::Cpu;
        let cfg = tiny_config();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = StreamVc::new(&cfg, vb).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streamvc.safetensors");
        varmap.save(&path).unwrap();
        let loaded = StreamVc::from_safetensors(&cfg, &[&path], DType::F32, &device).unwrap();

        let x = Tensor::randn(0f32, 1.0, (1, 960), &device).unwrap();
        let a: Vec<f32> = model.content_embeddings(&x).unwrap().flatten_all().unwrap().to_vec1().unwrap();
        let b: Vec<f32> = loaded.content_embeddings(&x).unwrap().flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(a, b);
    }

    /// Full-width scenario: one second of 16 kHz audio through scale 32.
    #[test]
    fn end_to_end_one_second() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let encoder = Encoder::new(
            EncoderConfig {
                scale: 32,
                embedding_dim: 64,
            },
            vb.pp("content_encoder"),
        )
        .unwrap();
        let decoder = Decoder::new(
            DecoderConfig {
                scale: 32,
                embedding_dim: 64,
                conditioning_dim: 16,
            },
            vb.pp("decoder"),
        )
        .unwrap();

        let waveform = Tensor::randn(0f32, 0.1, (2, 16_000), &device).unwrap();
        let embeddings = encoder.forward(&waveform).unwrap();
        assert_eq!(embeddings.dims(), &[2, 50, 64]);

        let condition = Tensor::randn(0f32, 1.0, (2, 16), &device).unwrap();
        let out = decoder.forward(&embeddings, &condition).unwrap();
        assert_eq!(out.dims(), &[2, 16_000]);
    }
}
