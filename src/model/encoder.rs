//! Causal waveform encoder.
//!
//! ## Architecture
//!
//! ```text
//! [.., S] → [B, 1, S]
//! CausalConv1d(1, C, k=7) + ELU                  [B, C, S]
//! EncoderBlock(C → 2C, s=2)                      [B, 2C, S/2]
//! EncoderBlock(2C → 4C, s=4)                     [B, 4C, S/8]
//! EncoderBlock(4C → 8C, s=5)                     [B, 8C, S/40]
//! EncoderBlock(8C → 16C, s=8)                    [B, 16C, S/320]
//! CausalConv1d(16C, E, k=3) + ELU                [B, E, S/320]
//! → [.., S/320, E]
//! ```
//!
//! Frame `f` depends only on samples `< (f + 1) * 320`.

use candle_core::{D, Tensor};
use candle_nn::{Activation, Module, Sequential, VarBuilder};

use super::blocks::encoder_block;
use super::conv::{CausalConv1d, CausalConvConfig};
use super::layers::{Rearrange, fold_leading, unfold_leading};
use crate::config::{ENCODER_STRIDES, EncoderConfig, SAMPLES_PER_FRAME};
use crate::{Error, Result};

/// Waveform → frame embeddings at 1/320 of the sample rate.
pub struct Encoder {
    encoder: Sequential,
    cfg: EncoderConfig,
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("cfg", &self.cfg)
            .field("layers", &self.encoder.len())
            .finish()
    }
}

impl Encoder {
    /// Build the stack; weights live under `vb.pp("encoder")`.
    pub fn new(cfg: EncoderConfig, vb: VarBuilder) -> Result<Self> {
        if cfg.scale == 0 || cfg.embedding_dim == 0 {
            return Err(Error::Config(format!(
                "encoder scale and embedding_dim must be positive, got {cfg:?}"
            )));
        }
        let vb = vb.pp("encoder");
        let scale = cfg.scale;

        let mut encoder = candle_nn::seq()
            .add(Rearrange::InsertChannel)
            .add(CausalConv1d::new(1, scale, 7, CausalConvConfig::default(), vb.pp(1))?)
            .add(Activation::Elu(1.0));

        let mut channels = scale;
        for (i, stride) in ENCODER_STRIDES.into_iter().enumerate() {
            encoder = encoder.add(encoder_block(channels, 2 * channels, stride, vb.pp(3 + i))?);
            channels *= 2;
        }

        let projection_index = 3 + ENCODER_STRIDES.len();
        let encoder = encoder
            .add(CausalConv1d::new(
                channels,
                cfg.embedding_dim,
                3,
                CausalConvConfig::default(),
                vb.pp(projection_index),
            )?)
            .add(Activation::Elu(1.0))
            .add(Rearrange::SwapLast);

        tracing::debug!(
            "Encoder: scale={} embedding_dim={} downsample={}",
            cfg.scale,
            cfg.embedding_dim,
            SAMPLES_PER_FRAME
        );

        Ok(Self { encoder, cfg })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.cfg
    }

    /// Encode a waveform.
    ///
    /// - Input: `[.., samples]`
    /// - Output: `[.., frames, embedding_dim]` with `frames = samples / 320`
    pub fn forward(&self, waveform: &Tensor) -> Result<Tensor> {
        let (xs, leading) = fold_leading(waveform, 1)?;
        let samples = xs.dim(D::Minus1)?;
        if samples < SAMPLES_PER_FRAME {
            return Err(Error::ShapeMismatch(format!(
                "encoder needs at least {SAMPLES_PER_FRAME} samples, got {samples}"
            )));
        }
        let frames = self.encoder.forward(&xs)?;
        unfold_leading(&frames, &leading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::frame_count;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn small_encoder(device: &Device) -> (VarMap, Encoder) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let cfg = EncoderConfig {
            scale: 2,
            embedding_dim: 8,
        };
        let encoder = Encoder::new(cfg, vb).unwrap();
        (varmap, encoder)
    }

    #[test]
    fn frame_count_matches_layer_formula() {
        let device = Device::Cpu;
        let (_vm, encoder) = small_encoder(&device);
        for samples in [320usize, 641, 3200, 3519] {
            let x = Tensor::randn(0f32, 1.0, (1, samples), &device).unwrap();
            let y = encoder.forward(&x).unwrap();
            assert_eq!(y.dims(), &[1, frame_count(samples), 8], "samples={samples}");
        }
    }

    #[test]
    fn one_second_gives_fifty_frames() {
        let device = Device::Cpu;
        let (_vm, encoder) = small_encoder(&device);
        let x = Tensor::randn(0f32, 0.1, (2, 16_000), &device).unwrap();
        assert_eq!(encoder.forward(&x).unwrap().dims(), &[2, 50, 8]);
    }

    #[test]
    fn leading_axes_are_preserved() {
        let device = Device::Cpu;
        let (_vm, encoder) = small_encoder(&device);
        let x = Tensor::randn(0f32, 1.0, (2, 3, 960), &device).unwrap();
        assert_eq!(encoder.forward(&x).unwrap().dims(), &[2, 3, 3, 8]);
        let x = Tensor::randn(0f32, 1.0, 960, &device).unwrap();
        assert_eq!(encoder.forward(&x).unwrap().dims(), &[3, 8]);
    }

    #[test]
    fn too_short_input_is_an_error() {
        let device = Device::Cpu;
        let (_vm, encoder) = small_encoder(&device);
        let x = Tensor::zeros((1, 100), DType::F32, &device).unwrap();
        assert!(matches!(encoder.forward(&x), Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn frames_ignore_future_samples() {
        let device = Device::Cpu;
        let (_vm, encoder) = small_encoder(&device);
        let cut = 1500;
        let a = Tensor::randn(0f32, 1.0, (1, 3200), &device).unwrap();
        let tail = Tensor::randn(0f32, 1.0, (1, 3200 - cut), &device).unwrap();
        let b = Tensor::cat(&[&a.narrow(1, 0, cut).unwrap(), &tail], 1).unwrap();

        let ya = encoder.forward(&a).unwrap();
        let yb = encoder.forward(&b).unwrap();
        // Frames whose 320-sample window lies inside [0, cut).
        let complete = cut / SAMPLES_PER_FRAME;
        let head = |y: &Tensor| -> Vec<f32> {
            y.narrow(1, 0, complete)
                .unwrap()
                .flatten_all()
                .unwrap()
                .to_vec1()
                .unwrap()
        };
        assert_eq!(head(&ya), head(&yb));

        // The perturbation is visible once the window reaches it.
        let later = |y: &Tensor| -> Vec<f32> {
            y.narrow(1, complete, 10 - complete)
                .unwrap()
                .flatten_all()
                .unwrap()
                .to_vec1()
                .unwrap()
        };
        assert_ne!(later(&ya), later(&yb));
    }

    #[test]
    fn parameter_paths_follow_module_tree() {
        let device = Device::Cpu;
        let (varmap, _encoder) = small_encoder(&device);
        let data = varmap.data().lock().unwrap();
        let dims = |name: &str| data.get(name).map(|v| v.dims().to_vec());
        assert_eq!(dims("encoder.1.weight"), Some(vec![2, 1, 7]));
        assert_eq!(dims("encoder.3.0.fn.0.weight"), Some(vec![2, 2, 7]));
        assert_eq!(dims("encoder.6.3.weight"), Some(vec![32, 16, 16]));
        assert_eq!(dims("encoder.7.weight"), Some(vec![8, 32, 3]));
    }
}
