//! Conditional causal waveform decoder.
//!
//! ## Architecture
//!
//! ```text
//! [.., F, E] → [B, E, F]
//! CausalConv1d(E, 16C, k=7) + ELU                 [B, 16C, F]
//! DecoderBlock(16C → 8C, s=8) + FiLM(8C)          [B, 8C, 8F]
//! DecoderBlock(8C → 4C, s=5)  + FiLM(4C)          [B, 4C, 40F]
//! DecoderBlock(4C → 2C, s=4)  + FiLM(2C)          [B, 2C, 160F]
//! DecoderBlock(2C → C, s=2)   + FiLM(C)           [B, C, 320F]
//! CausalConv1d(C, 1, k=7)                         [B, 1, 320F]
//! → [.., 320F]
//! ```
//!
//! Every FiLM stage receives the same per-utterance conditioning vector.

use candle_core::{D, Tensor};
use candle_nn::{Activation, VarBuilder};

use super::blocks::decoder_block;
use super::conv::{CausalConv1d, CausalConvConfig};
use super::film::{Film, SequentialWithFilm};
use super::layers::{Rearrange, fold_leading, unfold_leading};
use crate::config::{DECODER_STRIDES, DecoderConfig, SAMPLES_PER_FRAME};
use crate::{Error, Result};

/// Frame embeddings + conditioning vector → waveform.
#[derive(Debug)]
pub struct Decoder {
    decoder: SequentialWithFilm,
    cfg: DecoderConfig,
}

impl Decoder {
    /// Build the stack; weights live under `vb.pp("decoder")`.
    pub fn new(cfg: DecoderConfig, vb: VarBuilder) -> Result<Self> {
        if cfg.scale == 0 || cfg.embedding_dim == 0 || cfg.conditioning_dim == 0 {
            return Err(Error::Config(format!(
                "decoder dimensions must be positive, got {cfg:?}"
            )));
        }
        let vb = vb.pp("decoder");
        let mut channels = cfg.scale << DECODER_STRIDES.len();

        let mut decoder = SequentialWithFilm::new()
            .add(Rearrange::SwapLast)
            .add(CausalConv1d::new(
                cfg.embedding_dim,
                channels,
                7,
                CausalConvConfig::default(),
                vb.pp(1),
            )?)
            .add(Activation::Elu(1.0));

        // Block i sits at index 3 + 2i, its FiLM right after.
        for (i, stride) in DECODER_STRIDES.into_iter().enumerate() {
            let out_channels = channels / 2;
            let index = 3 + 2 * i;
            decoder = decoder
                .add(decoder_block(channels, out_channels, stride, vb.pp(index))?)
                .add_conditioned(Film::new(
                    out_channels,
                    cfg.conditioning_dim,
                    vb.pp(index + 1),
                )?);
            channels = out_channels;
        }

        let decoder = decoder
            .add(CausalConv1d::new(
                channels,
                1,
                7,
                CausalConvConfig::default(),
                vb.pp(3 + 2 * DECODER_STRIDES.len()),
            )?)
            .add(Rearrange::DropChannel);

        tracing::debug!(
            "Decoder: scale={} embedding_dim={} conditioning_dim={} upsample={}",
            cfg.scale,
            cfg.embedding_dim,
            cfg.conditioning_dim,
            SAMPLES_PER_FRAME
        );

        Ok(Self { decoder, cfg })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.cfg
    }

    /// Decode embeddings under a conditioning vector.
    ///
    /// - `embeddings`: `[.., frames, embedding_dim]`
    /// - `condition`: `[.., conditioning_dim]`, same leading axes
    /// - Output: `[.., frames * 320]`
    pub fn forward(&self, embeddings: &Tensor, condition: &Tensor) -> Result<Tensor> {
        let embedding_dim = embeddings.dim(D::Minus1)?;
        if embedding_dim != self.cfg.embedding_dim {
            return Err(Error::ShapeMismatch(format!(
                "decoder expects embedding dim {}, got {embedding_dim}",
                self.cfg.embedding_dim
            )));
        }
        let (xs, leading) = fold_leading(embeddings, 2)?;
        let (cond, cond_leading) = fold_leading(condition, 1)?;
        if cond_leading != leading {
            return Err(Error::ShapeMismatch(format!(
                "conditioning batch {cond_leading:?} does not match embedding batch {leading:?}"
            )));
        }
        if xs.dim(1)? == 0 {
            return Err(Error::ShapeMismatch("decoder needs at least one frame".into()));
        }
        let waveform = self.decoder.forward(&xs, &cond)?;
        unfold_leading(&waveform, &leading)
    }
}
