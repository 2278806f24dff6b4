//! The conditioning trait and the small stateless stages shared by the
//! encoder and decoder stacks.

use candle_core::{D, Tensor, bail};
use candle_nn::Module;

use crate::{Error, Result};

/// A layer that also consumes a per-utterance conditioning vector.
///
/// Plain layers implement [`candle_nn::Module`]; this is the one extra
/// calling convention the decoder pipeline needs.
pub trait ConditionedModule: std::fmt::Debug + Send + Sync {
    fn forward(&self, xs: &Tensor, condition: &Tensor) -> Result<Tensor>;
}

/// Axis reshuffles at the encoder/decoder boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rearrange {
    /// `[B, S]` → `[B, 1, S]`
    InsertChannel,
    /// `[B, C, T]` ↔ `[B, T, C]`
    SwapLast,
    /// `[B, 1, S]` → `[B, S]`
    DropChannel,
}

impl Module for Rearrange {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let rank = xs.rank();
        match self {
            Rearrange::InsertChannel => xs.unsqueeze(rank.saturating_sub(1)),
            Rearrange::SwapLast => xs.transpose(D::Minus2, D::Minus1)?.contiguous(),
            Rearrange::DropChannel => {
                let channels = xs.dim(D::Minus2)?;
                if channels != 1 {
                    bail!("expected a single channel before the waveform reshape, got {channels}");
                }
                xs.squeeze(rank - 2)
            }
        }
    }
}

/// Collapse every axis before the last `keep` axes into one batch axis.
///
/// Returns the folded tensor and the leading shape needed to restore it.
pub(crate) fn fold_leading(xs: &Tensor, keep: usize) -> Result<(Tensor, Vec<usize>)> {
    let dims = xs.dims();
    if dims.len() < keep {
        return Err(Error::ShapeMismatch(format!(
            "expected at least {keep} axes, got shape {dims:?}"
        )));
    }
    let split = dims.len() - keep;
    let leading = dims[..split].to_vec();
    let batch: usize = leading.iter().product();
    let mut folded = vec![batch];
    folded.extend_from_slice(&dims[split..]);
    Ok((xs.reshape(folded)?, leading))
}

/// Inverse of [`fold_leading`]: replace the batch axis with `leading`.
pub(crate) fn unfold_leading(xs: &Tensor, leading: &[usize]) -> Result<Tensor> {
    let mut shape = leading.to_vec();
    shape.extend_from_slice(&xs.dims()[1..]);
    Ok(xs.reshape(shape)?)
}
