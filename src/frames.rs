//! Alignment between waveform samples, encoder frames and frame labels.
//!
//! Used by training collaborators: padded batches carry a per-sample
//! validity mask that must be reduced to the encoder frame rate, labels on
//! invalid frames are replaced by [`IGNORE_INDEX`], and the generator's
//! output is shifted by
//! [`LOOKAHEAD_FRAMES`](crate::config::LOOKAHEAD_FRAMES) before comparison.

use candle_core::{D, DType, Tensor};

use crate::config::{ENCODER_STRIDES, IGNORE_INDEX, SAMPLES_PER_FRAME};
use crate::{Error, Result};

/// Encoder frames produced for `samples` input samples.
///
/// Applies the causal strided-conv length rule block by block; with
/// `kernel_size = 2 * stride` each block maps `n` to `floor(n / stride)`.
pub fn frame_count(samples: usize) -> usize {
    ENCODER_STRIDES.iter().fold(samples, |n, stride| n / stride)
}

/// Reduce a `[B, S]` sample-validity mask to `[B, S / 320]` frame validity.
///
/// A frame is valid only when every one of its samples is. A trailing
/// partial frame is dropped. The result is `u8` (1 = valid).
pub fn frame_mask(sample_mask: &Tensor) -> Result<Tensor> {
    let (batch, samples) = sample_mask.dims2()?;
    let frames = samples / SAMPLES_PER_FRAME;
    if frames == 0 {
        return Ok(Tensor::zeros((batch, 0), DType::U8, sample_mask.device())?);
    }
    let mask = sample_mask
        .to_dtype(DType::F32)?
        .narrow(1, 0, frames * SAMPLES_PER_FRAME)?
        .reshape((batch, frames, SAMPLES_PER_FRAME))?;
    let threshold = Tensor::new(0.5f32, mask.device())?;
    Ok(mask.min(D::Minus1)?.broadcast_ge(&threshold)?)
}

/// Replace labels on invalid frames with [`IGNORE_INDEX`].
///
/// `labels`: `[B, F]` integer labels, `frame_mask`: `[B, F]` from
/// [`frame_mask`]. Returns `i64` labels.
pub fn mask_labels(labels: &Tensor, frame_mask: &Tensor) -> Result<Tensor> {
    if labels.dims() != frame_mask.dims() {
        return Err(Error::ShapeMismatch(format!(
            "labels {:?} do not match frame mask {:?}",
            labels.dims(),
            frame_mask.dims()
        )));
    }
    let labels = labels.to_dtype(DType::I64)?;
    let ignore = Tensor::full(IGNORE_INDEX, labels.shape(), labels.device())?;
    Ok(frame_mask.to_dtype(DType::U8)?.where_cond(&labels, &ignore)?)
}

/// Percentage of frames whose argmax logit equals the label.
///
/// `logits`: `[.., F, C]`, `labels`: `[.., F]`. Frames labelled
/// [`IGNORE_INDEX`] are skipped; `None` when no frame counts.
pub fn label_accuracy(logits: &Tensor, labels: &Tensor) -> Result<Option<f64>> {
    let predicted = logits.argmax(D::Minus1)?;
    if predicted.dims() != labels.dims() {
        return Err(Error::ShapeMismatch(format!(
            "predictions {:?} do not match labels {:?}",
            predicted.dims(),
            labels.dims()
        )));
    }
    let predicted: Vec<u32> = predicted.flatten_all()?.to_vec1()?;
    let labels: Vec<i64> = labels.to_dtype(DType::I64)?.flatten_all()?.to_vec1()?;

    let (correct, total) = predicted
        .iter()
        .zip(&labels)
        .filter(|(_, label)| **label != IGNORE_INDEX)
        .fold((0usize, 0usize), |(correct, total), (p, label)| {
            (correct + usize::from(i64::from(*p) == *label), total + 1)
        });
    if total == 0 {
        return Ok(None);
    }
    Ok(Some(100.0 * correct as f64 / total as f64))
}

/// Align generated audio with its reference.
///
/// Output frame `t` of the generator reconstructs input frame `t - frames`,
/// so the first `frames * 320` generated samples are dropped and the
/// reference is cut to the remaining length.
pub fn trim_lookahead(
    prediction: &Tensor,
    target: &Tensor,
    frames: usize,
) -> Result<(Tensor, Tensor)> {
    let offset = frames * SAMPLES_PER_FRAME;
    let generated = prediction.dim(D::Minus1)?;
    let available = target.dim(D::Minus1)?;
    if generated <= offset {
        return Err(Error::ShapeMismatch(format!(
            "{generated} generated samples do not cover a lookahead of {offset}"
        )));
    }
    let len = generated - offset;
    if available < len {
        return Err(Error::ShapeMismatch(format!(
            "reference has {available} samples, need {len}"
        )));
    }
    let prediction = prediction.narrow(D::Minus1, offset, len)?;
    let target = target.narrow(D::Minus1, 0, len)?;
    Ok((prediction, target))
}
