//! Causal 1-D convolution and transposed convolution.
//!
//! Both layers derive one amount from their shape parameters:
//!
//! ```text
//! causal = dilation * (kernel_size - 1) - (stride - 1)
//! ```
//!
//! [`CausalConv1d`] left-pads the time axis by that amount, so output `t`
//! reads inputs `<= t` only and the output length is `floor(T / stride)`.
//! [`CausalConvTranspose1d`] trims that amount from the right of its output,
//! so the result has `T * stride` samples when `kernel_size = 2 * stride`.

use std::str::FromStr;

use candle_core::{D, Tensor, bail};
use candle_nn::{Conv1d, Conv1dConfig, ConvTranspose1d, ConvTranspose1dConfig, Module, VarBuilder};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How the causal left padding is filled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddingMode {
    /// Constant zero.
    #[default]
    Zeros,
    /// Repeat the first sample.
    Replicate,
    /// Mirror the signal around the first sample, excluding it.
    Reflect,
    /// Wrap around from the end of the signal.
    Circular,
}

impl FromStr for PaddingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zeros" => Ok(Self::Zeros),
            "replicate" => Ok(Self::Replicate),
            "reflect" => Ok(Self::Reflect),
            "circular" => Ok(Self::Circular),
            other => Err(Error::Config(format!("unsupported padding mode: {other}"))),
        }
    }
}

/// Shape parameters of a causal convolution. There is deliberately no
/// padding field: the padding is always derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CausalConvConfig {
    pub stride: usize,
    pub dilation: usize,
    pub groups: usize,
    pub padding_mode: PaddingMode,
}

impl Default for CausalConvConfig {
    fn default() -> Self {
        Self {
            stride: 1,
            dilation: 1,
            groups: 1,
            padding_mode: PaddingMode::Zeros,
        }
    }
}

impl CausalConvConfig {
    pub fn with_stride(stride: usize) -> Self {
        Self {
            stride,
            ..Default::default()
        }
    }

    pub fn with_dilation(dilation: usize) -> Self {
        Self {
            dilation,
            ..Default::default()
        }
    }

    /// `dilation * (kernel_size - 1) - (stride - 1)`, rejected when negative.
    pub fn causal_amount(&self, kernel_size: usize) -> Result<usize> {
        if kernel_size == 0 || self.stride == 0 || self.dilation == 0 || self.groups == 0 {
            return Err(Error::Config(format!(
                "kernel_size, stride, dilation and groups must be positive \
                 (kernel_size={kernel_size}, {self:?})"
            )));
        }
        let reach = self.dilation * (kernel_size - 1);
        reach.checked_sub(self.stride - 1).ok_or_else(|| {
            Error::Config(format!(
                "stride {} exceeds the receptive field of kernel {kernel_size} \
                 with dilation {}",
                self.stride, self.dilation
            ))
        })
    }
}

impl TryFrom<Conv1dConfig> for CausalConvConfig {
    type Error = Error;

    fn try_from(cfg: Conv1dConfig) -> Result<Self> {
        if cfg.padding != 0 {
            return Err(Error::Config(format!(
                "causal convolutions derive their own padding, got explicit padding {}",
                cfg.padding
            )));
        }
        Ok(Self {
            stride: cfg.stride,
            dilation: cfg.dilation,
            groups: cfg.groups,
            padding_mode: PaddingMode::Zeros,
        })
    }
}

impl TryFrom<ConvTranspose1dConfig> for CausalConvConfig {
    type Error = Error;

    fn try_from(cfg: ConvTranspose1dConfig) -> Result<Self> {
        if cfg.padding != 0 || cfg.output_padding != 0 {
            return Err(Error::Config(format!(
                "causal transposed convolutions derive their own trim, got padding {} \
                 and output_padding {}",
                cfg.padding, cfg.output_padding
            )));
        }
        Ok(Self {
            stride: cfg.stride,
            dilation: cfg.dilation,
            groups: cfg.groups,
            padding_mode: PaddingMode::Zeros,
        })
    }
}

// ---------------------------------------------------------------------------
// CausalConv1d
// ---------------------------------------------------------------------------

/// Conv1d with left-only padding.
#[derive(Debug, Clone)]
pub struct CausalConv1d {
    conv: Conv1d,
    kernel_size: usize,
    stride: usize,
    dilation: usize,
    padding: usize,
    padding_mode: PaddingMode,
}

impl CausalConv1d {
    /// Create the layer, loading `weight` `[out, in / groups, k]` and `bias`.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        cfg: CausalConvConfig,
        vb: VarBuilder,
    ) -> Result<Self> {
        let padding = cfg.causal_amount(kernel_size)?;
        let conv_cfg = Conv1dConfig {
            padding: 0,
            stride: cfg.stride,
            dilation: cfg.dilation,
            groups: cfg.groups,
            ..Default::default()
        };
        let conv = candle_nn::conv1d(in_channels, out_channels, kernel_size, conv_cfg, vb)?;
        Ok(Self {
            conv,
            kernel_size,
            stride: cfg.stride,
            dilation: cfg.dilation,
            padding,
            padding_mode: cfg.padding_mode,
        })
    }

    /// Left padding applied on every call.
    pub fn causal_padding(&self) -> usize {
        self.padding
    }

    /// Output length for an input of `len` samples.
    pub fn output_len(&self, len: usize) -> Option<usize> {
        let reach = self.dilation * (self.kernel_size - 1) + 1;
        (len + self.padding)
            .checked_sub(reach)
            .map(|n| n / self.stride + 1)
    }

    fn pad(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let p = self.padding;
        if p == 0 {
            return Ok(xs.clone());
        }
        let len = xs.dim(D::Minus1)?;
        match self.padding_mode {
            PaddingMode::Zeros => xs.pad_with_zeros(D::Minus1, p, 0),
            PaddingMode::Replicate => xs.pad_with_same(D::Minus1, p, 0),
            PaddingMode::Reflect => {
                if p >= len {
                    bail!("reflect padding of {p} needs more than {len} samples");
                }
                // x[p], x[p-1], ..., x[1]
                let index: Vec<u32> = (1..=p as u32).rev().collect();
                let index = Tensor::from_vec(index, p, xs.device())?;
                let mirrored = xs.index_select(&index, xs.rank() - 1)?;
                Tensor::cat(&[&mirrored, xs], D::Minus1)
            }
            PaddingMode::Circular => {
                if p > len {
                    bail!("circular padding of {p} needs at least {p} samples, got {len}");
                }
                let tail = xs.narrow(D::Minus1, len - p, p)?;
                Tensor::cat(&[&tail, xs], D::Minus1)
            }
        }
    }
}

impl Module for CausalConv1d {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let len = xs.dim(D::Minus1)?;
        if self.output_len(len).is_none() {
            bail!("input of {len} samples is shorter than stride {}", self.stride);
        }
        let padded = self.pad(xs)?;
        self.conv.forward(&padded)
    }
}

// ---------------------------------------------------------------------------
// CausalConvTranspose1d
// ---------------------------------------------------------------------------

/// ConvTranspose1d with the non-causal tail trimmed from the right.
#[derive(Debug, Clone)]
pub struct CausalConvTranspose1d {
    conv: ConvTranspose1d,
    kernel_size: usize,
    stride: usize,
    dilation: usize,
    trim: usize,
}

impl CausalConvTranspose1d {
    /// Create the layer, loading `weight` `[in, out / groups, k]` and `bias`.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        cfg: CausalConvConfig,
        vb: VarBuilder,
    ) -> Result<Self> {
        if cfg.padding_mode != PaddingMode::Zeros {
            return Err(Error::Config(format!(
                "transposed convolution only supports zero padding, got {:?}",
                cfg.padding_mode
            )));
        }
        let trim = cfg.causal_amount(kernel_size)?;
        let conv_cfg = ConvTranspose1dConfig {
            padding: 0,
            output_padding: 0,
            stride: cfg.stride,
            dilation: cfg.dilation,
            groups: cfg.groups,
        };
        let conv =
            candle_nn::conv_transpose1d(in_channels, out_channels, kernel_size, conv_cfg, vb)?;
        Ok(Self {
            conv,
            kernel_size,
            stride: cfg.stride,
            dilation: cfg.dilation,
            trim,
        })
    }

    /// Samples dropped from the right edge on every call.
    pub fn causal_trim(&self) -> usize {
        self.trim
    }

    /// Output length for an input of `len` frames.
    pub fn output_len(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        (len - 1) * self.stride + self.dilation * (self.kernel_size - 1) + 1 - self.trim
    }
}

impl Module for CausalConvTranspose1d {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        if xs.dim(D::Minus1)? == 0 {
            bail!("transposed convolution needs at least one frame");
        }
        let out = self.conv.forward(xs)?;
        if self.trim == 0 {
            return Ok(out);
        }
        let len = out.dim(D::Minus1)?;
        out.narrow(D::Minus1, 0, len - self.trim)
    }
}
