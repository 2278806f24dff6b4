//! Learnable attention pooling: a variable-length embedding sequence →
//! one fixed-size vector.
//!
//! A single learned query attends over the sequence with one attention head
//! and no projection biases. Parameters follow the packed layout of
//! `nn.MultiheadAttention`: `attention.in_proj_weight` `[3D, D]` holds the
//! query, key and value projections stacked in that order.

use candle_core::{D, Tensor};
use candle_nn::{Init, Linear, Module, VarBuilder};

use super::layers::{fold_leading, unfold_leading};
use crate::{Error, Result};

/// Single-query, single-head attention pooling.
#[derive(Debug, Clone)]
pub struct LearnablePooling {
    /// Learned query `[1, D]`.
    query: Tensor,
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    out_proj: Linear,
    dim: usize,
}

impl LearnablePooling {
    pub fn new(dim: usize, vb: VarBuilder) -> Result<Self> {
        if dim == 0 {
            return Err(Error::Config("pooling dim must be positive".into()));
        }
        let query = vb.get_with_hints((1, dim), "pooling_weights", Init::Const(1.0))?;
        let attn = vb.pp("attention");
        let in_proj =
            attn.get_with_hints((3 * dim, dim), "in_proj_weight", candle_nn::init::DEFAULT_KAIMING_NORMAL)?;
        let projection = |i: usize| -> Result<Linear> {
            Ok(Linear::new(in_proj.narrow(0, i * dim, dim)?, None))
        };
        let q_proj = projection(0)?;
        let k_proj = projection(1)?;
        let v_proj = projection(2)?;
        let out_proj = candle_nn::linear_no_bias(dim, dim, attn.pp("out_proj"))?;
        Ok(Self {
            query,
            q_proj,
            k_proj,
            v_proj,
            out_proj,
            dim,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Pool a sequence.
    ///
    /// - Input: `[.., T, D]`, any `T >= 1`
    /// - Output: `[.., D]`
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let dim = xs.dim(D::Minus1)?;
        if dim != self.dim {
            return Err(Error::ShapeMismatch(format!(
                "pooling expects embedding dim {}, got {dim}",
                self.dim
            )));
        }
        let (xs, leading) = fold_leading(xs, 2)?;
        if xs.dim(1)? == 0 {
            return Err(Error::ShapeMismatch("cannot pool an empty sequence".into()));
        }

        // [1, 1, D]
        let q = self.q_proj.forward(&self.query)?.unsqueeze(0)?;
        // [B, T, D]
        let k = self.k_proj.forward(&xs)?;
        let v = self.v_proj.forward(&xs)?;

        let scale = 1.0 / (self.dim as f64).sqrt();
        // [1, 1, D] x [B, D, T] → [B, 1, T]
        let scores = (q.broadcast_matmul(&k.t()?.contiguous()?)? * scale)?;
        let weights = candle_nn::ops::softmax_last_dim(&scores.contiguous()?)?;
        // [B, 1, T] x [B, T, D] → [B, 1, D]
        let pooled = weights.matmul(&v.contiguous()?)?;
        let pooled = self.out_proj.forward(&pooled)?.squeeze(1)?;
        unfold_leading(&pooled, &leading)
    }
}
