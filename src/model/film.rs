//! FiLM conditioning and the pipeline that threads a conditioning vector
//! through selected stages.
//!
//! A [`Stage`] is tagged once, at construction, with whether it consumes the
//! conditioning input. [`SequentialWithFilm`] dispatches on that tag only, so
//! any [`ConditionedModule`] can be injected, not just [`Film`].

use candle_core::{D, Tensor};
use candle_nn::{Linear, Module, VarBuilder};

use super::layers::ConditionedModule;
use crate::{Error, Result};

// ---------------------------------------------------------------------------
// FiLM
// ---------------------------------------------------------------------------

/// Feature-wise linear modulation: `x * gamma(c) + beta(c)` per channel.
#[derive(Debug, Clone)]
pub struct Film {
    to_gamma: Linear,
    to_beta: Linear,
    dim: usize,
    conditioning_dim: usize,
}

impl Film {
    pub fn new(dim: usize, conditioning_dim: usize, vb: VarBuilder) -> Result<Self> {
        let to_gamma = candle_nn::linear(conditioning_dim, dim, vb.pp("to_gamma"))?;
        let to_beta = candle_nn::linear(conditioning_dim, dim, vb.pp("to_beta"))?;
        Ok(Self {
            to_gamma,
            to_beta,
            dim,
            conditioning_dim,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn conditioning_dim(&self) -> usize {
        self.conditioning_dim
    }
}

impl ConditionedModule for Film {
    /// `xs`: `[B, dim, T]`, `condition`: `[B, conditioning_dim]`.
    fn forward(&self, xs: &Tensor, condition: &Tensor) -> Result<Tensor> {
        let cond_dim = condition.dim(D::Minus1)?;
        if cond_dim != self.conditioning_dim {
            return Err(Error::ShapeMismatch(format!(
                "FiLM expects conditioning dim {}, got {cond_dim}",
                self.conditioning_dim
            )));
        }
        let channels = xs.dim(D::Minus2)?;
        if channels != self.dim {
            return Err(Error::ShapeMismatch(format!(
                "FiLM expects {} channels, got {channels}",
                self.dim
            )));
        }
        // [B, dim] → [B, dim, 1], one value per channel for every frame
        let gamma = self.to_gamma.forward(condition)?.unsqueeze(condition.rank())?;
        let beta = self.to_beta.forward(condition)?.unsqueeze(condition.rank())?;
        Ok(xs.broadcast_mul(&gamma)?.broadcast_add(&beta)?)
    }
}

// ---------------------------------------------------------------------------
// Conditioning pipeline
// ---------------------------------------------------------------------------

/// A pipeline stage and its fixed calling convention.
pub enum Stage {
    /// Called with the signal only.
    Plain(Box<dyn Module>),
    /// Called with the signal and the conditioning vector.
    Conditioned(Box<dyn ConditionedModule>),
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Plain"),
            Self::Conditioned(module) => f.debug_tuple("Conditioned").field(module).finish(),
        }
    }
}

impl Stage {
    pub fn plain<M: Module + 'static>(module: M) -> Self {
        Self::Plain(Box::new(module))
    }

    pub fn conditioned<M: ConditionedModule + 'static>(module: M) -> Self {
        Self::Conditioned(Box::new(module))
    }

    pub fn consumes_conditioning(&self) -> bool {
        matches!(self, Self::Conditioned(_))
    }

    fn forward(&self, xs: &Tensor, condition: &Tensor) -> Result<Tensor> {
        match self {
            Self::Plain(module) => Ok(module.forward(xs)?),
            Self::Conditioned(module) => module.forward(xs, condition),
        }
    }
}

/// Ordered stages; conditioning-aware stages receive the condition, the rest
/// see the signal alone.
#[derive(Debug, Default)]
pub struct SequentialWithFilm {
    stages: Vec<Stage>,
}

impl SequentialWithFilm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage that only sees the signal.
    pub fn add<M: Module + 'static>(mut self, module: M) -> Self {
        self.stages.push(Stage::plain(module));
        self
    }

    /// Append a stage that also receives the conditioning vector.
    pub fn add_conditioned<M: ConditionedModule + 'static>(mut self, module: M) -> Self {
        self.stages.push(Stage::conditioned(module));
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn forward(&self, xs: &Tensor, condition: &Tensor) -> Result<Tensor> {
        let mut xs = xs.clone();
        for stage in &self.stages {
            xs = stage.forward(&xs, condition)?;
        }
        Ok(xs)
    }
}
