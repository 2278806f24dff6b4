//! StreamVC voice conversion in pure Rust.
//!
//! A candle-based implementation of the causal convolutional encoder and
//! FiLM-conditioned decoder behind StreamVC. Every layer is strictly causal:
//! frame `t` depends only on samples up to `t`, which is what allows the same
//! weights to run incrementally on live audio.
//!
//! ## Architecture
//!
//! ```text
//! source 16 kHz ─→ content Encoder (÷320) ───────→ [B, F, 64] ─┐
//!                                                               ├→ Decoder (×320) → [B, F*320]
//! target 16 kHz ─→ speech Encoder → LearnablePooling → [B, 64] ─┘   (FiLM after every block)
//! ```
//!
//! ## Modules
//!
//! - [`audio`] — mono WAV I/O and waveform tensors
//! - [`config`] — model dimensions, stride constants
//! - [`frames`] — sample/frame/label alignment helpers
//! - [`model`] — causal conv primitives, blocks, encoder, decoder, pooling

pub mod audio;
pub mod config;
pub mod frames;
pub mod model;

mod error;

pub use error::{Error, Result};
