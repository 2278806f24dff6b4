//! Model components for StreamVC.
//!
//! ## Components
//!
//! - [`layers`] — conditioning trait, axis rearrangement, batch folding
//! - [`conv`] — causal convolution and causal transposed convolution
//! - [`residual`] — residual wrapper and dilated residual unit
//! - [`film`] — FiLM conditioning and the conditioning-aware pipeline
//! - [`blocks`] — encoder/decoder blocks (one stride change each)
//! - [`encoder`] — waveform → 50 Hz frame embeddings
//! - [`decoder`] — frame embeddings + speaker vector → waveform
//! - [`pooling`] — learnable attention pooling to a speaker vector
//! - [`classifier`] — per-frame classification head for content training
//! - [`streamvc`] — the assembled voice-conversion generator

pub mod blocks;
pub mod classifier;
pub mod conv;
pub mod decoder;
pub mod encoder;
pub mod film;
pub mod layers;
pub mod pooling;
pub mod residual;
pub mod streamvc;

pub use classifier::EncoderClassifier;
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use film::{Film, SequentialWithFilm, Stage};
pub use layers::ConditionedModule;
pub use pooling::LearnablePooling;
pub use streamvc::StreamVc;
