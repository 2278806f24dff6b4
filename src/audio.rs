//! Audio I/O utilities.
//!
//! Mono WAV read/write and conversion to waveform tensors.

mod wav;

pub use wav::{from_waveform, peak_normalize, read_wav_mono, to_waveform, write_wav};
