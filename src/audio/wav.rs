//! Mono WAV file I/O.

use std::path::Path;

use candle_core::{Device, Tensor};

use crate::{Error, Result};

/// Read a WAV file as mono, return (samples, sample_rate).
///
/// Multi-channel files are down-mixed by averaging. Samples are f32 in [-1, 1].
pub fn read_wav_mono(path: impl AsRef<Path>) -> Result<(Vec<f32>, u32)> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(Error::Audio("WAV file declares zero channels".into()));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1u32 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };
    Ok((samples, spec.sample_rate))
}

/// Write mono f32 samples as a WAV file.
pub fn write_wav(path: impl AsRef<Path>, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Peak-normalize audio samples to [-1, 1].
pub fn peak_normalize(samples: &mut [f32]) {
    let max_abs = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    if max_abs > 1e-8 {
        let scale = 1.0 / max_abs;
        for s in samples.iter_mut() {
            *s *= scale;
        }
    }
}

/// Samples → `[1, samples]` waveform tensor.
pub fn to_waveform(samples: &[f32], device: &Device) -> Result<Tensor> {
    Ok(Tensor::from_slice(samples, (1, samples.len()), device)?)
}

/// `[samples]` or `[1, samples]` waveform tensor → samples.
pub fn from_waveform(waveform: &Tensor) -> Result<Vec<f32>> {
    let dims = waveform.dims();
    if !matches!(dims, [_] | [1, _]) {
        return Err(Error::ShapeMismatch(format!(
            "expected a single waveform, got shape {dims:?}"
        )));
    }
    Ok(waveform.flatten_all()?.to_vec1()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_normalize() {
        let mut samples = vec![0.5, -0.25, 0.1];
        peak_normalize(&mut samples);
        assert!((samples[0] - 1.0).abs() < 1e-6);
        assert!((samples[1] - (-0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_roundtrip_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wav");
        let original = vec![0.0f32, 0.5, -0.5, 1.0, -1.0, 0.25];
        write_wav(&path, &original, 16_000).unwrap();
        let (loaded, sr) = read_wav_mono(&path).unwrap();
        assert_eq!(sr, 16_000);
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_stereo_downmix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for s in [16384i16, 0, -16384, -16384] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let (mono, _) = read_wav_mono(&path).unwrap();
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.25).abs() < 1e-6);
        assert!((mono[1] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_waveform_tensor_roundtrip() {
        let device = Device::Cpu;
        let samples = vec![0.1f32, -0.2, 0.3];
        let waveform = to_waveform(&samples, &device).unwrap();
        assert_eq!(waveform.dims(), &[1, 3]);
        assert_eq!(from_waveform(&waveform).unwrap(), samples);

        let batch = Tensor::zeros((2, 3), candle_core::DType::F32, &device).unwrap();
        assert!(from_waveform(&batch).is_err());
    }
}
