//! Convert a source utterance to the voice of a target speaker.
//!
//! Usage:
//! cargo run --example convert -- --weights streamvc.safetensors \
//!     --source source.wav --target target.wav --output out.wav
//!
//! Inputs must be 16 kHz; multi-channel files are down-mixed to mono.

use clap::Parser;
use streamvc_rs::{
    audio::{from_waveform, peak_normalize, read_wav_mono, to_waveform, write_wav},
    config::StreamVcConfig,
    model::StreamVc,
};

#[derive(Parser, Debug)]
#[command(name = "convert", about = "StreamVC voice conversion")]
struct Args {
    /// Generator weights (safetensors).
    #[arg(long, short = 'w')]
    weights: String,

    /// JSON model configuration. Defaults are used when omitted.
    #[arg(long)]
    config: Option<String>,

    /// Utterance whose content is kept.
    #[arg(long, short = 's')]
    source: String,

    /// Utterance whose voice is used.
    #[arg(long, short = 't')]
    target: String,

    /// Output WAV path.
    #[arg(long, short = 'o')]
    output: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => StreamVcConfig::from_json_file(path)?,
        None => StreamVcConfig::default(),
    };

    let device = candle_core::Device::cuda_if_available(0)?;
    tracing::info!("Using device: {:?}", device);

    let model =
        StreamVc::from_safetensors(&cfg, &[&args.weights], candle_core::DType::F32, &device)?;

    let load = |path: &str| -> anyhow::Result<candle_core::Tensor> {
        let (samples, sample_rate) = read_wav_mono(path)?;
        if sample_rate != cfg.sample_rate {
            anyhow::bail!(
                "{path} is {sample_rate} Hz, the model expects {} Hz",
                cfg.sample_rate
            );
        }
        Ok(to_waveform(&samples, &device)?)
    };
    let source = load(&args.source)?;
    let target = load(&args.target)?;

    tracing::info!(
        "Converting {:.2}s of audio",
        source.dim(1)? as f64 / cfg.sample_rate as f64
    );
    let converted = model.forward(&source, &target)?;

    let mut samples = from_waveform(&converted)?;
    peak_normalize(&mut samples);
    write_wav(&args.output, &samples, cfg.sample_rate)?;

    tracing::info!("Wrote {} samples to {}", samples.len(), args.output);
    Ok(())
}
