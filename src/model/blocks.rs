//! Encoder and decoder blocks: the unit of stride change.
//!
//! ```text
//! EncoderBlock: 3× ResidualUnit(in, d=1,3,9) → CausalConv1d(in→out, k=2s, s) → ELU
//! DecoderBlock: CausalConvTranspose1d(in→out, k=2s, s) → 3× ResidualUnit(out, d=1,3,9)
//! ```

use candle_nn::{Activation, Sequential, VarBuilder};

use super::conv::{CausalConv1d, CausalConvConfig, CausalConvTranspose1d};
use super::residual::{RESIDUAL_KERNEL_SIZE, residual_unit};
use crate::Result;

/// Dilations of the residual units inside every block.
pub const BLOCK_DILATIONS: [usize; 3] = [1, 3, 9];

/// Downsample by `stride`, widening `in_channels` to `out_channels`.
pub fn encoder_block(
    in_channels: usize,
    out_channels: usize,
    stride: usize,
    vb: VarBuilder,
) -> Result<Sequential> {
    let mut block = candle_nn::seq();
    for (i, dilation) in BLOCK_DILATIONS.into_iter().enumerate() {
        block = block.add(residual_unit(
            in_channels,
            dilation,
            RESIDUAL_KERNEL_SIZE,
            vb.pp(i),
        )?);
    }
    let down = CausalConv1d::new(
        in_channels,
        out_channels,
        2 * stride,
        CausalConvConfig::with_stride(stride),
        vb.pp(BLOCK_DILATIONS.len()),
    )?;
    Ok(block.add(down).add(Activation::Elu(1.0)))
}

/// Upsample by `stride`, narrowing `in_channels` to `out_channels`.
pub fn decoder_block(
    in_channels: usize,
    out_channels: usize,
    stride: usize,
    vb: VarBuilder,
) -> Result<Sequential> {
    let up = CausalConvTranspose1d::new(
        in_channels,
        out_channels,
        2 * stride,
        CausalConvConfig::with_stride(stride),
        vb.pp(0),
    )?;
    let mut block = candle_nn::seq().add(up);
    for (i, dilation) in BLOCK_DILATIONS.into_iter().enumerate() {
        block = block.add(residual_unit(
            out_channels,
            dilation,
            RESIDUAL_KERNEL_SIZE,
            vb.pp(i + 1),
        )?);
    }
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Tensor};
    use candle_nn::{Module, VarMap};

    #[test]
    fn encoder_block_downsamples_and_widens() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let block = encoder_block(4, 8, 5, vb).unwrap();
        assert_eq!(block.len(), 5);
        let x = Tensor::randn(0f32, 1.0, (2, 4, 200), &device).unwrap();
        assert_eq!(block.forward(&x).unwrap().dims(), &[2, 8, 40]);
    }

    #[test]
    fn decoder_block_upsamples_and_narrows() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let block = decoder_block(8, 4, 5, vb).unwrap();
        assert_eq!(block.len(), 4);
        let x = Tensor::randn(0f32, 1.0, (2, 8, 40), &device).unwrap();
        assert_eq!(block.forward(&x).unwrap().dims(), &[2, 4, 200]);
    }

    #[test]
    fn block_parameter_paths() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        encoder_block(2, 4, 2, vb.pp("enc")).unwrap();
        decoder_block(4, 2, 2, vb.pp("dec")).unwrap();
        let data = varmap.data().lock().unwrap();
        let weight = |name: &str| data.get(name).map(|v| v.dims().to_vec());
        assert_eq!(weight("enc.3.weight"), Some(vec![4, 2, 4]));
        assert_eq!(weight("enc.2.fn.0.weight"), Some(vec![2, 2, 7]));
        assert_eq!(weight("dec.0.weight"), Some(vec![4, 2, 4]));
        assert_eq!(weight("dec.3.fn.2.weight"), Some(vec![2, 2, 1]));
    }
}
