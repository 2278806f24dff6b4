//! Residual wrapper and the dilated residual unit.

use candle_core::{Tensor, bail};
use candle_nn::{Activation, Module, Sequential, VarBuilder};

use super::conv::{CausalConv1d, CausalConvConfig};
use crate::Result;

/// Skip connection around an arbitrary transform: `f(x) + x`.
///
/// The wrapped transform must return exactly the input shape.
pub struct Residual<F> {
    inner: F,
}

impl<F> std::fmt::Debug for Residual<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Residual").finish_non_exhaustive()
    }
}

impl<F: Module> Residual<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F: Module> Module for Residual<F> {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let ys = self.inner.forward(xs)?;
        if ys.dims() != xs.dims() {
            bail!(
                "residual branch returned {:?} for input {:?}",
                ys.dims(),
                xs.dims()
            );
        }
        ys + xs
    }
}

/// Default kernel of the dilated convolution inside a residual unit.
pub const RESIDUAL_KERNEL_SIZE: usize = 7;

/// Residual unit: CausalConv1d(k, dilation) → ELU → CausalConv1d(k=1) → ELU,
/// wrapped in [`Residual`].
///
/// Both convolutions keep `channels` and, at stride 1, the time length.
pub type ResidualUnit = Residual<Sequential>;

/// Build a [`ResidualUnit`] whose weights live under `vb.pp("fn")`.
pub fn residual_unit(
    channels: usize,
    dilation: usize,
    kernel_size: usize,
    vb: VarBuilder,
) -> Result<ResidualUnit> {
    let vb = vb.pp("fn");
    let dilated = CausalConv1d::new(
        channels,
        channels,
        kernel_size,
        CausalConvConfig::with_dilation(dilation),
        vb.pp(0),
    )?;
    let pointwise = CausalConv1d::new(channels, channels, 1, CausalConvConfig::default(), vb.pp(2))?;
    Ok(Residual::new(
        candle_nn::seq()
            .add(dilated)
            .add(Activation::Elu(1.0))
            .add(pointwise)
            .add(Activation::Elu(1.0)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    struct ZeroBranch;

    impl Module for ZeroBranch {
        fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
            xs.zeros_like()
        }
    }

    struct Truncate;

    impl Module for Truncate {
        fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
            xs.narrow(2, 1, xs.dim(2)? - 1)
        }
    }

    #[test]
    fn zero_branch_is_identity() {
        let device = Device::Cpu;
        let x = Tensor::randn(0f32, 1.0, (2, 4, 33), &device).unwrap();
        let y = Residual::new(ZeroBranch).forward(&x).unwrap();
        let x: Vec<f32> = x.flatten_all().unwrap().to_vec1().unwrap();
        let y: Vec<f32> = y.flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(x, y);
    }

    #[test]
    fn branch_shape_change_is_an_error() {
        let device = Device::Cpu;
        let x = Tensor::zeros((1, 2, 10), DType::F32, &device).unwrap();
        let err = Residual::new(Truncate).forward(&x).unwrap_err();
        assert!(err.to_string().contains("residual branch"), "{err}");
    }

    #[test]
    fn residual_unit_preserves_shape() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        for dilation in [1, 3, 9] {
            let unit = residual_unit(8, dilation, RESIDUAL_KERNEL_SIZE, vb.pp(dilation)).unwrap();
            assert_eq!(unit.inner().len(), 4);
            let x = Tensor::randn(0f32, 1.0, (2, 8, 50), &device).unwrap();
            assert_eq!(unit.forward(&x).unwrap().dims(), &[2, 8, 50]);
        }
        let names: Vec<String> = varmap.data().lock().unwrap().keys().cloned().collect();
        assert!(names.contains(&"3.fn.0.weight".to_string()), "{names:?}");
        assert!(names.contains(&"9.fn.2.bias".to_string()), "{names:?}");
    }

    #[test]
    fn zero_weights_give_identity() {
        let device = Device::Cpu;
        let vb = VarBuilder::zeros(DType::F32, &device);
        let unit = residual_unit(4, 3, RESIDUAL_KERNEL_SIZE, vb).unwrap();
        let x = Tensor::randn(0f32, 1.0, (1, 4, 20), &device).unwrap();
        let diff: f32 = (unit.forward(&x).unwrap() - &x)
            .unwrap()
            .abs()
            .unwrap()
            .max_all()
            .unwrap()
            .to_scalar()
            .unwrap();
        assert_eq!(diff, 0.0);
    }
}
