//! # Input Rescaling
//!
//! ``y = x * scale + offset``; the default maps ``[0, 255]`` pixels to ``[0, 1]``.
use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};

/// [`Rescaling`] Config.
#[derive(Config, Debug)]
pub struct RescalingConfig {
    /// Multiplicative scale.
    #[config(default = "1.0 / 255.0")]
    pub scale: f64,

    /// Additive offset, applied after scaling.
    #[config(default = 0.0)]
    pub offset: f64,
}

impl RescalingConfig {
    /// Initialize a [`Rescaling`] layer.
    pub fn init(&self) -> Rescaling {
        Rescaling {
            scale: self.scale,
            offset: self.offset,
        }
    }
}

/// Stateless affine rescaling layer.
#[derive(Module, Clone, Debug)]
pub struct Rescaling {
    /// Multiplicative scale.
    pub scale: f64,

    /// Additive offset.
    pub offset: f64,
}

impl Rescaling {
    /// Forward pass.
    pub fn forward<B: Backend, const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        let x = input.mul_scalar(self.scale);
        if self.offset == 0.0 {
            x
        } else {
            x.add_scalar(self.offset)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_default_rescaling() {
        let device = Default::default();
        let layer = RescalingConfig::new().init();
        assert_eq!(layer.scale, 1.0 / 255.0);

        let input: Tensor<NdArray, 2> = Tensor::from_data([[0.0, 255.0], [51.0, 102.0]], &device);
        let output: Vec<f32> = layer.forward(input).into_data().to_vec().unwrap();

        let expected = [0.0, 1.0, 0.2, 0.4];
        for (actual, expected) in output.iter().zip(expected) {
            assert!((actual - expected).abs() < 1e-6, "{actual} != {expected}");
        }
    }

    #[test]
    fn test_offset() {
        let device = Default::default();
        let layer = RescalingConfig::new()
            .with_scale(2.0)
            .with_offset(-1.0)
            .init();

        let input: Tensor<NdArray, 1> = Tensor::from_data([0.0, 0.5, 1.0], &device);
        let output = layer.forward(input);
        output
            .to_data()
            .assert_eq(&Tensor::<NdArray, 1>::from_data([-1.0, 0.0, 1.0], &device).to_data(), true);
    }
}
