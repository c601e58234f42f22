//! # Squeeze-and-Excitation
//!
//! [`SqueezeExcite2d`] rescales the channels of a feature map by a learned
//! gate computed from its global average:
//!
//! ```text
//! gate = excite_act(excite_conv(squeeze_act(squeeze_conv(avg_pool(x)))))
//! y = x * gate
//! ```
//!
//! Both convs are ``1x1`` with bias; the squeeze conv reduces to
//! ``floor(filters * ratio)`` channels.
use crate::errors::{RegNetError, RegNetResult, expect_ok};
use crate::layers::activation::{Activation, ActivationConfig};
use crate::layers::conv_bn_act::HE_NORMAL_INITIALIZER;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::prelude::{Backend, Tensor};

/// [`SqueezeExcite2d`] Config.
#[derive(Config, Debug)]
pub struct SqueezeExcite2dConfig {
    /// Unit name.
    pub name: String,

    /// Number of gated channels.
    pub filters: usize,

    /// Squeeze ratio, in ``(0, 1)``.
    #[config(default = 0.25)]
    pub ratio: f64,

    /// Activation after the squeeze conv.
    #[config(default = "ActivationConfig::Relu")]
    pub squeeze_act: ActivationConfig,

    /// Activation after the excite conv; produces the gate.
    #[config(default = "ActivationConfig::Sigmoid")]
    pub excite_act: ActivationConfig,
}

impl SqueezeExcite2dConfig {
    /// Number of channels in the squeezed representation.
    pub fn bottleneck_filters(&self) -> usize {
        (self.filters as f64 * self.ratio) as usize
    }

    /// Check if the config is valid.
    pub fn try_validate(&self) -> RegNetResult<()> {
        if !(self.ratio > 0.0 && self.ratio < 1.0) {
            return Err(RegNetError::InvalidRatio {
                name: "squeeze_excite_ratio",
                value: self.ratio,
                low: 0.0,
                high: 1.0,
            });
        }
        if self.bottleneck_filters() == 0 {
            return Err(RegNetError::InvalidRatio {
                name: "squeeze_excite_ratio",
                value: self.ratio,
                low: 1.0 / self.filters as f64,
                high: 1.0,
            });
        }
        Ok(())
    }

    /// The registered names of this unit's layers.
    pub fn layer_names(&self) -> Vec<String> {
        vec![
            format!("{}_squeeze_conv", self.name),
            format!("{}_squeeze_{}", self.name, self.squeeze_act.name()),
            format!("{}_excite_conv", self.name),
            format!("{}_excite_{}", self.name, self.excite_act.name()),
        ]
    }

    /// Initialize a [`SqueezeExcite2d`].
    pub fn try_init<B: Backend>(
        self,
        device: &B::Device,
    ) -> RegNetResult<SqueezeExcite2d<B>> {
        self.try_validate()?;
        let bottleneck = self.bottleneck_filters();
        Ok(SqueezeExcite2d {
            name: Ignored(self.name),
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            squeeze_conv: Conv2dConfig::new([self.filters, bottleneck], [1, 1])
                .with_initializer(HE_NORMAL_INITIALIZER)
                .init(device),
            squeeze_act: self.squeeze_act.init(device),
            excite_conv: Conv2dConfig::new([bottleneck, self.filters], [1, 1])
                .with_initializer(HE_NORMAL_INITIALIZER)
                .init(device),
            excite_act: self.excite_act.init(device),
        })
    }

    /// Initialize a [`SqueezeExcite2d`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> SqueezeExcite2d<B> {
        expect_ok(self.try_init(device))
    }
}

/// Squeeze-and-Excitation channel gate.
#[derive(Module, Debug)]
pub struct SqueezeExcite2d<B: Backend> {
    /// Unit name.
    pub name: Ignored<String>,

    /// Global average pool.
    pub pool: AdaptiveAvgPool2d,

    /// Reducing ``1x1`` conv.
    pub squeeze_conv: Conv2d<B>,

    /// Squeeze activation.
    pub squeeze_act: Activation<B>,

    /// Expanding ``1x1`` conv.
    pub excite_conv: Conv2d<B>,

    /// Gate activation.
    pub excite_act: Activation<B>,
}

impl<B: Backend> SqueezeExcite2d<B> {
    /// Number of gated channels.
    pub fn filters(&self) -> usize {
        self.excite_conv.weight.shape().dims[0]
    }

    /// Number of channels in the squeezed representation.
    pub fn bottleneck_filters(&self) -> usize {
        self.squeeze_conv.weight.shape().dims[0]
    }

    /// The registered names of this unit's layers.
    pub fn layer_names(&self) -> Vec<String> {
        let name = &self.name.0;
        vec![
            format!("{name}_squeeze_conv"),
            format!("{name}_squeeze_{}", self.squeeze_act.name()),
            format!("{name}_excite_conv"),
            format!("{name}_excite_{}", self.excite_act.name()),
        ]
    }

    /// Compute the ``[batch, filters, 1, 1]`` channel gate.
    pub fn gate(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.pool.forward(input);
        let x = self.squeeze_conv.forward(x);
        let x = self.squeeze_act.forward(x);
        let x = self.excite_conv.forward(x);
        self.excite_act.forward(x)
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, filters, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, filters, height, width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, height, width] = unpack_shape_contract!(
            ["batch", "filters", "height", "width"],
            &input,
            &["batch", "height", "width"],
            &[("filters", self.filters())]
        );

        let gate = self.gate(input.clone());
        let x = input * gate;

        assert_shape_contract_periodically!(
            ["batch", "filters", "height", "width"],
            &x,
            &[
                ("batch", batch),
                ("filters", self.filters()),
                ("height", height),
                ("width", width)
            ]
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    #[test]
    fn test_config() {
        let config = SqueezeExcite2dConfig::new("se".to_string(), 64);
        assert_eq!(config.ratio, 0.25);
        assert_eq!(config.bottleneck_filters(), 16);
        config.try_validate().unwrap();

        let config = SqueezeExcite2dConfig::new("se".to_string(), 10);
        assert_eq!(config.bottleneck_filters(), 2);
    }

    #[test]
    fn test_invalid_ratio() {
        for ratio in [0.0, 1.0, -0.5, 2.0] {
            let config = SqueezeExcite2dConfig::new("se".to_string(), 64).with_ratio(ratio);
            assert!(matches!(
                config.try_validate(),
                Err(RegNetError::InvalidRatio { .. })
            ));
        }

        let config = SqueezeExcite2dConfig::new("se".to_string(), 2).with_ratio(0.25);
        assert!(matches!(
            config.try_init::<NdArray>(&Default::default()),
            Err(RegNetError::InvalidRatio { .. })
        ));
    }

    #[test]
    fn test_forward() {
        type B = NdArray;
        let device = Default::default();

        let layer: SqueezeExcite2d<B> =
            SqueezeExcite2dConfig::new("block_se".to_string(), 8).init(&device);
        assert_eq!(layer.filters(), 8);
        assert_eq!(layer.bottleneck_filters(), 2);
        assert_eq!(
            layer.layer_names(),
            vec![
                "block_se_squeeze_conv".to_string(),
                "block_se_squeeze_relu".to_string(),
                "block_se_excite_conv".to_string(),
                "block_se_excite_sigmoid".to_string(),
            ]
        );

        let input: Tensor<B, 4> = Tensor::random([2, 8, 5, 3], Distribution::Default, &device);

        let gate = layer.gate(input.clone());
        assert_eq!(gate.dims(), [2, 8, 1, 1]);
        let gate_values: Vec<f32> = gate.clone().into_data().to_vec().unwrap();
        assert!(gate_values.iter().all(|g| (0.0..=1.0).contains(g)));

        let output = layer.forward(input.clone());
        assert_eq!(output.dims(), [2, 8, 5, 3]);

        let expected = input * gate.repeat_dim(2, 5).repeat_dim(3, 3);
        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
