//! # `RegNet` Stem
//!
//! A single downsampling [`ConvBnAct2d`] unit:
//! ``3x3`` conv to 32 channels, stride 2, ``same`` padding, batch norm, ``relu``.

use crate::layers::conv_bn_act::{ConvBnAct2d, ConvBnAct2dConfig, ConvBnAct2dMeta};
use crate::layers::padding::PaddingMode;
use crate::models::regnet::naming::NamingContext;
use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};

/// Stem output channels.
pub const STEM_FILTERS: usize = 32;

/// [`RegNetStem`] Config.
#[derive(Config, Debug)]
pub struct RegNetStemConfig {
    /// Name prefix; the conv unit is named ``{name}_stem_conv``.
    pub name: String,

    /// Input channels.
    #[config(default = 3)]
    pub in_channels: usize,

    /// Output channels.
    #[config(default = "STEM_FILTERS")]
    pub filters: usize,
}

impl RegNetStemConfig {
    /// Build a stem config with a name drawn from `ctx`.
    pub fn build_with_context(ctx: &mut NamingContext) -> Self {
        Self::new(ctx.unique_name("stem"))
    }

    /// The conv unit config.
    pub fn conv_config(&self) -> ConvBnAct2dConfig {
        ConvBnAct2dConfig::build(
            format!("{}_stem_conv", self.name),
            self.in_channels,
            self.filters,
            3,
        )
        .with_stride(2)
        .with_padding(PaddingMode::Same)
    }

    /// The registered names of this unit's layers.
    pub fn layer_names(&self) -> Vec<String> {
        self.conv_config().layer_names()
    }

    /// Get the output resolution for a given input resolution.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.conv_config().output_resolution(input_resolution)
    }

    /// Initialize a [`RegNetStem`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> RegNetStem<B> {
        RegNetStem {
            conv: self.conv_config().init(device),
        }
    }
}

/// `RegNet` input stem.
#[derive(Module, Debug)]
pub struct RegNetStem<B: Backend> {
    /// The conv/norm/act unit.
    pub conv: ConvBnAct2d<B>,
}

impl<B: Backend> RegNetStem<B> {
    /// Input channels.
    pub fn in_channels(&self) -> usize {
        self.conv.in_channels()
    }

    /// Output channels.
    pub fn out_channels(&self) -> usize {
        self.conv.out_channels()
    }

    /// The registered names of this unit's layers.
    pub fn layer_names(&self) -> Vec<String> {
        self.conv.layer_names()
    }

    /// Get the output resolution for a given input resolution.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.conv.output_resolution(input_resolution)
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, filters, ceil(height / 2), ceil(width / 2)]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.conv.forward(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::activation::ActivationConfig;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    #[test]
    fn test_config() {
        let config = RegNetStemConfig::new("regnet".to_string());
        let conv = config.conv_config();
        assert_eq!(conv.name, "regnet_stem_conv");
        assert_eq!(conv.in_channels(), 3);
        assert_eq!(conv.out_channels(), STEM_FILTERS);
        assert_eq!(conv.kernel_size(), [3, 3]);
        assert_eq!(conv.stride(), [2, 2]);
        assert_eq!(conv.padding(), PaddingMode::Same);
        assert!(matches!(conv.act, Some(ActivationConfig::Relu)));

        assert_eq!(
            config.layer_names(),
            vec![
                "regnet_stem_conv".to_string(),
                "regnet_stem_conv_bn".to_string(),
                "regnet_stem_conv_relu".to_string(),
            ]
        );
        assert_eq!(config.output_resolution([224, 224]), [112, 112]);
        assert_eq!(config.output_resolution([15, 16]), [8, 8]);
    }

    #[test]
    fn test_context_names() {
        let mut ctx = NamingContext::new();
        assert_eq!(RegNetStemConfig::build_with_context(&mut ctx).name, "stem_1");
        assert_eq!(RegNetStemConfig::build_with_context(&mut ctx).name, "stem_2");
    }

    #[test]
    fn test_forward() {
        type B = NdArray;
        let device = Default::default();

        let stem: RegNetStem<B> = RegNetStemConfig::new("m".to_string()).init(&device);
        assert_eq!(stem.in_channels(), 3);
        assert_eq!(stem.out_channels(), 32);

        let input = Tensor::random([2, 3, 17, 12], Distribution::Default, &device);
        let output = stem.forward(input);

        assert_shape_contract!(
            ["batch", "channels", "height", "width"],
            &output,
            &[
                ("batch", 2),
                ("channels", 32),
                ("height", 9),
                ("width", 6)
            ],
        );
    }
}
