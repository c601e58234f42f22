//! # `RegNet` Y Block
//!
//! An X block with a squeeze-and-excitation gate between the grouped
//! ``3x3`` conv and the trailing ``1x1`` conv:
//!
//! ```text
//! skip = identity | {name}_skip_1x1
//! x = {name}_conv_1x1_1
//! x = {name}_conv_3x3
//! x = {name}_squeeze_excite            (filters_out, ratio)
//! x = {name}_conv_1x1_2
//! y = {name}_exit_relu(x + skip)
//! ```

use crate::errors::{RegNetResult, expect_ok};
use crate::layers::conv_bn_act::{ConvBnAct2d, ConvBnAct2dConfig, ConvBnAct2dMeta};
use crate::layers::padding::PaddingMode;
use crate::layers::squeeze_excite::{SqueezeExcite2d, SqueezeExcite2dConfig};
use crate::models::regnet::block::{
    BlockType, RegNetBlockMeta, check_group_width, check_residual_filters,
};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::Relu;
use burn::prelude::{Backend, Tensor};

/// [`RegNetYBlock`] Config.
///
/// Implements [`RegNetBlockMeta`].
#[derive(Config, Debug)]
pub struct RegNetYBlockConfig {
    /// Block name prefix.
    pub name: String,

    /// Input channels.
    pub filters_in: usize,

    /// Output channels.
    pub filters_out: usize,

    /// Channels per conv group.
    pub group_width: usize,

    /// Stride of the ``3x3`` conv and the skip projection.
    #[config(default = 1)]
    pub stride: usize,

    /// Squeeze-and-excitation ratio.
    #[config(default = 0.25)]
    pub squeeze_excite_ratio: f64,
}

impl RegNetBlockMeta for RegNetYBlockConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn block_type(&self) -> BlockType {
        BlockType::Y
    }

    fn filters_in(&self) -> usize {
        self.filters_in
    }

    fn filters_out(&self) -> usize {
        self.filters_out
    }

    fn group_width(&self) -> usize {
        self.group_width
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl RegNetYBlockConfig {
    /// Check if the config is valid.
    pub fn try_validate(&self) -> RegNetResult<()> {
        check_residual_filters(&self.name, self.filters_in, self.filters_out, self.stride)?;
        check_group_width(&self.name, self.filters_out, self.group_width)?;
        self.squeeze_excite_config().try_validate()
    }

    /// The skip projection config; `None` for an identity skip.
    pub fn skip_config(&self) -> Option<ConvBnAct2dConfig> {
        if self.stride == 1 {
            return None;
        }
        Some(
            ConvBnAct2dConfig::build(
                format!("{}_skip_1x1", self.name),
                self.filters_in,
                self.filters_out,
                1,
            )
            .with_stride(self.stride)
            .with_act(None),
        )
    }

    /// The leading ``1x1`` conv config.
    pub fn conv_1x1_1_config(&self) -> ConvBnAct2dConfig {
        ConvBnAct2dConfig::build(
            format!("{}_conv_1x1_1", self.name),
            self.filters_in,
            self.filters_out,
            1,
        )
    }

    /// The grouped ``3x3`` conv config.
    pub fn conv_3x3_config(&self) -> ConvBnAct2dConfig {
        ConvBnAct2dConfig::build(
            format!("{}_conv_3x3", self.name),
            self.filters_out,
            self.filters_out,
            3,
        )
        .with_stride(self.stride)
        .with_groups(self.groups())
        .with_padding(PaddingMode::Same)
    }

    /// The squeeze-and-excitation config.
    pub fn squeeze_excite_config(&self) -> SqueezeExcite2dConfig {
        SqueezeExcite2dConfig::new(format!("{}_squeeze_excite", self.name), self.filters_out)
            .with_ratio(self.squeeze_excite_ratio)
    }

    /// The trailing ``1x1`` conv config.
    pub fn conv_1x1_2_config(&self) -> ConvBnAct2dConfig {
        ConvBnAct2dConfig::build(
            format!("{}_conv_1x1_2", self.name),
            self.filters_out,
            self.filters_out,
            1,
        )
        .with_act(None)
    }

    /// The registered names of this block's layers.
    pub fn layer_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(skip) = self.skip_config() {
            names.extend(skip.layer_names());
        }
        names.extend(self.conv_1x1_1_config().layer_names());
        names.extend(self.conv_3x3_config().layer_names());
        names.extend(self.squeeze_excite_config().layer_names());
        names.extend(self.conv_1x1_2_config().layer_names());
        names.push(format!("{}_exit_relu", self.name));
        names
    }

    /// Initialize a [`RegNetYBlock`].
    pub fn try_init<B: Backend>(
        self,
        device: &B::Device,
    ) -> RegNetResult<RegNetYBlock<B>> {
        self.try_validate()?;
        Ok(RegNetYBlock {
            name: Ignored(self.name.clone()),
            skip: self.skip_config().map(|c| c.init(device)),
            conv_1x1_1: self.conv_1x1_1_config().init(device),
            conv_3x3: self.conv_3x3_config().init(device),
            se: self.squeeze_excite_config().try_init(device)?,
            conv_1x1_2: self.conv_1x1_2_config().init(device),
            exit_act: Relu,
        })
    }

    /// Initialize a [`RegNetYBlock`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> RegNetYBlock<B> {
        expect_ok(self.try_init(device))
    }
}

/// `RegNet` Y residual block.
///
/// Implements [`RegNetBlockMeta`].
#[derive(Module, Debug)]
pub struct RegNetYBlock<B: Backend> {
    /// Block name prefix.
    pub name: Ignored<String>,

    /// Optional skip projection.
    pub skip: Option<ConvBnAct2d<B>>,

    /// Leading ``1x1`` unit.
    pub conv_1x1_1: ConvBnAct2d<B>,

    /// Grouped ``3x3`` unit.
    pub conv_3x3: ConvBnAct2d<B>,

    /// Channel gate.
    pub se: SqueezeExcite2d<B>,

    /// Trailing ``1x1`` unit.
    pub conv_1x1_2: ConvBnAct2d<B>,

    /// Exit activation.
    pub exit_act: Relu,
}

impl<B: Backend> RegNetBlockMeta for RegNetYBlock<B> {
    fn name(&self) -> &str {
        &self.name.0
    }

    fn block_type(&self) -> BlockType {
        BlockType::Y
    }

    fn filters_in(&self) -> usize {
        self.conv_1x1_1.in_channels()
    }

    fn filters_out(&self) -> usize {
        self.conv_1x1_2.out_channels()
    }

    fn group_width(&self) -> usize {
        self.conv_3x3.out_channels() / self.conv_3x3.groups()
    }

    fn stride(&self) -> usize {
        self.conv_3x3.stride()[0]
    }

    fn groups(&self) -> usize {
        self.conv_3x3.groups()
    }
}

impl<B: Backend> RegNetYBlock<B> {
    /// The registered names of this block's layers.
    pub fn layer_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(skip) = &self.skip {
            names.extend(skip.layer_names());
        }
        names.extend(self.conv_1x1_1.layer_names());
        names.extend(self.conv_3x3.layer_names());
        names.extend(self.se.layer_names());
        names.extend(self.conv_1x1_2.layer_names());
        names.push(format!("{}_exit_relu", self.name()));
        names
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, filters_in, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, filters_out, out_height, out_width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "filters_in", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("filters_in", self.filters_in())]
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let skip = match &self.skip {
            Some(skip) => skip.forward(input.clone()),
            None => input.clone(),
        };

        let x = self.conv_1x1_1.forward(input);
        let x = self.conv_3x3.forward(x);
        let x = self.se.forward(x);
        let x = self.conv_1x1_2.forward(x);
        let x = self.exit_act.forward(x + skip);

        assert_shape_contract_periodically!(
            ["batch", "filters_out", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("filters_out", self.filters_out()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RegNetError;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    #[test]
    fn test_layer_names() {
        let config = RegNetYBlockConfig::new("y".to_string(), 16, 16, 8);
        assert_eq!(
            config.layer_names(),
            vec![
                "y_conv_1x1_1",
                "y_conv_1x1_1_bn",
                "y_conv_1x1_1_relu",
                "y_conv_3x3",
                "y_conv_3x3_bn",
                "y_conv_3x3_relu",
                "y_squeeze_excite_squeeze_conv",
                "y_squeeze_excite_squeeze_relu",
                "y_squeeze_excite_excite_conv",
                "y_squeeze_excite_excite_sigmoid",
                "y_conv_1x1_2",
                "y_conv_1x1_2_bn",
                "y_exit_relu",
            ]
        );
    }

    #[test]
    fn test_validation() {
        let config = RegNetYBlockConfig::new("y".to_string(), 8, 16, 8);
        assert!(matches!(
            config.try_validate(),
            Err(RegNetError::FilterMismatch { .. })
        ));
        assert!(config.clone().with_stride(2).try_validate().is_ok());

        let config = RegNetYBlockConfig::new("y".to_string(), 16, 16, 8);
        assert_eq!(config.squeeze_excite_config().bottleneck_filters(), 4);

        for ratio in [0.0, 1.0, 1.5] {
            assert!(matches!(
                config.clone().with_squeeze_excite_ratio(ratio).try_validate(),
                Err(RegNetError::InvalidRatio { .. })
            ));
        }
    }

    #[test]
    fn test_forward() {
        type B = NdArray;
        let device = Default::default();

        let config = RegNetYBlockConfig::new("y".to_string(), 4, 8, 8).with_stride(2);
        let block: RegNetYBlock<B> = config.clone().init(&device);
        assert_eq!(block.layer_names(), config.layer_names());
        assert_eq!(block.se.filters(), 8);
        assert_eq!(block.se.bottleneck_filters(), 2);

        let input = Tensor::random([2, 4, 8, 7], Distribution::Default, &device);
        let output = block.forward(input.clone());
        assert_eq!(output.dims(), [2, 8, 4, 4]);

        let expected = {
            let skip = block.skip.as_ref().unwrap().forward(input.clone());
            let x = block.conv_1x1_1.forward(input);
            let x = block.conv_3x3.forward(x);
            let x = block.se.forward(x);
            let x = block.conv_1x1_2.forward(x);
            burn::tensor::activation::relu(x + skip)
        };
        output.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_forward_grouped_identity() {
        type B = NdArray;
        let device = Default::default();

        let block: RegNetYBlock<B> =
            RegNetYBlockConfig::new("y".to_string(), 24, 24, 8).init(&device);
        assert!(block.skip.is_none());
        assert_eq!(block.groups(), 3);

        let input = Tensor::random([1, 24, 5, 5], Distribution::Default, &device);
        let output = block.forward(input.clone());
        assert_eq!(output.dims(), [1, 24, 5, 5]);

        let expected = {
            let x = block.conv_1x1_1.forward(input.clone());
            let x = block.conv_3x3.forward(x);
            let x = block.se.forward(x);
            let x = block.conv_1x1_2.forward(x);
            burn::tensor::activation::relu(x + input)
        };
        output.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_invalid_group_width() {
        let config = RegNetYBlockConfig::new("y".to_string(), 16, 16, 0);
        assert_eq!(
            config.try_validate(),
            Err(RegNetError::InvalidGroupWidth {
                name: "y".to_string(),
                filters: 16,
                group_width: 0,
            })
        );
    }
}
