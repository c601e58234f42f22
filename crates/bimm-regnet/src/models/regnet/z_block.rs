//! # `RegNet` Z Block
//!
//! Inverted-bottleneck block with ``silu`` activations:
//!
//! ```text
//! x = {name}_conv_1x1_1                (1x1 -> bottleneck, silu)
//! x = {name}_conv_3x3                  (3x3 grouped, stride, same, silu)
//! x = {name}_squeeze_excite            (bottleneck, ratio)
//! x = {name}_conv_1x1_2                (1x1 -> filters_out, no act)
//! y = x                                (stride != 1)
//!   | x + input                        (stride == 1)
//! ```
//!
//! ``bottleneck = floor(filters_out / bottleneck_ratio)``, and
//! ``groups = filters_out / group_width``.
//!
//! Unlike the X and Y blocks, a stride-1 width change is not rejected;
//! [`RegNetZBlockConfig::try_validate`] logs a warning, and the residual add
//! fails in the forward pass.

use crate::errors::{RegNetError, RegNetResult, expect_ok};
use crate::layers::activation::ActivationConfig;
use crate::layers::conv_bn_act::{ConvBnAct2d, ConvBnAct2dConfig, ConvBnAct2dMeta};
use crate::layers::padding::PaddingMode;
use crate::layers::squeeze_excite::{SqueezeExcite2d, SqueezeExcite2dConfig};
use crate::models::regnet::block::{BlockType, RegNetBlockMeta, check_group_width};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::prelude::{Backend, Tensor};

/// [`RegNetZBlock`] Config.
///
/// Implements [`RegNetBlockMeta`].
#[derive(Config, Debug)]
pub struct RegNetZBlockConfig {
    /// Block name prefix.
    pub name: String,

    /// Input channels.
    pub filters_in: usize,

    /// Output channels.
    pub filters_out: usize,

    /// Channels per conv group.
    pub group_width: usize,

    /// Stride of the ``3x3`` conv.
    #[config(default = 1)]
    pub stride: usize,

    /// Squeeze-and-excitation ratio.
    #[config(default = 0.25)]
    pub squeeze_excite_ratio: f64,

    /// Inverted-bottleneck ratio; the bottleneck is ``filters_out / ratio`` wide.
    #[config(default = 0.25)]
    pub bottleneck_ratio: f64,
}

impl RegNetBlockMeta for RegNetZBlockConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn block_type(&self) -> BlockType {
        BlockType::Z
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

impl RegNetZBlockConfig {
    /// Width of the inverted bottleneck.
    pub fn bottleneck_filters(&self) -> usize {
        (self.filters_out as f64 / self.bottleneck_ratio) as usize
    }

    /// Check if the config is valid.
    ///
    /// A stride-1 width change is reported with a warning, not an error.
    ///
    /// The grouped ``3x3`` conv runs over the bottleneck, so the bottleneck
    /// must also split into ``filters_out / group_width`` groups.
    pub fn try_validate(&self) -> RegNetResult<()> {
        if !(self.bottleneck_ratio > 0.0 && self.bottleneck_ratio.is_finite()) {
            return Err(RegNetError::InvalidRatio {
                name: "bottleneck_ratio",
                value: self.bottleneck_ratio,
                low: 0.0,
                high: f64::INFINITY,
            });
        }
        check_group_width(&self.name, self.filters_out, self.group_width)?;
        let bottleneck = self.bottleneck_filters();
        if bottleneck == 0 || bottleneck % self.groups() != 0 {
            return Err(RegNetError::InvalidGroupWidth {
                name: self.name.clone(),
                filters: bottleneck,
                group_width: self.group_width,
            });
        }
        if self.filters_in != self.filters_out && self.stride == 1 {
            tracing::warn!(
                block = %self.name,
                filters_in = self.filters_in,
                filters_out = self.filters_out,
                "Z block residual add with mismatched filters at stride 1",
            );
        }
        self.squeeze_excite_config().try_validate()
    }

    /// The expanding ``1x1`` conv config.
    pub fn conv_1x1_1_config(&self) -> ConvBnAct2dConfig {
        ConvBnAct2dConfig::build(
            format!("{}_conv_1x1_1", self.name),
            self.filters_in,
            self.bottleneck_filters(),
            1,
        )
        .with_act(Some(ActivationConfig::Silu))
    }

    /// The grouped ``3x3`` conv config.
    pub fn conv_3x3_config(&self) -> ConvBnAct2dConfig {
        let bottleneck = self.bottleneck_filters();
        ConvBnAct2dConfig::build(format!("{}_conv_3x3", self.name), bottleneck, bottleneck, 3)
            .with_stride(self.stride)
            .with_groups(self.groups())
            .with_padding(PaddingMode::Same)
            .with_act(Some(ActivationConfig::Silu))
    }

    /// The squeeze-and-excitation config, over the bottleneck.
    pub fn squeeze_excite_config(&self) -> SqueezeExcite2dConfig {
        SqueezeExcite2dConfig::new(
            format!("{}_squeeze_excite", self.name),
            self.bottleneck_filters(),
        )
        .with_ratio(self.squeeze_excite_ratio)
    }

    /// The projecting ``1x1`` conv config.
    pub fn conv_1x1_2_config(&self) -> ConvBnAct2dConfig {
        ConvBnAct2dConfig::build(
            format!("{}_conv_1x1_2", self.name),
            self.bottleneck_filters(),
            self.filters_out,
            1,
        )
        .with_act(None)
    }

    /// The registered names of this block's layers.
    pub fn layer_names(&self) -> Vec<String> {
        let mut names = self.conv_1x1_1_config().layer_names();
        names.extend(self.conv_3x3_config().layer_names());
        names.extend(self.squeeze_excite_config().layer_names());
        names.extend(self.conv_1x1_2_config().layer_names());
        names
    }

    /// Initialize a [`RegNetZBlock`].
    pub fn try_init<B: Backend>(
        self,
        device: &B::Device,
    ) -> RegNetResult<RegNetZBlock<B>> {
        self.try_validate()?;
        Ok(RegNetZBlock {
            name: Ignored(self.name.clone()),
            conv_1x1_1: self.conv_1x1_1_config().init(device),
            conv_3x3: self.conv_3x3_config().init(device),
            se: self.squeeze_excite_config().try_init(device)?,
            conv_1x1_2: self.conv_1x1_2_config().init(device),
        })
    }

    /// Initialize a [`RegNetZBlock`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> RegNetZBlock<B> {
        expect_ok(self.try_init(device))
    }
}

/// `RegNet` Z inverted-bottleneck block.
///
/// Implements [`RegNetBlockMeta`].
#[derive(Module, Debug)]
pub struct RegNetZBlock<B: Backend> {
    /// Block name prefix.
    pub name: Ignored<String>,

    /// Expanding ``1x1`` unit.
    pub conv_1x1_1: ConvBnAct2d<B>,

    /// Grouped ``3x3`` unit.
    pub conv_3x3: ConvBnAct2d<B>,

    /// Channel gate.
    pub se: SqueezeExcite2d<B>,

    /// Projecting ``1x1`` unit.
    pub conv_1x1_2: ConvBnAct2d<B>,
}

impl<B: Backend> RegNetBlockMeta for RegNetZBlock<B> {
    fn name(&self) -> &str {
        &self.name.0
    }

    fn block_type(&self) -> BlockType {
        BlockType::Z
    }

    fn filters_in(&self) -> usize {
        self.conv_1x1_1.in_channels()
    }

    fn filters_out(&self) -> usize {
        self.conv_1x1_2.out_channels()
    }

    fn group_width(&self) -> usize {
        self.filters_out() / self.conv_3x3.groups()
    }

    fn stride(&self) -> usize {
        self.conv_3x3.stride()[0]
    }

    fn groups(&self) -> usize {
        self.conv_3x3.groups()
    }
}

impl<B: Backend> RegNetZBlock<B> {
    /// Width of the inverted bottleneck.
    pub fn bottleneck_filters(&self) -> usize {
        self.conv_1x1_1.out_channels()
    }

    /// The registered names of this block's layers.
    pub fn layer_names(&self) -> Vec<String> {
        let mut names = self.conv_1x1_1.layer_names();
        names.extend(self.conv_3x3.layer_names());
        names.extend(self.se.layer_names());
        names.extend(self.conv_1x1_2.layer_names());
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

        let x = self.conv_1x1_1.forward(input.clone());
        let x = self.conv_3x3.forward(x);
        let x = self.se.forward(x);
        let x = self.conv_1x1_2.forward(x);

        let x = if self.stride() != 1 { x } else { x + input };

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
