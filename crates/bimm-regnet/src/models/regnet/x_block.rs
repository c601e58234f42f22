//! # `RegNet` X Block
//!
//! ```text
//! skip = identity                      (stride == 1)
//!      | {name}_skip_1x1               (stride != 1; 1x1, stride, no act)
//! x = {name}_conv_1x1_1                (1x1 -> filters_out, relu)
//! x = {name}_conv_3x3                  (3x3 grouped, stride, same, relu)
//! x = {name}_conv_1x1_2                (1x1, no act)
//! y = {name}_exit_relu(x + skip)
//! ```
//!
//! ``groups = filters_out / group_width``.

use crate::errors::{RegNetResult, expect_ok};
use crate::layers::conv_bn_act::{ConvBnAct2d, ConvBnAct2dConfig, ConvBnAct2dMeta};
use crate::layers::padding::PaddingMode;
use crate::models::regnet::block::{
    BlockType, RegNetBlockMeta, check_group_width, check_residual_filters,
};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::Relu;
use burn::prelude::{Backend, Tensor};

/// [`RegNetXBlock`] Config.
///
/// Implements [`RegNetBlockMeta`].
#[derive(Config, Debug)]
pub struct RegNetXBlockConfig {
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
}

impl RegNetBlockMeta for RegNetXBlockConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn block_type(&self) -> BlockType {
        BlockType::X
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

impl RegNetXBlockConfig {
    /// Check if the config is valid.
    ///
    /// # Returns
    ///
    /// [`crate::errors::RegNetError::FilterMismatch`] if the residual add
    /// would mix widths, or [`crate::errors::RegNetError::InvalidGroupWidth`]
    /// if the ``3x3`` conv cannot be grouped.
    pub fn try_validate(&self) -> RegNetResult<()> {
        check_residual_filters(&self.name, self.filters_in, self.filters_out, self.stride)?;
        check_group_width(&self.name, self.filters_out, self.group_width)
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
        names.extend(self.conv_1x1_2_config().layer_names());
        names.push(format!("{}_exit_relu", self.name));
        names
    }

    /// Initialize a [`RegNetXBlock`].
    pub fn try_init<B: Backend>(
        self,
        device: &B::Device,
    ) -> RegNetResult<RegNetXBlock<B>> {
        self.try_validate()?;
        Ok(RegNetXBlock {
            name: Ignored(self.name.clone()),
            skip: self.skip_config().map(|c| c.init(device)),
            conv_1x1_1: self.conv_1x1_1_config().init(device),
            conv_3x3: self.conv_3x3_config().init(device),
            conv_1x1_2: self.conv_1x1_2_config().init(device),
            exit_act: Relu,
        })
    }

    /// Initialize a [`RegNetXBlock`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> RegNetXBlock<B> {
        expect_ok(self.try_init(device))
    }
}

/// `RegNet` X residual block.
///
/// Implements [`RegNetBlockMeta`].
#[derive(Module, Debug)]
pub struct RegNetXBlock<B: Backend> {
    /// Block name prefix.
    pub name: Ignored<String>,

    /// Optional skip projection.
    pub skip: Option<ConvBnAct2d<B>>,

    /// Leading ``1x1`` unit.
    pub conv_1x1_1: ConvBnAct2d<B>,

    /// Grouped ``3x3`` unit.
    pub conv_3x3: ConvBnAct2d<B>,

    /// Trailing ``1x1`` unit.
    pub conv_1x1_2: ConvBnAct2d<B>,

    /// Exit activation.
    pub exit_act: Relu,
}

impl<B: Backend> RegNetBlockMeta for RegNetXBlock<B> {
    fn name(&self) -> &str {
        &self.name.0
    }

    fn block_type(&self) -> BlockType {
        BlockType::X
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

impl<B: Backend> RegNetXBlock<B> {
    /// The registered names of this block's layers.
    pub fn layer_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(skip) = &self.skip {
            names.extend(skip.layer_names());
        }
        names.extend(self.conv_1x1_1.layer_names());
        names.extend(self.conv_3x3.layer_names());
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
