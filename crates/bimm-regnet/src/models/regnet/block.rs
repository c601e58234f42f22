//! # `RegNet` Block Wrapper
//!
//! [`RegNetBlockConfig`] and [`RegNetBlock`] are closed tagged unions over
//! the X, Y and Z block variants; [`BlockType`] is the tag.
//!
//! [`RegNetBlockMeta`] defines a common meta API for every block and
//! block config.

use crate::errors::{RegNetError, RegNetResult, expect_ok};
use crate::models::regnet::naming::NamingContext;
use crate::models::regnet::x_block::{RegNetXBlock, RegNetXBlockConfig};
use crate::models::regnet::y_block::{RegNetYBlock, RegNetYBlockConfig};
use crate::models::regnet::z_block::{RegNetZBlock, RegNetZBlockConfig};
use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// `RegNet` block variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockType {
    /// Grouped-conv residual block.
    X,

    /// X block with squeeze-and-excitation.
    Y,

    /// Inverted-bottleneck block with ``silu`` and squeeze-and-excitation.
    Z,
}

impl BlockType {
    /// All block types.
    pub const ALL: [BlockType; 3] = [BlockType::X, BlockType::Y, BlockType::Z];

    /// The single-letter tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::Z => "Z",
        }
    }

    /// The [`NamingContext`] key for unnamed blocks of this type.
    pub fn uid_key(&self) -> &'static str {
        match self {
            Self::X => "xblock",
            Self::Y => "yblock",
            Self::Z => "zblock",
        }
    }
}

impl Display for BlockType {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for BlockType {
    type Err = RegNetError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "X" => Ok(Self::X),
            "Y" => Ok(Self::Y),
            "Z" => Ok(Self::Z),
            _ => Err(RegNetError::UnknownBlockType(tag.to_string())),
        }
    }
}

/// Reject a stride-1 residual block which changes width.
pub fn check_residual_filters(
    name: &str,
    filters_in: usize,
    filters_out: usize,
    stride: usize,
) -> RegNetResult<()> {
    if filters_in != filters_out && stride == 1 {
        return Err(RegNetError::FilterMismatch {
            name: name.to_string(),
            filters_in,
            filters_out,
            stride,
        });
    }
    Ok(())
}

/// Reject a grouped conv whose width is not a positive multiple of `group_width`.
pub fn check_group_width(
    name: &str,
    filters: usize,
    group_width: usize,
) -> RegNetResult<()> {
    if group_width == 0 || filters % group_width != 0 {
        return Err(RegNetError::InvalidGroupWidth {
            name: name.to_string(),
            filters,
            group_width,
        });
    }
    Ok(())
}

/// [`RegNetBlock`] Meta API.
pub trait RegNetBlockMeta {
    /// The block name prefix.
    fn name(&self) -> &str;

    /// The block variant.
    fn block_type(&self) -> BlockType;

    /// Input channels.
    fn filters_in(&self) -> usize;

    /// Output channels.
    fn filters_out(&self) -> usize;

    /// Channels per conv group.
    fn group_width(&self) -> usize;

    /// The block stride.
    fn stride(&self) -> usize;

    /// Groups of the ``3x3`` conv.
    fn groups(&self) -> usize {
        self.filters_out() / self.group_width()
    }

    /// Get the output resolution for a given input resolution.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[ceil(in_height / stride), ceil(in_width / stride)]``
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        let stride = self.stride();
        [
            input_resolution[0].div_ceil(stride),
            input_resolution[1].div_ceil(stride),
        ]
    }
}

/// [`RegNetBlock`] Config.
///
/// Implements [`RegNetBlockMeta`].
#[derive(Config, Debug)]
pub enum RegNetBlockConfig {
    /// A [`RegNetXBlock`] config.
    X(RegNetXBlockConfig),

    /// A [`RegNetYBlock`] config.
    Y(RegNetYBlockConfig),

    /// A [`RegNetZBlock`] config.
    Z(RegNetZBlockConfig),
}

impl From<RegNetXBlockConfig> for RegNetBlockConfig {
    fn from(config: RegNetXBlockConfig) -> Self {
        Self::X(config)
    }
}

impl From<RegNetYBlockConfig> for RegNetBlockConfig {
    fn from(config: RegNetYBlockConfig) -> Self {
        Self::Y(config)
    }
}

impl From<RegNetZBlockConfig> for RegNetBlockConfig {
    fn from(config: RegNetZBlockConfig) -> Self {
        Self::Z(config)
    }
}

impl RegNetBlockMeta for RegNetBlockConfig {
    fn name(&self) -> &str {
        match self {
            Self::X(config) => config.name(),
            Self::Y(config) => config.name(),
            Self::Z(config) => config.name(),
        }
    }

    fn block_type(&self) -> BlockType {
        match self {
            Self::X(_) => BlockType::X,
            Self::Y(_) => BlockType::Y,
            Self::Z(_) => BlockType::Z,
        }
    }

    fn filters_in(&self) -> usize {
        match self {
            Self::X(config) => config.filters_in(),
            Self::Y(config) => config.filters_in(),
            Self::Z(config) => config.filters_in(),
        }
    }

    fn filters_out(&self) -> usize {
        match self {
            Self::X(config) => config.filters_out(),
            Self::Y(config) => config.filters_out(),
            Self::Z(config) => config.filters_out(),
        }
    }

    fn group_width(&self) -> usize {
        match self {
            Self::X(config) => config.group_width(),
            Self::Y(config) => config.group_width(),
            Self::Z(config) => config.group_width(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::X(config) => config.stride(),
            Self::Y(config) => config.stride(),
            Self::Z(config) => config.stride(),
        }
    }
}

impl RegNetBlockConfig {
    /// Build a block config of the given type.
    pub fn build<S: Into<String>>(
        block_type: BlockType,
        name: S,
        filters_in: usize,
        filters_out: usize,
        group_width: usize,
        stride: usize,
    ) -> Self {
        let name = name.into();
        match block_type {
            BlockType::X => RegNetXBlockConfig::new(name, filters_in, filters_out, group_width)
                .with_stride(stride)
                .into(),
            BlockType::Y => RegNetYBlockConfig::new(name, filters_in, filters_out, group_width)
                .with_stride(stride)
                .into(),
            BlockType::Z => RegNetZBlockConfig::new(name, filters_in, filters_out, group_width)
                .with_stride(stride)
                .into(),
        }
    }

    /// Build a block config with a name drawn from `ctx`.
    pub fn build_with_context(
        ctx: &mut NamingContext,
        block_type: BlockType,
        filters_in: usize,
        filters_out: usize,
        group_width: usize,
        stride: usize,
    ) -> Self {
        let name = ctx.unique_name(block_type.uid_key());
        Self::build(block_type, name, filters_in, filters_out, group_width, stride)
    }

    /// Set the squeeze-and-excitation ratio; no-op for X blocks.
    pub fn with_squeeze_excite_ratio(
        self,
        ratio: f64,
    ) -> Self {
        match self {
            Self::X(config) => config.into(),
            Self::Y(config) => config.with_squeeze_excite_ratio(ratio).into(),
            Self::Z(config) => config.with_squeeze_excite_ratio(ratio).into(),
        }
    }

    /// Set the inverted-bottleneck ratio; no-op for X and Y blocks.
    pub fn with_bottleneck_ratio(
        self,
        ratio: f64,
    ) -> Self {
        match self {
            Self::Z(config) => config.with_bottleneck_ratio(ratio).into(),
            other => other,
        }
    }

    /// Check if the config is valid.
    pub fn try_validate(&self) -> RegNetResult<()> {
        match self {
            Self::X(config) => config.try_validate(),
            Self::Y(config) => config.try_validate(),
            Self::Z(config) => config.try_validate(),
        }
    }

    /// The registered names of this block's layers.
    pub fn layer_names(&self) -> Vec<String> {
        match self {
            Self::X(config) => config.layer_names(),
            Self::Y(config) => config.layer_names(),
            Self::Z(config) => config.layer_names(),
        }
    }

    /// Initialize a [`RegNetBlock`].
    pub fn try_init<B: Backend>(
        self,
        device: &B::Device,
    ) -> RegNetResult<RegNetBlock<B>> {
        Ok(match self {
            Self::X(config) => config.try_init(device)?.into(),
            Self::Y(config) => config.try_init(device)?.into(),
            Self::Z(config) => config.try_init(device)?.into(),
        })
    }

    /// Initialize a [`RegNetBlock`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> RegNetBlock<B> {
        expect_ok(self.try_init(device))
    }
}

/// `RegNet` block.
///
/// Implements [`RegNetBlockMeta`].
#[derive(Module, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum RegNetBlock<B: Backend> {
    /// A [`RegNetXBlock`].
    X(RegNetXBlock<B>),

    /// A [`RegNetYBlock`].
    Y(RegNetYBlock<B>),

    /// A [`RegNetZBlock`].
    Z(RegNetZBlock<B>),
}

impl<B: Backend> From<RegNetXBlock<B>> for RegNetBlock<B> {
    fn from(block: RegNetXBlock<B>) -> Self {
        Self::X(block)
    }
}

impl<B: Backend> From<RegNetYBlock<B>> for RegNetBlock<B> {
    fn from(block: RegNetYBlock<B>) -> Self {
        Self::Y(block)
    }
}

impl<B: Backend> From<RegNetZBlock<B>> for RegNetBlock<B> {
    fn from(block: RegNetZBlock<B>) -> Self {
        Self::Z(block)
    }
}

impl<B: Backend> RegNetBlockMeta for RegNetBlock<B> {
    fn name(&self) -> &str {
        match self {
            Self::X(block) => block.name(),
            Self::Y(block) => block.name(),
            Self::Z(block) => block.name(),
        }
    }

    fn block_type(&self) -> BlockType {
        match self {
            Self::X(_) => BlockType::X,
            Self::Y(_) => BlockType::Y,
            Self::Z(_) => BlockType::Z,
        }
    }

    fn filters_in(&self) -> usize {
        match self {
            Self::X(block) => block.filters_in(),
            Self::Y(block) => block.filters_in(),
            Self::Z(block) => block.filters_in(),
        }
    }

    fn filters_out(&self) -> usize {
        match self {
            Self::X(block) => block.filters_out(),
            Self::Y(block) => block.filters_out(),
            Self::Z(block) => block.filters_out(),
        }
    }

    fn group_width(&self) -> usize {
        match self {
            Self::X(block) => block.group_width(),
            Self::Y(block) => block.group_width(),
            Self::Z(block) => block.group_width(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::X(block) => block.stride(),
            Self::Y(block) => block.stride(),
            Self::Z(block) => block.stride(),
        }
    }

    fn groups(&self) -> usize {
        match self {
            Self::X(block) => block.groups(),
            Self::Y(block) => block.groups(),
            Self::Z(block) => block.groups(),
        }
    }
}

impl<B: Backend> RegNetBlock<B> {
    /// The registered names of this block's layers.
    pub fn layer_names(&self) -> Vec<String> {
        match self {
            Self::X(block) => block.layer_names(),
            Self::Y(block) => block.layer_names(),
            Self::Z(block) => block.layer_names(),
        }
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
        match self {
            Self::X(block) => block.forward(input),
            Self::Y(block) => block.forward(input),
            Self::Z(block) => block.forward(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    #[test]
    fn test_block_type_tags() {
        for block_type in BlockType::ALL {
            assert_eq!(block_type.tag().parse::<BlockType>().unwrap(), block_type);
            assert_eq!(block_type.to_string(), block_type.tag());
        }
        assert_eq!(
            "W".parse::<BlockType>(),
            Err(RegNetError::UnknownBlockType("W".to_string()))
        );
        assert!("x".parse::<BlockType>().is_err());
    }

    #[test]
    fn test_block_type_serde() {
        let json = serde_json::to_string(&BlockType::Y).unwrap();
        assert_eq!(json, "\"Y\"");
        assert_eq!(
            serde_json::from_str::<BlockType>(&json).unwrap(),
            BlockType::Y
        );
    }

    #[test]
    fn test_check_residual_filters() {
        assert!(check_residual_filters("b", 8, 8, 1).is_ok());
        assert!(check_residual_filters("b", 8, 16, 2).is_ok());
        assert!(matches!(
            check_residual_filters("b", 8, 16, 1),
            Err(RegNetError::FilterMismatch { .. })
        ));
    }

    #[test]
    fn test_check_group_width() {
        assert!(check_group_width("b", 16, 8).is_ok());
        assert!(check_group_width("b", 16, 16).is_ok());
        for group_width in [0, 3, 32] {
            assert_eq!(
                check_group_width("b", 16, group_width),
                Err(RegNetError::InvalidGroupWidth {
                    name: "b".to_string(),
                    filters: 16,
                    group_width,
                })
            );
        }
    }

    #[test]
    fn test_build() {
        for block_type in BlockType::ALL {
            let config = RegNetBlockConfig::build(block_type, "b", 16, 32, 8, 2);
            assert_eq!(config.block_type(), block_type);
            assert_eq!(config.name(), "b");
            assert_eq!(config.filters_in(), 16);
            assert_eq!(config.filters_out(), 32);
            assert_eq!(config.group_width(), 8);
            assert_eq!(config.groups(), 4);
            assert_eq!(config.stride(), 2);
            assert_eq!(config.output_resolution([7, 8]), [4, 4]);
            config.try_validate().unwrap();
        }
    }

    #[test]
    fn test_build_with_context() {
        let mut ctx = NamingContext::new();
        let a = RegNetBlockConfig::build_with_context(&mut ctx, BlockType::X, 8, 8, 8, 1);
        let b = RegNetBlockConfig::build_with_context(&mut ctx, BlockType::X, 8, 8, 8, 1);
        let c = RegNetBlockConfig::build_with_context(&mut ctx, BlockType::Y, 8, 8, 8, 1);
        assert_eq!(a.name(), "xblock_1");
        assert_eq!(b.name(), "xblock_2");
        assert_eq!(c.name(), "yblock_1");
    }

    #[test]
    fn test_ratio_passthrough() {
        let config = RegNetBlockConfig::build(BlockType::Z, "b", 8, 8, 8, 1)
            .with_squeeze_excite_ratio(0.5)
            .with_bottleneck_ratio(0.5);
        match &config {
            RegNetBlockConfig::Z(z) => {
                assert_eq!(z.squeeze_excite_ratio, 0.5);
                assert_eq!(z.bottleneck_ratio, 0.5);
            }
            other => panic!("unexpected config: {other:?}"),
        }

        let config = RegNetBlockConfig::build(BlockType::Y, "b", 8, 8, 8, 1)
            .with_squeeze_excite_ratio(0.5)
            .with_bottleneck_ratio(0.5);
        match &config {
            RegNetBlockConfig::Y(y) => assert_eq!(y.squeeze_excite_ratio, 0.5),
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn test_init_and_forward() {
        type B = NdArray;
        let device = Default::default();

        for block_type in BlockType::ALL {
            let config = RegNetBlockConfig::build(block_type, "b", 8, 16, 8, 2);
            let block: RegNetBlock<B> = config.clone().init(&device);

            assert_eq!(block.block_type(), block_type);
            assert_eq!(block.name(), "b");
            assert_eq!(block.filters_in(), 8);
            assert_eq!(block.filters_out(), 16);
            assert_eq!(block.group_width(), 8);
            assert_eq!(block.groups(), 2);
            assert_eq!(block.stride(), 2);
            assert_eq!(block.layer_names(), config.layer_names());

            let input = Tensor::random([2, 8, 6, 5], Distribution::Default, &device);
            let output = block.forward(input);
            assert_eq!(output.dims(), [2, 16, 3, 3]);
        }
    }
}
