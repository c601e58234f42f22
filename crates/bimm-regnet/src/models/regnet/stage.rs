//! # `RegNet` Stage
//!
//! A [`RegNetStage`] is a sequence of [`RegNetBlock`]s of one type:
//! block ``0`` maps ``filters_in -> filters_out`` at stride 2; the remaining
//! ``depth - 1`` blocks preserve shape at stride 1.
//!
//! Blocks are named ``{stage}_{T}Block_{i}``.

use crate::errors::{RegNetError, RegNetResult, expect_ok};
use crate::models::regnet::block::{BlockType, RegNetBlock, RegNetBlockConfig, RegNetBlockMeta};
use crate::models::regnet::naming::NamingContext;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::prelude::{Backend, Tensor};

/// Stride of the first block of every stage.
pub const STAGE_STRIDE: usize = 2;

/// [`RegNetStage`] Meta API.
pub trait RegNetStageMeta {
    /// The stage name.
    fn name(&self) -> &str;

    /// The number of blocks.
    fn len(&self) -> usize;

    /// Check if the stage is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Input channels; ``0`` for an empty stage.
    fn filters_in(&self) -> usize;

    /// Output channels; ``0`` for an empty stage.
    fn filters_out(&self) -> usize;

    /// The effective stride of the stage.
    fn stride(&self) -> usize;

    /// Get the output resolution for a given input resolution.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[out_height, out_width]``
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2];
}

/// [`RegNetStage`] Config.
///
/// Implements [`RegNetStageMeta`].
#[derive(Config, Debug)]
pub struct RegNetStageConfig {
    /// The stage name.
    pub name: String,

    /// The component blocks.
    pub blocks: Vec<RegNetBlockConfig>,
}

impl RegNetStageMeta for RegNetStageConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn filters_in(&self) -> usize {
        self.blocks.first().map_or(0, |block| block.filters_in())
    }

    fn filters_out(&self) -> usize {
        self.blocks.last().map_or(0, |block| block.filters_out())
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }

    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.blocks
            .iter()
            .fold(input_resolution, |res, block| block.output_resolution(res))
    }
}

impl RegNetStageConfig {
    /// Build a stage config.
    ///
    /// A `depth` of 0 builds an empty stage, which fails validation.
    pub fn build<S: Into<String>>(
        block_type: BlockType,
        name: S,
        depth: usize,
        group_width: usize,
        filters_in: usize,
        filters_out: usize,
    ) -> Self {
        let name = name.into();
        let blocks = (0..depth)
            .map(|idx| {
                let block_name = format!("{name}_{block_type}Block_{idx}");
                if idx == 0 {
                    RegNetBlockConfig::build(
                        block_type,
                        block_name,
                        filters_in,
                        filters_out,
                        group_width,
                        STAGE_STRIDE,
                    )
                } else {
                    RegNetBlockConfig::build(
                        block_type,
                        block_name,
                        filters_out,
                        filters_out,
                        group_width,
                        1,
                    )
                }
            })
            .collect();

        Self { name, blocks }
    }

    /// Build a stage config from a block type tag.
    ///
    /// # Returns
    ///
    /// The config, or [`RegNetError::UnknownBlockType`] for a tag
    /// outside of ``{X, Y, Z}``.
    pub fn try_build_tagged<S: Into<String>>(
        tag: &str,
        name: S,
        depth: usize,
        group_width: usize,
        filters_in: usize,
        filters_out: usize,
    ) -> RegNetResult<Self> {
        let block_type: BlockType = tag.parse()?;
        Ok(Self::build(
            block_type,
            name,
            depth,
            group_width,
            filters_in,
            filters_out,
        ))
    }

    /// Build a stage config with a name drawn from `ctx`.
    pub fn build_with_context(
        ctx: &mut NamingContext,
        block_type: BlockType,
        depth: usize,
        group_width: usize,
        filters_in: usize,
        filters_out: usize,
    ) -> Self {
        let name = ctx.unique_name("stage");
        Self::build(
            block_type,
            name,
            depth,
            group_width,
            filters_in,
            filters_out,
        )
    }

    /// Apply a mapping over the blocks.
    pub fn map_blocks<F>(
        self,
        f: &mut F,
    ) -> Self
    where
        F: FnMut(usize, RegNetBlockConfig) -> RegNetBlockConfig,
    {
        Self {
            name: self.name,
            blocks: self
                .blocks
                .into_iter()
                .enumerate()
                .map(|(idx, block)| f(idx, block))
                .collect(),
        }
    }

    /// Set the squeeze-and-excitation ratio of every Y and Z block.
    pub fn with_squeeze_excite_ratio(
        self,
        ratio: f64,
    ) -> Self {
        self.map_blocks(&mut |_, block| block.with_squeeze_excite_ratio(ratio))
    }

    /// Set the inverted-bottleneck ratio of every Z block.
    pub fn with_bottleneck_ratio(
        self,
        ratio: f64,
    ) -> Self {
        self.map_blocks(&mut |_, block| block.with_bottleneck_ratio(ratio))
    }

    /// Check if the config is valid.
    ///
    /// # Returns
    ///
    /// [`RegNetError::EmptyStage`] for an empty stage,
    /// [`RegNetError::BrokenChain`] if adjacent block widths disagree,
    /// or the first block error.
    pub fn try_validate(&self) -> RegNetResult<()> {
        if self.is_empty() {
            return Err(RegNetError::EmptyStage(self.name.clone()));
        }

        for idx in 1..self.blocks.len() {
            let prev = &self.blocks[idx - 1];
            let curr = &self.blocks[idx];
            if prev.filters_out() != curr.filters_in() {
                return Err(RegNetError::BrokenChain {
                    stage: self.name.clone(),
                    idx: idx - 1,
                    prev_out: prev.filters_out(),
                    next: idx,
                    next_in: curr.filters_in(),
                });
            }
        }

        self.blocks.iter().try_for_each(|block| block.try_validate())
    }

    /// The registered names of this stage's layers.
    pub fn layer_names(&self) -> Vec<String> {
        self.blocks
            .iter()
            .flat_map(|block| block.layer_names())
            .collect()
    }

    /// Initialize a [`RegNetStage`].
    pub fn try_init<B: Backend>(
        self,
        device: &B::Device,
    ) -> RegNetResult<RegNetStage<B>> {
        self.try_validate()?;

        tracing::debug!(
            stage = %self.name,
            depth = self.len(),
            filters_in = self.filters_in(),
            filters_out = self.filters_out(),
            "building RegNet stage",
        );

        let blocks = self
            .blocks
            .into_iter()
            .map(|block| block.try_init(device))
            .collect::<RegNetResult<Vec<_>>>()?;

        Ok(RegNetStage {
            name: Ignored(self.name),
            blocks,
        })
    }

    /// Initialize a [`RegNetStage`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> RegNetStage<B> {
        expect_ok(self.try_init(device))
    }
}

/// `RegNet` stage of blocks.
///
/// Implements [`RegNetStageMeta`].
#[derive(Module, Debug)]
pub struct RegNetStage<B: Backend> {
    /// The stage name.
    pub name: Ignored<String>,

    /// The component blocks.
    pub blocks: Vec<RegNetBlock<B>>,
}

impl<B: Backend> RegNetStageMeta for RegNetStage<B> {
    fn name(&self) -> &str {
        &self.name.0
    }

    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn filters_in(&self) -> usize {
        self.blocks.first().map_or(0, |block| block.filters_in())
    }

    fn filters_out(&self) -> usize {
        self.blocks.last().map_or(0, |block| block.filters_out())
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }

    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.blocks
            .iter()
            .fold(input_resolution, |res, block| block.output_resolution(res))
    }
}

impl<B: Backend> RegNetStage<B> {
    /// The registered names of this stage's layers.
    pub fn layer_names(&self) -> Vec<String> {
        self.blocks
            .iter()
            .flat_map(|block| block.layer_names())
            .collect()
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

        let x = self
            .blocks
            .iter()
            .fold(input, |acc, block| block.forward(acc));

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
