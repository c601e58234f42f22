//! # `RegNet` Backbone
//!
//! [`RegNetBackbone`] is the core `RegNet` feature extractor:
//!
//! ```text
//! x = rescaling(x)                     (optional, 1/255)
//! x = {model_name}_stem_conv(x)        (32 channels, stride 2)
//! x = {model_name}_Stage_i(x)          (i in 0..4, each stride 2)
//! ```
//!
//! [`RegNetBackboneConfig`] implements [`Config`], and provides a high-level
//! configuration interface. It provides
//! [`RegNetBackboneConfig::try_to_structure`] to convert to a
//! [`RegNetStructureConfig`].
//!
//! [`RegNetStructureConfig`] implements [`Config`], and provides
//! [`RegNetStructureConfig::init`] to initialize a [`RegNetBackbone`].
//!
//! [`RegNetBackbone`] implements [`Module`], and provides
//! [`RegNetBackbone::forward`].

use crate::errors::{RegNetError, RegNetResult, expect_ok};
use crate::layers::rescaling::{Rescaling, RescalingConfig};
use crate::models::regnet::block::BlockType;
use crate::models::regnet::presets::{PREFAB_REGNETX_MAP, PREFAB_REGNETY_MAP};
use crate::models::regnet::stage::{RegNetStage, RegNetStageConfig, RegNetStageMeta};
use crate::models::regnet::stem::{RegNetStem, RegNetStemConfig};
use crate::prefabs::StaticPreFabMap;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::prelude::{Backend, Tensor};

/// Number of stages in every `RegNet` backbone.
pub const NUM_STAGES: usize = 4;

/// Input channels accepted by every `RegNet` backbone.
pub const INPUT_CHANNELS: usize = 3;

/// Layer name of the input rescaling unit.
pub const RESCALING_LAYER_NAME: &str = "rescaling";

/// High-level `RegNet` backbone configuration.
#[derive(Config, Debug, PartialEq)]
pub struct RegNetBackboneConfig {
    /// Blocks per stage.
    pub depths: [usize; NUM_STAGES],

    /// Output channels per stage.
    pub widths: [usize; NUM_STAGES],

    /// Channels per conv group, shared by every stage.
    pub group_width: usize,

    /// The block variant.
    pub block_type: BlockType,

    /// Rescale ``[0, 255]`` inputs to ``[0, 1]``.
    #[config(default = true)]
    pub include_rescaling: bool,

    /// Model name; the prefix for stem and stage names.
    #[config(default = "\"regnet\".to_string()")]
    pub model_name: String,

    /// Expected ``(height, width, channels)`` input shape.
    ///
    /// Height and width may be unknown; channels must be 3. Known height
    /// and width are enforced by [`RegNetBackbone::forward`].
    #[config(default = "[None, None, Some(INPUT_CHANNELS)]")]
    pub input_shape: [Option<usize>; 3],

    /// Squeeze-and-excitation ratio of Y and Z blocks.
    #[config(default = 0.25)]
    pub squeeze_excite_ratio: f64,

    /// Inverted-bottleneck ratio of Z blocks.
    #[config(default = 0.25)]
    pub bottleneck_ratio: f64,
}

impl RegNetBackboneConfig {
    /// The X-block preset table.
    pub fn presetsx() -> &'static StaticPreFabMap<RegNetBackboneConfig> {
        &PREFAB_REGNETX_MAP
    }

    /// The Y-block preset table.
    pub fn presetsy() -> &'static StaticPreFabMap<RegNetBackboneConfig> {
        &PREFAB_REGNETY_MAP
    }

    /// Names of all presets, X table first.
    pub fn preset_names() -> Vec<&'static str> {
        let mut names = Self::presetsx().names();
        names.extend(Self::presetsy().names());
        names
    }

    /// Build the config of a named preset.
    ///
    /// # Returns
    ///
    /// The config, or [`RegNetError::UnknownPreset`].
    pub fn from_preset(name: &str) -> RegNetResult<Self> {
        Self::presetsx()
            .try_lookup(name)
            .or_else(|_| Self::presetsy().try_lookup(name))
            .map(|prefab| prefab.new_config())
    }

    /// Output channels of the final stage.
    pub fn out_channels(&self) -> usize {
        self.widths[NUM_STAGES - 1]
    }

    /// Check the input shape.
    pub fn try_validate_input_shape(&self) -> RegNetResult<()> {
        let shape = self.input_shape;
        if shape[2] != Some(INPUT_CHANNELS) {
            return Err(RegNetError::InvalidInputShape {
                shape,
                reason: format!("expected exactly {INPUT_CHANNELS} input channels"),
            });
        }
        if shape[..2].contains(&Some(0)) {
            return Err(RegNetError::InvalidInputShape {
                shape,
                reason: "height and width must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Check if the config is valid.
    pub fn try_validate(&self) -> RegNetResult<()> {
        self.try_validate_input_shape()?;
        self.clone().try_to_structure().map(|_| ())
    }

    /// Convert to a [`RegNetStructureConfig`].
    pub fn try_to_structure(self) -> RegNetResult<RegNetStructureConfig> {
        self.try_validate_input_shape()?;

        let stem = RegNetStemConfig::new(self.model_name.clone()).with_in_channels(INPUT_CHANNELS);

        let mut in_channels = stem.filters;
        let mut stages = Vec::with_capacity(NUM_STAGES);
        for stage_index in 0..NUM_STAGES {
            let out_channels = self.widths[stage_index];
            stages.push(
                RegNetStageConfig::build(
                    self.block_type,
                    format!("{}_Stage_{stage_index}", self.model_name),
                    self.depths[stage_index],
                    self.group_width,
                    in_channels,
                    out_channels,
                )
                .with_squeeze_excite_ratio(self.squeeze_excite_ratio)
                .with_bottleneck_ratio(self.bottleneck_ratio),
            );
            in_channels = out_channels;
        }

        let structure = RegNetStructureConfig {
            rescaling: self.include_rescaling.then(RescalingConfig::new),
            stem,
            stages,
            source: Some(self),
        };
        structure.try_validate()?;
        Ok(structure)
    }

    /// Convert to a [`RegNetStructureConfig`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn to_structure(self) -> RegNetStructureConfig {
        expect_ok(self.try_to_structure())
    }

    /// Get the output resolution for a given input resolution.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        // Every stage opens with one stride-2 block.
        let mut res =
            RegNetStemConfig::new(self.model_name.clone()).output_resolution(input_resolution);
        for _ in 0..NUM_STAGES {
            res = [res[0].div_ceil(2), res[1].div_ceil(2)];
        }
        res
    }

    /// Initialize a [`RegNetBackbone`].
    pub fn try_init<B: Backend>(
        self,
        device: &B::Device,
    ) -> RegNetResult<RegNetBackbone<B>> {
        self.try_to_structure()?.try_init(device)
    }

    /// Initialize a [`RegNetBackbone`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> RegNetBackbone<B> {
        expect_ok(self.try_init(device))
    }
}

/// [`RegNetBackbone`] Structure Config.
///
/// This config defines the structure of an expanded `RegNet` model;
/// [`RegNetStructureConfig::try_validate`] checks the channel chain.
#[derive(Config, Debug)]
pub struct RegNetStructureConfig {
    /// Optional input rescaling.
    pub rescaling: Option<RescalingConfig>,

    /// The stem.
    pub stem: RegNetStemConfig,

    /// The stages.
    pub stages: Vec<RegNetStageConfig>,

    /// The backbone config this structure was expanded from, if any.
    #[config(default = "None")]
    pub source: Option<RegNetBackboneConfig>,
}

impl RegNetStructureConfig {
    /// The model name, from the source config or the stem.
    pub fn model_name(&self) -> &str {
        match &self.source {
            Some(source) => &source.model_name,
            None => &self.stem.name,
        }
    }

    /// Output channels of the final stage (or the stem).
    pub fn out_channels(&self) -> usize {
        self.stages
            .last()
            .map(|stage| stage.filters_out())
            .unwrap_or(self.stem.filters)
    }

    /// Check if the config is valid.
    pub fn try_validate(&self) -> RegNetResult<()> {
        let mut prev_out = self.stem.filters;
        for (idx, stage) in self.stages.iter().enumerate() {
            stage.try_validate()?;
            if stage.filters_in() != prev_out {
                return Err(RegNetError::BrokenChain {
                    stage: self.model_name().to_string(),
                    idx,
                    prev_out,
                    next: idx + 1,
                    next_in: stage.filters_in(),
                });
            }
            prev_out = stage.filters_out();
        }
        Ok(())
    }

    /// The registered names of the model's layers, in forward order.
    pub fn layer_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.rescaling.is_some() {
            names.push(RESCALING_LAYER_NAME.to_string());
        }
        names.extend(self.stem.layer_names());
        for stage in &self.stages {
            names.extend(stage.layer_names());
        }
        names
    }

    /// Get the output resolution for a given input resolution.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.stages.iter().fold(
            self.stem.output_resolution(input_resolution),
            |res, stage| stage.output_resolution(res),
        )
    }

    /// Initialize a [`RegNetBackbone`].
    pub fn try_init<B: Backend>(
        self,
        device: &B::Device,
    ) -> RegNetResult<RegNetBackbone<B>> {
        self.try_validate()?;

        tracing::debug!(
            model = %self.model_name(),
            rescaling = self.rescaling.is_some(),
            stages = self.stages.len(),
            out_channels = self.out_channels(),
            "building RegNet backbone",
        );

        let stages = self
            .stages
            .into_iter()
            .map(|stage| stage.try_init(device))
            .collect::<RegNetResult<Vec<_>>>()?;

        Ok(RegNetBackbone {
            source: Ignored(self.source),
            rescaling: self.rescaling.map(|config| config.init()),
            stem: self.stem.init(device),
            stages,
        })
    }

    /// Initialize a [`RegNetBackbone`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> RegNetBackbone<B> {
        expect_ok(self.try_init(device))
    }
}

/// `RegNet` feature-extraction backbone.
#[derive(Module, Debug)]
pub struct RegNetBackbone<B: Backend> {
    /// The backbone config this model was built from, if any.
    pub source: Ignored<Option<RegNetBackboneConfig>>,

    /// Optional input rescaling.
    pub rescaling: Option<Rescaling>,

    /// The stem.
    pub stem: RegNetStem<B>,

    /// The stages.
    pub stages: Vec<RegNetStage<B>>,
}

impl<B: Backend> RegNetBackbone<B> {
    /// The backbone config this model was built from, if any.
    pub fn config(&self) -> Option<&RegNetBackboneConfig> {
        self.source.0.as_ref()
    }

    /// Output channels.
    pub fn out_channels(&self) -> usize {
        self.stages
            .last()
            .map(|stage| stage.filters_out())
            .unwrap_or_else(|| self.stem.out_channels())
    }

    /// Get the output resolution for a given input resolution.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.stages.iter().fold(
            self.stem.output_resolution(input_resolution),
            |res, stage| stage.output_resolution(res),
        )
    }

    /// The registered names of the model's layers, in forward order.
    pub fn layer_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.rescaling.is_some() {
            names.push(RESCALING_LAYER_NAME.to_string());
        }
        names.extend(self.stem.layer_names());
        for stage in &self.stages {
            names.extend(stage.layer_names());
        }
        names
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, 3, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``
    ///
    /// # Panics
    ///
    /// If the input does not match a known ``input_shape`` height or width.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "channels", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("channels", self.stem.in_channels())]
        );
        if let Some(config) = self.config() {
            let [height, width, _] = config.input_shape;
            assert!(
                height.is_none_or(|h| h == in_height) && width.is_none_or(|w| w == in_width),
                "input resolution [{in_height}, {in_width}] does not match input_shape {:?}",
                config.input_shape,
            );
        }
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let x = match &self.rescaling {
            Some(rescaling) => rescaling.forward(input),
            None => input,
        };
        let x = self.stem.forward(x);
        let x = self.stages.iter().fold(x, |acc, stage| stage.forward(acc));

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        x
    }
}
