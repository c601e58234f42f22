//! # `ConvBnAct2d` - named conv/norm/activation unit.
//!
//! A [`ConvBnAct2d`] module is:
//! * a [`Conv2d`] layer, preceded by dynamic padding for [`PaddingMode::Same`],
//! * an optional [`BatchNorm`] layer,
//! * an optional [`Activation`] layer.
//!
//! Every unit carries a name; the norm and activation layers are named
//! ``{name}_bn`` and ``{name}_{activation}``.

use crate::layers::activation::{Activation, ActivationConfig};
use crate::layers::padding::{PaddingMode, pad_same};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d};
use burn::prelude::{Backend, Tensor};

/// Batch norm running-stat momentum.
///
/// `burn` weights the new batch statistics by `momentum`, so this is
/// the complement of a ``0.9`` moving-average decay.
pub const BN_MOMENTUM: f64 = 0.1;

/// Batch norm epsilon.
pub const BN_EPSILON: f64 = 1e-5;

/// He-normal (Kaiming normal, fan-in) initializer.
pub const HE_NORMAL_INITIALIZER: Initializer = Initializer::KaimingNormal {
    gain: std::f64::consts::SQRT_2,
    fan_out_only: false,
};

/// The default [`BatchNormConfig`] for conv units.
///
/// The feature count is matched to the conv at init.
pub fn default_batch_norm() -> BatchNormConfig {
    BatchNormConfig::new(0)
        .with_momentum(BN_MOMENTUM)
        .with_epsilon(BN_EPSILON)
}

/// [`ConvBnAct2d`] Meta.
pub trait ConvBnAct2dMeta {
    /// The unit name.
    fn name(&self) -> &str;

    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of groups.
    fn groups(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// The kernel size.
    fn kernel_size(&self) -> [usize; 2];

    /// The stride.
    fn stride(&self) -> [usize; 2];

    /// The padding mode.
    fn padding(&self) -> PaddingMode;

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
    ) -> [usize; 2] {
        self.padding()
            .output_resolution(input_resolution, self.kernel_size(), self.stride())
    }
}

/// [`ConvBnAct2d`] Config.
///
/// Implements [`ConvBnAct2dMeta`].
#[derive(Config, Debug)]
pub struct ConvBnAct2dConfig {
    /// Unit name.
    pub name: String,

    /// The [`Conv2d`] config.
    ///
    /// The conv padding is overridden by `padding` at init.
    pub conv: Conv2dConfig,

    /// The padding mode.
    #[config(default = "PaddingMode::Valid")]
    pub padding: PaddingMode,

    /// The optional [`BatchNorm`] config.
    #[config(default = "Some(default_batch_norm())")]
    pub norm: Option<BatchNormConfig>,

    /// The optional [`Activation`] config.
    #[config(default = "Some(ActivationConfig::Relu)")]
    pub act: Option<ActivationConfig>,
}

impl ConvBnAct2dMeta for ConvBnAct2dConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn in_channels(&self) -> usize {
        self.conv.channels[0]
    }

    fn groups(&self) -> usize {
        self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.channels[1]
    }

    fn kernel_size(&self) -> [usize; 2] {
        self.conv.kernel_size
    }

    fn stride(&self) -> [usize; 2] {
        self.conv.stride
    }

    fn padding(&self) -> PaddingMode {
        self.padding
    }
}

impl ConvBnAct2dConfig {
    /// Build a unit config with the default policy.
    ///
    /// A square ``kernel_size`` kernel, stride 1, no bias, 1 group,
    /// ``valid`` padding, batch norm, and ``relu``.
    pub fn build<S: Into<String>>(
        name: S,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
    ) -> Self {
        Self::new(
            name.into(),
            Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
                .with_bias(false)
                .with_initializer(HE_NORMAL_INITIALIZER),
        )
    }

    /// Set a square stride.
    pub fn with_stride(
        self,
        stride: usize,
    ) -> Self {
        Self {
            conv: self.conv.with_stride([stride, stride]),
            ..self
        }
    }

    /// Set the number of conv groups.
    pub fn with_groups(
        self,
        groups: usize,
    ) -> Self {
        Self {
            conv: self.conv.with_groups(groups),
            ..self
        }
    }

    /// Enable or disable the conv bias.
    pub fn with_bias(
        self,
        bias: bool,
    ) -> Self {
        Self {
            conv: self.conv.with_bias(bias),
            ..self
        }
    }

    /// The registered names of this unit's layers.
    ///
    /// ``[name, name_bn?, name_{act}?]``
    pub fn layer_names(&self) -> Vec<String> {
        let mut names = vec![self.name.clone()];
        if self.norm.is_some() {
            names.push(format!("{}_bn", self.name));
        }
        if let Some(act) = &self.act {
            names.push(format!("{}_{}", self.name, act.name()));
        }
        names
    }

    /// Initialize a [`ConvBnAct2d`].
    ///
    /// Auto-matches the norm layer features to the conv output channels.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ConvBnAct2d<B> {
        let out_channels = self.out_channels();
        ConvBnAct2d {
            name: Ignored(self.name),
            padding: Ignored(self.padding),
            conv: self
                .conv
                .with_padding(PaddingConfig2d::Valid)
                .init(device),
            norm: self
                .norm
                .map(|norm| {
                    BatchNormConfig {
                        num_features: out_channels,
                        ..norm
                    }
                    .init(device)
                }),
            act: self.act.map(|act| act.init(device)),
        }
    }
}

/// Named conv/norm/activation unit.
///
/// Implements [`ConvBnAct2dMeta`].
#[derive(Module, Debug)]
pub struct ConvBnAct2d<B: Backend> {
    /// Unit name.
    pub name: Ignored<String>,

    /// Padding mode, applied before the conv.
    pub padding: Ignored<PaddingMode>,

    /// Internal Conv2d layer.
    pub conv: Conv2d<B>,

    /// Internal Norm Layer.
    pub norm: Option<BatchNorm<B, 2>>,

    /// Activation layer.
    pub act: Option<Activation<B>>,
}

impl<B: Backend> ConvBnAct2dMeta for ConvBnAct2d<B> {
    fn name(&self) -> &str {
        &self.name.0
    }

    fn in_channels(&self) -> usize {
        self.conv.weight.shape().dims[1] * self.groups()
    }

    fn groups(&self) -> usize {
        self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.shape().dims[0]
    }

    fn kernel_size(&self) -> [usize; 2] {
        self.conv.kernel_size
    }

    fn stride(&self) -> [usize; 2] {
        self.conv.stride
    }

    fn padding(&self) -> PaddingMode {
        self.padding.0
    }
}

impl<B: Backend> ConvBnAct2d<B> {
    /// The registered names of this unit's layers.
    ///
    /// ``[name, name_bn?, name_{act}?]``
    pub fn layer_names(&self) -> Vec<String> {
        let mut names = vec![self.name().to_string()];
        if self.norm.is_some() {
            names.push(format!("{}_bn", self.name()));
        }
        if let Some(act) = &self.act {
            names.push(format!("{}_{}", self.name(), act.name()));
        }
        names
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_channels", self.in_channels())]
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let x = match self.padding() {
            PaddingMode::Same => pad_same(
                input,
                self.kernel_size(),
                self.stride(),
                self.conv.dilation,
                0.0,
            ),
            PaddingMode::Valid => input,
        };

        let x = self.conv.forward(x);

        let x = match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        };

        let x = match &self.act {
            Some(act) => act.forward(x),
            None => x,
        };

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

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;
    use hamcrest::prelude::*;

    #[test]
    fn test_config_defaults() {
        let config = ConvBnAct2dConfig::build("unit", 3, 8, 1);

        assert_eq!(config.name(), "unit");
        assert_eq!(config.in_channels(), 3);
        assert_eq!(config.out_channels(), 8);
        assert_eq!(config.groups(), 1);
        assert_eq!(config.stride(), [1, 1]);
        assert_eq!(config.kernel_size(), [1, 1]);
        assert_eq!(config.padding(), PaddingMode::Valid);
        assert!(!config.conv.bias);

        let norm = config.norm.as_ref().unwrap();
        assert_eq!(norm.momentum, BN_MOMENTUM);
        assert_eq!(norm.epsilon, BN_EPSILON);

        assert_that!(
            &config.layer_names(),
            contains(vec![
                "unit".to_string(),
                "unit_bn".to_string(),
                "unit_relu".to_string()
            ])
            .exactly()
        );
    }

    #[test]
    fn test_config_builders() {
        let config = ConvBnAct2dConfig::build("unit", 8, 16, 3)
            .with_stride(2)
            .with_groups(4)
            .with_bias(true)
            .with_padding(PaddingMode::Same)
            .with_norm(None)
            .with_act(Some(ActivationConfig::Silu));

        assert_eq!(config.stride(), [2, 2]);
        assert_eq!(config.groups(), 4);
        assert!(config.conv.bias);
        assert_eq!(config.output_resolution([15, 16]), [8, 8]);
        assert_eq!(
            config.layer_names(),
            vec!["unit".to_string(), "unit_silu".to_string()]
        );
    }

    #[test]
    fn test_same_stride_2() {
        type B = NdArray;
        let device = Default::default();

        let config = ConvBnAct2dConfig::build("stem", 3, 4, 3)
            .with_stride(2)
            .with_padding(PaddingMode::Same);

        let layer: ConvBnAct2d<B> = config.clone().init(&device);
        assert_eq!(layer.name(), "stem");
        assert_eq!(layer.in_channels(), 3);
        assert_eq!(layer.out_channels(), 4);
        assert_eq!(layer.stride(), [2, 2]);
        assert_eq!(layer.padding(), PaddingMode::Same);
        assert_eq!(layer.layer_names(), config.layer_names());
        assert_eq!(layer.norm.as_ref().unwrap().gamma.shape().dims, vec![4]);

        let input = Tensor::random([2, 3, 11, 10], Distribution::Default, &device);
        let output = layer.forward(input.clone());

        assert_shape_contract!(
            ["batch", "out_channels", "out_height", "out_width"],
            &output,
            &[
                ("batch", 2),
                ("out_channels", 4),
                ("out_height", 6),
                ("out_width", 5)
            ],
        );

        let expected = {
            let x = pad_same(input, [3, 3], [2, 2], [1, 1], 0.0);
            let x = layer.conv.forward(x);
            let x = layer.norm.as_ref().unwrap().forward(x);
            layer.act.as_ref().unwrap().forward(x)
        };
        output.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_valid_no_norm_no_act() {
        type B = NdArray;
        let device = Default::default();

        let layer: ConvBnAct2d<B> = ConvBnAct2dConfig::build("skip", 4, 8, 1)
            .with_stride(2)
            .with_act(None)
            .with_norm(None)
            .init(&device);
        assert!(layer.norm.is_none());
        assert!(layer.act.is_none());
        assert_eq!(layer.layer_names(), vec!["skip".to_string()]);

        let input = Tensor::random([1, 4, 7, 8], Distribution::Default, &device);
        let output = layer.forward(input.clone());
        assert_eq!(output.dims(), [1, 8, 4, 4]);

        let expected = layer.conv.forward(input);
        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
