//! # Activation Layer Wrapper
//!
//! [`ActivationConfig`] names a closed set of `burn::nn` activations,
//! plus a local [`Silu`] layer, and can be parsed from the short
//! activation names used in layer naming (`"relu"`, `"silu"`, ...).
use crate::errors::RegNetError;
use burn::nn::{Gelu, LeakyRelu, LeakyReluConfig, PRelu, PReluConfig, Relu, Sigmoid, Tanh};
use burn::prelude::{Backend, Config, Module, Tensor};
use burn::tensor::activation::silu;
use std::str::FromStr;

/// Applies the sigmoid linear unit function element-wise.
///
/// ``y = x * sigmoid(x)``
#[derive(Module, Clone, Debug, Default)]
pub struct Silu;

impl Silu {
    /// Forward pass.
    pub fn forward<B: Backend, const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        silu(input)
    }
}

/// [`Activation`] Configuration.
#[derive(Config, Debug)]
#[non_exhaustive]
pub enum ActivationConfig {
    /// [`Relu`] activation layer.
    Relu,

    /// [`Silu`] activation layer.
    Silu,

    /// [`Sigmoid`] activation layer.
    Sigmoid,

    /// [`Gelu`] activation layer.
    Gelu,

    /// [`Tanh`] activation layer.
    Tanh,

    /// [`LeakyRelu`] activation layer.
    LeakyRelu(LeakyReluConfig),

    /// [`PRelu`] activation layer.
    PRelu(PReluConfig),
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self::Relu
    }
}

impl From<LeakyReluConfig> for ActivationConfig {
    fn from(config: LeakyReluConfig) -> Self {
        Self::LeakyRelu(config)
    }
}

impl From<PReluConfig> for ActivationConfig {
    fn from(config: PReluConfig) -> Self {
        Self::PRelu(config)
    }
}

impl FromStr for ActivationConfig {
    type Err = RegNetError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "relu" => Ok(Self::Relu),
            "silu" | "swish" => Ok(Self::Silu),
            "sigmoid" => Ok(Self::Sigmoid),
            "gelu" => Ok(Self::Gelu),
            "tanh" => Ok(Self::Tanh),
            "leaky_relu" => Ok(LeakyReluConfig::new().into()),
            "prelu" => Ok(PReluConfig::new().into()),
            _ => Err(RegNetError::UnknownActivation(name.to_string())),
        }
    }
}

impl ActivationConfig {
    /// The short name of the activation, used as a layer name suffix.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Relu => "relu",
            Self::Silu => "silu",
            Self::Sigmoid => "sigmoid",
            Self::Gelu => "gelu",
            Self::Tanh => "tanh",
            Self::LeakyRelu(_) => "leaky_relu",
            Self::PRelu(_) => "prelu",
        }
    }

    /// Initialize a wrapped activation layer.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Activation<B> {
        match self {
            Self::Relu => Activation::Relu(Relu),
            Self::Silu => Activation::Silu(Silu),
            Self::Sigmoid => Activation::Sigmoid(Sigmoid),
            Self::Gelu => Activation::Gelu(Gelu),
            Self::Tanh => Activation::Tanh(Tanh),
            Self::LeakyRelu(conf) => Activation::LeakyRelu(conf.init()),
            Self::PRelu(conf) => Activation::PRelu(conf.init(device)),
        }
    }
}

/// Activation Layer Wrapper.
#[derive(Module, Debug)]
#[non_exhaustive]
pub enum Activation<B: Backend> {
    /// [`Relu`] activation layer.
    Relu(Relu),

    /// [`Silu`] activation layer.
    Silu(Silu),

    /// [`Sigmoid`] activation layer.
    Sigmoid(Sigmoid),

    /// [`Gelu`] activation layer.
    Gelu(Gelu),

    /// [`Tanh`] activation layer.
    Tanh(Tanh),

    /// [`LeakyRelu`] activation layer.
    LeakyRelu(LeakyRelu),

    /// [`PRelu`] activation layer.
    PRelu(PRelu<B>),
}

impl<B: Backend> Activation<B> {
    /// Forward pass.
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        match self {
            Self::Relu(layer) => layer.forward(input),
            Self::Silu(layer) => layer.forward(input),
            Self::Sigmoid(layer) => layer.forward(input),
            Self::Gelu(layer) => layer.forward(input),
            Self::Tanh(layer) => layer.forward(input),
            Self::LeakyRelu(layer) => layer.forward(input),
            Self::PRelu(layer) => layer.forward(input),
        }
    }

    /// Build a [`ActivationConfig`] for this module.
    pub fn to_config(&self) -> ActivationConfig {
        match self {
            Self::Relu(_) => ActivationConfig::Relu,
            Self::Silu(_) => ActivationConfig::Silu,
            Self::Sigmoid(_) => ActivationConfig::Sigmoid,
            Self::Gelu(_) => ActivationConfig::Gelu,
            Self::Tanh(_) => ActivationConfig::Tanh,
            Self::LeakyRelu(layer) => LeakyReluConfig::new()
                .with_negative_slope(layer.negative_slope)
                .into(),
            Self::PRelu(layer) => PReluConfig::new()
                .with_alpha(layer.alpha_value)
                .with_num_parameters(layer.num_params())
                .into(),
        }
    }

    /// The short name of the activation.
    pub fn name(&self) -> &'static str {
        self.to_config().name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn make_input<B: Backend>(device: &B::Device) -> Tensor<B, 2> {
        Tensor::from_data([[-1.0, -0.5, 0.0], [1.0, 0.5, 0.0]], device)
    }

    fn check_stateless_config_output<B: Backend, const D: usize>(
        config: ActivationConfig,
        input: Tensor<B, D>,
        expected: Tensor<B, D>,
        device: &B::Device,
    ) {
        let act1 = config.init(device);
        let record: ActivationRecord<B> = act1.into_record();

        let act = config.init(device).load_record(record);

        let output = act.forward(input);
        output.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_parse_names() {
        for name in ["relu", "silu", "sigmoid", "gelu", "tanh", "leaky_relu", "prelu"] {
            let config: ActivationConfig = name.parse().unwrap();
            assert_eq!(config.name(), name);
        }
        assert_eq!(
            "swish".parse::<ActivationConfig>().unwrap().name(),
            "silu"
        );
        assert_eq!(
            "softmax".parse::<ActivationConfig>().unwrap_err(),
            RegNetError::UnknownActivation("softmax".to_string())
        );
    }

    #[test]
    fn test_relu() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);
        let expected = Relu.forward(input.clone());
        check_stateless_config_output(ActivationConfig::Relu, input, expected, &device)
    }

    #[test]
    fn test_silu() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);
        let expected = input.clone() * burn::tensor::activation::sigmoid(input.clone());

        let layer: Activation<TestBackend> = ActivationConfig::Silu.init(&device);
        assert_eq!(layer.name(), "silu");
        layer
            .forward(input)
            .to_data()
            .assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_sigmoid() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);
        let expected = Sigmoid.forward(input.clone());
        check_stateless_config_output(ActivationConfig::Sigmoid, input, expected, &device)
    }

    #[test]
    fn test_leaky_relu_to_config() {
        let device = Default::default();
        let config: ActivationConfig = LeakyReluConfig::new().with_negative_slope(0.2).into();
        let layer: Activation<TestBackend> = config.init(&device);
        match layer.to_config() {
            ActivationConfig::LeakyRelu(inner) => assert_eq!(inner.negative_slope, 0.2),
            other => panic!("unexpected config: {other:?}"),
        }
    }
}
