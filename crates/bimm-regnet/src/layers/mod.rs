//! Common low-level modules for building backbones in Burn.
pub mod activation;
pub mod conv_bn_act;
pub mod padding;
pub mod rescaling;
pub mod squeeze_excite;
