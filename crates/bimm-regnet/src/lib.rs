#![warn(missing_docs)]
//!# bimm-regnet - RegNet Backbones for Burn
//!
//! ## Notable Components
//!
//! * [`errors`] - construction errors.
//! * [`prefabs`] - registry of well-known model configurations.
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::activation`] - activation layer abstraction wrapper.
//!   * [`layers::conv_bn_act`] - ``Conv2d + BatchNorm2d + Activation`` unit.
//!   * [`layers::padding`] - TensorFlow-style ``same`` padding.
//!   * [`layers::rescaling`] - input rescaling.
//!   * [`layers::squeeze_excite`] - squeeze-and-excitation gate.
//! * [`models`] - complete model families.
//!   * [`models::regnet`] - `RegNet` X/Y/Z backbones.

/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

pub mod errors;
pub mod layers;
pub mod models;
pub mod prefabs;
