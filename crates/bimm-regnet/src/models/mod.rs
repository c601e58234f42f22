//! # Model Families

pub mod regnet;
