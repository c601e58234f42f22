//! # `RegNet` Presets
//!
//! Published `RegNet` X and Y configurations, keyed by ``regnet{x|y}{flops}``
//! where ``flops`` counts hundreds of millions of FLOPs
//! (``regnety064`` is a 6.4 GFLOP Y model).
//!
//! [`PREFAB_REGNETX_MAP`] and [`PREFAB_REGNETY_MAP`] hold the
//! [`RegNetBackboneConfig`] builders; [`RegNetBackboneConfig::from_preset`]
//! resolves a name against both.

use crate::models::regnet::backbone::RegNetBackboneConfig;
use crate::models::regnet::block::BlockType;
use crate::prefabs::{StaticPreFabConfig, StaticPreFabMap};

/// Build an X-block preset config.
fn x(
    depths: [usize; 4],
    widths: [usize; 4],
    group_width: usize,
) -> RegNetBackboneConfig {
    RegNetBackboneConfig::new(depths, widths, group_width, BlockType::X)
}

/// Build a Y-block preset config.
fn y(
    depths: [usize; 4],
    widths: [usize; 4],
    group_width: usize,
) -> RegNetBackboneConfig {
    RegNetBackboneConfig::new(depths, widths, group_width, BlockType::Y)
}

/// `RegNet` X-block presets.
pub static PREFAB_REGNETX_MAP: StaticPreFabMap<RegNetBackboneConfig> = StaticPreFabMap {
    name: "regnetx",
    description: "RegNet backbones with X blocks",
    items: &[
        &StaticPreFabConfig {
            name: "regnetx002",
            description: "RegNetX 200MF",
            builder: || x([1, 1, 4, 7], [24, 56, 152, 368], 8),
        },
        &StaticPreFabConfig {
            name: "regnetx004",
            description: "RegNetX 400MF",
            builder: || x([1, 2, 7, 12], [32, 64, 160, 384], 16),
        },
        &StaticPreFabConfig {
            name: "regnetx006",
            description: "RegNetX 600MF",
            builder: || x([1, 3, 5, 7], [48, 96, 240, 528], 24),
        },
        &StaticPreFabConfig {
            name: "regnetx008",
            description: "RegNetX 800MF",
            builder: || x([1, 3, 7, 5], [64, 128, 288, 672], 16),
        },
        &StaticPreFabConfig {
            name: "regnetx016",
            description: "RegNetX 1.6GF",
            builder: || x([2, 4, 10, 2], [72, 168, 408, 912], 24),
        },
        &StaticPreFabConfig {
            name: "regnetx032",
            description: "RegNetX 3.2GF",
            builder: || x([2, 6, 15, 2], [96, 192, 432, 1008], 48),
        },
        &StaticPreFabConfig {
            name: "regnetx040",
            description: "RegNetX 4.0GF",
            builder: || x([2, 5, 14, 2], [80, 240, 560, 1360], 40),
        },
        &StaticPreFabConfig {
            name: "regnetx064",
            description: "RegNetX 6.4GF",
            builder: || x([2, 4, 10, 1], [168, 392, 784, 1624], 56),
        },
        // The published group width is 120, which does not divide 80. Keras
        // runs stage 0 ungrouped and stages 1-3 with 2, 6 and 16 groups; a
        // group width of 40 gives 2, 6, 18 and 48 groups, so this preset
        // has fewer 3x3 conv parameters than the published model.
        &StaticPreFabConfig {
            name: "regnetx080",
            description: "RegNetX 8.0GF (group width 40)",
            builder: || x([2, 5, 15, 1], [80, 240, 720, 1920], 40),
        },
        &StaticPreFabConfig {
            name: "regnetx120",
            description: "RegNetX 12GF",
            builder: || x([2, 5, 11, 1], [224, 448, 896, 2240], 112),
        },
        &StaticPreFabConfig {
            name: "regnetx160",
            description: "RegNetX 16GF",
            builder: || x([2, 6, 13, 1], [256, 512, 896, 2048], 128),
        },
        &StaticPreFabConfig {
            name: "regnetx320",
            description: "RegNetX 32GF",
            builder: || x([2, 7, 13, 1], [336, 672, 1344, 2520], 168),
        },
    ],
};

/// `RegNet` Y-block presets.
pub static PREFAB_REGNETY_MAP: StaticPreFabMap<RegNetBackboneConfig> = StaticPreFabMap {
    name: "regnety",
    description: "RegNet backbones with Y blocks",
    items: &[
        &StaticPreFabConfig {
            name: "regnety002",
            description: "RegNetY 200MF",
            builder: || y([1, 1, 4, 7], [24, 56, 152, 368], 8),
        },
        &StaticPreFabConfig {
            name: "regnety004",
            description: "RegNetY 400MF",
            builder: || y([1, 3, 6, 6], [48, 104, 208, 440], 8),
        },
        &StaticPreFabConfig {
            name: "regnety006",
            description: "RegNetY 600MF",
            builder: || y([1, 3, 7, 4], [48, 112, 256, 608], 16),
        },
        &StaticPreFabConfig {
            name: "regnety008",
            description: "RegNetY 800MF",
            builder: || y([1, 3, 8, 2], [64, 128, 320, 768], 16),
        },
        &StaticPreFabConfig {
            name: "regnety016",
            description: "RegNetY 1.6GF",
            builder: || y([2, 6, 17, 2], [48, 120, 336, 888], 24),
        },
        &StaticPreFabConfig {
            name: "regnety032",
            description: "RegNetY 3.2GF",
            builder: || y([2, 5, 13, 1], [72, 216, 576, 1512], 24),
        },
        &StaticPreFabConfig {
            name: "regnety040",
            description: "RegNetY 4.0GF",
            builder: || y([2, 6, 12, 2], [128, 192, 512, 1088], 64),
        },
        &StaticPreFabConfig {
            name: "regnety064",
            description: "RegNetY 6.4GF",
            builder: || y([2, 7, 14, 2], [144, 288, 576, 1296], 72),
        },
        &StaticPreFabConfig {
            name: "regnety080",
            description: "RegNetY 8.0GF",
            builder: || y([2, 4, 10, 1], [168, 448, 896, 2016], 56),
        },
        &StaticPreFabConfig {
            name: "regnety120",
            description: "RegNetY 12GF",
            builder: || y([2, 5, 11, 1], [224, 448, 896, 2240], 112),
        },
        &StaticPreFabConfig {
            name: "regnety160",
            description: "RegNetY 16GF",
            builder: || y([2, 4, 11, 1], [224, 448, 1232, 3024], 112),
        },
        &StaticPreFabConfig {
            name: "regnety320",
            description: "RegNetY 32GF",
            builder: || y([2, 5, 12, 1], [232, 696, 1392, 3712], 232),
        },
    ],
};
