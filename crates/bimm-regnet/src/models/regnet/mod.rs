//! # `RegNet` Backbones
//!
//! `RegNet` X, Y and Z feature extractors, built from per-stage
//! ``depths``, ``widths`` and a shared ``group_width``.
//!
//! * [`backbone`] - the assembled [`RegNetBackbone`] and its configs.
//! * [`presets`] - the published X and Y configurations.
//! * [`stage`] - a sequence of blocks, the first downsampling.
//! * [`block`] - the tagged [`RegNetBlock`] wrapper over [`x_block`],
//!   [`y_block`] and [`z_block`].
//! * [`stem`] - the input stem.
//! * [`naming`] - unique name source for unnamed units.
//!
//! ```rust,no_run
//! use bimm_regnet::models::regnet::{RegNetBackbone, RegNetBackboneConfig};
//! use burn::backend::NdArray;
//!
//! let device = Default::default();
//! let model: RegNetBackbone<NdArray> = RegNetBackboneConfig::from_preset("regnetx002")
//!     .unwrap()
//!     .init(&device);
//! assert_eq!(model.out_channels(), 368);
//! ```

pub mod backbone;
pub mod block;
pub mod naming;
pub mod presets;
pub mod stage;
pub mod stem;
pub mod x_block;
pub mod y_block;
pub mod z_block;

pub use backbone::{RegNetBackbone, RegNetBackboneConfig, RegNetStructureConfig};
pub use block::{BlockType, RegNetBlock, RegNetBlockConfig, RegNetBlockMeta};
pub use naming::NamingContext;
pub use presets::{PREFAB_REGNETX_MAP, PREFAB_REGNETY_MAP};
pub use stage::{RegNetStage, RegNetStageConfig, RegNetStageMeta};
