//! # Construction Errors
//!
//! All `RegNet` configuration problems are detected while building configs or
//! initializing modules, never during a forward pass.

use thiserror::Error;

/// Result type for `RegNet` construction.
pub type RegNetResult<T> = Result<T, RegNetError>;

/// Errors raised while building a `RegNet` graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegNetError {
    /// A non-downsampling residual block was asked to change width.
    #[error(
        "block `{name}`: input filters({filters_in}) and output filters({filters_out}) \
         are not equal for stride {stride}; they must be equal for stride=1"
    )]
    FilterMismatch {
        /// The block name.
        name: String,
        /// Input channels.
        filters_in: usize,
        /// Output channels.
        filters_out: usize,
        /// Block stride.
        stride: usize,
    },

    /// A conv whose channels cannot be split into groups of `group_width`.
    #[error(
        "block `{name}`: group_width({group_width}) must be positive and divide filters({filters})"
    )]
    InvalidGroupWidth {
        /// The block name.
        name: String,
        /// Channels of the grouped conv.
        filters: usize,
        /// Channels per conv group.
        group_width: usize,
    },

    /// A block type tag outside of `{X, Y, Z}`.
    #[error("block type `{0}` not recognized; block_type must be one of (`X`, `Y`, `Z`)")]
    UnknownBlockType(String),

    /// A preset name not present in any preset table.
    #[error("unknown RegNet preset `{0}`")]
    UnknownPreset(String),

    /// An activation name with no wrapped layer.
    #[error("unknown activation `{0}`")]
    UnknownActivation(String),

    /// A ratio outside of its legal range.
    #[error("`{name}` should be a float in ({low}, {high}); got {value}")]
    InvalidRatio {
        /// The ratio parameter name.
        name: &'static str,
        /// The offending value.
        value: f64,
        /// Exclusive lower bound.
        low: f64,
        /// Exclusive upper bound.
        high: f64,
    },

    /// A stage with no blocks.
    #[error("stage `{0}` has depth 0")]
    EmptyStage(String),

    /// An input shape that the backbone cannot accept.
    #[error("invalid input shape {shape:?}: {reason}")]
    InvalidInputShape {
        /// The ``(height, width, channels)`` shape.
        shape: [Option<usize>; 3],
        /// What is wrong with it.
        reason: String,
    },

    /// Adjacent units whose channel counts do not line up.
    #[error("`{stage}`: [{idx}].out_channels({prev_out}) != [{next}].in_channels({next_in})")]
    BrokenChain {
        /// The stage (or model) name.
        stage: String,
        /// Index of the producing unit.
        idx: usize,
        /// Output channels of the producing unit.
        prev_out: usize,
        /// Index of the consuming unit.
        next: usize,
        /// Input channels of the consuming unit.
        next_in: usize,
    },
}

/// Unwrap a construction result, panicking with the error message.
///
/// This is the backing for the `init` methods which mirror their
/// `try_init` counterparts.
pub(crate) fn expect_ok<T>(result: RegNetResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("{err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_mismatch_message() {
        let err = RegNetError::FilterMismatch {
            name: "b".to_string(),
            filters_in: 8,
            filters_out: 16,
            stride: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("input filters(8)"));
        assert!(msg.contains("output filters(16)"));
    }

    #[test]
    #[should_panic(expected = "unknown RegNet preset `nope`")]
    fn test_expect_ok_panics() {
        let result: RegNetResult<()> = Err(RegNetError::UnknownPreset("nope".to_string()));
        expect_ok(result);
    }
}
