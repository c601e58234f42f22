//! # Convolution Padding Modes
//!
//! `burn`'s [`PaddingConfig2d`](burn::nn::PaddingConfig2d) pads symmetrically;
//! TensorFlow's ``same`` padding puts the odd pixel on the bottom/right.
//! [`PaddingMode::Same`] reproduces the TensorFlow behavior by padding
//! the input dynamically before a ``valid`` convolution.
use burn::prelude::{Backend, Tensor};
use serde::{Deserialize, Serialize};

/// Convolution padding mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaddingMode {
    /// No padding.
    #[default]
    Valid,

    /// TensorFlow-style asymmetric padding; ``out = ceil(in / stride)``.
    Same,
}

impl PaddingMode {
    /// Predict the output size of a 1D convolution under this mode.
    ///
    /// # Arguments
    ///
    /// - `input_size`: the input dimension size, must be > 0.
    /// - `kernel_size`: the kernel size, must be > 0.
    /// - `stride`: the stride, must be > 0.
    ///
    /// # Panics
    ///
    /// For ``Valid`` padding, if the kernel does not fit in the input.
    pub fn output_size(
        &self,
        input_size: usize,
        kernel_size: usize,
        stride: usize,
    ) -> usize {
        assert!(input_size > 0);
        assert!(kernel_size > 0);
        assert!(stride > 0);
        match self {
            Self::Same => input_size.div_ceil(stride),
            Self::Valid => {
                assert!(
                    input_size >= kernel_size,
                    "No legal output size for valid conv with:\n input_size:{input_size}\n kernel_size:{kernel_size}\n stride:{stride}",
                );
                (input_size - kernel_size) / stride + 1
            }
        }
    }

    /// Predict the ``[height, width]`` output of a 2D convolution under this mode.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
        kernel_size: [usize; 2],
        stride: [usize; 2],
    ) -> [usize; 2] {
        [
            self.output_size(input_resolution[0], kernel_size[0], stride[0]),
            self.output_size(input_resolution[1], kernel_size[1], stride[1]),
        ]
    }
}

/// Calculate the total TensorFlow-like ``same`` padding for one dimension.
pub fn get_same_padding(
    size: usize,
    kernel_size: usize,
    stride: usize,
    dilation: usize,
) -> usize {
    let out = size.div_ceil(stride);
    ((out - 1) * stride + (kernel_size - 1) * dilation + 1).saturating_sub(size)
}

/// Pad a ``[batch, channels, height, width]`` input with ``same`` padding.
///
/// The extra pixel of an odd padding goes to the bottom/right.
pub fn pad_same<B: Backend>(
    input: Tensor<B, 4>,
    kernel_size: [usize; 2],
    stride: [usize; 2],
    dilation: [usize; 2],
    value: f32,
) -> Tensor<B, 4> {
    let [_, _, ih, iw] = input.dims();
    let pad_h = get_same_padding(ih, kernel_size[0], stride[0], dilation[0]);
    let pad_w = get_same_padding(iw, kernel_size[1], stride[1], dilation[1]);
    if pad_h == 0 && pad_w == 0 {
        return input;
    }
    input.pad(
        (pad_w / 2, pad_w - pad_w / 2, pad_h / 2, pad_h - pad_h / 2),
        value,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_get_same_padding() {
        assert_eq!(get_same_padding(10, 1, 1, 1), 0);
        assert_eq!(get_same_padding(10, 1, 2, 1), 0);
        assert_eq!(get_same_padding(10, 3, 1, 1), 2);
        assert_eq!(get_same_padding(10, 3, 2, 1), 1);
        assert_eq!(get_same_padding(11, 3, 2, 1), 2);
        assert_eq!(get_same_padding(10, 3, 2, 2), 3);
    }

    #[test]
    fn test_output_size() {
        assert_eq!(PaddingMode::Same.output_size(224, 3, 2), 112);
        assert_eq!(PaddingMode::Same.output_size(7, 3, 2), 4);
        assert_eq!(PaddingMode::Same.output_size(7, 3, 1), 7);

        assert_eq!(PaddingMode::Valid.output_size(7, 1, 2), 4);
        assert_eq!(PaddingMode::Valid.output_size(8, 1, 2), 4);
        assert_eq!(PaddingMode::Valid.output_size(8, 3, 1), 6);

        assert_eq!(
            PaddingMode::Same.output_resolution([15, 16], [3, 3], [2, 2]),
            [8, 8]
        );
    }

    #[test]
    #[should_panic(expected = "No legal output size")]
    fn test_valid_output_size_too_small() {
        PaddingMode::Valid.output_size(2, 3, 1);
    }

    #[test]
    fn test_pad_same() {
        type B = NdArray;
        let device = Default::default();

        let input: Tensor<B, 4> = Tensor::ones([1, 2, 5, 6], &device);

        // 5: total 2 -> (1, 1); 6: total 1 -> (0, 1).
        let output = pad_same(input, [3, 3], [2, 2], [1, 1], 0.0);
        assert_eq!(output.dims(), [1, 2, 7, 7]);

        let mid_row: Vec<f32> = output
            .clone()
            .slice([0..1, 0..1, 3..4, 0..7])
            .into_data()
            .to_vec()
            .unwrap();
        assert_eq!(mid_row, vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0]);

        let mid_col: Vec<f32> = output
            .slice([0..1, 0..1, 0..7, 3..4])
            .into_data()
            .to_vec()
            .unwrap();
        assert_eq!(mid_col, vec![0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0]);
    }
}
