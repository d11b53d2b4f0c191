//! # `ResNet` Utilities

use crate::layers::conv_norm::ConvNorm2dConfig;
use burn::nn::Initializer;
use burn::nn::conv::Conv2dConfig;

/// Kaiming-normal initializer for convolutions feeding a `ReLU`.
pub static CONV_INTO_RELU_INITIALIZER: Initializer = Initializer::KaimingNormal {
    gain: core::f64::consts::SQRT_2,
    fan_out_only: true,
};

/// Expand a scalar to a 2d array.
#[inline(always)]
pub fn scalar_to_array<const D: usize, T: Copy>(value: T) -> [T; D] {
    [value; D]
}

/// The residual-path downsample for a block, if it needs one.
///
/// A 1x1 strided [`ConvNorm2dConfig`] when the block changes resolution or width.
pub fn downsample_config(
    in_planes: usize,
    out_planes: usize,
    stride: usize,
) -> Option<ConvNorm2dConfig> {
    if stride == 1 && in_planes == out_planes {
        return None;
    }
    Some(
        Conv2dConfig::new([in_planes, out_planes], [1, 1])
            .with_stride(scalar_to_array(stride))
            .with_bias(false)
            .with_initializer(CONV_INTO_RELU_INITIALIZER.clone())
            .into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::conv_norm::ConvNorm2dMeta;

    #[test]
    fn test_downsample_config() {
        assert!(downsample_config(64, 64, 1).is_none());

        let cfg = downsample_config(64, 128, 2).unwrap();
        assert_eq!(cfg.in_channels(), 64);
        assert_eq!(cfg.out_channels(), 128);
        assert_eq!(cfg.stride(), &[2, 2]);

        let cfg = downsample_config(64, 256, 1).unwrap();
        assert_eq!(cfg.stride(), &[1, 1]);
    }
}
