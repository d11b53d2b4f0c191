//! # Layout Transforms
//!
//! Source and target frameworks may disagree on axis order for the same
//! parameter (``[out, in, h, w]`` vs ``[h, w, in, out]``; ``[out, in]`` vs
//! ``[in, out]``). A [`LayoutTransform`] names the axis permutation that
//! reconciles them.

use burn::prelude::{Backend, Tensor};
use burn::tensor::TensorData;
use serde::{Deserialize, Serialize};

/// A named axis permutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutTransform {
    /// ``[out, in, *spatial] -> [*spatial, in, out]``
    ///
    /// For rank 4, this is ``b c h w -> h w c b``.
    ChannelsFirstToChannelsLast,

    /// ``[*spatial, in, out] -> [out, in, *spatial]``
    ///
    /// The inverse of [`LayoutTransform::ChannelsFirstToChannelsLast`].
    ChannelsLastToChannelsFirst,

    /// Reverse all axes; ``[out, in] -> [in, out]`` for rank 2.
    Transpose,

    /// An explicit permutation; output axis `i` is input axis `axes[i]`.
    Permute(Vec<usize>),

    /// An einops-style pattern, such as ``"b c h w -> h w c b"``.
    Pattern(String),
}

impl LayoutTransform {
    /// Parse an einops-style pattern into an explicit [`LayoutTransform::Permute`].
    pub fn from_pattern(pattern: &str) -> Result<Self, String> {
        parse_pattern(pattern).map(LayoutTransform::Permute)
    }

    /// Resolve the permutation for a tensor of the given rank.
    pub fn axes(
        &self,
        rank: usize,
    ) -> Result<Vec<usize>, String> {
        let axes = match self {
            LayoutTransform::ChannelsFirstToChannelsLast => {
                if rank < 2 {
                    return Err(format!("channels-first-to-channels-last needs rank >= 2, found {rank}"));
                }
                (2..rank).chain([1, 0]).collect()
            }
            LayoutTransform::ChannelsLastToChannelsFirst => {
                if rank < 2 {
                    return Err(format!("channels-last-to-channels-first needs rank >= 2, found {rank}"));
                }
                [rank - 1, rank - 2].into_iter().chain(0..rank - 2).collect()
            }
            LayoutTransform::Transpose => (0..rank).rev().collect(),
            LayoutTransform::Permute(axes) => axes.clone(),
            LayoutTransform::Pattern(pattern) => parse_pattern(pattern)?,
        };

        check_permutation(&axes, rank)?;
        Ok(axes)
    }

    /// The shape after applying this transform to `shape`.
    pub fn apply_shape(
        &self,
        shape: &[usize],
    ) -> Result<Vec<usize>, String> {
        let axes = self.axes(shape.len())?;
        Ok(axes.iter().map(|&a| shape[a]).collect())
    }

    /// Permute `data` on the given backend.
    ///
    /// The result is always `f32` data.
    pub fn apply<B: Backend>(
        &self,
        data: TensorData,
        device: &B::Device,
    ) -> Result<TensorData, String> {
        let axes = self.axes(data.shape.len())?;
        if axes.iter().enumerate().all(|(i, &a)| i == a) {
            return Ok(data);
        }

        Ok(match axes.len() {
            2 => permute_rank::<B, 2>(data, &axes, device),
            3 => permute_rank::<B, 3>(data, &axes, device),
            4 => permute_rank::<B, 4>(data, &axes, device),
            5 => permute_rank::<B, 5>(data, &axes, device),
            6 => permute_rank::<B, 6>(data, &axes, device),
            rank => return Err(format!("unsupported permutation rank {rank}")),
        })
    }
}

fn permute_rank<B: Backend, const D: usize>(
    data: TensorData,
    axes: &[usize],
    device: &B::Device,
) -> TensorData {
    let mut dims = [0isize; D];
    for (d, &a) in dims.iter_mut().zip(axes) {
        *d = a as isize;
    }

    Tensor::<B, D>::from_data(data, device)
        .permute(dims)
        .into_data()
        .convert::<f32>()
}

fn check_permutation(
    axes: &[usize],
    rank: usize,
) -> Result<(), String> {
    if axes.len() != rank {
        return Err(format!("permutation {axes:?} does not match rank {rank}"));
    }
    let mut seen = vec![false; rank];
    for &a in axes {
        if a >= rank || seen[a] {
            return Err(format!("{axes:?} is not a permutation of 0..{rank}"));
        }
        seen[a] = true;
    }
    Ok(())
}

/// Parse an einops-style permutation pattern.
///
/// ```text
/// "b c h w -> h w c b"  =>  [2, 3, 1, 0]
/// ```
pub fn parse_pattern(pattern: &str) -> Result<Vec<usize>, String> {
    let (lhs, rhs) = pattern
        .split_once("->")
        .ok_or_else(|| format!("pattern {pattern:?} has no \"->\""))?;

    let lhs: Vec<&str> = lhs.split_whitespace().collect();
    let rhs: Vec<&str> = rhs.split_whitespace().collect();

    if lhs.len() != rhs.len() {
        return Err(format!("pattern {pattern:?} changes rank"));
    }
    for (i, name) in lhs.iter().enumerate() {
        if lhs[..i].contains(name) {
            return Err(format!("pattern {pattern:?} repeats axis {name:?}"));
        }
    }

    rhs.iter()
        .map(|name| {
            lhs.iter()
                .position(|n| n == name)
                .ok_or_else(|| format!("pattern {pattern:?} has unknown output axis {name:?}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_named_axes() {
        assert_eq!(
            LayoutTransform::ChannelsFirstToChannelsLast.axes(4).unwrap(),
            vec![2, 3, 1, 0]
        );
        assert_eq!(
            LayoutTransform::ChannelsFirstToChannelsLast.axes(3).unwrap(),
            vec![2, 1, 0]
        );
        assert_eq!(
            LayoutTransform::ChannelsLastToChannelsFirst.axes(4).unwrap(),
            vec![3, 2, 0, 1]
        );
        assert_eq!(LayoutTransform::Transpose.axes(2).unwrap(), vec![1, 0]);
        assert!(LayoutTransform::ChannelsFirstToChannelsLast.axes(1).is_err());
    }

    #[test]
    fn test_inverse_shapes() {
        let shape = [64, 3, 7, 7];
        let last = LayoutTransform::ChannelsFirstToChannelsLast
            .apply_shape(&shape)
            .unwrap();
        assert_eq!(last, vec![7, 7, 3, 64]);

        let first = LayoutTransform::ChannelsLastToChannelsFirst
            .apply_shape(&last)
            .unwrap();
        assert_eq!(first, shape.to_vec());
    }

    #[test]
    fn test_parse_pattern() {
        assert_eq!(parse_pattern("b c h w -> h w c b").unwrap(), vec![2, 3, 1, 0]);
        assert_eq!(parse_pattern("o i -> i o").unwrap(), vec![1, 0]);

        assert!(parse_pattern("b c h w").is_err());
        assert!(parse_pattern("b c -> c").is_err());
        assert!(parse_pattern("b b -> b b").is_err());
        assert!(parse_pattern("b c -> c x").is_err());

        assert_eq!(
            LayoutTransform::Pattern("b c h w -> h w c b".to_string())
                .axes(4)
                .unwrap(),
            LayoutTransform::ChannelsFirstToChannelsLast.axes(4).unwrap()
        );
        assert!(
            LayoutTransform::Pattern("b c h w -> h w c b".to_string())
                .axes(2)
                .is_err()
        );
        assert_eq!(
            LayoutTransform::from_pattern("o i -> i o").unwrap(),
            LayoutTransform::Permute(vec![1, 0])
        );
    }

    #[test]
    fn test_permute_rejects_non_permutations() {
        assert!(LayoutTransform::Permute(vec![0, 0]).axes(2).is_err());
        assert!(LayoutTransform::Permute(vec![0, 2]).axes(2).is_err());
        assert!(LayoutTransform::Permute(vec![1, 0]).axes(3).is_err());
    }

    #[test]
    fn test_apply_transpose() {
        type B = NdArray<f32>;
        let device = Default::default();

        let data = TensorData::new(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
        let out = LayoutTransform::Transpose
            .apply::<B>(data, &device)
            .unwrap();

        assert_eq!(out.shape, vec![3, 2]);
        assert_eq!(
            out.to_vec::<f32>().unwrap(),
            vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]
        );
    }

    #[test]
    fn test_apply_channels_last() {
        type B = NdArray<f32>;
        let device = Default::default();

        // [out=2, in=1, h=1, w=2]
        let data = TensorData::new(vec![1.0f32, 2.0, 3.0, 4.0], vec![2, 1, 1, 2]);
        let out = LayoutTransform::ChannelsFirstToChannelsLast
            .apply::<B>(data, &device)
            .unwrap();

        // [h=1, w=2, in=1, out=2]; out[0, w, 0, o] = in[o, 0, 0, w]
        assert_eq!(out.shape, vec![1, 2, 1, 2]);
        assert_eq!(out.to_vec::<f32>().unwrap(), vec![1.0, 3.0, 2.0, 4.0]);
    }
}
