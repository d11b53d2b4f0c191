//! # `torchvision` `ResNet` Checkpoint Import
//!
//! Maps `torchvision.models.resnet` state-dict keys onto the native
//! [`ResNet`](super::ResNet) namespace:
//!
//! | `torchvision` | native |
//! |---------------|--------|
//! | ``conv1.weight`` | ``stem/conv/weight`` |
//! | ``bn1.{weight,bias,running_*}`` | ``stem/norm/{gamma,beta,running_*}`` |
//! | ``layer{N}.{j}.conv{K}.weight`` | ``layers/{N-1}/blocks/{j}/conv_norm{K}/conv/weight`` |
//! | ``layer{N}.{j}.bn{K}.*`` | ``layers/{N-1}/blocks/{j}/conv_norm{K}/norm/*`` |
//! | ``layer{N}.{j}.downsample.0.weight`` | ``.../downsample/conv/weight`` |
//! | ``layer{N}.{j}.downsample.1.*`` | ``.../downsample/norm/*`` |
//! | ``fc.weight`` ``[out, in]`` | ``head/weight`` ``[in, out]`` |
//! | ``fc.bias`` | ``head/bias`` |

use crate::import::{LayoutTransform, Translation, WeightImporter};
use crate::keys::KeyPath;

/// Batch-norm bookkeeping counter; never bound.
pub const NUM_BATCHES_TRACKED: &str = "num_batches_tracked";

fn norm_param(name: &str) -> Option<&'static str> {
    match name {
        "weight" => Some("gamma"),
        "bias" => Some("beta"),
        "running_mean" => Some("running_mean"),
        "running_var" => Some("running_var"),
        _ => None,
    }
}

fn ordinal(
    name: &str,
    prefix: &str,
) -> Option<usize> {
    name.strip_prefix(prefix)?.parse().ok()
}

/// Rename rule for `torchvision` `ResNet` state-dict keys.
///
/// Declines keys outside the `torchvision` layout.
pub fn torchvision_resnet_rule(
    _old_key: &str,
    candidate: &KeyPath,
) -> Option<Translation> {
    let segments: Vec<&str> = candidate.segments().iter().map(String::as_str).collect();

    let key = match segments.as_slice() {
        ["conv1", "weight"] => "stem/conv/weight".to_string(),
        ["bn1", param] => format!("stem/norm/{}", norm_param(param)?),
        ["fc", "weight"] => {
            return Some(
                Translation::rename(KeyPath::new(["head", "weight"]))
                    .with_transform(LayoutTransform::Transpose),
            );
        }
        ["fc", "bias"] => "head/bias".to_string(),
        [layer, block, rest @ ..] => {
            let layer = ordinal(layer, "layer")?.checked_sub(1)?;
            let block: usize = block.parse().ok()?;
            let inner = match rest {
                ["downsample", "0", "weight"] => "downsample/conv/weight".to_string(),
                ["downsample", "1", param] => format!("downsample/norm/{}", norm_param(param)?),
                [name, "weight"] if name.starts_with("conv") => {
                    format!("conv_norm{}/conv/weight", ordinal(name, "conv")?)
                }
                [name, param] if name.starts_with("bn") => {
                    format!("conv_norm{}/norm/{}", ordinal(name, "bn")?, norm_param(param)?)
                }
                _ => return None,
            };
            format!("layers/{layer}/blocks/{block}/{inner}")
        }
        _ => return None,
    };

    KeyPath::parse(&key).map(Translation::rename)
}

/// [`WeightImporter`] for `torchvision` `ResNet` checkpoints.
pub fn resnet_torchvision_importer() -> WeightImporter {
    WeightImporter::default()
        .with_prune(NUM_BATCHES_TRACKED)
        .with_rule(torchvision_resnet_rule)
}
