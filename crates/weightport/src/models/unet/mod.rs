//! # `UNet`
//!
//! The classic encoder/decoder segmentation model, with skip connections.
//!
//! Native parameter namespace; it mirrors the common `PyTorch` `UNet`
//! state-dict layout, differing only in the batch-norm leaf names:
//!
//! | key | module |
//! |-----|--------|
//! | ``inc/double_conv/{0,3}/weight`` | [`DoubleConv`] convolutions |
//! | ``inc/double_conv/{1,4}/{gamma,beta,running_*}`` | [`DoubleConv`] norms |
//! | ``down{N}/maxpool_conv/1/double_conv/...`` | [`Down`] `N` |
//! | ``up{N}/up/{weight,bias}`` | [`Up`] `N` transposed conv |
//! | ``up{N}/conv/double_conv/...`` | [`Up`] `N` |
//! | ``outc/conv/{weight,bias}`` | [`OutConv`] |

pub mod layers;
pub mod unet_model;

pub use layers::{DoubleConv, DoubleConvConfig, Down, DownConfig, OutConv, OutConvConfig, Up, UpConfig};
pub use unet_model::{UNet, UNetConfig};

use crate::errors::ImportResult;
use crate::import::{ImportConfig, RenameRuleConfig, WeightImporter};

/// Import recipe for `PyTorch` `UNet` state dicts.
///
/// Batch-norm ``weight``/``bias`` at ``double_conv.{1,4}`` become
/// ``gamma``/``beta``; every other key is taken as-is.
pub fn unet_torch_import_config() -> ImportConfig {
    let norm_rule = |leaf: &str, renamed: &str| RenameRuleConfig::Regex {
        pattern: format!(r"(.*\.double_conv)\.([14])\.{leaf}"),
        replacement: format!("$1.$2.{renamed}"),
        transform: None,
    };

    ImportConfig::new()
        .with_prune(vec!["num_batches_tracked".to_string()])
        .with_rules(vec![
            norm_rule("weight", "gamma"),
            norm_rule("bias", "beta"),
            RenameRuleConfig::Candidate,
        ])
}

/// [`WeightImporter`] for `PyTorch` `UNet` state dicts.
pub fn unet_torch_importer() -> ImportResult<WeightImporter> {
    WeightImporter::from_config(&unet_torch_import_config())
}
