//! # Pretrained Inception-v3 Models and Configs

use crate::cache::disk::DiskCacheConfig;
use crate::cache::load_checkpoint;
use crate::cache::prefabs::{StaticPreFabConfig, StaticPreFabMap};
use crate::cache::weights::{StaticPretrainedWeightsDescriptor, StaticPretrainedWeightsMap};
use crate::errors::ImportResult;
use crate::models::ModelConfig;
use crate::models::inception::inception_model::{InceptionV3, InceptionV3Config};
use crate::models::inception::torchvision::inception_v3_torchvision_importer;
use burn::prelude::Backend;

/// Pretrained [`InceptionV3`] configs and weights.
pub static PREFAB_INCEPTION_MAP: StaticPreFabMap<InceptionV3Config> = StaticPreFabMap {
    name: "inception",
    description: "Well-Known Inception configs",

    items: &[&StaticPreFabConfig {
        name: "inception_v3",
        description: "Inception-v3, 299x299 input",
        builder: || InceptionV3Config::new().with_transform_input(true),

        weights: Some(&StaticPretrainedWeightsMap {
            items: &[&StaticPretrainedWeightsDescriptor {
                name: "tv_in1k",
                description: "Inception-v3 pretrained on ImageNet",
                license: Some("bsd-3-clause"),
                origin: Some("https://github.com/pytorch/vision"),
                urls: &["https://download.pytorch.org/models/inception_v3_google-0cc3c7bd.pth"],
            }],
        }),
    }],
};

/// Fetch (through `disk_cache`) and import a ``"{prefab}.{weights}"`` model.
///
/// The auxiliary classifier is not built; its tensors are pruned.
pub fn load_pretrained<B: Backend>(
    name: &str,
    disk_cache: &DiskCacheConfig,
    device: &B::Device,
) -> ImportResult<InceptionV3<B>> {
    let (prefab, weights) = PREFAB_INCEPTION_MAP.lookup_pretrained(name)?;
    tracing::info!(name, url = ?weights.urls.first(), "loading pretrained inception");

    let config = prefab.new_config();
    let importer = inception_v3_torchvision_importer(config.aux_logits)?;
    let checkpoint = load_checkpoint(&weights.source()?, disk_cache)?;
    config.import::<B>(&importer, checkpoint, device)
}
