//! # Pretrained `ResNet` Models and Configs

use crate::cache::disk::DiskCacheConfig;
use crate::cache::load_checkpoint;
use crate::cache::prefabs::{StaticPreFabConfig, StaticPreFabMap};
use crate::cache::weights::{StaticPretrainedWeightsDescriptor, StaticPretrainedWeightsMap};
use crate::errors::ImportResult;
use crate::models::ModelConfig;
use crate::models::resnet::resnet_model::{ResNet, ResNetConfig};
use crate::models::resnet::torchvision::resnet_torchvision_importer;
use burn::prelude::Backend;

/// Pretrained [`ResNet`] configs and weights.
pub static PREFAB_RESNET_MAP: StaticPreFabMap<ResNetConfig> = StaticPreFabMap {
    name: "resnet",
    description: "Well-Known ResNet configs",

    items: &[
        &StaticPreFabConfig {
            name: "resnet18",
            description: "ResNet-18 [2, 2, 2, 2] BasicBlocks",
            builder: || ResNetConfig::resnet18(1000),

            weights: Some(&StaticPretrainedWeightsMap {
                items: &[&StaticPretrainedWeightsDescriptor {
                    name: "tv_in1k",
                    description: "ResNet-18 pretrained on ImageNet",
                    license: Some("bsd-3-clause"),
                    origin: Some("https://github.com/pytorch/vision"),
                    urls: &["https://download.pytorch.org/models/resnet18-f37072fd.pth"],
                }],
            }),
        },
        &StaticPreFabConfig {
            name: "resnet34",
            description: "ResNet-34 [3, 4, 6, 3] BasicBlocks",
            builder: || ResNetConfig::resnet34(1000),

            weights: Some(&StaticPretrainedWeightsMap {
                items: &[&StaticPretrainedWeightsDescriptor {
                    name: "tv_in1k",
                    description: "ResNet-34 pretrained on ImageNet",
                    license: Some("bsd-3-clause"),
                    origin: Some("https://github.com/pytorch/vision"),
                    urls: &["https://download.pytorch.org/models/resnet34-b627a593.pth"],
                }],
            }),
        },
        &StaticPreFabConfig {
            name: "resnet50",
            description: "ResNet-50 [3, 4, 6, 3] Bottleneck",
            builder: || ResNetConfig::resnet50(1000),

            weights: Some(&StaticPretrainedWeightsMap {
                items: &[
                    &StaticPretrainedWeightsDescriptor {
                        name: "tv_in1k",
                        description: "ResNet-50 pretrained on ImageNet",
                        license: Some("bsd-3-clause"),
                        origin: Some("https://github.com/pytorch/vision"),
                        urls: &["https://download.pytorch.org/models/resnet50-0676ba61.pth"],
                    },
                    &StaticPretrainedWeightsDescriptor {
                        name: "tv2_in1k",
                        description: "ResNet-50 pretrained on ImageNet; improved recipe",
                        license: Some("bsd-3-clause"),
                        origin: Some("https://github.com/pytorch/vision"),
                        urls: &["https://download.pytorch.org/models/resnet50-11ad3fa6.pth"],
                    },
                ],
            }),
        },
        &StaticPreFabConfig {
            name: "resnet101",
            description: "ResNet-101 [3, 4, 23, 3] Bottleneck",
            builder: || ResNetConfig::resnet101(1000),

            weights: Some(&StaticPretrainedWeightsMap {
                items: &[&StaticPretrainedWeightsDescriptor {
                    name: "tv2_in1k",
                    description: "ResNet-101 pretrained on ImageNet",
                    license: Some("bsd-3-clause"),
                    origin: Some("https://github.com/pytorch/vision"),
                    urls: &["https://download.pytorch.org/models/resnet101-cd907fc2.pth"],
                }],
            }),
        },
        &StaticPreFabConfig {
            name: "resnet152",
            description: "ResNet-152 [3, 8, 36, 3] Bottleneck",
            builder: || ResNetConfig::resnet152(1000),

            weights: Some(&StaticPretrainedWeightsMap {
                items: &[&StaticPretrainedWeightsDescriptor {
                    name: "tv2_in1k",
                    description: "ResNet-152 pretrained on ImageNet",
                    license: Some("bsd-3-clause"),
                    origin: Some("https://github.com/pytorch/vision"),
                    urls: &["https://download.pytorch.org/models/resnet152-f82ba261.pth"],
                }],
            }),
        },
        &StaticPreFabConfig {
            name: "wide_resnet50_2",
            description: "Wide-ResNet-50-2 [3, 4, 6, 3] Bottleneck, base_width=128",
            builder: || ResNetConfig::wide_resnet50_2(1000),
            weights: None,
        },
    ],
};

/// Fetch (through `disk_cache`) and import a ``"{prefab}.{weights}"`` model.
///
/// # Example
///
/// ```rust,no_run
/// use burn::backend::NdArray;
/// use weightport::cache::disk::DiskCacheConfig;
/// use weightport::models::resnet::load_pretrained;
///
/// let model = load_pretrained::<NdArray>(
///     "resnet18.tv_in1k",
///     &DiskCacheConfig::default(),
///     &Default::default(),
/// )
/// .unwrap();
/// ```
pub fn load_pretrained<B: Backend>(
    name: &str,
    disk_cache: &DiskCacheConfig,
    device: &B::Device,
) -> ImportResult<ResNet<B>> {
    let (prefab, weights) = PREFAB_RESNET_MAP.lookup_pretrained(name)?;
    tracing::info!(name, url = ?weights.urls.first(), "loading pretrained resnet");

    let checkpoint = load_checkpoint(&weights.source()?, disk_cache)?;
    prefab
        .new_config()
        .import::<B>(&resnet_torchvision_importer(), checkpoint, device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ImportErrorKind;

    #[test]
    fn test_prefab_map() {
        assert_eq!(
            PREFAB_RESNET_MAP.pretrained_names(),
            vec![
                "resnet18.tv_in1k",
                "resnet34.tv_in1k",
                "resnet50.tv_in1k",
                "resnet50.tv2_in1k",
                "resnet101.tv2_in1k",
                "resnet152.tv2_in1k",
            ]
        );

        let (prefab, weights) = PREFAB_RESNET_MAP
            .lookup_pretrained("resnet50.tv2_in1k")
            .unwrap();
        let config = prefab.new_config();
        assert!(config.bottleneck);
        assert_eq!(config.layers, [3, 4, 6, 3]);
        assert_eq!(
            weights.cache_key().unwrap().split('-').next(),
            Some("tv2_in1k")
        );

        let wide = PREFAB_RESNET_MAP.lookup_prefab("wide_resnet50_2").unwrap();
        assert_eq!(wide.new_config().base_width, 128);
    }

    #[test]
    fn test_load_pretrained_unknown() {
        let cache = DiskCacheConfig::default();
        let device = Default::default();
        for name in ["resnet18", "resnet18.nope", "resnet9000.tv_in1k", "wide_resnet50_2.tv_in1k"] {
            let err = load_pretrained::<burn::backend::NdArray>(name, &cache, &device).unwrap_err();
            assert_eq!(err.kind(), ImportErrorKind::Fetch, "{name}");
        }
    }
}
