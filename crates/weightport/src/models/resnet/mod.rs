//! # `ResNet`
//!
//! `ResNet` family models, built from a [`ParamSource`](crate::params::ParamSource).
//!
//! * [`ResNetConfig`] / [`ResNet`] - the model.
//! * [`torchvision`] - `torchvision` state-dict import.
//! * [`pretrained`] - prefab configs with pretrained weights.
//!
//! ```rust,no_run
//! use burn::backend::NdArray;
//! use weightport::cache::disk::DiskCacheConfig;
//! use weightport::cache::load_checkpoint;
//! use weightport::cache::weights::WeightSource;
//! use weightport::models::ModelConfig;
//! use weightport::models::resnet::{ResNetConfig, resnet_torchvision_importer};
//!
//! let device = Default::default();
//! let checkpoint = load_checkpoint(
//!     &WeightSource::parse("/tmp/resnet18.pth"),
//!     &DiskCacheConfig::default(),
//! )
//! .unwrap();
//!
//! let model = ResNetConfig::resnet18(1000)
//!     .import::<NdArray>(&resnet_torchvision_importer(), checkpoint, &device)
//!     .unwrap();
//! ```

pub mod basic_block;
pub mod bottleneck;
pub mod layer_block;
pub mod pretrained;
pub mod residual_block;
pub mod resnet_model;
pub mod torchvision;
pub mod util;

pub use pretrained::{PREFAB_RESNET_MAP, load_pretrained};
pub use resnet_model::{ResNet, ResNetConfig};
pub use torchvision::resnet_torchvision_importer;
