#![warn(missing_docs)]
//!# weightport - Pretrained Weight Import for Burn
//!
//! Loads checkpoints trained in foreign frameworks into native `burn` models.
//!
//! ## Notable Components
//!
//! * [`cache`] - weight sources, the download cache, and prefab catalogs.
//! * [`checkpoint`] - flat foreign checkpoints; ``safetensors`` and `PyTorch` readers.
//! * [`import`] - the import pipeline.
//!   * [`import::prune`] - drop bookkeeping keys.
//!   * [`import::rules`] - key rename rules.
//!   * [`import::translate`] - checkpoint key translation.
//!   * [`import::layout`] - tensor layout transforms.
//!   * [`import::validate`] - structural validation.
//! * [`keys`] - hierarchical parameter [`KeyPath`](keys::KeyPath)s.
//! * [`params`] - parameter trees, structures and sources.
//! * [`layers`] - layers built from parameter sources.
//! * [`models`] - complete model families.
//!   * [`models::resnet`] - `ResNet`, with `torchvision` import.
//!   * [`models::inception`] - Inception-v3, with `torchvision` import.
//!   * [`models::unet`] - `UNet`.
//!   * [`models::transformers`] - attention and feed-forward helpers.
//!
//! ## Errors
//!
//! Every fallible operation returns an [`ImportError`](errors::ImportError),
//! classified into fetch, translation and structure kinds.

/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

#[cfg(test)]
#[allow(dead_code)]
pub(crate) mod testing;

pub mod cache;
pub mod checkpoint;
pub mod errors;
pub mod import;
pub mod keys;
pub mod layers;
pub mod models;
pub mod params;

pub use checkpoint::Checkpoint;
pub use errors::{ImportError, ImportErrorKind, ImportResult};
pub use import::{ImportConfig, WeightImporter};
pub use keys::KeyPath;
pub use models::ModelConfig;
