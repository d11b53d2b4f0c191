//! # Model Definitions
//!
//! Each model config implements [`ModelConfig`]; a model is built by pulling
//! every parameter from a [`ParamSource`], so the same constructor serves
//! fresh initialization, structure capture, and checkpoint binding.
//!
//! * [`resnet`] - `ResNet` family, with `torchvision` weight import.
//! * [`inception`] - Inception-v3, with `torchvision` weight import.
//! * [`unet`] - `UNet` segmentation model.
//! * [`transformers`] - attention and feed-forward helpers.

pub mod inception;
pub mod resnet;
pub mod transformers;
pub mod unet;

use crate::checkpoint::Checkpoint;
use crate::errors::ImportResult;
use crate::import::WeightImporter;
use crate::params::{InitSource, ParamSource, ParamStructure, ParamTree, TreeSource, infallible};
use burn::prelude::Backend;

/// A model config which builds its model from a [`ParamSource`].
pub trait ModelConfig {
    /// The model type, per backend.
    type Model<B: Backend>;

    /// Build the model, requesting every parameter from `source`.
    fn init_with<S: ParamSource>(
        &self,
        source: &mut S,
    ) -> Result<Self::Model<S::Backend>, S::Error>;

    /// The parameter structure the model expects.
    ///
    /// Parameters are lazily initialized, so no weights are materialized.
    fn structure<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ParamStructure {
        let mut source = InitSource::<B>::new(device);
        let _model = infallible(self.init_with(&mut source));
        source.into_structure()
    }

    /// Build a freshly initialized model.
    fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Self::Model<B> {
        infallible(self.init_with(&mut InitSource::<B>::new(device)))
    }

    /// Build the model from a native [`ParamTree`].
    ///
    /// Every tree entry must be consumed.
    fn bind<B: Backend>(
        &self,
        tree: ParamTree,
        device: &B::Device,
    ) -> ImportResult<Self::Model<B>> {
        let mut source = TreeSource::new(tree, device);
        let model = self.init_with(&mut source)?;
        source.finish()?;
        Ok(model)
    }

    /// Import a foreign checkpoint, and build the model from it.
    ///
    /// The checkpoint is pruned, translated, and validated against
    /// [`ModelConfig::structure`] before any tensor is bound.
    fn import<B: Backend>(
        &self,
        importer: &WeightImporter,
        checkpoint: Checkpoint,
        device: &B::Device,
    ) -> ImportResult<Self::Model<B>> {
        let expected = self.structure::<B>(device);
        importer.load_into(checkpoint, &expected, device, |source| {
            self.init_with(source)
        })
    }
}
