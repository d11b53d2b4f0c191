//! # Parameter Sources
//!
//! Model constructors never create parameter tensors directly; they ask a
//! [`ParamSource`] for each parameter by [`KeyPath`] and shape.
//!
//! * [`InitSource`] - fresh initialization; records the requested
//!   [`ParamStructure`] as a side effect.
//! * [`TreeSource`] - binds tensors from a validated [`ParamTree`].
//!
//! Running one constructor against both sources is what guarantees that the
//! structure a checkpoint is validated against is exactly the structure the
//! model will consume.

use crate::errors::{ImportError, ImportResult};
use crate::import::validate::{ShapeMismatch, StructureReport};
use crate::keys::KeyPath;
use crate::params::structure::ParamStructure;
use crate::params::tree::ParamTree;
use burn::module::Param;
use burn::nn::Initializer;
use burn::prelude::{Backend, Tensor};
use std::convert::Infallible;

/// How a parameter is initialized when it is not loaded.
#[derive(Debug, Clone)]
pub struct ParamInit {
    /// The initializer.
    pub initializer: Initializer,

    /// Fan-in, for fan-scaled initializers.
    pub fan_in: Option<usize>,

    /// Fan-out, for fan-scaled initializers.
    pub fan_out: Option<usize>,
}

impl ParamInit {
    /// Initialize with `initializer`, and no fan information.
    pub fn new(initializer: Initializer) -> Self {
        Self {
            initializer,
            fan_in: None,
            fan_out: None,
        }
    }

    /// All zeros.
    pub fn zeros() -> Self {
        Self::new(Initializer::Zeros)
    }

    /// All ones.
    pub fn ones() -> Self {
        Self::new(Initializer::Ones)
    }

    /// Attach fan information.
    pub fn with_fans(
        self,
        fan_in: usize,
        fan_out: usize,
    ) -> Self {
        Self {
            fan_in: Some(fan_in),
            fan_out: Some(fan_out),
            ..self
        }
    }
}

/// A provider of named model parameters.
pub trait ParamSource {
    /// The tensor backend.
    type Backend: Backend;

    /// Failure type; [`Infallible`] for sources that cannot fail.
    type Error;

    /// The device parameters are placed on.
    fn device(&self) -> &<Self::Backend as Backend>::Device;

    /// Provide the parameter at `key`.
    ///
    /// # Arguments
    ///
    /// - `key`: the parameter's path in the model namespace.
    /// - `shape`: the shape the model requires.
    /// - `init`: initialization, for sources which create parameters.
    fn param<const D: usize>(
        &mut self,
        key: &KeyPath,
        shape: [usize; D],
        init: &ParamInit,
    ) -> Result<Param<Tensor<Self::Backend, D>>, Self::Error>;
}

/// Fresh-initializing [`ParamSource`].
///
/// Parameters are created lazily by `burn`, so running a constructor against
/// an [`InitSource`] only to capture its [`ParamStructure`] does not
/// materialize any weights.
#[derive(Debug)]
pub struct InitSource<'a, B: Backend> {
    device: &'a B::Device,
    structure: ParamStructure,
}

impl<'a, B: Backend> InitSource<'a, B> {
    /// Create a new source on `device`.
    pub fn new(device: &'a B::Device) -> Self {
        Self {
            device,
            structure: ParamStructure::new(),
        }
    }

    /// The structure requested so far.
    pub fn structure(&self) -> &ParamStructure {
        &self.structure
    }

    /// Consume the source, yielding the requested structure.
    pub fn into_structure(self) -> ParamStructure {
        self.structure
    }
}

impl<B: Backend> ParamSource for InitSource<'_, B> {
    type Backend = B;
    type Error = Infallible;

    fn device(&self) -> &B::Device {
        self.device
    }

    fn param<const D: usize>(
        &mut self,
        key: &KeyPath,
        shape: [usize; D],
        init: &ParamInit,
    ) -> Result<Param<Tensor<B, D>>, Infallible> {
        let previous = self.structure.insert(key.clone(), shape.to_vec());
        assert!(previous.is_none(), "duplicate parameter key: {key}");

        Ok(init
            .initializer
            .init_with(shape, init.fan_in, init.fan_out, self.device))
    }
}

/// [`ParamSource`] binding tensors from a [`ParamTree`].
///
/// Every consumed entry is removed from the tree;
/// [`TreeSource::finish`] rejects any leftovers.
#[derive(Debug)]
pub struct TreeSource<'a, B: Backend> {
    device: &'a B::Device,
    tree: ParamTree,
}

impl<'a, B: Backend> TreeSource<'a, B> {
    /// Bind from `tree` onto `device`.
    pub fn new(
        tree: ParamTree,
        device: &'a B::Device,
    ) -> Self {
        Self { device, tree }
    }

    /// The entries not yet consumed.
    pub fn remaining(&self) -> &ParamTree {
        &self.tree
    }

    /// Check that every entry of the tree was consumed.
    pub fn finish(self) -> ImportResult<()> {
        if self.tree.is_empty() {
            return Ok(());
        }
        Err(ImportError::StructuralMismatch(StructureReport {
            unexpected: self.tree.keys().cloned().collect(),
            ..Default::default()
        }))
    }
}

impl<B: Backend> ParamSource for TreeSource<'_, B> {
    type Backend = B;
    type Error = ImportError;

    fn device(&self) -> &B::Device {
        self.device
    }

    fn param<const D: usize>(
        &mut self,
        key: &KeyPath,
        shape: [usize; D],
        _init: &ParamInit,
    ) -> ImportResult<Param<Tensor<B, D>>> {
        let data = match self.tree.remove(key) {
            Some(data) => data,
            None => {
                return Err(ImportError::StructuralMismatch(StructureReport {
                    missing: vec![key.clone()],
                    ..Default::default()
                }));
            }
        };

        if data.shape.as_slice() != shape.as_slice() {
            return Err(ImportError::StructuralMismatch(StructureReport {
                mismatched: vec![ShapeMismatch {
                    key: key.clone(),
                    expected: shape.to_vec(),
                    actual: data.shape.clone(),
                }],
                ..Default::default()
            }));
        }

        tracing::trace!(%key, ?shape, "binding parameter");
        Ok(Param::from_tensor(Tensor::from_data(data, self.device)))
    }
}

/// Unwrap the result of an infallible source.
pub fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type B = NdArray<f32>;

    #[test]
    fn test_init_source_records_structure() {
        let device = Default::default();
        let mut source = InitSource::<B>::new(&device);

        let key = KeyPath::parse("fc/weight").unwrap();
        let weight = infallible(source.param(
            &key,
            [4, 2],
            &ParamInit::new(Initializer::Constant { value: 0.5 }),
        ));
        assert_eq!(weight.dims(), [4, 2]);

        let structure = source.into_structure();
        assert_eq!(structure.get(&key), Some([4usize, 2].as_slice()));
    }

    #[test]
    #[should_panic(expected = "duplicate parameter key: fc/bias")]
    fn test_init_source_rejects_duplicates() {
        let device = Default::default();
        let mut source = InitSource::<B>::new(&device);
        let key = KeyPath::parse("fc/bias").unwrap();
        let _ = source.param(&key, [2], &ParamInit::zeros());
        let _ = source.param(&key, [2], &ParamInit::zeros());
    }

    #[test]
    fn test_tree_source_binds_and_finishes() {
        let device = Default::default();
        let key = KeyPath::parse("fc/bias").unwrap();
        let mut tree = ParamTree::new();
        tree.insert(key.clone(), TensorData::new(vec![1.0f32, 2.0], vec![2]));

        let mut source = TreeSource::<B>::new(tree, &device);
        let bias = source.param(&key, [2], &ParamInit::zeros()).unwrap();
        assert_eq!(
            bias.val().into_data().to_vec::<f32>().unwrap(),
            vec![1.0, 2.0]
        );
        assert!(source.finish().is_ok());
    }

    #[test]
    fn test_tree_source_errors() {
        let device = Default::default();
        let key = KeyPath::parse("fc/bias").unwrap();
        let extra = KeyPath::parse("fc/extra").unwrap();

        let mut tree = ParamTree::new();
        tree.insert(key.clone(), TensorData::new(vec![1.0f32, 2.0], vec![2]));
        tree.insert(extra.clone(), TensorData::new(vec![1.0f32], vec![1]));

        let mut source = TreeSource::<B>::new(tree.clone(), &device);
        match source.param(&key, [3], &ParamInit::zeros()) {
            Err(ImportError::StructuralMismatch(report)) => {
                assert_eq!(report.mismatched.len(), 1);
                assert_eq!(report.mismatched[0].expected, vec![3]);
                assert_eq!(report.mismatched[0].actual, vec![2]);
            }
            other => panic!("unexpected: {other:?}"),
        }

        let mut source = TreeSource::<B>::new(tree, &device);
        let missing = KeyPath::parse("fc/weight").unwrap();
        match source.param(&missing, [2, 2], &ParamInit::zeros()) {
            Err(ImportError::StructuralMismatch(report)) => {
                assert_eq!(report.missing, vec![missing]);
            }
            other => panic!("unexpected: {other:?}"),
        }

        source.param(&key, [2], &ParamInit::zeros()).unwrap();
        match source.finish() {
            Err(ImportError::StructuralMismatch(report)) => {
                assert_eq!(report.unexpected, vec![extra]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
