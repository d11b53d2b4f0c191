//! # Weight Importer
//!
//! [`WeightImporter`] runs the full pipeline:
//!
//! ```text
//! checkpoint -> prune -> translate -> validate -> materialize -> ParamTree
//! ```
//!
//! Every step is fatal on failure; a model is only ever bound from a tree
//! which matched its expected structure exactly.

use crate::checkpoint::Checkpoint;
use crate::errors::ImportResult;
use crate::import::config::ImportConfig;
use crate::import::prune::Pruner;
use crate::import::rules::RenameRule;
use crate::import::translate::{KeyTranslator, TranslatedCheckpoint};
use crate::import::validate::validate_structure;
use crate::params::{ParamStructure, ParamTree, TreeSource};
use burn::prelude::Backend;

/// Prune, translate, validate and materialize foreign checkpoints.
#[derive(Debug, Default)]
pub struct WeightImporter {
    pruner: Pruner,
    translator: KeyTranslator,
}

impl WeightImporter {
    /// Assemble an importer.
    pub fn new(
        pruner: Pruner,
        translator: KeyTranslator,
    ) -> Self {
        Self { pruner, translator }
    }

    /// Compile a declarative [`ImportConfig`].
    pub fn from_config(config: &ImportConfig) -> ImportResult<Self> {
        let mut translator = KeyTranslator::new();
        for rule in &config.rules {
            translator.push_rule(rule.build()?);
        }
        Ok(Self::new(Pruner::new(config.prune.iter().cloned()), translator))
    }

    /// Append a prune pattern.
    pub fn with_prune<S: Into<String>>(
        self,
        pattern: S,
    ) -> Self {
        Self {
            pruner: self.pruner.with_pattern(pattern),
            ..self
        }
    }

    /// Append a rename rule, after all existing rules.
    pub fn with_rule<R: RenameRule + 'static>(
        self,
        rule: R,
    ) -> Self {
        Self {
            translator: self.translator.with_rule(rule),
            ..self
        }
    }

    /// The pruner.
    pub fn pruner(&self) -> &Pruner {
        &self.pruner
    }

    /// The key translator.
    pub fn translator(&self) -> &KeyTranslator {
        &self.translator
    }

    /// Prune and translate, without validation.
    pub fn translate(
        &self,
        checkpoint: Checkpoint,
    ) -> ImportResult<TranslatedCheckpoint> {
        let checkpoint = self.pruner.prune(checkpoint);
        self.translator.translate(checkpoint)
    }

    /// Prune, translate and validate against `expected`.
    ///
    /// No tensor data is transformed; this is a cheap dry run.
    pub fn check(
        &self,
        checkpoint: Checkpoint,
        expected: &ParamStructure,
    ) -> ImportResult<TranslatedCheckpoint> {
        let translated = self.translate(checkpoint)?;
        validate_structure(expected, &translated.structure())?;
        Ok(translated)
    }

    /// Run the full pipeline on backend `B`.
    ///
    /// # Arguments
    ///
    /// - `checkpoint`: the foreign checkpoint.
    /// - `expected`: the target model's structure.
    /// - `device`: where layout transforms are computed.
    ///
    /// # Returns
    ///
    /// A [`ParamTree`] whose structure equals `expected`.
    pub fn import<B: Backend>(
        &self,
        checkpoint: Checkpoint,
        expected: &ParamStructure,
        device: &B::Device,
    ) -> ImportResult<ParamTree> {
        tracing::info!(
            tensors = checkpoint.len(),
            expected = expected.len(),
            "importing checkpoint"
        );

        let translated = self.check(checkpoint, expected)?;
        let tree = translated.materialize::<B>(device)?;

        tracing::info!(params = tree.len(), "import complete");
        Ok(tree)
    }

    /// Import, then bind the tree into a module.
    ///
    /// `build` constructs the module from the [`TreeSource`]; every tree
    /// entry must be consumed.
    pub fn load_into<B, M, F>(
        &self,
        checkpoint: Checkpoint,
        expected: &ParamStructure,
        device: &B::Device,
        build: F,
    ) -> ImportResult<M>
    where
        B: Backend,
        F: FnOnce(&mut TreeSource<'_, B>) -> ImportResult<M>,
    {
        let tree = self.import::<B>(checkpoint, expected, device)?;
        let mut source = TreeSource::new(tree, device);
        let module = build(&mut source)?;
        source.finish()?;
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ImportError, ImportErrorKind};
    use crate::import::layout::LayoutTransform;
    use crate::import::rules::{RenameRuleConfig, Translation};
    use crate::keys::KeyPath;
    use crate::params::{ParamInit, ParamSource};
    use crate::testing::backend_matrix;
    use burn::prelude::Tensor;
    use burn::tensor::TensorData;
    use hamcrest::prelude::*;
    use std::sync::{Arc, Mutex};

    fn ramp(shape: &[usize]) -> TensorData {
        let n: usize = shape.iter().product();
        TensorData::new((0..n).map(|i| i as f32).collect::<Vec<_>>(), shape.to_vec())
    }

    fn conv1_checkpoint() -> Checkpoint {
        Checkpoint::new()
            .with("conv1.weight", ramp(&[64, 3, 7, 7]))
            .with(
                "conv1.num_batches_tracked",
                TensorData::new(vec![0.0f32], Vec::<usize>::new()),
            )
    }

    fn conv1_importer() -> WeightImporter {
        WeightImporter::new(Pruner::new(["num_batches_tracked"]), KeyTranslator::new()).with_rule(
            |old: &str, _candidate: &KeyPath| -> Option<Translation> {
                (old == "conv1.weight").then(|| {
                    Translation::rename(KeyPath::new(["conv1", "weight"]))
                        .with_transform(LayoutTransform::ChannelsFirstToChannelsLast)
                })
            },
        )
    }

    fn end_to_end<B: Backend>(device: &B::Device) {
        let expected = ParamStructure::new().with("conv1/weight", &[7, 7, 3, 64]);
        let tree = conv1_importer()
            .import::<B>(conv1_checkpoint(), &expected, device)
            .unwrap();

        assert_eq!(tree.structure(), expected);

        // out[h, w, c, o] = in[o, c, h, w]
        let values = tree
            .get(&KeyPath::parse("conv1/weight").unwrap())
            .unwrap()
            .to_vec::<f32>()
            .unwrap();
        let source = |o: usize, c: usize, h: usize, w: usize| (((o * 3 + c) * 7 + h) * 7 + w) as f32;
        let target = |h: usize, w: usize, c: usize, o: usize| values[((h * 7 + w) * 3 + c) * 64 + o];
        assert_eq!(target(0, 0, 0, 0), source(0, 0, 0, 0));
        assert_eq!(target(1, 2, 0, 5), source(5, 0, 1, 2));
        assert_eq!(target(6, 6, 2, 63), source(63, 2, 6, 6));
    }

    fn rejects_unexpected_bias<B: Backend>(device: &B::Device) {
        let expected = ParamStructure::new()
            .with("conv1/weight", &[7, 7, 3, 64])
            .with("conv1/bias", &[64]);

        let err = conv1_importer()
            .import::<B>(conv1_checkpoint(), &expected, device)
            .unwrap_err();

        match err {
            ImportError::StructuralMismatch(report) => {
                assert_eq!(report.missing, vec![KeyPath::parse("conv1/bias").unwrap()]);
                assert!(report.unexpected.is_empty());
                assert!(report.mismatched.is_empty());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    fn idempotent<B: Backend>(device: &B::Device) {
        let expected = ParamStructure::new().with("conv1/weight", &[7, 7, 3, 64]);
        let importer = conv1_importer();

        let first = importer
            .import::<B>(conv1_checkpoint(), &expected, device)
            .unwrap();
        let second = importer
            .import::<B>(conv1_checkpoint(), &expected, device)
            .unwrap();

        assert_eq!(first.len(), second.len());
        for ((ka, a), (kb, b)) in first.iter().zip(second.iter()) {
            assert_eq!(ka, kb);
            assert_eq!(a.shape, b.shape);
            assert_eq!(a.as_bytes(), b.as_bytes());
        }
    }

    backend_matrix!(end_to_end, rejects_unexpected_bias, idempotent);

    #[test]
    fn test_prune_precedes_translation() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let log = seen.clone();

        let importer = WeightImporter::default()
            .with_prune("num_batches_tracked")
            .with_rule(move |old: &str, candidate: &KeyPath| -> Option<Translation> {
                log.lock().unwrap().push(old.to_string());
                Some(Translation::rename(candidate.clone()))
            });

        let translated = importer.translate(conv1_checkpoint()).unwrap();
        assert_eq!(translated.len(), 1);

        let seen = seen.lock().unwrap();
        assert_that!(seen.len(), equal_to(1));
        assert_that!(seen[0].as_str(), equal_to("conv1.weight"));
    }

    #[test]
    fn test_unmapped_key_is_fatal() {
        type B = burn::backend::NdArray<f32>;
        let device = Default::default();

        let importer = WeightImporter::default().with_rule(
            |old: &str, _: &KeyPath| -> Option<Translation> {
                (old == "conv1.weight").then(|| Translation::rename(KeyPath::root("w")))
            },
        );
        let err = importer
            .import::<B>(conv1_checkpoint(), &ParamStructure::new(), &device)
            .unwrap_err();

        assert_eq!(err.kind(), ImportErrorKind::Translation);
        match err {
            ImportError::UnmappedKeys { keys } => {
                assert_eq!(keys, vec!["conv1.num_batches_tracked"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_from_config() {
        let config = ImportConfig::new()
            .with_prune(vec!["num_batches_tracked".to_string()])
            .with_rules(vec![
                RenameRuleConfig::Layout {
                    needles: vec!["conv1.weight".to_string()],
                    transform: LayoutTransform::Pattern("o i h w -> h w i o".to_string()),
                },
                RenameRuleConfig::Candidate,
            ]);
        let importer = WeightImporter::from_config(&config).unwrap();
        assert_eq!(importer.translator().len(), 2);

        let expected = ParamStructure::new().with("conv1/weight", &[7, 7, 3, 64]);
        let translated = importer.check(conv1_checkpoint(), &expected).unwrap();
        assert_eq!(translated.structure(), expected);
    }

    #[test]
    fn test_config_rules_precede_programmatic_rules() {
        let importer = WeightImporter::from_config(&ImportConfig::new())
            .unwrap()
            .with_rule(|_: &str, _: &KeyPath| -> Option<Translation> {
                Some(Translation::rename(KeyPath::root("shadowed")))
            });

        let translation = importer.translator().translate_key("fc.bias").unwrap();
        assert_eq!(translation.key, KeyPath::parse("fc/bias").unwrap());
    }

    #[test]
    fn test_load_into() {
        type B = burn::backend::NdArray<f32>;
        let device = Default::default();

        let checkpoint = Checkpoint::new()
            .with("fc.bias", ramp(&[3]))
            .with("fc.num_batches_tracked", ramp(&[1]));
        let expected = ParamStructure::new().with("fc/bias", &[3]);
        let importer = WeightImporter::from_config(
            &ImportConfig::new().with_prune(vec!["num_batches_tracked".to_string()]),
        )
        .unwrap();

        let bias: Tensor<B, 1> = importer
            .load_into::<B, _, _>(checkpoint.clone(), &expected, &device, |source| {
                let key = KeyPath::parse("fc/bias").unwrap();
                Ok(source.param(&key, [3], &ParamInit::zeros())?.val())
            })
            .unwrap();
        assert_eq!(
            bias.into_data().to_vec::<f32>().unwrap(),
            vec![0.0, 1.0, 2.0]
        );

        // A builder that leaves entries unconsumed is rejected.
        let err = importer
            .load_into::<B, _, _>(checkpoint, &expected, &device, |_| Ok(()))
            .unwrap_err();
        assert_eq!(err.kind(), ImportErrorKind::Structure);
    }
}
