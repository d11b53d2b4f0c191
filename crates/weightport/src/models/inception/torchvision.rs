//! # `torchvision` Inception-v3 Checkpoint Import
//!
//! The native namespace already follows `torchvision` module names, so the
//! recipe is declarative:
//!
//! | `torchvision` | native |
//! |---------------|--------|
//! | ``{m}.bn.weight`` | ``{m}/norm/gamma`` |
//! | ``{m}.bn.bias`` | ``{m}/norm/beta`` |
//! | ``{m}.bn.running_*`` | ``{m}/norm/running_*`` |
//! | ``fc.weight`` ``[out, in]`` | ``fc/weight`` ``[in, out]`` |
//! | everything else | unchanged, ``.`` -> ``/`` |
//!
//! ``AuxLogits`` tensors are pruned unless the target model builds the
//! auxiliary head.

use crate::errors::ImportResult;
use crate::import::layout::LayoutTransform;
use crate::import::rules::RenameRuleConfig;
use crate::import::{ImportConfig, WeightImporter};

/// Batch-norm bookkeeping counter; never bound.
pub const NUM_BATCHES_TRACKED: &str = "num_batches_tracked";

/// Namespace of the auxiliary classifier.
pub const AUX_LOGITS: &str = "AuxLogits";

fn regex(
    pattern: &str,
    replacement: &str,
    transform: Option<LayoutTransform>,
) -> RenameRuleConfig {
    RenameRuleConfig::Regex {
        pattern: pattern.to_string(),
        replacement: replacement.to_string(),
        transform,
    }
}

/// The declarative `torchvision` Inception-v3 recipe.
///
/// # Arguments
///
/// - `aux_logits`: keep the ``AuxLogits`` tensors; they are pruned otherwise.
pub fn inception_v3_import_config(aux_logits: bool) -> ImportConfig {
    let mut prune = vec![NUM_BATCHES_TRACKED.to_string()];
    if !aux_logits {
        prune.push(AUX_LOGITS.to_string());
    }

    ImportConfig::new().with_prune(prune).with_rules(vec![
        regex(r"(.*)\.bn\.weight", "$1.norm.gamma", None),
        regex(r"(.*)\.bn\.bias", "$1.norm.beta", None),
        regex(
            r"(.*)\.bn\.(running_mean|running_var)",
            "$1.norm.$2",
            None,
        ),
        regex(
            r"(fc|AuxLogits\.fc)\.weight",
            "$1.weight",
            Some(LayoutTransform::Transpose),
        ),
        RenameRuleConfig::Candidate,
    ])
}

/// [`WeightImporter`] for `torchvision` Inception-v3 checkpoints.
pub fn inception_v3_torchvision_importer(aux_logits: bool) -> ImportResult<WeightImporter> {
    WeightImporter::from_config(&inception_v3_import_config(aux_logits))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::checkpoint::Checkpoint;
    use crate::errors::{ImportError, ImportErrorKind};
    use crate::keys::KeyPath;
    use crate::models::ModelConfig;
    use crate::models::inception::InceptionV3Config;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    fn rename(
        importer: &WeightImporter,
        key: &str,
    ) -> Option<String> {
        importer
            .translator()
            .translate_key(key)
            .map(|t| t.key.to_string())
    }

    #[test]
    fn test_recipe_renames() {
        let importer = inception_v3_torchvision_importer(false).unwrap();
        for (old, new) in [
            ("Conv2d_1a_3x3.conv.weight", "Conv2d_1a_3x3/conv/weight"),
            ("Conv2d_1a_3x3.bn.weight", "Conv2d_1a_3x3/norm/gamma"),
            ("Mixed_5b.branch_pool.bn.bias", "Mixed_5b/branch_pool/norm/beta"),
            (
                "Mixed_7c.branch3x3dbl_3b.bn.running_var",
                "Mixed_7c/branch3x3dbl_3b/norm/running_var",
            ),
            ("AuxLogits.fc.weight", "AuxLogits/fc/weight"),
            ("fc.bias", "fc/bias"),
        ] {
            assert_eq!(rename(&importer, old).as_deref(), Some(new), "{old}");
        }

        let fc = importer.translator().translate_key("fc.weight").unwrap();
        assert_eq!(fc.key.to_string(), "fc/weight");
        assert_eq!(fc.transform, Some(LayoutTransform::Transpose));

        let conv = importer
            .translator()
            .translate_key("Mixed_6a.branch3x3.conv.weight")
            .unwrap();
        assert_eq!(conv.transform, None);
    }

    #[test]
    fn test_prune_patterns() {
        let without_aux = inception_v3_torchvision_importer(false).unwrap();
        assert!(without_aux.pruner().matches("AuxLogits.conv0.conv.weight"));
        assert!(without_aux.pruner().matches("Mixed_5b.branch1x1.bn.num_batches_tracked"));
        assert!(!without_aux.pruner().matches("fc.weight"));

        let with_aux = inception_v3_torchvision_importer(true).unwrap();
        assert!(!with_aux.pruner().matches("AuxLogits.conv0.conv.weight"));
        assert!(with_aux.pruner().matches("AuxLogits.conv0.bn.num_batches_tracked"));
    }

    fn torch_key(key: &KeyPath) -> String {
        key.to_string()
            .replace("/norm/gamma", "/bn/weight")
            .replace("/norm/beta", "/bn/bias")
            .replace("/norm/", "/bn/")
            .replace('/', ".")
    }

    /// A `torchvision`-named checkpoint, aux head included, shaped from the
    /// native structure.
    ///
    /// ``fc.weight`` holds ``0..num_classes*2048``, row-major ``[out, in]``.
    pub(crate) fn torchvision_inception_checkpoint(num_classes: usize) -> Checkpoint {
        let structure = InceptionV3Config::new()
            .with_num_classes(num_classes)
            .with_aux_logits(true)
            .structure::<NdArray>(&Default::default());

        let mut checkpoint = Checkpoint::new();
        for (key, shape) in structure.iter() {
            let torch = torch_key(key);
            let data = match torch.as_str() {
                "fc.weight" | "AuxLogits.fc.weight" => {
                    let (fan_in, fan_out) = (shape[0], shape[1]);
                    let ramp = (0..fan_in * fan_out).map(|v| v as f32).collect();
                    TensorData::new(ramp, vec![fan_out, fan_in])
                }
                _ => TensorData::new(vec![0.0f32; shape.iter().product()], shape.to_vec()),
            };
            if let Some(prefix) = torch.strip_suffix(".running_mean") {
                checkpoint.insert(
                    format!("{prefix}.{NUM_BATCHES_TRACKED}"),
                    TensorData::new(vec![0i64], Vec::<usize>::new()),
                );
            }
            checkpoint.insert(torch, data);
        }
        checkpoint
    }

    #[test]
    fn test_check_prunes_aux_logits() {
        let num_classes = 10;
        let checkpoint = torchvision_inception_checkpoint(num_classes);
        assert!(checkpoint.get("AuxLogits.fc.bias").is_some());
        assert!(checkpoint.get("Conv2d_1a_3x3.bn.num_batches_tracked").is_some());

        let expected = InceptionV3Config::new()
            .with_num_classes(num_classes)
            .structure::<NdArray>(&Default::default());
        let translated = inception_v3_torchvision_importer(false)
            .unwrap()
            .check(checkpoint, &expected)
            .unwrap();

        assert_eq!(translated.structure(), expected);
        let fc = translated.get(&KeyPath::new(["fc", "weight"])).unwrap();
        assert_eq!(fc.shape, vec![2048, num_classes]);
        assert_eq!(fc.source_key, "fc.weight");
    }

    #[test]
    fn test_check_keeps_aux_logits() {
        let expected = InceptionV3Config::new()
            .with_num_classes(4)
            .with_aux_logits(true)
            .structure::<NdArray>(&Default::default());
        let translated = inception_v3_torchvision_importer(true)
            .unwrap()
            .check(torchvision_inception_checkpoint(4), &expected)
            .unwrap();

        let aux = translated.get(&KeyPath::new(["AuxLogits", "fc", "weight"])).unwrap();
        assert_eq!(aux.shape, vec![768, 4]);
    }

    #[test]
    fn test_check_reports_missing_branch() {
        let mut checkpoint = torchvision_inception_checkpoint(3);
        checkpoint.remove("Mixed_6c.branch7x7dbl_4.conv.weight");

        let expected = InceptionV3Config::new()
            .with_num_classes(3)
            .structure::<NdArray>(&Default::default());
        let err = inception_v3_torchvision_importer(false)
            .unwrap()
            .check(checkpoint, &expected)
            .unwrap_err();

        assert_eq!(err.kind(), ImportErrorKind::Structure);
        match err {
            ImportError::StructuralMismatch(report) => {
                assert_eq!(
                    report.missing,
                    vec![KeyPath::parse("Mixed_6c/branch7x7dbl_4/conv/weight").unwrap()]
                );
                assert!(report.unexpected.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unpruned_aux_logits_are_unexpected() {
        // Keeping AuxLogits for a model without the aux head leaves them unbound.
        let expected = InceptionV3Config::new()
            .with_num_classes(3)
            .structure::<NdArray>(&Default::default());
        let err = inception_v3_torchvision_importer(true)
            .unwrap()
            .check(torchvision_inception_checkpoint(3), &expected)
            .unwrap_err();

        match err {
            ImportError::StructuralMismatch(report) => {
                assert!(report.missing.is_empty());
                assert!(!report.unexpected.is_empty());
                assert!(report.unexpected.iter().all(|k| k.segments()[0] == AUX_LOGITS));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
