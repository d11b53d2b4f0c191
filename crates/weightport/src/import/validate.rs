//! # Structural Validation
//!
//! Before any tensor is bound, the translated checkpoint's structure is
//! compared against the model's expected [`ParamStructure`]. Every difference
//! is collected into a single [`StructureReport`].

use crate::errors::{ImportError, ImportResult};
use crate::keys::KeyPath;
use crate::params::ParamStructure;
use std::fmt::{Display, Formatter};

/// A parameter present on both sides with different shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeMismatch {
    /// The parameter key.
    pub key: KeyPath,

    /// The shape the model requires.
    pub expected: Vec<usize>,

    /// The shape the checkpoint provides.
    pub actual: Vec<usize>,
}

/// The full difference between an expected and an actual structure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructureReport {
    /// Keys the model expects but the checkpoint lacks.
    pub missing: Vec<KeyPath>,

    /// Keys the checkpoint provides but the model does not expect.
    pub unexpected: Vec<KeyPath>,

    /// Keys present on both sides with disagreeing shapes.
    pub mismatched: Vec<ShapeMismatch>,
}

impl StructureReport {
    /// Do the structures agree?
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.mismatched.is_empty()
    }

    /// Convert a non-empty report into an error.
    pub fn into_result(self) -> ImportResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ImportError::StructuralMismatch(self))
        }
    }
}

impl Display for StructureReport {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        for key in &self.missing {
            writeln!(f, "  missing: {key}")?;
        }
        for key in &self.unexpected {
            writeln!(f, "  unexpected: {key}")?;
        }
        for m in &self.mismatched {
            writeln!(
                f,
                "  shape: {}: expected {:?}, found {:?}",
                m.key, m.expected, m.actual
            )?;
        }
        Ok(())
    }
}

/// Compare two structures.
///
/// All report lists are in key order.
pub fn compare_structures(
    expected: &ParamStructure,
    actual: &ParamStructure,
) -> StructureReport {
    let mut report = StructureReport::default();

    for (key, shape) in expected.iter() {
        match actual.get(key) {
            None => report.missing.push(key.clone()),
            Some(found) if found != shape => report.mismatched.push(ShapeMismatch {
                key: key.clone(),
                expected: shape.to_vec(),
                actual: found.to_vec(),
            }),
            Some(_) => {}
        }
    }

    report.unexpected = actual
        .keys()
        .filter(|key| !expected.contains(key))
        .cloned()
        .collect();

    report
}

/// Require `actual` to match `expected` exactly.
pub fn validate_structure(
    expected: &ParamStructure,
    actual: &ParamStructure,
) -> ImportResult<()> {
    let report = compare_structures(expected, actual);
    if !report.is_empty() {
        tracing::warn!(
            missing = report.missing.len(),
            unexpected = report.unexpected.len(),
            mismatched = report.mismatched.len(),
            "structural validation failed"
        );
    }
    report.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ImportErrorKind;

    fn expected() -> ParamStructure {
        ParamStructure::new()
            .with("conv1/weight", &[7, 7, 3, 64])
            .with("conv1/bias", &[64])
            .with("fc/weight", &[512, 10])
    }

    #[test]
    fn test_identical_structures_pass() {
        assert!(validate_structure(&expected(), &expected()).is_ok());
    }

    #[test]
    fn test_one_missing_key_is_rejected() {
        let mut actual = expected();
        actual.remove(&KeyPath::parse("conv1/bias").unwrap());

        let report = compare_structures(&expected(), &actual);
        assert_eq!(report.missing, vec![KeyPath::parse("conv1/bias").unwrap()]);
        assert!(report.unexpected.is_empty());
        assert!(report.mismatched.is_empty());

        let err = validate_structure(&expected(), &actual).unwrap_err();
        assert_eq!(err.kind(), ImportErrorKind::Structure);
    }

    #[test]
    fn test_one_altered_dimension_is_rejected() {
        let actual = expected().with("fc/weight", &[512, 11]);

        let report = compare_structures(&expected(), &actual);
        assert_eq!(
            report.mismatched,
            vec![ShapeMismatch {
                key: KeyPath::parse("fc/weight").unwrap(),
                expected: vec![512, 10],
                actual: vec![512, 11],
            }]
        );
        assert!(report.missing.is_empty());
        assert!(report.unexpected.is_empty());
    }

    #[test]
    fn test_extra_key_is_rejected() {
        let actual = expected().with("aux/weight", &[3]);
        let report = compare_structures(&expected(), &actual);
        assert_eq!(report.unexpected, vec![KeyPath::parse("aux/weight").unwrap()]);
        assert!(validate_structure(&expected(), &actual).is_err());
    }

    #[test]
    fn test_rank_change_is_a_mismatch() {
        let actual = expected().with("conv1/bias", &[64, 1]);
        let report = compare_structures(&expected(), &actual);
        assert_eq!(report.mismatched.len(), 1);
        assert_eq!(report.mismatched[0].actual, vec![64, 1]);
    }

    #[test]
    fn test_report_display() {
        let report = StructureReport {
            missing: vec![KeyPath::parse("conv1/bias").unwrap()],
            unexpected: vec![],
            mismatched: vec![ShapeMismatch {
                key: KeyPath::parse("fc/weight").unwrap(),
                expected: vec![512, 10],
                actual: vec![10, 512],
            }],
        };
        assert_eq!(
            report.to_string(),
            "  missing: conv1/bias\n  shape: fc/weight: expected [512, 10], found [10, 512]\n"
        );
    }
}
