//! # Weight Import Pipeline
//!
//! Converting a foreign checkpoint into a native parameter tree:
//!
//! 1. [`prune`] - drop bookkeeping keys.
//! 2. [`translate`] - rename keys with [`rules`]; tag [`layout`] transforms.
//! 3. [`validate`] - compare against the model's expected structure.
//! 4. materialize - apply layout transforms on an explicit backend.
//!
//! [`WeightImporter`] runs the whole sequence; [`ImportConfig`] is its
//! serializable recipe.

pub mod config;
pub mod importer;
pub mod layout;
pub mod prune;
pub mod rules;
pub mod translate;
pub mod validate;

pub use config::ImportConfig;
pub use importer::WeightImporter;
pub use layout::LayoutTransform;
pub use prune::Pruner;
pub use rules::{AcceptCandidate, LayoutHint, RegexRename, RenameRule, RenameRuleConfig, Translation};
pub use translate::{KeyTranslator, TranslatedCheckpoint, TranslatedEntry};
pub use validate::{ShapeMismatch, StructureReport, compare_structures, validate_structure};
