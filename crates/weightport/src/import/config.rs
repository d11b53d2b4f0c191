//! # Import Configuration
//!
//! [`ImportConfig`] is the serializable half of a model family's import
//! recipe: the prune list and the declarative rename rules. Custom mapping
//! callbacks are attached afterwards with
//! [`WeightImporter::with_rule`](crate::import::WeightImporter::with_rule).

use crate::import::rules::RenameRuleConfig;
use burn::config::Config;

/// Declarative import recipe.
#[derive(Config, Debug)]
pub struct ImportConfig {
    /// Keys containing any of these substrings are dropped before translation.
    #[config(default = "Vec::new()")]
    pub prune: Vec<String>,

    /// Rename rules, in priority order.
    #[config(default = "vec![RenameRuleConfig::Candidate]")]
    pub rules: Vec<RenameRuleConfig>,
}
