//! # Checkpoint Pruning
//!
//! Foreign checkpoints routinely carry bookkeeping tensors with no
//! counterpart in the target model (``num_batches_tracked``, auxiliary
//! heads, EMA copies). A [`Pruner`] discards every key containing any of its
//! substring patterns.
//!
//! Pruning always runs before key translation; a pruned key is never offered
//! to a rename rule.

use crate::checkpoint::Checkpoint;

/// Substring-based key filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pruner {
    patterns: Vec<String>,
}

impl Pruner {
    /// Create a pruner.
    ///
    /// Empty patterns are ignored; they would match every key.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// Builder-style pattern append.
    pub fn with_pattern<S: Into<String>>(
        mut self,
        pattern: S,
    ) -> Self {
        let pattern = pattern.into();
        if !pattern.is_empty() {
            self.patterns.push(pattern);
        }
        self
    }

    /// The patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Would `key` be pruned?
    pub fn matches(
        &self,
        key: &str,
    ) -> bool {
        self.patterns.iter().any(|p| key.contains(p.as_str()))
    }

    /// Split a checkpoint into kept entries and pruned keys.
    pub fn partition(
        &self,
        checkpoint: Checkpoint,
    ) -> (Checkpoint, Vec<String>) {
        let mut pruned = Vec::new();
        let kept = checkpoint
            .into_iter()
            .filter(|(key, _)| {
                if self.matches(key) {
                    pruned.push(key.clone());
                    false
                } else {
                    true
                }
            })
            .collect();
        (kept, pruned)
    }

    /// Drop every matching entry.
    pub fn prune(
        &self,
        checkpoint: Checkpoint,
    ) -> Checkpoint {
        let (kept, pruned) = self.partition(checkpoint);
        if !pruned.is_empty() {
            tracing::debug!(count = pruned.len(), ?pruned, "pruned checkpoint keys");
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;

    fn scalar(v: f32) -> TensorData {
        TensorData::new(vec![v], Vec::<usize>::new())
    }

    #[test]
    fn test_prune() {
        let checkpoint = Checkpoint::new()
            .with("conv1.weight", scalar(1.0))
            .with("bn1.num_batches_tracked", scalar(2.0))
            .with("layer1.0.bn1.num_batches_tracked", scalar(3.0))
            .with("aux_logits.fc.weight", scalar(4.0));

        let pruner = Pruner::new(["num_batches_tracked"]).with_pattern("aux_logits");
        assert!(pruner.matches("bn1.num_batches_tracked"));
        assert!(!pruner.matches("conv1.weight"));

        let (kept, pruned) = pruner.partition(checkpoint);
        assert_eq!(kept.keys().collect::<Vec<_>>(), vec!["conv1.weight"]);
        assert_eq!(
            pruned,
            vec![
                "aux_logits.fc.weight",
                "bn1.num_batches_tracked",
                "layer1.0.bn1.num_batches_tracked"
            ]
        );
    }

    #[test]
    fn test_empty_patterns_are_ignored() {
        let pruner = Pruner::new(["", "x"]).with_pattern("");
        assert_eq!(pruner.patterns(), &["x".to_string()]);

        let checkpoint = Checkpoint::new().with("a", scalar(1.0));
        assert_eq!(Pruner::default().prune(checkpoint).len(), 1);
    }
}
