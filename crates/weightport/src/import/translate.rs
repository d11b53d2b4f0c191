//! # Key Translation
//!
//! [`KeyTranslator`] renames every key of a (pruned) [`Checkpoint`] into the
//! target namespace using an ordered list of [`RenameRule`]s.
//!
//! * Each key is offered to the rules in order; the first `Some` wins.
//! * Keys matched by no rule are collected and reported together.
//! * Two keys landing on one target key is an error.
//!
//! Layout transforms are checked against each tensor's rank here, but only
//! applied by [`TranslatedCheckpoint::materialize`].

use crate::checkpoint::Checkpoint;
use crate::errors::{ImportError, ImportResult};
use crate::import::layout::LayoutTransform;
use crate::import::rules::{RenameRule, Translation};
use crate::keys::KeyPath;
use crate::params::{ParamStructure, ParamTree};
use burn::prelude::Backend;
use burn::tensor::TensorData;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

/// One translated checkpoint entry.
#[derive(Debug, Clone)]
pub struct TranslatedEntry {
    /// The original checkpoint key.
    pub source_key: String,

    /// The untransformed tensor.
    pub data: TensorData,

    /// The pending layout transform.
    pub transform: Option<LayoutTransform>,

    /// The shape after `transform`.
    pub shape: Vec<usize>,
}

/// A checkpoint in the target namespace, with layout transforms pending.
#[derive(Debug, Clone, Default)]
pub struct TranslatedCheckpoint {
    entries: BTreeMap<KeyPath, TranslatedEntry>,
}

impl TranslatedCheckpoint {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the checkpoint empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookup an entry.
    pub fn get(
        &self,
        key: &KeyPath,
    ) -> Option<&TranslatedEntry> {
        self.entries.get(key)
    }

    /// Iterate over entries in target key order.
    pub fn iter(&self) -> impl Iterator<Item = (&KeyPath, &TranslatedEntry)> {
        self.entries.iter()
    }

    /// The post-transform structure; no tensor data is touched.
    pub fn structure(&self) -> ParamStructure {
        self.entries
            .iter()
            .map(|(k, e)| (k.clone(), e.shape.clone()))
            .collect()
    }

    /// Apply pending layout transforms on `device`, producing a [`ParamTree`].
    pub fn materialize<B: Backend>(
        self,
        device: &B::Device,
    ) -> ImportResult<ParamTree> {
        self.entries
            .into_iter()
            .map(|(key, entry)| {
                let data = match &entry.transform {
                    None => entry.data,
                    Some(transform) => transform
                        .apply::<B>(entry.data, device)
                        .map_err(|message| ImportError::InvalidLayout {
                            key: entry.source_key.clone(),
                            message,
                        })?,
                };
                Ok((key, data))
            })
            .collect()
    }
}

/// Ordered rename-rule list.
#[derive(Default)]
pub struct KeyTranslator {
    rules: Vec<Box<dyn RenameRule>>,
}

impl Debug for KeyTranslator {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("KeyTranslator")
            .field(
                "rules",
                &self.rules.iter().map(|r| r.describe()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl KeyTranslator {
    /// An empty translator; it maps nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`KeyTranslator::push_rule`].
    pub fn with_rule<R: RenameRule + 'static>(
        mut self,
        rule: R,
    ) -> Self {
        self.push_rule(Box::new(rule));
        self
    }

    /// Append a rule; it has lower priority than every existing rule.
    pub fn push_rule(
        &mut self,
        rule: Box<dyn RenameRule>,
    ) {
        self.rules.push(rule);
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Are there no rules?
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Translate a single key; the first matching rule wins.
    pub fn translate_key(
        &self,
        old_key: &str,
    ) -> Option<Translation> {
        let candidate = KeyPath::parse(old_key)?;
        self.rules
            .iter()
            .find_map(|rule| rule.rename(old_key, &candidate))
    }

    /// Translate every key of `checkpoint`.
    pub fn translate(
        &self,
        checkpoint: Checkpoint,
    ) -> ImportResult<TranslatedCheckpoint> {
        let mut entries: BTreeMap<KeyPath, TranslatedEntry> = BTreeMap::new();
        let mut unmapped = Vec::new();

        for (source_key, data) in checkpoint {
            let Some(Translation { key, transform }) = self.translate_key(&source_key) else {
                unmapped.push(source_key);
                continue;
            };

            if let Some(existing) = entries.get(&key) {
                return Err(ImportError::DuplicateTarget {
                    target: key,
                    first: existing.source_key.clone(),
                    second: source_key,
                });
            }

            let shape = match &transform {
                None => data.shape.clone(),
                Some(t) => t
                    .apply_shape(&data.shape)
                    .map_err(|message| ImportError::InvalidLayout {
                        key: source_key.clone(),
                        message,
                    })?,
            };

            tracing::trace!(from = %source_key, to = %key, ?transform, "renamed");
            entries.insert(
                key,
                TranslatedEntry {
                    source_key,
                    data,
                    transform,
                    shape,
                },
            );
        }

        if !unmapped.is_empty() {
            return Err(ImportError::UnmappedKeys { keys: unmapped });
        }

        tracing::debug!(entries = entries.len(), "translated checkpoint");
        Ok(TranslatedCheckpoint { entries })
    }
}
