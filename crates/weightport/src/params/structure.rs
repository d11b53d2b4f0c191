//! # Parameter Structure
//!
//! The key set and per-key shapes a model expects; the template a translated
//! checkpoint is validated against.

use crate::keys::KeyPath;
use std::collections::BTreeMap;
use std::collections::btree_map;

/// Expected parameter shapes, keyed by [`KeyPath`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamStructure {
    shapes: BTreeMap<KeyPath, Vec<usize>>,
}

impl ParamStructure {
    /// An empty structure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a shape.
    ///
    /// # Returns
    ///
    /// The previous shape for the key, if any.
    pub fn insert(
        &mut self,
        key: KeyPath,
        shape: Vec<usize>,
    ) -> Option<Vec<usize>> {
        self.shapes.insert(key, shape)
    }

    /// Builder-style [`ParamStructure::insert`].
    pub fn with(
        mut self,
        key: &str,
        shape: &[usize],
    ) -> Self {
        let key = KeyPath::parse(key).unwrap_or_else(|| panic!("invalid key: {key:?}"));
        self.insert(key, shape.to_vec());
        self
    }

    /// Remove a key.
    pub fn remove(
        &mut self,
        key: &KeyPath,
    ) -> Option<Vec<usize>> {
        self.shapes.remove(key)
    }

    /// Lookup a shape.
    pub fn get(
        &self,
        key: &KeyPath,
    ) -> Option<&[usize]> {
        self.shapes.get(key).map(Vec::as_slice)
    }

    /// Does the structure contain `key`?
    pub fn contains(
        &self,
        key: &KeyPath,
    ) -> bool {
        self.shapes.contains_key(key)
    }

    /// Number of parameter tensors.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Is the structure empty?
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Total number of scalar parameters.
    pub fn num_params(&self) -> usize {
        self.shapes.values().map(|s| s.iter().product::<usize>()).sum()
    }

    /// Iterate over `(key, shape)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&KeyPath, &[usize])> {
        self.shapes.iter().map(|(k, s)| (k, s.as_slice()))
    }

    /// Iterate over keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &KeyPath> {
        self.shapes.keys()
    }

    /// The sub-structure under a namespace prefix.
    pub fn scoped(
        &self,
        prefix: &KeyPath,
    ) -> Self {
        self.shapes
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, s)| (k.clone(), s.clone()))
            .collect()
    }
}

impl FromIterator<(KeyPath, Vec<usize>)> for ParamStructure {
    fn from_iter<T: IntoIterator<Item = (KeyPath, Vec<usize>)>>(iter: T) -> Self {
        Self {
            shapes: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ParamStructure {
    type Item = (KeyPath, Vec<usize>);
    type IntoIter = btree_map::IntoIter<KeyPath, Vec<usize>>;

    fn into_iter(self) -> Self::IntoIter {
        self.shapes.into_iter()
    }
}
