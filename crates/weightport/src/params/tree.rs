//! # Parameter Trees
//!
//! A [`ParamTree`] holds the concrete tensors for a model, keyed by
//! [`KeyPath`]. Nesting is carried by path prefixes; [`ParamTree::summary`]
//! renders the nested namespace view.

use crate::keys::KeyPath;
use crate::params::structure::ParamStructure;
use burn::tensor::TensorData;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::collections::btree_map;

/// Concrete parameter tensors, keyed by [`KeyPath`].
#[derive(Debug, Clone, Default)]
pub struct ParamTree {
    entries: BTreeMap<KeyPath, TensorData>,
}

impl ParamTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tensor.
    ///
    /// # Returns
    ///
    /// The previous tensor for the key, if any.
    pub fn insert(
        &mut self,
        key: KeyPath,
        data: TensorData,
    ) -> Option<TensorData> {
        self.entries.insert(key, data)
    }

    /// Lookup a tensor.
    pub fn get(
        &self,
        key: &KeyPath,
    ) -> Option<&TensorData> {
        self.entries.get(key)
    }

    /// Remove a tensor.
    pub fn remove(
        &mut self,
        key: &KeyPath,
    ) -> Option<TensorData> {
        self.entries.remove(key)
    }

    /// Does the tree contain `key`?
    pub fn contains(
        &self,
        key: &KeyPath,
    ) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of tensors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the tree empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, tensor)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&KeyPath, &TensorData)> {
        self.entries.iter()
    }

    /// Iterate over keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &KeyPath> {
        self.entries.keys()
    }

    /// The key set and shapes of this tree.
    pub fn structure(&self) -> ParamStructure {
        self.entries
            .iter()
            .map(|(k, d)| (k.clone(), d.shape.clone()))
            .collect()
    }

    /// Render the tree as nested JSON namespaces with ``_shape`` leaves.
    ///
    /// ```text
    /// {"stem": {"conv": {"weight": {"_shape": [64, 3, 7, 7]}}}}
    /// ```
    pub fn summary(&self) -> Value {
        let mut root = Map::new();
        for (key, data) in &self.entries {
            let mut node = &mut root;
            let (leaf, namespaces) = match key.segments().split_last() {
                Some(split) => split,
                None => continue,
            };
            for segment in namespaces {
                let entry = node
                    .entry(segment.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !entry.is_object() {
                    *entry = Value::Object(Map::new());
                }
                node = match entry {
                    Value::Object(obj) => obj,
                    _ => unreachable!(),
                };
            }

            let shape = Value::Array(data.shape.iter().copied().map(Value::from).collect());
            match node.get_mut(leaf) {
                Some(Value::Object(obj)) => {
                    obj.insert("_shape".to_string(), shape);
                }
                _ => {
                    let mut obj = Map::new();
                    obj.insert("_shape".to_string(), shape);
                    node.insert(leaf.clone(), Value::Object(obj));
                }
            }
        }
        Value::Object(root)
    }
}

impl FromIterator<(KeyPath, TensorData)> for ParamTree {
    fn from_iter<T: IntoIterator<Item = (KeyPath, TensorData)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ParamTree {
    type Item = (KeyPath, TensorData);
    type IntoIter = btree_map::IntoIter<KeyPath, TensorData>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn zeros(shape: &[usize]) -> TensorData {
        TensorData::new(vec![0.0f32; shape.iter().product()], shape.to_vec())
    }

    #[test]
    fn test_tree_structure() {
        let tree: ParamTree = [
            (KeyPath::parse("a/w").unwrap(), zeros(&[2, 3])),
            (KeyPath::parse("a/b").unwrap(), zeros(&[3])),
        ]
        .into_iter()
        .collect();

        assert_eq!(tree.len(), 2);
        assert_eq!(
            tree.structure(),
            ParamStructure::new().with("a/w", &[2, 3]).with("a/b", &[3])
        );
    }

    #[test]
    fn test_summary() {
        let mut tree = ParamTree::new();
        tree.insert(KeyPath::parse("stem/conv/weight").unwrap(), zeros(&[4, 3, 1, 1]));
        tree.insert(KeyPath::parse("stem/norm/gamma").unwrap(), zeros(&[4]));
        tree.insert(KeyPath::parse("head/bias").unwrap(), zeros(&[2]));

        assert_eq!(
            tree.summary(),
            json!({
                "head": {"bias": {"_shape": [2]}},
                "stem": {
                    "conv": {"weight": {"_shape": [4, 3, 1, 1]}},
                    "norm": {"gamma": {"_shape": [4]}},
                },
            })
        );
    }
}
