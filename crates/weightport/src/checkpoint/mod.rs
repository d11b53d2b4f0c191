//! # Foreign Checkpoints
//!
//! A [`Checkpoint`] is the raw, flat key space of a serialized model from a
//! foreign training framework: a sorted mapping from the original key string
//! to an `f32` [`TensorData`].
//!
//! Supported on-disk formats ([`CheckpointFormat`]):
//! * ``.safetensors`` - see [`safetensors`](mod@self::safetensors).
//! * ``.pth``, ``.pt``, ``.bin``, ``.ckpt`` - `PyTorch` pickle archives;
//!   see [`pytorch`].

pub mod pytorch;
pub mod safetensors;

use crate::errors::{ImportError, ImportResult};
use burn::tensor::TensorData;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::path::Path;

/// Checkpoint serialization formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointFormat {
    /// The ``safetensors`` format.
    SafeTensors,

    /// `PyTorch` ``torch.save`` pickle archives.
    PyTorch,
}

impl CheckpointFormat {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> ImportResult<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "safetensors" => Ok(CheckpointFormat::SafeTensors),
            "pth" | "pt" | "bin" | "ckpt" => Ok(CheckpointFormat::PyTorch),
            _ => Err(ImportError::decode(
                path.display(),
                format!("unrecognized checkpoint extension: {ext:?}"),
            )),
        }
    }
}

/// A foreign model checkpoint.
#[derive(Debug, Clone, Default)]
pub struct Checkpoint {
    entries: BTreeMap<String, TensorData>,
}

impl Checkpoint {
    /// An empty checkpoint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a checkpoint file, inferring the format from its extension.
    #[tracing::instrument(level = "debug")]
    pub fn load(path: &Path) -> ImportResult<Self> {
        let checkpoint = match CheckpointFormat::from_path(path)? {
            CheckpointFormat::SafeTensors => {
                let bytes =
                    std::fs::read(path).map_err(|e| ImportError::fetch(path.display(), e))?;
                safetensors::from_bytes(&bytes, &path.display().to_string())?
            }
            CheckpointFormat::PyTorch => pytorch::read_file(path)?,
        };

        tracing::debug!(
            path = %path.display(),
            tensors = checkpoint.len(),
            "loaded checkpoint"
        );
        Ok(checkpoint)
    }

    /// Encode the checkpoint in the ``safetensors`` format.
    pub fn to_safetensors_bytes(&self) -> ImportResult<Vec<u8>> {
        safetensors::to_bytes(self)
    }

    /// Write the checkpoint as a ``.safetensors`` file.
    pub fn save_safetensors(
        &self,
        path: &Path,
    ) -> ImportResult<()> {
        let bytes = self.to_safetensors_bytes()?;
        std::fs::write(path, bytes).map_err(|e| ImportError::fetch(path.display(), e))
    }

    /// Insert an entry.
    pub fn insert<K: Into<String>>(
        &mut self,
        key: K,
        data: TensorData,
    ) -> Option<TensorData> {
        self.entries.insert(key.into(), data)
    }

    /// Builder-style [`Checkpoint::insert`].
    pub fn with<K: Into<String>>(
        mut self,
        key: K,
        data: TensorData,
    ) -> Self {
        self.insert(key, data);
        self
    }

    /// Remove an entry.
    pub fn remove(
        &mut self,
        key: &str,
    ) -> Option<TensorData> {
        self.entries.remove(key)
    }

    /// Lookup an entry.
    pub fn get(
        &self,
        key: &str,
    ) -> Option<&TensorData> {
        self.entries.get(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the checkpoint empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate over `(key, tensor)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TensorData)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, TensorData)> for Checkpoint {
    fn from_iter<T: IntoIterator<Item = (String, TensorData)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Checkpoint {
    type Item = (String, TensorData);
    type IntoIter = btree_map::IntoIter<String, TensorData>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ImportErrorKind;
    use std::path::PathBuf;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            CheckpointFormat::from_path(&PathBuf::from("/x/model.safetensors")).unwrap(),
            CheckpointFormat::SafeTensors
        );
        for name in ["resnet18-f37072fd.pth", "a.pt", "pytorch_model.bin", "b.CKPT"] {
            assert_eq!(
                CheckpointFormat::from_path(&PathBuf::from(name)).unwrap(),
                CheckpointFormat::PyTorch
            );
        }

        let err = CheckpointFormat::from_path(&PathBuf::from("weights.npz")).unwrap_err();
        assert_eq!(err.kind(), ImportErrorKind::Fetch);
    }

    #[test]
    fn test_load_missing_file_is_fetch_error() {
        let err = Checkpoint::load(&PathBuf::from("/nonexistent/dir/w.safetensors")).unwrap_err();
        assert!(matches!(err, ImportError::Fetch { .. }));
    }

    #[test]
    fn test_save_and_load_safetensors_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.safetensors");

        let checkpoint = Checkpoint::new()
            .with(
                "conv1.weight",
                TensorData::new((0..24).map(|i| i as f32).collect::<Vec<_>>(), vec![2, 3, 2, 2]),
            )
            .with(
                "bn1.num_batches_tracked",
                TensorData::new(vec![7.0f32], Vec::<usize>::new()),
            );
        checkpoint.save_safetensors(&path).unwrap();

        let loaded = Checkpoint::load(&path).unwrap();
        assert_eq!(
            loaded.keys().collect::<Vec<_>>(),
            vec!["bn1.num_batches_tracked", "conv1.weight"]
        );

        let weight = loaded.get("conv1.weight").unwrap();
        assert_eq!(weight.shape, vec![2, 3, 2, 2]);
        assert_eq!(
            weight.to_vec::<f32>().unwrap(),
            (0..24).map(|i| i as f32).collect::<Vec<_>>()
        );

        let counter = loaded.get("bn1.num_batches_tracked").unwrap();
        assert!(counter.shape.is_empty());
        assert_eq!(counter.to_vec::<f32>().unwrap(), vec![7.0]);
    }
}
