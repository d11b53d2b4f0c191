//! # Weight Caches and Prefab Catalogs
//!
//! * [`disk`] - the read-through download cache.
//! * [`weights`] - [`WeightSource`](weights::WeightSource) resolution, and
//!   pretrained weight descriptors.
//! * [`prefabs`] - named well-known model configs.

pub mod disk;
pub mod prefabs;
pub mod weights;

use crate::checkpoint::Checkpoint;
use crate::errors::ImportResult;
use disk::DiskCacheConfig;
use weights::WeightSource;

/// Resolve a weight source through `disk_cache`, and load the checkpoint.
pub fn load_checkpoint(
    source: &WeightSource,
    disk_cache: &DiskCacheConfig,
) -> ImportResult<Checkpoint> {
    let path = source.resolve(disk_cache)?;
    Checkpoint::load(&path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;

    #[test]
    fn test_load_checkpoint_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.safetensors");
        Checkpoint::new()
            .with("fc.bias", TensorData::new(vec![1.0f32, 2.0], vec![2]))
            .save_safetensors(&path)
            .unwrap();

        let cache = DiskCacheConfig::new().with_cache_dir(Some(dir.path().join("cache")));
        let checkpoint = load_checkpoint(&WeightSource::Path(path), &cache).unwrap();
        assert_eq!(checkpoint.keys().collect::<Vec<_>>(), vec!["fc.bias"]);
    }
}
