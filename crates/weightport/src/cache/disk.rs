//! # Disk Cache Policy

use crate::errors::{ImportError, ImportResult};
use burn::config::Config;
use std::ffi::OsString;
use std::fs::{File, remove_file};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Disk cache policy.
#[derive(Config, Debug)]
pub struct DiskCacheConfig {
    /// Key for the root cache directory, under ``~/.cache``.
    #[config(default = "\"weightport\".to_string()")]
    pub root_cache_key: String,

    /// Explicit cache root; overrides ``~/.cache/{root_cache_key}``.
    #[config(default = "None")]
    pub cache_dir: Option<PathBuf>,
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskCacheConfig {
    /// Fetch the base cache directory.
    ///
    /// If the cache directory does not exist, does not create it.
    pub fn base_cache_dir(&self) -> ImportResult<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        Ok(dirs::home_dir()
            .ok_or(ImportError::MissingHomeDir)?
            .join(".cache")
            .join(&self.root_cache_key))
    }

    /// Fetch the base cache directory.
    ///
    /// If the cache directory does not exist, creates it.
    pub fn ensure_base_cache_dir(&self) -> ImportResult<PathBuf> {
        let dir = self.base_cache_dir()?;
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| ImportError::fetch(dir.display(), e))?;
        }
        Ok(dir)
    }

    /// Map a resource key to a cache path.
    ///
    /// Does not ensure that the path (or any of the parents) exist.
    pub fn resource_to_path(
        &self,
        resource_key: &[String],
    ) -> ImportResult<PathBuf> {
        let path = self.base_cache_dir()?;
        Ok(resource_key.iter().fold(path, |acc, s| acc.join(s)))
    }

    /// Map a resource key to a cache path and ensure the parent directory exists.
    pub fn ensure_resource_parent_dir(
        &self,
        resource_key: &[String],
    ) -> ImportResult<PathBuf> {
        let path = self.resource_to_path(resource_key)?;
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ImportError::fetch(parent.display(), e))?;
            }
        }
        Ok(path)
    }

    /// Fetch a resource to the cache.
    ///
    /// If the resource is already cached, no network access happens.
    pub fn fetch_resource(
        &self,
        url: &str,
        resource: &[String],
    ) -> ImportResult<PathBuf> {
        let cache_file_path = self.ensure_resource_parent_dir(resource)?;
        try_cache_download_to_path(url, cache_file_path)
    }
}

/// Download a URL resource to a given path.
///
/// If the path already exists, does nothing. The body is streamed to a
/// sibling ``.part`` file and renamed into place once complete, so a failed
/// download never leaves a cache entry behind.
///
/// # Returns
///
/// The cache path.
pub fn try_cache_download_to_path(
    url: &str,
    cache_file_path: PathBuf,
) -> ImportResult<PathBuf> {
    if cache_file_path.exists() {
        tracing::debug!(path = %cache_file_path.display(), "cache hit");
        return Ok(cache_file_path);
    }

    tracing::info!(%url, path = %cache_file_path.display(), "downloading weights");

    let response = ureq::get(url).call().map_err(|e| {
        let message = match e {
            ureq::Error::Status(code, _) => format!("HTTP {code}"),
            other => other.to_string(),
        };
        ImportError::fetch(url, io::Error::other(message))
    })?;

    let part_path = part_file_path(&cache_file_path);
    copy_or_remove(&mut response.into_reader(), &part_path)?;
    std::fs::rename(&part_path, &cache_file_path).map_err(|e| {
        let _ = remove_file(&part_path);
        ImportError::fetch(cache_file_path.display(), e)
    })?;

    Ok(cache_file_path)
}

/// The in-progress download path for `path`.
fn part_file_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Stream `reader` to `path`; on failure remove the partial file.
fn copy_or_remove<R: Read>(
    reader: &mut R,
    path: &Path,
) -> ImportResult<()> {
    let result = File::create(path).and_then(|mut file| {
        io::copy(reader, &mut file)?;
        file.flush()
    });
    if let Err(e) = result {
        let _ = remove_file(path);
        return Err(ImportError::fetch(path.display(), e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_dir_override() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCacheConfig::new().with_cache_dir(Some(dir.path().to_path_buf()));

        assert_eq!(cache.base_cache_dir().unwrap(), dir.path());
        assert_eq!(
            cache
                .resource_to_path(&["weights".to_string(), "a.pth".to_string()])
                .unwrap(),
            dir.path().join("weights").join("a.pth")
        );
    }

    #[test]
    fn test_default_root() {
        let cache = DiskCacheConfig::default();
        assert_eq!(cache.root_cache_key, "weightport");
        if let Ok(dir) = cache.base_cache_dir() {
            assert!(dir.ends_with(".cache/weightport"));
        }
    }

    #[test]
    fn test_cached_resource_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCacheConfig::new().with_cache_dir(Some(dir.path().join("nested")));
        let resource = vec!["weights".to_string(), "model.safetensors".to_string()];

        let path = cache.ensure_resource_parent_dir(&resource).unwrap();
        assert!(path.parent().unwrap().exists());
        std::fs::write(&path, b"cached").unwrap();

        // The url is unreachable; a cache hit must not touch it.
        let fetched = cache
            .fetch_resource("http://invalid.invalid/model.safetensors", &resource)
            .unwrap();
        assert_eq!(fetched, path);
        assert_eq!(std::fs::read(&fetched).unwrap(), b"cached");
    }

    #[test]
    fn test_write_failure_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-parent").join("w.pth");
        let err = copy_or_remove(&mut &b"abc"[..], &path).unwrap_err();
        assert!(matches!(err, ImportError::Fetch { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_part_file_path() {
        assert_eq!(
            part_file_path(Path::new("/cache/weights/resnet18.pth")),
            PathBuf::from("/cache/weights/resnet18.pth.part")
        );
    }

    #[test]
    fn test_unreachable_url_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCacheConfig::new().with_cache_dir(Some(dir.path().to_path_buf()));
        let resource = vec!["weights".to_string(), "x.pth".to_string()];

        let err = cache
            .fetch_resource("http://127.0.0.1:1/x.pth", &resource)
            .unwrap_err();
        assert_eq!(err.kind(), crate::errors::ImportErrorKind::Fetch);

        let path = cache.resource_to_path(&resource).unwrap();
        assert!(!path.exists());
        assert!(!part_file_path(&path).exists());
    }
}
