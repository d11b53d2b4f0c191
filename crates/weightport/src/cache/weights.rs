//! # Weight Sources and Pretrained Weight Descriptors

use crate::cache::disk::DiskCacheConfig;
use crate::errors::{ImportError, ImportResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

const X25: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_IBM_SDLC);

/// Where a checkpoint lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightSource {
    /// A remote URL; fetched through the disk cache.
    ///
    /// ``file://`` URLs name local files and bypass the cache.
    Url(String),

    /// A local file.
    Path(PathBuf),
}

impl WeightSource {
    /// Interpret a user-supplied location.
    ///
    /// Strings with a ``scheme://`` prefix are URLs; everything else is a path.
    pub fn parse(location: &str) -> Self {
        if location.contains("://") {
            WeightSource::Url(location.to_string())
        } else {
            WeightSource::Path(PathBuf::from(location))
        }
    }

    /// Resolve to a local file, downloading into `disk_cache` if needed.
    pub fn resolve(
        &self,
        disk_cache: &DiskCacheConfig,
    ) -> ImportResult<PathBuf> {
        match self {
            WeightSource::Path(path) => require_file(path.clone()),
            WeightSource::Url(url) => match url.strip_prefix("file://") {
                Some(path) => require_file(PathBuf::from(path)),
                None => {
                    let cache_key = url_to_cache_key(None, url)?;
                    let resource = pretrained_weights_resource_key(&cache_key);
                    disk_cache.fetch_resource(url, &resource)
                }
            },
        }
    }
}

impl Display for WeightSource {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            WeightSource::Url(url) => write!(f, "{url}"),
            WeightSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

fn require_file(path: PathBuf) -> ImportResult<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(ImportError::fetch(
            path.display(),
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such weights file"),
        ))
    }
}

/// Returns a local path to a model weights file.
///
/// If the file is not cached, it will be downloaded from the given URL into
/// the default [`DiskCacheConfig`].
pub fn fetch_model_weights<S: AsRef<str>>(url: S) -> ImportResult<PathBuf> {
    let cache_key = url_to_cache_key(Some("model"), url.as_ref())?;
    let resource = pretrained_weights_resource_key(&cache_key);

    let disk_cache = DiskCacheConfig::default();
    disk_cache.fetch_resource(url.as_ref(), &resource)
}

/// Build a cache key (bare cache file name) from a name and URL.
///
/// The key is ``{name}-{url crc hash}-{url basename}``.
pub fn url_to_cache_key(
    name: Option<&str>,
    url: &str,
) -> ImportResult<String> {
    let hash = X25.checksum(url.as_bytes()).to_string();
    let base_name = match url.rsplit_once('/') {
        Some((_, base)) if !base.is_empty() => base,
        _ => {
            return Err(ImportError::fetch(
                url,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "url has no file name"),
            ));
        }
    };
    Ok(match name {
        Some(n) => format!("{n}-{hash}-{base_name}"),
        None => format!("{hash}-{base_name}"),
    })
}

/// Get the cache resource key for a pretrained weights file.
///
/// # Arguments
///
/// - `cache_key`: the cache key (the bare cache file name).
///
/// # Returns
///
/// The cache resource key.
pub fn pretrained_weights_resource_key(cache_key: &str) -> Vec<String> {
    vec!["weights".to_string(), cache_key.to_string()]
}

/// Static [`PretrainedWeightsDescriptor`] provider.
#[derive(Debug)]
pub struct StaticPretrainedWeightsDescriptor<'a> {
    /// Name of the weights.
    pub name: &'a str,

    /// Description of the weights.
    pub description: &'a str,

    /// License.
    pub license: Option<&'a str>,

    /// Source URL.
    pub origin: Option<&'a str>,

    /// URLs to download the weights from.
    pub urls: &'a [&'a str],
}

impl StaticPretrainedWeightsDescriptor<'_> {
    /// Convert to a [`PretrainedWeightsDescriptor`].
    pub fn to_descriptor(&self) -> PretrainedWeightsDescriptor {
        PretrainedWeightsDescriptor {
            name: self.name.to_string(),
            description: self.description.to_string(),
            license: self.license.map(|s| s.to_string()),
            origin: self.origin.map(|s| s.to_string()),
            urls: self.urls.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl From<&StaticPretrainedWeightsDescriptor<'_>> for PretrainedWeightsDescriptor {
    fn from(descriptor: &StaticPretrainedWeightsDescriptor) -> Self {
        descriptor.to_descriptor()
    }
}

/// A descriptor for a pretrained weights file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PretrainedWeightsDescriptor {
    /// Name of the weights.
    pub name: String,

    /// Description of the weights.
    pub description: String,

    /// License.
    pub license: Option<String>,

    /// Source URL.
    pub origin: Option<String>,

    /// URLs to download the weights from.
    pub urls: Vec<String>,
}

impl PretrainedWeightsDescriptor {
    fn primary_url(&self) -> ImportResult<&str> {
        self.urls
            .first()
            .map(String::as_str)
            .ok_or_else(|| ImportError::UnknownPretrained(format!("{} has no urls", self.name)))
    }

    /// The primary weight source.
    pub fn source(&self) -> ImportResult<WeightSource> {
        Ok(WeightSource::Url(self.primary_url()?.to_string()))
    }

    /// Cache key.
    ///
    /// The key is ``{name}-{url crc hash}-{url basename}``.
    pub fn cache_key(&self) -> ImportResult<String> {
        url_to_cache_key(Some(&self.name), self.primary_url()?)
    }

    /// Read-through cache the model weights.
    ///
    /// # Returns
    ///
    /// The disk location of the cached weights.
    pub fn fetch_weights_to_disk_cache(
        &self,
        disk_cache: &DiskCacheConfig,
    ) -> ImportResult<PathBuf> {
        let url = self.primary_url()?;
        if url.starts_with("file://") {
            return self.source()?.resolve(disk_cache);
        }
        let resource = pretrained_weights_resource_key(&self.cache_key()?);
        disk_cache.fetch_resource(url, &resource)
    }
}

/// Static [`PretrainedWeightsMap`] builder.
#[derive(Debug)]
pub struct StaticPretrainedWeightsMap<'a> {
    /// List of static descriptors.
    pub items: &'a [&'a StaticPretrainedWeightsDescriptor<'a>],
}

impl StaticPretrainedWeightsMap<'_> {
    /// Convert to a [`PretrainedWeightsMap`].
    pub fn to_map(&self) -> PretrainedWeightsMap {
        PretrainedWeightsMap {
            items: self
                .items
                .iter()
                .map(|d| {
                    let desc = d.to_descriptor();
                    (desc.name.clone(), desc)
                })
                .collect(),
        }
    }
}

impl<'a> From<&StaticPretrainedWeightsMap<'a>> for PretrainedWeightsMap {
    fn from(map: &StaticPretrainedWeightsMap<'a>) -> Self {
        map.to_map()
    }
}

/// Directory of [`PretrainedWeightsDescriptor`]s.
#[derive(Debug, Clone, Default)]
pub struct PretrainedWeightsMap {
    /// Map of descriptors.
    pub items: BTreeMap<String, PretrainedWeightsDescriptor>,
}

impl PretrainedWeightsMap {
    /// Lookup a descriptor by name.
    pub fn lookup_by_name(
        &self,
        name: &str,
    ) -> Option<PretrainedWeightsDescriptor> {
        self.items.get(name).cloned()
    }

    /// Lookup a descriptor.
    pub fn try_lookup_by_name(
        &self,
        name: &str,
    ) -> ImportResult<PretrainedWeightsDescriptor> {
        self.lookup_by_name(name)
            .ok_or_else(|| ImportError::UnknownPretrained(name.to_string()))
    }

    /// The weight names, in order.
    pub fn names(&self) -> Vec<&str> {
        self.items.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ImportErrorKind;

    static TINY: StaticPretrainedWeightsDescriptor = StaticPretrainedWeightsDescriptor {
        name: "tv_in1k",
        description: "some description of my model.",
        license: Some("MIT"),
        origin: Some("https://github.com/my_org/my_model"),
        urls: &["https://example.com/models/tiny-0123.pth", "bar"],
    };

    #[test]
    fn test_static_descriptor_to_descriptor() {
        let d_desc = TINY.to_descriptor();

        assert_eq!(d_desc.name, TINY.name.to_string());
        assert_eq!(d_desc.description, TINY.description.to_string());
        assert_eq!(d_desc.license.as_deref(), Some("MIT"));
        assert_eq!(
            d_desc.urls,
            TINY.urls
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<String>>()
        );
    }

    #[test]
    fn test_cache_key() {
        let url = "https://download.pytorch.org/models/resnet18-f37072fd.pth";
        let hash = X25.checksum(url.as_bytes());

        assert_eq!(
            url_to_cache_key(Some("resnet18"), url).unwrap(),
            format!("resnet18-{hash}-resnet18-f37072fd.pth")
        );
        assert_eq!(
            url_to_cache_key(None, url).unwrap(),
            format!("{hash}-resnet18-f37072fd.pth")
        );
        assert!(url_to_cache_key(None, "https://example.com/").is_err());

        let key = TINY.to_descriptor().cache_key().unwrap();
        assert!(key.starts_with("tv_in1k-"));
        assert!(key.ends_with("-tiny-0123.pth"));
    }

    #[test]
    fn test_weight_source_parse() {
        assert_eq!(
            WeightSource::parse("https://example.com/w.pth"),
            WeightSource::Url("https://example.com/w.pth".to_string())
        );
        assert_eq!(
            WeightSource::parse("/tmp/w.pth"),
            WeightSource::Path(PathBuf::from("/tmp/w.pth"))
        );
    }

    #[test]
    fn test_weight_source_resolve_local() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCacheConfig::new().with_cache_dir(Some(dir.path().join("cache")));
        let file = dir.path().join("w.safetensors");
        std::fs::write(&file, b"x").unwrap();

        assert_eq!(
            WeightSource::Path(file.clone()).resolve(&cache).unwrap(),
            file
        );
        assert_eq!(
            WeightSource::Url(format!("file://{}", file.display()))
                .resolve(&cache)
                .unwrap(),
            file
        );

        let missing = WeightSource::Path(dir.path().join("missing.pth"))
            .resolve(&cache)
            .unwrap_err();
        assert_eq!(missing.kind(), ImportErrorKind::Fetch);

        let missing = WeightSource::Url("file:///nonexistent/w.pth".to_string())
            .resolve(&cache)
            .unwrap_err();
        assert!(matches!(missing, ImportError::Fetch { .. }));
    }

    #[test]
    fn test_weight_source_resolve_cached_url() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCacheConfig::new().with_cache_dir(Some(dir.path().to_path_buf()));
        let url = "http://invalid.invalid/models/w.safetensors";

        let key = url_to_cache_key(None, url).unwrap();
        let cached = cache
            .ensure_resource_parent_dir(&pretrained_weights_resource_key(&key))
            .unwrap();
        std::fs::write(&cached, b"x").unwrap();

        assert_eq!(
            WeightSource::Url(url.to_string()).resolve(&cache).unwrap(),
            cached
        );
    }

    #[test]
    fn test_weights_map_lookup() {
        let map = StaticPretrainedWeightsMap { items: &[&TINY] }.to_map();
        assert_eq!(map.names(), vec!["tv_in1k"]);
        assert!(map.lookup_by_name("tv_in1k").is_some());

        let err = map.try_lookup_by_name("a1_in1k").unwrap_err();
        assert!(matches!(err, ImportError::UnknownPretrained(_)));
    }
}
