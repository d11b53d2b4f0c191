//! # Config Prefabs for Well-Known Model Configurations
//!
//! A prefab is a named model config; it may carry a
//! [`PretrainedWeightsMap`] of weight sets published for that config.
//!
//! Pretrained weights are addressed as ``"{prefab}.{weights}"``, for example
//! ``"resnet18.tv_in1k"``.

use crate::cache::weights::{
    PretrainedWeightsDescriptor, PretrainedWeightsMap, StaticPretrainedWeightsMap,
};
use crate::errors::{ImportError, ImportResult};
use burn::config::Config;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Static builder for a [`PreFabConfig`]
pub struct StaticPreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Name of the model config prefab.
    pub name: &'static str,

    /// Description of the model config prefab.
    pub description: &'static str,

    /// Builder function for the config.
    pub builder: fn() -> C,

    /// Pretrained weights published for this config.
    pub weights: Option<&'static StaticPretrainedWeightsMap<'static>>,
}

impl<C> StaticPreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Convert to a [`PreFabConfig<C>`].
    pub fn to_prefab(&self) -> PreFabConfig<C> {
        let builder = self.builder;
        PreFabConfig {
            name: self.name.to_string(),
            description: self.description.to_string(),
            builder: Arc::new(builder),
            weights: self.weights.map(|w| w.to_map()),
        }
    }
}

impl<C> From<&StaticPreFabConfig<C>> for PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn from(config: &StaticPreFabConfig<C>) -> Self {
        config.to_prefab()
    }
}

impl<C> Debug for StaticPreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        self.to_prefab().fmt(f)
    }
}

/// A [`Config`] Well-Known Prefab.
pub struct PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Name of the model config prefab.
    pub name: String,

    /// Description of the model config prefab.
    pub description: String,

    /// Builder function for the config.
    pub builder: Arc<dyn Fn() -> C + Send + Sync>,

    /// Pretrained weights published for this config.
    pub weights: Option<PretrainedWeightsMap>,
}

impl<C> Clone for PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            builder: self.builder.clone(),
            weights: self.weights.clone(),
        }
    }
}

impl<C> Debug for PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let pretty = f.alternate();

        let type_name = std::any::type_name::<C>();
        let mut handle = f.debug_struct(&format!("PreFabConfig<{type_name}>"));

        handle
            .field("name", &self.name)
            .field("description", &self.description)
            .field(
                "weights",
                &self.weights.as_ref().map(|w| w.names()).unwrap_or_default(),
            );

        if pretty {
            handle.field("config", &self.new_config());
        }

        handle.finish()
    }
}

impl<C> PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Build a new config.
    pub fn new_config(&self) -> C {
        (self.builder)()
    }

    /// Lookup a pretrained weight set by name.
    pub fn lookup_weights(
        &self,
        name: &str,
    ) -> ImportResult<PretrainedWeightsDescriptor> {
        self.weights
            .as_ref()
            .and_then(|w| w.lookup_by_name(name))
            .ok_or_else(|| ImportError::UnknownPretrained(format!("{}.{}", self.name, name)))
    }
}

/// Static builder for a [`PreFabMap`].
pub struct StaticPreFabMap<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Name of the map.
    pub name: &'static str,

    /// Description of the map.
    pub description: &'static str,

    /// The prefabs.
    pub items: &'static [&'static StaticPreFabConfig<C>],
}

impl<C> StaticPreFabMap<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Convert to a [`PreFabMap`].
    pub fn to_prefab_map(&self) -> PreFabMap<C> {
        PreFabMap {
            name: self.name.to_string(),
            description: self.description.to_string(),
            items: self
                .items
                .iter()
                .map(|p| (p.name.to_string(), p.to_prefab()))
                .collect(),
        }
    }

    /// Lookup a prefab by name.
    pub fn lookup_prefab(
        &self,
        name: &str,
    ) -> ImportResult<PreFabConfig<C>> {
        self.items
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.to_prefab())
            .ok_or_else(|| ImportError::UnknownPretrained(name.to_string()))
    }

    /// Lookup a ``"{prefab}.{weights}"`` pair.
    pub fn lookup_pretrained(
        &self,
        name: &str,
    ) -> ImportResult<(PreFabConfig<C>, PretrainedWeightsDescriptor)> {
        let (prefab_name, weights_name) = name
            .split_once('.')
            .ok_or_else(|| ImportError::UnknownPretrained(name.to_string()))?;
        let prefab = self.lookup_prefab(prefab_name)?;
        let weights = prefab.lookup_weights(weights_name)?;
        Ok((prefab, weights))
    }

    /// All ``"{prefab}.{weights}"`` names, in declaration order.
    pub fn pretrained_names(&self) -> Vec<String> {
        self.items
            .iter()
            .flat_map(|p| {
                p.weights
                    .iter()
                    .flat_map(|w| w.items.iter())
                    .map(move |d| format!("{}.{}", p.name, d.name))
            })
            .collect()
    }
}

impl<C> Debug for StaticPreFabMap<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        self.to_prefab_map().fmt(f)
    }
}

/// A named collection of [`PreFabConfig`]s.
pub struct PreFabMap<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Name of the map.
    pub name: String,

    /// Description of the map.
    pub description: String,

    /// The prefabs, by name.
    pub items: BTreeMap<String, PreFabConfig<C>>,
}

impl<C> Debug for PreFabMap<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("PreFabMap")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("items", &self.items.values().collect::<Vec<_>>())
            .finish()
    }
}
