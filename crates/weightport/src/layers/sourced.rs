//! # Source-Initialized `burn` Layers
//!
//! [`SourcedInit`] builds a module under a [`KeyPath`] prefix, pulling each
//! parameter from a [`ParamSource`].
//!
//! The stock `burn` layers are covered here. Parameter names follow the
//! `burn` field names:
//!
//! | layer | parameters |
//! |-------|------------|
//! | [`Conv2d`] | ``weight [out, in/groups, kh, kw]``, ``bias [out]`` |
//! | [`ConvTranspose2d`] | ``weight [in, out/groups, kh, kw]``, ``bias [out]`` |
//! | [`BatchNorm`] | ``gamma``, ``beta``, ``running_mean``, ``running_var`` |
//! | [`Linear`] | ``weight [in, out]``, ``bias [out]`` |
//! | [`LayerNorm`] | ``gamma``, ``beta`` |

use crate::keys::KeyPath;
use crate::params::{InitSource, ParamInit, ParamSource, ParamStructure, infallible};
use burn::module::RunningState;
use burn::nn::conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig};
use burn::nn::{
    BatchNorm, BatchNormConfig, Initializer, LayerNorm, LayerNormConfig, Linear, LinearConfig,
};
use burn::prelude::Backend;

/// A config which can build its module from a [`ParamSource`].
pub trait SourcedInit {
    /// The module type, per backend.
    type Module<B: Backend>;

    /// Build the module; parameters are requested under `key`.
    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<Self::Module<S::Backend>, S::Error>;

    /// The parameter structure of the module built under `key`.
    fn structure_at<B: Backend>(
        &self,
        key: &KeyPath,
        device: &B::Device,
    ) -> ParamStructure {
        let mut source = InitSource::<B>::new(device);
        let _module = infallible(self.init_from(&mut source, key));
        source.into_structure()
    }

    /// Build a freshly initialized module under `key`.
    fn init_at<B: Backend>(
        &self,
        key: &KeyPath,
        device: &B::Device,
    ) -> Self::Module<B> {
        infallible(self.init_from(&mut InitSource::<B>::new(device), key))
    }
}

impl SourcedInit for Conv2dConfig {
    type Module<B: Backend> = Conv2d<B>;

    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<Conv2d<S::Backend>, S::Error> {
        let [channels_in, channels_out] = self.channels;
        let [kernel_h, kernel_w] = self.kernel_size;
        let fan_in = channels_in / self.groups * kernel_h * kernel_w;
        let fan_out = channels_out / self.groups * kernel_h * kernel_w;
        let init = ParamInit::new(self.initializer.clone()).with_fans(fan_in, fan_out);

        let weight = source.param(
            &key.child("weight"),
            [channels_out, channels_in / self.groups, kernel_h, kernel_w],
            &init,
        )?;
        let bias = if self.bias {
            Some(source.param(&key.child("bias"), [channels_out], &init)?)
        } else {
            None
        };

        let mut conv = self
            .clone()
            .with_initializer(Initializer::Zeros)
            .init(source.device());
        conv.weight = weight;
        conv.bias = bias;
        Ok(conv)
    }
}

impl SourcedInit for ConvTranspose2dConfig {
    type Module<B: Backend> = ConvTranspose2d<B>;

    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<ConvTranspose2d<S::Backend>, S::Error> {
        let [channels_in, channels_out] = self.channels;
        let [kernel_h, kernel_w] = self.kernel_size;
        let fan_in = channels_out / self.groups * kernel_h * kernel_w;
        let fan_out = channels_in / self.groups * kernel_h * kernel_w;
        let init = ParamInit::new(self.initializer.clone()).with_fans(fan_in, fan_out);

        let weight = source.param(
            &key.child("weight"),
            [channels_in, channels_out / self.groups, kernel_h, kernel_w],
            &init,
        )?;
        let bias = if self.bias {
            Some(source.param(&key.child("bias"), [channels_out], &init)?)
        } else {
            None
        };

        let mut conv = self
            .clone()
            .with_initializer(Initializer::Zeros)
            .init(source.device());
        conv.weight = weight;
        conv.bias = bias;
        Ok(conv)
    }
}

impl SourcedInit for BatchNormConfig {
    type Module<B: Backend> = BatchNorm<B, 2>;

    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<BatchNorm<S::Backend, 2>, S::Error> {
        let n = self.num_features;
        let gamma = source.param(&key.child("gamma"), [n], &ParamInit::ones())?;
        let beta = source.param(&key.child("beta"), [n], &ParamInit::zeros())?;
        let running_mean = source.param(&key.child("running_mean"), [n], &ParamInit::zeros())?;
        let running_var = source.param(&key.child("running_var"), [n], &ParamInit::ones())?;

        let mut norm = self.init(source.device());
        norm.gamma = gamma;
        norm.beta = beta;
        norm.running_mean = RunningState::new(running_mean.val().detach());
        norm.running_var = RunningState::new(running_var.val().detach());
        Ok(norm)
    }
}

impl SourcedInit for LinearConfig {
    type Module<B: Backend> = Linear<B>;

    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<Linear<S::Backend>, S::Error> {
        let init =
            ParamInit::new(self.initializer.clone()).with_fans(self.d_input, self.d_output);

        let weight = source.param(&key.child("weight"), [self.d_input, self.d_output], &init)?;
        let bias = if self.bias {
            Some(source.param(&key.child("bias"), [self.d_output], &init)?)
        } else {
            None
        };

        let mut linear = self
            .clone()
            .with_initializer(Initializer::Zeros)
            .init(source.device());
        linear.weight = weight;
        linear.bias = bias;
        Ok(linear)
    }
}

impl SourcedInit for LayerNormConfig {
    type Module<B: Backend> = LayerNorm<B>;

    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<LayerNorm<S::Backend>, S::Error> {
        let gamma = source.param(&key.child("gamma"), [self.d_model], &ParamInit::ones())?;
        let beta = source.param(&key.child("beta"), [self.d_model], &ParamInit::zeros())?;

        let mut norm = self.init(source.device());
        norm.gamma = gamma;
        norm.beta = beta;
        Ok(norm)
    }
}
