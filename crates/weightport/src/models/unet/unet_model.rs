//! # `UNet` Model

use crate::keys::KeyPath;
use crate::layers::SourcedInit;
use crate::models::ModelConfig;
use crate::models::unet::layers::{
    DoubleConv, DoubleConvConfig, Down, DownConfig, OutConv, OutConvConfig, Up, UpConfig,
};
use crate::params::ParamSource;
use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};

/// Number of [`Down`] (and [`Up`]) stages.
pub const UNET_DEPTH: usize = 4;

/// [`UNet`] Config.
#[derive(Config, Debug)]
pub struct UNetConfig {
    /// Input image channels.
    pub in_channels: usize,

    /// Output classes; channels of the logit map.
    pub num_classes: usize,

    /// Width of the first stage; doubled at each [`Down`].
    #[config(default = 64)]
    pub base_channels: usize,

    /// Bilinear upsampling, rather than transposed convolutions.
    #[config(default = true)]
    pub bilinear: bool,
}

impl UNetConfig {
    /// Stage widths, ``[c, 2c, 4c, 8c, 16c]``.
    pub fn widths(&self) -> [usize; UNET_DEPTH + 1] {
        let mut widths = [self.base_channels; UNET_DEPTH + 1];
        for idx in 1..widths.len() {
            widths[idx] = widths[idx - 1] * 2;
        }
        widths
    }

    /// Channel reduction of the bottleneck and the up stages.
    ///
    /// Bilinear upsampling cannot halve channels, so the convolutions do.
    fn factor(&self) -> usize {
        if self.bilinear { 2 } else { 1 }
    }

    fn down_configs(&self) -> Vec<DownConfig> {
        let widths = self.widths();
        (0..UNET_DEPTH)
            .map(|idx| {
                let out = if idx == UNET_DEPTH - 1 {
                    widths[idx + 1] / self.factor()
                } else {
                    widths[idx + 1]
                };
                DownConfig::new(widths[idx], out)
            })
            .collect()
    }

    fn up_configs(&self) -> Vec<UpConfig> {
        let widths = self.widths();
        (0..UNET_DEPTH)
            .rev()
            .map(|idx| {
                let out = if idx == 0 {
                    widths[0]
                } else {
                    widths[idx] / self.factor()
                };
                UpConfig::new(widths[idx + 1], out).with_bilinear(self.bilinear)
            })
            .collect()
    }
}

impl ModelConfig for UNetConfig {
    type Model<B: Backend> = UNet<B>;

    /// Parameter prefixes: ``inc``, ``down{1..4}``, ``up{1..4}``, ``outc``.
    fn init_with<S: ParamSource>(
        &self,
        source: &mut S,
    ) -> Result<UNet<S::Backend>, S::Error> {
        let inc = DoubleConvConfig::new(self.in_channels, self.base_channels)
            .init_from(source, &KeyPath::root("inc"))?;

        let downs = self
            .down_configs()
            .iter()
            .enumerate()
            .map(|(idx, cfg)| cfg.init_from(source, &KeyPath::root(&format!("down{}", idx + 1))))
            .collect::<Result<Vec<_>, _>>()?;

        let ups = self
            .up_configs()
            .iter()
            .enumerate()
            .map(|(idx, cfg)| cfg.init_from(source, &KeyPath::root(&format!("up{}", idx + 1))))
            .collect::<Result<Vec<_>, _>>()?;

        let outc = OutConvConfig::new(self.base_channels, self.num_classes)
            .init_from(source, &KeyPath::root("outc"))?;

        Ok(UNet {
            inc,
            downs,
            ups,
            outc,
        })
    }
}

/// `UNet` segmentation model.
#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    /// Input [`DoubleConv`].
    pub inc: DoubleConv<B>,

    /// Encoder stages.
    pub downs: Vec<Down<B>>,

    /// Decoder stages, deepest first.
    pub ups: Vec<Up<B>>,

    /// Logit projection.
    pub outc: OutConv<B>,
}

impl<B: Backend> UNet<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes, height, width]`` logits.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let mut skips = Vec::with_capacity(self.downs.len());
        let x = self.downs.iter().fold(self.inc.forward(input), |x, down| {
            skips.push(x.clone());
            down.forward(x)
        });

        let x = self
            .ups
            .iter()
            .zip(skips.into_iter().rev())
            .fold(x, |x, (up, skip)| up.forward(x, skip));

        self.outc.forward(x)
    }
}
