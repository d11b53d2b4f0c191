//! # `UNet` Building Blocks
//!
//! Parameter keys follow the common `PyTorch` `UNet` state-dict layout, with
//! `burn` leaf names; see [`super`] for the full table.

use crate::keys::KeyPath;
use crate::layers::SourcedInit;
use crate::params::ParamSource;
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig};
use burn::nn::interpolate::{Interpolate2d, Interpolate2dConfig, InterpolateMode};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::prelude::{Backend, Tensor};
use burn::tensor::activation::relu;

/// [`DoubleConv`] Config.
#[derive(Config, Debug)]
pub struct DoubleConvConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels.
    pub out_channels: usize,

    /// Channels between the two convolutions; defaults to `out_channels`.
    #[config(default = "None")]
    pub mid_channels: Option<usize>,
}

impl DoubleConvConfig {
    /// The effective middle width.
    pub fn mid(&self) -> usize {
        self.mid_channels.unwrap_or(self.out_channels)
    }
}

fn conv3x3(
    in_channels: usize,
    out_channels: usize,
) -> Conv2dConfig {
    Conv2dConfig::new([in_channels, out_channels], [3, 3])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .with_bias(false)
}

impl SourcedInit for DoubleConvConfig {
    type Module<B: Backend> = DoubleConv<B>;

    /// Parameters live under ``{key}/double_conv/{0,1,3,4}``.
    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<DoubleConv<S::Backend>, S::Error> {
        let key = key.child("double_conv");
        Ok(DoubleConv {
            conv1: conv3x3(self.in_channels, self.mid()).init_from(source, &key.child(0))?,
            norm1: BatchNormConfig::new(self.mid()).init_from(source, &key.child(1))?,
            conv2: conv3x3(self.mid(), self.out_channels).init_from(source, &key.child(3))?,
            norm2: BatchNormConfig::new(self.out_channels).init_from(source, &key.child(4))?,
        })
    }
}

/// ``(conv 3x3 => BN => ReLU) * 2``
#[derive(Module, Debug)]
pub struct DoubleConv<B: Backend> {
    /// First convolution.
    pub conv1: Conv2d<B>,

    /// First norm.
    pub norm1: BatchNorm<B, 2>,

    /// Second convolution.
    pub conv2: Conv2d<B>,

    /// Second norm.
    pub norm2: BatchNorm<B, 2>,
}

impl<B: Backend> DoubleConv<B> {
    /// Forward Pass.
    ///
    /// ``[batch, in_channels, h, w] -> [batch, out_channels, h, w]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = relu(self.norm1.forward(self.conv1.forward(input)));
        relu(self.norm2.forward(self.conv2.forward(x)))
    }
}

/// [`Down`] Config.
#[derive(Config, Debug)]
pub struct DownConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels.
    pub out_channels: usize,
}

impl SourcedInit for DownConfig {
    type Module<B: Backend> = Down<B>;

    /// Parameters live under ``{key}/maxpool_conv/1``.
    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<Down<S::Backend>, S::Error> {
        Ok(Down {
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            conv: DoubleConvConfig::new(self.in_channels, self.out_channels)
                .init_from(source, &key.child("maxpool_conv").child(1))?,
        })
    }
}

/// Downscaling with a 2x2 max-pool, then [`DoubleConv`].
#[derive(Module, Debug)]
pub struct Down<B: Backend> {
    /// 2x2/2 max-pool.
    pub pool: MaxPool2d,

    /// Double convolution.
    pub conv: DoubleConv<B>,
}

impl<B: Backend> Down<B> {
    /// Forward Pass.
    ///
    /// ``[batch, in_channels, h, w] -> [batch, out_channels, h / 2, w / 2]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.conv.forward(self.pool.forward(input))
    }
}

/// [`Up`] Config.
#[derive(Config, Debug)]
pub struct UpConfig {
    /// Input channels; the concatenated width of the skip and the upsample.
    pub in_channels: usize,

    /// Output channels.
    pub out_channels: usize,

    /// Upsample with bilinear interpolation rather than a transposed conv.
    #[config(default = true)]
    pub bilinear: bool,
}

impl SourcedInit for UpConfig {
    type Module<B: Backend> = Up<B>;

    /// Parameters live under ``{key}/up`` (transposed conv only) and
    /// ``{key}/conv``.
    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<Up<S::Backend>, S::Error> {
        let half = self.in_channels / 2;
        let (up, conv) = if self.bilinear {
            (
                UpSample::Bilinear(
                    Interpolate2dConfig::new()
                        .with_scale_factor(Some([2.0, 2.0]))
                        .with_mode(InterpolateMode::Linear)
                        .init(),
                ),
                DoubleConvConfig::new(self.in_channels, self.out_channels)
                    .with_mid_channels(Some(half)),
            )
        } else {
            (
                UpSample::Transpose(
                    ConvTranspose2dConfig::new([self.in_channels, half], [2, 2])
                        .with_stride([2, 2])
                        .init_from(source, &key.child("up"))?,
                ),
                DoubleConvConfig::new(self.in_channels, self.out_channels),
            )
        };

        Ok(Up {
            up,
            conv: conv.init_from(source, &key.child("conv"))?,
        })
    }
}

/// The upsampling half of an [`Up`] block.
#[derive(Module, Debug)]
pub enum UpSample<B: Backend> {
    /// Parameter-free bilinear x2 interpolation.
    Bilinear(Interpolate2d),

    /// 2x2/2 transposed convolution, halving the channels.
    Transpose(ConvTranspose2d<B>),
}

impl<B: Backend> UpSample<B> {
    /// Upsample by 2.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Self::Bilinear(interpolate) => interpolate.forward(input),
            Self::Transpose(conv) => conv.forward(input),
        }
    }
}

/// Upscaling, skip concatenation, then [`DoubleConv`].
#[derive(Module, Debug)]
pub struct Up<B: Backend> {
    /// Upsampling.
    pub up: UpSample<B>,

    /// Double convolution.
    pub conv: DoubleConv<B>,
}

impl<B: Backend> Up<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, c, h, w]``; the deeper features.
    /// - `skip`: ``[batch, c', H, W]``, with ``H >= 2h`` and ``W >= 2w``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, H, W]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
        skip: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [_, _, skip_h, skip_w] = skip.dims();
        let x = pad_to_match(self.up.forward(input), [skip_h, skip_w]);

        self.conv.forward(Tensor::cat(vec![skip, x], 1))
    }
}

/// Zero-pad ``[batch, c, h, w]`` out to ``[batch, c, H, W]``.
///
/// Odd height remainders go on top; odd width remainders go right.
///
/// # Panics
///
/// If the input is larger than the target in either dimension.
pub fn pad_to_match<B: Backend>(
    input: Tensor<B, 4>,
    target: [usize; 2],
) -> Tensor<B, 4> {
    let [batch, channels, h, w] = input.dims();
    let [target_h, target_w] = target;
    assert!(
        target_h >= h && target_w >= w,
        "upsampled features [{h}, {w}] exceed the skip connection [{target_h}, {target_w}]"
    );
    if (target_h, target_w) == (h, w) {
        return input;
    }

    let diff_h = target_h - h;
    let top = diff_h - diff_h / 2;
    let left = (target_w - w) / 2;

    Tensor::zeros([batch, channels, target_h, target_w], &input.device()).slice_assign(
        [0..batch, 0..channels, top..top + h, left..left + w],
        input,
    )
}

/// [`OutConv`] Config.
#[derive(Config, Debug)]
pub struct OutConvConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels; the number of classes.
    pub out_channels: usize,
}

impl SourcedInit for OutConvConfig {
    type Module<B: Backend> = OutConv<B>;

    /// Parameters live under ``{key}/conv``.
    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<OutConv<S::Backend>, S::Error> {
        Ok(OutConv {
            conv: Conv2dConfig::new([self.in_channels, self.out_channels], [1, 1])
                .init_from(source, &key.child("conv"))?,
        })
    }
}

/// 1x1 output projection.
#[derive(Module, Debug)]
pub struct OutConv<B: Backend> {
    /// 1x1 convolution, with bias.
    pub conv: Conv2d<B>,
}

impl<B: Backend> OutConv<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.conv.forward(input)
    }
}
