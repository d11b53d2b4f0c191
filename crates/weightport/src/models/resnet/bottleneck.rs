//! # Bottleneck Block for `ResNet`
//!
//! [`BottleneckBlock`] is the three-convolution `ResNet` unit used by
//! `ResNet-50` and deeper models; ``1x1 -> 3x3 -> 1x1``, with the output
//! width expanded by [`BOTTLENECK_EXPANSION`].
//!
//! Parameters:
//! * ``conv_norm1`` - 1x1 conv + norm.
//! * ``conv_norm2`` - 3x3 strided, grouped, dilated conv + norm.
//! * ``conv_norm3`` - 1x1 expanding conv + norm.
//! * ``downsample`` - optional 1x1 strided conv + norm on the residual path.

use crate::keys::KeyPath;
use crate::layers::SourcedInit;
use crate::layers::conv_norm::{ConvNorm2d, ConvNorm2dConfig, ConvNorm2dMeta};
use crate::models::resnet::util::{
    CONV_INTO_RELU_INITIALIZER, downsample_config, scalar_to_array,
};
use crate::params::ParamSource;
use burn::nn::PaddingConfig2d;
use burn::nn::conv::Conv2dConfig;
use burn::prelude::{Backend, Config, Module, Tensor};
use burn::tensor::activation::relu;

/// Output width expansion of a bottleneck block.
pub const BOTTLENECK_EXPANSION: usize = 4;

/// [`BottleneckBlock`] Meta trait.
pub trait BottleneckBlockMeta {
    /// The size of the in channels dimension.
    fn in_planes(&self) -> usize;

    /// The width of the inner 3x3 convolution.
    fn width(&self) -> usize;

    /// The size of the out channels dimension.
    fn out_planes(&self) -> usize;

    /// The stride of the 3x3 convolution.
    fn stride(&self) -> usize;

    /// Does the residual path need a downsample?
    fn needs_downsample(&self) -> bool {
        self.stride() != 1 || self.in_planes() != self.out_planes()
    }
}

/// [`BottleneckBlock`] Config.
///
/// Implements [`BottleneckBlockMeta`].
#[derive(Config, Debug)]
pub struct BottleneckBlockConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// Base planes; ``out_planes = planes * 4``.
    pub planes: usize,

    /// The stride of the 3x3 convolution, and the downsample.
    #[config(default = 1)]
    pub stride: usize,

    /// Groups of the 3x3 convolution.
    #[config(default = 1)]
    pub groups: usize,

    /// Width per group; ``64`` is the standard width.
    #[config(default = 64)]
    pub base_width: usize,

    /// Dilation of the 3x3 convolution.
    #[config(default = 1)]
    pub dilation: usize,
}

impl BottleneckBlockMeta for BottleneckBlockConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn width(&self) -> usize {
        self.planes * self.base_width / 64 * self.groups
    }

    fn out_planes(&self) -> usize {
        self.planes * BOTTLENECK_EXPANSION
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl BottleneckBlockConfig {
    fn conv_norm1(&self) -> ConvNorm2dConfig {
        Conv2dConfig::new([self.in_planes, self.width()], scalar_to_array(1))
            .with_bias(false)
            .with_initializer(CONV_INTO_RELU_INITIALIZER.clone())
            .into()
    }

    fn conv_norm2(&self) -> ConvNorm2dConfig {
        Conv2dConfig::new([self.width(), self.width()], scalar_to_array(3))
            .with_stride(scalar_to_array(self.stride))
            .with_groups(self.groups)
            .with_dilation(scalar_to_array(self.dilation))
            .with_padding(PaddingConfig2d::Explicit(self.dilation, self.dilation))
            .with_bias(false)
            .with_initializer(CONV_INTO_RELU_INITIALIZER.clone())
            .into()
    }

    fn conv_norm3(&self) -> ConvNorm2dConfig {
        Conv2dConfig::new([self.width(), self.out_planes()], scalar_to_array(1))
            .with_bias(false)
            .with_initializer(CONV_INTO_RELU_INITIALIZER.clone())
            .into()
    }
}

impl SourcedInit for BottleneckBlockConfig {
    type Module<B: Backend> = BottleneckBlock<B>;

    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<BottleneckBlock<S::Backend>, S::Error> {
        let downsample = match downsample_config(self.in_planes, self.out_planes(), self.stride) {
            Some(cfg) => Some(cfg.init_from(source, &key.child("downsample"))?),
            None => None,
        };

        Ok(BottleneckBlock {
            conv_norm1: self.conv_norm1().init_from(source, &key.child("conv_norm1"))?,
            conv_norm2: self.conv_norm2().init_from(source, &key.child("conv_norm2"))?,
            conv_norm3: self.conv_norm3().init_from(source, &key.child("conv_norm3"))?,
            downsample,
        })
    }
}

/// Bottleneck Block for `ResNet`.
///
/// Implements [`BottleneckBlockMeta`].
#[derive(Module, Debug)]
pub struct BottleneckBlock<B: Backend> {
    /// 1x1 Conv/Norm Block.
    pub conv_norm1: ConvNorm2d<B>,

    /// 3x3 Conv/Norm Block.
    pub conv_norm2: ConvNorm2d<B>,

    /// Expanding 1x1 Conv/Norm Block.
    pub conv_norm3: ConvNorm2d<B>,

    /// Optional downsample; for the residual connection.
    pub downsample: Option<ConvNorm2d<B>>,
}

impl<B: Backend> BottleneckBlockMeta for BottleneckBlock<B> {
    fn in_planes(&self) -> usize {
        self.conv_norm1.in_channels()
    }

    fn width(&self) -> usize {
        self.conv_norm2.out_channels()
    }

    fn out_planes(&self) -> usize {
        self.conv_norm3.out_channels()
    }

    fn stride(&self) -> usize {
        self.conv_norm2.stride()[0]
    }
}

impl<B: Backend> BottleneckBlock<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_planes, in_height / stride, in_width / stride]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(input.clone()),
            None => input.clone(),
        };

        let x = relu(self.conv_norm1.forward(input));
        let x = relu(self.conv_norm2.forward(x));
        let x = self.conv_norm3.forward(x);

        relu(x + identity)
    }
}
