//! # Basic Block for `ResNet`
//!
//! [`BasicBlock`] is the two-convolution `ResNet` unit used by
//! `ResNet-18` and `ResNet-34`.
//!
//! [`BasicBlockMeta`] defines a common meta API for [`BasicBlock`]
//! and [`BasicBlockConfig`].
//!
//! Parameters:
//! * ``conv_norm1`` - 3x3 strided conv + norm.
//! * ``conv_norm2`` - 3x3 conv + norm.
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

/// [`BasicBlock`] Meta trait.
pub trait BasicBlockMeta {
    /// The size of the in channels dimension.
    fn in_planes(&self) -> usize;

    /// The size of the out channels dimension.
    fn out_planes(&self) -> usize;

    /// The stride of the first convolution.
    ///
    /// Affects downsample behavior.
    fn stride(&self) -> usize;

    /// Does the residual path need a downsample?
    fn needs_downsample(&self) -> bool {
        self.stride() != 1 || self.in_planes() != self.out_planes()
    }
}

/// [`BasicBlock`] Config.
///
/// Implements [`BasicBlockMeta`].
#[derive(Config, Debug)]
pub struct BasicBlockConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// The size of the out channels dimension.
    pub planes: usize,

    /// The stride of the first convolution, and the downsample.
    #[config(default = 1)]
    pub stride: usize,
}

impl BasicBlockMeta for BasicBlockConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn out_planes(&self) -> usize {
        self.planes
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl BasicBlockConfig {
    fn conv_norm1(&self) -> ConvNorm2dConfig {
        Conv2dConfig::new([self.in_planes, self.planes], scalar_to_array(3))
            .with_stride(scalar_to_array(self.stride))
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .with_initializer(CONV_INTO_RELU_INITIALIZER.clone())
            .into()
    }

    fn conv_norm2(&self) -> ConvNorm2dConfig {
        Conv2dConfig::new([self.planes, self.planes], scalar_to_array(3))
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .with_initializer(CONV_INTO_RELU_INITIALIZER.clone())
            .into()
    }
}

impl SourcedInit for BasicBlockConfig {
    type Module<B: Backend> = BasicBlock<B>;

    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<BasicBlock<S::Backend>, S::Error> {
        let downsample = match downsample_config(self.in_planes, self.planes, self.stride) {
            Some(cfg) => Some(cfg.init_from(source, &key.child("downsample"))?),
            None => None,
        };

        Ok(BasicBlock {
            conv_norm1: self.conv_norm1().init_from(source, &key.child("conv_norm1"))?,
            conv_norm2: self.conv_norm2().init_from(source, &key.child("conv_norm2"))?,
            downsample,
        })
    }
}

/// Basic Block for `ResNet`.
///
/// Implements [`BasicBlockMeta`].
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    /// First Conv/Norm Block.
    pub conv_norm1: ConvNorm2d<B>,

    /// Second Conv/Norm Block.
    pub conv_norm2: ConvNorm2d<B>,

    /// Optional downsample; for the residual connection.
    pub downsample: Option<ConvNorm2d<B>>,
}

impl<B: Backend> BasicBlockMeta for BasicBlock<B> {
    fn in_planes(&self) -> usize {
        self.conv_norm1.in_channels()
    }

    fn out_planes(&self) -> usize {
        self.conv_norm2.out_channels()
    }

    fn stride(&self) -> usize {
        self.conv_norm1.stride()[0]
    }
}

impl<B: Backend> BasicBlock<B> {
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

        let x = self.conv_norm1.forward(input);
        let x = relu(x);
        let x = self.conv_norm2.forward(x);

        relu(x + identity)
    }
}
