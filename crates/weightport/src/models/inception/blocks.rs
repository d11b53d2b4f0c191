//! # Inception Blocks
//!
//! The mixed blocks of Inception-v3. Every convolution is a [`BasicConv2d`]
//! (``conv -> norm -> relu``); branches run in parallel and are concatenated
//! along the channel axis.

use crate::keys::KeyPath;
use crate::layers::SourcedInit;
use crate::layers::conv_norm::{ConvNorm2d, ConvNorm2dConfig};
use crate::params::ParamSource;
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::Conv2dConfig;
use burn::nn::pool::{
    AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, AvgPool2d, AvgPool2dConfig, MaxPool2d,
    MaxPool2dConfig,
};
use burn::nn::{Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::{Backend, Tensor};
use burn::tensor::activation::relu;

/// Batch-norm epsilon used throughout Inception-v3.
pub const INCEPTION_NORM_EPSILON: f64 = 1e-3;

/// 3x3/1 average pool, padded to keep the resolution.
fn same_avg_pool() -> AvgPool2d {
    AvgPool2dConfig::new([3, 3])
        .with_strides([1, 1])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .init()
}

/// 3x3/2 max pool; the grid-size reduction.
pub(crate) fn reduction_max_pool() -> MaxPool2d {
    MaxPool2dConfig::new([3, 3]).with_strides([2, 2]).init()
}

/// [`BasicConv2d`] Config.
#[derive(Config, Debug)]
pub struct BasicConv2dConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels.
    pub out_channels: usize,

    /// Kernel size, ``[h, w]``.
    pub kernel_size: [usize; 2],

    /// Stride, ``[h, w]``.
    #[config(default = "[1, 1]")]
    pub stride: [usize; 2],

    /// Explicit padding, ``[h, w]``.
    #[config(default = "[0, 0]")]
    pub padding: [usize; 2],
}

impl BasicConv2dConfig {
    fn conv_norm(&self) -> ConvNorm2dConfig {
        ConvNorm2dConfig::from(
            Conv2dConfig::new([self.in_channels, self.out_channels], self.kernel_size)
                .with_stride(self.stride)
                .with_padding(PaddingConfig2d::Explicit(self.padding[0], self.padding[1]))
                .with_bias(false),
        )
        .with_norm_epsilon(INCEPTION_NORM_EPSILON)
    }
}

impl SourcedInit for BasicConv2dConfig {
    type Module<B: Backend> = BasicConv2d<B>;

    /// Parameters live under ``{key}/conv`` and ``{key}/norm``.
    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<BasicConv2d<S::Backend>, S::Error> {
        Ok(BasicConv2d {
            conv_norm: self.conv_norm().init_from(source, key)?,
        })
    }
}

/// ``Conv2d -> BatchNorm -> ReLU``.
#[derive(Module, Debug)]
pub struct BasicConv2d<B: Backend> {
    /// Convolution and norm.
    pub conv_norm: ConvNorm2d<B>,
}

impl<B: Backend> BasicConv2d<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        relu(self.conv_norm.forward(input))
    }
}

fn basic(
    in_channels: usize,
    out_channels: usize,
    kernel_size: [usize; 2],
) -> BasicConv2dConfig {
    BasicConv2dConfig::new(in_channels, out_channels, kernel_size)
}

/// [`InceptionA`] Config.
#[derive(Config, Debug)]
pub struct InceptionAConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels of the pool branch.
    pub pool_features: usize,
}

impl InceptionAConfig {
    /// ``64 + 64 + 96 + pool_features``.
    pub fn out_channels(&self) -> usize {
        224 + self.pool_features
    }
}

impl SourcedInit for InceptionAConfig {
    type Module<B: Backend> = InceptionA<B>;

    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<InceptionA<S::Backend>, S::Error> {
        let c = self.in_channels;
        Ok(InceptionA {
            branch1x1: basic(c, 64, [1, 1]).init_from(source, &key.child("branch1x1"))?,
            branch5x5_1: basic(c, 48, [1, 1]).init_from(source, &key.child("branch5x5_1"))?,
            branch5x5_2: basic(48, 64, [5, 5])
                .with_padding([2, 2])
                .init_from(source, &key.child("branch5x5_2"))?,
            branch3x3dbl_1: basic(c, 64, [1, 1])
                .init_from(source, &key.child("branch3x3dbl_1"))?,
            branch3x3dbl_2: basic(64, 96, [3, 3])
                .with_padding([1, 1])
                .init_from(source, &key.child("branch3x3dbl_2"))?,
            branch3x3dbl_3: basic(96, 96, [3, 3])
                .with_padding([1, 1])
                .init_from(source, &key.child("branch3x3dbl_3"))?,
            pool: same_avg_pool(),
            branch_pool: basic(c, self.pool_features, [1, 1])
                .init_from(source, &key.child("branch_pool"))?,
        })
    }
}

/// 35x35 mixed block: 1x1, 5x5, double 3x3 and pool branches.
#[derive(Module, Debug)]
pub struct InceptionA<B: Backend> {
    /// 1x1 branch.
    pub branch1x1: BasicConv2d<B>,
    /// 5x5 branch, reduction.
    pub branch5x5_1: BasicConv2d<B>,
    /// 5x5 branch.
    pub branch5x5_2: BasicConv2d<B>,
    /// Double 3x3 branch, reduction.
    pub branch3x3dbl_1: BasicConv2d<B>,
    /// Double 3x3 branch, first 3x3.
    pub branch3x3dbl_2: BasicConv2d<B>,
    /// Double 3x3 branch, second 3x3.
    pub branch3x3dbl_3: BasicConv2d<B>,
    /// Pool branch pooling.
    pub pool: AvgPool2d,
    /// Pool branch projection.
    pub branch_pool: BasicConv2d<B>,
}

impl<B: Backend> InceptionA<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let b1 = self.branch1x1.forward(input.clone());
        let b5 = self
            .branch5x5_2
            .forward(self.branch5x5_1.forward(input.clone()));
        let b3 = self.branch3x3dbl_3.forward(
            self.branch3x3dbl_2
                .forward(self.branch3x3dbl_1.forward(input.clone())),
        );
        let bp = self.branch_pool.forward(self.pool.forward(input));

        Tensor::cat(vec![b1, b5, b3, bp], 1)
    }
}

/// [`InceptionB`] Config.
#[derive(Config, Debug)]
pub struct InceptionBConfig {
    /// Input channels.
    pub in_channels: usize,
}

impl InceptionBConfig {
    /// ``384 + 96 + in_channels``.
    pub fn out_channels(&self) -> usize {
        480 + self.in_channels
    }
}

impl SourcedInit for InceptionBConfig {
    type Module<B: Backend> = InceptionB<B>;

    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<InceptionB<S::Backend>, S::Error> {
        let c = self.in_channels;
        Ok(InceptionB {
            branch3x3: basic(c, 384, [3, 3])
                .with_stride([2, 2])
                .init_from(source, &key.child("branch3x3"))?,
            branch3x3dbl_1: basic(c, 64, [1, 1])
                .init_from(source, &key.child("branch3x3dbl_1"))?,
            branch3x3dbl_2: basic(64, 96, [3, 3])
                .with_padding([1, 1])
                .init_from(source, &key.child("branch3x3dbl_2"))?,
            branch3x3dbl_3: basic(96, 96, [3, 3])
                .with_stride([2, 2])
                .init_from(source, &key.child("branch3x3dbl_3"))?,
            pool: reduction_max_pool(),
        })
    }
}

/// 35x35 -> 17x17 grid reduction.
#[derive(Module, Debug)]
pub struct InceptionB<B: Backend> {
    /// Strided 3x3 branch.
    pub branch3x3: BasicConv2d<B>,
    /// Double 3x3 branch, reduction.
    pub branch3x3dbl_1: BasicConv2d<B>,
    /// Double 3x3 branch, first 3x3.
    pub branch3x3dbl_2: BasicConv2d<B>,
    /// Double 3x3 branch, strided 3x3.
    pub branch3x3dbl_3: BasicConv2d<B>,
    /// Max-pool branch.
    pub pool: MaxPool2d,
}

impl<B: Backend> InceptionB<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let b3 = self.branch3x3.forward(input.clone());
        let bd = self.branch3x3dbl_3.forward(
            self.branch3x3dbl_2
                .forward(self.branch3x3dbl_1.forward(input.clone())),
        );
        let bp = self.pool.forward(input);

        Tensor::cat(vec![b3, bd, bp], 1)
    }
}

/// [`InceptionC`] Config.
#[derive(Config, Debug)]
pub struct InceptionCConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Width of the factorized 7x7 branches.
    pub channels_7x7: usize,
}

impl InceptionCConfig {
    /// Always ``4 * 192``.
    pub fn out_channels(&self) -> usize {
        768
    }
}

impl SourcedInit for InceptionCConfig {
    type Module<B: Backend> = InceptionC<B>;

    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<InceptionC<S::Backend>, S::Error> {
        let c = self.in_channels;
        let c7 = self.channels_7x7;
        let row = |i: usize, o: usize| basic(i, o, [1, 7]).with_padding([0, 3]);
        let col = |i: usize, o: usize| basic(i, o, [7, 1]).with_padding([3, 0]);

        Ok(InceptionC {
            branch1x1: basic(c, 192, [1, 1]).init_from(source, &key.child("branch1x1"))?,
            branch7x7_1: basic(c, c7, [1, 1]).init_from(source, &key.child("branch7x7_1"))?,
            branch7x7_2: row(c7, c7).init_from(source, &key.child("branch7x7_2"))?,
            branch7x7_3: col(c7, 192).init_from(source, &key.child("branch7x7_3"))?,
            branch7x7dbl_1: basic(c, c7, [1, 1])
                .init_from(source, &key.child("branch7x7dbl_1"))?,
            branch7x7dbl_2: col(c7, c7).init_from(source, &key.child("branch7x7dbl_2"))?,
            branch7x7dbl_3: row(c7, c7).init_from(source, &key.child("branch7x7dbl_3"))?,
            branch7x7dbl_4: col(c7, c7).init_from(source, &key.child("branch7x7dbl_4"))?,
            branch7x7dbl_5: row(c7, 192).init_from(source, &key.child("branch7x7dbl_5"))?,
            pool: same_avg_pool(),
            branch_pool: basic(c, 192, [1, 1]).init_from(source, &key.child("branch_pool"))?,
        })
    }
}

/// 17x17 mixed block, with 7x7 convolutions factorized into 1x7 and 7x1.
#[derive(Module, Debug)]
pub struct InceptionC<B: Backend> {
    /// 1x1 branch.
    pub branch1x1: BasicConv2d<B>,
    /// 7x7 branch, reduction.
    pub branch7x7_1: BasicConv2d<B>,
    /// 7x7 branch, 1x7.
    pub branch7x7_2: BasicConv2d<B>,
    /// 7x7 branch, 7x1.
    pub branch7x7_3: BasicConv2d<B>,
    /// Double 7x7 branch, reduction.
    pub branch7x7dbl_1: BasicConv2d<B>,
    /// Double 7x7 branch, 7x1.
    pub branch7x7dbl_2: BasicConv2d<B>,
    /// Double 7x7 branch, 1x7.
    pub branch7x7dbl_3: BasicConv2d<B>,
    /// Double 7x7 branch, 7x1.
    pub branch7x7dbl_4: BasicConv2d<B>,
    /// Double 7x7 branch, 1x7.
    pub branch7x7dbl_5: BasicConv2d<B>,
    /// Pool branch pooling.
    pub pool: AvgPool2d,
    /// Pool branch projection.
    pub branch_pool: BasicConv2d<B>,
}

impl<B: Backend> InceptionC<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let b1 = self.branch1x1.forward(input.clone());

        let b7 = [&self.branch7x7_1, &self.branch7x7_2, &self.branch7x7_3]
            .iter()
            .fold(input.clone(), |x, conv| conv.forward(x));

        let bd = [
            &self.branch7x7dbl_1,
            &self.branch7x7dbl_2,
            &self.branch7x7dbl_3,
            &self.branch7x7dbl_4,
            &self.branch7x7dbl_5,
        ]
        .iter()
        .fold(input.clone(), |x, conv| conv.forward(x));

        let bp = self.branch_pool.forward(self.pool.forward(input));

        Tensor::cat(vec![b1, b7, bd, bp], 1)
    }
}

/// [`InceptionD`] Config.
#[derive(Config, Debug)]
pub struct InceptionDConfig {
    /// Input channels.
    pub in_channels: usize,
}

impl InceptionDConfig {
    /// ``320 + 192 + in_channels``.
    pub fn out_channels(&self) -> usize {
        512 + self.in_channels
    }
}

impl SourcedInit for InceptionDConfig {
    type Module<B: Backend> = InceptionD<B>;

    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<InceptionD<S::Backend>, S::Error> {
        let c = self.in_channels;
        Ok(InceptionD {
            branch3x3_1: basic(c, 192, [1, 1]).init_from(source, &key.child("branch3x3_1"))?,
            branch3x3_2: basic(192, 320, [3, 3])
                .with_stride([2, 2])
                .init_from(source, &key.child("branch3x3_2"))?,
            branch7x7x3_1: basic(c, 192, [1, 1])
                .init_from(source, &key.child("branch7x7x3_1"))?,
            branch7x7x3_2: basic(192, 192, [1, 7])
                .with_padding([0, 3])
                .init_from(source, &key.child("branch7x7x3_2"))?,
            branch7x7x3_3: basic(192, 192, [7, 1])
                .with_padding([3, 0])
                .init_from(source, &key.child("branch7x7x3_3"))?,
            branch7x7x3_4: basic(192, 192, [3, 3])
                .with_stride([2, 2])
                .init_from(source, &key.child("branch7x7x3_4"))?,
            pool: reduction_max_pool(),
        })
    }
}

/// 17x17 -> 8x8 grid reduction.
#[derive(Module, Debug)]
pub struct InceptionD<B: Backend> {
    /// 3x3 branch, reduction.
    pub branch3x3_1: BasicConv2d<B>,
    /// 3x3 branch, strided.
    pub branch3x3_2: BasicConv2d<B>,
    /// 7x7x3 branch, reduction.
    pub branch7x7x3_1: BasicConv2d<B>,
    /// 7x7x3 branch, 1x7.
    pub branch7x7x3_2: BasicConv2d<B>,
    /// 7x7x3 branch, 7x1.
    pub branch7x7x3_3: BasicConv2d<B>,
    /// 7x7x3 branch, strided 3x3.
    pub branch7x7x3_4: BasicConv2d<B>,
    /// Max-pool branch.
    pub pool: MaxPool2d,
}

impl<B: Backend> InceptionD<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let b3 = self
            .branch3x3_2
            .forward(self.branch3x3_1.forward(input.clone()));
        let b7 = [
            &self.branch7x7x3_1,
            &self.branch7x7x3_2,
            &self.branch7x7x3_3,
            &self.branch7x7x3_4,
        ]
        .iter()
        .fold(input.clone(), |x, conv| conv.forward(x));
        let bp = self.pool.forward(input);

        Tensor::cat(vec![b3, b7, bp], 1)
    }
}

/// [`InceptionE`] Config.
#[derive(Config, Debug)]
pub struct InceptionEConfig {
    /// Input channels.
    pub in_channels: usize,
}

impl InceptionEConfig {
    /// ``320 + 768 + 768 + 192``.
    pub fn out_channels(&self) -> usize {
        2048
    }
}

impl SourcedInit for InceptionEConfig {
    type Module<B: Backend> = InceptionE<B>;

    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<InceptionE<S::Backend>, S::Error> {
        let c = self.in_channels;
        let row = || basic(384, 384, [1, 3]).with_padding([0, 1]);
        let col = || basic(384, 384, [3, 1]).with_padding([1, 0]);

        Ok(InceptionE {
            branch1x1: basic(c, 320, [1, 1]).init_from(source, &key.child("branch1x1"))?,
            branch3x3_1: basic(c, 384, [1, 1]).init_from(source, &key.child("branch3x3_1"))?,
            branch3x3_2a: row().init_from(source, &key.child("branch3x3_2a"))?,
            branch3x3_2b: col().init_from(source, &key.child("branch3x3_2b"))?,
            branch3x3dbl_1: basic(c, 448, [1, 1])
                .init_from(source, &key.child("branch3x3dbl_1"))?,
            branch3x3dbl_2: basic(448, 384, [3, 3])
                .with_padding([1, 1])
                .init_from(source, &key.child("branch3x3dbl_2"))?,
            branch3x3dbl_3a: row().init_from(source, &key.child("branch3x3dbl_3a"))?,
            branch3x3dbl_3b: col().init_from(source, &key.child("branch3x3dbl_3b"))?,
            pool: same_avg_pool(),
            branch_pool: basic(c, 192, [1, 1]).init_from(source, &key.child("branch_pool"))?,
        })
    }
}

/// 8x8 mixed block, with expanded 1x3 / 3x1 filter banks.
#[derive(Module, Debug)]
pub struct InceptionE<B: Backend> {
    /// 1x1 branch.
    pub branch1x1: BasicConv2d<B>,
    /// 3x3 branch, reduction.
    pub branch3x3_1: BasicConv2d<B>,
    /// 3x3 branch, 1x3 head.
    pub branch3x3_2a: BasicConv2d<B>,
    /// 3x3 branch, 3x1 head.
    pub branch3x3_2b: BasicConv2d<B>,
    /// Double 3x3 branch, reduction.
    pub branch3x3dbl_1: BasicConv2d<B>,
    /// Double 3x3 branch, 3x3.
    pub branch3x3dbl_2: BasicConv2d<B>,
    /// Double 3x3 branch, 1x3 head.
    pub branch3x3dbl_3a: BasicConv2d<B>,
    /// Double 3x3 branch, 3x1 head.
    pub branch3x3dbl_3b: BasicConv2d<B>,
    /// Pool branch pooling.
    pub pool: AvgPool2d,
    /// Pool branch projection.
    pub branch_pool: BasicConv2d<B>,
}

impl<B: Backend> InceptionE<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let b1 = self.branch1x1.forward(input.clone());

        let b3 = self.branch3x3_1.forward(input.clone());
        let b3 = Tensor::cat(
            vec![
                self.branch3x3_2a.forward(b3.clone()),
                self.branch3x3_2b.forward(b3),
            ],
            1,
        );

        let bd = self
            .branch3x3dbl_2
            .forward(self.branch3x3dbl_1.forward(input.clone()));
        let bd = Tensor::cat(
            vec![
                self.branch3x3dbl_3a.forward(bd.clone()),
                self.branch3x3dbl_3b.forward(bd),
            ],
            1,
        );

        let bp = self.branch_pool.forward(self.pool.forward(input));

        Tensor::cat(vec![b1, b3, bd, bp], 1)
    }
}

/// [`InceptionAux`] Config.
#[derive(Config, Debug)]
pub struct InceptionAuxConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Output classes.
    pub num_classes: usize,
}

impl SourcedInit for InceptionAuxConfig {
    type Module<B: Backend> = InceptionAux<B>;

    /// Parameters live under ``{key}/conv0``, ``{key}/conv1`` and ``{key}/fc``.
    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<InceptionAux<S::Backend>, S::Error> {
        Ok(InceptionAux {
            pool: AvgPool2dConfig::new([5, 5]).with_strides([3, 3]).init(),
            conv0: basic(self.in_channels, 128, [1, 1]).init_from(source, &key.child("conv0"))?,
            conv1: basic(128, 768, [5, 5]).init_from(source, &key.child("conv1"))?,
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(768, self.num_classes).init_from(source, &key.child("fc"))?,
        })
    }
}

/// Auxiliary classifier on the 17x17 features; a training-time regularizer.
#[derive(Module, Debug)]
pub struct InceptionAux<B: Backend> {
    /// 5x5/3 average pool.
    pub pool: AvgPool2d,
    /// 1x1 projection.
    pub conv0: BasicConv2d<B>,
    /// 5x5 convolution.
    pub conv1: BasicConv2d<B>,
    /// Global pool.
    pub avgpool: AdaptiveAvgPool2d,
    /// Classifier.
    pub fc: Linear<B>,
}

impl<B: Backend> InceptionAux<B> {
    /// Forward Pass.
    ///
    /// ``[batch, in_channels, 17, 17] -> [batch, num_classes]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let x = self.pool.forward(input);
        let x = self.conv1.forward(self.conv0.forward(x));
        let x = self.avgpool.forward(x).flatten::<2>(1, 3);
        self.fc.forward(x)
    }
}
