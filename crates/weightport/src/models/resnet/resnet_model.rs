//! # `ResNet` Core Model
//!
//! Native parameter namespace:
//!
//! | key | module |
//! |-----|--------|
//! | ``stem/{conv,norm}`` | 7x7/2 [`ConvNorm2d`] |
//! | ``layers/{i}/blocks/{j}/...`` | [`LayerBlock`] `i`, block `j` |
//! | ``head/{weight,bias}`` | classifier [`Linear`] |

use crate::keys::KeyPath;
use crate::layers::SourcedInit;
use crate::layers::conv_norm::{ConvNorm2d, ConvNorm2dConfig};
use crate::models::ModelConfig;
use crate::models::resnet::basic_block::BasicBlockConfig;
use crate::models::resnet::bottleneck::{BOTTLENECK_EXPANSION, BottleneckBlockConfig};
use crate::models::resnet::layer_block::{LayerBlock, LayerBlockConfig, LayerBlockMeta};
use crate::models::resnet::residual_block::ResidualBlockConfig;
use crate::models::resnet::util::CONV_INTO_RELU_INITIALIZER;
use crate::params::ParamSource;
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::Conv2dConfig;
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::nn::{Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::{Backend, Tensor};
use burn::tensor::activation::relu;

/// Stem output width; also the input width of the first layer block.
pub const STEM_PLANES: usize = 64;

/// Base planes of the four layer blocks.
pub const LAYER_PLANES: [usize; 4] = [64, 128, 256, 512];

/// [`ResNet`] Config.
#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// Number of residual blocks in each of the four layer blocks.
    pub layers: [usize; 4],

    /// Number of classifier outputs.
    #[config(default = 1000)]
    pub num_classes: usize,

    /// Use [`BottleneckBlockConfig`] blocks rather than [`BasicBlockConfig`].
    #[config(default = false)]
    pub bottleneck: bool,

    /// Input image channels.
    #[config(default = 3)]
    pub in_channels: usize,

    /// Bottleneck convolution groups.
    #[config(default = 1)]
    pub groups: usize,

    /// Bottleneck width per group; ``128`` for the wide variants.
    #[config(default = 64)]
    pub base_width: usize,

    /// Trade the stride of layer blocks 2..4 for dilation.
    #[config(default = "[false, false, false]")]
    pub replace_stride_with_dilation: [bool; 3],
}

impl ResNetConfig {
    /// `ResNet-18`.
    pub fn resnet18(num_classes: usize) -> Self {
        Self::new([2, 2, 2, 2]).with_num_classes(num_classes)
    }

    /// `ResNet-34`.
    pub fn resnet34(num_classes: usize) -> Self {
        Self::new([3, 4, 6, 3]).with_num_classes(num_classes)
    }

    /// `ResNet-50`.
    pub fn resnet50(num_classes: usize) -> Self {
        Self::new([3, 4, 6, 3])
            .with_num_classes(num_classes)
            .with_bottleneck(true)
    }

    /// `ResNet-101`.
    pub fn resnet101(num_classes: usize) -> Self {
        Self::new([3, 4, 23, 3])
            .with_num_classes(num_classes)
            .with_bottleneck(true)
    }

    /// `ResNet-152`.
    pub fn resnet152(num_classes: usize) -> Self {
        Self::new([3, 8, 36, 3])
            .with_num_classes(num_classes)
            .with_bottleneck(true)
    }

    /// `Wide-ResNet-50-2`.
    pub fn wide_resnet50_2(num_classes: usize) -> Self {
        Self::resnet50(num_classes).with_base_width(128)
    }

    /// Block output expansion.
    pub fn expansion(&self) -> usize {
        if self.bottleneck {
            BOTTLENECK_EXPANSION
        } else {
            1
        }
    }

    /// Width of the pooled features fed to the head.
    pub fn feature_planes(&self) -> usize {
        LAYER_PLANES[3] * self.expansion()
    }

    /// Check if the config is valid.
    ///
    /// # Returns
    ///
    /// A `Result<(), String>`
    pub fn try_validate(&self) -> Result<(), String> {
        if let Some(idx) = self.layers.iter().position(|&n| n == 0) {
            return Err(format!("layers[{idx}] is empty"));
        }
        if !self.bottleneck {
            if self.groups != 1 || self.base_width != 64 {
                return Err("BasicBlock only supports groups=1 and base_width=64".to_string());
            }
            if self.replace_stride_with_dilation.iter().any(|&d| d) {
                return Err("BasicBlock does not support dilation".to_string());
            }
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{}", err);
        }
    }

    fn stem(&self) -> ConvNorm2dConfig {
        Conv2dConfig::new([self.in_channels, STEM_PLANES], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .with_initializer(CONV_INTO_RELU_INITIALIZER.clone())
            .into()
    }

    fn block(
        &self,
        in_planes: usize,
        planes: usize,
        stride: usize,
        dilation: usize,
    ) -> ResidualBlockConfig {
        if self.bottleneck {
            BottleneckBlockConfig::new(in_planes, planes)
                .with_stride(stride)
                .with_groups(self.groups)
                .with_base_width(self.base_width)
                .with_dilation(dilation)
                .into()
        } else {
            BasicBlockConfig::new(in_planes, planes)
                .with_stride(stride)
                .into()
        }
    }

    /// The four layer block configs.
    ///
    /// The first block of each layer carries the stride (or the previous
    /// dilation, when the stride is replaced) and the downsample.
    pub fn layer_configs(&self) -> Vec<LayerBlockConfig> {
        let expansion = self.expansion();
        let mut in_planes = STEM_PLANES;
        let mut dilation = 1;

        LAYER_PLANES
            .iter()
            .zip(self.layers)
            .enumerate()
            .map(|(idx, (&planes, num_blocks))| {
                let mut stride = if idx == 0 { 1 } else { 2 };
                let previous_dilation = dilation;
                if idx > 0 && self.replace_stride_with_dilation[idx - 1] {
                    dilation *= stride;
                    stride = 1;
                }

                let mut blocks = vec![self.block(in_planes, planes, stride, previous_dilation)];
                in_planes = planes * expansion;
                blocks.extend((1..num_blocks).map(|_| self.block(in_planes, planes, 1, dilation)));

                LayerBlockConfig::from(blocks)
            })
            .collect()
    }
}

impl ModelConfig for ResNetConfig {
    type Model<B: Backend> = ResNet<B>;

    /// # Panics
    ///
    /// If the config is not valid.
    fn init_with<S: ParamSource>(
        &self,
        source: &mut S,
    ) -> Result<ResNet<S::Backend>, S::Error> {
        self.expect_valid();

        let stem = self.stem().init_from(source, &KeyPath::root("stem"))?;

        let prefix = KeyPath::root("layers");
        let layers = self
            .layer_configs()
            .iter()
            .enumerate()
            .map(|(idx, layer)| layer.init_from(source, &prefix.child(idx)))
            .collect::<Result<Vec<_>, _>>()?;

        let head = LinearConfig::new(self.feature_planes(), self.num_classes)
            .init_from(source, &KeyPath::root("head"))?;

        Ok(ResNet {
            stem,
            maxpool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
            layers,
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            head,
        })
    }
}

/// `ResNet` model.
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    /// 7x7/2 stem.
    pub stem: ConvNorm2d<B>,

    /// 3x3/2 max pool.
    pub maxpool: MaxPool2d,

    /// The four layer blocks.
    pub layers: Vec<LayerBlock<B>>,

    /// Global average pool.
    pub avgpool: AdaptiveAvgPool2d,

    /// Classifier.
    pub head: Linear<B>,
}

impl<B: Backend> ResNet<B> {
    /// Feature extraction, without pooling or the head.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, feature_planes, height / 32, width / 32]``; dilated layers
    /// keep their resolution.
    pub fn features(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = relu(self.stem.forward(input));
        let x = self.maxpool.forward(x);

        self.layers.iter().fold(x, |x, layer| layer.forward(x))
    }

    /// `ResNet` forward pass.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]`` logits.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let x = self.features(input);
        let x = self.avgpool.forward(x);
        // [B, C, 1, 1] -> [B, C]
        let x = x.flatten(1, 3);

        self.head.forward(x)
    }

    /// Total stride of the layer blocks, excluding the stem.
    pub fn layer_stride(&self) -> usize {
        self.layers.iter().map(|l| l.stride()).product()
    }
}
