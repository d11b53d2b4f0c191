//! # Inception-v3 Core Model
//!
//! Native keys mirror the `torchvision` module names:
//!
//! | key | module |
//! |-----|--------|
//! | ``Conv2d_{1a,2a,2b,3b,4a}_*`` | stem [`BasicConv2d`]s |
//! | ``Mixed_5{b,c,d}`` | [`InceptionA`] |
//! | ``Mixed_6a`` | [`InceptionB`] |
//! | ``Mixed_6{b,c,d,e}`` | [`InceptionC`] |
//! | ``AuxLogits`` | optional [`InceptionAux`] |
//! | ``Mixed_7a`` | [`InceptionD`] |
//! | ``Mixed_7{b,c}`` | [`InceptionE`] |
//! | ``fc/{weight,bias}`` | classifier [`Linear`] |

use crate::keys::KeyPath;
use crate::layers::SourcedInit;
use crate::models::ModelConfig;
use crate::models::inception::blocks::{
    BasicConv2d, BasicConv2dConfig, InceptionA, InceptionAConfig, InceptionAux,
    InceptionAuxConfig, InceptionB, InceptionBConfig, InceptionC, InceptionCConfig, InceptionD,
    InceptionDConfig, InceptionE, InceptionEConfig, reduction_max_pool,
};
use crate::params::ParamSource;
use burn::config::Config;
use burn::module::Module;
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::prelude::{Backend, Tensor};

/// Width of the final feature map.
pub const INCEPTION_FEATURES: usize = 2048;

/// Per-channel ``(mean, std)`` the `torchvision` weights were trained with.
const IMAGENET_STATS: [(f64, f64); 3] = [(0.485, 0.229), (0.456, 0.224), (0.406, 0.225)];

/// [`InceptionV3`] Config.
#[derive(Config, Debug)]
pub struct InceptionV3Config {
    /// Number of classifier outputs.
    #[config(default = 1000)]
    pub num_classes: usize,

    /// Build the auxiliary classifier.
    #[config(default = false)]
    pub aux_logits: bool,

    /// Dropout before the classifier.
    #[config(default = 0.5)]
    pub dropout: f64,

    /// Re-normalize ImageNet-normalized input to ``[-1, 1]``.
    ///
    /// The `torchvision` pretrained weights expect this.
    #[config(default = false)]
    pub transform_input: bool,
}

impl ModelConfig for InceptionV3Config {
    type Model<B: Backend> = InceptionV3<B>;

    fn init_with<S: ParamSource>(
        &self,
        source: &mut S,
    ) -> Result<InceptionV3<S::Backend>, S::Error> {
        let root = |name: &str| KeyPath::root(name);

        let conv2d_1a = BasicConv2dConfig::new(3, 32, [3, 3])
            .with_stride([2, 2])
            .init_from(source, &root("Conv2d_1a_3x3"))?;
        let conv2d_2a = BasicConv2dConfig::new(32, 32, [3, 3])
            .init_from(source, &root("Conv2d_2a_3x3"))?;
        let conv2d_2b = BasicConv2dConfig::new(32, 64, [3, 3])
            .with_padding([1, 1])
            .init_from(source, &root("Conv2d_2b_3x3"))?;
        let conv2d_3b = BasicConv2dConfig::new(64, 80, [1, 1])
            .init_from(source, &root("Conv2d_3b_1x1"))?;
        let conv2d_4a = BasicConv2dConfig::new(80, 192, [3, 3])
            .init_from(source, &root("Conv2d_4a_3x3"))?;

        let mut channels = 192;
        let mut mixed_a = Vec::new();
        for (name, pool_features) in [("Mixed_5b", 32), ("Mixed_5c", 64), ("Mixed_5d", 64)] {
            let config = InceptionAConfig::new(channels, pool_features);
            mixed_a.push(config.init_from(source, &root(name))?);
            channels = config.out_channels();
        }

        let config = InceptionBConfig::new(channels);
        let mixed_6a = config.init_from(source, &root("Mixed_6a"))?;
        channels = config.out_channels();

        let mut mixed_c = Vec::new();
        for (name, channels_7x7) in [
            ("Mixed_6b", 128),
            ("Mixed_6c", 160),
            ("Mixed_6d", 160),
            ("Mixed_6e", 192),
        ] {
            let config = InceptionCConfig::new(channels, channels_7x7);
            mixed_c.push(config.init_from(source, &root(name))?);
            channels = config.out_channels();
        }

        let aux_logits = if self.aux_logits {
            Some(
                InceptionAuxConfig::new(channels, self.num_classes)
                    .init_from(source, &root("AuxLogits"))?,
            )
        } else {
            None
        };

        let config = InceptionDConfig::new(channels);
        let mixed_7a = config.init_from(source, &root("Mixed_7a"))?;
        channels = config.out_channels();

        let mut mixed_e = Vec::new();
        for name in ["Mixed_7b", "Mixed_7c"] {
            let config = InceptionEConfig::new(channels);
            mixed_e.push(config.init_from(source, &root(name))?);
            channels = config.out_channels();
        }

        let fc = LinearConfig::new(channels, self.num_classes).init_from(source, &root("fc"))?;

        Ok(InceptionV3 {
            transform_input: self.transform_input,
            conv2d_1a,
            conv2d_2a,
            conv2d_2b,
            maxpool1: reduction_max_pool(),
            conv2d_3b,
            conv2d_4a,
            maxpool2: reduction_max_pool(),
            mixed_a,
            mixed_6a,
            mixed_c,
            aux_logits,
            mixed_7a,
            mixed_e,
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout: DropoutConfig::new(self.dropout).init(),
            fc,
        })
    }
}

/// Inception-v3 model.
#[derive(Module, Debug)]
pub struct InceptionV3<B: Backend> {
    /// Apply the input re-normalization.
    pub transform_input: bool,

    /// 3x3/2 stem convolution.
    pub conv2d_1a: BasicConv2d<B>,
    /// 3x3 stem convolution.
    pub conv2d_2a: BasicConv2d<B>,
    /// Padded 3x3 stem convolution.
    pub conv2d_2b: BasicConv2d<B>,
    /// First stem max pool.
    pub maxpool1: MaxPool2d,
    /// 1x1 stem convolution.
    pub conv2d_3b: BasicConv2d<B>,
    /// 3x3 stem convolution.
    pub conv2d_4a: BasicConv2d<B>,
    /// Second stem max pool.
    pub maxpool2: MaxPool2d,

    /// ``Mixed_5b..5d``.
    pub mixed_a: Vec<InceptionA<B>>,
    /// ``Mixed_6a``.
    pub mixed_6a: InceptionB<B>,
    /// ``Mixed_6b..6e``.
    pub mixed_c: Vec<InceptionC<B>>,
    /// Auxiliary classifier on the ``Mixed_6e`` features.
    pub aux_logits: Option<InceptionAux<B>>,
    /// ``Mixed_7a``.
    pub mixed_7a: InceptionD<B>,
    /// ``Mixed_7b``, ``Mixed_7c``.
    pub mixed_e: Vec<InceptionE<B>>,

    /// Global average pool.
    pub avgpool: AdaptiveAvgPool2d,
    /// Classifier dropout.
    pub dropout: Dropout,
    /// Classifier.
    pub fc: Linear<B>,
}

impl<B: Backend> InceptionV3<B> {
    /// Map ImageNet-normalized channels to ``(x * 0.5) + 0.5`` normalization.
    fn transform(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        if !self.transform_input {
            return input;
        }
        let channels = IMAGENET_STATS
            .iter()
            .enumerate()
            .map(|(c, &(mean, std))| {
                input
                    .clone()
                    .narrow(1, c, 1)
                    .mul_scalar(std / 0.5)
                    .add_scalar((mean - 0.5) / 0.5)
            })
            .collect();
        Tensor::cat(channels, 1)
    }

    fn stem(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.conv2d_1a.forward(self.transform(input));
        let x = self.conv2d_2b.forward(self.conv2d_2a.forward(x));
        let x = self.maxpool1.forward(x);
        let x = self.conv2d_4a.forward(self.conv2d_3b.forward(x));
        self.maxpool2.forward(x)
    }

    /// The 17x17 (for 299x299 input) features feeding the auxiliary head.
    fn mid_features(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self
            .mixed_a
            .iter()
            .fold(self.stem(input), |x, block| block.forward(x));
        let x = self.mixed_6a.forward(x);
        self.mixed_c.iter().fold(x, |x, block| block.forward(x))
    }

    fn head(
        &self,
        mid: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let x = self.mixed_7a.forward(mid);
        let x = self.mixed_e.iter().fold(x, |x, block| block.forward(x));
        let x = self.avgpool.forward(x).flatten::<2>(1, 3);
        self.fc.forward(self.dropout.forward(x))
    }

    /// Feature extraction, without pooling or the classifier.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, 3, height, width]``, with ``height, width >= 75``.
    ///
    /// # Returns
    ///
    /// ``[batch, 2048, h, w]``; ``8x8`` for ``299x299`` input.
    pub fn features(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.mixed_7a.forward(self.mid_features(input));
        self.mixed_e.iter().fold(x, |x, block| block.forward(x))
    }

    /// Forward pass; the auxiliary head, if any, is skipped.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]`` logits.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        self.head(self.mid_features(input))
    }

    /// Forward pass, also evaluating the auxiliary head when present.
    ///
    /// The auxiliary head needs ``Mixed_6e`` features of at least ``17x17``;
    /// use ``299x299`` input.
    pub fn forward_with_aux(
        &self,
        input: Tensor<B, 4>,
    ) -> (Tensor<B, 2>, Option<Tensor<B, 2>>) {
        let mid = self.mid_features(input);
        let aux = self
            .aux_logits
            .as_ref()
            .map(|head| head.forward(mid.clone()));
        (self.head(mid), aux)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamStructure;
    use crate::testing::backend_matrix;
    use burn::backend::NdArray;

    /// Parameter count, excluding batch-norm running statistics.
    fn trainable_params(structure: &ParamStructure) -> usize {
        structure
            .iter()
            .filter(|(key, _)| !key.leaf().starts_with("running_"))
            .map(|(_, shape)| shape.iter().product::<usize>())
            .sum()
    }

    fn inception_structure<B: Backend>(device: &B::Device) {
        let structure = InceptionV3Config::new().structure::<B>(device);

        for (key, shape) in [
            ("Conv2d_1a_3x3/conv/weight", vec![32, 3, 3, 3]),
            ("Conv2d_4a_3x3/norm/running_var", vec![192]),
            ("Mixed_5b/branch_pool/conv/weight", vec![32, 192, 1, 1]),
            ("Mixed_6a/branch3x3/conv/weight", vec![384, 288, 3, 3]),
            ("Mixed_6e/branch7x7dbl_5/conv/weight", vec![192, 192, 1, 7]),
            ("Mixed_7c/branch3x3dbl_3b/conv/weight", vec![384, 384, 3, 1]),
            ("fc/weight", vec![INCEPTION_FEATURES, 1000]),
        ] {
            assert_eq!(
                structure.get(&KeyPath::parse(key).unwrap()),
                Some(shape.as_slice()),
                "{key}"
            );
        }
        assert!(!structure.contains(&KeyPath::parse("Conv2d_1a_3x3/conv/bias").unwrap()));
        assert!(structure.keys().all(|k| k.segments()[0] != "AuxLogits"));
        assert_eq!(trainable_params(&structure), 23_834_568);

        let with_aux = InceptionV3Config::new()
            .with_aux_logits(true)
            .structure::<B>(device);
        assert_eq!(
            with_aux.get(&KeyPath::parse("AuxLogits/fc/weight").unwrap()),
            Some([768usize, 1000].as_slice())
        );
        assert_eq!(trainable_params(&with_aux), 27_161_264);
    }

    backend_matrix!(inception_structure);

    #[test]
    fn test_inception_forward() {
        let device = Default::default();
        let model = InceptionV3Config::new()
            .with_num_classes(10)
            .with_transform_input(true)
            .init::<NdArray>(&device);
        assert!(model.aux_logits.is_none());

        let input = Tensor::ones([1, 3, 75, 75], &device);
        assert_eq!(model.features(input.clone()).dims(), [1, INCEPTION_FEATURES, 1, 1]);
        assert_eq!(model.forward(input.clone()).dims(), [1, 10]);

        let (logits, aux) = model.forward_with_aux(input);
        assert_eq!(logits.dims(), [1, 10]);
        assert!(aux.is_none());
    }

    #[test]
    fn test_transform_input() {
        let device = Default::default();
        let mut model = InceptionV3Config::new()
            .with_num_classes(2)
            .init::<NdArray>(&device);

        let input = Tensor::<NdArray, 4>::zeros([1, 3, 1, 1], &device);
        assert_eq!(
            model.transform(input.clone()).into_data().to_vec::<f32>().unwrap(),
            vec![0.0, 0.0, 0.0]
        );

        model.transform_input = true;
        let shifted = model.transform(input).into_data().to_vec::<f32>().unwrap();
        for (value, (mean, _)) in shifted.iter().zip(IMAGENET_STATS) {
            assert!((*value as f64 - (mean - 0.5) / 0.5).abs() < 1e-6);
        }
    }
}
