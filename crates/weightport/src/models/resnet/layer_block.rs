//! # `ResNet` Layer Block
//!
//! A [`LayerBlock`] is a sequence of [`ResidualBlock`]s.
//!
//! [`LayerBlockMeta`] defines a common meta API for [`LayerBlock`]
//! and [`LayerBlockConfig`].
//!
//! Block parameters live under ``{key}/blocks/{idx}``.

use crate::keys::KeyPath;
use crate::layers::SourcedInit;
use crate::models::resnet::residual_block::{
    ResidualBlock, ResidualBlockConfig, ResidualBlockMeta,
};
use crate::params::ParamSource;
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// [`LayerBlock`] Meta API.
pub trait LayerBlockMeta {
    /// The number of blocks.
    fn len(&self) -> usize;

    /// Check if the layer block is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// Get the effective stride of the layers.
    fn stride(&self) -> usize;
}

/// [`LayerBlock`] Configuration.
#[derive(Config, Debug)]
pub struct LayerBlockConfig {
    /// The component blocks.
    pub blocks: Vec<ResidualBlockConfig>,
}

impl From<Vec<ResidualBlockConfig>> for LayerBlockConfig {
    fn from(blocks: Vec<ResidualBlockConfig>) -> Self {
        Self { blocks }
    }
}

impl LayerBlockMeta for LayerBlockConfig {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks[0].in_planes()
    }

    fn out_planes(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_planes()
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }
}

impl LayerBlockConfig {
    /// Check if the config is valid.
    ///
    /// # Returns
    ///
    /// A `Result<(), String>`
    pub fn try_validate(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("blocks is empty".to_string());
        }

        for idx in 1..self.blocks.len() {
            let prev = &self.blocks[idx - 1];
            let curr = &self.blocks[idx];
            if prev.out_planes() != curr.in_planes() {
                return Err(format!(
                    "block[{}].out_planes({}) != block[{}].in_planes({})",
                    idx - 1,
                    prev.out_planes(),
                    idx,
                    curr.in_planes(),
                ));
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
}

impl SourcedInit for LayerBlockConfig {
    type Module<B: Backend> = LayerBlock<B>;

    /// # Panics
    ///
    /// If the block sequence is not valid.
    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<LayerBlock<S::Backend>, S::Error> {
        self.expect_valid();

        let prefix = key.child("blocks");
        let blocks = self
            .blocks
            .iter()
            .enumerate()
            .map(|(idx, block)| block.init_from(source, &prefix.child(idx)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LayerBlock { blocks })
    }
}

/// Layer block.
#[derive(Module, Debug)]
pub struct LayerBlock<B: Backend> {
    /// Internal blocks.
    pub blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> LayerBlockMeta for LayerBlock<B> {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks[0].in_planes()
    }

    fn out_planes(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_planes()
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }
}

impl<B: Backend> LayerBlock<B> {
    /// Apply the layer block.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height=out_height*stride, in_width=out_width*stride]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_planes, out_height, out_width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.blocks.iter().fold(input, |x, block| block.forward(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resnet::basic_block::BasicBlockConfig;
    use crate::testing::backend_matrix;

    #[test]
    fn test_layer_block_config_validate() {
        let config = LayerBlockConfig::from(vec![
            BasicBlockConfig::new(16, 32).with_stride(2).into(),
            BasicBlockConfig::new(32, 32).into(),
        ]);
        config.expect_valid();
        assert_eq!(config.len(), 2);
        assert_eq!(config.in_planes(), 16);
        assert_eq!(config.out_planes(), 32);
        assert_eq!(config.stride(), 2);

        let broken = LayerBlockConfig::from(vec![
            BasicBlockConfig::new(16, 32).into(),
            BasicBlockConfig::new(16, 32).into(),
        ]);
        assert_eq!(
            broken.try_validate(),
            Err("block[0].out_planes(32) != block[1].in_planes(16)".to_string())
        );

        assert!(LayerBlockConfig::new(vec![]).try_validate().is_err());
    }

    fn layer_block_forward<B: Backend>(device: &B::Device) {
        let config = LayerBlockConfig::from(vec![
            BasicBlockConfig::new(16, 32).with_stride(2).into(),
            BasicBlockConfig::new(32, 64).with_stride(3).into(),
        ]);

        let structure = config.structure_at::<B>(&KeyPath::root("layer"), device);
        assert!(structure.contains(&KeyPath::parse("layer/blocks/0/downsample/conv/weight").unwrap()));
        assert!(structure.contains(&KeyPath::parse("layer/blocks/1/conv_norm2/norm/beta").unwrap()));

        let block = config.init_at::<B>(&KeyPath::root("layer"), device);
        assert_eq!(block.len(), 2);
        assert_eq!(block.in_planes(), 16);
        assert_eq!(block.out_planes(), 64);
        assert_eq!(block.stride(), 6);

        let output = block.forward(Tensor::ones([2, 16, 12, 24], device));
        assert_eq!(output.dims(), [2, 64, 2, 4]);
    }

    backend_matrix!(layer_block_forward);
}
