//! # Transformer Helper Blocks
//!
//! The building blocks of Perceiver-style transformers:
//!
//! * [`FeedForward`] - ``Linear -> GELU -> Linear -> Dropout``.
//! * [`Attention`] - multi-head attention of queries over a context.
//! * [`PreNorm`] - [`LayerNorm`] on the input (and context), then a block.
//!
//! | module | parameters |
//! |--------|------------|
//! | [`FeedForward`] | ``net/0``, ``net/2`` |
//! | [`Attention`] | ``to_q``, ``to_kv`` (no bias), ``to_out`` |
//! | [`PreNorm`] | ``norm``, ``norm_context``, ``fn`` |

use crate::keys::KeyPath;
use crate::layers::SourcedInit;
use crate::params::ParamSource;
use burn::config::Config;
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig};
use burn::prelude::{Backend, Tensor};
use burn::tensor::activation::{gelu, softmax};

/// [`FeedForward`] Config.
#[derive(Config, Debug)]
pub struct FeedForwardConfig {
    /// Input and output width.
    pub dim: usize,

    /// Hidden width; defaults to `dim`.
    #[config(default = "None")]
    pub hidden_dim: Option<usize>,

    /// Output dropout probability.
    #[config(default = 0.0)]
    pub dropout: f64,
}

impl FeedForwardConfig {
    /// The effective hidden width.
    pub fn hidden(&self) -> usize {
        self.hidden_dim.unwrap_or(self.dim)
    }
}

impl SourcedInit for FeedForwardConfig {
    type Module<B: Backend> = FeedForward<B>;

    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<FeedForward<S::Backend>, S::Error> {
        let net = key.child("net");
        Ok(FeedForward {
            fc1: LinearConfig::new(self.dim, self.hidden()).init_from(source, &net.child(0))?,
            fc2: LinearConfig::new(self.hidden(), self.dim).init_from(source, &net.child(2))?,
            dropout: DropoutConfig::new(self.dropout).init(),
        })
    }
}

/// Position-wise feed-forward block.
#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    /// Expansion.
    pub fc1: Linear<B>,

    /// Projection.
    pub fc2: Linear<B>,

    /// Output dropout.
    pub dropout: Dropout,
}

impl<B: Backend> FeedForward<B> {
    /// Forward Pass.
    ///
    /// ``[batch, seq, dim] -> [batch, seq, dim]``
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        let x = gelu(self.fc1.forward(input));
        self.dropout.forward(self.fc2.forward(x))
    }
}

/// [`Attention`] Config.
#[derive(Config, Debug)]
pub struct AttentionConfig {
    /// Query (and output) width.
    pub query_dim: usize,

    /// Context width; defaults to `query_dim`.
    #[config(default = "None")]
    pub context_dim: Option<usize>,

    /// Number of heads.
    #[config(default = 8)]
    pub heads: usize,

    /// Width of each head.
    #[config(default = 64)]
    pub dim_head: usize,

    /// Output dropout probability.
    #[config(default = 0.0)]
    pub dropout: f64,
}

impl AttentionConfig {
    /// ``heads * dim_head``.
    pub fn inner_dim(&self) -> usize {
        self.heads * self.dim_head
    }
}

impl SourcedInit for AttentionConfig {
    type Module<B: Backend> = Attention<B>;

    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<Attention<S::Backend>, S::Error> {
        let inner = self.inner_dim();
        let context_dim = self.context_dim.unwrap_or(self.query_dim);

        Ok(Attention {
            to_q: LinearConfig::new(self.query_dim, inner)
                .with_bias(false)
                .init_from(source, &key.child("to_q"))?,
            to_kv: LinearConfig::new(context_dim, inner * 2)
                .with_bias(false)
                .init_from(source, &key.child("to_kv"))?,
            to_out: LinearConfig::new(inner, self.query_dim)
                .init_from(source, &key.child("to_out"))?,
            dropout: DropoutConfig::new(self.dropout).init(),
            heads: self.heads,
            dim_head: self.dim_head,
        })
    }
}

/// Multi-head attention of queries over a context.
#[derive(Module, Debug)]
pub struct Attention<B: Backend> {
    /// Query projection.
    pub to_q: Linear<B>,

    /// Fused key/value projection; keys first.
    pub to_kv: Linear<B>,

    /// Output projection.
    pub to_out: Linear<B>,

    /// Output dropout.
    pub dropout: Dropout,

    /// Number of heads.
    pub heads: usize,

    /// Width of each head.
    pub dim_head: usize,
}

impl<B: Backend> Attention<B> {
    fn split_heads(
        &self,
        x: Tensor<B, 3>,
    ) -> Tensor<B, 4> {
        let [batch, seq, _] = x.dims();
        x.reshape([batch, seq, self.heads, self.dim_head])
            .swap_dims(1, 2)
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, seq, query_dim]``.
    /// - `context`: ``[batch, ctx_seq, context_dim]``; self-attention if `None`.
    ///
    /// # Returns
    ///
    /// ``[batch, seq, query_dim]``
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
        context: Option<Tensor<B, 3>>,
    ) -> Tensor<B, 3> {
        let [batch, seq, _] = input.dims();
        let inner = self.heads * self.dim_head;
        let context = context.unwrap_or_else(|| input.clone());

        let q = self.split_heads(self.to_q.forward(input));
        let kv = self.to_kv.forward(context);
        let k = self.split_heads(kv.clone().narrow(2, 0, inner));
        let v = self.split_heads(kv.narrow(2, inner, inner));

        let scale = (self.dim_head as f64).powf(-0.5);
        let attn = softmax(q.matmul(k.transpose()).mul_scalar(scale), 3);

        let x = attn
            .matmul(v)
            .swap_dims(1, 2)
            .reshape([batch, seq, inner]);

        self.dropout.forward(self.to_out.forward(x))
    }
}

/// The block wrapped by a [`PreNorm`].
#[derive(Config, Debug)]
pub enum PreNormBlockConfig {
    /// An [`Attention`] block.
    Attention(AttentionConfig),

    /// A [`FeedForward`] block.
    FeedForward(FeedForwardConfig),
}

impl From<AttentionConfig> for PreNormBlockConfig {
    fn from(config: AttentionConfig) -> Self {
        Self::Attention(config)
    }
}

impl From<FeedForwardConfig> for PreNormBlockConfig {
    fn from(config: FeedForwardConfig) -> Self {
        Self::FeedForward(config)
    }
}

/// [`PreNorm`] Config.
#[derive(Config, Debug)]
pub struct PreNormConfig {
    /// Input width.
    pub dim: usize,

    /// The wrapped block.
    pub block: PreNormBlockConfig,

    /// When set, the context is normalized too.
    #[config(default = "None")]
    pub context_dim: Option<usize>,

    /// [`LayerNorm`] epsilon.
    #[config(default = 1e-5)]
    pub epsilon: f64,
}

impl SourcedInit for PreNormConfig {
    type Module<B: Backend> = PreNorm<B>;

    fn init_from<S: ParamSource>(
        &self,
        source: &mut S,
        key: &KeyPath,
    ) -> Result<PreNorm<S::Backend>, S::Error> {
        let norm_context = match self.context_dim {
            Some(dim) => Some(
                LayerNormConfig::new(dim)
                    .with_epsilon(self.epsilon)
                    .init_from(source, &key.child("norm_context"))?,
            ),
            None => None,
        };

        let block_key = key.child("fn");
        let block = match &self.block {
            PreNormBlockConfig::Attention(cfg) => {
                PreNormBlock::Attention(cfg.init_from(source, &block_key)?)
            }
            PreNormBlockConfig::FeedForward(cfg) => {
                PreNormBlock::FeedForward(cfg.init_from(source, &block_key)?)
            }
        };

        Ok(PreNorm {
            norm: LayerNormConfig::new(self.dim)
                .with_epsilon(self.epsilon)
                .init_from(source, &key.child("norm"))?,
            norm_context,
            block,
        })
    }
}

/// The block wrapped by a [`PreNorm`].
#[derive(Module, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum PreNormBlock<B: Backend> {
    /// An [`Attention`] block.
    Attention(Attention<B>),

    /// A [`FeedForward`] block.
    FeedForward(FeedForward<B>),
}

/// [`LayerNorm`], then the wrapped block.
#[derive(Module, Debug)]
pub struct PreNorm<B: Backend> {
    /// Input norm.
    pub norm: LayerNorm<B>,

    /// Optional context norm.
    pub norm_context: Option<LayerNorm<B>>,

    /// Wrapped block.
    pub block: PreNormBlock<B>,
}

impl<B: Backend> PreNorm<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, seq, dim]``.
    /// - `context`: passed to an [`Attention`] block; ignored by [`FeedForward`].
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
        context: Option<Tensor<B, 3>>,
    ) -> Tensor<B, 3> {
        let x = self.norm.forward(input);
        let context = match (&self.norm_context, context) {
            (Some(norm), Some(context)) => Some(norm.forward(context)),
            (_, context) => context,
        };

        match &self.block {
            PreNormBlock::Attention(attention) => attention.forward(x, context),
            PreNormBlock::FeedForward(ff) => ff.forward(x),
        }
    }
}
