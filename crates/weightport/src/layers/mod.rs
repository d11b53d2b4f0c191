//! # Layers Built from Parameter Sources
//!
//! * [`sourced`] - [`SourcedInit`] for the stock `burn` layers.
//! * [`conv_norm`] - ``Conv2d + BatchNorm2d`` block.

pub mod conv_norm;
pub mod sourced;

pub use sourced::SourcedInit;
