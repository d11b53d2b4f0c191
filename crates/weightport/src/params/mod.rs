//! # Parameter Trees, Structures and Sources

pub mod source;
pub mod structure;
pub mod tree;

pub use source::{InitSource, ParamInit, ParamSource, TreeSource, infallible};
pub use structure::ParamStructure;
pub use tree::ParamTree;
