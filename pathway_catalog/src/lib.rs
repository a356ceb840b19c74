//! # Pathway Catalog
//!
//! The content catalog a pathway is assembled from: tags, tag classes, plot blocks
//! and plot block conditions. This crate holds passive data only and performs no I/O;
//! the validation engine in `pathway_validation` reads it.

pub mod catalog;
pub mod pathway;
pub mod plot_blocks;
pub mod tags;

pub use catalog::*;
pub use pathway::*;
pub use plot_blocks::*;
pub use tags::*;
