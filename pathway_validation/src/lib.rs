//! # Pathway Validation
//!
//! The validation and conflict-detection engine for story pathways. Given a loaded
//! [`pathway_catalog::Catalog`] and a candidate pathway, it reports rule violations,
//! conflicts with actionable resolutions, and a 0-100 compatibility score.
//!
//! ## Core Components
//!
//! - **rules**: the four validators (tag class rules, plot block conflicts,
//!   circular references, dependencies)
//! - **findings**: errors, warnings, suggestions, conflicts and scoring
//! - **service**: the orchestrating [`PathwayValidator`] with its result cache
//!   and incremental feedback
//!
//! ## Design Philosophy
//!
//! - **Total**: `validate` always returns a well-formed result, even on internal faults
//! - **Data-driven**: conflicting user choices are findings, never Rust errors
//! - **Instance-owned state**: each validator owns its cache; there are no globals

pub mod config;
pub mod error;
pub mod findings;
pub mod rules;
pub mod service;

pub use config::*;
pub use error::*;
pub use findings::*;
pub use rules::*;
pub use service::*;
