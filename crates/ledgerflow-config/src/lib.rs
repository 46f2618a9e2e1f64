//! Ledgerflow Config
//!
//! This crate contains the serializable pipeline configuration types for
//! ledgerflow. These types describe a pipeline before it is turned into
//! runtime state by `ledgerflow-pipeline`.
//!
//! Configuration can be loaded from:
//! - JSON files (via CLI with `--pipeline=pipeline.json`)
//! - The built-in audit report definition ([`PipelineDef::audit_report`])
//!
//! The pipeline crate takes a [`PipelineDef`], validates it, and builds the
//! step list, pacing layer and error policy from it.

mod action;
mod error;
mod pipeline;
mod policy;

pub use action::Action;
pub use error::ConfigError;
pub use pipeline::{PipelineDef, StepDef};
pub use policy::{ErrorPolicy, PacingConfig, PersistConfig};
