// src/lib.rs

pub mod assistant;
pub mod config;
pub mod core;
pub mod error;
pub mod persistence;
pub mod plugins;
pub mod registry;

pub use crate::core::engine::{CommandEngine, Interpretation};
pub use crate::core::segmenter::SegmentationConfig;
pub use crate::core::types::{CommandDefinition, ResolvedCommand, SegmentedCommand};
