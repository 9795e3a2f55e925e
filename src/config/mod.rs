//! Minimal configuration module for reagent
//!
//! Only exports pure data types. Discovery, file loading, and merging are the
//! caller's concern; the core only accepts fully resolved settings.

pub mod types;

pub use types::{ModelParams, ModelSettings};
