//! Configuration types and options for the application.
//!
//! This module contains the configuration file format and the resolved
//! settings used throughout the application.

pub mod file;
pub mod settings;

pub use file::FileConfig;
pub use settings::{DevServerSettings, ProvisionSettings, Settings};
