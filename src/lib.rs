//! # project-manager
//!
//! Track local web application checkouts, each a frontend and a backend
//! side by side under one projects directory.
//!
//! This library provides the core of the project-manager CLI: detecting
//! projects and their port and cache database from the filesystem,
//! reconciling them with a persisted snapshot, allocating non-conflicting
//! resources, and the collaborators that start dev servers, provision new
//! projects and open them in a browser or editor.

pub mod allocator;
pub mod config;
pub mod error;
pub mod extract;
pub mod launcher;
pub mod layout;
pub mod process;
pub mod project;
pub mod provision;
pub mod scanner;
pub mod snapshot;
pub mod store;

pub use error::{Error, Result};
