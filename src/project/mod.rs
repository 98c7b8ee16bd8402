//! Project records and collections.
//!
//! ## Main Parts
//!
//! - [`Project`] - A tracked frontend/backend checkout pair with its port and cache database
//! - [`ProjectUpdate`] - Typed partial update of a project's mutable fields
//! - [`Projects`] - A collection of projects with listing and selection helpers

#[allow(clippy::module_inception)]
pub mod project;
pub mod projects;

pub use project::{
    Project, ProjectUpdate, default_backend_url, default_frontend_url, display_name_for,
};
pub use projects::Projects;
