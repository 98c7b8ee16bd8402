//! Core project data structures.
//!
//! This module defines the record tracked for every local project checkout
//! and the typed partial update that may be applied to it.

use std::{
    fmt::{Display, Formatter, Result},
    path::{Path, PathBuf},
};

/// Human-readable label derived from a project name.
///
/// Hyphens become spaces and every word is title-cased: the first letter
/// after a non-letter is upper-cased and the remaining letters lower-cased.
///
/// # Examples
///
/// ```
/// # use project_manager::project::display_name_for;
/// assert_eq!(display_name_for("my-shop"), "My Shop");
/// ```
#[must_use]
pub fn display_name_for(name: &str) -> String {
    let mut pretty = String::with_capacity(name.len());
    let mut previous_is_letter = false;

    for c in name.replace('-', " ").chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                pretty.extend(c.to_lowercase());
            } else {
                pretty.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            pretty.push(c);
            previous_is_letter = false;
        }
    }

    pretty
}

/// Conventional frontend URL for a project.
#[must_use]
pub fn default_frontend_url(name: &str) -> String {
    format!("https://app.{name}.test")
}

/// Conventional backend URL for a project.
#[must_use]
pub fn default_backend_url(name: &str) -> String {
    format!("https://api.{name}.test")
}

/// A tracked local project: a frontend and backend checkout pair.
///
/// `name` and `directory` identify the project and cannot change once it is
/// created. Everything else is either re-derived on reconciliation or
/// changed through a [`ProjectUpdate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Project {
    name: String,
    directory: PathBuf,

    /// Human-readable label
    pub display_name: String,

    /// Dev-server port, unique across the store
    pub port: u16,

    /// Cache database index, unique across projects that have one
    pub cache_db_index: Option<u32>,

    pub frontend_url: Option<String>,
    pub backend_url: Option<String>,

    /// PID of a running frontend dev server. Runtime state only, never
    /// persisted or discovered.
    pub frontend_process_id: Option<u32>,
}

impl Project {
    /// Create a project with the conventional display name and URLs.
    ///
    /// # Arguments
    ///
    /// * `name` - Leaf directory name, used as the project's key
    /// * `directory` - Absolute path of the project directory
    /// * `port` - Dev-server port
    /// * `cache_db_index` - Cache database index, if the project has one
    pub fn new(
        name: impl Into<String>,
        directory: impl Into<PathBuf>,
        port: u16,
        cache_db_index: Option<u32>,
    ) -> Self {
        let name = name.into();

        Self {
            display_name: display_name_for(&name),
            frontend_url: Some(default_frontend_url(&name)),
            backend_url: Some(default_backend_url(&name)),
            directory: directory.into(),
            port,
            cache_db_index,
            frontend_process_id: None,
            name,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Whether a frontend dev server is recorded as running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.frontend_process_id.is_some()
    }

    /// Frontend URL, falling back to the naming convention.
    #[must_use]
    pub fn frontend_url_or_default(&self) -> String {
        self.frontend_url
            .clone()
            .unwrap_or_else(|| default_frontend_url(&self.name))
    }

    /// Backend URL, falling back to the naming convention.
    #[must_use]
    pub fn backend_url_or_default(&self) -> String {
        self.backend_url
            .clone()
            .unwrap_or_else(|| default_backend_url(&self.name))
    }
}

impl Display for Project {
    /// Format as `<display name> (<name>) :<port>`, with the cache database
    /// when one is assigned.
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{} ({}) :{}", self.display_name, self.name, self.port)?;

        if let Some(index) = self.cache_db_index {
            write!(f, " db {index}")?;
        }

        Ok(())
    }
}

/// A partial update of a project's mutable fields.
///
/// Fields left as `None` are untouched. The nested `Option`s allow clearing
/// nullable fields: `Some(None)` sets the field to null.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProjectUpdate {
    pub port: Option<u16>,
    pub cache_db_index: Option<Option<u32>>,
    pub frontend_url: Option<Option<String>>,
    pub backend_url: Option<Option<String>>,
    pub frontend_process_id: Option<Option<u32>>,
}

impl ProjectUpdate {
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub const fn cache_db_index(mut self, index: Option<u32>) -> Self {
        self.cache_db_index = Some(index);
        self
    }

    #[must_use]
    pub fn frontend_url(mut self, url: Option<String>) -> Self {
        self.frontend_url = Some(url);
        self
    }

    #[must_use]
    pub fn backend_url(mut self, url: Option<String>) -> Self {
        self.backend_url = Some(url);
        self
    }

    #[must_use]
    pub const fn frontend_process_id(mut self, pid: Option<u32>) -> Self {
        self.frontend_process_id = Some(pid);
        self
    }

    /// Whether applying this update would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.port.is_none()
            && self.cache_db_index.is_none()
            && self.frontend_url.is_none()
            && self.backend_url.is_none()
            && self.frontend_process_id.is_none()
    }

    /// Apply every set field to `project`.
    pub fn apply_to(self, project: &mut Project) {
        if let Some(port) = self.port {
            project.port = port;
        }
        if let Some(index) = self.cache_db_index {
            project.cache_db_index = index;
        }
        if let Some(url) = self.frontend_url {
            project.frontend_url = url;
        }
        if let Some(url) = self.backend_url {
            project.backend_url = url;
        }
        if let Some(pid) = self.frontend_process_id {
            project.frontend_process_id = pid;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_for() {
        assert_eq!(display_name_for("shop"), "Shop");
        assert_eq!(display_name_for("my-cool-app"), "My Cool App");
        assert_eq!(display_name_for("API-gateway"), "Api Gateway");
        assert_eq!(display_name_for("app2go"), "App2Go");
        assert_eq!(display_name_for(""), "");
    }

    #[test]
    fn test_new_derives_defaults() {
        let project = Project::new("my-shop", "/p/my-shop", 3001, Some(4));

        assert_eq!(project.name(), "my-shop");
        assert_eq!(project.directory(), Path::new("/p/my-shop"));
        assert_eq!(project.display_name, "My Shop");
        assert_eq!(
            project.frontend_url.as_deref(),
            Some("https://app.my-shop.test")
        );
        assert_eq!(
            project.backend_url.as_deref(),
            Some("https://api.my-shop.test")
        );
        assert!(!project.is_running());
    }

    #[test]
    fn test_url_fallbacks() {
        let mut project = Project::new("foo", "/p/foo", 3000, None);
        project.frontend_url = None;
        project.backend_url = Some("https://api.example.com".to_string());

        assert_eq!(project.frontend_url_or_default(), "https://app.foo.test");
        assert_eq!(project.backend_url_or_default(), "https://api.example.com");
    }

    #[test]
    fn test_display() {
        let project = Project::new("foo", "/p/foo", 3000, None);
        assert_eq!(project.to_string(), "Foo (foo) :3000");

        let project = Project::new("foo-bar", "/p/foo-bar", 3002, Some(7));
        assert_eq!(project.to_string(), "Foo Bar (foo-bar) :3002 db 7");
    }

    #[test]
    fn test_update_applies_only_set_fields() {
        let mut project = Project::new("foo", "/p/foo", 3000, Some(1));

        ProjectUpdate::default()
            .port(3005)
            .frontend_process_id(Some(42))
            .apply_to(&mut project);

        assert_eq!(project.port, 3005);
        assert_eq!(project.cache_db_index, Some(1));
        assert_eq!(project.frontend_process_id, Some(42));
        assert_eq!(
            project.frontend_url.as_deref(),
            Some("https://app.foo.test")
        );
    }

    #[test]
    fn test_update_can_clear_nullable_fields() {
        let mut project = Project::new("foo", "/p/foo", 3000, Some(1));
        project.frontend_process_id = Some(9);

        ProjectUpdate::default()
            .cache_db_index(None)
            .frontend_url(None)
            .frontend_process_id(None)
            .apply_to(&mut project);

        assert_eq!(project.cache_db_index, None);
        assert_eq!(project.frontend_url, None);
        assert_eq!(project.frontend_process_id, None);
    }

    #[test]
    fn test_update_is_empty() {
        assert!(ProjectUpdate::default().is_empty());
        assert!(!ProjectUpdate::default().port(3000).is_empty());
        assert!(!ProjectUpdate::default().backend_url(None).is_empty());
    }
}
