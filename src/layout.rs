//! Recognition of frontend/backend directory conventions.
//!
//! A project directory holds a frontend and a backend checkout side by side.
//! Three naming conventions are recognized; both halves of a convention must
//! be present for the directory to count as a project.

use std::path::{Path, PathBuf};

/// Directory conventions, in the priority order used to locate config files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// `<name>-app/` and `<name>-api/`
    NamedPair,

    /// `app/` and `api/`
    AppApi,

    /// `www/` and `api/`
    WwwApi,
}

impl Layout {
    pub const ALL: [Self; 3] = [Self::NamedPair, Self::AppApi, Self::WwwApi];

    /// Frontend directory of this convention for a project called `name`.
    #[must_use]
    pub fn frontend_dir(self, root: &Path, name: &str) -> PathBuf {
        match self {
            Self::NamedPair => root.join(format!("{name}-app")),
            Self::AppApi => root.join("app"),
            Self::WwwApi => root.join("www"),
        }
    }

    /// Backend directory of this convention for a project called `name`.
    #[must_use]
    pub fn backend_dir(self, root: &Path, name: &str) -> PathBuf {
        match self {
            Self::NamedPair => root.join(format!("{name}-api")),
            Self::AppApi | Self::WwwApi => root.join("api"),
        }
    }

    fn matches(self, root: &Path, name: &str) -> bool {
        self.frontend_dir(root, name).is_dir() && self.backend_dir(root, name).is_dir()
    }
}

/// The leaf directory name, used as the project's name.
#[must_use]
pub fn leaf_name(dir: &Path) -> Option<String> {
    dir.file_name()
        .and_then(|n| n.to_str())
        .map(ToString::to_string)
}

/// Detect the first matching convention for `dir`, naming it after its leaf.
#[must_use]
pub fn detect(dir: &Path) -> Option<Layout> {
    let name = leaf_name(dir)?;
    detect_named(dir, &name)
}

/// Detect the first matching convention for `dir` with an explicit project name.
///
/// Returns `None` when `dir` is not a directory or no convention has both
/// its frontend and backend halves present.
#[must_use]
pub fn detect_named(dir: &Path, name: &str) -> Option<Layout> {
    if !dir.is_dir() {
        return None;
    }

    Layout::ALL.into_iter().find(|layout| layout.matches(dir, name))
}

/// Candidate configuration file locations inside a project directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigLocations {
    /// Frontend `package.json` candidates, highest priority first.
    pub frontend_manifests: Vec<PathBuf>,

    /// Backend `package.json` candidates, checked after the frontend ones.
    pub backend_manifests: Vec<PathBuf>,

    /// Backend `.env` candidates, highest priority first.
    pub env_files: Vec<PathBuf>,
}

impl ConfigLocations {
    #[must_use]
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            frontend_manifests: vec![
                dir.join("www").join("package.json"),
                dir.join("app").join("package.json"),
                dir.join(format!("{name}-app")).join("package.json"),
                dir.join("package.json"),
            ],
            backend_manifests: vec![
                dir.join("api").join("package.json"),
                dir.join(format!("{name}-api")).join("package.json"),
            ],
            env_files: vec![
                dir.join("api").join(".env"),
                dir.join(format!("{name}-api")).join(".env"),
            ],
        }
    }

    /// All manifest candidates, frontend first, then backend.
    pub fn manifests(&self) -> impl Iterator<Item = &PathBuf> {
        self.frontend_manifests
            .iter()
            .chain(self.backend_manifests.iter())
    }
}

/// Directory a frontend dev server should run in.
///
/// This is the parent of the first frontend manifest candidate that exists.
#[must_use]
pub fn frontend_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    ConfigLocations::new(dir, name)
        .frontend_manifests
        .into_iter()
        .find(|manifest| manifest.is_file())
        .and_then(|manifest| manifest.parent().map(Path::to_path_buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project_dir(tmp: &TempDir, name: &str, subdirs: &[&str]) -> PathBuf {
        let dir = tmp.path().join(name);
        fs::create_dir_all(&dir).unwrap();
        for sub in subdirs {
            fs::create_dir_all(dir.join(sub)).unwrap();
        }
        dir
    }

    #[test]
    fn test_detect_named_pair() {
        let tmp = TempDir::new().unwrap();
        let dir = project_dir(&tmp, "shop", &["shop-app", "shop-api"]);

        assert_eq!(detect(&dir), Some(Layout::NamedPair));
    }

    #[test]
    fn test_detect_app_api() {
        let tmp = TempDir::new().unwrap();
        let dir = project_dir(&tmp, "blog", &["app", "api"]);

        assert_eq!(detect(&dir), Some(Layout::AppApi));
    }

    #[test]
    fn test_detect_www_api() {
        let tmp = TempDir::new().unwrap();
        let dir = project_dir(&tmp, "site", &["www", "api"]);

        assert_eq!(detect(&dir), Some(Layout::WwwApi));
    }

    #[test]
    fn test_detect_priority_named_first() {
        let tmp = TempDir::new().unwrap();
        let dir = project_dir(&tmp, "mix", &["mix-app", "mix-api", "app", "api", "www"]);

        assert_eq!(detect(&dir), Some(Layout::NamedPair));
    }

    #[test]
    fn test_detect_requires_both_halves() {
        let tmp = TempDir::new().unwrap();

        assert_eq!(detect(&project_dir(&tmp, "a", &["app"])), None);
        assert_eq!(detect(&project_dir(&tmp, "b", &["api"])), None);
        assert_eq!(detect(&project_dir(&tmp, "c", &["www"])), None);
        assert_eq!(detect(&project_dir(&tmp, "d", &["d-app", "api"])), None);
        assert_eq!(detect(&project_dir(&tmp, "e", &[])), None);
    }

    #[test]
    fn test_detect_ignores_files_named_like_dirs() {
        let tmp = TempDir::new().unwrap();
        let dir = project_dir(&tmp, "files", &["app"]);
        fs::write(dir.join("api"), "not a directory").unwrap();

        assert_eq!(detect(&dir), None);
    }

    #[test]
    fn test_detect_missing_directory() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(detect(&tmp.path().join("gone")), None);
    }

    #[test]
    fn test_config_locations_order() {
        let root = Path::new("/p/foo");
        let locations = ConfigLocations::new(root, "foo");

        let manifests: Vec<_> = locations.manifests().cloned().collect();
        assert_eq!(
            manifests,
            vec![
                root.join("www/package.json"),
                root.join("app/package.json"),
                root.join("foo-app/package.json"),
                root.join("package.json"),
                root.join("api/package.json"),
                root.join("foo-api/package.json"),
            ]
        );
        assert_eq!(
            locations.env_files,
            vec![root.join("api/.env"), root.join("foo-api/.env")]
        );
    }

    #[test]
    fn test_frontend_dir_picks_first_manifest() {
        let tmp = TempDir::new().unwrap();
        let dir = project_dir(&tmp, "foo", &["foo-app", "foo-api", "app"]);
        fs::write(dir.join("foo-app/package.json"), "{}").unwrap();

        assert_eq!(frontend_dir(&dir, "foo"), Some(dir.join("foo-app")));

        fs::write(dir.join("app/package.json"), "{}").unwrap();
        assert_eq!(frontend_dir(&dir, "foo"), Some(dir.join("app")));
    }

    #[test]
    fn test_frontend_dir_none_without_manifest() {
        let tmp = TempDir::new().unwrap();
        let dir = project_dir(&tmp, "foo", &["app", "api"]);

        assert_eq!(frontend_dir(&dir, "foo"), None);
    }
}
