//! Persisted project snapshot.
//!
//! The snapshot is a pretty-printed JSON array with one record per project:
//!
//! ```json
//! [
//!   {
//!     "name": "my-shop",
//!     "pretty_name": "My Shop",
//!     "port": 3001,
//!     "redis_db": 4,
//!     "directory": "/home/me/projects/personal/my-shop",
//!     "fe_url": "https://app.my-shop.test",
//!     "be_url": "https://api.my-shop.test"
//!   }
//! ]
//! ```
//!
//! A URL that was cleared is stored as `null` and stays cleared; a missing
//! or empty URL falls back to the naming convention on load.
//!
//! Writes go through a temporary file in the destination directory that is
//! then renamed over the destination, so a reader never sees a partial file.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::project::Project;

/// One persisted project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,

    #[serde(default)]
    pub pretty_name: String,

    pub port: u16,

    #[serde(default)]
    pub redis_db: Option<u32>,

    pub directory: PathBuf,

    /// `None` when the key is absent, `Some(None)` for an explicit `null`
    #[serde(default, deserialize_with = "present")]
    pub fe_url: Option<Option<String>>,

    #[serde(default, deserialize_with = "present")]
    pub be_url: Option<Option<String>>,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::deserialize(deserializer).map(Some)
}

fn loaded_url(stored: Option<Option<String>>, default: Option<String>) -> Option<String> {
    match stored {
        Some(None) => None,
        Some(Some(url)) if !url.is_empty() => Some(url),
        _ => default,
    }
}

impl From<&Project> for Record {
    fn from(project: &Project) -> Self {
        Self {
            name: project.name().to_string(),
            pretty_name: project.display_name.clone(),
            port: project.port,
            redis_db: project.cache_db_index,
            directory: project.directory().to_path_buf(),
            fe_url: Some(project.frontend_url.clone()),
            be_url: Some(project.backend_url.clone()),
        }
    }
}

impl From<Record> for Project {
    fn from(record: Record) -> Self {
        let mut project = Self::new(record.name, record.directory, record.port, record.redis_db);

        if !record.pretty_name.is_empty() {
            project.display_name = record.pretty_name;
        }
        project.frontend_url = loaded_url(record.fe_url, project.frontend_url.take());
        project.backend_url = loaded_url(record.be_url, project.backend_url.take());

        project
    }
}

/// Load persisted records from `path`.
///
/// A missing file yields `None`. An unreadable or malformed file is logged
/// and treated as an empty snapshot; individual malformed records are
/// dropped while the rest are kept.
#[must_use]
pub fn load(path: &Path) -> Option<Vec<Record>> {
    if !path.exists() {
        debug!("No saved projects at {}", path.display());
        return None;
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!("Error reading projects file {}: {e}", path.display());
            return Some(Vec::new());
        }
    };

    let entries = match serde_json::from_str::<Vec<Value>>(&content) {
        Ok(entries) => entries,
        Err(e) => {
            error!("Error parsing projects file {}: {e}", path.display());
            return Some(Vec::new());
        }
    };

    let records = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Record>(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping malformed project record: {e}");
                None
            }
        })
        .collect::<Vec<_>>();

    debug!("Loaded {} saved projects from {}", records.len(), path.display());
    Some(records)
}

/// Serialize `projects` to the snapshot format.
///
/// # Errors
///
/// Fails only if JSON serialization fails.
pub fn to_json(projects: &[Project]) -> Result<String> {
    let records: Vec<Record> = projects.iter().map(Record::from).collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

/// Atomically write `projects` to `path`.
///
/// # Errors
///
/// Returns [`Error::Persist`] if the parent directory cannot be created, the
/// temporary file cannot be written, or the final rename fails. The previous
/// file at `path` is left untouched in every failure case.
pub fn save(path: &Path, projects: &[Project]) -> Result<()> {
    let json = to_json(projects)?;
    atomic_write(path, json.as_bytes())?;

    debug!("Saved {} projects to {}", projects.len(), path.display());
    Ok(())
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let persist_error = |source| Error::Persist {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(persist_error)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(persist_error)?;
    tmp.write_all(data).map_err(persist_error)?;
    tmp.as_file().sync_all().map_err(persist_error)?;
    tmp.persist(path).map_err(|e| persist_error(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_from_project() {
        let project = Project::new("my-shop", "/p/my-shop", 3001, Some(4));
        let record = Record::from(&project);

        assert_eq!(record.name, "my-shop");
        assert_eq!(record.pretty_name, "My Shop");
        assert_eq!(record.port, 3001);
        assert_eq!(record.redis_db, Some(4));
        assert_eq!(
            record.fe_url,
            Some(Some("https://app.my-shop.test".to_string()))
        );
        assert_eq!(
            record.be_url,
            Some(Some("https://api.my-shop.test".to_string()))
        );
    }

    #[test]
    fn test_project_from_record_fills_defaults() {
        let record = Record {
            name: "foo".to_string(),
            pretty_name: String::new(),
            port: 3000,
            redis_db: None,
            directory: PathBuf::from("/p/foo"),
            fe_url: Some(Some(String::new())),
            be_url: None,
        };
        let project = Project::from(record);

        assert_eq!(project.display_name, "Foo");
        assert_eq!(project.frontend_url.as_deref(), Some("https://app.foo.test"));
        assert_eq!(project.backend_url.as_deref(), Some("https://api.foo.test"));
        assert_eq!(project.frontend_process_id, None);
    }

    #[test]
    fn test_project_from_record_keeps_overrides() {
        let record = Record {
            name: "foo".to_string(),
            pretty_name: "Foo Deluxe".to_string(),
            port: 3000,
            redis_db: Some(2),
            directory: PathBuf::from("/p/foo"),
            fe_url: Some(Some("http://localhost:3000".to_string())),
            be_url: Some(Some("http://localhost:8000".to_string())),
        };
        let project = Project::from(record);

        assert_eq!(project.display_name, "Foo Deluxe");
        assert_eq!(project.frontend_url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(project.backend_url.as_deref(), Some("http://localhost:8000"));
    }

    #[test]
    fn test_json_field_names() {
        let json = to_json(&[Project::new("foo", "/p/foo", 3000, None)]).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        let record = &value[0];

        assert_eq!(record["name"], "foo");
        assert_eq!(record["pretty_name"], "Foo");
        assert_eq!(record["port"], 3000);
        assert!(record["redis_db"].is_null());
        assert_eq!(record["directory"], "/p/foo");
        assert_eq!(record["fe_url"], "https://app.foo.test");
        assert_eq!(record["be_url"], "https://api.foo.test");
    }

    #[test]
    fn test_cleared_urls_survive_reload() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".projects.json");
        let mut project = Project::new("foo", "/p/foo", 3000, None);
        project.frontend_url = None;

        save(&path, &[project]).unwrap();
        let value: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(value[0]["fe_url"].is_null());

        let loaded = Project::from(load(&path).unwrap().remove(0));
        assert_eq!(loaded.frontend_url, None);
        assert_eq!(loaded.backend_url.as_deref(), Some("https://api.foo.test"));
    }

    #[test]
    fn test_missing_url_keys_use_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".projects.json");
        fs::write(&path, r#"[{"name": "foo", "port": 3000, "directory": "/p/foo"}]"#).unwrap();

        let record = load(&path).unwrap().remove(0);
        assert_eq!(record.fe_url, None);

        let project = Project::from(record);
        assert_eq!(project.frontend_url.as_deref(), Some("https://app.foo.test"));
        assert_eq!(project.backend_url.as_deref(), Some("https://api.foo.test"));
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        assert!(load(&tmp.path().join("nope.json")).is_none());
    }

    #[test]
    fn test_load_malformed_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("projects.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(load(&path), Some(Vec::new()));
    }

    #[test]
    fn test_load_drops_malformed_records() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("projects.json");
        fs::write(
            &path,
            r#"[
                {"name": "ok", "pretty_name": "Ok", "port": 3000, "redis_db": null, "directory": "/p/ok"},
                {"name": "bad-port", "port": 70000, "directory": "/p/bad"},
                {"pretty_name": "No Name", "port": 3001, "directory": "/p/x"}
            ]"#,
        )
        .unwrap();

        let records = load(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "ok");
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join(".projects.json");
        let projects = vec![
            Project::new("a", "/p/a", 3000, Some(0)),
            Project::new("b", "/p/b", 3001, None),
        ];

        save(&path, &projects).unwrap();
        let loaded: Vec<Project> = load(&path)
            .unwrap()
            .into_iter()
            .map(Project::from)
            .collect();

        assert_eq!(loaded, projects);
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".projects.json");

        save(&path, &[Project::new("a", "/p/a", 3000, None)]).unwrap();
        save(&path, &[Project::new("b", "/p/b", 3001, None)]).unwrap();

        let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(load(&path).unwrap()[0].name, "b");
    }

    #[test]
    #[cfg(unix)]
    fn test_failed_save_keeps_previous_file() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("data");
        let path = dir.join(".projects.json");
        save(&path, &[Project::new("a", "/p/a", 3000, None)]).unwrap();

        fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).unwrap();
        let result = save(&path, &[Project::new("b", "/p/b", 3001, None)]);
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();

        // Running as root bypasses directory permissions.
        if result.is_err() {
            assert!(matches!(result, Err(Error::Persist { .. })));
            assert_eq!(load(&path).unwrap()[0].name, "a");
        }
    }
}
