//! Integration tests for project-manager
//!
//! These tests build real project trees in temporary directories and drive
//! the store through load, update and rescan cycles against the filesystem.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use project_manager::Error;
use project_manager::allocator::CacheDbRange;
use project_manager::config::Settings;
use project_manager::project::ProjectUpdate;
use project_manager::snapshot;
use project_manager::store::ProjectStore;

/// Helper function to create a temporary directory structure for testing
fn create_test_directory() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Helper function to create a file with specified content
fn create_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directories");
    }
    fs::write(path, content).expect("Failed to write file");
}

/// Helper function to create a directory
fn create_dir(path: &Path) {
    fs::create_dir_all(path).expect("Failed to create directory");
}

/// Create a project with `www/` and `api/` and an optional dev port and cache database
fn create_www_project(
    base_path: &Path,
    name: &str,
    port: Option<u16>,
    redis_db: Option<u32>,
) -> PathBuf {
    let project_path = base_path.join(name);

    let dev = port.map_or_else(|| "next dev".to_string(), |p| format!("next dev -p {p}"));
    create_file(
        &project_path.join("www").join("package.json"),
        &format!(r#"{{"name": "{name}", "scripts": {{"dev": "{dev}"}}}}"#),
    );
    create_dir(&project_path.join("api"));

    if let Some(db) = redis_db {
        create_file(
            &project_path.join("api").join(".env"),
            &format!("APP_NAME={name}\nREDIS_DB={db}\n"),
        );
    }

    project_path
}

/// Create a project using the `<name>-app/` and `<name>-api/` convention
fn create_named_project(base_path: &Path, name: &str, start_script: &str) -> PathBuf {
    let project_path = base_path.join(name);

    create_file(
        &project_path.join(format!("{name}-app")).join("package.json"),
        &format!(r#"{{"scripts": {{"start": "{start_script}"}}}}"#),
    );
    create_dir(&project_path.join(format!("{name}-api")));

    project_path
}

fn open_store(root: &Path) -> ProjectStore {
    let mut store = ProjectStore::from_settings(&Settings::for_projects_dir(root));
    store.load().expect("Failed to load store");
    store
}

fn names(store: &ProjectStore) -> Vec<String> {
    store.projects().iter().map(|p| p.name().to_string()).collect()
}

#[test]
fn test_discovers_port_from_www_manifest() {
    let temp_dir = create_test_directory();
    create_www_project(temp_dir.path(), "foo", Some(4010), None);

    let store = open_store(temp_dir.path());

    let foo = store.get("foo").expect("foo should be discovered");
    assert_eq!(foo.port, 4010);
    assert_eq!(foo.display_name, "Foo");
    assert_eq!(foo.directory(), temp_dir.path().join("foo"));
}

#[test]
fn test_discovers_cache_db_from_env() {
    let temp_dir = create_test_directory();
    let project = create_www_project(temp_dir.path(), "shop", None, None);
    create_file(
        &project.join("api").join(".env"),
        "APP_NAME=shop\nREDIS_CACHE_DB=7\nREDIS_DB=2\n",
    );

    let store = open_store(temp_dir.path());

    assert_eq!(store.get("shop").unwrap().cache_db_index, Some(7));
}

#[test]
fn test_half_project_is_not_discovered() {
    let temp_dir = create_test_directory();
    create_dir(&temp_dir.path().join("lonely").join("app"));
    create_dir(&temp_dir.path().join("backend-only").join("api"));
    create_file(&temp_dir.path().join("notes.txt"), "not a project");

    let store = open_store(temp_dir.path());

    assert!(store.projects().is_empty());
}

#[test]
fn test_mixed_layouts_and_port_allocation() {
    let temp_dir = create_test_directory();
    create_www_project(temp_dir.path(), "alpha", None, None);
    create_named_project(temp_dir.path(), "beta", "PORT=3000 node server.js");
    create_www_project(temp_dir.path(), "gamma", None, Some(5));

    let store = open_store(temp_dir.path());

    assert_eq!(names(&store), vec!["alpha", "beta", "gamma"]);

    // alpha claims 3000 first, so beta's configured 3000 is reassigned.
    assert_eq!(store.get("alpha").unwrap().port, 3000);
    assert_eq!(store.get("beta").unwrap().port, 3002);
    assert_eq!(store.get("gamma").unwrap().port, 3001);
    assert_eq!(store.get("gamma").unwrap().cache_db_index, Some(5));

    let mut ports: Vec<u16> = store.projects().iter().map(|p| p.port).collect();
    ports.sort_unstable();
    ports.dedup();
    assert_eq!(ports.len(), 3);
}

#[test]
fn test_reload_is_idempotent() {
    let temp_dir = create_test_directory();
    create_www_project(temp_dir.path(), "alpha", Some(3000), Some(1));
    create_www_project(temp_dir.path(), "beta", Some(3000), Some(1));
    create_named_project(temp_dir.path(), "gamma", "vite --port=5173");

    let first = open_store(temp_dir.path());
    let first_file = fs::read_to_string(first.data_file()).unwrap();

    let second = open_store(temp_dir.path());
    let second_file = fs::read_to_string(second.data_file()).unwrap();

    assert_eq!(first.projects(), second.projects());
    assert_eq!(first_file, second_file);
}

#[test]
fn test_snapshot_survives_and_picks_up_new_projects() {
    let temp_dir = create_test_directory();
    create_www_project(temp_dir.path(), "alpha", None, None);

    let mut store = open_store(temp_dir.path());
    store
        .update(
            "alpha",
            ProjectUpdate::default()
                .port(3003)
                .backend_url(Some("http://localhost:8000".to_string())),
        )
        .unwrap();

    create_www_project(temp_dir.path(), "beta", None, None);
    let store = open_store(temp_dir.path());

    let alpha = store.get("alpha").unwrap();
    assert_eq!(alpha.port, 3003);
    assert_eq!(alpha.backend_url.as_deref(), Some("http://localhost:8000"));
    assert_eq!(store.get("beta").unwrap().port, 3000);
}

#[test]
fn test_removed_directory_is_pruned() {
    let temp_dir = create_test_directory();
    create_www_project(temp_dir.path(), "alpha", None, None);
    let beta = create_www_project(temp_dir.path(), "beta", None, None);
    open_store(temp_dir.path());

    fs::remove_dir_all(&beta).unwrap();
    let store = open_store(temp_dir.path());

    assert_eq!(names(&store), vec!["alpha"]);
    let records = snapshot::load(store.data_file()).unwrap();
    assert_eq!(records.len(), 1);
}

#[test]
fn test_broken_layout_is_pruned() {
    let temp_dir = create_test_directory();
    let alpha = create_www_project(temp_dir.path(), "alpha", None, None);
    open_store(temp_dir.path());

    fs::remove_dir_all(alpha.join("api")).unwrap();
    let store = open_store(temp_dir.path());

    assert!(store.get("alpha").is_none());
}

#[test]
fn test_config_drift_overwrites_snapshot() {
    let temp_dir = create_test_directory();
    let alpha = create_www_project(temp_dir.path(), "alpha", Some(3100), Some(3));
    open_store(temp_dir.path());

    create_file(
        &alpha.join("www").join("package.json"),
        r#"{"scripts": {"dev": "next dev -p 3200"}}"#,
    );
    create_file(&alpha.join("api").join(".env"), "REDIS_DB=8\n");
    let store = open_store(temp_dir.path());

    let alpha = store.get("alpha").unwrap();
    assert_eq!(alpha.port, 3200);
    assert_eq!(alpha.cache_db_index, Some(8));
}

#[test]
fn test_update_port_conflict_leaves_state_unchanged() {
    let temp_dir = create_test_directory();
    create_www_project(temp_dir.path(), "alpha", Some(3000), None);
    create_www_project(temp_dir.path(), "beta", Some(3001), None);
    let mut store = open_store(temp_dir.path());
    let before = fs::read_to_string(store.data_file()).unwrap();

    let result = store.update(
        "beta",
        ProjectUpdate::default()
            .port(3000)
            .frontend_url(Some("http://changed".to_string())),
    );

    assert!(matches!(result, Err(Error::PortConflict { port: 3000, .. })));
    let beta = store.get("beta").unwrap();
    assert_eq!(beta.port, 3001);
    assert_eq!(beta.frontend_url.as_deref(), Some("https://app.beta.test"));
    assert_eq!(fs::read_to_string(store.data_file()).unwrap(), before);
}

#[test]
fn test_rescan_discards_snapshot() {
    let temp_dir = create_test_directory();
    create_www_project(temp_dir.path(), "alpha", None, None);
    let mut store = open_store(temp_dir.path());
    store
        .update(
            "alpha",
            ProjectUpdate::default()
                .port(3333)
                .frontend_process_id(Some(999)),
        )
        .unwrap();

    store.rescan().unwrap();

    let alpha = store.get("alpha").unwrap();
    assert_eq!(alpha.port, 3000);
    assert_eq!(alpha.frontend_process_id, None);
    assert_eq!(snapshot::load(store.data_file()).unwrap()[0].port, 3000);
}

#[test]
fn test_malformed_snapshot_is_rebuilt() {
    let temp_dir = create_test_directory();
    create_www_project(temp_dir.path(), "alpha", Some(3500), None);
    create_file(&temp_dir.path().join(".projects.json"), "{ definitely not json");

    let store = open_store(temp_dir.path());

    assert_eq!(store.get("alpha").unwrap().port, 3500);
    assert_eq!(snapshot::load(store.data_file()).unwrap().len(), 1);
}

#[test]
fn test_invalid_manifest_falls_back_to_allocation() {
    let temp_dir = create_test_directory();
    let alpha = temp_dir.path().join("alpha");
    create_file(&alpha.join("www").join("package.json"), "{ not json");
    create_dir(&alpha.join("api"));
    create_file(
        &alpha.join("api").join("package.json"),
        r#"{"scripts": {"serve": "php -S localhost --port 99999"}}"#,
    );

    let store = open_store(temp_dir.path());

    assert_eq!(store.get("alpha").unwrap().port, 3000);
}

#[test]
fn test_next_config_port_fallback() {
    let temp_dir = create_test_directory();
    let alpha = temp_dir.path().join("alpha");
    create_file(
        &alpha.join("app").join("package.json"),
        r#"{"scripts": {"dev": "next dev"}, "dependencies": {"next": "14.0.0"}, "config": {"port": 3777}}"#,
    );
    create_dir(&alpha.join("api"));

    let store = open_store(temp_dir.path());

    assert_eq!(store.get("alpha").unwrap().port, 3777);
}

#[test]
fn test_allocation_helpers_follow_store_contents() {
    let temp_dir = create_test_directory();
    for (i, name) in ["a", "b", "c", "d", "e", "f"].iter().enumerate() {
        create_www_project(temp_dir.path(), name, None, Some(u32::try_from(i).unwrap()));
    }

    let store = open_store(temp_dir.path());

    assert_eq!(store.next_port(), 3006);
    assert_eq!(store.next_cache_db_index().unwrap(), 6);
}

#[test]
fn test_cache_db_exhaustion_is_reported() {
    let temp_dir = create_test_directory();
    create_www_project(temp_dir.path(), "a", None, Some(0));
    create_www_project(temp_dir.path(), "b", None, Some(1));

    let mut store = ProjectStore::new(
        temp_dir.path(),
        temp_dir.path().join(".projects.json"),
        CacheDbRange { min: 0, max: 1 },
    );
    store.load().unwrap();

    assert!(matches!(
        store.next_cache_db_index(),
        Err(Error::CacheDbExhausted { min: 0, max: 1 })
    ));
}

#[test]
fn test_custom_data_file_location() {
    let temp_dir = create_test_directory();
    let data_dir = create_test_directory();
    create_www_project(temp_dir.path(), "alpha", None, None);

    let mut settings = Settings::for_projects_dir(temp_dir.path());
    settings.data_file = data_dir.path().join("state").join("projects.json");
    let store = ProjectStore::open(&settings).unwrap();

    assert!(settings.data_file.exists());
    assert!(!temp_dir.path().join(".projects.json").exists());
    assert_eq!(store.projects().len(), 1);
}
