//! The project store: reconciliation of the persisted snapshot with the
//! filesystem, and the operations that mutate the tracked projects.
//!
//! A reconciliation pass is replayed in full every time:
//!
//! 1. Persisted entries are kept only if their directory still exists and
//!    still matches a recognized layout. Their port and cache database are
//!    refreshed from the project's files.
//! 2. Subdirectories of the projects directory that are not yet tracked are
//!    detected; a project without a configured port gets one allocated.
//! 3. Survivors and new projects are merged, and any port or cache database
//!    collision is repaired by reallocating the later claimant.
//! 4. The result is written atomically to the snapshot file.
//!
//! A forced rescan skips step 1 entirely.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    allocator::{self, CacheDbRange},
    config::{Settings, file::absolute_path},
    error::{Error, Result},
    layout,
    project::{Project, ProjectUpdate},
    scanner::{self, Scanner},
    snapshot::{self, Record},
};

/// Owner of the tracked project set.
///
/// All mutation goes through the store's operations, each of which persists
/// the result before returning.
pub struct ProjectStore {
    projects_dir: PathBuf,
    data_file: PathBuf,
    cache_db: CacheDbRange,
    projects: Vec<Project>,
}

impl ProjectStore {
    /// Create an empty store. Nothing is read until [`ProjectStore::load`].
    ///
    /// Relative paths are resolved against the current directory so that
    /// persisted project directories are always absolute.
    pub fn new(
        projects_dir: impl Into<PathBuf>,
        data_file: impl Into<PathBuf>,
        cache_db: CacheDbRange,
    ) -> Self {
        Self {
            projects_dir: absolute_path(&projects_dir.into()),
            data_file: absolute_path(&data_file.into()),
            cache_db,
            projects: Vec::new(),
        }
    }

    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.projects_dir,
            &settings.data_file,
            settings.cache_db,
        )
    }

    /// Create a store and immediately reconcile it.
    ///
    /// # Errors
    ///
    /// Fails if the reconciled snapshot cannot be persisted.
    pub fn open(settings: &Settings) -> Result<Self> {
        let mut store = Self::from_settings(settings);
        store.load()?;
        Ok(store)
    }

    #[must_use]
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    #[must_use]
    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    #[must_use]
    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name() == name)
    }

    /// Reconcile the persisted snapshot with the filesystem and persist the result.
    ///
    /// Dev-server PIDs already known to this store survive for projects that
    /// are still tracked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persist`] if the snapshot cannot be written. The
    /// in-memory set is updated regardless.
    pub fn load(&mut self) -> Result<&[Project]> {
        debug!("Loading projects...");

        let persisted = snapshot::load(&self.data_file);
        let mut projects = reconcile(persisted, &self.scanner(), self.cache_db);

        for project in &mut projects {
            if let Some(previous) = self.get(project.name()) {
                project.frontend_process_id = previous.frontend_process_id;
            }
        }

        self.projects = projects;
        self.save()?;

        debug!("Total projects loaded: {}", self.projects.len());
        Ok(&self.projects)
    }

    /// Rebuild the project set purely from the filesystem.
    ///
    /// The persisted snapshot is ignored, so overridden URLs, display names
    /// and dev-server PIDs are lost.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persist`] if the snapshot cannot be written.
    pub fn rescan(&mut self) -> Result<&[Project]> {
        debug!("Forcing complete project rescan from filesystem...");

        self.projects = reconcile(None, &self.scanner(), self.cache_db);
        self.save()?;

        debug!("Rescan complete. Found {} projects", self.projects.len());
        Ok(&self.projects)
    }

    /// Apply a partial update to the project called `name` and persist it.
    ///
    /// # Errors
    ///
    /// - [`Error::ProjectNotFound`] if no such project is tracked
    /// - [`Error::InvalidPort`] / [`Error::CacheDbOutOfRange`] for a value out of range
    /// - [`Error::PortConflict`] if another project already holds the new port
    /// - [`Error::CacheDbConflict`] if another project already holds the new cache database
    /// - [`Error::Persist`] if the snapshot cannot be written
    ///
    /// Nothing is changed when a conflict is reported.
    pub fn update(&mut self, name: &str, update: ProjectUpdate) -> Result<Project> {
        let index = self.index_of(name)?;
        debug!("Updating project {name} with: {update:?}");

        if let Some(port) = update.port {
            self.check_port_free(port, Some(name))?;
        }
        if let Some(Some(cache_db)) = update.cache_db_index {
            self.check_cache_db_free(cache_db, Some(name))?;
        }

        update.apply_to(&mut self.projects[index]);
        self.save()?;

        debug!("Successfully updated and saved project {name}");
        Ok(self.projects[index].clone())
    }

    /// Start tracking a new project and persist it.
    ///
    /// # Errors
    ///
    /// - [`Error::ProjectExists`] if a project with the same name is tracked
    /// - [`Error::InvalidPort`] / [`Error::CacheDbOutOfRange`] for a value out of range
    /// - [`Error::PortConflict`] / [`Error::CacheDbConflict`] on a collision
    /// - [`Error::Persist`] if the snapshot cannot be written
    pub fn add(&mut self, project: Project) -> Result<Project> {
        if self.get(project.name()).is_some() {
            return Err(Error::ProjectExists(project.name().to_string()));
        }
        self.check_port_free(project.port, None)?;
        if let Some(cache_db) = project.cache_db_index {
            self.check_cache_db_free(cache_db, None)?;
        }

        info!("Tracking new project {}", project.name());
        self.projects.push(project.clone());
        self.save()?;

        Ok(project)
    }

    /// Stop tracking the project called `name` and persist the change.
    ///
    /// # Errors
    ///
    /// [`Error::ProjectNotFound`] if no such project is tracked, or
    /// [`Error::Persist`] if the snapshot cannot be written.
    pub fn remove(&mut self, name: &str) -> Result<Project> {
        let index = self.index_of(name)?;
        let removed = self.projects.remove(index);
        self.save()?;

        info!("Stopped tracking project {name}");
        Ok(removed)
    }

    /// Write the current project set to the snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persist`] if the write or the final rename fails.
    pub fn save(&self) -> Result<()> {
        snapshot::save(&self.data_file, &self.projects)
    }

    /// Next free port across all tracked projects.
    #[must_use]
    pub fn next_port(&self) -> u16 {
        allocator::next_port(&self.used_ports())
    }

    /// Next free cache database across all tracked projects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheDbExhausted`] when the configured range is full.
    pub fn next_cache_db_index(&self) -> Result<u32> {
        allocator::next_cache_db_index(&self.used_cache_dbs(), self.cache_db)
    }

    /// Forget dev-server PIDs whose process is gone.
    ///
    /// Returns the names of the projects that were cleared.
    pub fn clear_dead_processes(&mut self, is_alive: impl Fn(u32) -> bool) -> Vec<String> {
        let mut cleared = Vec::new();

        for project in &mut self.projects {
            if let Some(pid) = project.frontend_process_id
                && !is_alive(pid)
            {
                debug!("Dev server {pid} of {} is gone", project.name());
                project.frontend_process_id = None;
                cleared.push(project.name().to_string());
            }
        }

        cleared
    }

    fn scanner(&self) -> Scanner {
        Scanner::new(&self.projects_dir)
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.projects
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| {
                warn!("Project not found: {name}");
                Error::ProjectNotFound(name.to_string())
            })
    }

    fn used_ports(&self) -> HashSet<u16> {
        self.projects.iter().map(|p| p.port).collect()
    }

    fn used_cache_dbs(&self) -> HashSet<u32> {
        self.projects.iter().filter_map(|p| p.cache_db_index).collect()
    }

    fn check_port_free(&self, port: u16, except: Option<&str>) -> Result<()> {
        if port == 0 {
            return Err(Error::InvalidPort(port));
        }

        match self
            .projects
            .iter()
            .find(|p| p.port == port && Some(p.name()) != except)
        {
            Some(holder) => {
                warn!("Port {port} is already in use by {}", holder.name());
                Err(Error::PortConflict {
                    port,
                    holder: holder.name().to_string(),
                })
            }
            None => Ok(()),
        }
    }

    fn check_cache_db_free(&self, index: u32, except: Option<&str>) -> Result<()> {
        if !self.cache_db.contains(index) {
            let CacheDbRange { min, max } = self.cache_db;
            return Err(Error::CacheDbOutOfRange { index, min, max });
        }

        match self
            .projects
            .iter()
            .find(|p| p.cache_db_index == Some(index) && Some(p.name()) != except)
        {
            Some(holder) => {
                warn!("Cache database {index} is already in use by {}", holder.name());
                Err(Error::CacheDbConflict {
                    index,
                    holder: holder.name().to_string(),
                })
            }
            None => Ok(()),
        }
    }
}

/// Merge a persisted snapshot with what `scanner` finds on disk.
///
/// Pure apart from filesystem reads. With `persisted` set to `None` this is
/// a rebuild from the filesystem alone.
#[must_use]
pub fn reconcile(
    persisted: Option<Vec<Record>>,
    scanner: &Scanner,
    cache_db: CacheDbRange,
) -> Vec<Project> {
    let mut projects = persisted.map(refresh_persisted).unwrap_or_default();

    let known: HashSet<String> = projects.iter().map(|p| p.name().to_string()).collect();
    let mut used_ports: HashSet<u16> = projects.iter().map(|p| p.port).collect();

    for detection in scanner.scan(&known) {
        let port = match detection.config.port {
            Some(port) => port,
            None => {
                let port = allocator::next_port(&used_ports);
                debug!("Assigned new port {port} for {}", detection.name);
                port
            }
        };
        used_ports.insert(port);

        info!("Found new project {} with port {port}", detection.name);
        projects.push(Project::new(
            detection.name,
            detection.directory,
            port,
            detection.config.cache_db_index,
        ));
    }

    repair_collisions(&mut projects, cache_db);
    projects
}

/// Keep persisted entries whose directory is still a project, refreshing
/// their port and cache database from the project files.
fn refresh_persisted(records: Vec<Record>) -> Vec<Project> {
    let mut seen = HashSet::new();
    let mut survivors = Vec::with_capacity(records.len());

    for record in records {
        let mut project = Project::from(record);
        let name = project.name().to_string();
        let dir = project.directory().to_path_buf();

        if !seen.insert(name.clone()) {
            warn!("Skipping duplicate saved project {name}");
            continue;
        }
        if !dir.exists() {
            debug!("Skipping {name} - directory not found: {}", dir.display());
            continue;
        }
        if layout::leaf_name(&dir).as_deref() != Some(name.as_str()) {
            warn!(
                "Skipping {name} - name does not match directory {}",
                dir.display()
            );
            continue;
        }
        if layout::detect_named(&dir, &name).is_none() {
            debug!("Skipping {name} - no valid project structure found");
            continue;
        }

        let detected = scanner::read_config(&dir, &name);
        if let Some(port) = detected.port
            && port != project.port
        {
            debug!("Updating port for {name} from {} to {port}", project.port);
            project.port = port;
        }
        if let Some(index) = detected.cache_db_index
            && Some(index) != project.cache_db_index
        {
            debug!("Updated cache database for {name} to {index}");
            project.cache_db_index = Some(index);
        }

        debug!("Loaded saved project: {project}");
        survivors.push(project);
    }

    survivors
}

/// Reassign ports and cache databases so that no two projects share one.
///
/// Projects are visited in order and the first holder of a value keeps it;
/// every later holder is moved to a freshly allocated value. A cache
/// database that cannot be reallocated because the range is full is cleared.
fn repair_collisions(projects: &mut [Project], cache_db: CacheDbRange) {
    let mut used_ports: HashSet<u16> = projects.iter().map(|p| p.port).collect();
    let mut claimed_ports = HashSet::new();

    for project in projects.iter_mut() {
        if claimed_ports.insert(project.port) {
            continue;
        }

        let port = allocator::next_port(&used_ports);
        warn!(
            "Port {} of {} collides with another project, reassigning {port}",
            project.port,
            project.name()
        );
        project.port = port;
        used_ports.insert(port);
        claimed_ports.insert(port);
    }

    let mut used_dbs: HashSet<u32> = projects.iter().filter_map(|p| p.cache_db_index).collect();
    let mut claimed_dbs = HashSet::new();

    for project in projects.iter_mut() {
        let Some(index) = project.cache_db_index else {
            continue;
        };
        if claimed_dbs.insert(index) {
            continue;
        }

        match allocator::next_cache_db_index(&used_dbs, cache_db) {
            Ok(fresh) => {
                warn!(
                    "Cache database {index} of {} collides with another project, reassigning {fresh}",
                    project.name()
                );
                project.cache_db_index = Some(fresh);
                used_dbs.insert(fresh);
                claimed_dbs.insert(fresh);
            }
            Err(e) => {
                warn!(
                    "Cache database {index} of {} collides with another project: {e}",
                    project.name()
                );
                project.cache_db_index = None;
            }
        }
    }
}
