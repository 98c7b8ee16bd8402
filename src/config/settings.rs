//! Resolved settings handed to the store and its collaborators.
//!
//! A [`Settings`] value is the result of layering CLI overrides over the
//! configuration file over the built-in defaults.

use std::{path::PathBuf, time::Duration};

use tracing::warn;

use super::file::{FileConfig, absolute_path};
use crate::allocator::CacheDbRange;

/// File name of the persisted snapshot inside the projects directory.
pub const DATA_FILE_NAME: &str = ".projects.json";

/// Frontend dev-server settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DevServerSettings {
    /// Shell command started in the frontend directory
    pub command: String,

    /// Grace period between the terminate request and the force kill
    pub stop_timeout: Duration,
}

impl Default for DevServerSettings {
    fn default() -> Self {
        Self {
            command: "npm run dev".to_string(),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

/// Provisioning settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionSettings {
    pub github_owner: String,
    pub api_template: String,
    pub app_template: String,
    pub template_slug: String,
    pub template_display_name: String,
    pub package_manager: String,
    pub use_trash: bool,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            github_owner: "petarjs".to_string(),
            api_template: "api.saasdev".to_string(),
            app_template: "www.saasdev".to_string(),
            template_slug: "saasdev".to_string(),
            template_display_name: "SaasDev".to_string(),
            package_manager: "pnpm".to_string(),
            use_trash: true,
        }
    }
}

/// Fully resolved application settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Directory whose immediate subdirectories are candidate projects
    pub projects_dir: PathBuf,

    /// Persisted snapshot location
    pub data_file: PathBuf,

    pub cache_db: CacheDbRange,
    pub dev_server: DevServerSettings,

    /// Program used to open a project directory
    pub editor_command: String,

    pub provision: ProvisionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self::for_projects_dir(Self::default_projects_dir())
    }
}

impl Settings {
    /// `~/projects/personal`, or a relative `projects/personal` without a home directory.
    #[must_use]
    pub fn default_projects_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_default()
            .join("projects")
            .join("personal")
    }

    /// Default settings rooted at `projects_dir`.
    #[must_use]
    pub fn for_projects_dir(projects_dir: impl Into<PathBuf>) -> Self {
        let projects_dir = projects_dir.into();

        Self {
            data_file: projects_dir.join(DATA_FILE_NAME),
            projects_dir,
            cache_db: CacheDbRange::default(),
            dev_server: DevServerSettings::default(),
            editor_command: "cursor".to_string(),
            provision: ProvisionSettings::default(),
        }
    }

    /// Layer CLI overrides over `file` over the defaults.
    ///
    /// # Arguments
    ///
    /// * `file` - Values loaded from the configuration file
    /// * `projects_dir` - `--projects-dir` override
    /// * `data_file` - `--data-file` override
    #[must_use]
    pub fn resolve(
        file: &FileConfig,
        projects_dir: Option<PathBuf>,
        data_file: Option<PathBuf>,
    ) -> Self {
        let projects_dir = projects_dir
            .or_else(|| file.projects_dir.clone())
            .map_or_else(Self::default_projects_dir, |p| absolute_path(&p));

        let mut settings = Self::for_projects_dir(projects_dir);

        if let Some(path) = data_file.or_else(|| file.data_file.clone()) {
            settings.data_file = absolute_path(&path);
        }

        let defaults = CacheDbRange::default();
        let range = CacheDbRange {
            min: file.cache_db.min.unwrap_or(defaults.min),
            max: file.cache_db.max.unwrap_or(defaults.max),
        };
        if range.min <= range.max {
            settings.cache_db = range;
        } else {
            warn!(
                "Ignoring cache_db range {}-{}: min is above max",
                range.min, range.max
            );
        }

        if let Some(command) = &file.dev_server.command {
            settings.dev_server.command.clone_from(command);
        }
        if let Some(secs) = file.dev_server.stop_timeout_secs {
            settings.dev_server.stop_timeout = Duration::from_secs(secs);
        }
        if let Some(command) = &file.editor.command {
            settings.editor_command.clone_from(command);
        }

        let provision = &file.provision;
        let target = &mut settings.provision;
        for (value, slot) in [
            (&provision.github_owner, &mut target.github_owner),
            (&provision.api_template, &mut target.api_template),
            (&provision.app_template, &mut target.app_template),
            (&provision.template_slug, &mut target.template_slug),
            (
                &provision.template_display_name,
                &mut target.template_display_name,
            ),
            (&provision.package_manager, &mut target.package_manager),
        ] {
            if let Some(value) = value {
                slot.clone_from(value);
            }
        }
        if let Some(use_trash) = provision.use_trash {
            target.use_trash = use_trash;
        }

        settings
    }
}
