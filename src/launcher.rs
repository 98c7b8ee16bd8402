//! Opening projects in the browser and in an editor.

use std::process::{Command, Stdio};

use tracing::info;

use crate::{error::Result, project::Project};

/// What to open for a project.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Frontend,
    Backend,
    Editor,
}

/// Opens project URLs and directories.
pub struct Launcher {
    editor_command: String,
}

impl Launcher {
    pub fn new(editor_command: impl Into<String>) -> Self {
        Self {
            editor_command: editor_command.into(),
        }
    }

    /// Open `target` for `project`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the browser or editor cannot be launched.
    pub fn open(&self, project: &Project, target: Target) -> Result<()> {
        match target {
            Target::Frontend => open_url(&project.frontend_url_or_default()),
            Target::Backend => open_url(&project.backend_url_or_default()),
            Target::Editor => self.open_in_editor(project),
        }
    }

    /// Spawn the editor on the project directory without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the editor cannot be spawned.
    pub fn open_in_editor(&self, project: &Project) -> Result<()> {
        info!(
            "Opening {} in {}",
            project.directory().display(),
            self.editor_command
        );

        Command::new(&self.editor_command)
            .arg(project.directory())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(())
    }
}

/// Open `url` in the default browser.
///
/// # Errors
///
/// Returns an I/O error if no browser can be launched.
pub fn open_url(url: &str) -> Result<()> {
    info!("Opening {url}");
    open::that_detached(url)?;
    Ok(())
}
