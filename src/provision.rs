//! Project provisioning and teardown.
//!
//! Creating a project clones a frontend and a backend repository from
//! templates, installs dependencies, wires up local HTTPS proxies, creates
//! a database and renders environment files. Deleting one undoes the
//! external parts and removes the directory.
//!
//! Both operations are expressed as a [`Step`] plan that is built without
//! side effects and then executed by [`run_plan`]. Every shell command is
//! echoed as `$ <command>` to the output callback, followed by its merged
//! stdout and stderr, line by line.

use std::{
    fmt::{self, Display, Formatter},
    fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use rand::Rng;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::{
    config::{ProvisionSettings, Settings},
    error::{Error, Result},
    layout::Layout,
    process,
    project::{default_backend_url, default_frontend_url},
};

/// One action of a provisioning plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Progress line shown to the user
    Note(String),

    /// Shell command, optionally in a working directory
    Command {
        command: String,
        cwd: Option<PathBuf>,
        allow_failure: bool,
    },

    CreateDir(PathBuf),

    /// Set the manifest's `name` and move `-p 3000` scripts to `port`
    RewriteManifest {
        path: PathBuf,
        name: String,
        port: u16,
    },

    /// Render `target` from `template`; skipped if the template is missing
    RenderEnv {
        template: PathBuf,
        target: PathBuf,
        edits: Vec<EnvEdit>,
    },

    /// Write `.vscode/settings.json` tinting the editor with `color`
    EditorColor { dir: PathBuf, color: String },

    RemoveDir { path: PathBuf, use_trash: bool },
}

impl Step {
    fn command(command: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            cwd: None,
            allow_failure: false,
        }
    }

    fn command_in(command: impl Into<String>, cwd: &Path) -> Self {
        Self::Command {
            command: command.into(),
            cwd: Some(cwd.to_path_buf()),
            allow_failure: false,
        }
    }

    fn tolerant(command: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            cwd: None,
            allow_failure: true,
        }
    }

    fn note(line: impl Into<String>) -> Self {
        Self::Note(line.into())
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Note(line) => write!(f, "# {line}"),
            Self::Command { command, cwd, .. } => match cwd {
                Some(cwd) => write!(f, "$ {command}  (in {})", cwd.display()),
                None => write!(f, "$ {command}"),
            },
            Self::CreateDir(path) => write!(f, "mkdir -p {}", path.display()),
            Self::RewriteManifest { path, name, port } => {
                write!(f, "rewrite {} (name {name}, port {port})", path.display())
            }
            Self::RenderEnv { template, target, .. } => {
                write!(f, "render {} from {}", target.display(), template.display())
            }
            Self::EditorColor { dir, color } => {
                write!(f, "tint editor in {} with #{color}", dir.display())
            }
            Self::RemoveDir { path, use_trash: true } => write!(f, "trash {}", path.display()),
            Self::RemoveDir { path, use_trash: false } => write!(f, "rm -rf {}", path.display()),
        }
    }
}

/// A rewrite applied to an environment file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnvEdit {
    /// Replace every occurrence of `from` with `to`
    Replace { from: String, to: String },

    /// Replace the whole value of every `KEY=` line
    SetKey { key: String, value: String },
}

impl EnvEdit {
    fn replace(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Replace {
            from: from.into(),
            to: to.into(),
        }
    }

    fn set(key: &str, value: impl Into<String>) -> Self {
        Self::SetKey {
            key: key.to_string(),
            value: value.into(),
        }
    }
}

/// Apply `edits` to the content of an environment file, in order.
#[must_use]
pub fn apply_env_edits(content: &str, edits: &[EnvEdit]) -> String {
    let mut content = content.to_string();

    for edit in edits {
        content = match edit {
            EnvEdit::Replace { from, to } => content.replace(from.as_str(), to),
            EnvEdit::SetKey { key, value } => {
                let prefix = format!("{key}=");
                content
                    .split_inclusive('\n')
                    .map(|line| {
                        if line.starts_with(&prefix) {
                            let ending = &line[line.trim_end_matches(['\r', '\n']).len()..];
                            format!("{prefix}{value}{ending}")
                        } else {
                            line.to_string()
                        }
                    })
                    .collect()
            }
        };
    }

    content
}

/// Whether `name` is usable as a project, repository and database name.
#[must_use]
pub fn is_valid_app_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Six hex digits for an editor tint.
#[must_use]
pub fn random_color() -> String {
    let [r, g, b]: [u8; 3] = rand::thread_rng().r#gen();
    format!("{r:02x}{g:02x}{b:02x}")
}

/// Builds and runs provisioning plans for projects under one directory.
pub struct Provisioner {
    projects_dir: PathBuf,
    settings: ProvisionSettings,
}

impl Provisioner {
    pub fn new(projects_dir: impl Into<PathBuf>, settings: ProvisionSettings) -> Self {
        Self {
            projects_dir: projects_dir.into(),
            settings,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.projects_dir, settings.provision.clone())
    }

    /// Directory a project called `app` lives in.
    #[must_use]
    pub fn project_dir(&self, app: &str) -> PathBuf {
        self.projects_dir.join(app)
    }

    /// External programs the create plan needs.
    #[must_use]
    pub fn create_tools(&self) -> Vec<String> {
        let package_manager = self
            .settings
            .package_manager
            .split_whitespace()
            .next()
            .unwrap_or("npm");

        ["gh", package_manager, "herd", "mysql", "composer", "php"]
            .into_iter()
            .map(ToString::to_string)
            .collect()
    }

    /// External programs the delete plan cannot do without.
    #[must_use]
    pub fn delete_tools(&self) -> Vec<String> {
        vec!["mysql".to_string(), "gh".to_string()]
    }

    /// The full sequence of steps creating project `app`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if `app` is not a usable name.
    pub fn create_plan(
        &self,
        app: &str,
        display_name: &str,
        port: u16,
        cache_db: u32,
        color: &str,
    ) -> Result<Vec<Step>> {
        validate(app)?;

        let s = &self.settings;
        let dir = self.project_dir(app);
        let frontend = Layout::NamedPair.frontend_dir(&dir, app);
        let backend = Layout::NamedPair.backend_dir(&dir, app);
        let frontend_url = default_frontend_url(app);
        let backend_url = default_backend_url(app);
        let slug = &s.template_slug;

        Ok(vec![
            Step::note(format!(
                "Creating {display_name} ({app}) on port {port} with cache database {cache_db}"
            )),
            Step::CreateDir(dir.clone()),
            Step::note("Creating repositories..."),
            Step::command_in(
                format!(
                    "gh repo create {app}-api --template {}/{} --private --clone",
                    s.github_owner, s.api_template
                ),
                &dir,
            ),
            Step::command_in(
                format!(
                    "gh repo create {app}-app --template {}/{} --private --clone",
                    s.github_owner, s.app_template
                ),
                &dir,
            ),
            Step::note("Setting up frontend..."),
            Step::command_in(format!("{} i", s.package_manager), &frontend),
            Step::RewriteManifest {
                path: frontend.join("package.json"),
                name: app.to_string(),
                port,
            },
            Step::command(format!(
                "herd proxy --secure app.{app} http://localhost:{port}"
            )),
            Step::RenderEnv {
                template: frontend.join(".env.example"),
                target: frontend.join(".env.local"),
                edits: vec![
                    EnvEdit::replace(format!("https://api.{slug}.test"), &backend_url),
                    EnvEdit::replace(format!("https://{slug}.test"), &frontend_url),
                    EnvEdit::replace(&s.template_display_name, display_name),
                ],
            },
            Step::note("Setting up backend..."),
            Step::command(format!(
                "mysql -h 127.0.0.1 -u root -e 'CREATE DATABASE IF NOT EXISTS `{app}`'"
            )),
            Step::command_in(format!("herd link --secure api.{app}.test"), &backend),
            Step::RenderEnv {
                template: backend.join(".env.example"),
                target: backend.join(".env"),
                edits: vec![
                    EnvEdit::set("DB_DATABASE", app),
                    EnvEdit::set("APP_NAME", format!("\"{display_name}\"")),
                    EnvEdit::set("APP_URL", &backend_url),
                    EnvEdit::set("FRONTEND_URL", &frontend_url),
                    EnvEdit::set("CORS_ALLOWED_ORIGIN", &frontend_url),
                    EnvEdit::set("SANCTUM_STATEFUL_DOMAINS", &frontend_url),
                    EnvEdit::set("SESSION_DOMAIN", format!(".{app}.test")),
                    EnvEdit::set("REDIS_CACHE_DB", cache_db.to_string()),
                    EnvEdit::set("REDIS_DB", cache_db.to_string()),
                ],
            },
            Step::command_in("composer install", &backend),
            Step::command_in("php artisan key:generate", &backend),
            Step::command_in("php artisan migrate:fresh --seed", &backend),
            Step::command_in("php artisan storage:link", &backend),
            Step::CreateDir(backend.join("storage").join("app").join("ipinfo")),
            Step::command_in("php artisan ipinfo:update", &backend),
            Step::EditorColor {
                dir: frontend,
                color: color.to_string(),
            },
            Step::EditorColor {
                dir: backend,
                color: color.to_string(),
            },
        ])
    }

    /// The full sequence of steps deleting project `app`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if `app` is not a usable name.
    pub fn delete_plan(&self, app: &str) -> Result<Vec<Step>> {
        validate(app)?;

        let owner = &self.settings.github_owner;

        Ok(vec![
            Step::note(format!("Deleting project {app}...")),
            Step::command(format!(
                "mysql -h 127.0.0.1 -u root -e 'DROP DATABASE IF EXISTS `{app}`'"
            )),
            Step::note("Deleting GitHub repositories..."),
            Step::command(format!("gh repo delete --yes {owner}/{app}-api")),
            Step::command(format!("gh repo delete --yes {owner}/{app}-app")),
            Step::note("Removing Herd proxies..."),
            Step::tolerant(format!("herd unproxy app.{app}")),
            Step::tolerant(format!("herd unlink api.{app}")),
            Step::RemoveDir {
                path: self.project_dir(app),
                use_trash: self.settings.use_trash,
            },
        ])
    }

    /// Provision project `app` end to end.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidName`] for an unusable name
    /// - [`Error::MissingTool`] before any step runs if a program is missing
    /// - [`Error::CommandFailed`] with the captured output of the failing step
    pub fn create(
        &self,
        app: &str,
        display_name: &str,
        port: u16,
        cache_db: u32,
        on_output: &mut dyn FnMut(&str),
    ) -> Result<()> {
        let plan = self.create_plan(app, display_name, port, cache_db, &random_color())?;
        preflight(&self.create_tools())?;

        info!("Provisioning project {app}");
        run_plan(&plan, on_output)?;

        let dir = self.project_dir(app);
        on_output("");
        on_output("Project setup complete!");
        on_output(&format!("Frontend URL: {}", default_frontend_url(app)));
        on_output(&format!("Backend URL: {}", default_backend_url(app)));
        on_output(&format!(
            "Frontend directory: {}",
            Layout::NamedPair.frontend_dir(&dir, app).display()
        ));
        on_output(&format!(
            "Backend directory: {}",
            Layout::NamedPair.backend_dir(&dir, app).display()
        ));
        on_output(&format!("Port: {port}"));
        on_output(&format!("Cache database: {cache_db}"));
        on_output(&format!("Database: {app}"));

        Ok(())
    }

    /// Tear project `app` down.
    ///
    /// # Errors
    ///
    /// Same as [`Provisioner::create`], plus [`Error::Trash`] if the
    /// directory cannot be moved to the trash.
    pub fn delete(&self, app: &str, on_output: &mut dyn FnMut(&str)) -> Result<()> {
        let plan = self.delete_plan(app)?;
        preflight(&self.delete_tools())?;

        info!("Deleting project {app}");
        run_plan(&plan, on_output)?;
        on_output("Project deleted successfully!");

        Ok(())
    }
}

fn validate(app: &str) -> Result<()> {
    if is_valid_app_name(app) {
        Ok(())
    } else {
        Err(Error::InvalidName(app.to_string()))
    }
}

/// Fail with [`Error::MissingTool`] for the first program not on `PATH`.
///
/// # Errors
///
/// See above.
pub fn preflight(tools: &[String]) -> Result<()> {
    for tool in tools {
        if which::which(tool).is_err() {
            warn!("Required tool {tool} is not installed");
            return Err(Error::MissingTool(tool.clone()));
        }
        debug!("Found {tool}");
    }
    Ok(())
}

/// Execute `plan` in order, stopping at the first failing step.
///
/// # Errors
///
/// Returns [`Error::CommandFailed`] for a failing command that is not
/// allowed to fail, or the I/O or JSON error of a failing file step.
pub fn run_plan(plan: &[Step], on_output: &mut dyn FnMut(&str)) -> Result<()> {
    for step in plan {
        debug!("Running step: {step}");

        match step {
            Step::Note(line) => on_output(line),
            Step::Command {
                command,
                cwd,
                allow_failure,
            } => {
                let result = run_command(command, cwd.as_deref(), on_output);
                match result {
                    Err(Error::CommandFailed { code, .. }) if *allow_failure => {
                        on_output(&format!("Command exited with code {code}, continuing"));
                    }
                    other => other?,
                }
            }
            Step::CreateDir(path) => fs::create_dir_all(path)?,
            Step::RewriteManifest { path, name, port } => rewrite_manifest(path, name, *port)?,
            Step::RenderEnv {
                template,
                target,
                edits,
            } => {
                if template.is_file() {
                    let content = fs::read_to_string(template)?;
                    fs::write(target, apply_env_edits(&content, edits))?;
                } else {
                    on_output(&format!("No {} found, skipping", template.display()));
                }
            }
            Step::EditorColor { dir, color } => {
                on_output(&format!("Updating editor settings with color #{color}..."));
                write_editor_color(dir, color)?;
            }
            Step::RemoveDir { path, use_trash } => {
                remove_dir(path, *use_trash)?;
                on_output(&format!("Deleted directory: {}", path.display()));
            }
        }
    }

    Ok(())
}

/// Run `command` through the shell, streaming merged output to `on_output`.
///
/// # Errors
///
/// Returns [`Error::CommandFailed`] carrying every output line when the
/// command exits unsuccessfully, or an I/O error if it cannot be spawned.
pub fn run_command(
    command: &str,
    cwd: Option<&Path>,
    on_output: &mut dyn FnMut(&str),
) -> Result<()> {
    on_output(&format!("$ {command}"));

    let mut cmd = merged_shell(command);
    cmd.stdin(Stdio::null()).stdout(Stdio::piped());
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }

    let mut child = cmd.spawn()?;
    let mut lines = Vec::new();

    if let Some(stdout) = child.stdout.take() {
        let read = process::for_each_line(stdout, |line| {
            on_output(line);
            lines.push(line.to_string());
        });
        if let Err(e) = read {
            warn!("Lost output of `{command}`: {e}");
        }
    }

    let status = child.wait()?;
    if status.success() {
        return Ok(());
    }

    let code = status.code().unwrap_or(-1);
    warn!("Command `{command}` failed with exit code {code}");
    Err(Error::CommandFailed {
        command: command.to_string(),
        code,
        output: lines.join("\n"),
    })
}

#[cfg(unix)]
fn merged_shell(script: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(format!("exec 2>&1\n{script}"));
    command
}

#[cfg(not(unix))]
fn merged_shell(script: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(format!("{script} 2>&1"));
    command
}

fn rewrite_manifest(path: &Path, name: &str, port: u16) -> Result<()> {
    let mut manifest: Value = serde_json::from_str(&fs::read_to_string(path)?)?;

    if let Some(scripts) = manifest.get_mut("scripts").and_then(Value::as_object_mut) {
        for script in scripts.values_mut() {
            if let Some(command) = script.as_str()
                && command.contains("-p 3000")
            {
                *script = Value::String(command.replace("-p 3000", &format!("-p {port}")));
            }
        }
    }
    if let Some(object) = manifest.as_object_mut() {
        object.insert("name".to_string(), Value::String(name.to_string()));
    }

    fs::write(path, serde_json::to_string_pretty(&manifest)?)?;
    Ok(())
}

fn write_editor_color(dir: &Path, color: &str) -> Result<()> {
    let settings_dir = dir.join(".vscode");
    fs::create_dir_all(&settings_dir)?;

    let settings = json!({
        "workbench.colorCustomizations": {
            "statusBar.background": format!("#{color}"),
            "statusBar.foreground": "#ffffff",
            "titleBar.activeBackground": format!("#{color}"),
            "titleBar.activeForeground": "#ffffff",
            "titleBar.inactiveBackground": format!("#{color}"),
            "titleBar.inactiveForeground": "#e7e7e799"
        }
    });

    fs::write(
        settings_dir.join("settings.json"),
        serde_json::to_string_pretty(&settings)?,
    )?;
    Ok(())
}

fn remove_dir(path: &Path, use_trash: bool) -> Result<()> {
    if !path.exists() {
        debug!("{} does not exist, nothing to remove", path.display());
        return Ok(());
    }

    if use_trash {
        trash::delete(path).map_err(|e| Error::Trash {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    } else {
        fs::remove_dir_all(path)?;
        Ok(())
    }
}
