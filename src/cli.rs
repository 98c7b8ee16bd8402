use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use project_manager::launcher::Target;

#[derive(Parser)]
struct LocationArgs {
    /// Directory whose subdirectories are projects [default: ~/projects/personal]
    #[arg(short = 'd', long, global = true)]
    projects_dir: Option<PathBuf>,

    /// Snapshot file [default: <projects-dir>/.projects.json]
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,
}

#[derive(Parser)]
#[command(name = "project-manager", version)]
#[command(about = "Discover, track and manage local web application projects")]
pub(crate) struct Cli {
    #[command(flatten)]
    location: LocationArgs,

    /// Show debug logs
    #[arg(short = 'v', long, global = true)]
    pub(crate) verbose: bool,

    #[command(subcommand)]
    pub(crate) command: Option<Command>,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Reconcile with the filesystem and list all projects
    List,

    /// Rebuild the project list from the filesystem only, discarding saved overrides
    Rescan,

    /// Show one project
    Show { name: String },

    /// Change a project's dev-server port
    SetPort { name: String, port: u16 },

    /// Change other project settings
    Set {
        name: String,

        /// Cache database index
        #[arg(long, conflicts_with = "clear_cache_db")]
        cache_db: Option<u32>,

        /// Remove the cache database index
        #[arg(long)]
        clear_cache_db: bool,

        /// Frontend URL
        #[arg(long)]
        fe_url: Option<String>,

        /// Backend URL
        #[arg(long)]
        be_url: Option<String>,
    },

    /// Print the next free port and cache database
    Next,

    /// Run a project's frontend dev server in the foreground
    Start { name: String },

    /// Stop a dev server by PID
    Stop { pid: u32 },

    /// Provision a new project
    Create {
        name: String,

        /// Human-readable name [default: title-cased NAME]
        #[arg(long)]
        display_name: Option<String>,

        /// Print the plan without running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Tear a project down and delete its directory
    Delete {
        name: String,

        /// Don't ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,

        /// Print the plan without running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Open a project in the browser or editor
    Open {
        name: String,

        #[arg(value_enum, default_value_t = OpenTarget::Frontend)]
        target: OpenTarget,
    },

    /// Interactive menu (default)
    Menu,
}

#[derive(Clone, Copy, ValueEnum)]
pub(crate) enum OpenTarget {
    Frontend,
    Backend,
    Editor,
}

impl From<OpenTarget> for Target {
    fn from(target: OpenTarget) -> Self {
        match target {
            OpenTarget::Frontend => Self::Frontend,
            OpenTarget::Backend => Self::Backend,
            OpenTarget::Editor => Self::Editor,
        }
    }
}

impl Cli {
    pub(crate) fn projects_dir(&self) -> Option<PathBuf> {
        self.location.projects_dir.clone()
    }

    pub(crate) fn data_file(&self) -> Option<PathBuf> {
        self.location.data_file.clone()
    }
}
