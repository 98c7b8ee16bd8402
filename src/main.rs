//! # project-manager
//!
//! Keep track of local web application projects: a frontend and a backend
//! checkout side by side, each project in its own directory under one
//! projects directory.
//!
//! The tool detects projects and their dev-server port and cache database
//! from the filesystem, remembers them in a JSON snapshot, hands out
//! non-conflicting ports and cache databases, runs frontend dev servers,
//! and provisions or tears down whole projects.
//!
//! ## Usage
//!
//! ```bash
//! # Interactive menu
//! project-manager
//!
//! # List projects, reconciling with the filesystem first
//! project-manager list
//!
//! # Move a project to another port
//! project-manager set-port my-shop 3004
//!
//! # Provision a new project
//! project-manager create my-shop --display-name "My Shop"
//! ```
//!
//! Settings are read from `~/.config/project-manager/config.toml` and can be
//! overridden on the command line.

mod cli;
mod menu;

use std::process::exit;

use anyhow::{Result, bail};
use clap::Parser;
use cli::{Cli, Command};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use project_manager::{
    Error,
    config::{FileConfig, Settings},
    launcher::Launcher,
    process::{self, Launch},
    project::{Project, ProjectUpdate, Projects, display_name_for},
    provision::Provisioner,
    store::ProjectStore,
};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Entry point for the project-manager application.
///
/// This function handles all errors gracefully by calling [`inner_main`] and printing
/// any errors to stderr before exiting with a non-zero status code.
fn main() {
    if let Err(err) = inner_main() {
        eprintln!("{} {err:#}", "Error:".red());

        exit(1);
    }
}

/// Main application logic that can return errors.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Sets up logging
/// 3. Loads the persistent configuration file (if present)
/// 4. Runs the requested subcommand, or the interactive menu
///
/// # Errors
///
/// Returns any store, provisioning, process or terminal error of the
/// subcommand.
fn inner_main() -> Result<()> {
    let mut args = Cli::parse();
    let command = args.command.take().unwrap_or(Command::Menu);

    init_tracing(args.verbose, &command);

    let file_config = match FileConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {e}", "Warning: Failed to load config file:".yellow());
            FileConfig::default()
        }
    };
    let settings = Settings::resolve(&file_config, args.projects_dir(), args.data_file());

    match command {
        Command::List => {
            let store = open_store(&settings)?;
            print_projects(&store);
        }
        Command::Rescan => {
            let mut store = ProjectStore::from_settings(&settings);
            let count =
                with_spinner("Rescanning projects...", || store.rescan().map(<[Project]>::len))?;
            println!("{} {count} projects", "Rescanned:".green());
            print_projects(&store);
        }
        Command::Show { name } => {
            let store = open_store(&settings)?;
            print_project(find(&store, &name)?);
        }
        Command::SetPort { name, port } => {
            let mut store = open_store(&settings)?;
            let project = store.update(&name, ProjectUpdate::default().port(port))?;
            println!("{} {project}", "Updated".green());
        }
        Command::Set {
            name,
            cache_db,
            clear_cache_db,
            fe_url,
            be_url,
        } => {
            let mut update = ProjectUpdate::default();
            if let Some(index) = cache_db {
                update = update.cache_db_index(Some(index));
            }
            if clear_cache_db {
                update = update.cache_db_index(None);
            }
            if let Some(url) = fe_url {
                update = update.frontend_url(Some(url));
            }
            if let Some(url) = be_url {
                update = update.backend_url(Some(url));
            }
            if update.is_empty() {
                bail!("nothing to change; pass --cache-db, --clear-cache-db, --fe-url or --be-url");
            }

            let mut store = open_store(&settings)?;
            let project = store.update(&name, update)?;
            print_project(&project);
        }
        Command::Next => {
            let store = open_store(&settings)?;
            println!("{} {}", "Next port:".bold(), store.next_port());
            match store.next_cache_db_index() {
                Ok(index) => println!("{} {index}", "Next cache database:".bold()),
                Err(e) => println!("{} {}", "Next cache database:".bold(), e.to_string().yellow()),
            }
        }
        Command::Start { name } => {
            let mut store = open_store(&settings)?;
            let project = find(&store, &name)?.clone();

            let server = process::start(&project, &settings.dev_server, Launch::Attached)?;
            store.update(
                &name,
                ProjectUpdate::default().frontend_process_id(Some(server.pid())),
            )?;
            println!(
                "{} {} on port {} (pid {}), Ctrl-C to stop",
                "Running".green(),
                project.display_name,
                project.port,
                server.pid()
            );

            let status = server.wait()?;
            store.update(&name, ProjectUpdate::default().frontend_process_id(None))?;
            if !status.success() {
                bail!("dev server exited with {status}");
            }
        }
        Command::Stop { pid } => {
            process::stop_pid(pid, settings.dev_server.stop_timeout)?;
            println!("{} {pid}", "Stopped".yellow());
        }
        Command::Create {
            name,
            display_name,
            dry_run,
        } => {
            let display_name = display_name.unwrap_or_else(|| display_name_for(&name));
            let mut store = open_store(&settings)?;
            let provisioner = Provisioner::from_settings(&settings);

            if dry_run {
                let plan = provisioner.create_plan(
                    &name,
                    &display_name,
                    store.next_port(),
                    store.next_cache_db_index()?,
                    "000000",
                )?;
                plan.iter().for_each(|step| println!("{step}"));
            } else {
                create_project(&mut store, &provisioner, &name, &display_name)?;
            }
        }
        Command::Delete { name, yes, dry_run } => {
            let mut store = open_store(&settings)?;
            let provisioner = Provisioner::from_settings(&settings);

            if dry_run {
                provisioner
                    .delete_plan(&name)?
                    .iter()
                    .for_each(|step| println!("{step}"));
                return Ok(());
            }

            if !yes
                && !Confirm::new(&format!(
                    "Delete {name} with its repositories and database? This cannot be undone."
                ))
                .with_default(false)
                .prompt()?
            {
                println!("{}", "Aborted".yellow());
                return Ok(());
            }

            delete_project(&mut store, &provisioner, &name)?;
        }
        Command::Open { name, target } => {
            let store = open_store(&settings)?;
            Launcher::new(&settings.editor_command).open(find(&store, &name)?, target.into())?;
        }
        Command::Menu => menu::Menu::new(settings)?.run()?,
    }

    Ok(())
}

fn init_tracing(verbose: bool, command: &Command) {
    let level = match command {
        _ if verbose => Level::DEBUG,
        Command::Start { .. } => Level::INFO,
        _ => Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Run `f` behind a spinner, clearing it afterwards.
pub(crate) fn with_spinner<T, E>(
    message: &'static str,
    f: impl FnOnce() -> std::result::Result<T, E>,
) -> std::result::Result<T, E> {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = f();
    spinner.finish_and_clear();
    result
}

fn open_store(settings: &Settings) -> Result<ProjectStore> {
    let mut store = ProjectStore::from_settings(settings);
    with_spinner("Scanning projects...", || store.load().map(<[Project]>::len))?;
    Ok(store)
}

fn find<'a>(store: &'a ProjectStore, name: &str) -> Result<&'a Project> {
    store
        .get(name)
        .ok_or_else(|| Error::ProjectNotFound(name.to_string()).into())
}

fn print_projects(store: &ProjectStore) {
    println!("\n{}", "Projects:".bold());
    Projects::from(store.projects()).print_table();
}

fn print_project(project: &Project) {
    println!("{}", project.display_name.bold());
    println!("  name:          {}", project.name());
    println!("  directory:     {}", project.directory().display());
    println!("  port:          {}", project.port);
    println!(
        "  cache db:      {}",
        project
            .cache_db_index
            .map_or_else(|| "-".to_string(), |i| i.to_string())
    );
    println!("  frontend url:  {}", project.frontend_url_or_default());
    println!("  backend url:   {}", project.backend_url_or_default());
    if let Some(pid) = project.frontend_process_id {
        println!("  dev server:    {}", format!("running (pid {pid})").green());
    }
}

/// Provision `name` with the next free port and cache database, then track it.
pub(crate) fn create_project(
    store: &mut ProjectStore,
    provisioner: &Provisioner,
    name: &str,
    display_name: &str,
) -> Result<()> {
    if store.get(name).is_some() || provisioner.project_dir(name).exists() {
        return Err(Error::ProjectExists(name.to_string()).into());
    }

    let port = store.next_port();
    let cache_db = store.next_cache_db_index()?;

    provisioner.create(name, display_name, port, cache_db, &mut |line| {
        println!("{line}");
    })?;

    store.load()?;
    if store.get(name).is_none() {
        store.add(Project::new(
            name,
            provisioner.project_dir(name),
            port,
            Some(cache_db),
        ))?;
    }

    println!("{} {display_name}", "Created".green());
    Ok(())
}

/// Tear `name` down and stop tracking it.
pub(crate) fn delete_project(
    store: &mut ProjectStore,
    provisioner: &Provisioner,
    name: &str,
) -> Result<()> {
    provisioner.delete(name, &mut |line| println!("{line}"))?;

    if store.get(name).is_some() {
        store.remove(name)?;
    }

    println!("{} {name}", "Deleted".yellow());
    Ok(())
}
