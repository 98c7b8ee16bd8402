//! Interactive project menu.
//!
//! The menu keeps the dev servers it started alive across iterations and
//! mirrors their PIDs into the store, so a running project is marked in the
//! list until its server is stopped or exits.

use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
};

use anyhow::Result;
use colored::Colorize;
use inquire::{Confirm, CustomType, Select, Text};
use project_manager::{
    config::Settings,
    launcher::{Launcher, Target},
    process::{self, DevServer, Launch},
    project::{Project, ProjectUpdate, display_name_for},
    provision::Provisioner,
    store::ProjectStore,
};

use crate::with_spinner;

enum MainItem {
    Project(Project),
    Refresh,
    Rescan,
    NewProject,
    Quit,
}

impl Display for MainItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project(project) if project.is_running() => write!(f, "● {project}"),
            Self::Project(project) => write!(f, "  {project}"),
            Self::Refresh => write!(f, "↻ Refresh"),
            Self::Rescan => write!(f, "⟲ Rescan from disk"),
            Self::NewProject => write!(f, "+ New project"),
            Self::Quit => write!(f, "✕ Quit"),
        }
    }
}

#[derive(Clone, Copy)]
enum Action {
    Open(Target),
    Start,
    Stop,
    EditPort,
    EditCacheDb,
    Delete,
    Back,
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Open(Target::Frontend) => "Open frontend",
            Self::Open(Target::Backend) => "Open backend",
            Self::Open(Target::Editor) => "Open in editor",
            Self::Start => "Start dev server",
            Self::Stop => "Stop dev server",
            Self::EditPort => "Edit port",
            Self::EditCacheDb => "Edit cache database",
            Self::Delete => "Delete project",
            Self::Back => "Back",
        };
        f.write_str(label)
    }
}

pub(crate) struct Menu {
    settings: Settings,
    store: ProjectStore,
    launcher: Launcher,
    provisioner: Provisioner,
    servers: HashMap<String, DevServer>,
}

impl Menu {
    pub(crate) fn new(settings: Settings) -> Result<Self> {
        let mut store = ProjectStore::from_settings(&settings);
        with_spinner("Loading projects...", || store.load().map(<[Project]>::len))?;

        Ok(Self {
            launcher: Launcher::new(&settings.editor_command),
            provisioner: Provisioner::from_settings(&settings),
            store,
            settings,
            servers: HashMap::new(),
        })
    }

    pub(crate) fn run(mut self) -> Result<()> {
        loop {
            self.reap_servers();

            let mut items: Vec<MainItem> = self
                .store
                .projects()
                .iter()
                .cloned()
                .map(MainItem::Project)
                .collect();
            items.extend([
                MainItem::Refresh,
                MainItem::Rescan,
                MainItem::NewProject,
                MainItem::Quit,
            ]);

            let Some(item) = Select::new("Projects", items)
                .with_page_size(20)
                .prompt_skippable()?
            else {
                break;
            };

            match item {
                MainItem::Project(project) => self.project_menu(&project)?,
                MainItem::Refresh => {
                    let result =
                        with_spinner("Refreshing...", || self.store.load().map(<[Project]>::len));
                    report(result);
                }
                MainItem::Rescan => {
                    let result =
                        with_spinner("Rescanning...", || self.store.rescan().map(<[Project]>::len));
                    report(result);
                }
                MainItem::NewProject => self.new_project()?,
                MainItem::Quit => break,
            }
        }

        self.shutdown()
    }

    fn project_menu(&mut self, project: &Project) -> Result<()> {
        let running = self.servers.contains_key(project.name());
        let actions = vec![
            Action::Open(Target::Frontend),
            Action::Open(Target::Backend),
            Action::Open(Target::Editor),
            if running { Action::Stop } else { Action::Start },
            Action::EditPort,
            Action::EditCacheDb,
            Action::Delete,
            Action::Back,
        ];

        let Some(action) = Select::new(&project.to_string(), actions).prompt_skippable()? else {
            return Ok(());
        };

        match action {
            Action::Open(target) => report(self.launcher.open(project, target)),
            Action::Start => report(self.start(project)),
            Action::Stop => report(self.stop(project.name())),
            Action::EditPort => {
                if let Some(port) = CustomType::<u16>::new("Port")
                    .with_default(project.port)
                    .prompt_skippable()?
                {
                    report(self.store.update(project.name(), ProjectUpdate::default().port(port)));
                }
            }
            Action::EditCacheDb => {
                if let Some(input) = Text::new("Cache database (empty to clear)")
                    .with_default(
                        &project
                            .cache_db_index
                            .map(|i| i.to_string())
                            .unwrap_or_default(),
                    )
                    .prompt_skippable()?
                {
                    let index = match input.trim() {
                        "" => None,
                        value => match value.parse::<u32>() {
                            Ok(index) => Some(index),
                            Err(_) => {
                                println!("{}", "Not a number".red());
                                return Ok(());
                            }
                        },
                    };
                    report(
                        self.store
                            .update(project.name(), ProjectUpdate::default().cache_db_index(index)),
                    );
                }
            }
            Action::Delete => self.delete(project)?,
            Action::Back => {}
        }

        Ok(())
    }

    fn start(&mut self, project: &Project) -> anyhow::Result<Project> {
        let server = process::start(project, &self.settings.dev_server, Launch::Detached)?;
        let pid = server.pid();
        println!(
            "{} {} (pid {pid}) at {}",
            "Started".green(),
            project.display_name,
            server.started_at().format("%H:%M:%S")
        );
        self.servers.insert(project.name().to_string(), server);

        Ok(self.store.update(
            project.name(),
            ProjectUpdate::default().frontend_process_id(Some(pid)),
        )?)
    }

    fn stop(&mut self, name: &str) -> anyhow::Result<Project> {
        if let Some(server) = self.servers.remove(name) {
            server.stop(self.settings.dev_server.stop_timeout)?;
        }

        println!("{} {name}", "Stopped".yellow());
        Ok(self
            .store
            .update(name, ProjectUpdate::default().frontend_process_id(None))?)
    }

    fn new_project(&mut self) -> Result<()> {
        let Some(name) = Text::new("Project name").prompt_skippable()? else {
            return Ok(());
        };
        let name = name.trim().to_string();
        if name.is_empty() {
            return Ok(());
        }

        let Some(display_name) = Text::new("Display name")
            .with_default(&display_name_for(&name))
            .prompt_skippable()?
        else {
            return Ok(());
        };

        report(crate::create_project(
            &mut self.store,
            &self.provisioner,
            &name,
            &display_name,
        ));
        Ok(())
    }

    fn delete(&mut self, project: &Project) -> Result<()> {
        let confirmed = Confirm::new(&format!(
            "Delete {} with its repositories and database? This cannot be undone.",
            project.display_name
        ))
        .with_default(false)
        .prompt_skippable()?
        .unwrap_or(false);

        if !confirmed {
            return Ok(());
        }

        if self.servers.contains_key(project.name()) {
            report(self.stop(project.name()));
        }
        report(crate::delete_project(
            &mut self.store,
            &self.provisioner,
            project.name(),
        ));
        Ok(())
    }

    /// Drop servers that exited on their own and bring the store's PIDs in
    /// line with the servers still running.
    fn reap_servers(&mut self) {
        let exited: Vec<String> = self
            .servers
            .iter_mut()
            .filter_map(|(name, server)| (!server.is_running()).then(|| name.clone()))
            .collect();

        for name in exited {
            self.servers.remove(&name);
            println!("{} {name}", "Dev server exited:".yellow());
            if self.store.get(&name).is_some() {
                report(
                    self.store
                        .update(&name, ProjectUpdate::default().frontend_process_id(None)),
                );
            }
        }

        for (name, server) in &self.servers {
            if let Some(project) = self.store.get(name)
                && project.frontend_process_id != Some(server.pid())
            {
                report(self.store.update(
                    name,
                    ProjectUpdate::default().frontend_process_id(Some(server.pid())),
                ));
            }
        }

        self.store.clear_dead_processes(process::is_alive);
    }

    fn shutdown(mut self) -> Result<()> {
        if self.servers.is_empty() {
            return Ok(());
        }

        let stop_all = Confirm::new(&format!(
            "Stop {} running dev server(s) before quitting?",
            self.servers.len()
        ))
        .with_default(true)
        .prompt_skippable()?
        .unwrap_or(true);

        if stop_all {
            let names: Vec<String> = self.servers.keys().cloned().collect();
            for name in names {
                report(self.stop(&name));
            }
        }

        Ok(())
    }
}

/// Print the error of a failed menu action without leaving the menu.
fn report<T, E: Into<anyhow::Error>>(result: std::result::Result<T, E>) {
    if let Err(e) = result {
        let e: anyhow::Error = e.into();
        println!("{} {e:#}", "Error:".red());
    }
}
