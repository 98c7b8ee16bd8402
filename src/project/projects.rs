//! Collection helpers for listing projects.
//!
//! This module provides the `Projects` struct which wraps a snapshot of the
//! store's projects for presentation in the summary table printed by the CLI.

use colored::Colorize;

use super::Project;

/// A snapshot of tracked projects with presentation helpers.
pub struct Projects(Vec<Project>);

impl From<Vec<Project>> for Projects {
    fn from(projects: Vec<Project>) -> Self {
        Self(projects)
    }
}

impl From<&[Project]> for Projects {
    fn from(projects: &[Project]) -> Self {
        Self(projects.to_vec())
    }
}

impl Projects {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Project] {
        &self.0
    }

    /// Project names in display order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(Project::name).collect()
    }

    /// One line per project for the summary table.
    ///
    /// # Output Format
    ///
    /// ```text
    /// ● My Shop          my-shop          :3001  db 4    /home/me/projects/my-shop
    /// ```
    #[must_use]
    pub fn table_rows(&self) -> Vec<String> {
        let name_width = self.0.iter().map(|p| p.name().len()).max().unwrap_or(0);
        let pretty_width = self
            .0
            .iter()
            .map(|p| p.display_name.chars().count())
            .max()
            .unwrap_or(0);

        self.0
            .iter()
            .map(|p| {
                let marker = if p.is_running() { "●" } else { "○" };
                let db = p
                    .cache_db_index
                    .map_or_else(|| "-".to_string(), |i| format!("db {i}"));

                format!(
                    "{marker} {:pretty_width$}  {:name_width$}  :{:<5}  {db:<6}  {}",
                    p.display_name,
                    p.name(),
                    p.port,
                    p.directory().display(),
                )
            })
            .collect()
    }

    /// Print the summary table to stdout.
    pub fn print_table(&self) {
        if self.0.is_empty() {
            println!("{}", "No projects found".yellow());
            return;
        }

        for (row, project) in self.table_rows().into_iter().zip(&self.0) {
            if project.is_running() {
                println!("  {}", row.green());
            } else {
                println!("  {row}");
            }
        }

        println!(
            "\n  {} {}",
            self.0.len().to_string().bright_white().bold(),
            "projects tracked".bright_white()
        );
    }
}
