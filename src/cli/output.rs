//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the quarry CLI.

use crate::types::{Report, TaskStatus};
use owo_colors::OwoColorize;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the Quarry banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                "\n   {} {}\n",
                "quarry".bright_cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!("\n   quarry v{}\n", env!("CARGO_PKG_VERSION"));
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a file creation message
    pub fn created(&self, file_type: &str, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                file_type.dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] {} {}", file_type, path);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print per-role attempt counts and the report's headline numbers
    pub fn run_summary(&self, report: &Report) {
        self.header("Run summary");
        for task in &report.tasks {
            let status = match task.status {
                TaskStatus::Succeeded => "succeeded",
                TaskStatus::Failed => "failed",
                _ => "incomplete",
            };
            self.kv(
                task.role.title(),
                &format!("{} after {} attempt(s)", status, task.attempts),
            );
        }

        let coverage = &report.search_analysis.coverage;
        self.kv("Keywords", &report.keyword_analysis.entries.len().to_string());
        self.kv(
            "Queries",
            &format!("{}/{} succeeded", coverage.succeeded, coverage.attempted),
        );
        self.kv("Sources", &report.search_analysis.items.len().to_string());
        self.kv("Clusters", &report.search_analysis.clusters.len().to_string());

        for warning in &report.warnings {
            self.warning(&warning.to_string());
        }
    }

    /// Print completion message
    pub fn complete(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "🚀".green(), message.bright_green().bold());
        } else {
            println!("\n  [DONE] {}", message);
        }
    }
}
