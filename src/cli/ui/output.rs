use console::style;
use serde::Serialize;

use crate::types::Result;

/// Styled terminal output; `quiet` keeps only errors and machine output
pub struct Output {
    quiet: bool,
}

impl Output {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", style("✓").green(), message);
        }
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", style("⚠").yellow(), message);
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", style("ℹ").blue(), message);
        }
    }

    pub fn section(&self, message: &str) {
        if !self.quiet {
            eprintln!("\n{}", style(message).bold());
            eprintln!("{}", "─".repeat(40));
        }
    }

    /// Machine-readable result on stdout
    pub fn json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new(false)
    }
}
