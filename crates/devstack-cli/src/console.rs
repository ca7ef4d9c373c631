use crossterm::style::Stylize;

use devstack_core::output::{Level, Reporter};

/// Prints progress messages to the terminal, colored by level.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for ConsoleReporter {
    fn emit(&self, level: Level, message: &str) {
        tracing::debug!(level = ?level, "{message}");
        match level {
            Level::Info => println!("  {message}"),
            Level::Step => println!("{}", format!("==> {message}").cyan().bold()),
            Level::Success => println!("{} {message}", "ok".green().bold()),
            Level::Warn => println!("{} {message}", "warn".yellow().bold()),
            Level::Error => eprintln!("{} {message}", "error".red().bold()),
        }
    }
}
