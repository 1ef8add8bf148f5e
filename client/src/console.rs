//! Player-facing output

use std::io::Write;
use std::sync::{Arc, Mutex};

/// Where the client writes text meant for the player
pub trait Console: Send + Sync {
    /// Prints a full line
    fn show(&self, text: &str);

    /// Prints text without a newline, for input prompts
    fn prompt(&self, text: &str);
}

/// Writes to the process's standard output
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn show(&self, text: &str) {
        println!("{}", text);
    }

    fn prompt(&self, text: &str) {
        print!("{}", text);
        let _ = std::io::stdout().flush();
    }
}

/// Keeps every line in memory so tests can inspect what the player saw
#[derive(Debug, Default, Clone)]
pub struct MemoryConsole {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// True when any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }

    /// Number of lines equal to `text`
    pub fn count(&self, text: &str) -> usize {
        self.lines().iter().filter(|line| *line == text).count()
    }

    fn push(&self, text: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(text.to_string());
    }
}

impl Console for MemoryConsole {
    fn show(&self, text: &str) {
        self.push(text);
    }

    fn prompt(&self, text: &str) {
        self.push(text);
    }
}
