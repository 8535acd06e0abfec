use std::io::{self, Write};

/// Single-line stderr progress bar for the batches of one epoch
pub struct ProgressBar {
    total: usize,
    current: usize,
    prefix: String,
    suffix: String,
    width: usize,
}

impl ProgressBar {
    #[must_use]
    pub fn new(total: usize, prefix: &str) -> Self {
        Self {
            total,
            current: 0,
            prefix: prefix.to_string(),
            suffix: String::new(),
            width: 30,
        }
    }

    /// Text drawn after the counter, e.g. the latest losses
    pub fn set_suffix(&mut self, suffix: String) {
        self.suffix = suffix;
        self.render();
    }

    /// Increment by 1 and display
    pub fn inc(&mut self) {
        self.current = (self.current + 1).min(self.total);
        self.render();
    }

    pub fn position(&self) -> usize {
        self.current
    }

    /// Finish the progress bar
    pub fn finish(&self) {
        eprintln!();
        let _ = io::stderr().flush();
    }

    fn line(&self) -> String {
        let filled = if self.total > 0 {
            (self.current * self.width / self.total).min(self.width)
        } else {
            0
        };
        let bar: String = "█".repeat(filled) + &"░".repeat(self.width - filled);
        let mut line = format!("{} [{}] {}/{}", self.prefix, bar, self.current, self.total);
        if !self.suffix.is_empty() {
            line.push_str(" | ");
            line.push_str(&self.suffix);
        }
        line
    }

    fn render(&self) {
        eprint!("\r{}", self.line());
        let _ = io::stderr().flush();
    }
}
