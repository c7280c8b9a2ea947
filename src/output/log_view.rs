use super::styling::{bright_red, bright_yellow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warn,
    Normal,
}

impl Severity {
    /// Classifies a console line by the first keyword it carries, errors first.
    pub fn of(line: &str) -> Self {
        if line.contains("ERROR") {
            Self::Error
        } else if line.contains("WARN") {
            Self::Warn
        } else {
            Self::Normal
        }
    }
}

pub fn style_line(line: &str) -> String {
    match Severity::of(line) {
        Severity::Error => bright_red(line).to_string(),
        Severity::Warn => bright_yellow(line).to_string(),
        Severity::Normal => line.to_string(),
    }
}

/// Prints a log chunk line by line. A trailing partial line is held in
/// `pending` until the next chunk completes it.
pub fn print_chunk(pending: &mut String, chunk: &str) {
    pending.push_str(chunk);
    while let Some(end) = pending.find('\n') {
        let line: String = pending.drain(..=end).collect();
        println!("{}", style_line(line.trim_end_matches(['\n', '\r'])));
    }
}

pub fn flush(pending: &mut String) {
    if !pending.is_empty() {
        println!("{}", style_line(pending));
        pending.clear();
    }
}
