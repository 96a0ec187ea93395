use std::path::Path;

use crate::engine::{Diagnostic, Location, Severity};
use crate::ui::{Icons, theme};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!("{} {}: {}", Icons::INFO.style(theme().info.clone()), label.style(theme().dim.clone()), value);
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

pub fn file_modified(path: &str) {
    println!("{} {}", Icons::MOD.style(theme().warn.clone()), path);
}

pub fn file_deleted(path: &str) {
    println!("{} {}", Icons::DEL.style(theme().error.clone()), path);
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}

/// 1-based line and column of a character offset
pub fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for c in text.chars().take(offset) {
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// `path:line:col`, falling back to the raw offset when the file cannot be read
pub fn position(path: &Path, offset: usize) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let (line, col) = line_col(&text, offset);
            format!("{}:{}:{}", path.display(), line, col)
        }
        Err(_) => format!("{}@{}", path.display(), offset),
    }
}

pub fn location(location: &Location) {
    println!("  {} {}", Icons::LINK.style(theme().info.clone()), position(&location.file, location.start));
}

pub fn diagnostic(path: &Path, diagnostic: &Diagnostic) {
    let at = position(path, diagnostic.start);
    match diagnostic.severity {
        Severity::Error => {
            println!("{} {} {}", Icons::CROSS, at, diagnostic.message.style(theme().error.clone()))
        }
        Severity::Warning => {
            println!("{} {} {}", Icons::WARN, at, diagnostic.message.style(theme().warn.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col() {
        let text = "a : b ;\nB : 'é' ;";
        assert_eq!(line_col(text, 0), (1, 1));
        assert_eq!(line_col(text, 4), (1, 5));
        assert_eq!(line_col(text, 8), (2, 1));
        assert_eq!(line_col(text, 13), (2, 6));
    }
}
