use std::io;

use console::Term;

use crate::output::{cyan, dim};

/// Asks the user to pick one of `items` by number.
///
/// Returns `None` when there is nothing to pick or the user enters an empty
/// line. Invalid answers are asked again.
pub fn select(label: &str, items: &[String]) -> io::Result<Option<usize>> {
    if items.is_empty() {
        return Ok(None);
    }

    let term = Term::stderr();
    term.write_line(&format!("{label}?"))?;
    for (index, item) in items.iter().enumerate() {
        term.write_line(&format!("  {} {}", dim(format!("{:>2})", index + 1)), cyan(item)))?;
    }

    loop {
        term.write_str(&format!("{} ", dim(format!("[1-{}, empty to cancel]", items.len()))))?;
        let answer = term.read_line()?;
        if answer.trim().is_empty() {
            return Ok(None);
        }
        match parse_selection(&answer, items.len()) {
            Some(index) => {
                term.write_line(&format!("✔ {}", cyan(&items[index])))?;
                return Ok(Some(index));
            }
            None => term.write_line(&format!("'{}' is not a valid choice", answer.trim()))?,
        }
    }
}

/// Like [`select`] but returns the chosen item itself.
pub fn select_item(label: &str, items: &[String]) -> io::Result<Option<String>> {
    Ok(select(label, items)?.map(|index| items[index].clone()))
}

/// Reads one line, falling back to `default` when the answer is empty.
pub fn input(label: &str, default: Option<&str>) -> io::Result<String> {
    let term = Term::stderr();
    match default {
        Some(default) if !default.is_empty() => {
            term.write_str(&format!("{label} {}: ", dim(format!("[{default}]"))))?
        }
        _ => term.write_str(&format!("{label}: "))?,
    }

    let answer = term.read_line()?;
    let answer = answer.trim();
    Ok(if answer.is_empty() {
        default.unwrap_or_default().to_string()
    } else {
        answer.to_string()
    })
}

/// Reads a line without echoing it.
pub fn secret(label: &str) -> io::Result<String> {
    let term = Term::stderr();
    term.write_str(&format!("{label}: "))?;
    Ok(term.read_secure_line()?.trim().to_string())
}

/// 1-based position in a list of `len` items.
fn parse_selection(answer: &str, len: usize) -> Option<usize> {
    let position: usize = answer.trim().parse().ok()?;
    (1..=len).contains(&position).then(|| position - 1)
}
