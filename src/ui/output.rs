//! Line-oriented CLI output. Everything except errors and warnings is
//! suppressed when [`is_quiet`] is set.

use crate::ui::{is_quiet, theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::ROSTER, text.style(theme().header));
}

pub fn success(label: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", Icons::CHECK, label.style(theme().success));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn));
}

pub fn info(label: &str, value: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}: {}", Icons::INFO, label.style(theme().label), value);
}

/// One entity line, e.g. a created company or a removed store
pub fn item(icon: &str, text: &str) {
    if is_quiet() {
        return;
    }
    println!("{} {}", icon, text);
}

pub fn section(title: &str) {
    if is_quiet() {
        return;
    }
    println!();
    println!("━{}━", title.style(theme().header));
}

pub fn summary_row(label: &str, value: &str) {
    if is_quiet() {
        return;
    }
    println!("  {} {}", label.style(theme().label), value);
}

pub fn dim(text: &str) -> String {
    text.style(theme().label).to_string()
}

/// A company or student name, highlighted
pub fn accent(text: &str) -> String {
    text.style(theme().accent).to_string()
}
