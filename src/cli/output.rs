use colored::Colorize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::services::{OutcomeStatus, RecordOutcome};

/// Message categories used by the CLI output helpers.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Success,
    Warning,
    Error,
    Section,
}

static PLAIN: AtomicBool = AtomicBool::new(false);

/// Disables colors and labels icons, e.g. for scripts and screen readers.
pub fn set_plain(plain: bool) {
    PLAIN.store(plain, Ordering::Relaxed);
}

fn is_plain() -> bool {
    PLAIN.load(Ordering::Relaxed)
}

fn apply_style(kind: MessageKind, message: impl fmt::Display) -> String {
    let text = message.to_string();
    let formatted = match kind {
        MessageKind::Section => format!("=== {} ===", text.trim()),
        MessageKind::Info => text,
        MessageKind::Success => format!("[ok] {}", text),
        MessageKind::Warning => format!("[!] {}", text),
        MessageKind::Error => format!("[x] {}", text),
    };
    if is_plain() {
        return formatted;
    }
    match kind {
        MessageKind::Success => formatted.bright_green().to_string(),
        MessageKind::Warning => formatted.bright_yellow().to_string(),
        MessageKind::Error => formatted.bright_red().to_string(),
        MessageKind::Section => formatted.bold().to_string(),
        MessageKind::Info => formatted,
    }
}

pub fn print(kind: MessageKind, message: impl fmt::Display) {
    let formatted = apply_style(kind, message);
    match kind {
        MessageKind::Section => println!("\n{}", formatted),
        MessageKind::Error => eprintln!("{}", formatted),
        _ => println!("{}", formatted),
    }
}

pub fn info(message: impl fmt::Display) {
    print(MessageKind::Info, message);
}

pub fn success(message: impl fmt::Display) {
    print(MessageKind::Success, message);
}

pub fn warning(message: impl fmt::Display) {
    print(MessageKind::Warning, message);
}

pub fn error(message: impl fmt::Display) {
    print(MessageKind::Error, message);
}

pub fn section(title: impl fmt::Display) {
    print(MessageKind::Section, title);
}

pub fn outcome(outcome: &RecordOutcome) {
    match &outcome.status {
        OutcomeStatus::Succeeded => success(&outcome.subject),
        OutcomeStatus::Skipped(reason) => warning(format!("{}: {}", outcome.subject, reason)),
        OutcomeStatus::Failed(reason) => error(format!("{}: {}", outcome.subject, reason)),
    }
}

pub fn amount(value: f64) -> String {
    format!("{:>12.2}", value)
}
