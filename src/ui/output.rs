use crate::scanner::ScanStats;
use crate::ui::{Icons, theme};
use indicatif::HumanDuration;
use owo_colors::OwoColorize;
use std::time::Duration;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
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

pub fn class_name(name: &str) -> String {
    name.style(theme().class.clone()).to_string()
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}

/// Totals of a finished scan
pub fn scan_summary(stats: &ScanStats, elapsed: Duration) {
    println!();
    success(&format!("Scan complete in {}", HumanDuration(elapsed)));
    println!(
        "  {} {} jars  {} {} new  {} {} updated",
        Icons::JAR.style(theme().info.clone()),
        stats.scanned_archives,
        Icons::NEW.style(theme().success.clone()),
        stats.new_units,
        Icons::MOD.style(theme().warn.clone()),
        stats.updated_units
    );
}
