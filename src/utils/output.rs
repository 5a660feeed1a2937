//! Colored status lines for human output
//!
//! Outcomes go to stdout so they can be captured; failures go to stderr.

use colored::Colorize;

pub fn print_success(msg: &str) {
    println!("{} {}", "PASS".green().bold(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "FAIL".red().bold(), msg);
}

pub fn print_info(msg: &str) {
    println!("{} {}", "....".blue(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "WARN".yellow().bold(), msg);
}
