//! Everything the operator reads goes through [`print`], which hands the line to
//! the tracing subscriber under [`PRINT_TARGET`] so it never tears the spinner.

use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};

use colored::*;
use tracing::info;
use unicode_width::UnicodeWidthStr;

use crate::terminal::colors;

pub const TOTAL_WIDTH: usize = 64;
pub const PRINT_TARGET: &str = "rampart::print";

static KEY_WIDTH: AtomicUsize = AtomicUsize::new(0);

#[macro_export]
macro_rules! mprint {
    () => {
        $crate::print::print("");
    };
    ($msg:expr) => {
        $crate::print::print($msg);
    };
}

pub fn print(msg: &str) {
    info!(target: PRINT_TARGET, raw_msg = msg);
}

/// A full-width line of `fill` with `title` in the middle.
fn titled_rule(fill: &str, title: ColoredString) -> String {
    let width = console::measure_text_width(&title.to_string());
    let free = TOTAL_WIDTH.saturating_sub(width);
    let (left, right) = (free / 2, free - free / 2);
    format!(
        "{}{title}{}",
        fill.repeat(left).color(colors::SEPARATOR),
        fill.repeat(right).color(colors::SEPARATOR)
    )
}

pub fn banner(quiet: u8) {
    if quiet > 0 {
        return;
    }
    let title = format!("⟦ RAMPART v{} ⟧", env!("CARGO_PKG_VERSION"));
    print(&titled_rule("═", title.bright_green().bold()));
}

pub fn header(msg: &str, quiet: u8) {
    if quiet > 0 {
        return;
    }
    let title = format!("⟦ {} ⟧", msg.to_uppercase());
    print(&titled_rule("─", title.bright_green()));
}

pub fn fat_separator() {
    print(&"═".repeat(TOTAL_WIDTH).color(colors::SEPARATOR).to_string());
}

pub fn end_of_program() {
    fat_separator();
}

/// Width the keys of following [`aligned_line`]s are padded to.
pub fn set_key_width<'a>(keys: impl IntoIterator<Item = &'a str>) {
    let width = keys.into_iter().map(UnicodeWidthStr::width).max().unwrap_or(0);
    KEY_WIDTH.store(width, Ordering::Relaxed);
}

/// `key.....: value`, with keys padded to the width set by [`set_key_width`].
pub fn aligned_line(key: &str, value: impl Display) {
    let pad = (KEY_WIDTH.load(Ordering::Relaxed) + 1).saturating_sub(UnicodeWidthStr::width(key));
    let leader = format!("{}:", ".".repeat(pad)).color(colors::SEPARATOR);
    print_status(format!("{}{leader} {value}", key.color(colors::PRIMARY)));
}

pub fn print_status(msg: impl AsRef<str>) {
    print(&format!(
        "{} {}",
        ">".color(colors::SEPARATOR),
        msg.as_ref().color(colors::TEXT_DEFAULT)
    ));
}

pub fn tree_head(idx: usize, name: &str) {
    let index = format!("[{}]", idx.to_string().color(colors::ACCENT));
    print(&format!("{} {}", index.color(colors::SEPARATOR), name.color(colors::PRIMARY)));
}

/// One level of `├─ key...: value` branches, the last one closed with `└─`.
pub fn as_tree_one_level(entries: Vec<(String, ColoredString)>) {
    let key_width = entries.iter().map(|(k, _)| UnicodeWidthStr::width(k.as_str())).max().unwrap_or(0);
    let last = entries.len().saturating_sub(1);

    for (i, (key, value)) in entries.into_iter().enumerate() {
        let branch = if i == last { "└─" } else { "├─" };
        let leader = format!("{}:", ".".repeat(key_width + 1 - UnicodeWidthStr::width(key.as_str())));
        print(&format!(
            " {} {}{} {value}",
            branch.color(colors::SEPARATOR),
            key.color(colors::TEXT_DEFAULT),
            leader.color(colors::SEPARATOR)
        ));
    }
}

pub fn centerln(msg: &str) {
    let indent = TOTAL_WIDTH.saturating_sub(console::measure_text_width(msg)) / 2;
    print(&format!("{}{msg}", " ".repeat(indent)));
}

/// Multi-line text such as a ruleset, indented under the current header.
pub fn block(text: &str) {
    text.lines().for_each(|line| print(&format!("  {line}")));
}

pub fn nothing_to_do(quiet: u8) {
    header("nothing to do", quiet);
    print(&"no machine matched the selection".yellow().bold().to_string());
}
