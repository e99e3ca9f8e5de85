//! Terminal rendering for operator-facing progress.
//!
//! Only presentation lives here; nothing in this module influences whether
//! an artifact is stored.

use colored::Colorize;
use std::env;

const MIN_BOX_WIDTH: usize = 40;
const MAX_BOX_WIDTH: usize = 60;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BoxStyle {
    Success,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ItemStatus {
    Pass,
    Fail,
    Info,
    Skipped,
}

impl ItemStatus {
    pub fn icon(&self) -> &'static str {
        match self {
            ItemStatus::Pass => "✓",
            ItemStatus::Fail => "✗",
            ItemStatus::Info => "▸",
            ItemStatus::Skipped => "–",
        }
    }
}

pub fn terminal_width() -> usize {
    env::var("TERM_WIDTH")
        .ok()
        .and_then(|w| w.parse().ok())
        .or_else(|| env::var("COLUMNS").ok().and_then(|c| c.parse().ok()))
        .unwrap_or(80)
}

fn effective_width() -> usize {
    terminal_width().clamp(MIN_BOX_WIDTH, MAX_BOX_WIDTH)
}

pub fn box_top(width: usize) -> String {
    format!("╔{}╗", "═".repeat(width.saturating_sub(2)))
}

pub fn box_bottom(width: usize) -> String {
    format!("╚{}╝", "═".repeat(width.saturating_sub(2)))
}

pub fn box_row(left: &str, content: &str, right: &str, width: usize) -> String {
    let content_len = content.chars().count();
    let padding = width.saturating_sub(2).saturating_sub(content_len);
    let left_pad = padding / 2;
    let right_pad = padding - left_pad;
    format!(
        "{}{}{}{}{}",
        left,
        " ".repeat(left_pad),
        content,
        " ".repeat(right_pad),
        right
    )
}

pub fn render_box(title: &str, subtitle: &str, style: BoxStyle) {
    let width = effective_width();
    let paint = |s: String| match style {
        BoxStyle::Success => s.bright_green(),
        BoxStyle::Error => s.bright_red(),
    };

    println!("{}", paint(box_top(width)));
    println!("{}", paint(box_row("║", title, "║", width)).bold());
    if !subtitle.is_empty() {
        println!("{}", paint(box_row("║", subtitle, "║", width)));
    }
    println!("{}", paint(box_bottom(width)));
}

pub fn print_section(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "=".repeat(effective_width()));
}

pub fn print_status_line(message: &str, status: ItemStatus) {
    let icon = status.icon();
    let icon = match status {
        ItemStatus::Pass => icon.bright_green(),
        ItemStatus::Fail => icon.bright_red(),
        ItemStatus::Info => icon.cyan(),
        ItemStatus::Skipped => icon.bright_black(),
    };
    println!("  {} {}", icon, message);
}

/// Multi-line messages (error bodies) indented under a status line.
pub fn print_detail(message: &str) {
    for line in message.lines() {
        println!("      {}", line.bright_black());
    }
}

pub fn print_summary(stored: usize, failed: usize) {
    println!();
    if failed == 0 {
        render_box(
            "STORAGE COMPLETED",
            &format!("{} stored", stored),
            BoxStyle::Success,
        );
    } else {
        render_box(
            "STORAGE INCOMPLETE",
            &format!("{} stored, {} refused", stored, failed),
            BoxStyle::Error,
        );
    }
}
