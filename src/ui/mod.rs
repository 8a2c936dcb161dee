//! The client's terminal presentation layer: directory listings, status
//! messages, and the interactive menu built on top of [`prompt`].

pub mod progress;
pub mod prompt;

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use console::Term;

use crate::config::APP_NAME;

/// Renders a directory listing as a numbered table of decrypted names.
pub fn show_listing(entries: &[String]) {
    if entries.is_empty() {
        println!("{}", console::style("(empty directory)").yellow());
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![Cell::new("No").fg(Color::White), Cell::new("Name").fg(Color::White)]);

    for (i, name) in entries.iter().enumerate() {
        table.add_row(vec![Cell::new(i + 1), Cell::new(name).fg(Color::Green)]);
    }

    println!("{table}");
}

/// A green checkmark line, e.g. after a successful upload or rename.
pub fn show_success(message: &str) {
    println!("{} {}", console::style("✔").green().bright(), console::style(message).white().bright());
}

/// A red cross line for a failed operation; never panics the menu loop.
pub fn show_error(message: &str) {
    eprintln!("{} {}", console::style("✘").red().bright(), console::style(message).red());
}

pub fn clear_screen() -> anyhow::Result<()> {
    Term::stdout().clear_screen().map_err(|e| anyhow::anyhow!("failed to clear screen: {e}"))
}

/// A plain styled banner line; kept lightweight rather than pulling in an
/// ASCII-art font.
pub fn print_banner() {
    println!("{}", console::style(format!("── {APP_NAME} ──")).green().bright().bold());
}
