use crate::core::{NoticeKind, Notifier, Origin};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    TotalValue,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::TotalValue => style(text).green().bold(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

pub fn amount_cell(value: f64) -> Cell {
    if value > 0.0 {
        Cell::new(format!("{value:.2}")).set_alignment(CellAlignment::Right)
    } else {
        // Zero marks a currency that could not be priced
        Cell::new("N/A")
            .fg(Color::DarkGrey)
            .set_alignment(CellAlignment::Right)
    }
}

/// Signed price movement, green when up and red when down.
pub fn delta_cell(delta: Option<f64>) -> Cell {
    match delta {
        None => Cell::new("-")
            .fg(Color::DarkGrey)
            .set_alignment(CellAlignment::Right),
        Some(d) => {
            let color = if d > 0.0 {
                Color::Green
            } else if d < 0.0 {
                Color::Red
            } else {
                Color::DarkGrey
            };
            Cell::new(format!("{d:+.2}"))
                .fg(color)
                .set_alignment(CellAlignment::Right)
        }
    }
}

/// Colors a quote's origin by how trustworthy it is.
pub fn origin_cell(origin: Origin) -> Cell {
    let color = match origin {
        Origin::Live => Color::Green,
        Origin::Cache => Color::Cyan,
        Origin::LastKnownGood => Color::Yellow,
        Origin::Default => Color::Red,
    };
    Cell::new(origin.to_string()).fg(color)
}

/// Creates a ticking spinner for work of unknown length.
pub fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Prints a separator line matching the terminal width.
pub fn print_separator() {
    let term_width = console::Term::stdout()
        .size_checked()
        .map(|(_, w)| w as usize)
        .unwrap_or(80);
    println!("\n{}", "─".repeat(term_width));
}

/// Prints notices as one styled line on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        let label = match kind {
            NoticeKind::Success => style("✔ ok").green().bold(),
            NoticeKind::Warning => style("! warning").yellow().bold(),
            NoticeKind::Error => style("✘ error").red().bold(),
        };
        eprintln!("{label} {message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_cell_formatting() {
        assert_eq!(delta_cell(Some(1.5)).content(), "+1.50");
        assert_eq!(delta_cell(Some(-0.25)).content(), "-0.25");
        assert_eq!(delta_cell(None).content(), "-");
    }

    #[test]
    fn test_amount_cell_hides_unpriced() {
        assert_eq!(amount_cell(1025.0).content(), "1025.00");
        assert_eq!(amount_cell(0.0).content(), "N/A");
    }

    #[test]
    fn test_origin_cell_text() {
        assert_eq!(origin_cell(Origin::LastKnownGood).content(), "last known good");
    }
}
