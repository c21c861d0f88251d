//! Tables printed at the end of a session and by `watermarks`.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use wds_core::WatermarkRegistry;
use wds_core::survey::{Judgment, SurveySummary};
use wds_core::timer::format_hms;

/// Per-page results of a session.
pub fn summary_table(summary: &SurveySummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Page"),
        header_cell("Question"),
        header_cell("Watermark"),
        header_cell("Judgment"),
        header_cell("Result"),
        header_cell("Time"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Center);
    align_column(&mut table, 5, CellAlignment::Right);

    for (i, page) in summary.pages.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&page.question),
            page.watermark.as_deref().map_or_else(|| dim_cell("-"), Cell::new),
            judgment_cell(page.judgment),
            result_cell(page.correct),
            Cell::new(format_hms(std::time::Duration::from_secs(page.elapsed_secs))),
        ]);
    }
    table
}

/// Print the session summary to stdout.
pub fn print_summary(summary: &SurveySummary) {
    if let Some(participant) = &summary.participant {
        println!("Participant: {participant}");
    }
    println!("{}", summary_table(summary));
    println!(
        "Correct: {}/{}",
        summary.correct_count(),
        summary.confirmed_count()
    );
}

/// Registered watermarks with their enabled state.
pub fn watermark_table(registry: &WatermarkRegistry) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Name"),
        header_cell("Kind"),
        header_cell("Active"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Center);

    for name in registry.names() {
        let remote = registry.get(name).is_some_and(|w| w.is_remote());
        table.add_row(vec![
            Cell::new(name).add_attribute(Attribute::Bold),
            Cell::new(if remote { "remote" } else { "local" }),
            if registry.is_enabled(name) {
                Cell::new("✓").fg(Color::Green).add_attribute(Attribute::Bold)
            } else {
                dim_cell("-")
            },
        ]);
    }
    table
}

fn judgment_cell(judgment: Option<Judgment>) -> Cell {
    match judgment {
        Some(Judgment::Watermarked) => Cell::new("watermarked"),
        Some(Judgment::NotWatermarked) => Cell::new("not watermarked"),
        None => dim_cell("-"),
    }
}

fn result_cell(correct: Option<bool>) -> Cell {
    match correct {
        Some(true) => Cell::new("Correct!")
            .fg(Color::Green)
            .add_attribute(Attribute::Bold),
        Some(false) => Cell::new("Incorrect").fg(Color::Red),
        None => dim_cell("-"),
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value.to_string()).add_attribute(Attribute::Dim)
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}
