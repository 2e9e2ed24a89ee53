use chrono::{DateTime, Utc};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, TableComponent,
    modifiers::UTF8_SOLID_INNER_BORDERS, presets::UTF8_FULL,
};

use crate::utils::Timezone;

pub(super) fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Dollar amount with precision scaled to its magnitude, so sub-cent
/// request costs stay readable.
pub(crate) fn format_cost(cost: f64) -> String {
    if cost.is_nan() {
        return "N/A".to_string();
    }
    if cost == 0.0 {
        return "$0.000000".to_string();
    }
    let abs = cost.abs();
    if abs < 0.000_001 {
        format!("${cost:.2e}")
    } else if abs < 0.01 {
        format!("${cost:.6}")
    } else if abs < 1.0 {
        format!("${cost:.4}")
    } else {
        format!("${cost:.2}")
    }
}

/// Per-token price shown per million tokens: 0.000003 -> "$3.00/M"
pub(super) fn format_rate(per_token: f64) -> String {
    let per_million = per_token * 1_000_000.0;
    if per_million == 0.0 {
        "-".to_string()
    } else if per_million < 0.01 {
        format!("${per_million:.4}/M")
    } else {
        format!("${per_million:.2}/M")
    }
}

pub(super) fn format_timestamp(at: Option<DateTime<Utc>>, timezone: Timezone) -> String {
    match at {
        Some(at) => timezone
            .to_fixed_offset(at)
            .format("%Y-%m-%d %H:%M:%S %:z")
            .to_string(),
        None => "never".to_string(),
    }
}

pub(super) fn header_cell(text: &str, use_color: bool) -> Cell {
    let mut cell = Cell::new(text).add_attribute(Attribute::Bold);
    if use_color {
        cell = cell.fg(Color::Cyan);
    }
    cell
}

pub(super) fn right_cell(text: &str, color: Option<Color>, bold: bool) -> Cell {
    let mut cell = Cell::new(text).set_alignment(CellAlignment::Right);
    if let Some(c) = color {
        cell = cell.fg(c);
    }
    if bold {
        cell = cell.add_attribute(Attribute::Bold);
    }
    cell
}

/// Replace the double-line header separator (╞═╪═╡) with single-line (├─┼─┤)
fn normalize_header_separator(table: &mut Table) {
    table.set_style(TableComponent::HeaderLines, '─');
    table.set_style(TableComponent::LeftHeaderIntersection, '├');
    table.set_style(TableComponent::MiddleHeaderIntersections, '┼');
    table.set_style(TableComponent::RightHeaderIntersection, '┤');
}

pub(super) fn create_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    normalize_header_separator(&mut table);
    table
}
