use chrono::{DateTime, Local, Utc};
use comfy_table::{presets, Cell, Color, Table};

pub fn create_table(headers: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.set_header(headers);
    table
}

/// Timestamp in the user's local time, minute precision.
pub fn format_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub fn live_cell(live: bool) -> Cell {
    if live {
        Cell::new("● live").fg(Color::Green)
    } else {
        Cell::new("")
    }
}
