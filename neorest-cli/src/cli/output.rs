// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Result rendering for the CLI

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use serde_json::Value;

use super::commands::OutputFormat;

/// Column used for rows that are not objects
const VALUE_COLUMN: &str = "value";

pub struct ResultFormatter;

impl ResultFormatter {
    /// Renders resolved rows in the requested format
    pub fn format(rows: &[Value], format: OutputFormat) -> String {
        match format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(rows).unwrap_or_else(|e| format!("<unprintable: {}>", e))
            }
            OutputFormat::Csv => Self::csv(rows),
            OutputFormat::Table => Self::table(rows),
        }
    }

    /// Union of object keys in first-seen order
    fn columns(rows: &[Value]) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in rows {
            match row {
                Value::Object(map) => {
                    for key in map.keys() {
                        if !columns.contains(key) {
                            columns.push(key.clone());
                        }
                    }
                }
                _ => {
                    if !columns.iter().any(|c| c == VALUE_COLUMN) {
                        columns.push(VALUE_COLUMN.to_string());
                    }
                }
            }
        }
        columns
    }

    fn cell(row: &Value, column: &str) -> String {
        let value = match row {
            Value::Object(map) => map.get(column),
            other if column == VALUE_COLUMN => Some(other),
            _ => None,
        };
        match value {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }

    fn table(rows: &[Value]) -> String {
        if rows.is_empty() {
            return "(no rows)".to_string();
        }
        let columns = Self::columns(rows);

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(columns.iter().map(|c| Cell::new(c).fg(Color::Cyan)));
        for row in rows {
            table.add_row(columns.iter().map(|column| Cell::new(Self::cell(row, column))));
        }

        let noun = if rows.len() == 1 { "row" } else { "rows" };
        format!("{table}\n{} {}", rows.len(), noun)
    }

    fn csv(rows: &[Value]) -> String {
        let columns = Self::columns(rows);
        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.push(columns.iter().map(|c| escape_csv(c)).collect::<Vec<_>>().join(","));
        for row in rows {
            lines.push(
                columns
                    .iter()
                    .map(|column| escape_csv(&Self::cell(row, column)))
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }
        lines.join("\n")
    }
}

fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
