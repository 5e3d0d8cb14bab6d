// crates/aludel-cli/src/output.rs
//
// Output formatting utilities for the Aludel CLI.
// Supports table and JSON output modes.

use std::str::FromStr;

use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed table output (default).
    Table,
    /// JSON output for machine consumption.
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{}' (expected table or json)", other)),
        }
    }
}

/// A single labelled value, for summary tables.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct Field {
    pub field: String,
    pub value: String,
}

impl Field {
    pub fn new(field: &str, value: impl ToString) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

/// Format a slice of Tabled items as a table string.
pub fn format_table<T: Tabled>(data: &[T]) -> String {
    Table::new(data).to_string()
}

/// Format a serializable value as a pretty-printed JSON string.
pub fn format_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("JSON serialization error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_format() {
        assert_eq!("table".parse::<OutputFormat>(), Ok(OutputFormat::Table));
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_format_table_has_headers() {
        let rows = vec![Field::new("total_stake", 42)];
        let table = format_table(&rows);
        assert!(table.contains("field"));
        assert!(table.contains("total_stake"));
        assert!(table.contains("42"));
    }

    #[test]
    fn test_format_json() {
        let json = format_json(&Field::new("a", "b"));
        assert!(json.contains("\"field\": \"a\""));
    }
}
