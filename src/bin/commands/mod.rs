pub mod config;
pub mod customers;
pub mod init;
pub mod schema;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty table with borders (default)
    #[default]
    Table,
    /// Markdown table format
    Markdown,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON with indentation
    JsonPretty,
    /// JSON Lines format (one JSON object per line)
    JsonLine,
}

impl OutputFormat {
    pub fn all_names() -> &'static [&'static str] {
        &["table", "markdown", "json", "json-pretty", "json-line"]
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
            Self::JsonPretty => write!(f, "json-pretty"),
            Self::JsonLine => write!(f, "json-line"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "pretty" => Ok(Self::Table),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "json-pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "json-line" | "jsonline" | "jsonl" | "ndjson" => Ok(Self::JsonLine),
            _ => Err(format!(
                "Unknown output format '{}'. Valid formats: {}",
                s,
                Self::all_names().join(", ")
            )),
        }
    }
}

/// Print a list of rows in the requested format
///
/// `json` is what the JSON variants serialize; tables use `rows`.
pub fn print_rows<R: Tabled, J: Serialize>(
    rows: Vec<R>,
    json: &[J],
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => println!("{}", Table::new(rows).with(Style::rounded())),
        OutputFormat::Markdown => println!("{}", Table::new(rows).with(Style::markdown())),
        OutputFormat::Json => println!("{}", serde_json::to_string(json)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(json)?),
        OutputFormat::JsonLine => {
            for item in json {
                println!("{}", serde_json::to_string(item)?);
            }
        }
    }
    Ok(())
}

/// Print a single value; tables fall back to `key | value` pairs
pub fn print_value<J: Serialize>(
    value: &J,
    pairs: Vec<(&str, String)>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table | OutputFormat::Markdown => {
            let rows: Vec<KeyValue> = pairs
                .into_iter()
                .map(|(key, value)| KeyValue {
                    key: key.to_string(),
                    value,
                })
                .collect();
            let style = if format == OutputFormat::Table {
                Table::new(rows).with(Style::rounded()).to_string()
            } else {
                Table::new(rows).with(Style::markdown()).to_string()
            };
            println!("{}", style);
        }
        OutputFormat::Json | OutputFormat::JsonLine => {
            println!("{}", serde_json::to_string(value)?)
        }
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

#[derive(Tabled)]
struct KeyValue {
    key: String,
    value: String,
}

/// Truncate to `max_len` characters, ending in "..." when cut
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_names() {
        for name in OutputFormat::all_names() {
            let format = OutputFormat::from_str(name).unwrap();
            assert_eq!(format.to_string(), *name);
        }
        assert_eq!(OutputFormat::from_str("MD").unwrap(), OutputFormat::Markdown);
        assert!(OutputFormat::from_str("csv").is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 20), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
    }
}
