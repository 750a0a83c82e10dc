//! Defines the parameter metadata crawled from the SMHI documentation page.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One documented forecast parameter (e.g. `t`, air temperature in °C).
///
/// Built by [`crate::DocCrawler::build_table`] from table rows with exactly six cells.
/// The table is read-only once built and lives for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterMetadata {
    /// Sequential, 0-based position among the kept rows. Unique within one table.
    pub index: usize,
    /// The parameter key used by the forecast API (`"t"`, `"ws"`, `"Wsymb2"`, ...).
    pub name: String,
    /// Unit of the values, e.g. `"Cel"` or `"m/s"`.
    pub unit: String,
    /// Human readable description, used as the chart's y-axis label.
    pub description: String,
    /// Level type column of the SMHI table (e.g. `"hl"`), empty when absent.
    pub level_type: String,
    /// Level column of the SMHI table (e.g. `"2"`), empty when absent.
    pub level: String,
    /// Value range column of the SMHI table, empty when absent.
    pub value_range: String,
}

impl ParameterMetadata {
    /// The parameter name reduced to its API key.
    ///
    /// The documentation occasionally decorates names (`"Wsymb2 *"`, `"t (1)"`); only
    /// the first token with trailing non-alphanumeric markers stripped is compared
    /// against the forecast data.
    pub fn key(&self) -> &str {
        normalize_name(&self.name)
    }
}

impl fmt::Display for ParameterMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.description, self.name, self.unit)
    }
}

pub(crate) fn normalize_name(raw: &str) -> &str {
    raw.split_whitespace()
        .next()
        .unwrap_or("")
        .trim_end_matches(|c: char| !c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str) -> ParameterMetadata {
        ParameterMetadata {
            index: 0,
            name: name.to_string(),
            unit: "Cel".to_string(),
            description: "Air temperature".to_string(),
            level_type: "hl".to_string(),
            level: "2".to_string(),
            value_range: "Decimal number, one decimal".to_string(),
        }
    }

    #[test]
    fn key_strips_decorations() {
        assert_eq!(meta("t").key(), "t");
        assert_eq!(meta("Wsymb2*").key(), "Wsymb2");
        assert_eq!(meta(" Wsymb2 (see table)").key(), "Wsymb2");
        assert_eq!(meta("").key(), "");
    }

    #[test]
    fn display_includes_unit() {
        assert_eq!(meta("t").to_string(), "Air temperature (t, Cel)");
    }
}
