pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Render a scalar for a single table or CSV cell.
pub(crate) fn format_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Arrays of objects that render as their own section rather than as a
/// single cell.
pub(crate) fn is_record_list(value: &Value) -> bool {
    matches!(value, Value::Array(items) if items.first().is_some_and(Value::is_object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cells_render_decimals_as_plain_strings() {
        assert_eq!(format_cell(&json!("50000.00")), "50000.00");
        assert_eq!(format_cell(&Value::Null), "");
        assert_eq!(format_cell(&json!(true)), "true");
    }

    #[test]
    fn test_only_object_arrays_are_record_lists() {
        assert!(is_record_list(&json!([{ "tier_level": 1 }])));
        assert!(!is_record_list(&json!(["a", "b"])));
        assert!(!is_record_list(&json!([])));
    }
}
