use serde_json::Value;

use super::format_cell;

/// Print just the headline value of a result.
///
/// Looks for well-known fields in priority order, then falls back to the
/// first field of the result object.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let priority_keys = [
        "status",
        "is_valid",
        "to_distribute",
        "carry",
        "overdistribution",
        "accrued",
        "calculation_id",
    ];

    if let Value::Object(map) = result_obj {
        // Clawback wraps its numbers one level down
        if let Some(Value::Object(inner)) = map.get("clawback") {
            if let Some(val) = inner.get("overdistribution") {
                println!("{}", format_cell(val));
                return;
            }
        }

        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    match map.get("id") {
                        Some(id) => println!("{} {}", format_cell(id), format_cell(val)),
                        None => println!("{}", format_cell(val)),
                    }
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_cell(val));
            return;
        }
    }

    if let Value::Array(items) = result_obj {
        for item in items {
            print_minimal(item);
        }
        return;
    }

    println!("{}", format_cell(result_obj));
}
