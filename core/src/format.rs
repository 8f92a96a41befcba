//! Pure response shaping helpers. Both fall back to the input untouched when
//! it is not the JSON they expect.

use serde_json::{Map, Value};

/// Re-indent a JSON document; non-JSON input is returned unchanged.
pub fn pretty_print(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| raw.to_string()),
        Err(_) => raw.to_string(),
    }
}

/// Reduce a result-set payload to `{totalCount, <results_key>, _links?}`.
///
/// Returns the input unchanged when it does not parse or when `results_key`
/// is absent or not an array.
pub fn summarize(raw: &str, results_key: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return raw.to_string();
    };
    let Some(results) = value.get(results_key).and_then(Value::as_array) else {
        return raw.to_string();
    };

    let mut summary = Map::new();
    summary.insert("totalCount".to_string(), Value::from(results.len()));
    summary.insert(results_key.to_string(), Value::Array(results.clone()));
    if let Some(links) = value.get("_links") {
        summary.insert("_links".to_string(), links.clone());
    }
    serde_json::to_string_pretty(&Value::Object(summary)).unwrap_or_else(|_| raw.to_string())
}
