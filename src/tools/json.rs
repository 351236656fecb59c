use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use super::{required_str, Tool};
use crate::error::{InsightError, InsightResult};

/// Accepts the JSON either as a value or as a string holding JSON text.
fn json_argument(args: &Value) -> InsightResult<Value> {
    match args.get("json_data") {
        Some(Value::String(raw)) => serde_json::from_str(raw)
            .map_err(|e| InsightError::invalid_input(format!("json_data is not valid JSON: {}", e))),
        Some(value) => Ok(value.clone()),
        None => Err(InsightError::invalid_input("Missing required argument 'json_data'")),
    }
}

/// Walk a dotted path such as `data.0.balance`. Numeric segments index into
/// arrays; an empty path returns the root.
pub fn lookup_path<'a>(value: &'a Value, key_path: &str) -> Option<&'a Value> {
    let key_path = key_path.trim();
    if key_path.is_empty() {
        return Some(value);
    }

    key_path.split('.').try_fold(value, |current, key| match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    })
}

fn schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "json_data": {
                "type": "string",
                "description": "JSON text returned by another tool"
            },
            "key_path": {
                "type": "string",
                "description": description
            }
        },
        "required": ["json_data", "key_path"]
    })
}

pub struct ExtractJsonValueTool;

#[async_trait]
impl Tool for ExtractJsonValueTool {
    fn name(&self) -> &str {
        "extract_json_value"
    }

    fn description(&self) -> &str {
        "Extracts a value from a JSON object based on a key path. Example: for key_path 'data.0.balance' it extracts the balance of the first item in the 'data' list."
    }

    fn parameters_schema(&self) -> Value {
        schema("Dot separated path, list indices as numbers")
    }

    async fn execute(&self, args: Value) -> InsightResult<Value> {
        let data = json_argument(&args)?;
        let key_path = required_str(&args, "key_path").unwrap_or("");

        match lookup_path(&data, key_path) {
            Some(value) => Ok(value.clone()),
            None => {
                warn!("Key path '{}' not found in JSON structure", key_path);
                Ok(Value::Null)
            }
        }
    }
}

pub struct CountJsonListTool;

#[async_trait]
impl Tool for CountJsonListTool {
    fn name(&self) -> &str {
        "count_json_list"
    }

    fn description(&self) -> &str {
        "Counts the number of items in a list at a given key path in a JSON object. Example: for key_path 'data' it counts how many items are in the 'data' list."
    }

    fn parameters_schema(&self) -> Value {
        schema("Dot separated path to a list")
    }

    async fn execute(&self, args: Value) -> InsightResult<Value> {
        let data = json_argument(&args)?;
        let key_path = required_str(&args, "key_path").unwrap_or("");

        match lookup_path(&data, key_path) {
            Some(Value::Array(items)) => Ok(json!(items.len())),
            Some(_) => {
                warn!("Value at key_path '{}' is not a list", key_path);
                Ok(Value::Null)
            }
            None => {
                warn!("Key path '{}' not found in JSON structure", key_path);
                Ok(Value::Null)
            }
        }
    }
}
