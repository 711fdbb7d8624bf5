//! Helpers for building JSON Schema tool-input definitions.
//!
//! Every tool input carries a reserved `thought` field holding the model's
//! reasoning for the call. For confirmation-required tools the field is also
//! listed as required. Builders always clone before mutating so schema
//! fragments can be composed without aliasing.

use serde_json::{json, Map, Value};

/// Description attached to the reserved `thought` property.
const THOUGHT_DESCRIPTION: &str = "Your reasoning about why you're using this tool and what \
     you expect to accomplish. For write operations, explain your decision-making process.";

/// Create an object schema with the given properties and required list.
pub fn object_schema(properties: Map<String, Value>, required: &[&str]) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), json!(required));
    }
    Value::Object(schema)
}

/// A string property with a description.
pub fn string_property(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

/// A string property constrained to an enumerated set of values.
pub fn string_enum_property(description: &str, values: &[&str]) -> Value {
    json!({ "type": "string", "description": description, "enum": values })
}

/// A number property with a description.
pub fn number_property(description: &str) -> Value {
    json!({ "type": "number", "description": description })
}

/// An integer property with a description.
pub fn integer_property(description: &str) -> Value {
    json!({ "type": "integer", "description": description })
}

/// A boolean property with a description.
pub fn boolean_property(description: &str) -> Value {
    json!({ "type": "boolean", "description": description })
}

/// An array property with the given item schema.
pub fn array_property(description: &str, items: Value) -> Value {
    json!({ "type": "array", "description": description, "items": items })
}

/// Add the reserved `thought` property to an existing object schema.
///
/// Returns a new schema; the input is not modified. If `require_thought` is
/// true, `"thought"` is appended to the required list. Idempotent: applying
/// this twice yields the same schema as applying it once.
pub fn with_thought(schema: &Value, require_thought: bool) -> Value {
    let mut result = match schema {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    let props = result
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(props) = props {
        props.insert("thought".into(), string_property(THOUGHT_DESCRIPTION));
    }

    if require_thought {
        let required = result.entry("required").or_insert_with(|| json!([]));
        if let Value::Array(required) = required {
            let already = required.iter().any(|v| v == "thought");
            if !already {
                required.push(json!("thought"));
            }
        }
    }

    Value::Object(result)
}

/// Build an object schema and add thought support in one call.
pub fn schema_with_thought(
    properties: Map<String, Value>,
    require_thought: bool,
    required: &[&str],
) -> Value {
    let schema = object_schema(properties, required);
    with_thought(&schema, require_thought)
}

/// Convenience for building a property map inline.
#[macro_export]
macro_rules! properties {
    ($($name:expr => $value:expr),* $(,)?) => {{
        let mut map = serde_json::Map::new();
        $( map.insert($name.to_string(), $value); )*
        map
    }};
}
