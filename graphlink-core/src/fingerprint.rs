//! Request fingerprints: the cache key for a query/variables pair.

use serde_json::Value;
use std::fmt;

/// Deterministic key derived from a GraphQL document and its variables.
///
/// Structurally equal document/variable pairs always produce the same
/// fingerprint: object keys are sorted recursively before rendering so map
/// insertion order (or serde_json's `preserve_order` feature arriving through
/// feature unification) cannot leak into the key. Opaque outside the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint for a document and optional variables.
    pub fn compute(document: &str, variables: Option<&Value>) -> Self {
        let variables = match variables {
            Some(value) => canonical(value),
            None => "null".to_string(),
        };
        Self(format!("{document}||{variables}"))
    }

    /// The fingerprint as a string key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Render a JSON value with recursively sorted object keys.
fn canonical(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|key| {
                    format!(
                        "{}:{}",
                        Value::String(key.clone()),
                        canonical(&map[key])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}
