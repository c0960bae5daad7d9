//! Attribute store - raw decoded JSON fields of one resource

use serde_json::{Map, Value};

/// The attribute bag of a resource instance, keys as they appear in JSON
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeStore {
    attrs: Map<String, Value>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(attrs: Map<String, Value>) -> Self {
        Self { attrs }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Read a value using a dot-notation path (`fields.summary`, `labels.0`)
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.attrs.get(parts.next()?)?;

        for part in parts {
            current = match part.parse::<usize>() {
                Ok(idx) if current.is_array() => current.get(idx)?,
                _ => current.get(part)?,
            };
        }
        Some(current)
    }

    /// String form of a scalar attribute, for keys and display
    pub fn get_str(&self, key: &str) -> Option<String> {
        scalar_to_string(self.get(key)?)
    }

    pub fn set(&mut self, key: &str, value: Value) -> Option<Value> {
        self.attrs.insert(key.to_string(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attrs.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Merge `other` into the bag.
    ///
    /// With `clobber` top-level keys are replaced outright; without it nested
    /// objects are merged key by key.
    pub fn merge(&mut self, other: Map<String, Value>, clobber: bool) {
        for (key, value) in other {
            if clobber {
                self.attrs.insert(key, value);
                continue;
            }
            match self.attrs.get_mut(&key) {
                Some(existing) => deep_merge(existing, value),
                None => {
                    self.attrs.insert(key, value);
                }
            }
        }
    }

    /// Replace the whole bag
    pub fn replace(&mut self, attrs: Map<String, Value>) {
        self.attrs = attrs;
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.attrs
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.attrs.clone())
    }
}

fn deep_merge(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (slot, incoming) => *slot = incoming,
    }
}

/// String form of a scalar JSON value; `None` for null, arrays and objects
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Display form of any JSON value, used by the CLI tables
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::Array(arr)) => format!("[{} items]", arr.len()),
        Some(Value::Object(_)) => "[object]".to_string(),
        Some(scalar) => scalar_to_string(scalar).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store(value: Value) -> AttributeStore {
        match value {
            Value::Object(map) => AttributeStore::from_map(map),
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_get_path_walks_objects_and_arrays() {
        let attrs = store(json!({
            "fields": {"summary": "Broken build", "labels": ["ci", "infra"]}
        }));
        assert_eq!(attrs.get_path("fields.summary"), Some(&json!("Broken build")));
        assert_eq!(attrs.get_path("fields.labels.1"), Some(&json!("infra")));
        assert_eq!(attrs.get_path("fields.missing"), None);
    }

    #[test]
    fn test_get_str_handles_numbers() {
        let attrs = store(json!({"id": 10001, "key": "PROJ-1", "flag": null}));
        assert_eq!(attrs.get_str("id").as_deref(), Some("10001"));
        assert_eq!(attrs.get_str("key").as_deref(), Some("PROJ-1"));
        assert_eq!(attrs.get_str("flag"), None);
    }

    #[test]
    fn test_merge_without_clobber_is_deep() {
        let mut attrs = store(json!({"fields": {"summary": "a", "priority": "low"}}));
        let incoming = json!({"fields": {"summary": "b"}});
        attrs.merge(incoming.as_object().unwrap().clone(), false);
        assert_eq!(
            attrs.to_value(),
            json!({"fields": {"summary": "b", "priority": "low"}})
        );
    }

    #[test]
    fn test_merge_with_clobber_replaces_top_level() {
        let mut attrs = store(json!({"fields": {"summary": "a", "priority": "low"}}));
        let incoming = json!({"fields": {"summary": "b"}});
        attrs.merge(incoming.as_object().unwrap().clone(), true);
        assert_eq!(attrs.to_value(), json!({"fields": {"summary": "b"}}));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(None), "-");
        assert_eq!(display_value(Some(&json!([1, 2]))), "[2 items]");
        assert_eq!(display_value(Some(&json!({"a": 1}))), "[object]");
        assert_eq!(display_value(Some(&json!(true))), "true");
    }
}
