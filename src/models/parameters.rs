use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque parameter bundle handed to the processor.
///
/// Stored verbatim on every task record so that a retry can replay the
/// original request. The orchestrator never interprets the keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterBundle(Map<String, Value>);

impl ParameterBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Build a bundle from any serializable parameter struct. Non-object
    /// values are rejected.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(serde::ser::Error::custom(format!(
                "parameter bundle must be a JSON object, got {other}"
            ))),
        }
    }

    /// Decode the bundle into a typed parameter struct
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }
}

impl From<Map<String, Value>> for ParameterBundle {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_and_lookup() {
        let bundle = ParameterBundle::new()
            .with("mode", "single")
            .with("dpi", 300);

        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.get_str("mode"), Some("single"));
        assert_eq!(bundle.get("dpi"), Some(&json!(300)));
        assert!(bundle.get("missing").is_none());
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(ParameterBundle::from_serializable(&vec![1, 2, 3]).is_err());
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let bundle = ParameterBundle::new().with("color", "#628bce");
        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json, json!({ "color": "#628bce" }));
    }
}
