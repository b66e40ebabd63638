//! Tolerant field deserializers for model-produced JSON

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

fn to_number(value: Value) -> Result<Option<f64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| format!("expected a number, got {:?}", s)),
        other => Err(format!("expected a number, got {}", other)),
    }
}

/// Accept a JSON number or a numeric string; anything else becomes `None`
pub fn optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| to_number(v).ok().flatten()))
}

/// A JSON number or a numeric string that must be present
pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    to_number(value)
        .map_err(serde::de::Error::custom)?
        .ok_or_else(|| serde::de::Error::custom("missing number"))
}

/// Unknown enum values become `None` instead of failing the whole document
pub fn optional_known<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// `null` becomes the default value
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct WithSize {
        #[serde(default, deserialize_with = "optional_number")]
        size: Option<f64>,
    }

    #[derive(Debug, Deserialize)]
    struct WithPrice {
        #[serde(deserialize_with = "number")]
        price: f64,
    }

    #[test]
    fn test_optional_number_drops_unparseable_values() {
        let parse = |json: &str| serde_json::from_str::<WithSize>(json).unwrap().size;
        assert_eq!(parse(r#"{"size": 2}"#), Some(2.0));
        assert_eq!(parse(r#"{"size": " 1.5 "}"#), Some(1.5));
        assert_eq!(parse(r#"{"size": "2kg"}"#), None);
        assert_eq!(parse(r#"{"size": [1]}"#), None);
        assert_eq!(parse(r#"{"size": null}"#), None);
        assert_eq!(parse(r#"{}"#), None);
    }

    #[test]
    fn test_number_stays_strict() {
        let parse = |json: &str| serde_json::from_str::<WithPrice>(json);
        assert_eq!(parse(r#"{"price": "3.5"}"#).unwrap().price, 3.5);
        assert!(parse(r#"{"price": "cheap"}"#).is_err());
        assert!(parse(r#"{"price": null}"#).is_err());
    }
}
