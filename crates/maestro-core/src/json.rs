//! JSON operations using sonic-rs.

use serde::{Serialize, de::DeserializeOwned};

pub use sonic_rs::Error;

/// Deserialize JSON bytes.
///
/// # Errors
/// Returns error if JSON is invalid.
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    sonic_rs::from_slice(bytes)
}

/// Deserialize a JSON string.
///
/// # Errors
/// Returns error if JSON is invalid.
pub fn from_str<T: DeserializeOwned>(text: &str) -> Result<T, Error> {
    sonic_rs::from_str(text)
}

/// Serialize to compact JSON bytes.
///
/// # Errors
/// Returns error if serialization fails.
pub fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    sonic_rs::to_vec(value)
}

/// Serialize to compact JSON.
///
/// # Errors
/// Returns error if serialization fails.
pub fn to_string<T: Serialize>(value: &T) -> Result<String, Error> {
    sonic_rs::to_string(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Endpoint {
        url: String,
        hash: String,
    }

    #[test]
    fn roundtrip() {
        let endpoint = Endpoint {
            url: "https://example.com/a.zip".into(),
            hash: "deadbeef".into(),
        };
        let bytes = to_vec(&endpoint).unwrap();
        let back: Endpoint = from_slice(&bytes).unwrap();
        assert_eq!(endpoint, back);
    }

    #[test]
    fn btreemap_output_is_deterministic() {
        let mut map = BTreeMap::new();
        map.insert("b", 2);
        map.insert("a", 1);
        assert_eq!(to_string(&map).unwrap(), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(from_str::<Endpoint>("{nope").is_err());
    }
}
