//! Flat string-keyed iterator options.
//!
//! The host passes every setting as a string; each value is a JSON literal
//! (`"true"`, `"250"`, `"[\"a\",\"b\"]"`). Absent keys fall back to defaults.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CellGraphError, Result};

pub type IteratorOptions = HashMap<String, String>;

/// Parse `key` as JSON, or `None` when absent.
pub fn get<T: DeserializeOwned>(options: &IteratorOptions, key: &str) -> Result<Option<T>> {
    match options.get(key) {
        None => Ok(None),
        Some(raw) => serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| CellGraphError::invalid_option(key, e.to_string())),
    }
}

/// Boolean option, `false` when absent.
pub fn get_bool(options: &IteratorOptions, key: &str) -> Result<bool> {
    Ok(get(options, key)?.unwrap_or(false))
}

/// Raw string option (not JSON-decoded), for enumerated values.
pub fn get_str<'a>(options: &'a IteratorOptions, key: &str) -> Option<&'a str> {
    options.get(key).map(|s| s.trim().trim_matches('"'))
}

pub fn put<T: Serialize>(options: &mut IteratorOptions, key: &str, value: &T) -> Result<()> {
    options.insert(key.to_string(), serde_json::to_string(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(pairs: &[(&str, &str)]) -> IteratorOptions {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_get_bool_default_false() {
        let o = opts(&[("a", "true")]);
        assert!(get_bool(&o, "a").unwrap());
        assert!(!get_bool(&o, "missing").unwrap());
    }

    #[test]
    fn test_get_typed() {
        let o = opts(&[("limit", "25"), ("names", r#"["x","y"]"#)]);
        assert_eq!(get::<usize>(&o, "limit").unwrap(), Some(25));
        assert_eq!(get::<Vec<String>>(&o, "names").unwrap(), Some(vec!["x".into(), "y".into()]));
    }

    #[test]
    fn test_get_invalid_value() {
        let o = opts(&[("limit", "lots")]);
        let err = get::<usize>(&o, "limit").unwrap_err();
        assert_eq!(err.code(), "INVALID_OPTION");
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn test_get_str_accepts_quoted_and_bare() {
        let o = opts(&[("a", "\"edge\""), ("b", "vertex")]);
        assert_eq!(get_str(&o, "a"), Some("edge"));
        assert_eq!(get_str(&o, "b"), Some("vertex"));
    }
}
