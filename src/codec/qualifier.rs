//! Composite column qualifiers.
//!
//! Logical fields are joined with the reserved unit separator (0x1F). The
//! separator must never appear inside a field; writers reject it and the
//! parsers here re-check part counts.
//!
//! Discriminators (`name␟key␟visibility␟hex(ts)`) are only map keys. They
//! are not ordered by timestamp.

use crate::error::{CellGraphError, Result};

pub const SEPARATOR: char = '\u{1f}';
pub const SEPARATOR_BYTE: u8 = 0x1f;

/// Split `qualifier` into exactly `expected` parts.
pub fn split(qualifier: &str, expected: usize) -> Result<Vec<&str>> {
    let parts: Vec<&str> = qualifier.split(SEPARATOR).collect();
    if parts.len() != expected {
        return Err(CellGraphError::MalformedQualifier {
            expected,
            found: parts.len(),
            qualifier: qualifier.replace(SEPARATOR, "\\x1f"),
        });
    }
    Ok(parts)
}

pub fn assert_no_separator(s: &str) -> Result<()> {
    if s.as_bytes().contains(&SEPARATOR_BYTE) {
        return Err(CellGraphError::InvalidKey(s.replace(SEPARATOR, "\\x1f")));
    }
    Ok(())
}

/// Join parts with the separator, rejecting parts that contain it.
pub fn join(parts: &[&str]) -> Result<String> {
    let mut out = String::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
    for (i, part) in parts.iter().enumerate() {
        assert_no_separator(part)?;
        if i > 0 {
            out.push(SEPARATOR);
        }
        out.push_str(part);
    }
    Ok(out)
}

/// Map key identifying one property value.
pub fn discriminator(name: &str, key: &str, visibility: &str, timestamp: i64) -> Result<String> {
    join(&[name, key, visibility, &format!("{:x}", timestamp)])
}

/// Inverse of [`discriminator`]; the timestamp is returned in its hex form.
pub fn split_discriminator(discriminator: &str) -> Result<[&str; 4]> {
    let parts = split(discriminator, 4)?;
    Ok([parts[0], parts[1], parts[2], parts[3]])
}

// ── Qualifier Types ────────────────────────────────────────────────

/// `PROP` / `PROPD` qualifier: `name␟key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyColumnQualifier {
    pub name: String,
    pub key: String,
}

impl PropertyColumnQualifier {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }

    pub fn parse(qualifier: &str) -> Result<Self> {
        let parts = split(qualifier, 2)?;
        Ok(Self::new(parts[0], parts[1]))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(join(&[&self.name, &self.key])?.into_bytes())
    }

    pub fn discriminator(&self, visibility: &str, timestamp: i64) -> Result<String> {
        discriminator(&self.name, &self.key, visibility, timestamp)
    }
}

/// `PROPH` qualifier: `name␟key␟property_visibility`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyHiddenColumnQualifier {
    pub name: String,
    pub key: String,
    pub visibility: String,
}

impl PropertyHiddenColumnQualifier {
    pub fn new(
        name: impl Into<String>,
        key: impl Into<String>,
        visibility: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            visibility: visibility.into(),
        }
    }

    pub fn parse(qualifier: &str) -> Result<Self> {
        let parts = split(qualifier, 3)?;
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(join(&[&self.name, &self.key, &self.visibility])?.into_bytes())
    }
}

/// `PROPMETA` qualifier: `name␟key␟property_visibility␟metadata_key`.
///
/// The cell's timestamp is the timestamp of the property it annotates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyMetadataColumnQualifier {
    pub name: String,
    pub key: String,
    pub visibility: String,
    pub metadata_key: String,
}

impl PropertyMetadataColumnQualifier {
    pub fn new(
        name: impl Into<String>,
        key: impl Into<String>,
        visibility: impl Into<String>,
        metadata_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            visibility: visibility.into(),
            metadata_key: metadata_key.into(),
        }
    }

    pub fn parse(qualifier: &str) -> Result<Self> {
        let parts = split(qualifier, 4)?;
        Ok(Self::new(parts[0], parts[1], parts[2], parts[3]))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(join(&[&self.name, &self.key, &self.visibility, &self.metadata_key])?.into_bytes())
    }

    /// Discriminator of the annotated property.
    pub fn property_discriminator(&self, timestamp: i64) -> Result<String> {
        discriminator(&self.name, &self.key, &self.visibility, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_split_exact_count() {
        let parts = split("a\u{1f}b", 2).unwrap();
        assert_eq!(parts, vec!["a", "b"]);
    }

    #[test]
    fn test_split_wrong_count() {
        let err = split("a\u{1f}b\u{1f}c", 2).unwrap_err();
        assert_eq!(err.code(), "MALFORMED_QUALIFIER");
        let err = split("abc", 2).unwrap_err();
        assert!(err.to_string().contains("found 1"));
    }

    #[test]
    fn test_join_rejects_separator() {
        let err = join(&["ok", "bad\u{1f}part"]).unwrap_err();
        assert_eq!(err.code(), "INVALID_KEY");
    }

    #[test]
    fn test_discriminator_hex_timestamp() {
        let d = discriminator("age", "k", "vis", 255).unwrap();
        assert_eq!(d, "age\u{1f}k\u{1f}vis\u{1f}ff");
    }

    #[test]
    fn test_property_qualifier_roundtrip() {
        let q = PropertyColumnQualifier::new("name", "key1");
        let bytes = q.encode().unwrap();
        let parsed = PropertyColumnQualifier::parse(std::str::from_utf8(&bytes).unwrap()).unwrap();
        assert_eq!(parsed, q);
    }

    #[test]
    fn test_metadata_qualifier_discriminator_matches_property() {
        let meta = PropertyMetadataColumnQualifier::new("name", "k", "a&b", "modifiedBy");
        let prop = PropertyColumnQualifier::new("name", "k");
        assert_eq!(
            meta.property_discriminator(42).unwrap(),
            prop.discriminator("a&b", 42).unwrap()
        );
    }

    #[test]
    fn test_metadata_qualifier_too_few_parts() {
        let err = PropertyMetadataColumnQualifier::parse("name\u{1f}k\u{1f}vis").unwrap_err();
        assert_eq!(err.code(), "MALFORMED_QUALIFIER");
    }

    proptest! {
        #[test]
        fn prop_discriminator_roundtrip(
            name in "[^\u{1f}]{0,12}",
            key in "[^\u{1f}]{0,12}",
            vis in "[^\u{1f}]{0,12}",
            ts in any::<i64>(),
        ) {
            let d = discriminator(&name, &key, &vis, ts).unwrap();
            let ts_hex = format!("{:x}", ts);
            let parts = split_discriminator(&d).unwrap();
            prop_assert_eq!(parts, [name.as_str(), key.as_str(), vis.as_str(), ts_hex.as_str()]);
        }

        #[test]
        fn prop_separator_always_rejected(
            prefix in "[^\u{1f}]{0,8}",
            suffix in "[^\u{1f}]{0,8}",
        ) {
            let bad = format!("{}\u{1f}{}", prefix, suffix);
            prop_assert!(discriminator(&bad, "k", "v", 1).is_err());
            prop_assert!(discriminator("n", &bad, "v", 1).is_err());
            prop_assert!(discriminator("n", "k", &bad, 1).is_err());
        }
    }
}
