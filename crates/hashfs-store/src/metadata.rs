//! Header-map view of backend metadata responses.

use std::collections::BTreeMap;

/// Header names the backend exposes.
pub mod headers {
    pub const CONTENT_LENGTH: &str = "Content-Length";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const LAST_MODIFIED: &str = "Last-Modified";
    /// Block size of one object (hashmap responses only).
    pub const OBJECT_BLOCK_SIZE: &str = "X-Object-Block-Size";
    /// Ordered block hashes of one object (hashmap responses only).
    pub const OBJECT_BLOCK_HASHES: &str = "X-Object-Block-Hashes";
    pub const CONTAINER_BLOCK_SIZE: &str = "X-Container-Block-Size";
    pub const CONTAINER_BLOCK_HASH: &str = "X-Container-Block-Hash";
}

/// Metadata as a mapping of header name to its values.
///
/// Lookups ignore ASCII case and treat `-` and `_` alike, since backends
/// disagree on both (`Content-Type` vs `Content_Type`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: BTreeMap<String, (String, Vec<String>)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all values of `name`.
    pub fn insert(&mut self, name: &str, values: Vec<String>) {
        self.entries
            .insert(fold(name), (name.to_string(), values));
    }

    /// Builder form of [`insert`](Self::insert) for a single value.
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, vec![value.into()]);
        self
    }

    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.entries.get(&fold(name)).map(|(_, v)| v.as_slice())
    }

    /// First value of `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name)?.first().map(String::as_str)
    }

    /// Last value of `name` parsed as an unsigned integer.
    pub fn last_u64(&self, name: &str) -> Option<u64> {
        self.values(name)?.last()?.trim().parse().ok()
    }

    /// Iterate headers with their original spelling.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .values()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.last_u64(headers::CONTENT_LENGTH)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.first(headers::CONTENT_TYPE)
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.first(headers::LAST_MODIFIED)
    }
}

fn fold(name: &str) -> String {
    name.chars()
        .map(|c| if c == '_' { '-' } else { c.to_ascii_lowercase() })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case_and_separator() {
        let md = Metadata::new().with("Content_Type", "text/plain");
        assert_eq!(md.content_type(), Some("text/plain"));
        assert_eq!(md.first("content-type"), Some("text/plain"));
    }

    #[test]
    fn numeric_header_uses_last_value() {
        let mut md = Metadata::new();
        md.insert(headers::CONTENT_LENGTH, vec!["3".into(), " 10 ".into()]);
        assert_eq!(md.content_length(), Some(10));
    }

    #[test]
    fn missing_or_garbled_numbers() {
        let md = Metadata::new().with(headers::CONTENT_LENGTH, "ten");
        assert_eq!(md.content_length(), None);
        assert_eq!(md.last_u64(headers::OBJECT_BLOCK_SIZE), None);
    }

    #[test]
    fn iter_keeps_original_spelling() {
        let md = Metadata::new().with("X-Custom", "1");
        let names: Vec<&str> = md.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["X-Custom"]);
    }
}
