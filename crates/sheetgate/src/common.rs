//! Caller-owned context passed through an import

use std::collections::BTreeMap;

/// Opaque context supplied by the caller of an import
///
/// The pipeline only asks it for an isolation key, used to keep the reports of
/// different callers in separate directories. Collaborators receive the same
/// value and may know its concrete type.
pub trait CommonData: Send + Sync {
    /// Path segments that isolate this caller's artifacts; sanitized before use
    fn isolation_key(&self) -> Vec<String>;
}

/// Ordered `name = value` pairs; the values form the isolation key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueContext {
    entries: BTreeMap<String, String>,
}

impl KeyValueContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, builder style
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse `name=value`
    pub fn parse_pair(pair: &str) -> Option<(String, String)> {
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some((name.to_string(), value.trim().to_string()))
    }
}

impl CommonData for KeyValueContext {
    fn isolation_key(&self) -> Vec<String> {
        self.entries.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_key_follows_name_order() {
        let ctx = KeyValueContext::new()
            .with("tenant", "acme")
            .with("period", "2024-01");
        assert_eq!(ctx.isolation_key(), vec!["2024-01", "acme"]);
        assert_eq!(ctx.get("tenant"), Some("acme"));
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            KeyValueContext::parse_pair(" tenant = acme "),
            Some(("tenant".into(), "acme".into()))
        );
        assert_eq!(KeyValueContext::parse_pair("=x"), None);
        assert_eq!(KeyValueContext::parse_pair("novalue"), None);
    }
}
