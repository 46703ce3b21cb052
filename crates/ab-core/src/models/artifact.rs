use std::fmt;

use indexmap::IndexMap;

/// Sparse set of discovery constraints; only supplied attributes are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactFilter {
    attributes: IndexMap<String, String>,
}

impl ArtifactFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute, ignoring blank values.
    pub fn with(mut self, attribute: &str, value: &str) -> Self {
        self.insert(attribute, value);
        self
    }

    pub fn insert(&mut self, attribute: &str, value: &str) {
        let value = value.trim();
        if !value.is_empty() {
            self.attributes
                .insert(attribute.to_string(), value.to_string());
        }
    }

    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.attributes.get(attribute).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }
}

impl fmt::Display for ArtifactFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attributes.is_empty() {
            return f.write_str("<any>");
        }
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{k}={v}")).collect();
        f.write_str(&parts.join(", "))
    }
}

/// The artifact version a resolver settled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub id: String,
    /// Descriptive fields of the matched entry, in source order.
    pub details: IndexMap<String, String>,
}

impl ResolvedArtifact {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            details: IndexMap::new(),
        }
    }

    pub fn with_detail(mut self, name: &str, value: impl Into<String>) -> Self {
        self.details.insert(name.to_string(), value.into());
        self
    }
}

impl fmt::Display for ResolvedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Ordered key -> value replacements handed to the file rewriter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignments {
    entries: IndexMap<String, String>,
}

impl Assignments {
    /// Maps every key to the same value.
    pub fn uniform<S: AsRef<str>>(keys: &[S], value: &str) -> Self {
        let entries = keys
            .iter()
            .map(|k| (k.as_ref().to_string(), value.to_string()))
            .collect();
        Self { entries }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Assignments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self { entries }
    }
}
