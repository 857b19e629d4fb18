//! Resource tags
//!
//! Tagged resources expose two attributes: `tags` (what the configuration
//! sets) and `tags_all` (those merged with the provider's default tags).
//! Keys reserved by AWS (`aws:` prefix) and keys listed in the provider's
//! ignore settings never show up in either.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

const AWS_TAG_PREFIX: &str = "aws:";

/// An ordered set of key/value tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueTags(BTreeMap<String, String>);

impl KeyValueTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a JSON map of strings; non-string values are skipped.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Object(obj)) => Self(
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect(),
            ),
            _ => Self::default(),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect::<Map<_, _>>(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    /// Drops keys reserved by AWS.
    pub fn ignore_aws(self) -> Self {
        Self(
            self.0
                .into_iter()
                .filter(|(k, _)| !k.starts_with(AWS_TAG_PREFIX))
                .collect(),
        )
    }

    /// Drops keys listed in the ignore configuration.
    pub fn ignore_config(self, ignore: &IgnoreConfig) -> Self {
        Self(
            self.0
                .into_iter()
                .filter(|(k, _)| !ignore.matches(k))
                .collect(),
        )
    }

    /// Merges `other` over `self`; keys in `other` win.
    pub fn merge(&self, other: &KeyValueTags) -> Self {
        let mut merged = self.0.clone();
        merged.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self(merged)
    }

    /// Tags in `new` that are missing from or differ in `self`.
    pub fn updated(&self, new: &KeyValueTags) -> Self {
        Self(
            new.0
                .iter()
                .filter(|(k, v)| self.0.get(*k) != Some(*v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Tags in `self` whose keys are absent from `new`.
    pub fn removed(&self, new: &KeyValueTags) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| !new.0.contains_key(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl FromIterator<(String, String)> for KeyValueTags {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, String>> for KeyValueTags {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

/// Keys and key prefixes the provider never manages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreConfig {
    pub keys: Vec<String>,
    pub key_prefixes: Vec<String>,
}

impl IgnoreConfig {
    pub fn matches(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key) || self.key_prefixes.iter().any(|p| key.starts_with(p))
    }
}

/// Provider-wide tag settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPolicy {
    pub default_tags: KeyValueTags,
    pub ignore: IgnoreConfig,
}

impl TagPolicy {
    /// `tags_all` for the configured `tags`: defaults merged with config.
    pub fn tags_all(&self, configured: &KeyValueTags) -> KeyValueTags {
        self.default_tags
            .merge(configured)
            .ignore_aws()
            .ignore_config(&self.ignore)
    }

    /// Splits remote tags into the (`tags`, `tags_all`) attribute values.
    ///
    /// `tags` keeps only keys that are not defaults, or whose value differs
    /// from the default.
    pub fn flatten(&self, remote: KeyValueTags) -> (KeyValueTags, KeyValueTags) {
        let all = remote.ignore_aws().ignore_config(&self.ignore);
        let tags = all
            .iter()
            .filter(|(k, v)| self.default_tags.get(k) != Some(*v))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        (tags, all)
    }
}
