use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Text fields of a track's metadata, keyed by upper-cased field name.
///
/// Two notifications describe the same track when their signatures are
/// equal; non-text fields (position, duration, ...) do not take part.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackSignature {
    fields: BTreeMap<String, String>,
}

impl TrackSignature {
    pub fn from_metadata(metadata: &Map<String, Value>) -> Self {
        let fields = metadata
            .iter()
            .filter_map(|(key, value)| match value {
                Value::String(text) => Some((key.to_uppercase(), text.clone())),
                _ => None,
            })
            .collect();
        TrackSignature { fields }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
