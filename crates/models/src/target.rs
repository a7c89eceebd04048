use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

/// Identity of a stored target. Derived from the target name on create.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The zero identity: no id has been assigned or addressed yet.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TargetId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A named group of discovery entries (one Prometheus scrape group).
///
/// `id` and `time` are owned by the service layer: `id` is set from `name` on
/// create and `time` is stamped on every successful create/update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub id: TargetId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

/// One set of addresses sharing one label set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Target {
    /// New unsaved target; the id is assigned when it is created.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Addressing-only value used for get/update/delete by id.
    pub fn with_id(id: impl Into<TargetId>) -> Self {
        Self { id: id.into(), ..Self::default() }
    }

    pub fn entry(mut self, entry: Entry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.is_empty() {
            return Err(ModelError::Validation("name is empty".into()));
        }
        if self.entries.is_empty() {
            return Err(ModelError::Validation("target must have at least one entry".into()));
        }
        for entry in &self.entries {
            entry.validate()?;
        }
        Ok(())
    }

    /// Entries rendered as a Prometheus HTTP/file service-discovery document.
    pub fn static_configs(&self) -> serde_json::Value {
        serde_json::json!(self.entries)
    }
}

impl Entry {
    pub fn new<T, K, V>(targets: T, labels: impl IntoIterator<Item = (K, V)>) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            labels: labels.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.targets.is_empty() {
            return Err(ModelError::Validation("entry has no targets".into()));
        }
        if self.labels.is_empty() {
            return Err(ModelError::Validation("entry has no labels".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_entry() -> Entry {
        Entry::new(["10.0.0.1:9100"], [("job", "node")])
    }

    #[test]
    fn valid_target_passes() {
        let t = Target::new("web1").entry(node_entry());
        assert_eq!(t.validate(), Ok(()));
    }

    #[test]
    fn empty_name_is_rejected() {
        let t = Target::new("").entry(node_entry());
        assert!(matches!(t.validate(), Err(ModelError::Validation(_))));
    }

    #[test]
    fn empty_entries_are_rejected() {
        let t = Target::new("web1");
        assert!(matches!(t.validate(), Err(ModelError::Validation(_))));
    }

    #[test]
    fn entry_without_targets_or_labels_is_rejected() {
        let no_targets = Target::new("web1").entry(Entry::new(Vec::<String>::new(), [("job", "node")]));
        assert!(matches!(no_targets.validate(), Err(ModelError::Validation(_))));

        let no_labels = Target::new("web1")
            .entry(node_entry())
            .entry(Entry::new(["10.0.0.2:9100"], Vec::<(String, String)>::new()));
        assert!(matches!(no_labels.validate(), Err(ModelError::Validation(_))));
    }

    #[test]
    fn partial_record_decodes_with_defaults() {
        let t: Target = serde_json::from_str(r#"{"name": "test"}"#).unwrap();
        assert_eq!(t.name, "test");
        assert!(t.id.is_empty());
        assert!(t.entries.is_empty());
    }

    #[test]
    fn serialises_with_file_field_names() {
        let mut t = Target::new("web1").entry(node_entry());
        t.id = TargetId::from("web1");
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["id"], "web1");
        assert_eq!(v["name"], "web1");
        assert_eq!(v["entries"][0]["targets"][0], "10.0.0.1:9100");
        assert_eq!(v["entries"][0]["labels"]["job"], "node");
        assert!(v["time"].as_str().unwrap().starts_with("1970-01-01T00:00:00"));
    }

    #[test]
    fn static_configs_lists_entries() {
        let t = Target::new("web1").entry(node_entry());
        let doc = t.static_configs();
        assert_eq!(doc.as_array().map(Vec::len), Some(1));
        assert_eq!(doc[0]["labels"]["job"], "node");
    }
}
