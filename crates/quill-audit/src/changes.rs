//! Pending attribute changes of a record.
//!
//! A [`ChangeSet`] maps attribute names to the value they had before the
//! current save cycle and the value they hold now. It serializes as a JSON
//! object of two-element arrays:
//!
//! ```json
//! {"name": ["Alice", "Bob"]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The old and new value of one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(Value, Value)", into = "(Value, Value)")]
pub struct Change {
    pub old: Value,
    pub new: Value,
}

impl Change {
    pub fn new(old: Value, new: Value) -> Self {
        Self { old, new }
    }
}

impl From<(Value, Value)> for Change {
    fn from((old, new): (Value, Value)) -> Self {
        Self { old, new }
    }
}

impl From<Change> for (Value, Value) {
    fn from(change: Change) -> Self {
        (change.old, change.new)
    }
}

/// Pending changes keyed by attribute name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    changes: BTreeMap<String, Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write of `new` over `current`.
    ///
    /// The first write of a cycle fixes the old value; later writes only move
    /// the new value. An attribute written back to its old value stops being
    /// a change. Returns whether the attribute is pending afterwards.
    pub fn record(&mut self, attribute: &str, current: &Value, new: &Value) -> bool {
        if let Some(change) = self.changes.get_mut(attribute) {
            if change.old == *new {
                self.changes.remove(attribute);
                return false;
            }
            change.new = new.clone();
            return true;
        }

        if current == new {
            return false;
        }
        self.changes.insert(
            attribute.to_string(),
            Change::new(current.clone(), new.clone()),
        );
        true
    }

    /// Whether any attribute has a pending change.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether the named attribute has a pending change.
    pub fn contains(&self, attribute: &str) -> bool {
        self.changes.contains_key(attribute)
    }

    pub fn get(&self, attribute: &str) -> Option<&Change> {
        self.changes.get(attribute)
    }

    /// Names of the changed attributes, sorted.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Change)> {
        self.changes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Serialize to the text stored on audit entries.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse the text stored on audit entries.
    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl FromIterator<(String, Change)> for ChangeSet {
    fn from_iter<T: IntoIterator<Item = (String, Change)>>(iter: T) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_first_difference() {
        let mut changes = ChangeSet::new();
        assert!(changes.record("name", &json!("Alice"), &json!("Bob")));
        assert_eq!(
            changes.get("name"),
            Some(&Change::new(json!("Alice"), json!("Bob")))
        );
    }

    #[test]
    fn equal_values_are_not_changes() {
        let mut changes = ChangeSet::new();
        assert!(!changes.record("name", &json!("Alice"), &json!("Alice")));
        assert!(!changes.record("email", &Value::Null, &Value::Null));
        assert!(changes.is_empty());
    }

    #[test]
    fn later_writes_move_the_new_value() {
        let mut changes = ChangeSet::new();
        changes.record("name", &json!("Alice"), &json!("Bob"));
        changes.record("name", &json!("Bob"), &json!("Carol"));
        assert_eq!(
            changes.get("name"),
            Some(&Change::new(json!("Alice"), json!("Carol")))
        );
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn writing_back_the_old_value_drops_the_change() {
        let mut changes = ChangeSet::new();
        changes.record("name", &json!("Alice"), &json!("Bob"));
        assert!(!changes.record("name", &json!("Bob"), &json!("Alice")));
        assert!(!changes.contains("name"));
    }

    #[test]
    fn serializes_as_pairs() {
        let mut changes = ChangeSet::new();
        changes.record("name", &json!("Alice"), &json!("Bob"));
        changes.record("age", &Value::Null, &json!(30));

        let text = changes.to_text().unwrap();
        assert_eq!(text, r#"{"age":[null,30],"name":["Alice","Bob"]}"#);
        assert_eq!(ChangeSet::from_text(&text).unwrap(), changes);
    }
}
