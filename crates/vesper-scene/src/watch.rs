use serde::{Deserialize, Serialize};

/// A debug-inspectable named value attached to a node. Watches carry no
/// engine semantics; they exist for the debugger and console tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WatchValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl WatchValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WatchValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            WatchValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            WatchValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            WatchValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for WatchValue {
    fn from(v: bool) -> Self {
        WatchValue::Bool(v)
    }
}

impl From<i64> for WatchValue {
    fn from(v: i64) -> Self {
        WatchValue::Int(v)
    }
}

impl From<f64> for WatchValue {
    fn from(v: f64) -> Self {
        WatchValue::Float(v)
    }
}

impl From<f32> for WatchValue {
    fn from(v: f32) -> Self {
        WatchValue::Float(v as f64)
    }
}

impl From<&str> for WatchValue {
    fn from(v: &str) -> Self {
        WatchValue::Text(v.to_string())
    }
}

impl From<String> for WatchValue {
    fn from(v: String) -> Self {
        WatchValue::Text(v)
    }
}

/// Per-node watch registry. Upserts by name and keeps first-insertion order
/// so the debugger shows values in the order the node declared them.
#[derive(Debug, Default)]
pub(crate) struct WatchSet {
    entries: Vec<(String, WatchValue)>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn set(&mut self, name: &str, value: WatchValue) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name.to_string(), value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&WatchValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WatchValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_keeps_first_insertion_order() {
        let mut set = WatchSet::new();
        set.set("speed", WatchValue::from(2.5f64));
        set.set("alive", WatchValue::from(true));
        set.set("speed", WatchValue::from(3.0f64));

        let names: Vec<_> = set.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["speed", "alive"]);
        assert_eq!(set.get("speed").and_then(|v| v.as_float()), Some(3.0));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn conversions() {
        assert_eq!(WatchValue::from(7i64).as_int(), Some(7));
        assert_eq!(WatchValue::from("hi").as_text(), Some("hi"));
        assert_eq!(WatchValue::from(false).as_bool(), Some(false));
        assert_eq!(WatchValue::from(1.5f32).as_float(), Some(1.5));
        assert_eq!(WatchValue::from(1i64).as_float(), None);
    }
}
