//! Values carried by MI records.

/// A parsed MI value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Tuple(Fields),
    List(List),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&Fields> {
        match self {
            Value::Tuple(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }
}

/// An MI list.
///
/// The two shapes are told apart by the grammar: a list whose items are
/// bare values parses as `Values`, one whose items are `name=value` pairs
/// parses as `Results`. Result names may repeat (`[frame={..},frame={..}]`).
#[derive(Debug, Clone, PartialEq)]
pub enum List {
    Values(Vec<Value>),
    Results(Vec<(String, Value)>),
}

impl List {
    pub fn len(&self) -> usize {
        match self {
            List::Values(values) => values.len(),
            List::Results(results) => results.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The item values in order, ignoring result names.
    pub fn items(&self) -> Vec<&Value> {
        match self {
            List::Values(values) => values.iter().collect(),
            List::Results(results) => results.iter().map(|(_, value)| value).collect(),
        }
    }
}

impl Default for List {
    fn default() -> Self {
        List::Values(Vec::new())
    }
}

/// Ordered `name -> value` mapping with unique names.
///
/// Insertion order is kept. Inserting an existing name replaces its value
/// in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, Value)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// The string value of `name`, if present and a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_tuple(&self, name: &str) -> Option<&Fields> {
        self.get(name).and_then(Value::as_tuple)
    }

    pub fn get_list(&self, name: &str) -> Option<&List> {
        self.get(name).and_then(Value::as_list)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Value)> for Fields {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (name, value) in iter {
            fields.insert(name, value);
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Value {
        Value::Str(text.to_string())
    }

    #[test]
    fn fields_keep_insertion_order() {
        let fields: Fields = vec![("b".to_string(), s("1")), ("a".to_string(), s("2"))]
            .into_iter()
            .collect();
        let keys: Vec<&str> = fields.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn fields_duplicate_name_replaces_in_place() {
        let mut fields = Fields::new();
        fields.insert("x", s("1"));
        fields.insert("y", s("2"));
        fields.insert("x", s("3"));
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get_str("x"), Some("3"));
        assert_eq!(fields.iter().next().map(|(k, _)| k), Some("x"));
    }

    #[test]
    fn fields_typed_accessors() {
        let mut inner = Fields::new();
        inner.insert("line", s("16"));
        let mut fields = Fields::new();
        fields.insert("frame", Value::Tuple(inner));
        fields.insert("args", Value::List(List::default()));

        assert_eq!(fields.get_tuple("frame").and_then(|f| f.get_str("line")), Some("16"));
        assert!(fields.get_list("args").is_some_and(List::is_empty));
        assert_eq!(fields.get_str("frame"), None);
        assert!(!fields.contains("missing"));
    }

    #[test]
    fn list_items_ignore_names() {
        let list = List::Results(vec![
            ("frame".to_string(), s("a")),
            ("frame".to_string(), s("b")),
        ]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.items(), vec![&s("a"), &s("b")]);
    }
}
