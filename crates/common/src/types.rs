use std::fmt;

use serde::{
    Deserialize, Serialize,
    ser::{SerializeMap, Serializer},
};

/// Chat platform a message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Telegram,
    Whatsapp,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Whatsapp => "whatsapp",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single extracted cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Coerce a trimmed raw value: all digits → integer, digits with one
    /// decimal point → float, anything else stays text.
    pub fn coerce(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::Text(String::new());
        }
        if raw.bytes().all(|b| b.is_ascii_digit()) {
            return raw
                .parse()
                .map(Self::Integer)
                .unwrap_or_else(|_| Self::Text(raw.to_string()));
        }
        let mut dots = 0;
        let mut digits = 0;
        for b in raw.bytes() {
            match b {
                b'.' => dots += 1,
                b'0'..=b'9' => digits += 1,
                _ => return Self::Text(raw.to_string()),
            }
        }
        if dots == 1
            && digits > 0
            && let Ok(value) = raw.parse()
        {
            return Self::Float(value);
        }
        Self::Text(raw.to_string())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Field name → value mapping extracted from one message.
///
/// Iterates in first-seen order. Inserting an existing key replaces its
/// value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<(String, FieldValue)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: FieldValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("5", FieldValue::Integer(5))]
    #[case("007", FieldValue::Integer(7))]
    #[case("1200.50", FieldValue::Float(1200.5))]
    #[case(".5", FieldValue::Float(0.5))]
    #[case("5.", FieldValue::Float(5.0))]
    #[case("1.2.3", FieldValue::Text("1.2.3".into()))]
    #[case("-3", FieldValue::Text("-3".into()))]
    #[case(".", FieldValue::Text(".".into()))]
    #[case("Laptop", FieldValue::Text("Laptop".into()))]
    #[case("", FieldValue::Text(String::new()))]
    fn coerces_values(#[case] raw: &str, #[case] expected: FieldValue) {
        assert_eq!(FieldValue::coerce(raw), expected);
    }

    #[test]
    fn oversized_integer_stays_text() {
        let raw = "99999999999999999999999";
        assert_eq!(FieldValue::coerce(raw), FieldValue::Text(raw.into()));
    }

    #[test]
    fn insert_overwrites_in_place() {
        let mut map = FieldMap::new();
        map.insert("a", FieldValue::Integer(1));
        map.insert("b", FieldValue::Integer(2));
        map.insert("a", FieldValue::Integer(3));
        assert_eq!(map.len(), 2);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(&FieldValue::Integer(3)));
    }

    #[test]
    fn serializes_as_json_object() {
        let map: FieldMap = [
            ("product", FieldValue::Text("Laptop".into())),
            ("quantity", FieldValue::Integer(5)),
            ("price", FieldValue::Float(1200.5)),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"product":"Laptop","quantity":5,"price":1200.5}"#);
    }
}
