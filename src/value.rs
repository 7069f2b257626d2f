//! Configuration value tree.
//!
//! Descriptor documents are JSON, but the transform algebra and the
//! variable substituter only care about three shapes: scalars, ordered
//! lists, and ordered string-keyed maps. `Value` is that reduced tree,
//! with map ordering preserved so resolved output stays deterministic.

use indexmap::IndexMap;
use serde_json::Value as Json;
use std::fmt;

/// A single configuration value as found in a project descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A string scalar.
    Str(String),
    /// A numeric scalar, kept in JSON form.
    Num(serde_json::Number),
    /// A boolean scalar.
    Bool(bool),
    /// An ordered list of values.
    List(Vec<Value>),
    /// An ordered map of values.
    Map(IndexMap<String, Value>),
}

/// The shape of a value, ordered from least to most structured.
///
/// `None` stands for an absent value; it only shows up when two option
/// layers are combined and one side has nothing for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Kind {
    /// No value present.
    None,
    /// String, number, or boolean.
    Scalar,
    /// Ordered list.
    List,
    /// Ordered map.
    Map,
}

impl Value {
    /// The kind of this value.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Value::Str(_) | Value::Num(_) | Value::Bool(_) => Kind::Scalar,
            Value::List(_) => Kind::List,
            Value::Map(_) => Kind::Map,
        }
    }

    /// Kind of an optional value, mapping absence to [`Kind::None`].
    #[must_use]
    pub fn kind_of(value: Option<&Value>) -> Kind {
        value.map_or(Kind::None, Value::kind)
    }

    /// The empty value of a given kind. `Kind::None` yields an empty
    /// scalar, matching how absent operands default during combination.
    #[must_use]
    pub fn empty_of(kind: Kind) -> Value {
        match kind {
            Kind::None | Kind::Scalar => Value::Str(String::new()),
            Kind::List => Value::List(Vec::new()),
            Kind::Map => Value::Map(IndexMap::new()),
        }
    }

    /// Truthiness: empty scalars, zero, `false`, and empty collections
    /// are false.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty(),
            Value::Num(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::Bool(b) => *b,
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
        }
    }

    /// Borrow as a string scalar.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow as a map.
    #[must_use]
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Render a scalar to its string form. Lists and maps fall back to
    /// their JSON rendering; callers that care should match first.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Num(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => Json::from(other.clone()).to_string(),
        }
    }

    /// Flatten to a list of rendered strings: a scalar becomes a single
    /// entry, a list renders each element. Maps yield nothing.
    #[must_use]
    pub fn as_strings(&self) -> Vec<String> {
        match self {
            Value::List(items) => items.iter().map(Value::render).collect(),
            Value::Map(_) => Vec::new(),
            scalar => vec![scalar.render()],
        }
    }

    /// Convenience constructor for a string scalar.
    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    /// Convenience constructor for a list of string scalars.
    #[must_use]
    pub fn str_list(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| Value::str(*s)).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Value {
        match json {
            // JSON null has no kind of its own; treat it as an empty
            // (falsy) scalar so transforms and truthiness behave.
            Json::Null => Value::Str(String::new()),
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Num(n),
            Json::String(s) => Value::Str(s),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Json::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for Json {
    fn from(value: Value) -> Json {
        match value {
            Value::Str(s) => Json::String(s),
            Value::Num(n) => Json::Number(n),
            Value::Bool(b) => Json::Bool(b),
            Value::List(items) => Json::Array(items.into_iter().map(Json::from).collect()),
            Value::Map(entries) => Json::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Json::from(v)))
                    .collect(),
            ),
        }
    }
}

impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Value, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Json::deserialize(deserializer).map(Value::from)
    }
}

impl serde::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        Json::from(self.clone()).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_ordered_by_structure() {
        assert!(Kind::None < Kind::Scalar);
        assert!(Kind::Scalar < Kind::List);
        assert!(Kind::List < Kind::Map);
    }

    #[test]
    fn truthiness_matches_emptiness() {
        assert!(!Value::str("").truthy());
        assert!(Value::str("x").truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(!Value::List(vec![]).truthy());
        assert!(Value::str_list(&["a"]).truthy());
        assert!(!Value::Map(IndexMap::new()).truthy());
        assert!(!Value::Num(0.into()).truthy());
        assert!(Value::Num(8080.into()).truthy());
    }

    #[test]
    fn json_round_trip_preserves_map_order() {
        let json: Json =
            serde_json::from_str(r#"{"zeta": 1, "alpha": [true, "x"], "mid": {"b": 1, "a": 2}}"#)
                .unwrap();
        let value = Value::from(json);
        let map = value.as_map().unwrap();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn scalars_render_naturally() {
        assert_eq!(Value::str("busybox").render(), "busybox");
        assert_eq!(Value::Num(5000.into()).render(), "5000");
        assert_eq!(Value::Bool(true).render(), "true");
    }

    #[test]
    fn as_strings_flattens() {
        assert_eq!(Value::str("one").as_strings(), vec!["one".to_string()]);
        assert_eq!(
            Value::str_list(&["a", "b"]).as_strings(),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
