//! The closed set of values a store can hold.
//!
//! Every [`Value`] variant has a fixed serde representation, so any mapping
//! of keys to values can be written to a snapshot.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, DeserializeSeed, Deserializer, EnumAccess, VariantAccess, Visitor};
use serde::{Deserialize, Serialize};

/// Deepest allowed nesting of `List`/`Map` containers within one value.
///
/// Decoding recurses once per level, so the bound keeps hostile input from
/// exhausting the stack.
pub const MAX_NESTING: usize = 128;

/// A stored value.
///
/// `Deserialize` is hand-written so that nesting beyond [`MAX_NESTING`]
/// is an error rather than unbounded recursion.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

/// Discriminant of a [`Value`], used for reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    List,
    Map,
}

impl ValueKind {
    /// Lowercase name of the kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::Bytes => "bytes",
            Self::List => "list",
            Self::Map => "map",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    /// The kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::List(_) => ValueKind::List,
            Self::Map(_) => ValueKind::Map,
        }
    }

    /// Number of `List`/`Map` levels on the deepest path. Scalars are 0.
    ///
    /// Walks the value with an explicit stack, so it is safe on values of
    /// any depth.
    pub fn nesting_depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 0usize)];
        while let Some((value, depth)) = pending.pop() {
            match value {
                Self::List(items) => pending.extend(items.iter().map(|v| (v, depth + 1))),
                Self::Map(map) => pending.extend(map.values().map(|v| (v, depth + 1))),
                _ => {}
            }
            if matches!(value, Self::List(_) | Self::Map(_)) {
                deepest = deepest.max(depth + 1);
            }
        }
        deepest
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, with integers widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Self::Map(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Compact JSON-like rendering. Bytes print as lowercase hex.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{k:?}:{v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Depth-limited deserialization
// ---------------------------------------------------------------------------

const VARIANTS: &[&str] = &["Null", "Bool", "Int", "Float", "Str", "Bytes", "List", "Map"];

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ValueSeed {
            remaining: MAX_NESTING,
        }
        .deserialize(deserializer)
    }
}

/// Deserializes one `Value`, allowing `remaining` more container levels.
#[derive(Clone, Copy)]
struct ValueSeed {
    remaining: usize,
}

impl ValueSeed {
    fn child<E: de::Error>(self) -> Result<Self, E> {
        match self.remaining.checked_sub(1) {
            Some(remaining) => Ok(Self { remaining }),
            None => Err(E::custom(format_args!(
                "nesting too deep: more than {MAX_NESTING} levels"
            ))),
        }
    }
}

impl<'de> DeserializeSeed<'de> for ValueSeed {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_enum("Value", VARIANTS, self)
    }
}

impl<'de> Visitor<'de> for ValueSeed {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("enum Value")
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<Value, A::Error> {
        let (kind, variant) = data.variant::<ValueKind>()?;
        match kind {
            ValueKind::Null => variant.unit_variant().map(|()| Value::Null),
            ValueKind::Bool => variant.newtype_variant().map(Value::Bool),
            ValueKind::Int => variant.newtype_variant().map(Value::Int),
            ValueKind::Float => variant.newtype_variant().map(Value::Float),
            ValueKind::Str => variant.newtype_variant().map(Value::Str),
            ValueKind::Bytes => variant.newtype_variant().map(Value::Bytes),
            ValueKind::List => variant
                .newtype_variant_seed(ListSeed(self.child::<A::Error>()?))
                .map(Value::List),
            ValueKind::Map => variant
                .newtype_variant_seed(MapSeed(self.child::<A::Error>()?))
                .map(Value::Map),
        }
    }
}

struct ListSeed(ValueSeed);

impl<'de> DeserializeSeed<'de> for ListSeed {
    type Value = Vec<Value>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Vec<Value>, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for ListSeed {
    type Value = Vec<Value>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list of values")
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<Value>, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(item) = seq.next_element_seed(self.0)? {
            items.push(item);
        }
        Ok(items)
    }
}

struct MapSeed(ValueSeed);

impl<'de> DeserializeSeed<'de> for MapSeed {
    type Value = BTreeMap<String, Value>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for MapSeed {
    type Value = BTreeMap<String, Value>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of string keys to values")
    }

    fn visit_map<A: de::MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = BTreeMap::new();
        while let Some(key) = access.next_key::<String>()? {
            let value = access.next_value_seed(self.0)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

// Variant tags arrive as an index from bincode and as a name from
// self-describing formats.
impl<'de> Deserialize<'de> for ValueKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_identifier(KindVisitor)
    }
}

const KINDS: [ValueKind; 8] = [
    ValueKind::Null,
    ValueKind::Bool,
    ValueKind::Int,
    ValueKind::Float,
    ValueKind::Str,
    ValueKind::Bytes,
    ValueKind::List,
    ValueKind::Map,
];

struct KindVisitor;

impl<'de> Visitor<'de> for KindVisitor {
    type Value = ValueKind;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a Value variant")
    }

    fn visit_u64<E: de::Error>(self, index: u64) -> Result<ValueKind, E> {
        usize::try_from(index)
            .ok()
            .and_then(|i| KINDS.get(i).copied())
            .ok_or_else(|| {
                E::invalid_value(de::Unexpected::Unsigned(index), &"variant index 0 <= i < 8")
            })
    }

    fn visit_str<E: de::Error>(self, name: &str) -> Result<ValueKind, E> {
        VARIANTS
            .iter()
            .position(|v| *v == name)
            .map(|i| KINDS[i])
            .ok_or_else(|| E::unknown_variant(name, VARIANTS))
    }

    fn visit_bytes<E: de::Error>(self, name: &[u8]) -> Result<ValueKind, E> {
        match std::str::from_utf8(name) {
            Ok(name) => self.visit_str(name),
            Err(_) => Err(E::invalid_value(de::Unexpected::Bytes(name), &self)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_pick_variant() {
        assert_eq!(Value::from("a"), Value::Str("a".into()));
        assert_eq!(Value::from(7), Value::Int(7));
        assert_eq!(Value::from(7u32), Value::Int(7));
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(vec![1u8, 2]), Value::Bytes(vec![1, 2]));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(1.5)), Value::Float(1.5));
    }

    #[test]
    fn accessors_match_only_their_variant() {
        let v = Value::from("text");
        assert_eq!(v.as_str(), Some("text"));
        assert_eq!(v.as_int(), None);
        assert_eq!(v.kind(), ValueKind::Str);

        assert_eq!(Value::Int(3).as_float(), Some(3.0));
        assert!(Value::Null.is_null());
    }

    #[test]
    fn display_nested() {
        let mut map = BTreeMap::new();
        map.insert("n".to_string(), Value::Int(1));
        map.insert("tags".to_string(), Value::List(vec!["x".into(), Value::Null]));
        let v = Value::Map(map);
        assert_eq!(v.to_string(), r#"{"n":1,"tags":["x",null]}"#);
        assert_eq!(Value::Bytes(vec![0xde, 0xad]).to_string(), "0xdead");
    }

    #[test]
    fn kind_names() {
        assert_eq!(ValueKind::Bytes.to_string(), "bytes");
        assert_eq!(Value::List(vec![]).kind().name(), "list");
    }

    fn nested_lists(depth: usize) -> Value {
        let mut v = Value::Int(0);
        for _ in 0..depth {
            v = Value::List(vec![v]);
        }
        v
    }

    #[test]
    fn nesting_depth_counts_containers() {
        assert_eq!(Value::Int(1).nesting_depth(), 0);
        assert_eq!(Value::List(vec![]).nesting_depth(), 1);
        assert_eq!(nested_lists(5).nesting_depth(), 5);

        let mut map = BTreeMap::new();
        map.insert("flat".to_string(), Value::Null);
        map.insert("deep".to_string(), nested_lists(3));
        assert_eq!(Value::Map(map).nesting_depth(), 4);
    }

    #[test]
    fn json_form_round_trips() {
        let mut map = BTreeMap::new();
        map.insert("bytes".to_string(), Value::Bytes(vec![1, 2]));
        map.insert(
            "list".to_string(),
            Value::List(vec![Value::Null, Value::Bool(false)]),
        );
        let v = Value::Map(map);

        let text = serde_json::to_string(&v).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), v);
        assert_eq!(serde_json::from_str::<Value>("\"Null\"").unwrap(), Value::Null);
    }

    #[test]
    fn nesting_at_limit_is_accepted() {
        use bincode::Options;

        let v = nested_lists(MAX_NESTING);
        let bytes = bincode::options().serialize(&v).unwrap();
        assert_eq!(bincode::options().deserialize::<Value>(&bytes).unwrap(), v);
    }

    #[test]
    fn nesting_past_limit_is_rejected() {
        use bincode::Options;

        let bytes = bincode::options()
            .serialize(&nested_lists(MAX_NESTING + 1))
            .unwrap();
        let err = bincode::options().deserialize::<Value>(&bytes).unwrap_err();
        assert!(err.to_string().contains("nesting too deep"), "{err}");
    }

    #[test]
    fn unknown_variant_is_rejected() {
        assert!(serde_json::from_str::<Value>("{\"Tuple\": 1}").is_err());
    }
}
