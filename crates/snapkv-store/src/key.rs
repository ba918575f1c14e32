use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// A store key: a non-empty UTF-8 string.
///
/// The non-empty rule is enforced at construction, so every `Key` that
/// reaches the store is already valid. Deserialization goes through the
/// same check, which makes a snapshot holding an empty key undecodable.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key(String);

impl Key {
    /// Create a key, rejecting the empty string.
    pub fn new(key: impl Into<String>) -> StoreResult<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(StoreError::InvalidKey(key));
        }
        Ok(Self(key))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key and return the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for Key {
    type Error = StoreError;

    fn try_from(value: String) -> StoreResult<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Key {
    type Error = StoreError;

    fn try_from(value: &str) -> StoreResult<Self> {
        Self::new(value)
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.0
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets `HashMap<Key, _>` be queried with a plain `&str`.
impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_key_rejected() {
        let err = Key::new("").unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
        assert!(Key::try_from(String::new()).is_err());
    }

    #[test]
    fn whitespace_key_is_allowed() {
        let key = Key::new(" ").unwrap();
        assert_eq!(key.as_str(), " ");
    }

    #[test]
    fn lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(Key::new("alpha").unwrap(), 1);
        assert_eq!(map.get("alpha"), Some(&1));
        assert_eq!(map.get("beta"), None);
    }

    #[test]
    fn deserializing_empty_key_fails() {
        let err = serde_json::from_str::<Key>("\"\"").unwrap_err();
        assert!(err.to_string().contains("non-empty"));

        let ok: Key = serde_json::from_str("\"k\"").unwrap();
        assert_eq!(ok.to_string(), "k");
    }
}
