use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};
use std::fmt;
use std::marker::PhantomData;

/// Insertion-ordered string-keyed map that refuses duplicate keys while
/// deserializing.
///
/// YAML happily accepts `2020:` twice in the same mapping and most map types
/// silently keep the last value. For the source catalog a repeated key is
/// almost always a copy/paste mistake, so it is reported as a parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> UniqueMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds an entry, handing the value back if the key is already present.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Result<(), V> {
        let key = key.into();
        if self.contains_key(&key) {
            return Err(value);
        }
        self.entries.push((key, value));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for UniqueMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Map key accepting any YAML scalar, so `2020:` and `"2020":` are the same key.
struct ScalarKey(String);

impl<'de> Deserialize<'de> for ScalarKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ScalarKeyVisitor;

        impl<'de> Visitor<'de> for ScalarKeyVisitor {
            type Value = ScalarKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or numeric mapping key")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<ScalarKey, E> {
                Ok(ScalarKey(value.to_string()))
            }

            fn visit_string<E: de::Error>(self, value: String) -> Result<ScalarKey, E> {
                Ok(ScalarKey(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<ScalarKey, E> {
                Ok(ScalarKey(value.to_string()))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<ScalarKey, E> {
                Ok(ScalarKey(value.to_string()))
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> Result<ScalarKey, E> {
                Ok(ScalarKey(value.to_string()))
            }
        }

        deserializer.deserialize_any(ScalarKeyVisitor)
    }
}

impl<'de, V> Deserialize<'de> for UniqueMap<V>
where
    V: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct UniqueMapVisitor<V>(PhantomData<V>);

        impl<'de, V> Visitor<'de> for UniqueMapVisitor<V>
        where
            V: Deserialize<'de>,
        {
            type Value = UniqueMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping with unique keys")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(UniqueMap::new())
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut map = UniqueMap::new();
                while let Some(ScalarKey(key)) = access.next_key::<ScalarKey>()? {
                    let value = access.next_value::<V>()?;
                    if map.contains_key(&key) {
                        return Err(de::Error::custom(format!("duplicate key `{key}`")));
                    }
                    map.entries.push((key, value));
                }
                Ok(map)
            }
        }

        deserializer.deserialize_any(UniqueMapVisitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_file_order_and_numeric_keys() {
        let map: UniqueMap<String> =
            serde_yaml::from_str("2024: b\n\"2016\": a\nextra: c\n").expect("parses");
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["2024", "2016", "extra"]);
        assert_eq!(map.get("2016").map(String::as_str), Some("a"));
    }

    #[test]
    fn rejects_duplicate_keys() {
        let error = serde_yaml::from_str::<UniqueMap<String>>("2020: a\n2020: b\n")
            .expect_err("duplicate rejected");
        assert!(error.to_string().contains("duplicate key `2020`"));
    }

    #[test]
    fn treats_null_as_empty() {
        let map: UniqueMap<String> = serde_yaml::from_str("~").expect("parses");
        assert!(map.is_empty());
    }

    #[test]
    fn insert_refuses_existing_key() {
        let mut map = UniqueMap::new();
        map.insert("AC", 1).expect("first insert");
        assert_eq!(map.insert("AC", 2), Err(2));
        assert_eq!(map.len(), 1);
    }
}
