//! Cache key derivation.
//!
//! A key is the route identifier followed by the serialized route params,
//! query params and caller-supplied extras, joined with `|`. Each map is
//! serialized as `name=value&name=value` with names in byte order, so two
//! logically identical requests always produce the same key.

use url::form_urlencoded;

const SEGMENT_SEPARATOR: &str = "|";
const LIST_SEPARATOR: &str = ",";

/// A single value contributing to a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValue {
    Absent,
    Text(String),
    List(Vec<String>),
}

impl KeyValue {
    fn is_empty(&self) -> bool {
        match self {
            KeyValue::Absent => true,
            KeyValue::Text(text) => text.is_empty(),
            KeyValue::List(items) => items.is_empty(),
        }
    }

    fn encoded(&self) -> String {
        match self {
            KeyValue::Absent => String::new(),
            KeyValue::Text(text) => encode(text),
            KeyValue::List(items) => encode(&items.join(LIST_SEPARATOR)),
        }
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Text(value.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        KeyValue::Text(value)
    }
}

impl From<&String> for KeyValue {
    fn from(value: &String) -> Self {
        KeyValue::Text(value.clone())
    }
}

impl From<Vec<String>> for KeyValue {
    fn from(value: Vec<String>) -> Self {
        KeyValue::List(value)
    }
}

impl From<bool> for KeyValue {
    fn from(value: bool) -> Self {
        KeyValue::Text(value.to_string())
    }
}

macro_rules! key_value_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for KeyValue {
                fn from(value: $ty) -> Self {
                    KeyValue::Text(value.to_string())
                }
            }
        )*
    };
}

key_value_from_number!(u8, u16, u32, u64, i32, i64, usize);

impl<T: Into<KeyValue>> From<Option<T>> for KeyValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(KeyValue::Absent, Into::into)
    }
}

pub type KeyPairs = [(String, KeyValue)];

/// Derive a cache key from a route identifier and three parameter maps.
pub fn build_key(route_id: &str, params: &KeyPairs, query: &KeyPairs, extra: &KeyPairs) -> String {
    let segments = [
        route_id.to_string(),
        serialize_pairs(params),
        serialize_pairs(query),
        serialize_pairs(extra),
    ];

    segments
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(SEGMENT_SEPARATOR)
}

fn serialize_pairs(pairs: &KeyPairs) -> String {
    let mut kept: Vec<&(String, KeyValue)> =
        pairs.iter().filter(|(_, value)| !value.is_empty()).collect();
    kept.sort_by(|(left, _), (right, _)| left.cmp(right));

    kept.into_iter()
        .map(|(name, value)| format!("{name}={}", value.encoded()))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Split a raw query string into key pairs, folding repeated names into lists.
pub fn query_pairs(raw_query: Option<&str>) -> Vec<(String, KeyValue)> {
    let mut pairs: Vec<(String, KeyValue)> = Vec::new();

    let Some(raw) = raw_query else {
        return pairs;
    };

    for (name, value) in form_urlencoded::parse(raw.as_bytes()) {
        let value = value.into_owned();
        match pairs.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => {
                let merged = match std::mem::replace(slot, KeyValue::Absent) {
                    KeyValue::Absent => KeyValue::Text(value),
                    KeyValue::Text(first) => KeyValue::List(vec![first, value]),
                    KeyValue::List(mut items) => {
                        items.push(value);
                        KeyValue::List(items)
                    }
                };
                *slot = merged;
            }
            None => pairs.push((name.into_owned(), KeyValue::Text(value))),
        }
    }

    pairs
}

/// Fluent wrapper around [`build_key`] used by request handlers.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyBuilder {
    route_id: String,
    params: Vec<(String, KeyValue)>,
    query: Vec<(String, KeyValue)>,
    extra: Vec<(String, KeyValue)>,
}

impl CacheKeyBuilder {
    pub fn new(route_id: impl Into<String>) -> Self {
        Self {
            route_id: route_id.into(),
            ..Default::default()
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<KeyValue>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<KeyValue>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn raw_query(mut self, raw_query: Option<&str>) -> Self {
        self.query.extend(query_pairs(raw_query));
        self
    }

    pub fn extra(mut self, name: impl Into<String>, value: impl Into<KeyValue>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    pub fn build(&self) -> String {
        build_key(&self.route_id, &self.params, &self.query, &self.extra)
    }
}
