//! Request parameter values and the bracket-notation codec.
//!
//! Framework code reads request parameters as nested, ordered maps: a field
//! named `tags[]` submitted twice becomes an array `{0: .., 1: ..}`, and
//! `user[name]` becomes `{user: {name: ..}}`. This module builds those shapes
//! from flat key/value pairs and turns them back into a query string.
//!
//! # Example
//!
//! ```rust
//! use rehearsal_core::params::{parse_query, build_query, ParamValue};
//!
//! let params = parse_query("tags[]=a&tags[]=b&user[name]=ann");
//! assert_eq!(params["tags"].get("1").and_then(ParamValue::as_str), Some("b"));
//! assert_eq!(build_query(&params), "tags%5B0%5D=a&tags%5B1%5D=b&user%5Bname%5D=ann");
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered parameter bag.
pub type ParamMap = IndexMap<String, ParamValue>;

/// A request parameter: a scalar or a nested ordered array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A single string value.
    Scalar(String),
    /// A nested array keyed by string or integer-like keys.
    Array(ParamMap),
}

impl ParamValue {
    /// Returns the scalar value, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(value) => Some(value),
            Self::Array(_) => None,
        }
    }

    /// Returns the nested array, if this is one.
    #[must_use]
    pub fn as_array(&self) -> Option<&ParamMap> {
        match self {
            Self::Scalar(_) => None,
            Self::Array(map) => Some(map),
        }
    }

    /// Looks up a key in a nested array.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.as_array().and_then(|map| map.get(key))
    }

    /// Builds a list value keyed `0..n`.
    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Array(
            values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), Self::Scalar(v.into())))
                .collect(),
        )
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(values: Vec<&str>) -> Self {
        Self::list(values)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        Self::list(values)
    }
}

impl From<ParamMap> for ParamValue {
    fn from(map: ParamMap) -> Self {
        Self::Array(map)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(value) => f.write_str(value),
            Self::Array(_) => f.write_str("Array"),
        }
    }
}

/// Splits a bracket-notation field name into its path segments.
///
/// The base name has spaces and dots replaced by underscores, the way form
/// fields are exposed to framework code. An empty segment (`[]`) means
/// "append". A key with an unterminated bracket is treated as a plain name.
///
/// ```rust
/// use rehearsal_core::params::split_key;
///
/// assert_eq!(split_key("a.b[c][]"), vec!["a_b", "c", ""]);
/// assert_eq!(split_key("plain"), vec!["plain"]);
/// ```
#[must_use]
pub fn split_key(key: &str) -> Vec<String> {
    let Some(open) = key.find('[') else {
        return vec![normalize_base(key)];
    };
    if open == 0 {
        return vec![normalize_base(key)];
    }

    let mut segments = vec![normalize_base(&key[..open])];
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            if segments.len() == 1 {
                // `a[b` is a plain name with the bracket flattened.
                return vec![normalize_base(key).replacen('[', "_", 1)];
            }
            break;
        };
        segments.push(stripped[..close].to_string());
        rest = &stripped[close + 1..];
    }
    segments
}

fn normalize_base(base: &str) -> String {
    base.replace([' ', '.'], "_")
}

/// Inserts a value at a bracket-notation key.
pub fn insert(params: &mut ParamMap, key: &str, value: ParamValue) {
    let segments = split_key(key);
    insert_path(params, &segments, value);
}

/// Inserts a value at an already split path.
pub fn insert_path(params: &mut ParamMap, segments: &[String], value: ParamValue) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let key = if first.is_empty() {
        next_index(params)
    } else {
        first.clone()
    };

    if rest.is_empty() {
        params.insert(key, value);
        return;
    }

    let slot = params
        .entry(key)
        .or_insert_with(|| ParamValue::Array(ParamMap::new()));
    if let ParamValue::Scalar(_) = slot {
        *slot = ParamValue::Array(ParamMap::new());
    }
    if let ParamValue::Array(inner) = slot {
        insert_path(inner, rest, value);
    }
}

/// Returns the next integer key for an append (`[]`) insertion.
fn next_index(params: &ParamMap) -> String {
    params
        .keys()
        .filter_map(|k| k.parse::<u64>().ok())
        .max()
        .map_or(0, |max| max + 1)
        .to_string()
}

/// Remaps a flat parameter bag into nested framework shape.
///
/// Keys in bracket notation are expanded; array values are remapped
/// recursively so nested bracket keys inside them expand too.
#[must_use]
pub fn remap(parameters: &ParamMap) -> ParamMap {
    let mut remapped = ParamMap::new();
    for (key, value) in parameters {
        let value = match value {
            ParamValue::Scalar(_) => value.clone(),
            ParamValue::Array(inner) => ParamValue::Array(remap_inner(inner)),
        };
        insert(&mut remapped, key, value);
    }
    remapped
}

fn remap_inner(parameters: &ParamMap) -> ParamMap {
    parameters
        .iter()
        .map(|(key, value)| {
            let value = match value {
                ParamValue::Scalar(_) => value.clone(),
                ParamValue::Array(inner) => ParamValue::Array(remap_inner(inner)),
            };
            (key.clone(), value)
        })
        .collect()
}

/// Parses a query string into nested parameters.
///
/// `+` decodes to a space; invalid percent escapes are kept literally.
#[must_use]
pub fn parse_query(query: &str) -> ParamMap {
    let mut params = ParamMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(raw_key);
        if key.is_empty() {
            continue;
        }
        insert(&mut params, &key, ParamValue::Scalar(decode_component(raw_value)));
    }
    params
}

/// Builds a query string from nested parameters.
///
/// Nested keys are written as `outer[inner]`, bracket characters included in
/// the encoding (`%5B`/`%5D`), spaces as `+`.
#[must_use]
pub fn build_query(params: &ParamMap) -> String {
    let mut pairs = Vec::new();
    for (key, value) in params {
        append_pairs(&mut pairs, &encode_component(key), value);
    }
    pairs.join("&")
}

fn append_pairs(pairs: &mut Vec<String>, prefix: &str, value: &ParamValue) {
    match value {
        ParamValue::Scalar(v) => pairs.push(format!("{prefix}={}", encode_component(v))),
        ParamValue::Array(map) => {
            for (key, inner) in map {
                let nested = format!("{prefix}%5B{}%5D", encode_component(key));
                append_pairs(pairs, &nested, inner);
            }
        }
    }
}

/// Form-encodes a component: percent-encoding with `+` for spaces.
#[must_use]
pub fn encode_component(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}

/// Decodes a form-encoded component.
#[must_use]
pub fn decode_component(value: &str) -> String {
    let spaced = value.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_key() {
        assert_eq!(split_key("first"), vec!["first"]);
    }

    #[test]
    fn test_split_bracket_key() {
        assert_eq!(split_key("user[address][city]"), vec!["user", "address", "city"]);
        assert_eq!(split_key("tags[]"), vec!["tags", ""]);
    }

    #[test]
    fn test_split_replaces_spaces_and_dots_in_base() {
        assert_eq!(split_key("first name"), vec!["first_name"]);
        assert_eq!(split_key("a.b[c.d]"), vec!["a_b", "c.d"]);
    }

    #[test]
    fn test_split_leading_bracket_is_plain() {
        assert_eq!(split_key("[x]"), vec!["[x]"]);
    }

    #[test]
    fn test_split_unterminated_bracket() {
        assert_eq!(split_key("a[b"), vec!["a_b"]);
        assert_eq!(split_key("a[b][c"), vec!["a", "b"]);
    }

    #[test]
    fn test_append_segments_build_list() {
        let params = parse_query("name[]=a&name[]=b");
        let name = params["name"].as_array().unwrap();
        assert_eq!(name["0"].as_str(), Some("a"));
        assert_eq!(name["1"].as_str(), Some("b"));
    }

    #[test]
    fn test_nested_keys_merge() {
        let params = parse_query("user[name]=ann&user[age]=30");
        let user = params["user"].as_array().unwrap();
        assert_eq!(user.len(), 2);
        assert_eq!(user["age"].as_str(), Some("30"));
    }

    #[test]
    fn test_parse_decodes_plus_and_percent() {
        let params = parse_query("q=hello+world&x=%2Fpath");
        assert_eq!(params["q"].as_str(), Some("hello world"));
        assert_eq!(params["x"].as_str(), Some("/path"));
    }

    #[test]
    fn test_parse_key_without_value() {
        let params = parse_query("flag&=skipped");
        assert_eq!(params["flag"].as_str(), Some(""));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_remap_expands_bracket_keys_and_lists() {
        let mut flat = ParamMap::new();
        flat.insert("first".into(), "one".into());
        flat.insert("tags".into(), vec!["x", "y"].into());
        flat.insert("user[name]".into(), "ann".into());

        let remapped = remap(&flat);
        assert_eq!(remapped["first"].as_str(), Some("one"));
        assert_eq!(remapped["tags"].get("1").and_then(ParamValue::as_str), Some("y"));
        assert_eq!(
            remapped["user"].get("name").and_then(ParamValue::as_str),
            Some("ann")
        );
    }

    #[test]
    fn test_build_query_scalars() {
        let mut params = ParamMap::new();
        params.insert("a".into(), "1".into());
        params.insert("b c".into(), "x y".into());
        assert_eq!(build_query(&params), "a=1&b+c=x+y");
    }

    #[test]
    fn test_build_query_nested() {
        let params = parse_query("user[name]=ann&_url=/");
        assert_eq!(build_query(&params), "user%5Bname%5D=ann&_url=%2F");
    }

    #[test]
    fn test_scalar_overwritten_by_nested_insert() {
        let params = parse_query("a=1&a[b]=2");
        assert_eq!(params["a"].get("b").and_then(ParamValue::as_str), Some("2"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_params() -> impl Strategy<Value = ParamMap> {
            prop::collection::vec(("[a-z]{1,6}", "[a-zA-Z0-9 &=+/%]{0,12}"), 0..6).prop_map(|pairs| {
                pairs
                    .into_iter()
                    .map(|(k, v)| (k, ParamValue::Scalar(v)))
                    .collect()
            })
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            /// Values survive a trip through the query string, whatever they contain.
            #[test]
            fn prop_query_preserves_values(params in arb_params()) {
                prop_assert_eq!(parse_query(&build_query(&params)), params);
            }

            /// Appending with `[]` always produces consecutive integer keys.
            #[test]
            fn prop_append_indexes_are_consecutive(values in prop::collection::vec("[a-z]{1,4}", 1..8)) {
                let query = values
                    .iter()
                    .map(|v| format!("list[]={v}"))
                    .collect::<Vec<_>>()
                    .join("&");
                let params = parse_query(&query);
                let list = params["list"].as_array().cloned().unwrap_or_default();
                let keys: Vec<String> = list.keys().cloned().collect();
                let expected: Vec<String> = (0..values.len()).map(|i| i.to_string()).collect();
                prop_assert_eq!(keys, expected);
            }
        }
    }
}
