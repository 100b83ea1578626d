//! Typed accessors over the job parameter bag.
//!
//! Parameters arrive from the UI as an untyped JSON object that has already
//! passed request-level validation. Nothing here raises errors: a missing or
//! `null` value, or one that cannot be coerced to the requested type, yields
//! the caller's default. Business-rule validation belongs to each builder's
//! `validate()`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Loosely structured parameter set for one job submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamBag(Map<String, Value>);

/// A lookup key, or an ordered list of fallback keys, into a [`ParamBag`].
///
/// With a list, the first key holding a non-null value wins.
pub trait ParamPath {
    fn lookup<'b>(&self, bag: &'b ParamBag) -> Option<&'b Value>;
}

impl ParamPath for &str {
    fn lookup<'b>(&self, bag: &'b ParamBag) -> Option<&'b Value> {
        bag.0.get(*self).filter(|v| !v.is_null())
    }
}

impl ParamPath for String {
    fn lookup<'b>(&self, bag: &'b ParamBag) -> Option<&'b Value> {
        self.as_str().lookup(bag)
    }
}

impl ParamPath for &[&str] {
    fn lookup<'b>(&self, bag: &'b ParamBag) -> Option<&'b Value> {
        self.iter().find_map(|key| key.lookup(bag))
    }
}

impl<const N: usize> ParamPath for [&str; N] {
    fn lookup<'b>(&self, bag: &'b ParamBag) -> Option<&'b Value> {
        self.as_slice().lookup(bag)
    }
}

impl ParamBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value. Anything other than an object becomes an empty bag.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Builder-style insert, mostly for tests and fixtures.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw value at `path`, or `default` when absent or `null`.
    pub fn get_param(&self, path: impl ParamPath, default: Value) -> Value {
        path.lookup(self).cloned().unwrap_or(default)
    }

    /// Boolean at `path`.
    ///
    /// Accepts JSON booleans, numbers (non-zero is `true`) and the strings
    /// `true/false`, `yes/no`, `on/off`, `1/0` in any case.
    pub fn get_bool(&self, path: impl ParamPath, default: bool) -> bool {
        match path.lookup(self) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map_or(default, |f| f != 0.0),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "on" | "1" => true,
                "false" | "no" | "n" | "off" | "0" => false,
                _ => default,
            },
            _ => default,
        }
    }

    /// String at `path`. Numbers and booleans are rendered as text.
    pub fn get_str(&self, path: impl ParamPath, default: &str) -> String {
        match path.lookup(self) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => default.to_string(),
        }
    }

    /// Floating-point number at `path`. Numeric strings are parsed.
    pub fn get_f64(&self, path: impl ParamPath, default: f64) -> f64 {
        match path.lookup(self) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Integer at `path`. Fractional values are truncated toward zero.
    pub fn get_i64(&self, path: impl ParamPath, default: i64) -> i64 {
        match path.lookup(self) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(default),
            Some(Value::String(s)) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                    .unwrap_or(default)
            }
            _ => default,
        }
    }

    /// Trimmed, non-empty string values of `keys`, in key order.
    ///
    /// Used for numbered input slots (`fooFile1`, `fooFile2`, ...) where any
    /// subset may be filled in.
    pub fn populated<K: ParamPath>(&self, keys: impl IntoIterator<Item = K>) -> Vec<String> {
        keys.into_iter()
            .map(|key| self.get_str(key, ""))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl From<Map<String, Value>> for ParamBag {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn bag(value: Value) -> ParamBag {
        ParamBag::from_value(value)
    }

    #[test]
    fn missing_and_null_fall_back_to_default() {
        let b = bag(json!({"present": null}));
        assert!(b.get_bool("absent", true));
        assert!(!b.get_bool("present", false));
        assert_eq!(b.get_str("present", "dflt"), "dflt");
        assert_eq!(b.get_f64("absent", 2.5), 2.5);
        assert_eq!(b.get_param("absent", json!(7)), json!(7));
    }

    #[test]
    fn bool_coercions() {
        let b = bag(json!({
            "a": true, "b": "Yes", "c": "no", "d": 0, "e": "1", "f": "maybe"
        }));
        assert!(b.get_bool("a", false));
        assert!(b.get_bool("b", false));
        assert!(!b.get_bool("c", true));
        assert!(!b.get_bool("d", true));
        assert!(b.get_bool("e", false));
        assert!(b.get_bool("f", true), "unrecognised strings use the default");
    }

    #[test]
    fn numbers_parse_from_strings() {
        let b = bag(json!({"angpix": "1.06", "k": "50", "frac": 2.9, "junk": "abc"}));
        assert_eq!(b.get_f64("angpix", 0.0), 1.06);
        assert_eq!(b.get_i64("k", 0), 50);
        assert_eq!(b.get_i64("frac", 0), 2);
        assert_eq!(b.get_i64("junk", 9), 9);
    }

    #[test]
    fn fallback_key_list_uses_first_present() {
        let b = bag(json!({"fn_in": "movies/*.tiff", "inputFiles": null}));
        assert_eq!(b.get_str(["inputFiles", "fn_in"], ""), "movies/*.tiff");
        assert_eq!(b.get_str(["nope", "also_nope"], "x"), "x");
    }

    #[test]
    fn populated_skips_blank_slots() {
        let b = bag(json!({"f1": "a.star", "f2": "  ", "f3": null, "f4": " d.star "}));
        let files = b.populated(["f1", "f2", "f3", "f4"]);
        assert_eq!(files, vec!["a.star", "d.star"]);
    }

    #[test]
    fn non_object_value_is_empty_bag() {
        assert!(ParamBag::from_value(json!([1, 2, 3])).is_empty());
    }
}
