//! Tree-level helpers over `serde_json` manifest values.
//!
//! The manifest is consumed as a generic JSON tree; these helpers mirror the
//! handful of access patterns the readers need (typed member lookup with
//! defaults, fixed-size float arrays, id lists).

use serde_json::Value;

pub(crate) type JsonMap = serde_json::Map<String, Value>;

pub(crate) fn find_object<'a>(obj: &'a JsonMap, key: &str) -> Option<&'a JsonMap> {
    obj.get(key).and_then(Value::as_object)
}

pub(crate) fn find_array<'a>(obj: &'a JsonMap, key: &str) -> Option<&'a [Value]> {
    obj.get(key).and_then(Value::as_array).map(Vec::as_slice)
}

pub(crate) fn find_string<'a>(obj: &'a JsonMap, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

pub(crate) fn member_usize(obj: &JsonMap, key: &str, default: usize) -> usize {
    obj.get(key)
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .unwrap_or(default)
}

pub(crate) fn member_f32(obj: &JsonMap, key: &str) -> Option<f32> {
    obj.get(key).and_then(Value::as_f64).map(|v| v as f32)
}

/// Reads `key` as an array of exactly `N` numbers; anything else is `None`.
pub(crate) fn float_array<const N: usize>(obj: &JsonMap, key: &str) -> Option<[f32; N]> {
    let arr = find_array(obj, key)?;
    if arr.len() != N {
        return None;
    }
    let mut out = [0.0f32; N];
    for (slot, v) in out.iter_mut().zip(arr) {
        *slot = v.as_f64()? as f32;
    }
    Some(out)
}

/// Collects `key` as a list of id strings, skipping non-string entries.
pub(crate) fn id_array<'a>(obj: &'a JsonMap, key: &str) -> Vec<&'a str> {
    find_array(obj, key)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}
