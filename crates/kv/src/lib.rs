// SPDX-License-Identifier: Apache-2.0

//! Codec for the flat `key=value;key=value` payload format carried inside
//! message envelopes on the command and status topics.
//!
//! The codec is total: decoding never fails. Unparseable pairs degrade to an
//! entry with an empty value, empty tokens are skipped, and callers are
//! expected to validate individual fields themselves. Six-component vectors
//! (joint positions, poses) travel as comma-separated scalars inside a single
//! value.

use indexmap::IndexMap;
use std::fmt::Write as _;

/// Ordered key/value payload map. Insertion order is the wire order.
pub type KvMap = IndexMap<String, String>;

/// Decodes a `k=v;k=v` payload into an ordered map.
///
/// Pairs are split on `;`, each pair on the first `=`. A token without `=`
/// becomes a key with an empty value. Empty tokens are ignored.
#[must_use]
pub fn decode(raw: &str) -> KvMap {
    let mut kv = KvMap::new();
    for token in raw.split(';') {
        if token.is_empty() {
            continue;
        }
        match token.split_once('=') {
            Some((k, v)) => {
                let _ = kv.insert(k.to_owned(), v.to_owned());
            }
            None => {
                let _ = kv.insert(token.to_owned(), String::new());
            }
        }
    }
    kv
}

/// Encodes a map back into the `k=v;k=v` wire form, in insertion order.
///
/// Values are written raw; keys and values must not contain `;` or `=`
/// (callers in this system never produce them).
#[must_use]
pub fn encode(kv: &KvMap) -> String {
    let mut out = String::with_capacity(kv.len() * 16);
    for (i, (k, v)) in kv.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        out.push_str(k);
        out.push('=');
        out.push_str(v);
    }
    out
}

/// Returns the value for `key`, or `def` when absent.
#[must_use]
pub fn get_or<'a>(kv: &'a KvMap, key: &str, def: &'a str) -> &'a str {
    kv.get(key).map_or(def, String::as_str)
}

/// Parses exactly six comma-separated doubles, trimming surrounding spaces.
///
/// Any other arity or any non-numeric component yields `None`, never a
/// partial vector.
#[must_use]
pub fn parse_csv6(s: &str) -> Option<[f64; 6]> {
    let mut out = [0.0f64; 6];
    let mut n = 0usize;
    for token in s.split(',') {
        if n == 6 {
            return None;
        }
        out[n] = token.trim().parse::<f64>().ok()?;
        n += 1;
    }
    if n == 6 { Some(out) } else { None }
}

/// Formats a six-vector as comma-separated fixed-point values.
#[must_use]
pub fn format_csv6_fixed(v: &[f64; 6], precision: usize) -> String {
    let mut out = String::with_capacity(precision * 8 + 16);
    for (i, x) in v.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{x:.precision$}");
    }
    out
}

/// Parses a double, requiring the whole string to be consumed.
#[must_use]
pub fn parse_double(s: &str) -> Option<f64> {
    s.parse::<f64>().ok()
}

/// Parses a signed integer, requiring the whole string to be consumed.
#[must_use]
pub fn parse_int(s: &str) -> Option<i32> {
    s.parse::<i32>().ok()
}

/// Parses an unsigned size, requiring the whole string to be consumed.
#[must_use]
pub fn parse_size(s: &str) -> Option<usize> {
    s.parse::<usize>().ok()
}

/// Truthiness used across the wire: `1`, `true` and `TRUE` are true.
#[must_use]
pub fn is_truthy(v: &str) -> bool {
    v == "1" || v == "true" || v == "TRUE"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_basic() {
        let kv = decode("op=moveL;id=7;pose=1,2,3,4,5,6");
        assert_eq!(kv.get("op").map(String::as_str), Some("moveL"));
        assert_eq!(kv.get("id").map(String::as_str), Some("7"));
        assert_eq!(kv.get("pose").map(String::as_str), Some("1,2,3,4,5,6"));
    }

    #[test]
    fn test_decode_is_total() {
        // Tokens without '=' degrade to empty values; empty tokens vanish.
        let kv = decode(";;garbage;a=1;;b=");
        assert_eq!(kv.get("garbage").map(String::as_str), Some(""));
        assert_eq!(kv.get("a").map(String::as_str), Some("1"));
        assert_eq!(kv.get("b").map(String::as_str), Some(""));
        assert_eq!(kv.len(), 3);
    }

    #[test]
    fn test_decode_splits_on_first_equals() {
        let kv = decode("msg=a=b");
        assert_eq!(kv.get("msg").map(String::as_str), Some("a=b"));
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let mut kv = KvMap::new();
        let _ = kv.insert("op".into(), "demo_echo".into());
        let _ = kv.insert("id".into(), "9".into());
        let _ = kv.insert("msg".into(), "hello".into());
        let wire = encode(&kv);
        assert_eq!(wire, "op=demo_echo;id=9;msg=hello");
        assert_eq!(decode(&wire), kv);
    }

    #[test]
    fn test_parse_csv6_arity() {
        assert!(parse_csv6("1,2,3,4,5,6").is_some());
        assert!(parse_csv6(" 1 , 2 ,3,4,5, 6 ").is_some());
        assert!(parse_csv6("1,2,3,4,5").is_none());
        assert!(parse_csv6("1,2,3,4,5,6,7").is_none());
        assert!(parse_csv6("1,2,3,x,5,6").is_none());
        assert!(parse_csv6("").is_none());
        assert!(parse_csv6("1,2,3,,5,6").is_none());
    }

    #[test]
    fn test_format_csv6_fixed() {
        let v = [0.0, 1.0, -1.5, 3.141593, 0.000001, 2.0];
        assert_eq!(
            format_csv6_fixed(&v, 6),
            "0.000000,1.000000,-1.500000,3.141593,0.000001,2.000000"
        );
    }

    #[test]
    fn test_scalar_parsers_require_full_string() {
        assert_eq!(parse_double("3.25"), Some(3.25));
        assert_eq!(parse_double("3.25x"), None);
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("42 "), None);
        assert_eq!(parse_size("10000"), Some(10000));
        assert_eq!(parse_size("-1"), None);
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy("1"));
        assert!(is_truthy("true"));
        assert!(is_truthy("TRUE"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("True"));
        assert!(!is_truthy(""));
    }
}
