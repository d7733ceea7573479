// SPDX-License-Identifier: Apache-2.0

//! Typed environment accessors with defaults.

fn raw(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn bool_token(v: &str, def: bool) -> bool {
    match v {
        "1" | "true" | "TRUE" => true,
        "0" => false,
        _ => def,
    }
}

/// Reads a string variable, falling back to `def` when unset or empty.
#[must_use]
pub fn env_str(key: &str, def: &str) -> String {
    raw(key).unwrap_or_else(|| def.to_owned())
}

/// Reads a boolean variable: `1`/`true`/`TRUE` are true, `0` is false,
/// anything else falls back to `def`.
#[must_use]
pub fn env_bool(key: &str, def: bool) -> bool {
    raw(key).map_or(def, |v| bool_token(&v, def))
}

/// Reads a signed integer variable, falling back on parse failure.
#[must_use]
pub fn env_int(key: &str, def: i32) -> i32 {
    raw(key).and_then(|v| v.parse().ok()).unwrap_or(def)
}

/// Reads an unsigned size variable, falling back on parse failure.
#[must_use]
pub fn env_size(key: &str, def: usize) -> usize {
    raw(key).and_then(|v| v.parse().ok()).unwrap_or(def)
}

/// Reads a u64 variable, falling back on parse failure.
#[must_use]
pub fn env_u64(key: &str, def: u64) -> u64 {
    raw(key).and_then(|v| v.parse().ok()).unwrap_or(def)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_variables_yield_defaults() {
        assert_eq!(env_str("WXZ_TEST_NEVER_SET", "fallback"), "fallback");
        assert!(env_bool("WXZ_TEST_NEVER_SET", true));
        assert_eq!(env_int("WXZ_TEST_NEVER_SET", 7), 7);
        assert_eq!(env_size("WXZ_TEST_NEVER_SET", 64), 64);
        assert_eq!(env_u64("WXZ_TEST_NEVER_SET", 30_000), 30_000);
    }

    #[test]
    fn test_bool_tokens() {
        assert!(bool_token("1", false));
        assert!(bool_token("true", false));
        assert!(bool_token("TRUE", false));
        assert!(!bool_token("0", true));
        // Unknown tokens keep the default.
        assert!(bool_token("maybe", true));
        assert!(!bool_token("maybe", false));
    }
}
