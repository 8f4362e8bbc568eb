// ABOUTME: Environment variable parsing helpers
// ABOUTME: Typed lookups with fallbacks so callers never hand-roll env parsing

use std::env;
use std::str::FromStr;

use tracing::warn;

/// Read an environment variable, falling back to a legacy name, then a default.
pub fn parse_env_with_fallback<T: FromStr>(primary: &str, legacy: &str, default: T) -> T {
    for name in [primary, legacy] {
        if let Ok(raw) = env::var(name) {
            match raw.parse::<T>() {
                Ok(value) => return value,
                Err(_) => {
                    warn!("Ignoring unparseable value for {}: {:?}", name, raw);
                }
            }
        }
    }
    default
}

/// Read and parse an environment variable, returning the default when unset
/// or unparseable.
pub fn parse_env_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring unparseable value for {}: {:?}", name, raw);
                default
            }
        },
        Err(_) => default,
    }
}

/// Read an optional environment variable, treating empty strings as unset.
pub fn optional_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn parses_primary_before_legacy() {
        env::set_var("WARREN_TEST_PRIMARY", "10");
        env::set_var("WARREN_TEST_LEGACY", "20");
        let value: u16 = parse_env_with_fallback("WARREN_TEST_PRIMARY", "WARREN_TEST_LEGACY", 0);
        assert_eq!(value, 10);
        env::remove_var("WARREN_TEST_PRIMARY");
        let value: u16 = parse_env_with_fallback("WARREN_TEST_PRIMARY", "WARREN_TEST_LEGACY", 0);
        assert_eq!(value, 20);
        env::remove_var("WARREN_TEST_LEGACY");
    }

    #[test]
    #[serial]
    fn unparseable_falls_back_to_default() {
        env::set_var("WARREN_TEST_BAD", "not-a-number");
        let value: u64 = parse_env_or("WARREN_TEST_BAD", 42);
        assert_eq!(value, 42);
        env::remove_var("WARREN_TEST_BAD");
    }

    #[test]
    #[serial]
    fn empty_optional_is_none() {
        env::set_var("WARREN_TEST_OPT", "");
        assert_eq!(optional_env("WARREN_TEST_OPT"), None);
        env::set_var("WARREN_TEST_OPT", "value");
        assert_eq!(optional_env("WARREN_TEST_OPT"), Some("value".to_string()));
        env::remove_var("WARREN_TEST_OPT");
    }
}
