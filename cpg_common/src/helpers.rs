use std::{env, fmt::Display, str::FromStr};

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Reads and parses the environment variable `name`.
///
/// Returns `Ok(None)` if the variable is not set, and the parse error, as a string, if the value is present but
/// malformed. Callers decide whether to fall back to a default.
pub fn parse_env<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().map(Some).map_err(|e| format!("Invalid value for {name} ({s}): {e}")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn boolean_flags() {
        assert!(parse_boolean_flag(Some("TRUE".into()), false));
        assert!(parse_boolean_flag(Some(" on ".into()), false));
        assert!(!parse_boolean_flag(Some("0".into()), true));
        assert!(parse_boolean_flag(Some("maybe".into()), true));
        assert!(!parse_boolean_flag(None, false));
    }

    #[test]
    fn env_values() {
        env::set_var("CPG_COMMON_TEST_U64", "42");
        env::set_var("CPG_COMMON_TEST_BAD", "forty-two");
        assert_eq!(parse_env::<u64>("CPG_COMMON_TEST_U64"), Ok(Some(42)));
        assert!(parse_env::<u64>("CPG_COMMON_TEST_BAD").is_err());
        assert_eq!(parse_env::<u64>("CPG_COMMON_TEST_NOT_SET"), Ok(None));
    }
}
