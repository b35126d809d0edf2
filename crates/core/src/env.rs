//! Environment-variable helpers shared by the config structs of every binary.

use std::str::FromStr;

/// A configuration variable was set to a value that does not parse.
#[derive(Debug, thiserror::Error)]
#[error("{var} has invalid value '{value}': {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Read `var`, falling back to `default` when unset or not valid unicode.
pub fn var_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

/// Read and parse `var`, falling back to `default` when unset.
pub fn parse_var<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => parse_value(var, &raw),
        Err(_) => Ok(default),
    }
}

/// Parse a raw value on behalf of `var`.
pub fn parse_value<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError {
        var,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Interpret common truthy spellings (`1`, `true`, `yes`, `on`).
pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Split a comma-separated list, dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_value_reports_variable() {
        let err = parse_value::<u16>("PORT", "abc").unwrap_err();
        assert_eq!(err.var, "PORT");
        assert!(err.to_string().starts_with("PORT has invalid value 'abc'"));
        assert_eq!(parse_value::<u16>("PORT", " 8080 ").unwrap(), 8080);
    }

    #[test]
    fn bool_spellings() {
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn list_drops_blanks() {
        assert_eq!(
            split_list("http://a, ,http://b,"),
            vec!["http://a".to_string(), "http://b".to_string()]
        );
    }
}
