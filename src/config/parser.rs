//! Parser registry
//!
//! A process-wide map from a static type to its `&str -> value` parser.
//! Typed configuration reads and derive-driven `#[config]` fields all go
//! through this registry. [`register_parser`] replaces any existing entry
//! for the type, so applications can add parsers for their own types.

use std::any::{Any, TypeId};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use dashmap::DashMap;

use crate::component::short_type_name;
use crate::error::{HostError, Result};

type ParseFn =
    Arc<dyn Fn(&str) -> std::result::Result<Box<dyn Any + Send + Sync>, String> + Send + Sync>;

static PARSERS: LazyLock<DashMap<TypeId, ParseFn>> = LazyLock::new(|| {
    let parsers = DashMap::new();
    insert::<String>(&parsers, |raw| Ok(raw.to_string()));
    insert::<bool>(&parsers, |raw| raw.parse().map_err(display));
    insert::<i32>(&parsers, |raw| raw.parse().map_err(display));
    insert::<i64>(&parsers, |raw| raw.parse().map_err(display));
    insert::<u16>(&parsers, |raw| raw.parse().map_err(display));
    insert::<u32>(&parsers, |raw| raw.parse().map_err(display));
    insert::<u64>(&parsers, |raw| raw.parse().map_err(display));
    insert::<f64>(&parsers, |raw| raw.parse().map_err(display));
    insert::<Duration>(&parsers, parse_duration);
    parsers
});

fn display<E: std::fmt::Display>(err: E) -> String {
    err.to_string()
}

fn insert<T: Send + Sync + 'static>(
    parsers: &DashMap<TypeId, ParseFn>,
    parse: impl Fn(&str) -> std::result::Result<T, String> + Send + Sync + 'static,
) {
    parsers.insert(
        TypeId::of::<T>(),
        Arc::new(move |raw| parse(raw).map(|value| Box::new(value) as Box<dyn Any + Send + Sync>)),
    );
}

/// Register (or replace) the parser for `T`.
pub fn register_parser<T: Send + Sync + 'static>(
    parse: impl Fn(&str) -> std::result::Result<T, String> + Send + Sync + 'static,
) {
    insert(&PARSERS, parse);
}

/// Parse `raw` into `T` via the registered parser.
pub fn parse<T: Send + Sync + 'static>(raw: &str) -> Result<T> {
    let parser = PARSERS
        .get(&TypeId::of::<T>())
        .map(|entry| entry.value().clone())
        .ok_or_else(|| HostError::NoParserForType {
            type_name: short_type_name::<T>().to_string(),
        })?;

    let value = parser(raw).map_err(|message| HostError::ParseFailed {
        type_name: short_type_name::<T>().to_string(),
        value: raw.to_string(),
        message,
    })?;

    Ok(*value
        .downcast::<T>()
        .unwrap_or_else(|_| panic!("parser registered under a mismatched TypeId; this is a bug in hearth")))
}

/// Parse `<number><unit>` durations, unit one of ns, us, µs, ms, s, m, h.
/// Fractional numbers are accepted.
pub fn parse_duration(raw: &str) -> std::result::Result<Duration, String> {
    let raw = raw.trim();
    // Longest suffixes first so "ms" is not read as "s".
    const UNITS: [(&str, f64); 7] = [
        ("ns", 1e-9),
        ("us", 1e-6),
        ("µs", 1e-6),
        ("ms", 1e-3),
        ("s", 1.0),
        ("m", 60.0),
        ("h", 3600.0),
    ];

    for (unit, factor) in UNITS {
        if let Some(number) = raw.strip_suffix(unit) {
            // "1ms" must not match the bare "s" unit with number "1m".
            if number.ends_with(|c: char| c.is_ascii_alphabetic()) {
                continue;
            }
            let number: f64 = number
                .trim()
                .parse()
                .map_err(|_| format!("invalid duration '{}'", raw))?;
            if number < 0.0 {
                return Err(format!("negative duration '{}'", raw));
            }
            return Ok(Duration::from_secs_f64(number * factor));
        }
    }
    Err(format!(
        "invalid duration '{}': expected <number><unit> with unit ns, us, ms, s, m or h",
        raw
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_parsers_cover_scalars() {
        assert_eq!(parse::<String>("hello").unwrap(), "hello");
        assert!(parse::<bool>("true").unwrap());
        assert_eq!(parse::<i64>("-42").unwrap(), -42);
        assert_eq!(parse::<u16>("8080").unwrap(), 8080);
        assert_eq!(parse::<f64>("2.5").unwrap(), 2.5);
    }

    #[test]
    fn duration_units() {
        assert_eq!(parse_duration("250ns").unwrap(), Duration::from_nanos(250));
        assert_eq!(parse_duration("15us").unwrap(), Duration::from_micros(15));
        assert_eq!(parse_duration("15µs").unwrap(), Duration::from_micros(15));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(
            parse_duration("1.5s").unwrap(),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn duration_rejects_garbage() {
        assert!(parse_duration("5").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("xms").is_err());
    }

    #[test]
    fn parse_failure_names_type_and_value() {
        let err = parse::<i32>("abc").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("'abc'"), "{}", text);
        assert!(text.contains("i32"), "{}", text);
    }

    #[test]
    fn missing_parser_is_reported() {
        struct Exotic;
        let err = parse::<(u8, Exotic)>("x");
        assert!(matches!(
            err,
            Err(HostError::NoParserForType { .. })
        ));
    }

    #[test]
    fn custom_parser_round_trips() {
        #[derive(Debug, PartialEq, Clone)]
        struct Port(u16);

        register_parser::<Port>(|raw| raw.parse::<u16>().map(Port).map_err(|e| e.to_string()));
        assert_eq!(parse::<Port>("9000").unwrap(), Port(9000));
    }
}
