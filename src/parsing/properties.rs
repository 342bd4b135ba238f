//! Property sets, property documents and variable substitution.

use crate::error::{SqlMapError, SqlMapResult};
use std::collections::BTreeMap;

/// Ordered string key/value set used for variables, settings and component properties.
pub type Properties = BTreeMap<String, String>;

const OPEN_TOKEN: &str = "${";
const CLOSE_TOKEN: char = '}';

/// Replace every `${name}` in `text` with the matching variable.
///
/// Placeholders without a matching variable, and unterminated ones, are left untouched.
pub fn substitute_variables(text: &str, variables: &Properties) -> String {
    if variables.is_empty() || !text.contains(OPEN_TOKEN) {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(OPEN_TOKEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN_TOKEN.len()..];
        match after_open.find(CLOSE_TOKEN) {
            Some(end) => {
                let key = &after_open[..end];
                match variables.get(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str(OPEN_TOKEN);
                        out.push_str(key);
                        out.push(CLOSE_TOKEN);
                    }
                }
                rest = &after_open[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parse a property document.
///
/// Blank lines and lines starting with `#` or `!` are ignored. Keys are separated from
/// values by the first `=` or `:`; a trailing backslash continues the value on the next
/// line. Later duplicates win.
pub fn parse_properties(document: &str) -> Properties {
    let mut props = Properties::new();
    let mut pending: Option<String> = None;

    for raw in document.lines() {
        let line = raw.trim();
        let logical = match pending.take() {
            Some(mut buf) => {
                buf.push_str(line);
                buf
            }
            None => {
                if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                    continue;
                }
                line.to_string()
            }
        };

        if let Some(stripped) = logical.strip_suffix('\\') {
            pending = Some(stripped.to_string());
            continue;
        }
        insert_line(&mut props, &logical);
    }

    if let Some(last) = pending {
        insert_line(&mut props, &last);
    }
    props
}

fn insert_line(props: &mut Properties, line: &str) {
    let split = line.find(['=', ':']);
    let (key, value) = match split {
        Some(idx) => (line[..idx].trim(), line[idx + 1..].trim()),
        None => (line.trim(), ""),
    };
    if !key.is_empty() {
        props.insert(key.to_string(), value.to_string());
    }
}

/// Strict boolean property: `true` or `false` in any case, anything else is rejected.
pub fn parse_flag(key: &str, value: &str) -> SqlMapResult<bool> {
    match value.trim() {
        v if v.eq_ignore_ascii_case("true") => Ok(true),
        v if v.eq_ignore_ascii_case("false") => Ok(false),
        v => Err(SqlMapError::invalid_setting(key, v, "expected true or false")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_is_strict() {
        assert!(parse_flag("k", "TRUE").unwrap());
        assert!(!parse_flag("k", " false ").unwrap());
        for bad in ["yes", "1", "", "ture"] {
            let err = parse_flag("k", bad).unwrap_err();
            assert!(matches!(err, SqlMapError::InvalidSetting { ref key, .. } if key == "k"));
        }
    }

    fn vars(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitute_known_variables() {
        let v = vars(&[("host", "db.local"), ("port", "5432")]);
        assert_eq!(
            substitute_variables("postgres://${host}:${port}/app", &v),
            "postgres://db.local:5432/app"
        );
    }

    #[test]
    fn test_substitute_leaves_unknown_and_unterminated() {
        let v = vars(&[("a", "1")]);
        assert_eq!(substitute_variables("${a}-${b}", &v), "1-${b}");
        assert_eq!(substitute_variables("x ${a", &v), "x ${a");
    }

    #[test]
    fn test_substitute_without_variables_is_identity() {
        assert_eq!(substitute_variables("${a}", &Properties::new()), "${a}");
    }

    #[test]
    fn test_parse_properties_basic() {
        let doc = "# comment\n! also comment\n\nurl = sqlite::memory:\nuser: sa\nflag\n";
        let props = parse_properties(doc);
        assert_eq!(props.get("url").map(String::as_str), Some("sqlite::memory:"));
        assert_eq!(props.get("user").map(String::as_str), Some("sa"));
        assert_eq!(props.get("flag").map(String::as_str), Some(""));
    }

    #[test]
    fn test_parse_properties_value_keeps_later_separators() {
        let props = parse_properties("url=postgres://u:p@h/db?a=b");
        assert_eq!(
            props.get("url").map(String::as_str),
            Some("postgres://u:p@h/db?a=b")
        );
    }

    #[test]
    fn test_parse_properties_continuation_and_override() {
        let props = parse_properties("list = a,\\\n  b,\\\n  c\nk=1\nk=2");
        assert_eq!(props.get("list").map(String::as_str), Some("a,b,c"));
        assert_eq!(props.get("k").map(String::as_str), Some("2"));
    }
}
