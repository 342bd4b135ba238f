//! Statement language drivers.
//!
//! The driver decides how a statement's SQL text is prepared before it is stored.
//! `XML` assembles the statement from its text and `include` children, `RAW` takes the
//! text exactly as written and rejects nested elements.

use crate::error::{SqlMapError, SqlMapResult};
use crate::types::{TypeDescriptor, TypeKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct XmlLanguageDriver;

impl XmlLanguageDriver {
    pub const TYPE_NAME: &'static str = "sqlsession::mapping::language::XmlLanguageDriver";

    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_NAME, TypeKind::LanguageDriver)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RawLanguageDriver;

impl RawLanguageDriver {
    pub const TYPE_NAME: &'static str = "sqlsession::mapping::language::RawLanguageDriver";

    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_NAME, TypeKind::LanguageDriver)
    }
}

/// Whether statements written for `lang` may contain nested elements.
pub fn allows_nested_elements(lang: &str) -> bool {
    lang != RawLanguageDriver::TYPE_NAME
}

/// Collapse runs of whitespace into single spaces.
pub fn shrink_whitespace(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reject a statement the raw driver cannot take.
pub fn check_raw(statement_id: &str, lang: &str, has_children: bool) -> SqlMapResult<()> {
    if has_children && !allows_nested_elements(lang) {
        return Err(SqlMapError::component(
            lang,
            format!(
                "Statement '{}' uses nested elements, which the raw language driver does not support",
                statement_id
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shrink_whitespace() {
        assert_eq!(
            shrink_whitespace("SELECT id,\n     title\n\tFROM blog  "),
            "SELECT id, title FROM blog"
        );
    }

    #[test]
    fn test_raw_driver_rejects_nested_elements() {
        assert!(check_raw("blog.a", RawLanguageDriver::TYPE_NAME, true).is_err());
        assert!(check_raw("blog.a", RawLanguageDriver::TYPE_NAME, false).is_ok());
        assert!(check_raw("blog.a", XmlLanguageDriver::TYPE_NAME, true).is_ok());
    }
}
