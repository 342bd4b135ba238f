//! Global behaviour flags read from the `settings` element.
//!
//! The set of recognised keys is fixed by [`KNOWN_SETTINGS`]; any other key is rejected
//! before the configuration is touched.

use crate::error::{SqlMapError, SqlMapResult};
use crate::executor::ExecutorType;
use crate::parsing::{Properties, parse_flag};
use crate::types::{AliasRegistry, JdbcType};
use serde::Serialize;
use std::collections::BTreeSet;
use std::str::FromStr;

/// Every key accepted in a `settings` block.
pub const KNOWN_SETTINGS: &[&str] = &[
    "autoMappingBehavior",
    "autoMappingUnknownColumnBehavior",
    "cacheEnabled",
    "proxyFactory",
    "lazyLoadingEnabled",
    "aggressiveLazyLoading",
    "multipleResultSetsEnabled",
    "useColumnLabel",
    "useGeneratedKeys",
    "defaultExecutorType",
    "defaultStatementTimeout",
    "defaultFetchSize",
    "defaultResultSetType",
    "mapUnderscoreToCamelCase",
    "safeRowBoundsEnabled",
    "localCacheScope",
    "jdbcTypeForNull",
    "lazyLoadTriggerMethods",
    "safeResultHandlerEnabled",
    "defaultScriptingLanguage",
    "defaultEnumTypeHandler",
    "callSettersOnNulls",
    "useActualParamName",
    "returnInstanceForEmptyRow",
    "logPrefix",
    "logImpl",
    "vfsImpl",
    "configurationFactory",
    "shrinkWhitespacesInSql",
    "defaultSqlProviderType",
];

const DEFAULT_LAZY_LOAD_TRIGGER_METHODS: &str = "equals,clone,hashCode,toString";

string_enum! {
    /// How result columns are mapped onto properties automatically.
    pub enum AutoMappingBehavior {
        None => "NONE",
        Partial => "PARTIAL",
        Full => "FULL",
    }
}

string_enum! {
    /// What to do with result columns that have no matching property.
    pub enum AutoMappingUnknownColumnBehavior {
        None => "NONE",
        Warning => "WARNING",
        Failing => "FAILING",
    }
}

string_enum! {
    /// Lifetime of the session-local cache.
    pub enum LocalCacheScope {
        Session => "SESSION",
        Statement => "STATEMENT",
    }
}

string_enum! {
    /// Result set scrolling mode.
    pub enum ResultSetType {
        Default => "DEFAULT",
        ForwardOnly => "FORWARD_ONLY",
        ScrollInsensitive => "SCROLL_INSENSITIVE",
        ScrollSensitive => "SCROLL_SENSITIVE",
    }
}

/// Typed settings with their documented defaults.
///
/// Type references (`defaultScriptingLanguage`, `defaultEnumTypeHandler`, ...) are
/// resolved through the alias registry and stored by qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub auto_mapping_behavior: AutoMappingBehavior,
    pub auto_mapping_unknown_column_behavior: AutoMappingUnknownColumnBehavior,
    pub cache_enabled: bool,
    pub proxy_factory: Option<String>,
    pub lazy_loading_enabled: bool,
    pub aggressive_lazy_loading: bool,
    pub multiple_result_sets_enabled: bool,
    pub use_column_label: bool,
    pub use_generated_keys: bool,
    pub default_executor_type: ExecutorType,
    pub default_statement_timeout: Option<u32>,
    pub default_fetch_size: Option<u32>,
    pub default_result_set_type: Option<ResultSetType>,
    pub map_underscore_to_camel_case: bool,
    pub safe_row_bounds_enabled: bool,
    pub local_cache_scope: LocalCacheScope,
    pub jdbc_type_for_null: JdbcType,
    pub lazy_load_trigger_methods: BTreeSet<String>,
    pub safe_result_handler_enabled: bool,
    pub default_scripting_language: Option<String>,
    pub default_enum_type_handler: Option<String>,
    pub call_setters_on_nulls: bool,
    pub use_actual_param_name: bool,
    pub return_instance_for_empty_row: bool,
    pub log_prefix: Option<String>,
    pub configuration_factory: Option<String>,
    pub shrink_whitespaces_in_sql: bool,
    pub default_sql_provider_type: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_mapping_behavior: AutoMappingBehavior::Partial,
            auto_mapping_unknown_column_behavior: AutoMappingUnknownColumnBehavior::None,
            cache_enabled: true,
            proxy_factory: None,
            lazy_loading_enabled: false,
            aggressive_lazy_loading: false,
            multiple_result_sets_enabled: true,
            use_column_label: true,
            use_generated_keys: false,
            default_executor_type: ExecutorType::Simple,
            default_statement_timeout: None,
            default_fetch_size: None,
            default_result_set_type: None,
            map_underscore_to_camel_case: false,
            safe_row_bounds_enabled: false,
            local_cache_scope: LocalCacheScope::Session,
            jdbc_type_for_null: JdbcType::Other,
            lazy_load_trigger_methods: split_set(DEFAULT_LAZY_LOAD_TRIGGER_METHODS),
            safe_result_handler_enabled: true,
            default_scripting_language: None,
            default_enum_type_handler: None,
            call_setters_on_nulls: false,
            use_actual_param_name: true,
            return_instance_for_empty_row: false,
            log_prefix: None,
            configuration_factory: None,
            shrink_whitespaces_in_sql: false,
            default_sql_provider_type: None,
        }
    }
}

impl Settings {
    /// Fail with `UnknownSetting` on the first key outside [`KNOWN_SETTINGS`].
    pub fn validate_keys(properties: &Properties) -> SqlMapResult<()> {
        match properties
            .keys()
            .find(|key| !KNOWN_SETTINGS.contains(&key.as_str()))
        {
            Some(key) => Err(SqlMapError::unknown_setting(key)),
            None => Ok(()),
        }
    }

    /// Typed settings from validated properties; absent keys take their defaults.
    pub fn from_properties(properties: &Properties, aliases: &AliasRegistry) -> SqlMapResult<Self> {
        Self::validate_keys(properties)?;
        let reader = Reader { properties, aliases };
        let defaults = Self::default();
        Ok(Self {
            auto_mapping_behavior: reader
                .parsed("autoMappingBehavior")?
                .unwrap_or(defaults.auto_mapping_behavior),
            auto_mapping_unknown_column_behavior: reader
                .parsed("autoMappingUnknownColumnBehavior")?
                .unwrap_or(defaults.auto_mapping_unknown_column_behavior),
            cache_enabled: reader.flag("cacheEnabled", defaults.cache_enabled)?,
            proxy_factory: reader.type_name("proxyFactory")?,
            lazy_loading_enabled: reader.flag("lazyLoadingEnabled", defaults.lazy_loading_enabled)?,
            aggressive_lazy_loading: reader
                .flag("aggressiveLazyLoading", defaults.aggressive_lazy_loading)?,
            multiple_result_sets_enabled: reader.flag(
                "multipleResultSetsEnabled",
                defaults.multiple_result_sets_enabled,
            )?,
            use_column_label: reader.flag("useColumnLabel", defaults.use_column_label)?,
            use_generated_keys: reader.flag("useGeneratedKeys", defaults.use_generated_keys)?,
            default_executor_type: reader
                .parsed("defaultExecutorType")?
                .unwrap_or(defaults.default_executor_type),
            default_statement_timeout: reader.parsed("defaultStatementTimeout")?,
            default_fetch_size: reader.parsed("defaultFetchSize")?,
            default_result_set_type: reader.parsed("defaultResultSetType")?,
            map_underscore_to_camel_case: reader
                .flag("mapUnderscoreToCamelCase", defaults.map_underscore_to_camel_case)?,
            safe_row_bounds_enabled: reader
                .flag("safeRowBoundsEnabled", defaults.safe_row_bounds_enabled)?,
            local_cache_scope: reader
                .parsed("localCacheScope")?
                .unwrap_or(defaults.local_cache_scope),
            jdbc_type_for_null: reader
                .parsed("jdbcTypeForNull")?
                .unwrap_or(defaults.jdbc_type_for_null),
            lazy_load_trigger_methods: properties
                .get("lazyLoadTriggerMethods")
                .map(|v| split_set(v))
                .unwrap_or(defaults.lazy_load_trigger_methods),
            safe_result_handler_enabled: reader
                .flag("safeResultHandlerEnabled", defaults.safe_result_handler_enabled)?,
            default_scripting_language: reader.type_name("defaultScriptingLanguage")?,
            default_enum_type_handler: reader.type_name("defaultEnumTypeHandler")?,
            call_setters_on_nulls: reader.flag("callSettersOnNulls", defaults.call_setters_on_nulls)?,
            use_actual_param_name: reader.flag("useActualParamName", defaults.use_actual_param_name)?,
            return_instance_for_empty_row: reader.flag(
                "returnInstanceForEmptyRow",
                defaults.return_instance_for_empty_row,
            )?,
            log_prefix: properties.get("logPrefix").cloned(),
            configuration_factory: reader.type_name("configurationFactory")?,
            shrink_whitespaces_in_sql: reader
                .flag("shrinkWhitespacesInSql", defaults.shrink_whitespaces_in_sql)?,
            default_sql_provider_type: reader.type_name("defaultSqlProviderType")?,
        })
    }
}

struct Reader<'a> {
    properties: &'a Properties,
    aliases: &'a AliasRegistry,
}

impl Reader<'_> {
    fn flag(&self, key: &str, default: bool) -> SqlMapResult<bool> {
        match self.properties.get(key) {
            None => Ok(default),
            Some(v) => parse_flag(key, v),
        }
    }

    fn parsed<T>(&self, key: &str) -> SqlMapResult<Option<T>>
    where
        T: FromStr,
        T::Err: ToString,
    {
        self.properties
            .get(key)
            .map(|v| {
                v.trim()
                    .parse::<T>()
                    .map_err(|e| SqlMapError::invalid_setting(key, v, e.to_string()))
            })
            .transpose()
    }

    fn type_name(&self, key: &str) -> SqlMapResult<Option<String>> {
        Ok(self
            .aliases
            .resolve_optional(self.properties.get(key).map(String::as_str))?
            .map(|ty| ty.name().to_string()))
    }
}

fn split_set(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
