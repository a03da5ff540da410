//! QueryConfig - Process-wide defaults for query descriptors.
//!
//! Assembled once at startup (from JSON, the environment, or code) and shared
//! as `Arc<QueryConfig>`. Every `QueryDescriptor` carries the config it was
//! built with.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sifted_rust::{QueryConfig, QueryDescriptor};
//!
//! let config = Arc::new(QueryConfig::from_env()?);
//! let query = QueryDescriptor::with_config(config).set_sort("-title");
//! ```

use std::env;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const ENV_DEFAULT_LOCALE: &str = "SIFTED_DEFAULT_LOCALE";
const ENV_DEFAULT_PAGE_SIZE: &str = "SIFTED_DEFAULT_PAGE_SIZE";
const ENV_MULTILINGUAL_FIELDS: &str = "SIFTED_MULTILINGUAL_FIELDS";
const ENV_ID_FIELDS: &str = "SIFTED_ID_FIELDS";

pub(crate) const DEFAULT_PAGE_SIZE: u64 = 25;

/// Defaults shared by every query built in the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryConfig {
    /// Locale used when a request does not set one.
    pub default_locale: String,
    /// Page size used when a request does not set a limit, or sets an invalid one.
    pub default_page_size: u64,
    /// Fields stored per locale. Sorting on them targets `field.<locale>`.
    pub multilingual_fields: Vec<String>,
    /// Keys the search-engine builder treats as document ids.
    pub id_fields: Vec<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_locale: "en".to_string(),
            default_page_size: DEFAULT_PAGE_SIZE,
            multilingual_fields: Vec::new(),
            id_fields: vec!["_id".to_string(), "id".to_string()],
        }
    }
}

impl QueryConfig {
    /// Parse a config from JSON. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()
    }

    /// Build a config from `SIFTED_*` environment variables on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(locale) = lookup(ENV_DEFAULT_LOCALE) {
            config.default_locale = locale.trim().to_string();
        }
        if let Some(size) = lookup(ENV_DEFAULT_PAGE_SIZE) {
            config.default_page_size = size.trim().parse().map_err(|_| ConfigError::Invalid {
                key: ENV_DEFAULT_PAGE_SIZE.to_string(),
                value: size.clone(),
            })?;
        }
        if let Some(fields) = lookup(ENV_MULTILINGUAL_FIELDS) {
            config.multilingual_fields = split_list(&fields);
        }
        if let Some(fields) = lookup(ENV_ID_FIELDS) {
            config.id_fields = split_list(&fields);
        }

        config.validate()
    }

    /// Builder-style setter for the multilingual field list.
    pub fn with_multilingual_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.multilingual_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style setter for the default locale.
    pub fn with_default_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = locale.into();
        self
    }

    /// Builder-style setter for the default page size.
    pub fn with_default_page_size(mut self, size: u64) -> Self {
        self.default_page_size = size;
        self
    }

    /// Whether sorting on `field` should target the localized sub-field.
    pub fn is_multilingual(&self, field: &str) -> bool {
        self.multilingual_fields.iter().any(|f| f == field)
    }

    /// Whether `key` addresses a document id.
    pub fn is_id_field(&self, key: &str) -> bool {
        self.id_fields.iter().any(|f| f == key)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.default_locale.is_empty() {
            return Err(ConfigError::Invalid {
                key: "defaultLocale".to_string(),
                value: String::new(),
            });
        }
        if self.default_page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "defaultPageSize".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(self)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
