//! Pool configuration
//!
//! `0` means "pick a default" for both fields: the page
//! size falls back to the file's block size (or [`DEFAULT_PAGE_SIZE`]) and the
//! cache size to [`DEFAULT_MAX_CACHE`].
//!
//! ```toml
//! page_size = 4096
//! max_cache = 64
//! ```

use crate::core::error::{PoolError, Result};
use serde::{Deserialize, Serialize};

/// Page size used when neither the caller nor the store provides one
pub const DEFAULT_PAGE_SIZE: u32 = 8192;

/// Cache capacity used when the caller passes 0
pub const DEFAULT_MAX_CACHE: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Bytes per page; 0 selects the block size of the backing file
    pub page_size: u32,
    /// Soft cap on cached frames; 0 selects [`DEFAULT_MAX_CACHE`]
    pub max_cache: u32,
}

impl PoolConfig {
    pub fn new(page_size: u32, max_cache: u32) -> Self {
        PoolConfig {
            page_size,
            max_cache,
        }
    }

    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| PoolError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| PoolError::Config(e.to_string()))
    }

    /// Page size once the store's block size is known
    pub(crate) fn resolve_page_size(&self, block_size: Option<u32>) -> u32 {
        match self.page_size {
            0 => block_size.unwrap_or(DEFAULT_PAGE_SIZE),
            size => size,
        }
    }

    pub(crate) fn resolve_max_cache(&self) -> u32 {
        match self.max_cache {
            0 => DEFAULT_MAX_CACHE,
            max => max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve() {
        let config = PoolConfig::default();
        assert_eq!(config.resolve_page_size(None), DEFAULT_PAGE_SIZE);
        assert_eq!(config.resolve_page_size(Some(4096)), 4096);
        assert_eq!(config.resolve_max_cache(), DEFAULT_MAX_CACHE);
    }

    #[test]
    fn test_explicit_values_win() {
        let config = PoolConfig::new(512, 8);
        assert_eq!(config.resolve_page_size(Some(4096)), 512);
        assert_eq!(config.resolve_max_cache(), 8);
    }

    #[test]
    fn test_from_toml() {
        let config = PoolConfig::from_toml_str("page_size = 4096\nmax_cache = 64\n").unwrap();
        assert_eq!(config, PoolConfig::new(4096, 64));

        let partial = PoolConfig::from_toml_str("max_cache = 3").unwrap();
        assert_eq!(partial, PoolConfig::new(0, 3));
    }

    #[test]
    fn test_toml_rejects_unknown_and_negative() {
        assert!(matches!(
            PoolConfig::from_toml_str("pagesize = 10"),
            Err(PoolError::Config(_))
        ));
        assert!(matches!(
            PoolConfig::from_toml_str("page_size = -1"),
            Err(PoolError::Config(_))
        ));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = PoolConfig::new(1024, 16);
        let text = config.to_toml_string().unwrap();
        assert_eq!(PoolConfig::from_toml_str(&text).unwrap(), config);
    }
}
