//! Service settings, loaded from the environment with defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Page size used when a listing request names none.
    pub default_page_size: usize,
    /// Upper bound applied to requested page sizes.
    pub max_page_size: usize,
    /// Report missing targets as not found instead of as an access denial.
    pub reveal_missing: bool,
    /// Give the creator of a document an owner grant on it.
    pub grant_creator_owner: bool,
    /// Trust an `X-User-Id` header as the caller's identity. Only honoured
    /// when no token secret is configured.
    pub allow_header_identity: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            reveal_missing: true,
            grant_creator_owner: true,
            allow_header_identity: false,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            default_page_size: env_or("DOC_HUB_PAGE_SIZE", defaults.default_page_size)?,
            max_page_size: env_or("DOC_HUB_MAX_PAGE_SIZE", defaults.max_page_size)?,
            reveal_missing: env_or("DOC_HUB_REVEAL_MISSING", defaults.reveal_missing)?,
            grant_creator_owner: env_or("DOC_HUB_CREATOR_OWNER", defaults.grant_creator_owner)?,
            allow_header_identity: env_or("DOC_HUB_ALLOW_HEADER_IDENTITY", defaults.allow_header_identity)?,
        };
        Ok(config.normalized())
    }

    /// Keep page sizes usable whatever the input.
    pub fn normalized(mut self) -> Self {
        self.max_page_size = self.max_page_size.max(1);
        self.default_page_size = self.default_page_size.clamp(1, self.max_page_size);
        self
    }

    /// Effective page size for a request.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(size) if size > 0 => size.min(self.max_page_size),
            _ => self.default_page_size,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_clamped() {
        let config = ServiceConfig::default();
        assert_eq!(config.page_size(None), 20);
        assert_eq!(config.page_size(Some(0)), 20);
        assert_eq!(config.page_size(Some(5)), 5);
        assert_eq!(config.page_size(Some(10_000)), 100);
    }

    #[test]
    fn normalization_fixes_inconsistent_bounds() {
        let config = ServiceConfig {
            default_page_size: 500,
            max_page_size: 0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.max_page_size, 1);
        assert_eq!(config.default_page_size, 1);
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: ServiceConfig = serde_json::from_str(r#"{"reveal_missing": false}"#).unwrap();
        assert!(!config.reveal_missing);
        assert_eq!(config.max_page_size, 100);
        assert!(!config.allow_header_identity);
    }
}
