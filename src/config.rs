// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Data layer options.
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `ENTITY_DATA_PREFIX` | [`prefix`](DataOptions::prefix) | empty |
//! | `ENTITY_DATA_CACHE_SECS` | [`cache_expiration_secs`](DataOptions::cache_expiration_secs) | `300` |
//! | `ENTITY_DATA_LOG_PARAMETERS` | [`log_parameters`](DataOptions::log_parameters) | `true` |

use std::{env, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_CACHE_SECS: u64 = 300;

/// Options shared by one [`Database`](crate::executor::Database).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataOptions {
    /// Table-name prefix substituted for the `$pre:` placeholder.
    pub prefix: String,

    /// Sliding expiration of cached statement templates, in seconds.
    pub cache_expiration_secs: u64,

    /// Write parameter values into failure logs.
    pub log_parameters: bool
}

impl Default for DataOptions {
    fn default() -> Self {
        Self {
            prefix:                String::new(),
            cache_expiration_secs: DEFAULT_CACHE_SECS,
            log_parameters:        true
        }
    }
}

impl DataOptions {
    /// Options with a table prefix and defaults elsewhere.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Load from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>
    {
        let defaults = Self::default();
        Ok(Self {
            prefix: lookup("ENTITY_DATA_PREFIX").unwrap_or(defaults.prefix),

            cache_expiration_secs: match lookup("ENTITY_DATA_CACHE_SECS") {
                Some(raw) => raw.trim().parse().map_err(|_| {
                    Error::configuration(format!(
                        "ENTITY_DATA_CACHE_SECS must be a number of seconds, got `{raw}`"
                    ))
                })?,
                None => defaults.cache_expiration_secs
            },

            log_parameters: match lookup("ENTITY_DATA_LOG_PARAMETERS") {
                Some(raw) => parse_flag(&raw).ok_or_else(|| {
                    Error::configuration(format!(
                        "ENTITY_DATA_LOG_PARAMETERS must be a boolean, got `{raw}`"
                    ))
                })?,
                None => defaults.log_parameters
            }
        })
    }

    /// Sliding expiration as a duration.
    pub const fn cache_expiration(&self) -> Duration {
        Duration::from_secs(self.cache_expiration_secs)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None
    }
}
