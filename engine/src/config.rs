//! Environment-driven engine configuration.
//!
//! Values come from the process environment, after an optional `.env` file
//! has been loaded with `dotenvy`:
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `FIELDMAP_LOG` | tracing filter directive | `info` |
//! | `FIELDMAP_DELIMITER` | force the CSV delimiter | auto-detect |
//! | `FIELDMAP_NULL_BLANKS` | load blank CSV cells as `null` | `false` |

use serde::{Deserialize, Serialize};

use crate::table::loader::LoadOptions;

pub const ENV_LOG: &str = "FIELDMAP_LOG";
pub const ENV_DELIMITER: &str = "FIELDMAP_DELIMITER";
pub const ENV_NULL_BLANKS: &str = "FIELDMAP_NULL_BLANKS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `tracing_subscriber::EnvFilter` directive
    pub log_filter: String,
    pub delimiter: Option<char>,
    pub blanks_as_null: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            delimiter: None,
            blanks_as_null: false,
        }
    }
}

impl EngineConfig {
    /// Load `.env` (if present) and read the environment.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; unset or unparsable values keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let log_filter = lookup(ENV_LOG)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.log_filter);

        let delimiter = lookup(ENV_DELIMITER).and_then(|v| parse_delimiter(&v));

        let blanks_as_null = lookup(ENV_NULL_BLANKS)
            .map(|v| parse_flag(&v))
            .unwrap_or(defaults.blanks_as_null);

        Self {
            log_filter,
            delimiter,
            blanks_as_null,
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            delimiter: self.delimiter,
            blanks_as_null: self.blanks_as_null,
        }
    }
}

/// Accepts a single character or the escapes `\t` / `tab`.
pub fn parse_delimiter(value: &str) -> Option<char> {
    match value {
        "\\t" | "tab" => Some('\t'),
        _ => {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => None,
            }
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
