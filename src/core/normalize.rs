// variable key normalization (case folding + prefix stripping)
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::core::error::{InventoryError, Result};

pub const DEFAULT_PREFIX_PATTERN: &str = "device";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    pub lowercase: bool,
    #[serde(alias = "dropprefix", alias = "dropPrefix")]
    pub drop_prefix: bool,
    /// Regex matched case-insensitively at the start of the key only.
    #[serde(alias = "prefixPattern")]
    pub prefix_pattern: String,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            lowercase: false,
            drop_prefix: false,
            prefix_pattern: DEFAULT_PREFIX_PATTERN.to_string(),
        }
    }
}

/// Normalizer with its prefix pattern compiled once, for use across a pass.
#[derive(Debug, Clone)]
pub struct KeyNormalizer {
    lowercase: bool,
    prefix: Option<Regex>,
}

impl KeyNormalizer {
    /// Fails with a configuration error when `prefix_pattern` is not a valid regex.
    pub fn new(options: &NormalizeOptions) -> Result<Self> {
        let prefix = if options.drop_prefix && !options.prefix_pattern.is_empty() {
            let re = anchored(&options.prefix_pattern).map_err(|e| {
                InventoryError::configuration(format!(
                    "invalid prefix_pattern `{}`: {e}",
                    options.prefix_pattern
                ))
            })?;
            Some(re)
        } else {
            None
        };
        Ok(Self {
            lowercase: options.lowercase,
            prefix,
        })
    }

    pub fn is_identity(&self) -> bool {
        !self.lowercase && self.prefix.is_none()
    }

    /// The prefix is matched case-insensitively against the start of the
    /// original key, so `"DeviceName"` loses `"Device"` whether or not
    /// lowercasing is also requested. The result may be empty when the whole
    /// key is the prefix.
    pub fn normalize(&self, key: &str) -> String {
        let key = match &self.prefix {
            Some(re) => re.find(key).map_or(key, |m| &key[m.end()..]),
            None => key,
        };

        if self.lowercase {
            key.to_lowercase()
        } else {
            key.to_string()
        }
    }
}

fn anchored(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(&format!("^(?:{pattern})"))
        .case_insensitive(true)
        .build()
}

/// One-off normalization of a single key.
///
/// Total: a `prefix_pattern` that does not compile is matched as a literal.
pub fn normalize(key: &str, options: &NormalizeOptions) -> String {
    let normalizer = KeyNormalizer::new(options).unwrap_or_else(|_| KeyNormalizer {
        lowercase: options.lowercase,
        prefix: anchored(&regex::escape(&options.prefix_pattern)).ok(),
    });
    normalizer.normalize(key)
}
