//! Configuration management for the correction engine
//!
//! Thresholds and enable flags are resolved per scope: a document-type
//! setting overrides the global default.

use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::lexicon::Scope;

const DEFAULT_LEARNING_THRESHOLD: u32 = 3;
const DEFAULT_TYPE_LEARNING_THRESHOLD: u32 = 1;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub learning: LearningConfig,
    pub resolver: ResolverConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Lexicon learning settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Identical corrections needed before a pattern enters the lexicon
    pub lexicon_learning_threshold: u32,
    pub auto_correction_enabled: bool,
    /// Per document-type overrides
    pub document_types: HashMap<String, ScopeSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScopeSettings {
    pub lexicon_learning_threshold: Option<u32>,
    pub auto_correction_enabled: Option<bool>,
}

/// History resolver settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Prefix matches only apply when the unmatched tail is shorter than this
    pub short_suffix_bound: usize,
    /// Trailing characters treated as OCR noise
    pub filler_chars: Vec<char>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Number of per-scope lexicon snapshots kept in memory
    pub lexicon_snapshots: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: DatabaseConfig::default(),
            learning: LearningConfig::default(),
            resolver: ResolverConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: "sqlite:./corrections.db".to_string(),
        }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        LearningConfig {
            lexicon_learning_threshold: DEFAULT_LEARNING_THRESHOLD,
            auto_correction_enabled: true,
            document_types: HashMap::new(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            short_suffix_bound: 5,
            filler_chars: vec!['<', '*', '.', ' '],
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            lexicon_snapshots: 64,
        }
    }
}

impl Config {
    /// Load from environment variables, merging an optional JSON file
    /// named by `CORRECTIONS_CONFIG` underneath them.
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var("CORRECTIONS_CONFIG") {
            Ok(path) => Config::from_file(path)?,
            Err(_) => Config::default(),
        };

        if let Ok(url) = env::var("DATABASE_URL") {
            config.database.url = url;
        }
        if let Ok(value) = env::var("LEXICON_LEARNING_THRESHOLD") {
            config.learning.lexicon_learning_threshold = value.parse().map_err(|_| {
                CoreError::Config(format!("LEXICON_LEARNING_THRESHOLD is not an integer: {}", value))
            })?;
        }
        if let Ok(value) = env::var("AUTO_CORRECTION_ENABLED") {
            config.learning.auto_correction_enabled =
                matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Ok(value) = env::var("SHORT_SUFFIX_BOUND") {
            config.resolver.short_suffix_bound = value.parse().map_err(|_| {
                CoreError::Config(format!("SHORT_SUFFIX_BOUND is not an integer: {}", value))
            })?;
        }

        config.learning.validate();
        Ok(config)
    }

    /// Load from a JSON file; missing keys fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&raw)
            .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))?;
        config.learning.validate();
        tracing::info!("Configuration loaded from {}", path.display());
        Ok(config)
    }
}

impl LearningConfig {
    /// Promotion threshold for a scope, never below 1
    pub fn learning_threshold(&self, scope: &Scope) -> u32 {
        let threshold = scope
            .document_type()
            .and_then(|t| self.document_types.get(t))
            .and_then(|s| s.lexicon_learning_threshold)
            .unwrap_or(self.lexicon_learning_threshold);
        threshold.max(1)
    }

    /// Whether lexicon entries are applied to fresh OCR output in a scope
    pub fn auto_correction_enabled(&self, scope: &Scope) -> bool {
        scope
            .document_type()
            .and_then(|t| self.document_types.get(t))
            .and_then(|s| s.auto_correction_enabled)
            .unwrap_or(self.auto_correction_enabled)
    }

    fn validate(&mut self) {
        if self.lexicon_learning_threshold < 1 {
            tracing::warn!(
                "Invalid lexicon_learning_threshold: {}, using default: {}",
                self.lexicon_learning_threshold,
                DEFAULT_LEARNING_THRESHOLD
            );
            self.lexicon_learning_threshold = DEFAULT_LEARNING_THRESHOLD;
        }

        for (doc_type, settings) in self.document_types.iter_mut() {
            if settings.lexicon_learning_threshold == Some(0) {
                tracing::warn!(
                    "Invalid threshold for {}: 0, using default: {}",
                    doc_type,
                    DEFAULT_TYPE_LEARNING_THRESHOLD
                );
                settings.lexicon_learning_threshold = Some(DEFAULT_TYPE_LEARNING_THRESHOLD);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_type_threshold_overrides_global() {
        let mut learning = LearningConfig::default();
        learning.document_types.insert(
            "invoice".to_string(),
            ScopeSettings {
                lexicon_learning_threshold: Some(1),
                auto_correction_enabled: Some(false),
            },
        );

        assert_eq!(learning.learning_threshold(&Scope::Global), 3);
        assert_eq!(learning.learning_threshold(&Scope::for_type("invoice")), 1);
        assert_eq!(learning.learning_threshold(&Scope::for_type("receipt")), 3);

        assert!(learning.auto_correction_enabled(&Scope::Global));
        assert!(!learning.auto_correction_enabled(&Scope::for_type("invoice")));
    }

    #[test]
    fn test_zero_thresholds_are_replaced() {
        let mut learning = LearningConfig {
            lexicon_learning_threshold: 0,
            ..Default::default()
        };
        learning.document_types.insert(
            "receipt".to_string(),
            ScopeSettings {
                lexicon_learning_threshold: Some(0),
                auto_correction_enabled: None,
            },
        );

        learning.validate();

        assert_eq!(learning.lexicon_learning_threshold, 3);
        assert_eq!(learning.learning_threshold(&Scope::for_type("receipt")), 1);
    }

    #[test]
    fn test_from_file_merges_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "learning": {{
                    "lexicon_learning_threshold": 2,
                    "document_types": {{ "contract": {{ "lexicon_learning_threshold": 4 }} }}
                }},
                "resolver": {{ "short_suffix_bound": 3 }}
            }}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.learning.lexicon_learning_threshold, 2);
        assert_eq!(config.learning.learning_threshold(&Scope::for_type("contract")), 4);
        assert!(config.learning.auto_correction_enabled);
        assert_eq!(config.resolver.short_suffix_bound, 3);
        assert_eq!(config.resolver.filler_chars, vec!['<', '*', '.', ' ']);
        assert_eq!(config.database.url, "sqlite:./corrections.db");
    }

    #[test]
    fn test_from_file_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
