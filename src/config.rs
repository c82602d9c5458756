//! Configuration for the context injector
//!
//! Engine settings come from the `config` crate (defaults, optional TOML
//! file, `CONTEXT_INJECTOR__*` environment). Project-level files under
//! `.asd/config/` are read lazily by the engine.

use crate::collaborators::read_optional_text;
use crate::error::{ContextError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Engine-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Project root holding the `.asd` directory
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            cache: CacheSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Settings {
    /// Settings for a project root with everything else defaulted
    pub fn for_project(root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: root.into(),
            ..Default::default()
        }
    }

    /// Load settings: defaults, then `file` if it exists, then environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("CONTEXT_INJECTOR")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate that the settings are usable
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_entries == 0 {
            return Err(ContextError::Config(
                "cache.max_entries must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bundle cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Entry time-to-live in milliseconds
    #[serde(default = "default_cache_ttl_ms")]
    pub ttl_ms: u64,

    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl_ms() -> u64 {
    300_000
}

fn default_cache_max_entries() -> usize {
    256
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_ms: default_cache_ttl_ms(),
            max_entries: default_cache_max_entries(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Project context configuration (`.asd/config/context-config.json`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub performance: PerformanceTargets,
    pub filtering: FilteringOptions,
    pub inheritance: InheritanceOptions,
    pub automation: AutomationOptions,
}

impl ContextConfig {
    /// Load the project context configuration.
    ///
    /// A missing file yields defaults; malformed content is an error.
    pub async fn load(path: &Path) -> Result<Self> {
        let Some(text) = read_optional_text(path).await? else {
            debug!("No context config at {}, using defaults", path.display());
            return Ok(Self::default());
        };

        serde_json::from_str(&text).map_err(|e| {
            ContextError::Config(format!("invalid context config {}: {}", path.display(), e))
        })
    }
}

/// Advisory timing targets in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceTargets {
    pub target_ms: f64,
    pub layer_target_ms: f64,
    pub automation_target_ms: f64,
}

impl Default for PerformanceTargets {
    fn default() -> Self {
        Self {
            target_ms: 500.0,
            layer_target_ms: 100.0,
            automation_target_ms: 3000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilteringOptions {
    /// Attempt pattern-based filtering before the basic fallback
    pub advanced: bool,
}

impl Default for FilteringOptions {
    fn default() -> Self {
        Self { advanced: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InheritanceOptions {
    pub enabled: bool,
}

impl Default for InheritanceOptions {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationOptions {
    pub readiness_threshold: f64,
    pub min_gather_relevance: f64,
}

impl Default for AutomationOptions {
    fn default() -> Self {
        Self {
            readiness_threshold: 0.7,
            min_gather_relevance: 0.6,
        }
    }
}

/// Include/exclude patterns for one agent type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentFilterRules {
    #[serde(default, alias = "includePatterns")]
    pub include_patterns: Vec<String>,

    #[serde(default, alias = "excludePatterns")]
    pub exclude_patterns: Vec<String>,
}

/// Per-agent filter rules from `agent-capabilities.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub context_filtering: HashMap<String, AgentFilterRules>,
}

impl FilterConfig {
    /// Load filter rules; a missing file yields an empty rule set
    pub async fn load(path: &Path) -> Result<Self> {
        let Some(text) = read_optional_text(path).await? else {
            debug!("No agent capabilities at {}, filtering without patterns", path.display());
            return Ok(Self::default());
        };

        serde_json::from_str(&text).map_err(|e| {
            ContextError::Config(format!("invalid filter config {}: {}", path.display(), e))
        })
    }

    /// Rules for an agent type, empty when none are configured
    pub fn rules_for(&self, agent_type: &str) -> AgentFilterRules {
        self.context_filtering
            .get(agent_type)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.cache.enabled);
        assert_eq!(settings.cache.ttl_ms, 300_000);
        assert_eq!(settings.logging.level, "info");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("injector.toml");
        std::fs::write(
            &path,
            "project_root = \"/srv/project\"\n[cache]\nttl_ms = 1000\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.project_root, PathBuf::from("/srv/project"));
        assert_eq!(settings.cache.ttl_ms, 1000);
        assert_eq!(settings.cache.max_entries, 256);
    }

    #[test]
    fn test_zero_cache_size_rejected() {
        let mut settings = Settings::default();
        settings.cache.max_entries = 0;
        assert!(settings.validate().is_err());
    }

    #[tokio::test]
    async fn test_context_config_missing_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ContextConfig::load(&dir.path().join("context-config.json"))
            .await
            .unwrap();
        assert_eq!(config, ContextConfig::default());
        assert_eq!(config.performance.target_ms, 500.0);
    }

    #[tokio::test]
    async fn test_context_config_partial_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context-config.json");
        std::fs::write(&path, r#"{"performance": {"target_ms": 250}}"#).unwrap();

        let config = ContextConfig::load(&path).await.unwrap();
        assert_eq!(config.performance.target_ms, 250.0);
        assert_eq!(config.performance.layer_target_ms, 100.0);
        assert!(config.filtering.advanced);
    }

    #[tokio::test]
    async fn test_context_config_malformed_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context-config.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = ContextConfig::load(&path).await.unwrap_err();
        assert!(matches!(err, ContextError::Config(_)));
    }

    #[tokio::test]
    async fn test_filter_config_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent-capabilities.json");
        std::fs::write(
            &path,
            r#"{
                "agents": {"backend-developer": {}},
                "context_filtering": {
                    "backend-developer": {
                        "include_patterns": ["api-*", "database"],
                        "excludePatterns": ["frontend"]
                    }
                }
            }"#,
        )
        .unwrap();

        let config = FilterConfig::load(&path).await.unwrap();
        let rules = config.rules_for("backend-developer");
        assert_eq!(rules.include_patterns, vec!["api-*", "database"]);
        assert_eq!(rules.exclude_patterns, vec!["frontend"]);
        assert_eq!(config.rules_for("unknown"), AgentFilterRules::default());
    }
}
