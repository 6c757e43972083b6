use crate::config::validation::parse_flag;
use crate::config::{ConfigError, ConfigSource};
use crate::container::scope::ScopeKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

pub const ENV_AUTO_BIND: &str = "SPRIG_AUTO_BIND";
pub const ENV_DEFAULT_SCOPE: &str = "SPRIG_DEFAULT_SCOPE";
pub const ENV_INJECTOR_NAME: &str = "SPRIG_INJECTOR_NAME";

/// Settings an injector is built with
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InjectorConfig {
    /// Construct `Injectable` types that have no explicit binding
    pub auto_bind: bool,
    /// Scope used by bindings that do not name one
    pub default_scope: ScopeKind,
    /// Label used in log output
    pub name: Option<String>,
    #[serde(skip)]
    sources: HashMap<String, ConfigSource>,
}

impl InjectorConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self {
            auto_bind: true,
            default_scope: ScopeKind::Unscoped,
            name: None,
            sources: HashMap::new(),
        }
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Ok(raw) = env::var(ENV_AUTO_BIND) {
            config.auto_bind = parse_flag("auto_bind", &raw)?;
            config.record("auto_bind", ConfigSource::EnvVar(ENV_AUTO_BIND.to_string()));
        }

        if let Ok(raw) = env::var(ENV_DEFAULT_SCOPE) {
            config.default_scope = raw.parse()?;
            config.record("default_scope", ConfigSource::EnvVar(ENV_DEFAULT_SCOPE.to_string()));
        }

        if let Ok(name) = env::var(ENV_INJECTOR_NAME) {
            config.name = Some(name);
            config.record("name", ConfigSource::EnvVar(ENV_INJECTOR_NAME.to_string()));
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml_str(document: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(document)?;
        config.record_all(ConfigSource::Document("YAML".to_string()));
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON document
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(document)?;
        config.record_all(ConfigSource::Document("JSON".to_string()));
        config.validate()?;
        Ok(config)
    }

    pub fn with_auto_bind(mut self, auto_bind: bool) -> Self {
        self.auto_bind = auto_bind;
        self.record("auto_bind", ConfigSource::Programmatic);
        self
    }

    pub fn with_default_scope(mut self, scope: ScopeKind) -> Self {
        self.default_scope = scope;
        self.record("default_scope", ConfigSource::Programmatic);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self.record("name", ConfigSource::Programmatic);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    "name",
                    name.as_str(),
                    "a non-empty injector name",
                ));
            }
            if name.chars().any(|c| c.is_control()) {
                return Err(ConfigError::validation_failed(
                    "injector name must not contain control characters",
                ));
            }
        }
        Ok(())
    }

    /// Get configuration source information for debugging
    pub fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();
        sources.insert(
            "auto_bind".to_string(),
            ConfigSource::Default("true".to_string()),
        );
        sources.insert(
            "default_scope".to_string(),
            ConfigSource::Default(ScopeKind::Unscoped.to_string()),
        );
        sources.insert("name".to_string(), ConfigSource::Default("none".to_string()));

        for (field, source) in &self.sources {
            sources.insert(field.clone(), source.clone());
        }
        sources
    }

    fn record(&mut self, field: &str, source: ConfigSource) {
        self.sources.insert(field.to_string(), source);
    }

    fn record_all(&mut self, source: ConfigSource) {
        for field in ["auto_bind", "default_scope", "name"] {
            self.record(field, source.clone());
        }
    }
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        env::remove_var(ENV_AUTO_BIND);
        env::remove_var(ENV_DEFAULT_SCOPE);
        env::remove_var(ENV_INJECTOR_NAME);
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();

        let config = InjectorConfig::from_env().unwrap();
        assert!(config.auto_bind);
        assert_eq!(config.default_scope, ScopeKind::Unscoped);
        assert!(config.name.is_none());
        assert!(config.config_sources()["auto_bind"].is_default());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        env::set_var(ENV_AUTO_BIND, "false");
        env::set_var(ENV_DEFAULT_SCOPE, "singleton");
        env::set_var(ENV_INJECTOR_NAME, "request");

        let config = InjectorConfig::from_env().unwrap();
        assert!(!config.auto_bind);
        assert_eq!(config.default_scope, ScopeKind::Singleton);
        assert_eq!(config.name.as_deref(), Some("request"));

        let sources = config.config_sources();
        assert!(sources["default_scope"].is_env_var());
        assert_eq!(
            sources["auto_bind"],
            ConfigSource::EnvVar(ENV_AUTO_BIND.to_string())
        );

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_unknown_scope() {
        clear_env();
        env::set_var(ENV_DEFAULT_SCOPE, "per-request");

        let result = InjectorConfig::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "default_scope"
        ));

        clear_env();
    }

    #[test]
    fn test_from_yaml_str() {
        let config = InjectorConfig::from_yaml_str("auto_bind: false\ndefault_scope: threadlocal\n").unwrap();
        assert!(!config.auto_bind);
        assert_eq!(config.default_scope, ScopeKind::ThreadLocal);
        assert_eq!(
            config.config_sources()["auto_bind"],
            ConfigSource::Document("YAML".to_string())
        );
    }

    #[test]
    fn test_from_json_str_rejects_unknown_fields() {
        assert!(InjectorConfig::from_json_str(r#"{"default_scope": "singleton"}"#).is_ok());
        assert!(matches!(
            InjectorConfig::from_json_str(r#"{"scope": "singleton"}"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let config = InjectorConfig::new().with_name("   ");
        assert!(config.validate().is_err());
        assert!(InjectorConfig::new().with_name("root").validate().is_ok());
    }
}
