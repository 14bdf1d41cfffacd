//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading the rules
//! configuration from YAML files.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};

use super::types::{
    CalendarRules, ChallengeRules, PayrollRules, PromotionRules, RulesConfig, TransitionRules,
};

/// Loads and provides access to the rules configuration.
///
/// # Directory Structure
///
/// The configuration directory should have the following structure:
/// ```text
/// config/callcenter/
/// ├── calendar.yaml     # Scan bound and seeded calendar overrides
/// ├── transitions.yaml  # Status engine table
/// ├── promotion.yaml    # Promotion eligibility
/// ├── challenge.yaml    # Demotion alert and challenge window
/// └── payroll.yaml      # Per-grade salary formula
/// ```
///
/// # Example
///
/// ```no_run
/// use callcenter_engine::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config/callcenter").unwrap();
/// println!("Challenge target: {}", loader.rules().challenge.period.target_orders);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    rules: RulesConfig,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration directory (e.g., "./config/callcenter")
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` instance on success, or an error if:
    /// - Any required file is missing (`ConfigNotFound`)
    /// - Any file contains invalid YAML or misses a field (`ConfigParseError`)
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let calendar = Self::load_yaml::<CalendarRules>(&path.join("calendar.yaml"))?;
        let transitions = Self::load_yaml::<TransitionRules>(&path.join("transitions.yaml"))?;
        let promotion = Self::load_yaml::<PromotionRules>(&path.join("promotion.yaml"))?;
        let challenge = Self::load_yaml::<ChallengeRules>(&path.join("challenge.yaml"))?;
        let payroll = Self::load_yaml::<PayrollRules>(&path.join("payroll.yaml"))?;

        if calendar.max_scan_days == 0 {
            return Err(EngineError::ConfigParseError {
                path: path.join("calendar.yaml").display().to_string(),
                message: "max_scan_days must be positive".to_string(),
            });
        }

        info!(
            path = %path.display(),
            calendar_overrides = calendar.overrides.len(),
            "rules configuration loaded"
        );

        Ok(Self {
            rules: RulesConfig {
                calendar,
                transitions,
                promotion,
                challenge,
                payroll,
            },
        })
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();
        debug!(path = %path_str, "reading configuration file");

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Returns the loaded rules.
    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    /// Consumes the loader and returns the rules.
    pub fn into_rules(self) -> RulesConfig {
        self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn config_path() -> &'static str {
        "./config/callcenter"
    }

    #[test]
    fn test_load_valid_configuration() {
        let result = ConfigLoader::load(config_path());
        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
    }

    #[test]
    fn test_shipped_files_match_defaults() {
        let loader = ConfigLoader::load(config_path()).unwrap();
        let defaults = RulesConfig::default();

        assert_eq!(loader.rules().transitions, defaults.transitions);
        assert_eq!(loader.rules().promotion, defaults.promotion);
        assert_eq!(loader.rules().challenge, defaults.challenge);
        assert_eq!(loader.rules().payroll, defaults.payroll);
        assert_eq!(
            loader.rules().calendar.max_scan_days,
            defaults.calendar.max_scan_days
        );
    }

    #[test]
    fn test_payroll_amounts_loaded_as_decimal() {
        let loader = ConfigLoader::load(config_path()).unwrap();
        let a = &loader.rules().payroll.a_grade;
        assert_eq!(a.base_salary, Decimal::from(2200));
        assert_eq!(a.performance_bonus(100), Decimal::from(600));
    }

    #[test]
    fn test_load_missing_directory_returns_error() {
        let result = ConfigLoader::load("/nonexistent/path");

        match result {
            Err(EngineError::ConfigNotFound { path }) => {
                assert!(path.contains("calendar.yaml"));
            }
            other => panic!("Expected ConfigNotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_yaml_returns_parse_error() {
        let dir = std::env::temp_dir().join(format!("callcenter-config-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("calendar.yaml"), "max_scan_days: [not a number").unwrap();

        let result = ConfigLoader::load(&dir);
        fs::remove_dir_all(&dir).unwrap();

        match result {
            Err(EngineError::ConfigParseError { path, .. }) => {
                assert!(path.contains("calendar.yaml"));
            }
            other => panic!("Expected ConfigParseError, got {:?}", other),
        }
    }
}
