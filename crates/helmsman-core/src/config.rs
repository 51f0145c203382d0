//! Helmsman configuration.
//!
//! Loaded from TOML, then overridden by `HELMSMAN_*` environment variables.
//! Every field has a default, so an empty file is a valid configuration.
//!
//! ```toml
//! require_approval = true
//!
//! [governance]
//! strict_mode = true
//! low_risk_threshold = 0.25
//! policy_file = "release-policy.toml"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::ApprovalGate;
use crate::governance::{
    GovernanceEngine, PolicySet, RiskWeights, ValidatedPolicySet, DEFAULT_LOW_RISK_THRESHOLD,
};
use crate::memory::DEFAULT_HISTORY_WINDOW;

/// Configuration load errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HelmsmanConfig {
    /// Non-auto approvals need explicit confirmation.
    pub require_approval: bool,
    pub governance: GovernanceConfig,
}

/// Governance configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    pub enabled: bool,
    /// Rejections block approval instead of only being logged.
    pub strict_mode: bool,
    pub low_risk_threshold: f64,
    /// Number of recent outcomes aggregated into the historical context.
    pub history_window: usize,
    pub include_history: bool,
    pub policy_file: Option<PathBuf>,
    pub weights: RiskWeights,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strict_mode: false,
            low_risk_threshold: DEFAULT_LOW_RISK_THRESHOLD,
            history_window: DEFAULT_HISTORY_WINDOW,
            include_history: true,
            policy_file: None,
            weights: RiskWeights::default(),
        }
    }
}

impl GovernanceConfig {
    /// Engine for `policy` with this configuration's scoring parameters.
    pub fn build_engine(&self, policy: ValidatedPolicySet) -> GovernanceEngine {
        GovernanceEngine::new(policy)
            .with_weights(self.weights)
            .with_low_risk_threshold(self.low_risk_threshold)
    }

    /// The configured policy file, validated; an empty set when unset.
    pub fn load_policy(&self) -> anyhow::Result<ValidatedPolicySet> {
        match &self.policy_file {
            Some(path) => PolicySet::load_file(path),
            None => Ok(ValidatedPolicySet::empty()),
        }
    }
}

impl HelmsmanConfig {
    pub fn from_toml_str(raw: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Load `path` when given (defaults otherwise) and apply the process
    /// environment on top.
    pub fn load_with_env(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `HELMSMAN_*` overrides supplied by `lookup`. On error the
    /// configuration is left unchanged.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| lookup(key).map(|v| (key, v.trim().to_string()));
        let mut next = self.clone();

        if let Some((key, v)) = get("HELMSMAN_REQUIRE_APPROVAL") {
            next.require_approval = parse_bool(key, &v)?;
        }
        if let Some((key, v)) = get("HELMSMAN_GOVERNANCE_ENABLED") {
            next.governance.enabled = parse_bool(key, &v)?;
        }
        if let Some((key, v)) = get("HELMSMAN_STRICT_MODE") {
            next.governance.strict_mode = parse_bool(key, &v)?;
        }
        if let Some((key, v)) = get("HELMSMAN_INCLUDE_HISTORY") {
            next.governance.include_history = parse_bool(key, &v)?;
        }
        if let Some((key, v)) = get("HELMSMAN_LOW_RISK_THRESHOLD") {
            next.governance.low_risk_threshold = v
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { key, value: v.clone() })?;
        }
        if let Some((key, v)) = get("HELMSMAN_HISTORY_WINDOW") {
            next.governance.history_window = v
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { key, value: v.clone() })?;
        }
        if let Some((_, v)) = get("HELMSMAN_POLICY_FILE").filter(|(_, v)| !v.is_empty()) {
            next.governance.policy_file = Some(PathBuf::from(v));
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let threshold = self.governance.low_risk_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "governance.low_risk_threshold must be within [0, 1], got {threshold}"
            )));
        }
        if self.governance.history_window == 0 {
            return Err(ConfigError::Invalid(
                "governance.history_window must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn approval_gate(&self) -> ApprovalGate {
        ApprovalGate {
            require_approval: self.require_approval,
            strict_mode: self.governance.enabled && self.governance.strict_mode,
        }
    }
}

fn parse_bool(key: &'static str, value: &str) -> ConfigResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            key,
            value: value.to_string(),
        }),
    }
}
