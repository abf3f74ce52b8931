//! Configuration for the shield
//!
//! Loaded from a YAML file at ~/.config/llm-shield/config.yaml. Every
//! section is optional: absence or a parse failure falls back to the
//! documented defaults (logged once), so a broken config degrades to a
//! functional shield instead of an open gateway.

use crate::model::SanitizationRule;
use crate::sanitize;
use crate::shield::ShieldConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default session TTL when the config supplies none or fails to parse
const DEFAULT_TTL: Duration = Duration::from_secs(8 * 60 * 60);

// ─────────────────────────────────────────────────────────────────────────────
// File structure
// ─────────────────────────────────────────────────────────────────────────────

/// The complete configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FullConfig {
    pub enabled: bool,
    pub session: SessionConfig,
    /// Sanitization rules; empty means the built-in catalogue
    pub rules: Vec<SanitizationRule>,
    pub compliance: ComplianceConfig,
    pub policy: PolicyConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Duration string: "8h", "30m", "90s"
    pub ttl: String,
    pub max_mappings: usize,
    /// Whether hosts should seal exported sessions at rest
    pub encryption: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComplianceConfig {
    pub block_on_critical: bool,
    pub detectors: Vec<DetectorConfig>,
}

/// Per-detector settings, carried for the host's policy tooling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub enabled: bool,
    pub severity: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub validate_luhn: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyConfig {
    pub default_access_level: String,
    pub require_auth: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub log_path: String,
    pub sign_entries: bool,
    pub retention_days: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

impl Default for FullConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            session: SessionConfig::default(),
            rules: Vec::new(),
            compliance: ComplianceConfig::default(),
            policy: PolicyConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: "8h".to_string(),
            max_mappings: 10_000,
            encryption: true,
        }
    }
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            block_on_critical: true,
            detectors: vec![
                DetectorConfig {
                    kind: "ssn".into(),
                    enabled: true,
                    severity: "critical".into(),
                    validate_luhn: false,
                },
                DetectorConfig {
                    kind: "credit_card".into(),
                    enabled: true,
                    severity: "critical".into(),
                    validate_luhn: true,
                },
                DetectorConfig {
                    kind: "api_key".into(),
                    enabled: true,
                    severity: "critical".into(),
                    validate_luhn: false,
                },
            ],
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_access_level: "sanitized_only".to_string(),
            require_auth: true,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: "~/.llm-shield/logs".to_string(),
            sign_entries: true,
            retention_days: 365,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading and saving
// ─────────────────────────────────────────────────────────────────────────────

impl FullConfig {
    /// The config file path: ~/.config/llm-shield/config.yaml
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("llm-shield").join("config.yaml"))
    }

    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Load configuration, falling back to defaults on any failure
    pub fn load_or_default() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "falling back to default configuration");
                Self::default()
            }
        }
    }

    /// Serialize to YAML and write, creating parent directories
    ///
    /// The file holds policy; it is written 0640 in a 0750 directory,
    /// matching the audit log's permissions.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            create_config_dir(parent)?;
        }
        let yaml = serde_yaml::to_string(self).context("failed to serialize config")?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o640);
        }
        let mut file = options
            .open(path)
            .with_context(|| format!("failed to open config file {}", path.display()))?;
        file.write_all(yaml.as_bytes())
            .with_context(|| format!("failed to write config file {}", path.display()))
    }

    /// Flatten the file structure into the runtime shield configuration
    pub fn to_shield_config(&self) -> ShieldConfig {
        let session_ttl = humantime::parse_duration(&self.session.ttl).unwrap_or(DEFAULT_TTL);
        let rules = if self.rules.is_empty() {
            sanitize::default_rules()
        } else {
            self.rules.clone()
        };

        ShieldConfig {
            enabled: self.enabled,
            session_ttl,
            max_mappings: self.session.max_mappings,
            block_on_critical: self.compliance.block_on_critical,
            audit_log_path: expand_tilde(&self.audit.log_path),
            sign_audit_logs: self.audit.sign_entries,
            retention_days: self.audit.retention_days,
            rules,
        }
    }
}

#[cfg(unix)]
fn create_config_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o750)
        .create(dir)
        .with_context(|| format!("failed to create {}", dir.display()))
}

#[cfg(not(unix))]
fn create_config_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))
}

/// Expand a leading ~ to the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
