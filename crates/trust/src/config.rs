//! Trust configuration management
//!
//! Configuration file:
//! - ~/.config/workspace-trust/settings.yaml
//!
//! ```yaml
//! user:
//!   security.workspace.trust.enabled: false
//! ```
//!
//! The user layer overrides the defaults layer. The trust subsystem only ever
//! reads settings, the `enable`/`disable` CLI commands are the only writers.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Master switch for the whole feature
pub const WORKSPACE_TRUST_ENABLED: &str = "security.workspace.trust.enabled";

/// A setting as seen through each layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigValue<T> {
    pub user_value: Option<T>,
    pub default_value: Option<T>,
}

impl<T: Copy> ConfigValue<T> {
    /// The user's value if set, otherwise the default
    pub fn resolved(&self) -> Option<T> {
        self.user_value.or(self.default_value)
    }
}

/// The configuration collaborator
pub trait ConfigurationService: Send + Sync {
    /// Inspect a boolean setting in every layer
    fn inspect_bool(&self, key: &str) -> ConfigValue<bool>;
}

/// Whether workspace trust is turned on at all
pub fn is_workspace_trust_enabled(config: &dyn ConfigurationService) -> bool {
    config
        .inspect_bool(WORKSPACE_TRUST_ENABLED)
        .resolved()
        .unwrap_or(false)
}

/// One layer of settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsLayer {
    #[serde(
        rename = "security.workspace.trust.enabled",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub trust_enabled: Option<bool>,
}

/// Trust settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Values the user chose
    #[serde(default)]
    pub user: SettingsLayer,

    /// Values used when the user has not chosen
    #[serde(default = "default_layer")]
    pub defaults: SettingsLayer,
}

fn default_layer() -> SettingsLayer {
    SettingsLayer {
        trust_enabled: Some(true),
    }
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            user: SettingsLayer::default(),
            defaults: default_layer(),
        }
    }
}

impl TrustConfig {
    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read trust settings from {:?}", path))?;
            let config: Self = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse trust settings from {:?}", path))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Pin the feature on or off, `None` falls back to the default
    pub fn set_trust_enabled(&mut self, enabled: Option<bool>) {
        self.user.trust_enabled = enabled;
    }
}

impl ConfigurationService for TrustConfig {
    fn inspect_bool(&self, key: &str) -> ConfigValue<bool> {
        match key {
            WORKSPACE_TRUST_ENABLED => ConfigValue {
                user_value: self.user.trust_enabled,
                default_value: self.defaults.trust_enabled,
            },
            _ => ConfigValue::default(),
        }
    }
}
