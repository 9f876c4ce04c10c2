use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::layout::Size;
use crate::{LayoutError, Result};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Canvas size used until the mixer output negotiates
    pub fallback_width: i32,
    pub fallback_height: i32,
    /// Request pad template of the mixer element
    pub slot_template: String,
    /// Prefix of generated slot names, followed by a serial number
    pub slot_prefix: String,
    pub hold_last_frame: bool,
    pub log_level: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            fallback_width: 300,
            fallback_height: 200,
            slot_template: "sink_%u".to_string(),
            slot_prefix: "sink_".to_string(),
            hold_last_frame: true,
            log_level: "info".to_string(),
        }
    }
}

impl LayoutConfig {
    pub fn fallback_size(&self) -> Size {
        Size::new(self.fallback_width, self.fallback_height)
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.fallback_width <= 0 || self.fallback_height <= 0 {
            return Err(format!(
                "fallback canvas must be positive, got {}x{}",
                self.fallback_width, self.fallback_height
            ));
        }

        if self.slot_template.is_empty() {
            return Err("slot_template cannot be empty".to_string());
        }

        if self.slot_prefix.is_empty() {
            return Err("slot_prefix cannot be empty".to_string());
        }

        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: LayoutConfig = toml::from_str(content).map_err(|e| {
            LayoutError::Config(format!("Failed to parse configuration: {}", e))
        })?;

        config.validate().map_err(LayoutError::Config)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LayoutError::Config(format!(
                "Configuration file not found: {:?}",
                path
            )));
        }

        info!("Loading configuration from {:?}", path);
        let content = std::fs::read_to_string(path)?;

        Self::from_toml_str(&content).map_err(|e| match e {
            LayoutError::Config(msg) => LayoutError::Config(format!("{:?}: {}", path, msg)),
            other => other,
        })
    }
}
