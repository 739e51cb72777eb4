use std::fs;
use std::path::Path;

use serde::Deserialize;
use tp_core::{ClassificationManager, EventHub};

/// A rules file: consumers in registration order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesFile {
    #[serde(default)]
    pub consumers: Vec<ConsumerRules>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsumerRules {
    pub id: String,
    #[serde(default)]
    pub shim: Option<ShimBlock>,
    #[serde(default)]
    pub allow: Option<AllowBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShimBlock {
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub not_hosts: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllowBlock {
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub hosts: Vec<String>,
}

impl RulesFile {
    pub fn parse(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| format!("Invalid rules file: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
        Self::parse(&text)
    }

    /// Register every consumer, shim rules before allow rules.
    pub fn apply<H: EventHub>(&self, manager: &mut ClassificationManager<H>) -> Result<(), String> {
        for consumer in &self.consumers {
            if let Some(shim) = &consumer.shim {
                manager
                    .shim(&consumer.id, &shim.patterns, &shim.not_hosts)
                    .map_err(|e| format!("Consumer '{}': {}", consumer.id, e))?;
            }
            if let Some(allow) = &consumer.allow {
                manager
                    .allow(&consumer.id, &allow.patterns, &allow.hosts)
                    .map_err(|e| format!("Consumer '{}': {}", consumer.id, e))?;
            }
        }
        Ok(())
    }
}
