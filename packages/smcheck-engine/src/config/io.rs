//! Configuration I/O (YAML loading)

use super::engine_config::EngineConfig;
use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;
use serde::{Deserialize, Serialize};
use std::path::Path;

const SUPPORTED_VERSIONS: [u32; 1] = [1];

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileV1 {
    /// Schema version (always 1 for v1)
    pub version: u32,

    /// Base preset
    pub preset: String,

    /// Fine-grained overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<EngineOverrides>,
}

/// Per-field overrides applied on top of the preset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fixpoint_iterations: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_supergraph_nodes: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_exploded_nodes: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_prune_rounds: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub emit_notes: Option<bool>,
}

impl EngineConfig {
    /// Parse and validate a YAML configuration document
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let file: ConfigFileV1 = serde_yaml::from_str(yaml)?;
        if !SUPPORTED_VERSIONS.contains(&file.version) {
            return Err(ConfigError::UnsupportedVersion {
                found: file.version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let mut config = EngineConfig::from_preset(Preset::from_str(&file.preset)?);
        if let Some(overrides) = file.overrides {
            config.apply(overrides);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Export as a v1 document with every field spelled out
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let file = ConfigFileV1 {
            version: 1,
            preset: self.preset.as_str().to_string(),
            overrides: Some(EngineOverrides {
                max_fixpoint_iterations: Some(self.max_fixpoint_iterations),
                max_supergraph_nodes: Some(self.max_supergraph_nodes),
                max_exploded_nodes: Some(self.max_exploded_nodes),
                max_prune_rounds: Some(self.max_prune_rounds),
                emit_notes: Some(self.emit_notes),
            }),
        };
        Ok(serde_yaml::to_string(&file)?)
    }

    fn apply(&mut self, overrides: EngineOverrides) {
        if let Some(v) = overrides.max_fixpoint_iterations {
            self.max_fixpoint_iterations = v;
        }
        if let Some(v) = overrides.max_supergraph_nodes {
            self.max_supergraph_nodes = v;
        }
        if let Some(v) = overrides.max_exploded_nodes {
            self.max_exploded_nodes = v;
        }
        if let Some(v) = overrides.max_prune_rounds {
            self.max_prune_rounds = v;
        }
        if let Some(v) = overrides.emit_notes {
            self.emit_notes = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_preset_with_overrides() {
        let yaml = r#"
version: 1
preset: fast
overrides:
  max_prune_rounds: 9
  emit_notes: true
"#;
        let config = EngineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.preset, Preset::Fast);
        assert_eq!(config.max_prune_rounds, 9);
        assert!(config.emit_notes);
        assert_eq!(
            config.max_fixpoint_iterations,
            EngineConfig::from_preset(Preset::Fast).max_fixpoint_iterations
        );
    }

    #[test]
    fn test_yaml_rejects_unknown_fields() {
        let yaml = "version: 1\npreset: fast\nturbo: true\n";
        assert!(matches!(
            EngineConfig::from_yaml_str(yaml),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_yaml_rejects_unsupported_version() {
        let yaml = "version: 2\npreset: fast\n";
        assert!(matches!(
            EngineConfig::from_yaml_str(yaml),
            Err(ConfigError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn test_yaml_validates_overrides() {
        let yaml = "version: 1\npreset: balanced\noverrides:\n  max_prune_rounds: 0\n";
        assert!(matches!(
            EngineConfig::from_yaml_str(yaml),
            Err(ConfigError::Range { .. })
        ));
    }

    #[test]
    fn test_export_then_load() {
        let config = EngineConfig::from_preset(Preset::Thorough).with_notes(false);
        let yaml = config.to_yaml().unwrap();
        assert_eq!(EngineConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
