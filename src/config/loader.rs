use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Worker agent definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    pub instructions: String,
    /// Shown to the orchestrator as the connected tool description
    pub description: String,
}

/// Orchestrating agent definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorSpec {
    pub name: String,
    pub instructions: String,
}

/// Errors raised while loading agent definitions
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration in {}: {reason}", path.display())]
    Schema { path: PathBuf, reason: String },
}

/// Load the worker agent list (`agents:` key)
pub fn load_agent_specs(path: impl AsRef<Path>) -> Result<Vec<AgentSpec>, ConfigError> {
    let path = path.as_ref();
    let section = read_section(path, "agents")?;
    let specs: Vec<AgentSpec> =
        serde_yaml::from_value(section).map_err(|e| ConfigError::Schema {
            path: path.to_path_buf(),
            reason: format!("'agents' entries must have name, instructions and description: {}", e),
        })?;

    // Connected tool names have to be unique within one orchestrator
    let mut seen = HashSet::new();
    for spec in &specs {
        if !seen.insert(spec.name.as_str()) {
            return Err(ConfigError::Schema {
                path: path.to_path_buf(),
                reason: format!("duplicate agent name '{}'", spec.name),
            });
        }
    }

    Ok(specs)
}

/// Load the orchestrator definition (`orchestrator:` key)
pub fn load_orchestrator_spec(path: impl AsRef<Path>) -> Result<OrchestratorSpec, ConfigError> {
    let path = path.as_ref();
    let section = read_section(path, "orchestrator")?;
    serde_yaml::from_value(section).map_err(|e| ConfigError::Schema {
        path: path.to_path_buf(),
        reason: format!("'orchestrator' must have name and instructions: {}", e),
    })
}

fn read_section(path: &Path, key: &str) -> Result<serde_yaml::Value, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let document: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

    document
        .get(key)
        .cloned()
        .ok_or_else(|| ConfigError::Schema {
            path: path.to_path_buf(),
            reason: format!("'{}' key not found", key),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_agent_specs() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "agents.yaml",
            r#"
agents:
  - name: content_writer
    instructions: Write punchy copy.
    description: Writes campaign copy
  - name: image_generator
    instructions: Describe visual concepts.
    description: Designs image concepts
"#,
        );

        let specs = load_agent_specs(&path).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "content_writer");
        assert_eq!(specs[1].description, "Designs image concepts");
    }

    #[test]
    fn test_load_orchestrator_spec() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "orchestrator.yaml",
            "orchestrator:\n  name: campaign_lead\n  instructions: |\n    Coordinate the team.\n",
        );

        let spec = load_orchestrator_spec(&path).unwrap();
        assert_eq!(spec.name, "campaign_lead");
        assert!(spec.instructions.contains("Coordinate"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let result = load_agent_specs(dir.path().join("missing.yaml"));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.yaml", "agents: [unclosed\n  - name: x");
        let result = load_agent_specs(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_top_level_key_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "other.yaml", "workers: []\n");

        let result = load_agent_specs(&path);
        assert!(matches!(result, Err(ConfigError::Schema { .. })));

        let result = load_orchestrator_spec(&path);
        match result {
            Err(ConfigError::Schema { reason, .. }) => assert!(reason.contains("orchestrator")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_entry_missing_field_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "agents.yaml", "agents:\n  - name: writer\n");
        let result = load_agent_specs(&path);
        assert!(matches!(result, Err(ConfigError::Schema { .. })));
    }

    #[test]
    fn test_duplicate_agent_names_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "agents.yaml",
            r#"
agents:
  - {name: writer, instructions: a, description: b}
  - {name: writer, instructions: c, description: d}
"#,
        );

        match load_agent_specs(&path) {
            Err(ConfigError::Schema { reason, .. }) => assert!(reason.contains("duplicate")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_empty_agent_list_is_allowed() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "agents.yaml", "agents: []\n");
        assert!(load_agent_specs(&path).unwrap().is_empty());
    }
}
