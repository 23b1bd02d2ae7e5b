//! Load the options file and the route-rewrite file.

use crate::config::ServerConfig;
use crate::error::ConfigError;
use serde_json::Value;
use std::path::Path;

/// Options file (`--config`). A missing file is an error only when it was asked for.
pub async fn load_config_file(path: &Path) -> Result<ServerConfig, ConfigError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&text).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// Rewrite rules in declaration order.
pub fn parse_routes(text: &str) -> Result<Vec<(String, String)>, ConfigError> {
    let value: Value = serde_json::from_str(text).map_err(|e| ConfigError::Load(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(ConfigError::Validation("routes file must be a JSON object".into()));
    };
    map.into_iter()
        .map(|(pattern, target)| match target {
            Value::String(t) => Ok((pattern, t)),
            other => Err(ConfigError::Validation(format!(
                "route {} must map to a string, got {}",
                pattern, other
            ))),
        })
        .collect()
}

pub async fn load_routes(path: &Path) -> Result<Vec<(String, String)>, ConfigError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    parse_routes(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_declaration_order() {
        let rules = parse_routes(r#"{"/z/*": "/$1", "/a/*": "/b/$1"}"#).unwrap();
        assert_eq!(rules[0].0, "/z/*");
        assert_eq!(rules[1], ("/a/*".to_string(), "/b/$1".to_string()));
    }

    #[test]
    fn rejects_non_string_targets() {
        assert!(parse_routes(r#"{"/a": 1}"#).is_err());
        assert!(parse_routes(r#"["/a"]"#).is_err());
    }

    #[tokio::test]
    async fn loads_options_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, r#"{"read_only": true, "delay": 50}"#).unwrap();
        let cfg = load_config_file(&path).await.unwrap();
        assert!(cfg.read_only);
        assert_eq!(cfg.delay, Some(50));
        assert!(load_config_file(&dir.path().join("missing.json")).await.is_err());
    }
}
