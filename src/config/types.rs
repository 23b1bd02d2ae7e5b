//! Server and resource options. Deserializable from a JSON options file; every field has a default.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How far a delete reaches into records referencing the deleted one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadeMode {
    /// Only the record itself.
    Off,
    /// The record and records holding its foreign key.
    #[default]
    Direct,
    /// Children, grandchildren and so on.
    Transitive,
}

impl std::str::FromStr for CascadeMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" | "none" => Ok(CascadeMode::Off),
            "direct" => Ok(CascadeMode::Direct),
            "transitive" => Ok(CascadeMode::Transitive),
            _ => Err(ConfigError::Validation(format!(
                "invalid cascade mode: {} (expected off, direct or transitive)",
                s
            ))),
        }
    }
}

/// Naming conventions used to map the document onto REST resources.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceOptions {
    /// Identifier field of every record.
    pub id_field: String,
    /// Appended to a singular collection name to form a foreign key (`post` + `_id`).
    pub foreign_key_suffix: String,
    pub cascade: CascadeMode,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        ResourceOptions {
            id_field: "id".into(),
            foreign_key_suffix: "_id".into(),
            cascade: CascadeMode::Direct,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Route-rewrite file: JSON object of pattern -> replacement.
    pub routes: Option<PathBuf>,
    /// Declarative middleware files, applied in order.
    pub middlewares: Vec<PathBuf>,
    pub read_only: bool,
    /// Artificial delay before every response, in milliseconds.
    pub delay: Option<u64>,
    /// Directory served for paths no resource route matches.
    pub static_dir: Option<PathBuf>,
    pub snapshots: PathBuf,
    pub watch: bool,
    /// Window in which successive file events collapse into one reload.
    pub watch_debounce_ms: u64,
    pub cors: bool,
    pub gzip: bool,
    #[serde(flatten)]
    pub resource: ResourceOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "localhost".into(),
            port: 3000,
            routes: None,
            middlewares: Vec::new(),
            read_only: false,
            delay: None,
            static_dir: None,
            snapshots: PathBuf::from("."),
            watch: false,
            watch_debounce_ms: 100,
            cors: true,
            gzip: true,
            resource: ResourceOptions::default(),
        }
    }
}
