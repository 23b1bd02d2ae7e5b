//! Seed providers: code that produces the initial document instead of a JSON file.

use crate::document::Document;
use crate::error::SourceError;
use async_trait::async_trait;
use std::path::PathBuf;

/// Produces the initial document. Implementations may do I/O or run other programs.
#[async_trait]
pub trait SeedProvider: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> String;

    async fn produce(&self) -> Result<Document, SourceError>;
}

/// A fixed document, for embedding the server in other programs and for tests.
pub struct StaticSeed(pub Document);

#[async_trait]
impl SeedProvider for StaticSeed {
    fn name(&self) -> String {
        "static".into()
    }

    async fn produce(&self) -> Result<Document, SourceError> {
        Ok(self.0.clone())
    }
}

/// Node.js bootstrap: accepts `module.exports = {...}`, a factory function, a `default`
/// export of either kind, and promises of any of them; prints the document as JSON.
const NODE_BOOTSTRAP: &str = r#"
const path = require('path');
const run = async () => {
  let m = require(path.resolve(process.argv[1]));
  if (m && typeof m === 'object' && 'default' in m) m = m.default;
  const data = await (typeof m === 'function' ? m() : m);
  process.stdout.write(JSON.stringify(data));
};
run().catch((e) => { console.error(e && e.stack ? e.stack : e); process.exit(1); });
"#;

/// Environment variable overriding the `node` executable used to run seed scripts.
pub const NODE_BINARY_ENV: &str = "NODE_BINARY";

/// `.js` / `.cjs` / `.mjs` seed script executed with Node.js.
pub struct ScriptSeed {
    path: PathBuf,
}

impl ScriptSeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ScriptSeed { path: path.into() }
    }
}

#[async_trait]
impl SeedProvider for ScriptSeed {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    async fn produce(&self) -> Result<Document, SourceError> {
        let name = self.name();
        if !self.path.is_file() {
            return Err(SourceError::invalid(&name, "script not found"));
        }
        let node = std::env::var(NODE_BINARY_ENV).unwrap_or_else(|_| "node".into());
        tracing::debug!(script = %name, node = %node, "running seed script");
        let output = tokio::process::Command::new(&node)
            .arg("-e")
            .arg(NODE_BOOTSTRAP)
            .arg(&self.path)
            .output()
            .await
            .map_err(|e| SourceError::invalid(&name, format!("cannot run {}: {}", node, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::invalid(&name, format!("script failed: {}", stderr.trim())));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        super::file::parse_document(&stdout, &name)
    }
}
