use crate::config::{CascadeMode, ServerConfig};
use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "json-mock-server", version)]
#[command(about = "Full fake REST API from a JSON file, URL or seed script", long_about = None)]
pub struct Cli {
    /// JSON file, http(s) URL, or .js seed script
    #[arg(default_value = "db.json")]
    pub source: String,

    #[arg(short, long)]
    pub port: Option<u16>,

    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// JSON file of route rewrite rules
    #[arg(short, long)]
    pub routes: Option<PathBuf>,

    /// Middleware definition files, applied in order
    #[arg(short, long, num_args = 1..)]
    pub middlewares: Vec<PathBuf>,

    /// Identifier field of every record
    #[arg(short, long)]
    pub id: Option<String>,

    #[arg(long = "foreign-key-suffix", visible_alias = "foreignKeySuffix")]
    pub foreign_key_suffix: Option<String>,

    /// Reject every request except GET, HEAD and OPTIONS
    #[arg(long = "read-only", visible_alias = "ro")]
    pub read_only: bool,

    /// Delay every response by this many milliseconds
    #[arg(short, long)]
    pub delay: Option<u64>,

    /// Directory of static files
    #[arg(short = 's', long = "static")]
    pub static_dir: Option<PathBuf>,

    /// Directory snapshots are written to
    #[arg(short = 'S', long)]
    pub snapshots: Option<PathBuf>,

    /// Reload the source file and routes file when they change
    #[arg(short, long)]
    pub watch: bool,

    /// Disable CORS; also accepts `--no-cors=true|false`
    #[arg(long, num_args = 0..=1, require_equals = true, default_value_t = false, default_missing_value = "true", action = ArgAction::Set)]
    pub no_cors: bool,

    /// Disable gzip; also accepts `--no-gzip=true|false`
    #[arg(long, num_args = 0..=1, require_equals = true, default_value_t = false, default_missing_value = "true", action = ArgAction::Set)]
    pub no_gzip: bool,

    /// off, direct or transitive
    #[arg(long)]
    pub cascade: Option<CascadeMode>,

    /// JSON options file; command-line flags take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if self.routes.is_some() {
            config.routes = self.routes.clone();
        }
        if !self.middlewares.is_empty() {
            config.middlewares = self.middlewares.clone();
        }
        if let Some(id) = &self.id {
            config.resource.id_field = id.clone();
        }
        if let Some(suffix) = &self.foreign_key_suffix {
            config.resource.foreign_key_suffix = suffix.clone();
        }
        if let Some(cascade) = self.cascade {
            config.resource.cascade = cascade;
        }
        if self.delay.is_some() {
            config.delay = self.delay;
        }
        if self.static_dir.is_some() {
            config.static_dir = self.static_dir.clone();
        }
        if let Some(dir) = &self.snapshots {
            config.snapshots = dir.clone();
        }
        config.read_only |= self.read_only;
        config.watch |= self.watch;
        if self.no_cors {
            config.cors = false;
        }
        if self.no_gzip {
            config.gzip = false;
        }
    }
}
