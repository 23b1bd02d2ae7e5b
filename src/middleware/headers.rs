//! Declarative middleware loaded from a JSON file (`-m unit.json`):
//!
//! ```json
//! { "headers": {"X-Hello": "World"}, "methods": ["GET"], "path_prefix": "/posts",
//!   "respond": {"status": 418, "body": {"teapot": true}} }
//! ```
//!
//! Without `respond` the unit adds headers to whatever the chain returns; with it, the
//! chain stops and the given response is sent.

use super::Middleware;
use crate::error::ConfigError;
use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RespondSpec {
    pub status: u16,
    #[serde(default)]
    pub body: Option<Value>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeaderUnitSpec {
    pub headers: BTreeMap<String, String>,
    /// Methods the unit applies to; empty means all.
    pub methods: Vec<String>,
    pub path_prefix: Option<String>,
    pub respond: Option<RespondSpec>,
}

pub struct HeaderUnit {
    name: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    methods: Vec<String>,
    path_prefix: Option<String>,
    respond: Option<(StatusCode, Option<Value>)>,
}

impl HeaderUnit {
    pub fn from_spec(name: impl Into<String>, spec: HeaderUnitSpec) -> Result<Self, ConfigError> {
        let name = name.into();
        let headers = spec
            .headers
            .iter()
            .map(|(k, v)| {
                let header = HeaderName::from_bytes(k.as_bytes())
                    .map_err(|e| ConfigError::Validation(format!("{}: header {}: {}", name, k, e)))?;
                let value = HeaderValue::from_str(v)
                    .map_err(|e| ConfigError::Validation(format!("{}: header {}: {}", name, k, e)))?;
                Ok((header, value))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        let respond = match spec.respond {
            Some(r) => Some((
                StatusCode::from_u16(r.status)
                    .map_err(|e| ConfigError::Validation(format!("{}: status {}: {}", name, r.status, e)))?,
                r.body,
            )),
            None => None,
        };
        Ok(HeaderUnit {
            name,
            headers,
            methods: spec.methods.iter().map(|m| m.to_uppercase()).collect(),
            path_prefix: spec.path_prefix,
            respond,
        })
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        let spec: HeaderUnitSpec =
            serde_json::from_str(&text).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        Self::from_spec(path.display().to_string(), spec)
    }

    fn applies_to(&self, req: &Request) -> bool {
        let method_ok = self.methods.is_empty() || self.methods.iter().any(|m| m == req.method().as_str());
        let path_ok = self
            .path_prefix
            .as_deref()
            .map(|p| req.uri().path().starts_with(p))
            .unwrap_or(true);
        method_ok && path_ok
    }

    fn stamp(&self, res: &mut Response) {
        for (k, v) in &self.headers {
            res.headers_mut().insert(k.clone(), v.clone());
        }
    }
}

#[async_trait]
impl Middleware for HeaderUnit {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn handle(&self, req: Request, next: Next) -> Response {
        if !self.applies_to(&req) {
            return next.run(req).await;
        }
        let mut res = match &self.respond {
            Some((status, Some(body))) => (*status, Json(body.clone())).into_response(),
            Some((status, None)) => (*status).into_response(),
            None => next.run(req).await,
        };
        self.stamp(&mut res);
        res
    }
}
