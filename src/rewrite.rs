//! Declarative path rewriting: `{"/blog/*": "/$1", "/u/:id": "/users/:id"}`.
//! Rules are tried in declaration order; the first match wins; unmatched paths pass through.

use crate::error::ConfigError;
use axum::{
    extract::{Request, State},
    http::Uri,
    middleware::Next,
    response::Response,
};
use regex::Regex;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Clone, Debug)]
struct CompiledRule {
    pattern: String,
    replacement: String,
    regex: Regex,
    names: Vec<String>,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn compile_pattern(pattern: &str) -> Result<(Regex, Vec<String>), ConfigError> {
    let invalid = |e: regex::Error| ConfigError::Validation(format!("route {}: {}", pattern, e));
    // Raw regular expressions are accepted as-is.
    if pattern.starts_with('^') {
        let regex = Regex::new(pattern).map_err(invalid)?;
        let names = regex.capture_names().flatten().map(String::from).collect();
        return Ok((regex, names));
    }
    let mut source = String::from("^");
    let mut names = Vec::new();
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => source.push_str("(.+)"),
            ':' if chars.peek().map(|c| is_name_char(*c)).unwrap_or(false) => {
                let mut name = String::new();
                while let Some(&n) = chars.peek() {
                    if !is_name_char(n) {
                        break;
                    }
                    name.push(n);
                    chars.next();
                }
                source.push_str(&format!("(?P<{}>[^/]+)", name));
                names.push(name);
            }
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push_str("/?$");
    let regex = Regex::new(&source).map_err(invalid)?;
    Ok((regex, names))
}

impl CompiledRule {
    fn apply(&self, path: &str) -> Option<String> {
        let caps = self.regex.captures(path)?;
        let mut out = String::with_capacity(self.replacement.len() + path.len());
        let mut chars = self.replacement.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '$' if chars.peek().map(char::is_ascii_digit).unwrap_or(false) => {
                    let mut digits = String::new();
                    while let Some(&d) = chars.peek() {
                        if !d.is_ascii_digit() {
                            break;
                        }
                        digits.push(d);
                        chars.next();
                    }
                    let index: usize = digits.parse().unwrap_or(0);
                    out.push_str(caps.get(index).map(|m| m.as_str()).unwrap_or(""));
                }
                ':' if chars.peek().map(|c| is_name_char(*c)).unwrap_or(false) => {
                    let mut name = String::new();
                    while let Some(&n) = chars.peek() {
                        if !is_name_char(n) {
                            break;
                        }
                        name.push(n);
                        chars.next();
                    }
                    match caps.name(&name) {
                        Some(m) if self.names.contains(&name) => out.push_str(m.as_str()),
                        _ => {
                            out.push(':');
                            out.push_str(&name);
                        }
                    }
                }
                other => out.push(other),
            }
        }
        Some(out)
    }
}

/// Compiled rule table.
#[derive(Clone, Debug, Default)]
pub struct RouteRewriter {
    rules: Vec<CompiledRule>,
}

impl RouteRewriter {
    pub fn compile(rules: &[(String, String)]) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .map(|(pattern, replacement)| {
                let (regex, names) = compile_pattern(pattern)?;
                Ok(CompiledRule {
                    pattern: pattern.clone(),
                    replacement: replacement.clone(),
                    regex,
                    names,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(RouteRewriter { rules })
    }

    pub fn rules(&self) -> Vec<(String, String)> {
        self.rules
            .iter()
            .map(|r| (r.pattern.clone(), r.replacement.clone()))
            .collect()
    }

    /// Rewritten path-and-query, or `None` when no rule matches.
    /// A query string produced by the replacement is merged with the original one.
    pub fn rewrite(&self, path_and_query: &str) -> Option<String> {
        let (path, query) = match path_and_query.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path_and_query, None),
        };
        let target = self.rules.iter().find_map(|rule| rule.apply(path))?;
        Some(match (query, target.contains('?')) {
            (None, _) => target,
            (Some(q), true) => format!("{}&{}", target, q),
            (Some(q), false) => format!("{}?{}", target, q),
        })
    }
}

/// Rule table shared between the request path and the routes-file watcher.
#[derive(Clone, Default)]
pub struct SharedRewriter {
    inner: Arc<RwLock<Arc<RouteRewriter>>>,
}

impl SharedRewriter {
    pub fn new(rewriter: RouteRewriter) -> Self {
        SharedRewriter {
            inner: Arc::new(RwLock::new(Arc::new(rewriter))),
        }
    }

    pub fn current(&self) -> Arc<RouteRewriter> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn replace(&self, rewriter: RouteRewriter) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(rewriter);
    }
}

/// Outermost middleware: rewrites the request URI before any routing happens.
pub async fn rewrite_uri(State(rewriter): State<SharedRewriter>, mut req: Request, next: Next) -> Response {
    let original = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    if let Some(target) = rewriter.current().rewrite(&original) {
        match target.parse::<Uri>() {
            Ok(uri) => {
                tracing::debug!(from = %original, to = %target, "rewrite");
                *req.uri_mut() = uri;
            }
            Err(e) => tracing::warn!(from = %original, to = %target, error = %e, "rewrite produced an invalid URI"),
        }
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewriter(rules: &[(&str, &str)]) -> RouteRewriter {
        let rules: Vec<(String, String)> = rules.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect();
        RouteRewriter::compile(&rules).unwrap()
    }

    #[test]
    fn wildcard_captures_remaining_segments() {
        let r = rewriter(&[("/blog/*", "/$1")]);
        assert_eq!(r.rewrite("/blog/posts/2").as_deref(), Some("/posts/2"));
        assert_eq!(r.rewrite("/blog/posts").as_deref(), Some("/posts"));
        assert_eq!(r.rewrite("/posts/2"), None);
    }

    #[test]
    fn named_segments_substitute_by_name_and_position() {
        let r = rewriter(&[("/articles/:category/:id", "/posts/:id?category=:category"), ("/u/:id", "/users/$1")]);
        assert_eq!(r.rewrite("/articles/rust/3").as_deref(), Some("/posts/3?category=rust"));
        assert_eq!(r.rewrite("/u/7").as_deref(), Some("/users/7"));
    }

    #[test]
    fn first_matching_rule_wins() {
        let r = rewriter(&[("/api/*", "/$1"), ("/api/posts", "/never")]);
        assert_eq!(r.rewrite("/api/posts").as_deref(), Some("/posts"));
    }

    #[test]
    fn query_strings_are_preserved_and_merged() {
        let r = rewriter(&[("/api/*", "/$1"), ("/cat/:c", "/posts?category=:c")]);
        assert_eq!(r.rewrite("/api/posts?_page=2").as_deref(), Some("/posts?_page=2"));
        assert_eq!(r.rewrite("/cat/rust?_limit=1").as_deref(), Some("/posts?category=rust&_limit=1"));
    }

    #[test]
    fn literal_characters_are_escaped() {
        let r = rewriter(&[("/a.b", "/c")]);
        assert_eq!(r.rewrite("/a.b").as_deref(), Some("/c"));
        assert_eq!(r.rewrite("/axb"), None);
    }

    #[test]
    fn shared_table_swaps_atomically() {
        let shared = SharedRewriter::new(rewriter(&[("/blog/*", "/$1")]));
        let before = shared.current();
        shared.replace(rewriter(&[("/api/*", "/$1")]));
        assert!(before.rewrite("/blog/x").is_some());
        assert!(shared.current().rewrite("/blog/x").is_none());
        assert!(shared.current().rewrite("/api/x").is_some());
    }
}
