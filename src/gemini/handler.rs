use std::sync::Arc;

use async_trait::async_trait;

use crate::gemini::request::Request;
use crate::gemini::response::Response;
use crate::gemini::status::Status;

/// Anything that can answer a request.
///
/// Handlers report failures through the response status; a write error
/// means the client is gone and is only worth a log line.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn serve(&self, response: &mut Response<'_>, request: &Request);
}

/// Dispatches requests to handlers by path prefix.
///
/// Routes are wired up front with [`Router::route`]. The longest prefix that
/// matches on a segment boundary wins, so `/cgi-bin` serves `/cgi-bin` and
/// `/cgi-bin/hello` but not `/cgi-binary`.
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<(String, Arc<dyn Handler>)>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the handler for `prefix`.
    pub fn route(mut self, prefix: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        let prefix = normalize_prefix(prefix.into());
        self.routes.retain(|(existing, _)| *existing != prefix);
        self.routes.push((prefix, handler));
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Finds the handler for a URL path.
    pub fn resolve(&self, path: &str) -> Option<&Arc<dyn Handler>> {
        let path = if path.is_empty() { "/" } else { path };

        self.routes
            .iter()
            .filter(|(prefix, _)| prefix_matches(prefix, path))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, handler)| handler)
    }
}

#[async_trait]
impl Handler for Router {
    async fn serve(&self, response: &mut Response<'_>, request: &Request) {
        match self.resolve(request.path()) {
            Some(handler) => handler.serve(response, request).await,
            None => {
                if let Err(e) = response.set_status(Status::NotFound, "Not found").await {
                    tracing::debug!(error = %e, "failed to send not-found status");
                }
            }
        }
    }
}

fn normalize_prefix(prefix: String) -> String {
    if prefix.is_empty() {
        return "/".to_string();
    }
    if !prefix.starts_with('/') {
        return format!("/{prefix}");
    }
    if prefix.len() > 1 && prefix.ends_with('/') {
        return prefix.trim_end_matches('/').to_string();
    }
    prefix
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
