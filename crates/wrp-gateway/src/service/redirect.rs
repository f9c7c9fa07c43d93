//! Key-based HTTP redirect.
//!
//! A caller that knows only a device's routing key is sent to the node that
//! owns the device:
//!
//! | Outcome                    | Status                 | Location                 |
//! |----------------------------|------------------------|--------------------------|
//! | key function fails         | 400 Bad Request        | none                     |
//! | node lookup fails          | 500 Internal Error     | none                     |
//! | node found                 | configured (307)       | `<node><path>[?query]`   |
//!
//! Error bodies are `text/plain` and carry the error text.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tracing::{debug, error, warn};

use crate::service::lookup::{NodeLookup, RedirectKeyFunc};

/// Called with the resolved node URL after each successful redirect.
pub type ResolvedHook = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone)]
pub struct RedirectHandler {
    lookup: Arc<dyn NodeLookup>,
    redirect_status: StatusCode,
    key_func: RedirectKeyFunc,
    on_resolved: Option<ResolvedHook>,
}

impl RedirectHandler {
    pub fn new(
        lookup: Arc<dyn NodeLookup>,
        redirect_status: StatusCode,
        key_func: RedirectKeyFunc,
    ) -> Self {
        Self {
            lookup,
            redirect_status,
            key_func,
            on_resolved: None,
        }
    }

    pub fn on_resolved(mut self, hook: ResolvedHook) -> Self {
        self.on_resolved = Some(hook);
        self
    }

    pub async fn handle(&self, request: Request) -> Response {
        let key = match (self.key_func)(&request) {
            Ok(key) => key,
            Err(e) => {
                debug!("cannot extract redirect key: {e:#}");
                return plain(StatusCode::BAD_REQUEST, format!("{e:#}"));
            }
        };

        let node = match self.lookup.get(&key).await {
            Ok(node) => node,
            Err(e) => {
                warn!(key = %String::from_utf8_lossy(&key), "node lookup failed: {e:#}");
                return plain(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"));
            }
        };

        let path = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let target = format!("{}{}", node.trim_end_matches('/'), path);
        debug!(%target, "redirecting");

        let response = (self.redirect_status, [(header::LOCATION, target)]).into_response();

        if let Some(hook) = &self.on_resolved {
            if catch_unwind(AssertUnwindSafe(|| hook(&node))).is_err() {
                error!(%node, "redirect hook panicked");
            }
        }

        response
    }

    /// A router that sends every request, whatever its method or path, to
    /// this handler.
    pub fn into_router(self) -> Router {
        let handler = Arc::new(self);
        Router::new().fallback(move |request: Request| {
            let handler = Arc::clone(&handler);
            async move { handler.handle(request).await }
        })
    }
}

fn plain(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
