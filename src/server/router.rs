//! Exact-match routing table.

use std::collections::HashMap;
use std::sync::Arc;

use crate::protocol::status::NOT_FOUND;
use crate::protocol::{Method, Request, Response};

/// Something that turns a request into a response.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request) -> Response;
}

impl<F> Handler for F
where
    F: Fn(Request) -> Response + Send + Sync + 'static,
{
    fn call(&self, req: Request) -> Response {
        self(req)
    }
}

/// Maps path, then method, to a handler.
#[derive(Default, Clone)]
pub struct Router {
    routes: HashMap<String, HashMap<Method, Arc<dyn Handler>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` on `path`, replacing any previous one.
    pub fn route(&mut self, path: impl Into<String>, method: Method, handler: impl Handler) {
        let path = path.into();
        tracing::info!(method = %method, path = %path, "Registered handler");
        self.routes
            .entry(path)
            .or_default()
            .insert(method, Arc::new(handler));
    }

    pub fn lookup(&self, path: &str, method: Method) -> Option<&Arc<dyn Handler>> {
        self.routes.get(path)?.get(&method)
    }

    /// Run the matching handler, or answer 404.
    pub fn dispatch(&self, req: Request) -> Response {
        match self.lookup(&req.path, req.method) {
            Some(handler) => handler.call(req),
            None => {
                tracing::debug!(method = %req.method, path = %req.path, "No route");
                Response::text(NOT_FOUND, "Not Found")
            }
        }
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
