//! Service registration.
//!
//! # Responsibilities
//! - Hold the caller's registration callbacks in order
//! - Apply them, once each, to an unstarted server's dispatch table
//!
//! # Design Decisions
//! - Registrations run synchronously, before the listener is bound
//! - When two registrations claim the same path the first one is kept

use std::fmt;

use axum::routing::MethodRouter;
use axum::Router;

/// A callback that attaches one service to an unstarted server.
pub type Registration = Box<dyn FnOnce(&mut ServiceRegistrar) + Send>;

/// Ordered list of registrations applied at server construction.
#[derive(Default)]
pub struct ServiceRegistry {
    registrations: Vec<Registration>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a registration. Registrations are applied in the order added.
    pub fn register<F>(mut self, registration: F) -> Self
    where
        F: FnOnce(&mut ServiceRegistrar) + Send + 'static,
    {
        self.push(registration);
        self
    }

    pub fn push<F>(&mut self, registration: F)
    where
        F: FnOnce(&mut ServiceRegistrar) + Send + 'static,
    {
        self.registrations.push(Box::new(registration));
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Run every registration, in order, against a fresh registrar.
    pub fn apply(self) -> ServiceRegistrar {
        let mut registrar = ServiceRegistrar::default();
        for registration in self.registrations {
            registration(&mut registrar);
        }
        tracing::debug!(routes = registrar.routes.len(), "Services registered");
        registrar
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("registrations", &self.registrations.len())
            .finish()
    }
}

impl<F> FromIterator<F> for ServiceRegistry
where
    F: FnOnce(&mut ServiceRegistrar) + Send + 'static,
{
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        let mut registry = Self::new();
        for registration in iter {
            registry.push(registration);
        }
        registry
    }
}

/// Handle to an unstarted server's dispatch table.
#[derive(Default)]
pub struct ServiceRegistrar {
    routes: Vec<(String, MethodRouter)>,
}

impl ServiceRegistrar {
    /// Attach a handler set at `path`.
    ///
    /// A path that is already registered keeps its first handler; invalid
    /// paths (not starting with `/`) are skipped.
    pub fn route(&mut self, path: &str, handler: MethodRouter) -> &mut Self {
        if !path.starts_with('/') {
            tracing::error!(path, "Route paths must start with '/'; skipping registration");
            return self;
        }
        if self.is_registered(path) {
            tracing::warn!(path, "Path already registered; keeping the first registration");
            return self;
        }
        self.routes.push((path.to_string(), handler));
        self
    }

    pub fn is_registered(&self, path: &str) -> bool {
        self.routes.iter().any(|(existing, _)| existing == path)
    }

    /// Registered paths, in registration order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(path, _)| path.as_str())
    }

    pub(crate) fn into_router(self) -> Router {
        self.routes
            .into_iter()
            .fold(Router::new(), |router, (path, handler)| router.route(&path, handler))
    }
}

impl fmt::Debug for ServiceRegistrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.paths()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    #[test]
    fn registrations_apply_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (first, second) = (Arc::clone(&order), Arc::clone(&order));

        let registrar = ServiceRegistry::new()
            .register(move |server| {
                first.lock().unwrap().push("first");
                server.route("/a", get(|| async { "a" }));
            })
            .register(move |server| {
                second.lock().unwrap().push("second");
                server.route("/b", get(|| async { "b" }));
            })
            .apply();

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(registrar.paths().collect::<Vec<_>>(), vec!["/a", "/b"]);
    }

    #[tokio::test]
    async fn first_registration_wins_a_path_conflict() {
        let registrations: [fn(&mut ServiceRegistrar); 2] = [
            |server| {
                server.route("/svc", get(|| async { "first" }));
            },
            |server| {
                server.route("/svc", get(|| async { "second" }));
            },
        ];
        let registrar = ServiceRegistry::from_iter(registrations).apply();

        let response = registrar
            .into_router()
            .oneshot(Request::get("/svc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"first");
    }

    #[test]
    fn relative_paths_are_skipped() {
        let mut registrar = ServiceRegistrar::default();
        registrar.route("no-slash", get(|| async { "x" }));
        assert_eq!(registrar.paths().count(), 0);
    }

    #[test]
    fn empty_registry() {
        let registry = ServiceRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.apply().paths().count(), 0);
    }
}
