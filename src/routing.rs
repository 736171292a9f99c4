//! Route declarations: a small tree of routes and nested mounts that can be
//! registered with actix and walked by the OpenAPI generator.
//!
//! Registration is method-agnostic (`web::route()`): the endpoint pipeline
//! owns method dispatch so the 405 policy stays in one place.

use crate::endpoint::Endpoint;
use actix_web::{HttpRequest, web};
use std::sync::Arc;

/// One path served by an endpoint declaration.
pub struct Route {
    path: String,
    endpoint: Arc<Endpoint>,
    include_in_schema: bool,
}

impl Route {
    pub fn new(path: impl Into<String>, endpoint: Arc<Endpoint>) -> Self {
        Self {
            path: path.into(),
            endpoint,
            include_in_schema: true,
        }
    }

    /// Keep the route out of the generated documentation. It is still
    /// registered and served.
    pub fn exclude_from_schema(mut self) -> Self {
        self.include_in_schema = false;
        self
    }
}

/// A path prefix with nested entries.
pub struct Mount {
    path: String,
    entries: Vec<RouteEntry>,
}

enum RouteEntry {
    Route(Route),
    Mount(Mount),
}

/// The declared route tree.
#[derive(Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

/// Documentation view of one (path, method) pair: the flattened full path,
/// the lowercase HTTP method, and the owning endpoint declaration. Built
/// transiently during generation, never persisted.
pub struct EndpointInfo {
    pub path: String,
    /// Lowercase method name as it appears in the document.
    pub method: &'static str,
    /// The same method, typed, for operation lookups.
    pub http_method: actix_web::http::Method,
    pub endpoint: Arc<Endpoint>,
}

/// Methods the documentation walk considers, in emission order. HEAD is
/// deliberately absent: it aliases to GET at runtime and is not documented.
const DOCUMENTED_METHODS: [(&str, actix_web::http::Method); 6] = [
    ("get", actix_web::http::Method::GET),
    ("post", actix_web::http::Method::POST),
    ("put", actix_web::http::Method::PUT),
    ("patch", actix_web::http::Method::PATCH),
    ("delete", actix_web::http::Method::DELETE),
    ("options", actix_web::http::Method::OPTIONS),
];

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, route: Route) -> Self {
        self.entries.push(RouteEntry::Route(route));
        self
    }

    /// Nest another table under a path prefix.
    pub fn mount(mut self, path: impl Into<String>, table: RouteTable) -> Self {
        self.entries.push(RouteEntry::Mount(Mount {
            path: path.into(),
            entries: table.entries,
        }));
        self
    }

    /// Register every flattened path with actix. Hidden routes are
    /// registered too; visibility only affects documentation.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        for (path, endpoint) in self.collect() {
            let shared = Arc::clone(&endpoint);
            cfg.route(
                &path,
                web::route().to(move |req: HttpRequest, body: web::Bytes| {
                    let endpoint = Arc::clone(&shared);
                    async move { endpoint.serve(req, body).await }
                }),
            );
        }
    }

    /// The documentation view: one entry per declared (path, method) pair,
    /// prefixes concatenated, hidden routes skipped.
    pub fn flatten(&self) -> Vec<EndpointInfo> {
        let mut info = Vec::new();
        flatten_into(&self.entries, "", &mut info);
        info
    }

    fn collect(&self) -> Vec<(String, Arc<Endpoint>)> {
        let mut paths = Vec::new();
        collect_into(&self.entries, "", &mut paths);
        paths
    }
}

fn collect_into(entries: &[RouteEntry], prefix: &str, out: &mut Vec<(String, Arc<Endpoint>)>) {
    for entry in entries {
        match entry {
            RouteEntry::Route(route) => {
                out.push((format!("{prefix}{}", route.path), Arc::clone(&route.endpoint)));
            }
            RouteEntry::Mount(mount) => {
                collect_into(&mount.entries, &format!("{prefix}{}", mount.path), out);
            }
        }
    }
}

fn flatten_into(entries: &[RouteEntry], prefix: &str, out: &mut Vec<EndpointInfo>) {
    for entry in entries {
        match entry {
            RouteEntry::Route(route) => {
                if !route.include_in_schema {
                    continue;
                }
                let path = format!("{prefix}{}", route.path);
                for (name, method) in &DOCUMENTED_METHODS {
                    if route.endpoint.operation(method).is_some() {
                        out.push(EndpointInfo {
                            path: path.clone(),
                            method: *name,
                            http_method: method.clone(),
                            endpoint: Arc::clone(&route.endpoint),
                        });
                    }
                }
            }
            RouteEntry::Mount(mount) => {
                flatten_into(&mount.entries, &format!("{prefix}{}", mount.path), out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{Handler, Operation};
    use crate::schema::{FieldSet, SchemaBackend};
    use pretty_assertions::assert_eq;

    fn stub_endpoint() -> Arc<Endpoint> {
        let schema = SchemaBackend::Fieldwise
            .adapter(FieldSet::builder("Stub").integer("id").build())
            .expect("adapter");
        Endpoint::builder()
            .get(Operation::new(
                Arc::clone(&schema),
                Arc::clone(&schema),
                Handler::asynchronous(|payload| async move { Ok(Some(payload)) }),
            ))
            .delete(Operation::new(
                Arc::clone(&schema),
                schema,
                Handler::blocking(|_| Ok(None)),
            ))
            .build()
    }

    #[test]
    fn flatten_concatenates_mount_prefixes() {
        let table = RouteTable::new().mount(
            "/api",
            RouteTable::new()
                .mount(
                    "/v1",
                    RouteTable::new().route(Route::new("/items/{id}", stub_endpoint())),
                ),
        );
        let info = table.flatten();
        assert_eq!(info.len(), 2);
        assert_eq!(info[0].path, "/api/v1/items/{id}");
        assert_eq!(info[0].method, "get");
        assert_eq!(info[1].method, "delete");
    }

    #[test]
    fn hidden_routes_are_not_documented_but_still_collected() {
        let table = RouteTable::new()
            .route(Route::new("/visible", stub_endpoint()))
            .route(Route::new("/hidden", stub_endpoint()).exclude_from_schema());

        let info = table.flatten();
        let documented: Vec<&str> = info.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(documented, ["/visible", "/visible"]);

        let registered: Vec<String> = table.collect().into_iter().map(|(p, _)| p).collect();
        assert_eq!(registered, ["/visible", "/hidden"]);
    }
}
