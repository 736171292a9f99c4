//! The endpoint pipeline.
//!
//! An [`Endpoint`] is an immutable, declaration-time table of HTTP method →
//! [`Operation`]. Each operation carries its request and response schema
//! adapters, its handler, an optional validation hook, optional
//! documentation text, and an optional background-task factory. The
//! pipeline drives one fixed lifecycle per request:
//!
//! payload acquisition → flattening → schema load → hook → dispatch →
//! background collection → response shaping → emission.
//!
//! Handled failures ([`ApiError`]) become structured JSON responses;
//! everything else escapes to actix's default 500 handling on purpose.

use crate::error::{ApiError, ErrorKind, HandlerError};
use crate::schema::{SchemaAdapter, ValidationFailure};
use actix_web::http::{Method, header};
use actix_web::{HttpMessage, HttpRequest, HttpResponse, ResponseError, web};
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error};

/// What a handler returns: an optional response payload or a failure.
pub type HandlerResult = Result<Option<Value>, HandlerError>;

/// Deferred post-response work.
pub type BackgroundJob = BoxFuture<'static, ()>;

type AsyncHandlerFn = dyn Fn(Value) -> BoxFuture<'static, HandlerResult> + Send + Sync;
type BlockingHandlerFn = dyn Fn(Value) -> HandlerResult + Send + Sync;
type AsyncHookFn = dyn Fn(Value) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync;
type BlockingHookFn = dyn Fn(Value) -> Result<(), HandlerError> + Send + Sync;
type BackgroundFn = dyn Fn(&Value, Option<&Value>) -> Vec<BackgroundJob> + Send + Sync;

/// Resource-specific logic for one HTTP method.
///
/// Blocking handlers are offloaded to actix's worker-thread pool and
/// awaited, so a caller cannot tell the two kinds apart.
#[derive(Clone)]
pub enum Handler {
    Async(Arc<AsyncHandlerFn>),
    Blocking(Arc<BlockingHandlerFn>),
}

impl Handler {
    /// Wrap an async function as a handler.
    pub fn asynchronous<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::Async(Arc::new(move |payload| Box::pin(f(payload))))
    }

    /// Wrap an ordinary blocking function as a handler.
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(Value) -> HandlerResult + Send + Sync + 'static,
    {
        Self::Blocking(Arc::new(f))
    }

    async fn invoke(&self, payload: Value) -> Result<Option<Value>, PipelineError> {
        match self {
            Self::Async(f) => f(payload).await.map_err(PipelineError::from_handler),
            Self::Blocking(f) => {
                let f = Arc::clone(f);
                web::block(move || f(payload))
                    .await
                    .map_err(|_| PipelineError::Internal(InternalError::WorkerPool))?
                    .map_err(PipelineError::from_handler)
            }
        }
    }
}

/// Per-method validation hook, run after schema validation and before
/// dispatch. May raise any exception-model failure.
#[derive(Clone)]
pub enum Hook {
    Async(Arc<AsyncHookFn>),
    Blocking(Arc<BlockingHookFn>),
}

impl Hook {
    pub fn asynchronous<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Self::Async(Arc::new(move |payload| Box::pin(f(payload))))
    }

    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Self::Blocking(Arc::new(f))
    }

    async fn invoke(&self, payload: Value) -> Result<(), PipelineError> {
        match self {
            Self::Async(f) => f(payload).await.map_err(PipelineError::from_handler),
            Self::Blocking(f) => {
                let f = Arc::clone(f);
                web::block(move || f(payload))
                    .await
                    .map_err(|_| PipelineError::Internal(InternalError::WorkerPool))?
                    .map_err(PipelineError::from_handler)
            }
        }
    }
}

/// Everything the pipeline needs to serve one HTTP method.
pub struct Operation {
    request_schema: Arc<dyn SchemaAdapter>,
    response_schema: Arc<dyn SchemaAdapter>,
    handler: Handler,
    hook: Option<Hook>,
    doc: Option<String>,
    background: Option<Arc<BackgroundFn>>,
}

impl Operation {
    pub fn new(
        request_schema: Arc<dyn SchemaAdapter>,
        response_schema: Arc<dyn SchemaAdapter>,
        handler: Handler,
    ) -> Self {
        Self {
            request_schema,
            response_schema,
            handler,
            hook: None,
            doc: None,
            background: None,
        }
    }

    /// Attach documentation text. Prose, optionally followed by a final
    /// `---`-separated YAML block picked up by the OpenAPI generator.
    pub fn doc(mut self, text: impl Into<String>) -> Self {
        self.doc = Some(text.into());
        self
    }

    /// Attach a validation hook.
    pub fn validate(mut self, hook: Hook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Attach a background-task factory, called with the validated payload
    /// and the raw handler response once the handler has finished. The
    /// returned jobs are spawned after the success response is produced.
    pub fn background<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, Option<&Value>) -> Vec<BackgroundJob> + Send + Sync + 'static,
    {
        self.background = Some(Arc::new(f));
        self
    }

    /// Request schema documentation fragment.
    pub fn request_fragment(&self) -> Value {
        self.request_schema.fragment()
    }

    /// Response schema documentation fragment.
    pub fn response_fragment(&self) -> Value {
        self.response_schema.fragment()
    }

    /// Raw documentation text, if any.
    pub fn doc_text(&self) -> Option<&str> {
        self.doc.as_deref()
    }
}

/// Failures internal to the pipeline. Deliberately outside the handled
/// contract; they surface as an unstructured 500.
#[derive(Debug, thiserror::Error)]
pub enum InternalError {
    #[error("response payload rejected by the response schema: {0}")]
    ResponseContract(#[source] ValidationFailure),
    #[error("worker pool failed to run blocking call")]
    WorkerPool,
    #[error("handler failure: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("handler for {0} returned no payload")]
    MissingPayload(Method),
}

enum PipelineError {
    Api(ApiError),
    Internal(InternalError),
}

impl PipelineError {
    fn from_handler(error: HandlerError) -> Self {
        match error {
            HandlerError::Api(api) => Self::Api(api),
            HandlerError::Internal(inner) => Self::Internal(InternalError::Handler(inner)),
        }
    }
}

/// Immutable endpoint declaration: method table, documented-error table,
/// response media type. Built once at startup and shared by reference.
pub struct Endpoint {
    operations: HashMap<Method, Operation>,
    error_docs: Vec<(u16, ErrorKind)>,
    media_type: &'static str,
}

impl Endpoint {
    pub fn builder() -> EndpointBuilder {
        EndpointBuilder {
            operations: HashMap::new(),
            error_docs: vec![(422, ErrorKind::InvalidRequest)],
            media_type: "application/json",
        }
    }

    /// Declared operation for a method, if any.
    pub fn operation(&self, method: &Method) -> Option<&Operation> {
        self.operations.get(method)
    }

    /// Status-code → error-kind table consumed by the OpenAPI generator.
    /// Documentation metadata only; the runtime catch is by type.
    pub fn error_docs(&self) -> &[(u16, ErrorKind)] {
        &self.error_docs
    }

    /// Media type used for success and failure bodies.
    pub fn media_type(&self) -> &'static str {
        self.media_type
    }

    /// Serve one request. Returns `Err` only for failures outside the
    /// handled contract, which actix turns into its default 500.
    pub async fn serve(
        &self,
        req: HttpRequest,
        body: web::Bytes,
    ) -> Result<HttpResponse, actix_web::Error> {
        let method = resolve_method(req.method());
        let Some(operation) = self.operations.get(&method) else {
            // Before any validation: an undeclared method is always 405.
            return Ok(self.method_not_allowed());
        };

        match self.perform(operation, &method, &req, &body).await {
            Ok(response) => Ok(response),
            Err(PipelineError::Api(failure)) => {
                debug!(
                    method = %method,
                    path = %req.path(),
                    status = failure.status_code().as_u16(),
                    "request failed: {failure}"
                );
                Ok(failure.error_response())
            }
            Err(PipelineError::Internal(failure)) => {
                error!(method = %method, path = %req.path(), "pipeline failure: {failure}");
                Err(actix_web::error::ErrorInternalServerError(failure))
            }
        }
    }

    async fn perform(
        &self,
        operation: &Operation,
        method: &Method,
        req: &HttpRequest,
        body: &web::Bytes,
    ) -> Result<HttpResponse, PipelineError> {
        let raw = shape_request_data(method, req, body);
        let payload = operation
            .request_schema
            .load(&Value::Object(raw))
            .map_err(|failure| PipelineError::Api(ApiError::invalid_request(failure.into_errors())))?;

        if let Some(hook) = &operation.hook {
            hook.invoke(payload.clone()).await?;
        }

        let raw_response = operation.handler.invoke(payload.clone()).await?;

        let jobs = operation
            .background
            .as_ref()
            .map(|collect| collect(&payload, raw_response.as_ref()))
            .unwrap_or_default();

        let response = match raw_response {
            // DELETE returning nothing is the empty-204 convention and
            // bypasses serialization entirely.
            None if *method == Method::DELETE => HttpResponse::NoContent().finish(),
            None => {
                return Err(PipelineError::Internal(InternalError::MissingPayload(
                    method.clone(),
                )));
            }
            Some(value) => {
                let dumped = operation.response_schema.dump(&value).map_err(|failure| {
                    PipelineError::Internal(InternalError::ResponseContract(failure))
                })?;
                HttpResponse::Ok().json(dumped)
            }
        };

        for job in jobs {
            actix_web::rt::spawn(job);
        }
        Ok(response)
    }

    fn method_not_allowed(&self) -> HttpResponse {
        HttpResponse::MethodNotAllowed()
            .insert_header((header::ALLOW, self.allowed_methods()))
            .finish()
    }

    fn allowed_methods(&self) -> String {
        let order = [
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ];
        let mut names: Vec<&str> = order
            .iter()
            .filter(|method| self.operations.contains_key(method))
            .map(Method::as_str)
            .collect();
        if self.operations.contains_key(&Method::GET) {
            names.push("HEAD");
        }
        names.join(", ")
    }
}

/// Builder for [`Endpoint`]. The documented-error table starts with the
/// 422 entry every schema-validated endpoint shares.
pub struct EndpointBuilder {
    operations: HashMap<Method, Operation>,
    error_docs: Vec<(u16, ErrorKind)>,
    media_type: &'static str,
}

impl EndpointBuilder {
    /// Declare an operation for an arbitrary method.
    pub fn operation(mut self, method: Method, operation: Operation) -> Self {
        self.operations.insert(method, operation);
        self
    }

    pub fn get(self, operation: Operation) -> Self {
        self.operation(Method::GET, operation)
    }

    pub fn post(self, operation: Operation) -> Self {
        self.operation(Method::POST, operation)
    }

    pub fn put(self, operation: Operation) -> Self {
        self.operation(Method::PUT, operation)
    }

    pub fn patch(self, operation: Operation) -> Self {
        self.operation(Method::PATCH, operation)
    }

    pub fn delete(self, operation: Operation) -> Self {
        self.operation(Method::DELETE, operation)
    }

    /// Register an error kind under a status code for documentation.
    pub fn document_error(mut self, status: u16, kind: ErrorKind) -> Self {
        self.error_docs.push((status, kind));
        self
    }

    pub fn build(self) -> Arc<Endpoint> {
        Arc::new(Endpoint {
            operations: self.operations,
            error_docs: self.error_docs,
            media_type: self.media_type,
        })
    }
}

/// HEAD is served by the GET operation.
fn resolve_method(method: &Method) -> Method {
    if *method == Method::HEAD {
        Method::GET
    } else {
        method.clone()
    }
}

/// Acquire and flatten the request payload sections: path parameters,
/// query parameters, and (for body-bearing methods) JSON and form bodies.
/// Later sections silently overwrite earlier keys; there is no collision
/// detection.
fn shape_request_data(method: &Method, req: &HttpRequest, body: &web::Bytes) -> Map<String, Value> {
    let mut sections: Vec<Map<String, Value>> = Vec::with_capacity(4);

    let mut path_params = Map::new();
    for (name, value) in req.match_info().iter() {
        path_params.insert(name.to_owned(), Value::String(value.to_owned()));
    }
    sections.push(path_params);

    let mut query_params = Map::new();
    match serde_urlencoded::from_str::<Vec<(String, String)>>(req.query_string()) {
        Ok(pairs) => {
            // Last duplicate wins.
            for (key, value) in pairs {
                query_params.insert(key, Value::String(value));
            }
        }
        Err(parse_error) => debug!(%parse_error, "ignoring unparseable query string"),
    }
    sections.push(query_params);

    if matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
        sections.push(json_section(body));
        sections.push(form_section(req, body));
    }

    flatten_sections(sections)
}

/// Parse the body as a JSON mapping. Parse failures and non-mapping bodies
/// collapse into an empty section rather than surfacing to the client.
fn json_section(body: &web::Bytes) -> Map<String, Value> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            if !body.is_empty() {
                debug!("discarding body that is not a JSON mapping");
            }
            Map::new()
        }
    }
}

fn form_section(req: &HttpRequest, body: &web::Bytes) -> Map<String, Value> {
    if req.content_type() != "application/x-www-form-urlencoded" {
        return Map::new();
    }
    let mut form = Map::new();
    match serde_urlencoded::from_bytes::<Vec<(String, String)>>(body) {
        Ok(pairs) => {
            for (key, value) in pairs {
                form.insert(key, Value::String(value));
            }
        }
        Err(parse_error) => debug!(%parse_error, "ignoring unparseable form body"),
    }
    form
}

fn flatten_sections(sections: Vec<Map<String, Value>>) -> Map<String, Value> {
    let mut flat = Map::new();
    for section in sections {
        for (key, value) in section {
            flat.insert(key, value);
        }
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSet, SchemaBackend};
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn echo_endpoint() -> Arc<Endpoint> {
        let request = SchemaBackend::Fieldwise
            .adapter(
                FieldSet::builder("EchoRequest")
                    .integer("id")
                    .string("name")
                    .build(),
            )
            .expect("request adapter");
        let response = SchemaBackend::Fieldwise
            .adapter(
                FieldSet::builder("EchoResponse")
                    .integer("id")
                    .string("name")
                    .build(),
            )
            .expect("response adapter");
        Endpoint::builder()
            .get(Operation::new(
                request,
                response,
                Handler::asynchronous(|payload| async move { Ok(Some(payload)) }),
            ))
            .build()
    }

    #[test]
    fn flatten_gives_later_sections_precedence() {
        let sections = vec![
            serde_json::from_value(json!({"id": "1", "source": "path"})).expect("section"),
            serde_json::from_value(json!({"source": "query", "limit": "10"})).expect("section"),
            serde_json::from_value(json!({"source": "json"})).expect("section"),
        ];
        let flat = flatten_sections(sections);
        assert_eq!(
            Value::Object(flat),
            json!({"id": "1", "source": "json", "limit": "10"})
        );
    }

    #[test]
    fn head_resolves_to_get() {
        assert_eq!(resolve_method(&Method::HEAD), Method::GET);
        assert_eq!(resolve_method(&Method::DELETE), Method::DELETE);
    }

    #[actix_web::test]
    async fn undeclared_method_is_405_with_allow_header() {
        let endpoint = echo_endpoint();
        let req = TestRequest::post().uri("/echo/1").to_http_request();
        let response = endpoint
            .serve(req, web::Bytes::new())
            .await
            .expect("pipeline response");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let allow = response
            .headers()
            .get(header::ALLOW)
            .expect("Allow header")
            .to_str()
            .expect("ascii header");
        assert_eq!(allow, "GET, HEAD");
    }

    #[actix_web::test]
    async fn path_and_query_params_reach_the_handler_typed() {
        let endpoint = echo_endpoint();
        let req = TestRequest::get()
            .uri("/echo/7?name=Ada")
            .param("id", "7")
            .to_http_request();
        let response = endpoint
            .serve(req, web::Bytes::new())
            .await
            .expect("pipeline response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn validation_failure_is_shaped_as_422() {
        let endpoint = echo_endpoint();
        let req = TestRequest::get().uri("/echo/x").to_http_request();
        let response = endpoint
            .serve(req, web::Bytes::new())
            .await
            .expect("pipeline response");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[actix_web::test]
    async fn hook_failures_short_circuit_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&calls);
        let schema = SchemaBackend::Fieldwise
            .adapter(FieldSet::builder("Id").integer("id").build())
            .expect("adapter");
        let endpoint = Endpoint::builder()
            .get(
                Operation::new(
                    Arc::clone(&schema),
                    schema,
                    Handler::blocking(move |payload| {
                        observed.fetch_add(1, Ordering::SeqCst);
                        Ok(Some(payload))
                    }),
                )
                .validate(Hook::asynchronous(|_| async {
                    Err(HandlerError::from(ApiError::not_found()))
                })),
            )
            .build();

        let req = TestRequest::get()
            .uri("/items/1")
            .param("id", "1")
            .to_http_request();
        let response = endpoint
            .serve(req, web::Bytes::new())
            .await
            .expect("pipeline response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn malformed_json_body_collapses_to_missing_fields() {
        let schema = SchemaBackend::Fieldwise
            .adapter(FieldSet::builder("Named").string("name").build())
            .expect("adapter");
        let endpoint = Endpoint::builder()
            .post(Operation::new(
                Arc::clone(&schema),
                schema,
                Handler::asynchronous(|payload| async move { Ok(Some(payload)) }),
            ))
            .build();

        let req = TestRequest::post().uri("/named").to_http_request();
        let response = endpoint
            .serve(req, web::Bytes::from_static(b"{not json"))
            .await
            .expect("pipeline response");
        // The parse failure is swallowed; validation reports the absent field.
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[actix_web::test]
    async fn delete_returning_nothing_is_204() {
        let schema = SchemaBackend::Fieldwise
            .adapter(FieldSet::builder("Id").integer("id").build())
            .expect("adapter");
        let endpoint = Endpoint::builder()
            .delete(Operation::new(
                Arc::clone(&schema),
                schema,
                Handler::blocking(|_| Ok(None)),
            ))
            .build();

        let req = TestRequest::delete()
            .uri("/items/1")
            .param("id", "1")
            .to_http_request();
        let response = endpoint
            .serve(req, web::Bytes::new())
            .await
            .expect("pipeline response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[actix_web::test]
    async fn non_delete_returning_nothing_is_internal() {
        let schema = SchemaBackend::Fieldwise
            .adapter(FieldSet::builder("Id").integer("id").build())
            .expect("adapter");
        let endpoint = Endpoint::builder()
            .get(Operation::new(
                Arc::clone(&schema),
                schema,
                Handler::blocking(|_| Ok(None)),
            ))
            .build();

        let req = TestRequest::get()
            .uri("/items/1")
            .param("id", "1")
            .to_http_request();
        endpoint
            .serve(req, web::Bytes::new())
            .await
            .expect_err("missing payload escapes the handled contract");
    }

    #[actix_web::test]
    async fn background_jobs_are_spawned_after_success() {
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let schema = SchemaBackend::Fieldwise
            .adapter(FieldSet::builder("Id").integer("id").build())
            .expect("adapter");
        let endpoint = Endpoint::builder()
            .get(
                Operation::new(
                    Arc::clone(&schema),
                    schema,
                    Handler::asynchronous(|payload| async move { Ok(Some(payload)) }),
                )
                .background(move |_, _| {
                    let sink = Arc::clone(&sink);
                    vec![Box::pin(async move {
                        sink.lock().expect("log lock").push("ran");
                    })]
                }),
            )
            .build();

        let req = TestRequest::get()
            .uri("/items/1")
            .param("id", "1")
            .to_http_request();
        let response = endpoint
            .serve(req, web::Bytes::new())
            .await
            .expect("pipeline response");
        assert_eq!(response.status(), StatusCode::OK);
        actix_web::rt::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(log.lock().expect("log lock").as_slice(), ["ran"]);
    }
}
