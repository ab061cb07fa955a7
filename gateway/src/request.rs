//! Per-request state shared along a handler chain
//!
//! A [`Request`] wraps the inbound HTTP request together with everything the
//! handlers of one chain accumulate: the bound body, parsed filters, the
//! lazily created paginator, a scratch map, the negotiated localizer, and the
//! response once one has been written.
//!
//! The response slot is write-once. After a handler (or the controller)
//! writes a response the chain is [`ChainState::Closed`] and later handlers
//! are skipped.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use crate::binding::{header_field, Fields};
use crate::handlers::{ErrorModel, FilterParams, Validatable};
use crate::language::{Localizer, NoopLocalizer};
use crate::pagination::Paginator;

static EMPTY_FILTERS: FilterParams = FilterParams::empty();

/// Whether a chain may still write a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainState {
    /// Nothing written yet
    #[default]
    Open,
    /// A response has been written
    Closed,
}

/// Inbound request plus request-scoped state
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: HashMap<String, String>,
    client_addr: Option<SocketAddr>,
    localizer: Arc<dyn Localizer>,
    paginator: Option<Paginator>,
    filters: Option<FilterParams>,
    scratch: HashMap<String, Value>,
    extensions: http::Extensions,
    response: Option<Written>,
}

impl Request {
    /// Create a request with no headers, body or path parameters
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params: HashMap::new(),
            client_addr: None,
            localizer: Arc::new(NoopLocalizer),
            paginator: None,
            filters: None,
            scratch: HashMap::new(),
            extensions: http::Extensions::new(),
            response: None,
        }
    }

    /// Set the request headers
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the raw body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the path parameters captured by the route
    #[must_use]
    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// Set the localizer used for messages on this request
    #[must_use]
    pub fn with_localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = localizer;
        self
    }

    /// Set the peer address
    #[must_use]
    pub fn with_client_addr(mut self, addr: SocketAddr) -> Self {
        self.client_addr = Some(addr);
        self
    }

    /// HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Full request URI
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// URI path without the query
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// All request headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text, `None` when absent or not visible ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Raw request body
    pub fn raw_body(&self) -> &Bytes {
        &self.body
    }

    /// First decoded value of query parameter `key`
    pub fn query(&self, key: &str) -> Option<String> {
        let query = self.uri.query()?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Path parameter captured by the route
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Peer address, when the server recorded one
    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client_addr
    }

    /// Localizer negotiated for this request
    pub fn localizer(&self) -> &dyn Localizer {
        self.localizer.as_ref()
    }

    /// Paginator for this request, created from `page`/`limit` on first use
    pub fn paginator(&mut self) -> &mut Paginator {
        let uri = &self.uri;
        self.paginator
            .get_or_insert_with(|| Paginator::from_query(uri.query().unwrap_or_default()))
    }

    /// Current paginator state without creating it
    pub fn paginator_snapshot(&self) -> Paginator {
        self.paginator
            .unwrap_or_else(|| Paginator::from_query(self.uri.query().unwrap_or_default()))
    }

    /// Parse bracket-notation filters and sorts from the query string
    ///
    /// Runs once; later calls return the already bound value. Tokens are
    /// percent-decoded before grouping and tokens without `=` are skipped.
    pub fn bind_filters(&mut self) -> &FilterParams {
        if self.filters.is_none() {
            let tokens: Vec<String> = self
                .uri
                .query()
                .unwrap_or_default()
                .split('&')
                .filter(|token| token.contains('='))
                .flat_map(|token| {
                    form_urlencoded::parse(token.as_bytes())
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect::<Vec<_>>()
                })
                .collect();
            let paginator = *self.paginator();
            self.filters = Some(FilterParams::from_tokens(tokens, &paginator));
        }
        self.filters.as_ref().unwrap_or(&EMPTY_FILTERS)
    }

    /// Bound filters, empty until [`Request::bind_filters`] ran
    pub fn filters(&self) -> &FilterParams {
        self.filters.as_ref().unwrap_or(&EMPTY_FILTERS)
    }

    /// Deserialize and validate the input into `T::Output`
    ///
    /// Path parameters are bound first. A non-empty body is then read as JSON;
    /// otherwise the query string is used. Headers listed in `T::HEADERS` are
    /// bound last. Each source overrides fields set by the earlier ones. The
    /// validated output is stored as the request body.
    ///
    /// # Errors
    ///
    /// Returns an `UnProcessable` error when decoding or validation fails.
    pub fn bind<T: Validatable>(&mut self) -> Result<T::Output, ErrorModel> {
        let mut fields = Fields::new();
        fields.text_pairs(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        if self.body.iter().any(|b| !b.is_ascii_whitespace()) {
            fields.json(serde_json::from_slice(&self.body)?);
        } else if let Some(query) = self.uri.query() {
            fields.text_pairs(form_urlencoded::parse(query.as_bytes()));
        }

        for name in T::HEADERS {
            let values: Vec<String> = self
                .headers
                .get_all(*name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .map(str::to_owned)
                .collect();
            fields.text(header_field(name), values);
        }

        let input: T = fields.deserialize()?;
        let output = input
            .validate(self.localizer())
            .map_err(|errors| ErrorModel::unprocessable().with_errors(errors))?;
        self.set_body(output.clone());
        Ok(output)
    }

    /// Store a typed body for later handlers
    pub fn set_body<T: Clone + Send + Sync + 'static>(&mut self, body: T) {
        self.extensions.insert(body);
    }

    /// Typed body stored by [`Request::set_body`] or [`Request::bind`]
    pub fn body<T: Clone + Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    /// Store a value in the request scratch space
    pub fn set_key(&mut self, key: impl Into<String>, value: Value) {
        self.scratch.insert(key.into(), value);
    }

    /// Value stored with [`Request::set_key`]
    pub fn get_key(&self, key: &str) -> Option<&Value> {
        self.scratch.get(key)
    }

    /// Whether a response has been written
    pub fn state(&self) -> ChainState {
        if self.response.is_some() {
            ChainState::Closed
        } else {
            ChainState::Open
        }
    }

    /// Shorthand for `state() == ChainState::Closed`
    pub fn is_responded(&self) -> bool {
        self.state() == ChainState::Closed
    }

    /// Write a response. A second write is ignored.
    pub fn respond(&mut self, status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) {
        if self.is_responded() {
            tracing::warn!(
                method = %self.method,
                path = %self.uri.path(),
                %status,
                "response already written, ignoring"
            );
            return;
        }
        self.response = Some(Written {
            status,
            content_type: HeaderValue::from_static(content_type),
            body: body.into(),
        });
    }

    /// Write `value` as a JSON response
    pub fn respond_json<T: Serialize>(&mut self, status: StatusCode, value: &T) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.respond(status, JSON_CONTENT_TYPE, bytes),
            Err(err) => self.respond_error(ErrorModel::internal().with_error(err)),
        }
    }

    /// Write an HTML response
    pub fn respond_html(&mut self, status: StatusCode, body: impl Into<String>) {
        self.respond(status, HTML_CONTENT_TYPE, body.into());
    }

    /// Write an error as JSON with its kind's status, unlocalized
    pub fn respond_error(&mut self, error: ErrorModel) {
        let status = error.status_code();
        match serde_json::to_vec(&error) {
            Ok(bytes) => self.respond(status, JSON_CONTENT_TYPE, bytes),
            Err(_) => self.respond(status, JSON_CONTENT_TYPE, Bytes::new()),
        }
    }

    /// Remove the written response, if any, and reopen the chain
    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take().map(Written::into_response)
    }
}

const JSON_CONTENT_TYPE: &str = "application/json";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// A response held on the request until the adapter takes it
///
/// Kept as plain parts so the request stays `Sync`.
#[derive(Debug)]
struct Written {
    status: StatusCode,
    content_type: HeaderValue,
    body: Bytes,
}

impl IntoResponse for Written {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type)],
            self.body,
        )
            .into_response()
    }
}
