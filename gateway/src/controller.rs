//! Handler chain controller
//!
//! The controller runs one handler at a time and decides after each whether
//! the chain stops or continues:
//!
//! - the handler failed: the error is localized and written, the chain stops
//! - the handler succeeded, is last in its chain and nothing was written yet:
//!   the success envelope is built and written, the chain stops
//! - anything else: the chain continues with the request still open
//!
//! Non-terminal handlers therefore act as middleware, and a terminal handler
//! may write its own response (HTML, custom JSON) instead of an envelope.
//!
//! # Example
//!
//! ```rust
//! use axum::http::{Method, StatusCode};
//! use handler_gateway::controller::{Controller, HandlerChain};
//! use handler_gateway::handlers::{handler_fn, payload};
//! use handler_gateway::request::Request;
//!
//! # async fn run() {
//! let chain = HandlerChain::new()
//!     .with(handler_fn(|_| Ok(None)))
//!     .with(handler_fn(|_| payload(vec![1, 2])));
//!
//! let mut request = Request::new(Method::GET, "/numbers".parse().unwrap());
//! chain.run(&Controller::default(), &mut request).await;
//! assert_eq!(request.take_response().unwrap().status(), StatusCode::OK);
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::config::Config;
use crate::handlers::{EnvelopeBuilder, ErrorModel, Handler};
use crate::request::Request;

/// What the chain does after a handler ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Run the next handler
    Continue,
    /// A response was written; skip the rest of the chain
    Stop,
}

/// Sequences handlers and writes success or error responses
#[derive(Debug, Clone, Default)]
pub struct Controller {
    envelope: EnvelopeBuilder,
}

impl Controller {
    /// Controller writing success envelopes with `envelope`
    pub fn new(envelope: EnvelopeBuilder) -> Self {
        Self { envelope }
    }

    /// Controller using the `response` section of the configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            EnvelopeBuilder::new(config.response.version.clone())
                .with_timestamp_format(config.response.timestamp_format.clone()),
        )
    }

    /// Envelope builder used for successful results
    pub fn envelope(&self) -> &EnvelopeBuilder {
        &self.envelope
    }

    /// Run one handler and decide how the chain proceeds
    pub async fn process(&self, handler: &dyn Handler, request: &mut Request, is_last: bool) -> Flow {
        match handler.handle(request).await {
            Err(error) => {
                tracing::error!(
                    handler = handler.name(),
                    method = %request.method(),
                    path = %request.path(),
                    kind = %error.kind(),
                    status = error.status_code().as_u16(),
                    error = %error.error_text(),
                    detail = ?error.detail(),
                    "error on handler: {}",
                    error.message()
                );
                self.respond_error(request, error);
                Flow::Stop
            }
            Ok(result) if is_last && !request.is_responded() => {
                self.respond(request, result);
                Flow::Stop
            }
            Ok(_) => Flow::Continue,
        }
    }

    /// Write the success envelope for `result`
    pub fn respond(&self, request: &mut Request, result: Option<Value>) {
        let paginator = request.paginator_snapshot();
        let (status, envelope) =
            self.envelope
                .build(request.method(), result, &paginator, request.localizer());
        request.respond_json(status, &envelope);
    }

    /// Localize `error` and write it with its kind's status
    pub fn respond_error(&self, request: &mut Request, error: ErrorModel) {
        let error = error.localize(request.localizer());
        request.respond_error(error);
    }
}

/// Ordered handlers for one route
///
/// Only the last handler is terminal.
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn Handler>>,
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| h.name()))
            .finish()
    }
}

impl From<Vec<Arc<dyn Handler>>> for HandlerChain {
    fn from(handlers: Vec<Arc<dyn Handler>>) -> Self {
        Self { handlers }
    }
}

impl HandlerChain {
    /// Empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler
    #[must_use]
    pub fn with<H: Handler + 'static>(self, handler: H) -> Self {
        self.with_shared(Arc::new(handler))
    }

    /// Append a handler shared with other chains
    #[must_use]
    pub fn with_shared(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Append every handler of `other`
    #[must_use]
    pub fn extend(mut self, other: &HandlerChain) -> Self {
        self.handlers.extend(other.handlers.iter().cloned());
        self
    }

    /// Number of handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the chain has no handlers
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the chain until a handler stops it or a response is written
    pub async fn run(&self, controller: &Controller, request: &mut Request) {
        let terminal = self.handlers.len().checked_sub(1);
        self.run_with_terminal(controller, request, terminal).await;
    }

    /// Run the chain treating only the handler at `terminal` as last
    ///
    /// With no terminal index every handler acts as middleware.
    pub(crate) async fn run_with_terminal(
        &self,
        controller: &Controller,
        request: &mut Request,
        terminal: Option<usize>,
    ) {
        for (index, handler) in self.handlers.iter().enumerate() {
            if request.is_responded() {
                tracing::debug!(handler = handler.name(), "response written, skipping handler");
                break;
            }
            let is_last = terminal == Some(index);
            if controller.process(handler.as_ref(), request, is_last).await == Flow::Stop {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{handler_fn, payload, ErrorKind, ResponseEnvelope};
    use crate::language::MessageCatalog;
    use crate::request::ChainState;
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(method: Method) -> Request {
        Request::new(method, "/items".parse().unwrap())
    }

    async fn read_json(request: &mut Request) -> (StatusCode, Value) {
        let response = request.take_response().unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_error_stops_and_writes_error() {
        let controller = Controller::default();
        let mut request = request(Method::GET);
        let handler = handler_fn(|_| Err(ErrorModel::forbidden()));

        let flow = controller.process(&handler, &mut request, false).await;
        assert_eq!(flow, Flow::Stop);
        assert_eq!(request.state(), ChainState::Closed);

        let (status, body) = read_json(&mut request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["type"], "forbidden");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_middleware_continues_without_writing() {
        let controller = Controller::default();
        let mut request = request(Method::GET);
        let handler = handler_fn(|_| Ok(None));

        let flow = controller.process(&handler, &mut request, false).await;
        assert_eq!(flow, Flow::Continue);
        assert_eq!(request.state(), ChainState::Open);
    }

    #[tokio::test]
    async fn test_terminal_success_writes_envelope() {
        let controller = Controller::default();
        let mut request = request(Method::GET);
        let handler = handler_fn(|request| {
            request.paginator().set_total(2);
            payload(json!([{"id": 1}, {"id": 2}]))
        });

        assert_eq!(controller.process(&handler, &mut request, true).await, Flow::Stop);
        let (status, body) = read_json(&mut request).await;
        let envelope: ResponseEnvelope = serde_json::from_value(body).unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(envelope.data.total, 2);
        assert_eq!(envelope.data.result.unwrap().as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_terminal_handler_may_write_directly() {
        let controller = Controller::default();
        let mut request = request(Method::GET);
        let handler = handler_fn(|request| {
            request.respond_html(StatusCode::OK, "<h1>hi</h1>");
            payload("ignored")
        });

        assert_eq!(controller.process(&handler, &mut request, true).await, Flow::Continue);
        let response = request.take_response().unwrap();
        assert_eq!(
            response.headers()["content-type"],
            "text/html; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_error_is_localized() {
        let localizer = MessageCatalog::new("en")
            .with_message("en", "NotFoundError", "Nothing here")
            .localizer_for(None);
        let controller = Controller::default();
        let mut request = request(Method::GET).with_localizer(localizer);
        let handler = handler_fn(|_| Err(ErrorModel::new(ErrorKind::NotFound)));

        controller.process(&handler, &mut request, true).await;
        let (status, body) = read_json(&mut request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Nothing here");
    }

    #[tokio::test]
    async fn test_chain_stops_after_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let chain = HandlerChain::new()
            .with(handler_fn(|_| Err(ErrorModel::unauthorized())))
            .with(handler_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }));

        let mut request = request(Method::GET);
        chain.run(&Controller::default(), &mut request).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(request.take_response().unwrap().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_chain_skips_after_direct_write() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let chain = HandlerChain::new()
            .with(handler_fn(|request| {
                request.respond_html(StatusCode::ACCEPTED, "queued");
                Ok(None)
            }))
            .with(handler_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                payload(1)
            }));

        let mut request = request(Method::POST);
        chain.run(&Controller::default(), &mut request).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(request.take_response().unwrap().status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_middleware_state_reaches_terminal() {
        let chain = HandlerChain::new()
            .with(handler_fn(|request| {
                request.set_key("user", json!("ali"));
                Ok(None)
            }))
            .with(handler_fn(|request| {
                payload(request.get_key("user").cloned())
            }));

        let mut request = request(Method::POST);
        chain.run(&Controller::default(), &mut request).await;
        let (status, body) = read_json(&mut request).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["result"], json!(["ali"]));
    }

    #[tokio::test]
    async fn test_non_terminal_result_is_dropped() {
        let chain = HandlerChain::new()
            .with(handler_fn(|_| payload("early")))
            .with(handler_fn(|_| Ok(None)));

        let mut request = request(Method::GET);
        chain.run(&Controller::default(), &mut request).await;
        assert_eq!(request.take_response().unwrap().status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_configured_version() {
        let mut config = Config::default();
        config.response.version = "v3".into();
        let controller = Controller::from_config(&config);
        let mut request = request(Method::GET);

        controller.respond(&mut request, Some(json!(1)));
        let (_, body) = read_json(&mut request).await;
        assert_eq!(body["version"], "v3");
    }

    #[tokio::test]
    async fn test_chain_without_terminal_writes_nothing() {
        let chain = HandlerChain::new().with(handler_fn(|_| payload(1)));
        let mut request = request(Method::GET);
        chain.run_with_terminal(&Controller::default(), &mut request, None).await;
        assert!(!request.is_responded());
    }

    #[test]
    fn test_chain_debug_lists_names() {
        let chain = HandlerChain::new().with(handler_fn(|_| Ok(None)).named("auth"));
        assert_eq!(format!("{chain:?}"), r#"["auth"]"#);
        assert_eq!(chain.len(), 1);
    }
}
