//! Route groups registering handler chains on an axum router
//!
//! Every route is a [`HandlerChain`]: the group middleware registered before
//! the route, followed by the route's own handlers. Only the route's last
//! handler is terminal, so group middleware never produces the success
//! envelope.
//!
//! Paths use axum syntax (`/users/{id}`); captured parameters are available
//! through [`Request::param`](crate::request::Request::param).
//!
//! # Example
//!
//! ```rust
//! use handler_gateway::controller::{Controller, HandlerChain};
//! use handler_gateway::handlers::{handler_fn, payload, ErrorModel};
//! use handler_gateway::language::MessageCatalog;
//! use handler_gateway::router::Gateway;
//!
//! let gateway = Gateway::new(Controller::default(), MessageCatalog::default());
//!
//! let mut api = gateway.group("/api");
//! api.middleware(HandlerChain::new().with(handler_fn(|request| {
//!     match request.header("authorization") {
//!         Some(_) => Ok(None),
//!         None => Err(ErrorModel::unauthorized()),
//!     }
//! })));
//!
//! let mut users = api.group("/users");
//! users.get("/{id}", HandlerChain::new().with(handler_fn(|request| {
//!     payload(request.param("id").map(str::to_owned))
//! })));
//!
//! let app: axum::Router = gateway.into_router();
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::rejection::RawPathParamsRejection;
use axum::extract::{ConnectInfo, RawPathParams};
use axum::http::header::ACCEPT_LANGUAGE;
use axum::response::{IntoResponse, Response};
use axum::routing::{on, MethodFilter};
use axum::Router;

use crate::config::Config;
use crate::controller::{Controller, HandlerChain};
use crate::handlers::ErrorModel;
use crate::language::MessageCatalog;
use crate::request::Request;

/// Body limit used when none is configured
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Debug)]
struct Shared {
    controller: Controller,
    catalog: MessageCatalog,
    body_limit: usize,
}

#[derive(Debug, Clone)]
struct RouteEntry {
    method: MethodFilter,
    path: String,
    chain: HandlerChain,
    terminal: Option<usize>,
}

type Registry = Arc<Mutex<Vec<RouteEntry>>>;

/// Entry point owning the controller, the message catalog and every route
#[derive(Debug, Clone)]
pub struct Gateway {
    shared: Arc<Shared>,
    routes: Registry,
}

impl Gateway {
    pub fn new(controller: Controller, catalog: MessageCatalog) -> Self {
        Self {
            shared: Arc::new(Shared {
                controller,
                catalog,
                body_limit: DEFAULT_BODY_LIMIT,
            }),
            routes: Arc::default(),
        }
    }

    /// Gateway configured from the `response`, `language` and `service` sections
    ///
    /// Messages are taken from `catalog`; its default language is replaced by
    /// the configured one.
    pub fn from_config(config: &Config, catalog: MessageCatalog) -> Self {
        Self {
            shared: Arc::new(Shared {
                controller: Controller::from_config(config),
                catalog: catalog.with_default_language(&config.language.default_language),
                body_limit: config.service.body_limit_bytes(),
            }),
            routes: Arc::default(),
        }
    }

    /// Open a route group under `prefix`
    pub fn group(&self, prefix: &str) -> RouterGroup {
        RouterGroup {
            prefix: join_paths("", prefix),
            middleware: HandlerChain::new(),
            routes: Arc::clone(&self.routes),
        }
    }

    /// Build the axum router from every registered route
    pub fn into_router(self) -> Router {
        let entries = self
            .routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        entries.into_iter().fold(Router::new(), |router, entry| {
            tracing::debug!(path = %entry.path, handlers = entry.chain.len(), "registering route");
            let shared = Arc::clone(&self.shared);
            let RouteEntry {
                method,
                path,
                chain,
                terminal,
            } = entry;
            let chain = Arc::new(chain);
            router.route(
                &path,
                on(
                    method,
                    move |params: Result<RawPathParams, RawPathParamsRejection>,
                          request: axum::extract::Request| {
                        dispatch(Arc::clone(&shared), Arc::clone(&chain), terminal, params, request)
                    },
                ),
            )
        })
    }
}

/// A path prefix with the middleware registered on it
#[derive(Debug, Clone)]
pub struct RouterGroup {
    prefix: String,
    middleware: HandlerChain,
    routes: Registry,
}

impl RouterGroup {
    /// Nested group inheriting this group's prefix and current middleware
    pub fn group(&self, path: &str) -> RouterGroup {
        RouterGroup {
            prefix: join_paths(&self.prefix, path),
            middleware: self.middleware.clone(),
            routes: Arc::clone(&self.routes),
        }
    }

    /// Run `handlers` before every route registered afterwards
    pub fn middleware(&mut self, handlers: HandlerChain) -> &mut Self {
        self.middleware = std::mem::take(&mut self.middleware).extend(&handlers);
        self
    }

    /// Register `handlers` for `GET path`
    pub fn get(&mut self, path: &str, handlers: HandlerChain) -> &mut Self {
        self.register(MethodFilter::GET, path, handlers)
    }

    /// Register `handlers` for `POST path`
    pub fn post(&mut self, path: &str, handlers: HandlerChain) -> &mut Self {
        self.register(MethodFilter::POST, path, handlers)
    }

    /// Register `handlers` for `PUT path`
    pub fn put(&mut self, path: &str, handlers: HandlerChain) -> &mut Self {
        self.register(MethodFilter::PUT, path, handlers)
    }

    /// Register `handlers` for `DELETE path`
    pub fn delete(&mut self, path: &str, handlers: HandlerChain) -> &mut Self {
        self.register(MethodFilter::DELETE, path, handlers)
    }

    /// Full path of `path` inside this group
    pub fn path(&self, path: &str) -> String {
        join_paths(&self.prefix, path)
    }

    fn register(&mut self, method: MethodFilter, path: &str, handlers: HandlerChain) -> &mut Self {
        let terminal = (!handlers.is_empty())
            .then(|| self.middleware.len() + handlers.len() - 1);
        let entry = RouteEntry {
            method,
            path: self.path(path),
            chain: self.middleware.clone().extend(&handlers),
            terminal,
        };
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        self
    }
}

async fn dispatch(
    shared: Arc<Shared>,
    chain: Arc<HandlerChain>,
    terminal: Option<usize>,
    params: Result<RawPathParams, RawPathParamsRejection>,
    request: axum::extract::Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let localizer = shared.catalog.localizer_for(
        parts
            .headers
            .get(ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok()),
    );

    let bytes = match axum::body::to_bytes(body, shared.body_limit).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(method = %parts.method, path = %parts.uri.path(), error = %err, "failed to read request body");
            return ErrorModel::bad_request()
                .with_error(err)
                .localize(localizer.as_ref())
                .into_response();
        }
    };

    let params: HashMap<String, String> = params
        .map(|params| {
            params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect()
        })
        .unwrap_or_default();
    let client_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let mut request = Request::new(parts.method, parts.uri)
        .with_headers(parts.headers)
        .with_body(bytes)
        .with_params(params)
        .with_localizer(Arc::clone(&localizer));
    if let Some(addr) = client_addr {
        request = request.with_client_addr(addr);
    }

    chain
        .run_with_terminal(&shared.controller, &mut request, terminal)
        .await;

    match request.take_response() {
        Some(response) => response,
        None => {
            tracing::error!(
                method = %request.method(),
                path = %request.path(),
                "handler chain finished without a response"
            );
            ErrorModel::internal()
                .localize(localizer.as_ref())
                .into_response()
        }
    }
}

/// Join a group prefix and a path with exactly one `/` between them
fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (false, true) => prefix.to_string(),
        (true, false) => format!("/{path}"),
        (false, false) => format!("{prefix}/{path}"),
    }
}
