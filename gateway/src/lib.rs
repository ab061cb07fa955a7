//! # handler-gateway
//!
//! Handler-chain gateway over axum. Routes are chains of small handlers that
//! share one request: early handlers validate and enrich it, the last one
//! produces the result, and the gateway turns that result into a uniform,
//! localized JSON envelope.
//!
//! ## Features
//!
//! - **Handler chains**: middleware-style handlers with short-circuit on error
//! - **Bracket-notation filters**: `filters[0][k]=age&filters[0][o]=bt&filters[0][v]=18`
//! - **Pagination**: lazy `page`/`limit` defaults and totals reported in every envelope
//! - **Response envelopes**: status and message derived from the method and the result
//! - **Typed errors**: error kinds mapped to status codes, localized on the way out
//! - **Localization**: `Accept-Language` negotiation over an in-memory message catalog
//! - **Graceful shutdown**: Proper signal handling (SIGTERM, SIGINT)
//!
//! ## Example
//!
//! ```rust,no_run
//! use handler_gateway::prelude::*;
//!
//! struct ListUsers;
//!
//! #[async_trait]
//! impl Handler for ListUsers {
//!     async fn handle(&self, request: &mut GatewayRequest) -> HandlerResult {
//!         let filters = request.bind_filters().clone();
//!         info!(filters = filters.filters().len(), "listing users");
//!         request.paginator().set_total(2);
//!         payload(vec!["alice", "bob"])
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Load configuration
//!     let config = Config::load()?;
//!
//!     // Initialize tracing
//!     init_tracing(&config)?;
//!
//!     let catalog = MessageCatalog::new("en")
//!         .with_message("fa", "SuccessMessage", "عملیات با موفقیت انجام شد");
//!     let gateway = Gateway::from_config(&config, catalog);
//!     gateway
//!         .group("/api")
//!         .get("/users", HandlerChain::new().with(ListUsers));
//!
//!     // Run server
//!     Server::new(config).serve(gateway.into_router()).await
//! }
//! ```

mod binding;
pub mod config;
pub mod controller;
pub mod error;
pub mod handlers;
pub mod language;
pub mod observability;
pub mod pagination;
pub mod request;
pub mod router;
pub mod server;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, CorsMode, LanguageConfig, ResponseConfig, ServiceConfig};
    pub use crate::controller::{Controller, Flow, HandlerChain};
    pub use crate::error::{Error, Result};
    pub use crate::handlers::{
        handler_fn, payload, Comparison, EnvelopeBuilder, ErrorKind, ErrorModel, FieldErrors,
        Filter, FilterParams, Handler, HandlerResult, Operation, ResponseEnvelope, Sort,
        SortOrder, Validatable,
    };
    pub use crate::language::{Localizer, MessageCatalog, NoopLocalizer};
    pub use crate::observability::init_tracing;
    pub use crate::pagination::Paginator;
    pub use crate::request::{ChainState, Request as GatewayRequest};
    pub use crate::router::{Gateway, RouterGroup};
    pub use crate::server::Server;

    pub use axum::{
        http::{Method, StatusCode},
        Router,
    };

    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{json, Value};

    // Re-export tracing macros and types
    pub use tracing::{debug, error, info, instrument, trace, warn};

    pub use tokio;

    pub use async_trait::async_trait;
}
