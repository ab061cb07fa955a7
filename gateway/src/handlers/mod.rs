//! Handler abstractions and the data they exchange with the gateway
//!
//! # Features
//!
//! - **Handlers**: [`Handler`] trait and [`handler_fn`] for closures
//! - **Validation**: [`Validatable`] inputs bound through [`Request::bind`](crate::request::Request::bind)
//! - **Filtering**: [`FilterParams`] parsed from bracket-notation query strings
//! - **Error Handling**: [`ErrorModel`] with automatic HTTP status code mapping
//! - **Envelopes**: [`EnvelopeBuilder`] shaping every success response
//!
//! # Example
//!
//! ```rust
//! use handler_gateway::handlers::{payload, Handler, HandlerResult, ErrorModel};
//! use handler_gateway::request::Request;
//! use handler_gateway::prelude::async_trait;
//!
//! struct ListUsers;
//!
//! #[async_trait]
//! impl Handler for ListUsers {
//!     async fn handle(&self, request: &mut Request) -> HandlerResult {
//!         let filters = request.bind_filters().clone();
//!         if filters.filter("banned").is_some() {
//!             return Err(ErrorModel::forbidden());
//!         }
//!         request.paginator().set_total(2);
//!         payload(vec!["alice", "bob"])
//!     }
//! }
//! ```

mod error;
mod operation;
mod query;
mod response;
mod traits;

pub use error::{ErrorKind, ErrorModel, FieldErrors};
pub use operation::{Comparison, Operation};
pub use query::{Filter, FilterParams, Sort, SortOrder, FILTER_MARKER, SORT_MARKER};
pub use response::{
    to_payload, EnvelopeBuilder, EnvelopeData, ResponseEnvelope, CREATED_MESSAGE,
    DEFAULT_TIMESTAMP_FORMAT, DEFAULT_VERSION, SUCCESS_MESSAGE, UPDATED_MESSAGE,
};
pub use traits::{handler_fn, payload, FnHandler, Handler, HandlerResult, Validatable};
