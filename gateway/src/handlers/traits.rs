//! Handler and validation capabilities
//!
//! A [`Handler`] receives the request, may mutate its request-scoped state
//! (body, filters, paginator, scratch space) and returns either an optional
//! result or an [`ErrorModel`]. Handlers returning `Ok(None)` act as pure
//! middleware when they are not last in their chain.
//!
//! # Example
//!
//! ```rust
//! use handler_gateway::handlers::{payload, Handler, HandlerResult};
//! use handler_gateway::request::Request;
//! use handler_gateway::prelude::async_trait;
//!
//! struct ListUsers;
//!
//! #[async_trait]
//! impl Handler for ListUsers {
//!     async fn handle(&self, request: &mut Request) -> HandlerResult {
//!         request.paginator().set_total(1);
//!         payload(vec!["alice"])
//!     }
//! }
//! ```

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::error::{ErrorModel, FieldErrors};
use super::response::to_payload;
use crate::language::Localizer;
use crate::request::Request;

/// Outcome of one handler invocation
pub type HandlerResult = Result<Option<Value>, ErrorModel>;

/// One step of a handler chain
#[async_trait]
pub trait Handler: Send + Sync {
    /// Process the request
    async fn handle(&self, request: &mut Request) -> HandlerResult;

    /// Name used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Wrap a serializable value as a handler result
///
/// A value serializing to `null` counts as no result.
///
/// # Errors
///
/// Returns an `Unknown` error when the value cannot be serialized.
pub fn payload<T: Serialize>(value: T) -> HandlerResult {
    to_payload(value).map_err(|err| ErrorModel::internal().with_error(err))
}

/// Handler built from a synchronous closure
///
/// ```rust
/// use handler_gateway::handlers::{handler_fn, ErrorModel};
///
/// let require_token = handler_fn(|request| match request.header("authorization") {
///     Some(_) => Ok(None),
///     None => Err(ErrorModel::unauthorized()),
/// });
/// ```
pub struct FnHandler<F> {
    name: &'static str,
    func: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

/// Build a [`Handler`] from a closure
pub fn handler_fn<F>(func: F) -> FnHandler<F>
where
    F: Fn(&mut Request) -> HandlerResult + Send + Sync,
{
    FnHandler {
        name: std::any::type_name::<F>(),
        func,
    }
}

impl<F> FnHandler<F> {
    /// Override the name used in logs
    #[must_use]
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut Request) -> HandlerResult + Send + Sync,
{
    async fn handle(&self, request: &mut Request) -> HandlerResult {
        (self.func)(request)
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Input that can be bound from a request and validated
///
/// [`Request::bind`] fills the fields from path parameters, then the JSON
/// body (or the query string when the body is empty), then the headers named
/// in [`HEADERS`](Self::HEADERS). A header binds to the field named after it
/// in lowercase with `-` replaced by `_`.
///
/// ```rust
/// use handler_gateway::handlers::{FieldErrors, Validatable};
/// use handler_gateway::language::Localizer;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct CreateUser { name: String }
///
/// impl Validatable for CreateUser {
///     type Output = String;
///
///     fn validate(self, localizer: &dyn Localizer) -> Result<String, FieldErrors> {
///         if self.name.is_empty() {
///             let mut errors = FieldErrors::new();
///             errors.insert("name".into(), localizer.translate("Required", None).into());
///             return Err(errors);
///         }
///         Ok(self.name)
///     }
/// }
/// ```
pub trait Validatable: DeserializeOwned {
    /// Validated representation stored as the request body
    type Output: Clone + Send + Sync + 'static;

    /// Headers bound into the input
    const HEADERS: &'static [&'static str] = &[];

    /// Check the input, localizing any field messages
    ///
    /// # Errors
    ///
    /// Returns the offending fields when the input is invalid.
    fn validate(self, localizer: &dyn Localizer) -> Result<Self::Output, FieldErrors>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use serde_json::json;

    #[tokio::test]
    async fn test_handler_fn() {
        let handler = handler_fn(|request| {
            request.set_key("seen", json!(true));
            Ok(None)
        });
        let mut request = Request::new(Method::GET, "/".parse().unwrap());
        assert_eq!(handler.handle(&mut request).await, Ok(None));
        assert_eq!(request.get_key("seen"), Some(&json!(true)));
    }

    #[test]
    fn test_handler_fn_named() {
        let handler = handler_fn(|_| Ok(None)).named("noop");
        assert_eq!(handler.name(), "noop");
    }

    #[test]
    fn test_payload() {
        assert_eq!(payload(vec![1, 2]), Ok(Some(json!([1, 2]))));
        assert_eq!(payload(()), Ok(None));
    }
}
