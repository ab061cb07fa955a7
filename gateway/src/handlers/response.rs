//! Success envelope synthesis
//!
//! Every successful response is wrapped in the same envelope:
//!
//! ```json
//! {
//!   "message": "Operation has been done successfully",
//!   "version": "v1",
//!   "represented_at": "2024-01-01 12:00:00",
//!   "data": { "total": 2, "per_page": 10, "result": [ ... ] }
//! }
//! ```
//!
//! The status code and message depend on the HTTP method and on whether the
//! handler produced a result:
//!
//! | Method | no result | result |
//! |---|---|---|
//! | GET | 204 | 200, result verbatim |
//! | POST | 204 | 201, "created", result wrapped in a one-element list |
//! | PUT | 204 | 201, "updated", result wrapped in a one-element list |
//! | DELETE | 204 | 200, result verbatim |
//! | other | 204 | 200, result verbatim |
//!
//! # Example
//!
//! ```rust
//! use axum::http::{Method, StatusCode};
//! use handler_gateway::handlers::EnvelopeBuilder;
//! use handler_gateway::language::NoopLocalizer;
//! use handler_gateway::pagination::Paginator;
//! use serde_json::json;
//!
//! let builder = EnvelopeBuilder::new("v1");
//! let (status, envelope) = builder.build(
//!     &Method::POST,
//!     Some(json!({ "id": 1 })),
//!     &Paginator::new(),
//!     &NoopLocalizer,
//! );
//! assert_eq!(status, StatusCode::CREATED);
//! assert_eq!(envelope.data.result, Some(json!([{ "id": 1 }])));
//! ```

use axum::http::{Method, StatusCode};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::language::Localizer;
use crate::pagination::Paginator;

/// Envelope version when none is configured
pub const DEFAULT_VERSION: &str = "v1";

/// Format of `represented_at` when none is configured
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Message id and fallback text of the default success message
pub const SUCCESS_MESSAGE: (&str, &str) =
    ("SuccessMessage", "Operation has been done successfully");

/// Message id and fallback text used for POST results
pub const CREATED_MESSAGE: (&str, &str) = ("CreatedMessage", "Item has been created successfully");

/// Message id and fallback text used for PUT results
pub const UPDATED_MESSAGE: (&str, &str) = ("UpdatedMessage", "Item has been updated successfully");

/// Pagination totals and payload of an envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeData {
    /// Total number of items across all pages
    pub total: u64,
    /// Page size in effect
    pub per_page: u32,
    /// Handler result, possibly wrapped
    pub result: Option<Value>,
}

/// Uniform success response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Localized status message
    pub message: String,
    /// Error text, never set on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// API version
    pub version: String,
    /// Moment the envelope was built, rendered with the configured format
    pub represented_at: String,
    /// Totals and payload
    pub data: EnvelopeData,
}

/// Builds success envelopes from a method, a result and the paginator
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    version: String,
    timestamp_format: String,
}

impl Default for EnvelopeBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_VERSION)
    }
}

impl EnvelopeBuilder {
    /// Create a builder stamping envelopes with `version`
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }

    /// Use a different `strftime` format for `represented_at`
    #[must_use]
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    /// Version stamped on envelopes
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Build the status code and envelope for a handler result
    ///
    /// Totals come from the paginator as it is at call time.
    pub fn build(
        &self,
        method: &Method,
        result: Option<Value>,
        paginator: &Paginator,
        localizer: &dyn Localizer,
    ) -> (StatusCode, ResponseEnvelope) {
        self.build_at(method, result, paginator, localizer, Local::now().naive_local())
    }

    fn build_at(
        &self,
        method: &Method,
        result: Option<Value>,
        paginator: &Paginator,
        localizer: &dyn Localizer,
        now: NaiveDateTime,
    ) -> (StatusCode, ResponseEnvelope) {
        let result = result.filter(|value| !value.is_null());
        let (status, message, result) = classify(method, result);
        let (message_id, fallback) = message;

        let envelope = ResponseEnvelope {
            message: localizer.localize(message_id, fallback, None),
            error: None,
            version: self.version.clone(),
            represented_at: now.format(&self.timestamp_format).to_string(),
            data: EnvelopeData {
                total: paginator.total(),
                per_page: paginator.per_page(),
                result,
            },
        };

        (status, envelope)
    }
}

type Message = (&'static str, &'static str);

/// Status, message and shaped result for a method and a non-null result
fn classify(method: &Method, result: Option<Value>) -> (StatusCode, Message, Option<Value>) {
    let Some(result) = result else {
        return (StatusCode::NO_CONTENT, SUCCESS_MESSAGE, None);
    };

    if *method == Method::POST {
        (StatusCode::CREATED, CREATED_MESSAGE, Some(wrap(result)))
    } else if *method == Method::PUT {
        (StatusCode::CREATED, UPDATED_MESSAGE, Some(wrap(result)))
    } else {
        (StatusCode::OK, SUCCESS_MESSAGE, Some(result))
    }
}

fn wrap(result: Value) -> Value {
    Value::Array(vec![result])
}

/// Serialize any value into an envelope payload, `null` becoming no result
///
/// # Errors
///
/// Fails when `value` cannot be represented as JSON.
pub fn to_payload<T: Serialize>(value: T) -> serde_json::Result<Option<Value>> {
    serde_json::to_value(value).map(|v| Some(v).filter(|v| !v.is_null()))
}
