//! Handler error model and its translation to HTTP
//!
//! Handlers fail with an [`ErrorModel`]. Its [`ErrorKind`] alone decides the
//! status code; the message and error text are localized on the way out
//! unless the caller already supplied final text.
//!
//! # Example
//!
//! ```rust
//! use axum::http::StatusCode;
//! use handler_gateway::handlers::{ErrorKind, ErrorModel};
//!
//! let error = ErrorModel::forbidden().with_detail(serde_json::json!({ "role": "guest" }));
//! assert_eq!(error.kind(), ErrorKind::Forbidden);
//! assert_eq!(error.status_code(), StatusCode::FORBIDDEN);
//! assert_eq!(ErrorKind::from("teapot").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::language::Localizer;

/// Field name to problem description, as produced by validation
pub type FieldErrors = BTreeMap<String, Value>;

/// Category of handler failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input understood but semantically invalid
    UnProcessable,
    /// Target does not exist
    NotFound,
    /// Authentication required
    Unauthorized,
    /// Access denied
    Forbidden,
    /// Dependency temporarily unavailable
    Unavailable,
    /// Entity already exists
    Duplicate,
    /// Malformed request
    BadRequest,
    /// Conflicts with current state
    Conflict,
    /// Accepted for later processing
    Accepted,
    /// Anything else
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ErrorKind {
    fn from(name: &str) -> Self {
        match name {
            "un_processable" => Self::UnProcessable,
            "not_found" => Self::NotFound,
            "unauthorized" => Self::Unauthorized,
            "forbidden" => Self::Forbidden,
            "unavailable" => Self::Unavailable,
            "duplicate" => Self::Duplicate,
            "bad_request" => Self::BadRequest,
            "conflict" => Self::Conflict,
            "accepted" => Self::Accepted,
            _ => Self::Unknown,
        }
    }
}

impl ErrorKind {
    /// Snake-case name, as serialized in the `type` field
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UnProcessable => "un_processable",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Unavailable => "unavailable",
            Self::Duplicate => "duplicate",
            Self::BadRequest => "bad_request",
            Self::Conflict => "conflict",
            Self::Accepted => "accepted",
            Self::Unknown => "unknown",
        }
    }

    /// Get the HTTP status code for this error kind
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::UnProcessable | Self::Duplicate => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Accepted => StatusCode::ACCEPTED,
            Self::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Default message id, message, error id and error text for this kind
    ///
    /// Message and error text carry distinct ids so a catalog entry for one
    /// never overwrites the other.
    const fn defaults(&self) -> (&'static str, &'static str, &'static str, &'static str) {
        match self {
            Self::UnProcessable => (
                "UnProcessableError",
                "The request could not be processed",
                "UnProcessableErrorText",
                "unprocessable entity",
            ),
            Self::NotFound => (
                "NotFoundError",
                "The requested item was not found",
                "NotFoundErrorText",
                "not found",
            ),
            Self::Unauthorized => (
                "UnauthorizedError",
                "Authentication is required",
                "UnauthorizedErrorText",
                "unauthorized",
            ),
            Self::Forbidden => (
                "ForbiddenError",
                "You do not have access to this resource",
                "ForbiddenErrorText",
                "forbidden",
            ),
            Self::Unavailable => (
                "UnavailableError",
                "The service is temporarily unavailable",
                "UnavailableErrorText",
                "service unavailable",
            ),
            Self::Duplicate => (
                "DuplicateError",
                "The item already exists",
                "DuplicateErrorText",
                "duplicate",
            ),
            Self::BadRequest => (
                "BadRequestError",
                "The request is invalid",
                "BadRequestErrorText",
                "bad request",
            ),
            Self::Conflict => (
                "ConflictError",
                "The request conflicts with the current state",
                "ConflictErrorText",
                "conflict",
            ),
            Self::Accepted => (
                "AcceptedError",
                "The request has been accepted for processing",
                "AcceptedErrorText",
                "accepted",
            ),
            Self::Unknown => (
                "UnknownError",
                "An internal error occurred",
                "UnknownErrorText",
                "internal server error",
            ),
        }
    }
}

/// Structured handler error
///
/// Serializes to `{ type, message, error_text, detail, errors? }`. Message and
/// error ids are kept for localization and never serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorModel {
    #[serde(rename = "type")]
    kind: ErrorKind,
    message: String,
    error_text: String,
    detail: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
    #[serde(skip)]
    message_id: String,
    #[serde(skip)]
    error_id: String,
    #[serde(skip)]
    message_is_default: bool,
    #[serde(skip)]
    id_is_default: bool,
}

impl ErrorModel {
    /// Create an error of `kind` with its default texts and ids
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        let (message_id, message, error_id, error_text) = kind.defaults();
        Self {
            kind,
            message: message.to_string(),
            error_text: error_text.to_string(),
            detail: None,
            errors: None,
            message_id: message_id.to_string(),
            error_id: error_id.to_string(),
            message_is_default: true,
            id_is_default: true,
        }
    }

    /// `UnProcessable` with default texts
    #[must_use]
    pub fn unprocessable() -> Self {
        Self::new(ErrorKind::UnProcessable)
    }

    /// `NotFound` with default texts
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound)
    }

    /// `Unauthorized` with default texts
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(ErrorKind::Unauthorized)
    }

    /// `Forbidden` with default texts
    #[must_use]
    pub fn forbidden() -> Self {
        Self::new(ErrorKind::Forbidden)
    }

    /// `Unavailable` with default texts
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(ErrorKind::Unavailable)
    }

    /// `Duplicate` with default texts
    #[must_use]
    pub fn duplicate() -> Self {
        Self::new(ErrorKind::Duplicate)
    }

    /// `BadRequest` with default texts
    #[must_use]
    pub fn bad_request() -> Self {
        Self::new(ErrorKind::BadRequest)
    }

    /// `Conflict` with default texts
    #[must_use]
    pub fn conflict() -> Self {
        Self::new(ErrorKind::Conflict)
    }

    /// `Accepted` with default texts
    #[must_use]
    pub fn accepted() -> Self {
        Self::new(ErrorKind::Accepted)
    }

    /// `Unknown` with default texts
    #[must_use]
    pub fn internal() -> Self {
        Self::new(ErrorKind::Unknown)
    }

    /// Replace the message; it is no longer the default
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self.message_is_default = false;
        self
    }

    /// Replace the message id used for localization
    #[must_use]
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = id.into();
        self.id_is_default = false;
        self
    }

    /// Replace the error text
    #[must_use]
    pub fn with_error_text(mut self, text: impl Into<String>) -> Self {
        self.error_text = text.into();
        self
    }

    /// Replace the error id used for localization
    #[must_use]
    pub fn with_error_id(mut self, id: impl Into<String>) -> Self {
        self.error_id = id.into();
        self.id_is_default = false;
        self
    }

    /// Use an underlying error's description as the error text
    #[must_use]
    pub fn with_error(self, error: impl fmt::Display) -> Self {
        self.with_error_text(error.to_string())
    }

    /// Attach free-form detail
    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Attach per-field errors
    #[must_use]
    pub fn with_errors(mut self, errors: FieldErrors) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Error category
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Status code derived from the kind
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }

    /// User-facing message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Message id used for localization
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Error text
    #[must_use]
    pub fn error_text(&self) -> &str {
        &self.error_text
    }

    /// Error id used for localization
    #[must_use]
    pub fn error_id(&self) -> &str {
        &self.error_id
    }

    /// Free-form detail
    #[must_use]
    pub fn detail(&self) -> Option<&Value> {
        self.detail.as_ref()
    }

    /// Per-field errors
    #[must_use]
    pub fn errors(&self) -> Option<&FieldErrors> {
        self.errors.as_ref()
    }

    /// Whether the message is still the kind's default
    #[must_use]
    pub fn is_message_default(&self) -> bool {
        self.message_is_default
    }

    /// Whether the ids are still the kind's defaults
    #[must_use]
    pub fn is_id_default(&self) -> bool {
        self.id_is_default
    }

    /// Whether [`localize`](Self::localize) would rewrite the texts
    ///
    /// Errors whose caller supplied final text under the default ids are left alone.
    #[must_use]
    pub fn needs_localization(&self) -> bool {
        !self.error_id.is_empty() && (self.message_is_default || !self.id_is_default)
    }

    /// Localize message and error text through their ids
    ///
    /// Each text falls back to its current value when the localizer has no
    /// translation.
    #[must_use]
    pub fn localize(mut self, localizer: &dyn Localizer) -> Self {
        if self.needs_localization() {
            self.message = localizer.localize(&self.message_id, &self.message, None);
            self.error_text = localizer.localize(&self.error_id, &self.error_text, None);
        }
        self
    }

    /// Status code and localized error, ready to be written
    #[must_use]
    pub fn translate(self, localizer: &dyn Localizer) -> (StatusCode, Self) {
        (self.status_code(), self.localize(localizer))
    }
}

impl Default for ErrorModel {
    fn default() -> Self {
        Self::internal()
    }
}

impl From<ErrorKind> for ErrorModel {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<serde_json::Error> for ErrorModel {
    fn from(err: serde_json::Error) -> Self {
        Self::unprocessable().with_error(err)
    }
}

impl fmt::Display for ErrorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)?;
        if !self.error_text.is_empty() {
            write!(f, " ({})", self.error_text)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorModel {}

impl IntoResponse for ErrorModel {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{MessageCatalog, NoopLocalizer};
    use serde_json::json;

    fn catalog_localizer() -> std::sync::Arc<dyn Localizer> {
        MessageCatalog::new("en")
            .with_message("en", "ForbiddenError", "Keep out")
            .with_message("en", "CustomMessage", "Custom localized")
            .with_message("en", "CustomError", "custom error localized")
            .localizer_for(None)
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorKind::UnProcessable.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ErrorKind::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorKind::Unavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorKind::Duplicate.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ErrorKind::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorKind::Accepted.status_code(), StatusCode::ACCEPTED);
        assert_eq!(ErrorKind::Unknown.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unrecognized_kind_is_internal_error() {
        let kind = ErrorKind::from("rate_limited");
        assert_eq!(kind, ErrorKind::Unknown);
        assert_eq!(kind.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let parsed: ErrorKind = serde_json::from_str("\"something_else\"").unwrap();
        assert_eq!(parsed, ErrorKind::Unknown);
    }

    #[test]
    fn test_kind_name_round_trip() {
        for kind in [
            ErrorKind::UnProcessable,
            ErrorKind::NotFound,
            ErrorKind::Duplicate,
            ErrorKind::Accepted,
        ] {
            assert_eq!(ErrorKind::from(kind.as_str()), kind);
        }
    }

    #[test]
    fn test_new_error_has_defaults() {
        let error = ErrorModel::forbidden();
        assert_eq!(error.kind(), ErrorKind::Forbidden);
        assert_eq!(error.message_id(), "ForbiddenError");
        assert_eq!(error.error_id(), "ForbiddenErrorText");
        assert!(error.is_message_default());
        assert!(error.is_id_default());
        assert!(error.detail().is_none());
    }

    #[test]
    fn test_with_message_clears_default_flag() {
        let error = ErrorModel::not_found().with_message("User 7 is gone");
        assert!(!error.is_message_default());
        assert!(error.is_id_default());
        assert!(!error.needs_localization());
    }

    #[test]
    fn test_default_error_is_localized() {
        let localizer = catalog_localizer();
        let (status, error) = ErrorModel::forbidden().translate(localizer.as_ref());
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(error.message(), "Keep out");
        assert_eq!(error.error_text(), "forbidden");
    }

    #[test]
    fn test_error_text_has_its_own_translation() {
        let localizer = MessageCatalog::new("en")
            .with_message("en", "NotFoundError", "Nothing here")
            .with_message("en", "NotFoundErrorText", "no such row")
            .localizer_for(None);
        let error = ErrorModel::not_found().localize(localizer.as_ref());
        assert_eq!(error.message(), "Nothing here");
        assert_eq!(error.error_text(), "no such row");
    }

    #[test]
    fn test_caller_error_text_survives_message_translation() {
        let localizer = MessageCatalog::new("en")
            .with_message("en", "UnProcessableError", "Your request could not be processed")
            .localizer_for(None);
        let err = serde_json::from_str::<u32>("\"old\"").unwrap_err();
        let error = ErrorModel::from(err).localize(localizer.as_ref());
        assert_eq!(error.message(), "Your request could not be processed");
        assert!(error.error_text().contains("invalid type"));
    }

    #[test]
    fn test_caller_text_under_default_ids_is_kept() {
        let localizer = catalog_localizer();
        let error = ErrorModel::forbidden()
            .with_message("Only admins")
            .localize(localizer.as_ref());
        assert_eq!(error.message(), "Only admins");
    }

    #[test]
    fn test_custom_ids_are_localized_even_with_custom_text() {
        let localizer = catalog_localizer();
        let error = ErrorModel::conflict()
            .with_message("raw message")
            .with_message_id("CustomMessage")
            .with_error_id("CustomError")
            .localize(localizer.as_ref());
        assert_eq!(error.message(), "Custom localized");
        assert_eq!(error.error_text(), "custom error localized");
    }

    #[test]
    fn test_missing_translation_keeps_original_text() {
        let error = ErrorModel::not_found()
            .with_error_text("row 9")
            .localize(&NoopLocalizer);
        assert_eq!(error.message(), "The requested item was not found");
        assert_eq!(error.error_text(), "row 9");
    }

    #[test]
    fn test_empty_error_id_skips_localization() {
        let localizer = catalog_localizer();
        let error = ErrorModel::forbidden().with_error_id("");
        assert!(!error.needs_localization());
        let error = error.localize(localizer.as_ref());
        assert_eq!(error.message(), "You do not have access to this resource");
    }

    #[test]
    fn test_serialized_shape() {
        let error = ErrorModel::bad_request()
            .with_error("missing field")
            .with_detail(json!({ "field": "name" }));
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(value["type"], "bad_request");
        assert_eq!(value["message"], "The request is invalid");
        assert_eq!(value["error_text"], "missing field");
        assert_eq!(value["detail"]["field"], "name");
        assert!(value.get("errors").is_none());
        assert!(value.get("message_id").is_none());
    }

    #[test]
    fn test_field_errors_are_serialized() {
        let mut errors = FieldErrors::new();
        errors.insert("email".to_string(), json!("invalid"));
        let value = serde_json::to_value(ErrorModel::unprocessable().with_errors(errors)).unwrap();
        assert_eq!(value["errors"]["email"], "invalid");
        assert!(value["detail"].is_null());
    }

    #[test]
    fn test_display() {
        let display = ErrorModel::duplicate().with_error_text("email taken").to_string();
        assert!(display.contains("duplicate"));
        assert!(display.contains("email taken"));
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        let model: ErrorModel = err.into();
        assert_eq!(model.kind(), ErrorKind::UnProcessable);
        assert!(!model.error_text().is_empty());
    }

    #[test]
    fn test_error_is_error_trait() {
        let error: Box<dyn std::error::Error> = Box::new(ErrorModel::unauthorized());
        assert!(error.to_string().contains("unauthorized"));
    }

    #[test]
    fn test_into_response_status() {
        let response = ErrorModel::conflict().into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
