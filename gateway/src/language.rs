//! Message localization
//!
//! The gateway never owns translation bundles; it talks to a [`Localizer`]
//! capability chosen per request. [`MessageCatalog`] is a small in-memory
//! implementation that picks a language from an `Accept-Language` header.
//!
//! Message text may contain `{name}` placeholders, filled from a JSON object
//! passed as params.
//!
//! # Example
//!
//! ```rust
//! use handler_gateway::language::{Localizer, MessageCatalog};
//! use serde_json::json;
//!
//! let catalog = MessageCatalog::new("en")
//!     .with_message("en", "Greeting", "Hello {name}")
//!     .with_message("fa", "Greeting", "سلام {name}");
//!
//! let localizer = catalog.localizer_for(Some("fa-IR, en;q=0.5"));
//! let params = json!({ "name": "Ali" });
//! assert_eq!(localizer.localize("Greeting", "Hi", Some(&params)), "سلام Ali");
//! assert_eq!(localizer.localize("Missing", "Fallback", None), "Fallback");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Translates message ids into user-facing text
pub trait Localizer: Send + Sync + fmt::Debug {
    /// Look up and render the message `id`, `None` when there is no translation
    fn lookup(&self, id: &str, params: Option<&Value>) -> Option<String>;

    /// Render `id`, falling back to `fallback` when no translation exists
    fn localize(&self, id: &str, fallback: &str, params: Option<&Value>) -> String {
        match self.lookup(id, params) {
            Some(message) => message,
            None => {
                tracing::trace!(message_id = %id, "no translation, using fallback text");
                render(fallback, params)
            }
        }
    }

    /// Render `id`, using the id itself as the fallback
    fn translate(&self, id: &str, params: Option<&Value>) -> String {
        self.localize(id, id, params)
    }
}

/// Localizer without translations; every message falls back
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLocalizer;

impl Localizer for NoopLocalizer {
    fn lookup(&self, _id: &str, _params: Option<&Value>) -> Option<String> {
        None
    }
}

type Messages = HashMap<String, String>;

/// In-memory translations keyed by language tag
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    default_language: String,
    languages: HashMap<String, Arc<Messages>>,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::new("en")
    }
}

impl MessageCatalog {
    /// Create an empty catalog
    pub fn new(default_language: impl Into<String>) -> Self {
        Self {
            default_language: normalize_tag(&default_language.into()),
            languages: HashMap::new(),
        }
    }

    /// Replace the fallback language
    #[must_use]
    pub fn with_default_language(mut self, language: &str) -> Self {
        self.default_language = normalize_tag(language);
        self
    }

    /// Add one message
    #[must_use]
    pub fn with_message(
        mut self,
        language: &str,
        id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.insert(language, id, text);
        self
    }

    /// Add every message of an iterator for one language
    #[must_use]
    pub fn with_messages<I, K, V>(mut self, language: &str, messages: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (id, text) in messages {
            self.insert(language, id, text);
        }
        self
    }

    /// Add or replace one message
    pub fn insert(&mut self, language: &str, id: impl Into<String>, text: impl Into<String>) {
        let messages = self.languages.entry(normalize_tag(language)).or_default();
        Arc::make_mut(messages).insert(id.into(), text.into());
    }

    /// Language used when nothing in `Accept-Language` matches
    #[must_use]
    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Whether the catalog has messages for `language`
    #[must_use]
    pub fn supports(&self, language: &str) -> bool {
        self.languages.contains_key(&normalize_tag(language))
    }

    /// Pick the best language for an `Accept-Language` header value
    ///
    /// Tags are tried by descending weight; for each, an exact match wins over
    /// its primary subtag (`fa-IR` then `fa`).
    #[must_use]
    pub fn negotiate(&self, accept_language: Option<&str>) -> String {
        let preferred = accept_language.map(parse_accept_language).unwrap_or_default();
        for tag in preferred {
            if self.languages.contains_key(&tag) {
                return tag;
            }
            if let Some((primary, _)) = tag.split_once('-') {
                if self.languages.contains_key(primary) {
                    return primary.to_string();
                }
            }
        }
        self.default_language.clone()
    }

    /// Localizer for an `Accept-Language` header value
    #[must_use]
    pub fn localizer_for(&self, accept_language: Option<&str>) -> Arc<dyn Localizer> {
        let language = self.negotiate(accept_language);
        let messages = self.languages.get(&language).cloned().unwrap_or_default();
        Arc::new(CatalogLocalizer { language, messages })
    }
}

/// Localizer bound to one language of a [`MessageCatalog`]
#[derive(Debug, Clone)]
pub struct CatalogLocalizer {
    language: String,
    messages: Arc<Messages>,
}

impl CatalogLocalizer {
    /// Language this localizer renders
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }
}

impl Localizer for CatalogLocalizer {
    fn lookup(&self, id: &str, params: Option<&Value>) -> Option<String> {
        self.messages.get(id).map(|text| render(text, params))
    }
}

/// Substitute `{name}` placeholders from a JSON object
fn render(text: &str, params: Option<&Value>) -> String {
    let Some(Value::Object(map)) = params else {
        return text.to_string();
    };
    map.iter().fold(text.to_string(), |acc, (key, value)| {
        let replacement = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        acc.replace(&format!("{{{key}}}"), &replacement)
    })
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().replace('_', "-").to_ascii_lowercase()
}

/// Parse an `Accept-Language` header into tags ordered by descending weight
fn parse_accept_language(header: &str) -> Vec<String> {
    let mut weighted: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|entry| {
            let mut pieces = entry.split(';');
            let tag = normalize_tag(pieces.next()?);
            if tag.is_empty() || tag == "*" {
                return None;
            }
            let weight = pieces
                .find_map(|p| p.trim().strip_prefix("q="))
                .and_then(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            (weight > 0.0).then_some((tag, weight))
        })
        .collect();

    // sort_by is stable, so equal weights keep header order
    weighted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    weighted.into_iter().map(|(tag, _)| tag).collect()
}
