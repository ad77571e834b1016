//! Guarded JSON encode/decode.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::{ErrorContext, ErrorHandler, Severity};

#[derive(Debug, Error)]
pub enum JsonError {
    #[error("JSON parsing error: {source} (input: {preview:?})")]
    Parse {
        preview: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("JSON serialization error: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// First `len` characters of `text`, cut on a character boundary.
#[must_use]
pub fn preview(text: &str, len: usize) -> String {
    text.chars().take(len).collect()
}

#[derive(Debug, Clone)]
pub struct SafeJson {
    errors: ErrorHandler,
    preview_len: usize,
}

impl SafeJson {
    #[must_use]
    pub const fn new(errors: ErrorHandler, preview_len: usize) -> Self {
        Self {
            errors,
            preview_len,
        }
    }

    /// # Errors
    ///
    /// Returns [`JsonError::Parse`] with a truncated preview of the input.
    pub fn try_parse<T: DeserializeOwned>(&self, text: &str) -> Result<T, JsonError> {
        serde_json::from_str(text).map_err(|source| JsonError::Parse {
            preview: preview(text, self.preview_len),
            source,
        })
    }

    /// # Errors
    ///
    /// Returns [`JsonError::Serialize`] if the value cannot be encoded.
    pub fn try_stringify<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, JsonError> {
        serde_json::to_string(value).map_err(JsonError::Serialize)
    }

    /// Decode `text`, or report and return `default`.
    pub fn parse<T: DeserializeOwned>(&self, text: &str, default: T) -> T {
        match self.try_parse(text) {
            Ok(value) => value,
            Err(err) => {
                self.report(&err, "parse");
                default
            }
        }
    }

    /// Encode `value`, or report and return `default` (`"{}"` when `None`).
    pub fn stringify<T: Serialize + ?Sized>(&self, value: &T, default: Option<&str>) -> String {
        match self.try_stringify(value) {
            Ok(text) => text,
            Err(err) => {
                self.report(&err, "stringify");
                default.unwrap_or("{}").to_string()
            }
        }
    }

    fn report(&self, err: &JsonError, operation: &str) {
        self.errors.handle_error(
            err,
            ErrorContext::new().with("operation", operation),
            Severity::Medium,
        );
    }
}
