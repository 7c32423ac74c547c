//! Digging a JSON object out of a free-text model answer.
//!
//! The extraction service wraps its answers in explanatory prose often
//! enough that parsing the whole response is a losing game. The convention
//! used by every call site: take the span from the first `{` to the last
//! `}` and parse only that, ignoring whatever reasoning text surrounds it.

use serde::de::DeserializeOwned;

/// Errors from decoding a model answer into a typed shape.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("response contains no JSON object")]
    NoObject,

    #[error("embedded JSON is invalid: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Parse the brace-delimited span of `text` into `T`.
///
/// `T`'s required fields act as the shape validator: a span that parses as
/// JSON but is missing a required key still fails with `Invalid`.
pub fn extract_json_object<T: DeserializeOwned>(text: &str) -> Result<T, DecodeError> {
    let start = text.find('{').ok_or(DecodeError::NoObject)?;
    let end = text.rfind('}').ok_or(DecodeError::NoObject)?;
    if end < start {
        return Err(DecodeError::NoObject);
    }

    let span = &text[start..=end];
    Ok(serde_json::from_str(span)?)
}
