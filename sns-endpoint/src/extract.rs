//! Field extraction from delivery bodies.
//!
//! Both delivery modes produce the same schema-less [`Fields`] map, so the
//! confirmation and notification flows read their fields the same way
//! regardless of how the body arrived.
//!
//! - Structured mode: the body is a JSON object of exactly `Content-Length`
//!   bytes.
//! - Raw mode (`x-amz-sns-rawdelivery: true`): the body is the message text
//!   itself. The remaining fields are synthesized from headers and the clock.

use chrono::Utc;
use serde_json::Value;
use warp::http::header::{HeaderMap, CONTENT_LENGTH};

use crate::error::ExtractError;
use crate::message::format_timestamp;

/// Header carrying the ARN of the topic that sent the delivery.
pub const TOPIC_ARN_HEADER: &str = "x-amz-sns-topic-arn";
/// Header naming the delivery type.
pub const MESSAGE_TYPE_HEADER: &str = "x-amz-sns-message-type";
/// Header set to `true` when the subscription uses raw message delivery.
pub const RAW_DELIVERY_HEADER: &str = "x-amz-sns-rawdelivery";
/// Header carrying the message id in raw delivery mode.
pub const MESSAGE_ID_HEADER: &str = "x-amz-sns-message-id";

/// Generic key/value view of a delivery body.
pub type Fields = serde_json::Map<String, Value>;

/// Extract the field set from a delivery.
pub fn extract_fields(headers: &HeaderMap, body: &[u8]) -> Result<Fields, ExtractError> {
    if is_raw_delivery(headers) {
        return Ok(raw_fields(headers, body));
    }

    let length = content_length(headers)?;
    let payload = body.get(..length).ok_or(ExtractError::TruncatedBody {
        expected: length,
        actual: body.len(),
    })?;

    match serde_json::from_slice(payload)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(ExtractError::NotAnObject),
    }
}

/// Read a header as a string, treating absent and non-UTF-8 values as empty.
pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

fn is_raw_delivery(headers: &HeaderMap) -> bool {
    header_str(headers, RAW_DELIVERY_HEADER) == "true"
}

fn content_length(headers: &HeaderMap) -> Result<usize, ExtractError> {
    let value = headers
        .get(CONTENT_LENGTH)
        .ok_or(ExtractError::MissingContentLength)?;
    let text = value
        .to_str()
        .map_err(|_| ExtractError::InvalidContentLength(format!("{value:?}")))?;
    text.trim()
        .parse()
        .map_err(|_| ExtractError::InvalidContentLength(text.to_string()))
}

fn raw_fields(headers: &HeaderMap, body: &[u8]) -> Fields {
    let mut fields = Fields::new();
    fields.insert("Subject".into(), Value::String(String::new()));
    fields.insert(
        "Message".into(),
        Value::String(String::from_utf8_lossy(body).into_owned()),
    );
    fields.insert(
        "MessageId".into(),
        Value::String(header_str(headers, MESSAGE_ID_HEADER).to_string()),
    );
    fields.insert(
        "Timestamp".into(),
        Value::String(format_timestamp(Utc::now())),
    );
    fields
}
