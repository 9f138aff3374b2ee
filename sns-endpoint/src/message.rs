//! Decoded SNS messages and the timestamp format SNS uses.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::ExtractError;
use crate::extract::Fields;

/// `strftime` pattern for SNS timestamps, e.g. `2024-05-01T12:30:45.123Z`.
///
/// The fractional part is optional when parsing and omitted when formatting
/// a whole second.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// A notification delivered to a topic endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Optional subject line; empty when the publisher set none
    pub subject: String,
    /// The payload text
    pub message: String,
    /// SNS-assigned message identifier
    pub message_id: String,
    /// Publish time, or the Unix epoch when SNS sent an unparseable value
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Build a message from an extracted field set.
    ///
    /// `Timestamp`, `Message` and `MessageId` must be strings. `Subject` may be
    /// absent or null.
    pub fn from_fields(fields: &Fields) -> Result<Self, ExtractError> {
        let timestamp = required_str(fields, "Timestamp")?;
        let message = required_str(fields, "Message")?;
        let message_id = required_str(fields, "MessageId")?;
        let subject = fields
            .get("Subject")
            .and_then(Value::as_str)
            .unwrap_or_default();

        Ok(Self {
            subject: subject.to_string(),
            message: message.to_string(),
            message_id: message_id.to_string(),
            timestamp: parse_timestamp(timestamp).unwrap_or_default(),
        })
    }
}

/// What a topic handler receives for each accepted delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The subscription handshake completed; notifications will follow
    Confirmed,
    /// A notification arrived
    Message(Message),
}

impl Delivery {
    /// The message carried by this delivery, if any.
    pub fn message(&self) -> Option<&Message> {
        match self {
            Delivery::Confirmed => None,
            Delivery::Message(message) => Some(message),
        }
    }
}

/// Format an instant the way SNS writes timestamps.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse an SNS timestamp. Returns `None` if `value` does not match
/// [`TIMESTAMP_FORMAT`].
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

pub(crate) fn required_str<'a>(
    fields: &'a Fields,
    name: &'static str,
) -> Result<&'a str, ExtractError> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .ok_or(ExtractError::MissingField(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use proptest::prelude::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_parse_timestamp_with_millis() {
        let ts = parse_timestamp("2024-05-01T12:30:45.123Z").unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap()
            + chrono::Duration::milliseconds(123);
        assert_eq!(ts, expected);
    }

    #[test]
    fn test_parse_timestamp_without_fraction() {
        let ts = parse_timestamp("2024-05-01T12:30:45Z").unwrap();
        assert_eq!(ts.nanosecond(), 0);
        assert_eq!(format_timestamp(ts), "2024-05-01T12:30:45Z");
    }

    #[test]
    fn test_parse_timestamp_nanoseconds() {
        let ts = parse_timestamp("2012-04-25T21:49:25.719123456Z").unwrap();
        assert_eq!(ts.nanosecond(), 719_123_456);
    }

    #[test]
    fn test_parse_timestamp_rejects_other_formats() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("2024-05-01 12:30:45").is_none());
        assert!(parse_timestamp("2024-05-01T12:30:45+02:00").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_from_fields_full() {
        let fields = fields(json!({
            "Type": "Notification",
            "MessageId": "22b80b92-fdea-4c2c-8f9d-bdfb0c7bf324",
            "Subject": "My First Message",
            "Message": "Hello world!",
            "Timestamp": "2012-05-02T00:54:06.655Z",
        }));

        let message = Message::from_fields(&fields).unwrap();
        assert_eq!(message.subject, "My First Message");
        assert_eq!(message.message, "Hello world!");
        assert_eq!(message.message_id, "22b80b92-fdea-4c2c-8f9d-bdfb0c7bf324");
        assert_eq!(format_timestamp(message.timestamp), "2012-05-02T00:54:06.655Z");
    }

    #[test]
    fn test_from_fields_subject_absent_or_null() {
        let absent = fields(json!({
            "MessageId": "a",
            "Message": "body",
            "Timestamp": "2012-05-02T00:54:06.655Z",
        }));
        assert_eq!(Message::from_fields(&absent).unwrap().subject, "");

        let null = fields(json!({
            "MessageId": "a",
            "Subject": null,
            "Message": "body",
            "Timestamp": "2012-05-02T00:54:06.655Z",
        }));
        assert_eq!(Message::from_fields(&null).unwrap().subject, "");
    }

    #[test]
    fn test_from_fields_bad_timestamp_degrades_to_epoch() {
        let fields = fields(json!({
            "MessageId": "a",
            "Message": "body",
            "Timestamp": "not a time",
        }));

        let message = Message::from_fields(&fields).unwrap();
        assert_eq!(message.timestamp, DateTime::<Utc>::default());
        assert_eq!(message.timestamp.timestamp(), 0);
    }

    #[test]
    fn test_from_fields_missing_required() {
        let no_id = fields(json!({
            "Message": "body",
            "Timestamp": "2012-05-02T00:54:06.655Z",
        }));
        assert!(matches!(
            Message::from_fields(&no_id),
            Err(ExtractError::MissingField("MessageId"))
        ));

        let numeric_message = fields(json!({
            "MessageId": "a",
            "Message": 42,
            "Timestamp": "2012-05-02T00:54:06.655Z",
        }));
        assert!(matches!(
            Message::from_fields(&numeric_message),
            Err(ExtractError::MissingField("Message"))
        ));

        let no_timestamp = fields(json!({ "MessageId": "a", "Message": "body" }));
        assert!(matches!(
            Message::from_fields(&no_timestamp),
            Err(ExtractError::MissingField("Timestamp"))
        ));
    }

    #[test]
    fn test_delivery_message_accessor() {
        assert!(Delivery::Confirmed.message().is_none());

        let message = Message {
            subject: String::new(),
            message: "hi".to_string(),
            message_id: "id".to_string(),
            timestamp: Utc::now(),
        };
        let delivery = Delivery::Message(message.clone());
        assert_eq!(delivery.message(), Some(&message));
    }

    proptest! {
        #[test]
        fn prop_timestamp_round_trip(
            secs in 0i64..253_402_300_799,
            nanos in 0u32..1_000_000_000,
        ) {
            let original = DateTime::<Utc>::from_timestamp(secs, nanos).unwrap();
            let parsed = parse_timestamp(&format_timestamp(original));
            prop_assert_eq!(parsed, Some(original));
        }
    }
}
