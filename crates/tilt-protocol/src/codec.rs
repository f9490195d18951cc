//! JSON codec for producer updates and consumer aggregates.
//!
//! Both endpoints speak plain JSON, one document per WebSocket message.

use std::sync::Arc;
use thiserror::Error;

use crate::messages::{Aggregate, ProducerUpdate};

/// Maximum size of a single inbound message (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// An encoded aggregate, shared by every consumer it is published to.
pub type Payload = Arc<str>;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Message exceeds maximum size.
    #[error("Message size {0} exceeds maximum {MAX_MESSAGE_SIZE}")]
    MessageTooLarge(usize),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode a producer update from a raw message.
///
/// # Errors
///
/// Returns an error if the message is too large or is not a valid update.
pub fn decode_update(data: &[u8]) -> Result<ProducerUpdate, ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge(data.len()));
    }
    Ok(serde_json::from_slice(data)?)
}

/// Encode a producer update.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_update(update: &ProducerUpdate) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(update)?)
}

/// Encode an aggregate for delivery to consumers.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_aggregate(aggregate: &Aggregate) -> Result<Payload, ProtocolError> {
    let json = serde_json::to_string(aggregate)?;
    Ok(Arc::from(json))
}

/// Decode an aggregate received from the consumer endpoint.
///
/// # Errors
///
/// Returns an error if the message is too large or is not a valid aggregate.
pub fn decode_aggregate(data: &[u8]) -> Result<Aggregate, ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge(data.len()));
    }
    Ok(serde_json::from_slice(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::DeviceOrientation;

    #[test]
    fn test_decode_update() {
        let update =
            decode_update(br#"{"ID":"1","username":"a","beta":0.5,"gamma":-0.2}"#).unwrap();
        assert_eq!(update, ProducerUpdate::new("1", "a", 0.5, -0.2));
    }

    #[test]
    fn test_decode_update_defaults_missing_fields() {
        let update = decode_update(br#"{"ID":"9"}"#).unwrap();
        assert_eq!(update.id, "9");
        assert_eq!(update.username, "");
        assert_eq!(update.beta, 0.0);
        assert_eq!(update.gamma, 0.0);
    }

    #[test]
    fn test_decode_update_ignores_unknown_fields() {
        let update =
            decode_update(br#"{"id":"3","username":"b","beta":1,"gamma":2,"alpha":90}"#).unwrap();
        assert_eq!(update, ProducerUpdate::new("3", "b", 1.0, 2.0));
    }

    #[test]
    fn test_decode_update_null_fields_are_empty() {
        let update =
            decode_update(br#"{"ID":"1","username":null,"beta":null,"gamma":0.25}"#).unwrap();
        assert_eq!(update, ProducerUpdate::new("1", "", 0.0, 0.25));

        assert_eq!(decode_update(b"null").unwrap(), ProducerUpdate::default());
    }

    #[test]
    fn test_decode_update_field_names_ignore_case() {
        let update =
            decode_update(br#"{"Id":"1","Username":"a","BETA":0.5,"Gamma":-0.2}"#).unwrap();
        assert_eq!(update, ProducerUpdate::new("1", "a", 0.5, -0.2));
    }

    #[test]
    fn test_decode_update_repeated_field_keeps_last() {
        let update = decode_update(br#"{"ID":"1","id":"2","username":"a","username":"b"}"#).unwrap();
        assert_eq!(update.id, "2");
        assert_eq!(update.username, "b");

        // A later null does not clear an earlier value.
        let update = decode_update(br#"{"beta":1.5,"Beta":null}"#).unwrap();
        assert_eq!(update.beta, 1.5);
    }

    #[test]
    fn test_decode_update_rejects_bad_input() {
        assert!(matches!(
            decode_update(b"not json"),
            Err(ProtocolError::Json(_))
        ));
        // ID must be a string.
        assert!(decode_update(br#"{"ID":1,"username":"a"}"#).is_err());
        assert!(decode_update(br#"{"ID":"1","beta":"steep"}"#).is_err());
        assert!(decode_update(b"[1]").is_err());
    }

    #[test]
    fn test_decode_update_too_large() {
        let data = vec![b' '; MAX_MESSAGE_SIZE + 1];
        assert!(matches!(
            decode_update(&data),
            Err(ProtocolError::MessageTooLarge(_))
        ));
    }

    #[test]
    fn test_encode_aggregate_wire_format() {
        let mut aggregate = Aggregate::new();
        aggregate.insert(
            1,
            DeviceOrientation {
                username: "a".into(),
                fb_tilt: 0.5,
                lr_tilt: -0.2,
                last_update: 7,
            },
        );

        let payload = encode_aggregate(&aggregate).unwrap();
        assert_eq!(
            &*payload,
            r#"{"1":{"username":"a","fb_tilt":0.5,"lr_tilt":-0.2,"last_update":7}}"#
        );
        assert_eq!(decode_aggregate(payload.as_bytes()).unwrap(), aggregate);
    }

    #[test]
    fn test_encode_aggregate_numeric_key_order() {
        let orientation = DeviceOrientation {
            username: String::new(),
            fb_tilt: 0.0,
            lr_tilt: 0.0,
            last_update: 0,
        };
        let aggregate: Aggregate = [(10, orientation.clone()), (2, orientation)]
            .into_iter()
            .collect();

        let payload = encode_aggregate(&aggregate).unwrap();
        let two = payload.find(r#""2":"#).unwrap();
        let ten = payload.find(r#""10":"#).unwrap();
        assert!(two < ten);
    }

    #[test]
    fn test_encode_empty_aggregate() {
        let payload = encode_aggregate(&Aggregate::new()).unwrap();
        assert_eq!(&*payload, "{}");
    }
}
