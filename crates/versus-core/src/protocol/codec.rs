//! JSON codec for the Versus wire envelope.
//!
//! Wire format: one JSON object per WebSocket text frame, discriminated by a
//! string `"type"` field.  See [`crate::protocol::messages`] for the shapes.
//!
//! # Tolerance rules
//!
//! | Input                                    | Result                          |
//! |------------------------------------------|---------------------------------|
//! | not JSON                                 | `Err(DecodeError::Malformed)`   |
//! | JSON without a string `"type"`           | `Err(DecodeError::MissingType)` |
//! | known `"type"`, payload does not fit     | `Err(DecodeError::InvalidPayload)` |
//! | unknown `"type"`                         | `Ok(Envelope::NoOp)`            |

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::protocol::messages::{Envelope, MessageKind};

/// Errors that can occur while decoding a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The bytes are not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The frame is JSON but carries no string `"type"` discriminator.
    #[error("frame has no \"type\" field")]
    MissingType,

    /// The `"type"` is recognised but the remaining fields do not match it.
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: &'static str, reason: String },
}

/// Errors that can occur while encoding an envelope.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// [`Envelope::NoOp`] only exists on the decode side.
    #[error("no_op envelopes cannot be sent")]
    NoOp,

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes an [`Envelope`] into the JSON text sent on the wire.
///
/// # Errors
///
/// Returns [`EncodeError::NoOp`] for [`Envelope::NoOp`].
///
/// # Examples
///
/// ```rust
/// use versus_core::{encode, Envelope, Seat};
///
/// let text = encode(&Envelope::init(Seat::Two)).unwrap();
/// assert_eq!(text, r#"{"type":"init","player":2}"#);
/// ```
pub fn encode(msg: &Envelope) -> Result<String, EncodeError> {
    if matches!(msg, Envelope::NoOp) {
        return Err(EncodeError::NoOp);
    }
    Ok(serde_json::to_string(msg)?)
}

/// Decodes one frame into an [`Envelope`].
///
/// # Errors
///
/// Returns [`DecodeError`] if the frame is not JSON, has no `"type"`, or
/// carries a known type with a payload that does not fit it.  An unknown
/// type is **not** an error.
///
/// # Examples
///
/// ```rust
/// use versus_core::{decode, Envelope};
///
/// assert_eq!(decode(br#"{"type":"start"}"#), Ok(Envelope::Start));
/// assert_eq!(decode(br#"{"type":"emote","id":3}"#), Ok(Envelope::NoOp));
/// assert!(decode(b"not json").is_err());
/// ```
pub fn decode(bytes: &[u8]) -> Result<Envelope, DecodeError> {
    let value = parse(bytes)?;

    let Some(kind) = kind_of(&value)? else {
        return Ok(Envelope::NoOp);
    };

    serde_json::from_value(value).map_err(|e| DecodeError::InvalidPayload {
        kind: kind.as_str(),
        reason: e.to_string(),
    })
}

/// Reads only the `"type"` of a frame, leaving its payload unchecked.
///
/// Returns `Ok(None)` for a type this build does not know.  Used where a
/// frame is forwarded without being interpreted, so game-specific `move`
/// payloads pass through even when [`decode`] would reject them.
///
/// # Errors
///
/// Returns [`DecodeError::Malformed`] or [`DecodeError::MissingType`] under
/// the same rules as [`decode`].
///
/// # Examples
///
/// ```rust
/// use versus_core::{peek_kind, MessageKind};
///
/// let frame = br#"{"type":"move","data":{"lines":3}}"#;
/// assert_eq!(peek_kind(frame), Ok(Some(MessageKind::Move)));
/// ```
pub fn peek_kind(bytes: &[u8]) -> Result<Option<MessageKind>, DecodeError> {
    kind_of(&parse(bytes)?)
}

fn parse(bytes: &[u8]) -> Result<Value, DecodeError> {
    serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))
}

fn kind_of(value: &Value) -> Result<Option<MessageKind>, DecodeError> {
    let type_name = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?;

    let kind = MessageKind::from_type(type_name);
    if kind.is_none() {
        debug!(message_type = type_name, "ignoring unrecognised message type");
    }
    Ok(kind)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
