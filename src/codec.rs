//! Signaling envelope codec.
//!
//! One message per envelope, shaped `{"type": <tag>, "data": <payload>}`.
//! Payloads are opaque JSON values; the codec only checks the shape it
//! needs to pick a variant.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::CodecError;

pub const SDP_OFFER: &str = "sdp_offer";
pub const SDP_ANSWER: &str = "sdp_answer";
pub const ICE_CANDIDATE: &str = "ice_candidate";

/// Opaque session description, usually `{"type": "offer", "sdp": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionDescription(pub Value);

/// Opaque ICE candidate, usually `{"candidate": "...", "sdpMid": .., "sdpMLineIndex": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateBlob(pub Value);

impl CandidateBlob {
    /// Candidate line, if the blob carries one.
    pub fn candidate_line(&self) -> Option<&str> {
        self.0.get("candidate").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalingMessage {
    SdpOffer(SessionDescription),
    SdpAnswer(SessionDescription),
    /// `None` is the end-of-candidates marker.
    IceCandidate(Option<CandidateBlob>),
}

impl SignalingMessage {
    pub fn tag(&self) -> &'static str {
        match self {
            SignalingMessage::SdpOffer(_) => SDP_OFFER,
            SignalingMessage::SdpAnswer(_) => SDP_ANSWER,
            SignalingMessage::IceCandidate(_) => ICE_CANDIDATE,
        }
    }
}

/// Result of decoding one envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Message(SignalingMessage),
    /// A well-formed envelope with a tag this side does not speak.
    Unknown(String),
}

pub fn encode(message: &SignalingMessage) -> Result<String, CodecError> {
    let data = match message {
        SignalingMessage::SdpOffer(desc) | SignalingMessage::SdpAnswer(desc) => desc.0.clone(),
        SignalingMessage::IceCandidate(Some(candidate)) => candidate.0.clone(),
        SignalingMessage::IceCandidate(None) => Value::Null,
    };
    Ok(serde_json::to_string(&json!({
        "type": message.tag(),
        "data": data,
    }))?)
}

pub fn decode(wire: &str) -> Result<Decoded, CodecError> {
    let envelope: Value = serde_json::from_str(wire)?;
    let Value::Object(mut fields) = envelope else {
        return Err(CodecError::NotAnObject);
    };
    let tag = match fields.remove("type") {
        Some(Value::String(tag)) => tag,
        _ => return Err(CodecError::MissingType),
    };
    let data = fields.remove("data").unwrap_or(Value::Null);

    let message = match tag.as_str() {
        SDP_OFFER => SignalingMessage::SdpOffer(description(SDP_OFFER, data)?),
        SDP_ANSWER => SignalingMessage::SdpAnswer(description(SDP_ANSWER, data)?),
        ICE_CANDIDATE => SignalingMessage::IceCandidate(candidate(data)?),
        _ => return Ok(Decoded::Unknown(tag)),
    };
    Ok(Decoded::Message(message))
}

fn description(tag: &'static str, data: Value) -> Result<SessionDescription, CodecError> {
    match data {
        Value::Object(_) => Ok(SessionDescription(data)),
        other => Err(CodecError::Payload {
            tag,
            reason: format!("expected a session description object, got {}", kind(&other)),
        }),
    }
}

fn candidate(data: Value) -> Result<Option<CandidateBlob>, CodecError> {
    match data {
        Value::Null => Ok(None),
        Value::Object(ref fields) if is_end_marker(fields) => Ok(None),
        Value::Object(_) => Ok(Some(CandidateBlob(data))),
        other => Err(CodecError::Payload {
            tag: ICE_CANDIDATE,
            reason: format!("expected a candidate object or null, got {}", kind(&other)),
        }),
    }
}

// Browsers signal the end of gathering with an empty candidate line.
fn is_end_marker(fields: &Map<String, Value>) -> bool {
    fields.is_empty() || matches!(fields.get("candidate"), Some(Value::String(line)) if line.is_empty())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
