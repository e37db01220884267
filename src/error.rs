use thiserror::Error;

use crate::session::NegotiationState;

/// Wire payload could not be turned into a signaling message.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid signaling json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("signaling envelope is not a json object")]
    NotAnObject,
    #[error("signaling envelope has no string `type` field")]
    MissingType,
    #[error("`{tag}` payload is malformed: {reason}")]
    Payload { tag: &'static str, reason: String },
}

/// Failure reported by the media-transport engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("webrtc: {0}")]
    Webrtc(#[from] webrtc::Error),
    #[error("payload conversion failed: {0}")]
    Conversion(#[from] serde_json::Error),
    #[error("engine rejected {op}: {reason}")]
    Rejected { op: &'static str, reason: String },
    #[error("engine already released")]
    Released,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{op} is not valid in state {state:?}")]
    ProtocolViolation {
        op: &'static str,
        state: NegotiationState,
    },
    #[error("negotiation failed: {0}")]
    Negotiation(#[source] EngineError),
    #[error("session closed while the operation was in flight")]
    Cancelled,
    #[error("session is closed")]
    Closed,
}

impl SessionError {
    /// Fatal errors leave the session `Failed` and get it torn down.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Negotiation(_))
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("signaling transport closed")]
    Closed,
    #[error("signaling send failed: {0}")]
    Send(String),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("malformed message for {id}: {source}")]
    Malformed {
        id: String,
        #[source]
        source: CodecError,
    },
    #[error("no session for {id} to receive {op}")]
    UnknownSession { id: String, op: &'static str },
    #[error("session {id}: {source}")]
    Session {
        id: String,
        #[source]
        source: SessionError,
    },
    #[error("could not create engine for {id}: {source}")]
    Engine {
        id: String,
        #[source]
        source: EngineError,
    },
    #[error("send to {id} failed: {source}")]
    Transport {
        id: String,
        #[source]
        source: TransportError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ice server {0} has an empty url")]
    EmptyUrl(String),
    #[error("turn server {0} requires username and credential")]
    MissingTurnCredentials(String),
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value for {var}: {value}")]
    Env { var: &'static str, value: String },
}
