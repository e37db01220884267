//! Contract with the media-transport engine.
//!
//! The engine performs ICE/DTLS/SRTP; sessions only drive it through
//! [`PeerEngine`] and hear back from it through an [`EngineEventSink`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

use crate::codec::{CandidateBlob, SessionDescription};
use crate::error::EngineError;
use crate::peer::types::TrackInfo;

/// Transport state as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Failed | ConnectionState::Closed)
    }
}

#[async_trait]
pub trait PeerEngine: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError>;
    async fn create_answer(&self) -> Result<SessionDescription, EngineError>;
    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), EngineError>;
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), EngineError>;
    /// `None` signals end-of-candidates.
    async fn add_candidate(&self, candidate: Option<CandidateBlob>) -> Result<(), EngineError>;
    async fn close(&self) -> Result<(), EngineError>;
}

#[async_trait]
pub trait PeerEngineFactory: Send + Sync {
    async fn create(&self, events: EngineEventSink) -> Result<Arc<dyn PeerEngine>, EngineError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// `None` once gathering completed.
    LocalCandidate(Option<CandidateBlob>),
    ConnectionState(ConnectionState),
    Track(TrackInfo),
}

/// Engine event tagged with the session instance that produced it.
#[derive(Debug, Clone)]
pub struct EngineNotice {
    pub id: String,
    pub instance: String,
    pub event: EngineEvent,
}

/// Handed to an engine at creation; routes its callbacks to one session instance.
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    id: String,
    instance: String,
    tx: mpsc::UnboundedSender<EngineNotice>,
}

impl EngineEventSink {
    pub fn new(id: String, instance: String, tx: mpsc::UnboundedSender<EngineNotice>) -> Self {
        Self { id, instance, tx }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn emit(&self, event: EngineEvent) {
        let notice = EngineNotice {
            id: self.id.clone(),
            instance: self.instance.clone(),
            event,
        };
        if self.tx.send(notice).is_err() {
            trace!(session = %self.id, "engine event dropped, gateway gone");
        }
    }

    pub fn local_candidate(&self, candidate: Option<CandidateBlob>) {
        self.emit(EngineEvent::LocalCandidate(candidate));
    }

    pub fn connection_state(&self, state: ConnectionState) {
        self.emit(EngineEvent::ConnectionState(state));
    }

    pub fn track(&self, track: TrackInfo) {
        self.emit(EngineEvent::Track(track));
    }
}
