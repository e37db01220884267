//! Negotiation state machine for one participant.
//!
//! Offerer path: `Idle → LocalOfferCreated → AwaitingAnswer → Connected`.
//! Answerer path: `Idle → RemoteOfferReceived → AnswerCreated → Connected`.
//! `Closed` and `Failed` absorb from anywhere.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::candidate_buffer::{BufferSealed, CandidateBuffer, RemoteCandidate};
use crate::codec::{CandidateBlob, SessionDescription, SignalingMessage};
use crate::engine::{ConnectionState, PeerEngine};
use crate::error::{EngineError, SessionError};
use crate::peer::types::TrackInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Offerer,
    Answerer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    LocalOfferCreated,
    AwaitingAnswer,
    RemoteOfferReceived,
    AnswerCreated,
    Connected,
    Closed,
    Failed,
}

impl NegotiationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NegotiationState::Closed | NegotiationState::Failed)
    }
}

/// Message a session wants relayed, tagged with the session's identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub id: String,
    pub message: SignalingMessage,
}

pub struct PeerSession {
    id: String,
    instance: String,
    role: Option<Role>,
    state: NegotiationState,
    connection_state: ConnectionState,
    remote_description_set: bool,
    end_of_candidates: bool,
    buffer: CandidateBuffer,
    tracks: Vec<TrackInfo>,
    engine: Option<Arc<dyn PeerEngine>>,
    outbound: mpsc::UnboundedSender<Outbound>,
    // set once the session is closed, failed or removed; results that land
    // afterwards are dropped
    retired: Arc<AtomicBool>,
}

impl PeerSession {
    pub fn new(
        id: String,
        instance: String,
        engine: Arc<dyn PeerEngine>,
        outbound: mpsc::UnboundedSender<Outbound>,
        retired: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            instance,
            role: None,
            state: NegotiationState::Idle,
            connection_state: ConnectionState::New,
            remote_description_set: false,
            end_of_candidates: false,
            buffer: CandidateBuffer::new(),
            tracks: Vec::new(),
            engine: Some(engine),
            outbound,
            retired,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn negotiation_state(&self) -> NegotiationState {
        self.state
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn remote_description_set(&self) -> bool {
        self.remote_description_set
    }

    pub fn pending_candidates(&self) -> &[RemoteCandidate] {
        self.buffer.pending()
    }

    pub fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Engine still held by the session; `false` once released.
    pub fn holds_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Exhaustive dispatch of a decoded inbound message.
    pub async fn handle_message(&mut self, message: SignalingMessage) -> Result<(), SessionError> {
        match message {
            SignalingMessage::SdpOffer(offer) => self.on_remote_offer(offer).await,
            SignalingMessage::SdpAnswer(answer) => self.on_remote_answer(answer).await,
            SignalingMessage::IceCandidate(candidate) => self.on_remote_candidate(candidate).await,
        }
    }

    pub async fn create_offer(&mut self) -> Result<(), SessionError> {
        self.expect(NegotiationState::Idle, "create_offer")?;
        let engine = self.engine()?;
        self.role = Some(Role::Offerer);

        let offer = self.guard(engine.create_offer().await)?;
        self.state = NegotiationState::LocalOfferCreated;
        self.guard(engine.set_local_description(offer.clone()).await)?;

        self.state = NegotiationState::AwaitingAnswer;
        self.emit(SignalingMessage::SdpOffer(offer));
        info!(session = %self.id, "offer sent, awaiting answer");
        Ok(())
    }

    pub async fn on_remote_offer(&mut self, offer: SessionDescription) -> Result<(), SessionError> {
        self.expect(NegotiationState::Idle, "remote offer")?;
        let engine = self.engine()?;
        self.role = Some(Role::Answerer);
        debug!(session = %self.id, "received remote offer");

        self.guard(engine.set_remote_description(offer).await)?;
        self.remote_description_set = true;
        self.state = NegotiationState::RemoteOfferReceived;
        self.flush_candidates(&engine).await?;

        let answer = self.guard(engine.create_answer().await)?;
        self.state = NegotiationState::AnswerCreated;
        // the answer only goes out once it is the local description
        self.guard(engine.set_local_description(answer.clone()).await)?;

        self.emit(SignalingMessage::SdpAnswer(answer));
        self.state = NegotiationState::Connected;
        info!(session = %self.id, "answer sent");
        Ok(())
    }

    pub async fn on_remote_answer(&mut self, answer: SessionDescription) -> Result<(), SessionError> {
        self.expect(NegotiationState::AwaitingAnswer, "remote answer")?;
        let engine = self.engine()?;

        self.guard(engine.set_remote_description(answer).await)?;
        self.remote_description_set = true;
        self.flush_candidates(&engine).await?;

        self.state = NegotiationState::Connected;
        info!(session = %self.id, "answer applied");
        Ok(())
    }

    pub async fn on_remote_candidate(&mut self, candidate: RemoteCandidate) -> Result<(), SessionError> {
        if self.state.is_terminal() {
            return Err(SessionError::Closed);
        }
        if self.end_of_candidates {
            warn!(session = %self.id, "candidate after end-of-candidates ignored");
            return Ok(());
        }
        if !self.remote_description_set {
            match self.buffer.enqueue(candidate) {
                Ok(()) => debug!(
                    session = %self.id,
                    pending = self.buffer.len(),
                    "remote description not set yet, candidate queued"
                ),
                Err(BufferSealed(_)) => warn!(session = %self.id, "candidate buffer sealed, dropping"),
            }
            return Ok(());
        }

        let engine = self.engine()?;
        let end = candidate.is_none();
        self.guard(engine.add_candidate(candidate).await)?;
        if end {
            debug!(session = %self.id, "remote end-of-candidates applied");
            self.end_of_candidates = true;
        }
        Ok(())
    }

    /// Relay a locally gathered candidate as soon as the engine produces it.
    pub fn on_local_candidate_gathered(&mut self, candidate: Option<CandidateBlob>) {
        if self.state.is_terminal() {
            debug!(session = %self.id, "local candidate after close dropped");
            return;
        }
        self.emit(SignalingMessage::IceCandidate(candidate));
    }

    /// Returns `true` when the session has to be torn down.
    pub fn on_connection_state_changed(&mut self, state: ConnectionState) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.connection_state = state;
        if !state.is_terminal() {
            return false;
        }
        if state == ConnectionState::Failed {
            warn!(session = %self.id, "transport failed");
            self.state = NegotiationState::Failed;
        } else {
            warn!(session = %self.id, "transport closed underneath the session");
        }
        self.retire();
        true
    }

    pub fn on_track(&mut self, track: TrackInfo) {
        if !self.state.is_terminal() {
            self.tracks.push(track);
        }
    }

    /// Release the engine and drop buffered candidates. Safe to call twice.
    pub async fn close(&mut self) {
        self.retire();
        self.buffer.clear();
        if let Some(engine) = self.engine.take() {
            if let Err(err) = engine.close().await {
                warn!(session = %self.id, error = %err, "engine close failed");
            }
            info!(session = %self.id, from = ?self.state, "session closed");
        }
        self.state = NegotiationState::Closed;
        self.connection_state = ConnectionState::Closed;
    }

    async fn flush_candidates(&mut self, engine: &Arc<dyn PeerEngine>) -> Result<(), SessionError> {
        let id = self.id.clone();
        let retired = self.retired.clone();
        let mut ended = self.end_of_candidates;
        let result = self
            .buffer
            .flush_into(|candidate| {
                let skip = ended;
                ended |= candidate.is_none();
                let engine = engine.clone();
                let id = id.clone();
                let retired = retired.clone();
                async move {
                    if retired.load(Ordering::Acquire) {
                        debug!(session = %id, "session retired mid-flush, candidate not applied");
                        return Ok(());
                    }
                    if skip {
                        warn!(session = %id, "buffered candidate after end-of-candidates ignored");
                        return Ok(());
                    }
                    engine.add_candidate(candidate).await
                }
            })
            .await;
        self.end_of_candidates = ended;
        let applied = self.guard(result)?;
        debug!(session = %self.id, applied, "flushed buffered candidates");
        Ok(())
    }

    fn expect(&self, expected: NegotiationState, op: &'static str) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else if self.state.is_terminal() {
            Err(SessionError::Closed)
        } else {
            Err(SessionError::ProtocolViolation {
                op,
                state: self.state,
            })
        }
    }

    fn engine(&self) -> Result<Arc<dyn PeerEngine>, SessionError> {
        self.engine.clone().ok_or(SessionError::Closed)
    }

    // Applies after every engine await: a retired session discards the
    // result, an engine error fails the session.
    fn guard<T>(&mut self, result: Result<T, EngineError>) -> Result<T, SessionError> {
        if self.is_retired() {
            debug!(session = %self.id, "discarding result for retired session");
            return Err(SessionError::Cancelled);
        }
        result.map_err(|err| self.fail(err))
    }

    fn fail(&mut self, err: EngineError) -> SessionError {
        warn!(session = %self.id, state = ?self.state, error = %err, "negotiation failed");
        self.state = NegotiationState::Failed;
        self.buffer.clear();
        self.retire();
        SessionError::Negotiation(err)
    }

    fn emit(&self, message: SignalingMessage) {
        if self.is_retired() {
            debug!(session = %self.id, kind = message.tag(), "not relaying for retired session");
            return;
        }
        let outbound = Outbound {
            id: self.id.clone(),
            message,
        };
        if self.outbound.send(outbound).is_err() {
            warn!(session = %self.id, "outbound queue closed");
        }
    }

    fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }
}
