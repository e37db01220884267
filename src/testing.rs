//! Scripted collaborators for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::codec::{self, CandidateBlob, Decoded, SessionDescription, SignalingMessage};
use crate::engine::{ConnectionState, EngineEventSink, PeerEngine, PeerEngineFactory};
use crate::error::{EngineError, TransportError};
use crate::events::SessionObserver;
use crate::peer::types::TrackInfo;
use crate::signaling::SignalingTransport;

pub const MALFORMED_SDP: &str = "malformed";
pub const BAD_CANDIDATE: &str = "bad";

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    CreateOffer,
    CreateAnswer,
    SetLocal(Value),
    SetRemote(Value),
    AddCandidate(Option<Value>),
    Close,
}

pub fn offer_blob() -> SessionDescription {
    SessionDescription(json!({ "type": "offer", "sdp": "mock-offer" }))
}

pub fn answer_blob() -> SessionDescription {
    SessionDescription(json!({ "type": "answer", "sdp": "mock-answer" }))
}

pub fn candidate(line: &str) -> CandidateBlob {
    CandidateBlob(json!({ "candidate": line, "sdpMid": "0", "sdpMLineIndex": 0 }))
}

/// Records every call; rejects descriptions whose sdp is [`MALFORMED_SDP`]
/// and candidates whose line contains [`BAD_CANDIDATE`].
#[derive(Default)]
pub struct MockEngine {
    calls: Mutex<Vec<EngineCall>>,
    answer_gate: Option<Arc<Notify>>,
    // raised by the first add_candidate, as if the session were closed meanwhile
    retire_on_candidate: Option<Arc<AtomicBool>>,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `create_answer` waits for the gate before returning.
    pub fn gated(gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            answer_gate: Some(gate),
            ..Default::default()
        })
    }

    pub fn retiring_on_candidate(flag: Arc<AtomicBool>) -> Arc<Self> {
        Arc::new(Self {
            retire_on_candidate: Some(flag),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn close_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| **call == EngineCall::Close)
            .count()
    }

    pub fn applied_candidates(&self) -> Vec<Option<Value>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                EngineCall::AddCandidate(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PeerEngine for MockEngine {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError> {
        self.record(EngineCall::CreateOffer);
        Ok(offer_blob())
    }

    async fn create_answer(&self) -> Result<SessionDescription, EngineError> {
        self.record(EngineCall::CreateAnswer);
        if let Some(gate) = &self.answer_gate {
            gate.notified().await;
        }
        Ok(answer_blob())
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), EngineError> {
        self.record(EngineCall::SetLocal(desc.0));
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), EngineError> {
        self.record(EngineCall::SetRemote(desc.0.clone()));
        match desc.0.get("sdp").and_then(Value::as_str) {
            Some(sdp) if sdp != MALFORMED_SDP => Ok(()),
            _ => Err(EngineError::Rejected {
                op: "set_remote_description",
                reason: "unparsable sdp".into(),
            }),
        }
    }

    async fn add_candidate(&self, candidate: Option<CandidateBlob>) -> Result<(), EngineError> {
        let bad = candidate
            .as_ref()
            .and_then(CandidateBlob::candidate_line)
            .is_some_and(|line| line.contains(BAD_CANDIDATE));
        self.record(EngineCall::AddCandidate(candidate.map(|c| c.0)));
        if let Some(flag) = &self.retire_on_candidate {
            flag.store(true, Ordering::SeqCst);
        }
        if bad {
            return Err(EngineError::Rejected {
                op: "add_candidate",
                reason: "unparsable candidate".into(),
            });
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.record(EngineCall::Close);
        Ok(())
    }
}

/// Hands out [`MockEngine`]s and keeps the latest engine and sink per id.
#[derive(Default)]
pub struct MockFactory {
    engines: Mutex<HashMap<String, Arc<MockEngine>>>,
    sinks: Mutex<HashMap<String, EngineEventSink>>,
    created: Mutex<usize>,
    answer_gate: Option<Arc<Notify>>,
    fail_create: AtomicBool,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gated(gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            answer_gate: Some(gate),
            ..Default::default()
        })
    }

    pub fn fail_next(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn engine(&self, id: &str) -> Arc<MockEngine> {
        self.engines.lock()[id].clone()
    }

    pub fn sink(&self, id: &str) -> EngineEventSink {
        self.sinks.lock()[id].clone()
    }

    pub fn created(&self) -> usize {
        *self.created.lock()
    }
}

#[async_trait]
impl PeerEngineFactory for MockFactory {
    async fn create(&self, events: EngineEventSink) -> Result<Arc<dyn PeerEngine>, EngineError> {
        if self.fail_create.swap(false, Ordering::SeqCst) {
            return Err(EngineError::Rejected {
                op: "create",
                reason: "no engine available".into(),
            });
        }
        let engine = match &self.answer_gate {
            Some(gate) => MockEngine::gated(gate.clone()),
            None => MockEngine::new(),
        };
        let id = events.id().to_string();
        self.engines.lock().insert(id.clone(), engine.clone());
        self.sinks.lock().insert(id, events);
        *self.created.lock() += 1;
        Ok(engine)
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    /// Decoded messages sent for `id`, in send order.
    pub fn messages(&self, id: &str) -> Vec<SignalingMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|(to, _)| to == id)
            .filter_map(|(_, wire)| match codec::decode(wire) {
                Ok(Decoded::Message(message)) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn take(&self) -> Vec<(String, String)> {
        std::mem::take(&mut *self.sent.lock())
    }
}

#[async_trait]
impl SignalingTransport for RecordingTransport {
    async fn send(&self, id: &str, envelope: String) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Send("link down".into()));
        }
        self.sent.lock().push((id.to_string(), envelope));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Track(String, TrackInfo),
    State(String, ConnectionState),
    Removed(String),
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Observed> {
        self.events.lock().clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_track(&self, id: &str, track: &TrackInfo) {
        self.events.lock().push(Observed::Track(id.into(), track.clone()));
    }

    fn on_connection_state(&self, id: &str, state: ConnectionState) {
        self.events.lock().push(Observed::State(id.into(), state));
    }

    fn on_removed(&self, id: &str) {
        self.events.lock().push(Observed::Removed(id.into()));
    }
}
