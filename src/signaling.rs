//! Signaling gateway: inbound envelopes → sessions, session output → transport.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::codec::{self, Decoded, SignalingMessage};
use crate::config::PlayerConfig;
use crate::engine::{EngineEvent, EngineNotice, PeerEngineFactory};
use crate::error::{GatewayError, SessionError, TransportError};
use crate::events::SessionObserver;
use crate::logger::dump_candidate;
use crate::registry::{SessionHandle, SessionRegistry};
use crate::session::Outbound;
use crate::utils::channel_name;

/// Outward half of the signaling channel. Delivery and retries are the
/// transport's business.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    async fn send(&self, id: &str, envelope: String) -> Result<(), TransportError>;
}

/// Envelope received for one participant.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: String,
    pub payload: String,
}

/// Envelope ready to be published on its participant's channel.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEnvelope {
    pub channel: String,
    pub id: String,
    pub payload: String,
}

/// Transport that hands envelopes to an mpsc receiver owned by the embedder.
pub struct ChannelTransport {
    prefix: String,
    tx: mpsc::UnboundedSender<OutboundEnvelope>,
}

impl ChannelTransport {
    pub fn new(prefix: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<OutboundEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                prefix: prefix.into(),
                tx,
            },
            rx,
        )
    }

    /// Channels named after the configured `channel_prefix`.
    pub fn from_config(config: &PlayerConfig) -> (Self, mpsc::UnboundedReceiver<OutboundEnvelope>) {
        Self::new(config.channel_prefix.clone())
    }
}

#[async_trait]
impl SignalingTransport for ChannelTransport {
    async fn send(&self, id: &str, envelope: String) -> Result<(), TransportError> {
        let envelope = OutboundEnvelope {
            channel: channel_name(&self.prefix, id),
            id: id.to_string(),
            payload: envelope,
        };
        self.tx.send(envelope).map_err(|_| TransportError::Closed)
    }
}

pub struct SignalingGateway {
    registry: Arc<SessionRegistry>,
    transport: Arc<dyn SignalingTransport>,
    accept_remote_sessions: bool,
    outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    notice_rx: mpsc::UnboundedReceiver<EngineNotice>,
}

impl SignalingGateway {
    pub fn new(
        config: &PlayerConfig,
        factory: Arc<dyn PeerEngineFactory>,
        transport: Arc<dyn SignalingTransport>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let registry = SessionRegistry::new(factory, observer, outbound_tx, notice_tx);
        Self {
            registry: Arc::new(registry),
            transport,
            accept_remote_sessions: config.accept_remote_sessions,
            outbound_rx,
            notice_rx,
        }
    }

    /// Registry handle for the UI lifecycle (`mount` / `unmount`).
    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    /// Mount `id` and start negotiating as the offerer.
    pub async fn start_offer(&self, id: &str) -> Result<(), GatewayError> {
        let handle = self.registry.mount(id).await.map_err(|source| GatewayError::Engine {
            id: id.to_string(),
            source,
        })?;
        let result = handle.lock().await.create_offer().await;
        self.settle(&handle, result).await
    }

    /// Decode one envelope received for `id` and apply it to that session.
    pub async fn handle_inbound(&self, id: &str, payload: &str) -> Result<(), GatewayError> {
        let message = match codec::decode(payload) {
            Ok(Decoded::Message(message)) => message,
            Ok(Decoded::Unknown(tag)) => {
                warn!(session = %id, tag = %tag, "unknown signaling type dropped");
                return Ok(());
            }
            Err(source) => {
                return Err(GatewayError::Malformed {
                    id: id.to_string(),
                    source,
                })
            }
        };
        if let SignalingMessage::IceCandidate(Some(candidate)) = &message {
            dump_candidate("remote", candidate);
        }

        let handle = self.route(id, &message).await?;
        let result = handle.lock().await.handle_message(message).await;
        self.settle(&handle, result).await
    }

    /// Apply an engine event to the session instance that produced it.
    pub async fn handle_notice(&self, notice: EngineNotice) {
        let EngineNotice {
            id,
            instance,
            event,
        } = notice;
        let handle = match self.registry.get(&id).await {
            Some(handle) if handle.instance() == instance && !handle.is_retired() => handle,
            _ => {
                debug!(session = %id, instance = %instance, "engine event for stale session dropped");
                return;
            }
        };

        let observer = self.registry.observer();
        match event {
            EngineEvent::LocalCandidate(candidate) => {
                if let Some(candidate) = &candidate {
                    dump_candidate("local", candidate);
                }
                handle.lock().await.on_local_candidate_gathered(candidate);
            }
            EngineEvent::ConnectionState(state) => {
                let teardown = handle.lock().await.on_connection_state_changed(state);
                info!(session = %id, state = ?state, "connection state changed");
                observer.on_connection_state(&id, state);
                if teardown {
                    self.registry.remove_instance(&id, &instance).await;
                }
            }
            EngineEvent::Track(track) => {
                info!(session = %id, track = %track.id, kind = ?track.kind, "remote track");
                handle.lock().await.on_track(track.clone());
                observer.on_track(&id, &track);
            }
        }
    }

    /// Encode a session's message and send it on that session's scope.
    pub async fn forward(&self, outbound: Outbound) -> Result<(), GatewayError> {
        let Outbound { id, message } = outbound;
        let wire = codec::encode(&message).map_err(|source| GatewayError::Malformed {
            id: id.clone(),
            source,
        })?;
        debug!(session = %id, kind = message.tag(), "sending");
        self.transport
            .send(&id, wire)
            .await
            .map_err(|source| GatewayError::Transport { id, source })
    }

    /// Drain queued engine events and outbound messages. Returns how many
    /// items were processed.
    pub async fn pump(&mut self) -> usize {
        let mut processed = 0;
        loop {
            let before = processed;
            while let Ok(notice) = self.notice_rx.try_recv() {
                self.handle_notice(notice).await;
                processed += 1;
            }
            while let Ok(outbound) = self.outbound_rx.try_recv() {
                if let Err(err) = self.forward(outbound).await {
                    log_error(&err);
                }
                processed += 1;
            }
            if processed == before {
                return processed;
            }
        }
    }

    /// Serve until `inbound` closes, then close every session.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<InboundMessage>) {
        info!("signaling gateway started");
        loop {
            tokio::select! {
                biased;
                Some(outbound) = self.outbound_rx.recv() => {
                    if let Err(err) = self.forward(outbound).await {
                        log_error(&err);
                    }
                }
                Some(notice) = self.notice_rx.recv() => self.handle_notice(notice).await,
                message = inbound.recv() => match message {
                    Some(InboundMessage { id, payload }) => {
                        if let Err(err) = self.handle_inbound(&id, &payload).await {
                            log_error(&err);
                        }
                    }
                    None => break,
                },
            }
        }
        self.pump().await;
        self.registry.close_all().await;
        info!("signaling gateway stopped");
    }

    async fn route(&self, id: &str, message: &SignalingMessage) -> Result<SessionHandle, GatewayError> {
        // only an offer opens a session; answers and trailing candidates for
        // an unmounted id must not bring an engine back
        let may_create =
            self.accept_remote_sessions && matches!(message, SignalingMessage::SdpOffer(_));
        if !may_create {
            return self
                .registry
                .get(id)
                .await
                .ok_or_else(|| GatewayError::UnknownSession {
                    id: id.to_string(),
                    op: message.tag(),
                });
        }
        self.registry
            .get_or_create(id)
            .await
            .map_err(|source| GatewayError::Engine {
                id: id.to_string(),
                source,
            })
    }

    async fn settle(
        &self,
        handle: &SessionHandle,
        result: Result<(), SessionError>,
    ) -> Result<(), GatewayError> {
        let Err(source) = result else {
            return Ok(());
        };
        if source.is_fatal() {
            self.registry.remove_instance(handle.id(), handle.instance()).await;
        }
        Err(GatewayError::Session {
            id: handle.id().to_string(),
            source,
        })
    }
}

fn log_error(err: &GatewayError) {
    match err {
        GatewayError::Session { source, .. } if source.is_fatal() => error!("{err}"),
        GatewayError::Session {
            source: SessionError::Cancelled,
            ..
        } => debug!("{err}"),
        _ => warn!("{err}"),
    }
}
