use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_remote::TrackRemote;

use crate::codec::{CandidateBlob, SessionDescription};
use crate::config::PlayerConfig;
use crate::engine::{ConnectionState, EngineEventSink, PeerEngine, PeerEngineFactory};
use crate::error::EngineError;
use crate::peer::ice::{ice_servers, local_candidate_blob, remote_candidate_init};
use crate::peer::types::{MediaKind, TrackInfo};

/// Builds one webrtc-rs peer connection per session.
pub struct RtcEngineFactory {
    api: API,
    config: PlayerConfig,
}

impl RtcEngineFactory {
    pub fn new(config: PlayerConfig) -> Result<Self, EngineError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();
        Ok(Self { api, config })
    }

    fn rtc_config(&self) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: ice_servers(&self.config.ice_servers),
            bundle_policy: RTCBundlePolicy::MaxBundle,
            rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
            ..Default::default()
        }
    }
}

#[async_trait]
impl PeerEngineFactory for RtcEngineFactory {
    async fn create(&self, events: EngineEventSink) -> Result<Arc<dyn PeerEngine>, EngineError> {
        let pc = Arc::new(self.api.new_peer_connection(self.rtc_config()).await?);
        attach_handlers(&pc, events);

        // the player only renders what the remote side sends
        if self.config.receive_audio {
            add_recvonly(&pc, RTPCodecType::Audio).await?;
        }
        if self.config.receive_video {
            add_recvonly(&pc, RTPCodecType::Video).await?;
        }
        Ok(Arc::new(RtcEngine { pc }))
    }
}

async fn add_recvonly(pc: &RTCPeerConnection, kind: RTPCodecType) -> Result<(), EngineError> {
    pc.add_transceiver_from_kind(
        kind,
        Some(RTCRtpTransceiverInit {
            direction: RTCRtpTransceiverDirection::Recvonly,
            send_encodings: vec![],
        }),
    )
    .await?;
    Ok(())
}

fn attach_handlers(pc: &RTCPeerConnection, events: EngineEventSink) {
    let sink = events.clone();
    pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
        match cand {
            Some(c) => match local_candidate_blob(&c) {
                Ok(blob) => sink.local_candidate(Some(blob)),
                Err(err) => warn!(session = %sink.id(), error = %err, "unserializable local candidate"),
            },
            None => {
                debug!(session = %sink.id(), "local candidate gathering complete");
                sink.local_candidate(None);
            }
        }
        Box::pin(async {})
    }));

    let sink = events.clone();
    pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
        debug!(session = %sink.id(), state = %st, "raw peer connection state");
        match connection_state(st) {
            Some(state) => sink.connection_state(state),
            None => debug!(session = %sink.id(), "ignoring unspecified connection state"),
        }
        Box::pin(async {})
    }));

    let sink = events;
    pc.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
        let info = TrackInfo {
            id: track.id(),
            stream_id: track.stream_id(),
            kind: match track.kind() {
                RTPCodecType::Audio => MediaKind::Audio,
                RTPCodecType::Video => MediaKind::Video,
                _ => MediaKind::Unknown,
            },
        };
        sink.track(info);
        Box::pin(async {})
    }));
}

fn connection_state(st: RTCPeerConnectionState) -> Option<ConnectionState> {
    match st {
        RTCPeerConnectionState::New => Some(ConnectionState::New),
        RTCPeerConnectionState::Connecting => Some(ConnectionState::Connecting),
        RTCPeerConnectionState::Connected => Some(ConnectionState::Connected),
        RTCPeerConnectionState::Disconnected => Some(ConnectionState::Disconnected),
        RTCPeerConnectionState::Failed => Some(ConnectionState::Failed),
        RTCPeerConnectionState::Closed => Some(ConnectionState::Closed),
        _ => None,
    }
}

/// [`PeerEngine`] over a webrtc-rs `RTCPeerConnection`.
pub struct RtcEngine {
    pc: Arc<RTCPeerConnection>,
}

fn to_blob(desc: &RTCSessionDescription) -> Result<SessionDescription, EngineError> {
    Ok(SessionDescription(serde_json::to_value(desc)?))
}

fn from_blob(desc: SessionDescription) -> Result<RTCSessionDescription, EngineError> {
    Ok(serde_json::from_value(desc.0)?)
}

#[async_trait]
impl PeerEngine for RtcEngine {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError> {
        to_blob(&self.pc.create_offer(None).await?)
    }

    async fn create_answer(&self) -> Result<SessionDescription, EngineError> {
        to_blob(&self.pc.create_answer(None).await?)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), EngineError> {
        self.pc.set_local_description(from_blob(desc)?).await?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), EngineError> {
        self.pc.set_remote_description(from_blob(desc)?).await?;
        Ok(())
    }

    async fn add_candidate(&self, candidate: Option<CandidateBlob>) -> Result<(), EngineError> {
        self.pc.add_ice_candidate(remote_candidate_init(candidate)?).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.pc.close().await?;
        Ok(())
    }
}
