pub mod candidate_buffer;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod logger;
pub mod peer;
pub mod registry;
pub mod session;
pub mod signaling;
pub mod utils;

#[cfg(test)]
mod testing;

pub use codec::{CandidateBlob, Decoded, SessionDescription, SignalingMessage};
pub use config::PlayerConfig;
pub use engine::{ConnectionState, EngineEvent, EngineEventSink, PeerEngine, PeerEngineFactory};
pub use error::{CodecError, ConfigError, EngineError, GatewayError, SessionError, TransportError};
pub use events::{NoopObserver, SessionObserver};
pub use peer::RtcEngineFactory;
pub use registry::{SessionHandle, SessionRegistry};
pub use session::{NegotiationState, PeerSession, Role};
pub use signaling::{
    ChannelTransport, InboundMessage, OutboundEnvelope, SignalingGateway, SignalingTransport,
};
