use crate::engine::ConnectionState;
use crate::peer::types::TrackInfo;

/// Rendering target / UI side of a session.
///
/// Called from the gateway's event loop; implementations must not block.
pub trait SessionObserver: Send + Sync {
    /// A remote track is ready to be attached to the session's target.
    fn on_track(&self, _id: &str, _track: &TrackInfo) {}

    fn on_connection_state(&self, _id: &str, _state: ConnectionState) {}

    /// The session left the registry; detach whatever was rendering it.
    fn on_removed(&self, _id: &str) {}
}

/// Observer for embeddings that do not render.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
