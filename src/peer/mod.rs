pub mod connection;
pub mod ice;
pub mod types;

pub use connection::{RtcEngine, RtcEngineFactory};
pub use types::{MediaKind, ServerConfig, TrackInfo};
