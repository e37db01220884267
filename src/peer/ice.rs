use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;

use crate::codec::CandidateBlob;
use crate::error::EngineError;
use crate::peer::types::ServerConfig;
use crate::utils::add_ice_url_scheme;

/// Local candidate in the browser JSON shape, ready to be relayed.
pub fn local_candidate_blob(candidate: &RTCIceCandidate) -> Result<CandidateBlob, EngineError> {
    let init = candidate.to_json()?;
    Ok(CandidateBlob(serde_json::to_value(init)?))
}

/// Remote candidate as webrtc-rs wants it; `None` becomes the empty
/// candidate line that ends remote gathering.
pub fn remote_candidate_init(
    candidate: Option<CandidateBlob>,
) -> Result<RTCIceCandidateInit, EngineError> {
    match candidate {
        Some(blob) => Ok(serde_json::from_value(blob.0)?),
        None => Ok(RTCIceCandidateInit {
            candidate: String::new(),
            ..Default::default()
        }),
    }
}

pub fn ice_servers(servers: &[ServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|config| RTCIceServer {
            urls: vec![add_ice_url_scheme(config)],
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
        })
        .collect()
}
