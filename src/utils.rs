use crate::peer::types::ServerConfig;
use rand::Rng;

pub fn random_id() -> String {
    hex::encode(rand::rng().random::<[u8; 8]>())
}

// Prefix an ICE server URL with its scheme when it has none
pub fn add_ice_url_scheme(config: &ServerConfig) -> String {
    // already has a scheme
    if config.url.starts_with("turn:")
        || config.url.starts_with("turns:")
        || config.url.starts_with("stun:")
        || config.url.starts_with("stuns:")
    {
        config.url.clone()
    } else {
        let scheme = if config.r#type == "turn" {
            "turn:"
        } else {
            "stun:"
        };
        format!("{}{}", scheme, config.url)
    }
}

/// Signaling channel that scopes one participant's envelopes.
pub fn channel_name(prefix: &str, id: &str) -> String {
    format!("{prefix}-{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_are_hex_and_distinct() {
        let a = random_id();
        let b = random_id();
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn scheme_is_added_once() {
        let mut server = ServerConfig::stun("s", "stun:stun.l.google.com:19302");
        assert_eq!(add_ice_url_scheme(&server), "stun:stun.l.google.com:19302");
        server.url = "relay.example:443".into();
        server.r#type = "turn".into();
        assert_eq!(add_ice_url_scheme(&server), "turn:relay.example:443");
    }

    #[test]
    fn channel_is_scoped_by_id() {
        assert_eq!(channel_name("webrtc_signaling", "player-1"), "webrtc_signaling-player-1");
    }
}
