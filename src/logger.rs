use std::fmt;

use tracing::debug;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

use crate::codec::CandidateBlob;

/// Local wall-clock timestamps, same layout the desktop client prints.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Install the global subscriber, honouring the build-time logging switches.
///
/// Returns `false` when logging is disabled for this build or a subscriber
/// was already installed.
pub fn init() -> bool {
    if !crate::config::LOGGING_ENABLED || !crate::config::dev::ENABLE_LOGGING {
        return false;
    }
    init_forced()
}

/// Install the subscriber regardless of build profile.
pub fn init_forced() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(LocalTimer)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Log a trickled ICE candidate as it is relayed.
pub fn dump_candidate(label: &str, candidate: &CandidateBlob) {
    debug!(
        "Trickle {label}: candidate={} sdp_mid={} sdp_mline_index={}",
        candidate.candidate_line().unwrap_or("<none>"),
        candidate.0.get("sdpMid").unwrap_or(&serde_json::Value::Null),
        candidate.0.get("sdpMLineIndex").unwrap_or(&serde_json::Value::Null),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_existing_subscriber() {
        let _ = init_forced();
        assert!(!init_forced());
    }
}
