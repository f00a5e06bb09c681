//! Clip producers
//!
//! Background pollers and request helpers that turn backend state into
//! scheduler requests. They only use the public scheduler API.

pub mod announcements;
pub mod speech;
pub mod voice_events;

pub use announcements::{AnnouncementTracker, AnnouncementWatcher, TaskSummary};
pub use speech::{random_accept_phrase, SpeechClient, ACCEPT_PHRASES};
pub use voice_events::{VoiceEvent, VoiceEventPoller, VoiceEventTracker};

/// Join a backend base URL and an absolute API path
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        assert_eq!(
            endpoint("http://localhost:8000/", "/api/tasks/"),
            "http://localhost:8000/api/tasks/"
        );
        assert_eq!(
            endpoint("http://backend", "/api/voice/synthesize"),
            "http://backend/api/voice/synthesize"
        );
    }
}
