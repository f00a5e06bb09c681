//! Audio priority and media reference types
//!
//! Supporting types shared by the playback scheduler, its producers and the
//! events they publish.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Precedence of a queued audio clip
///
/// Lower level plays sooner. Ties are broken by arrival order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AudioPriority {
    /// Direct feedback to something the user just did
    UserAction = 0,
    /// A newly created task being announced
    Announcement = 1,
    /// Ephemeral voice event pushed by the server
    #[default]
    VoiceEvent = 2,
}

impl AudioPriority {
    /// All levels, highest precedence first
    pub const ALL: [AudioPriority; 3] = [
        AudioPriority::UserAction,
        AudioPriority::Announcement,
        AudioPriority::VoiceEvent,
    ];

    /// Numeric level (0 = highest precedence)
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Map a numeric level back to a priority
    pub fn from_level(level: u64) -> Option<Self> {
        match level {
            0 => Some(AudioPriority::UserAction),
            1 => Some(AudioPriority::Announcement),
            2 => Some(AudioPriority::VoiceEvent),
            _ => None,
        }
    }

    /// Interpret a loosely typed priority value from a request body.
    ///
    /// Accepts a numeric level or a level name. Absent or unrecognized
    /// values fall back to the lowest precedence.
    pub fn from_json_lenient(value: Option<&serde_json::Value>) -> Self {
        match value {
            Some(serde_json::Value::Number(n)) => n
                .as_u64()
                .and_then(Self::from_level)
                .unwrap_or_default(),
            Some(serde_json::Value::String(s)) => s.parse().unwrap_or_default(),
            _ => Self::default(),
        }
    }
}

impl fmt::Display for AudioPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioPriority::UserAction => write!(f, "user_action"),
            AudioPriority::Announcement => write!(f, "announcement"),
            AudioPriority::VoiceEvent => write!(f, "voice_event"),
        }
    }
}

impl FromStr for AudioPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        if let Ok(level) = normalized.parse::<u64>() {
            return Self::from_level(level)
                .ok_or_else(|| Error::InvalidInput(format!("Unknown priority level: {}", s)));
        }
        match normalized.as_str() {
            "user_action" | "useraction" => Ok(AudioPriority::UserAction),
            "announcement" => Ok(AudioPriority::Announcement),
            "voice_event" | "voiceevent" => Ok(AudioPriority::VoiceEvent),
            _ => Err(Error::InvalidInput(format!("Unknown priority: {}", s))),
        }
    }
}

/// Opaque locator of a playable audio resource (URL or file path)
///
/// Not validated here; the playback sink decides whether it can load it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(String);

impl MediaRef {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for `http://` and `https://` locators
    pub fn is_remote(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }

    /// Resolve a server-relative locator (e.g. `/audio/x.mp3`) against a base URL.
    ///
    /// Absolute URLs and `file://` locators are returned unchanged.
    pub fn resolve_against(&self, base_url: &str) -> MediaRef {
        if self.0.starts_with('/') && !base_url.is_empty() {
            MediaRef(format!("{}{}", base_url.trim_end_matches('/'), self.0))
        } else {
            self.clone()
        }
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MediaRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MediaRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priority_ordering_follows_level() {
        assert!(AudioPriority::UserAction < AudioPriority::Announcement);
        assert!(AudioPriority::Announcement < AudioPriority::VoiceEvent);
        assert_eq!(AudioPriority::UserAction.level(), 0);
        assert_eq!(AudioPriority::VoiceEvent.level(), 2);
    }

    #[test]
    fn test_priority_parse_names_and_levels() {
        assert_eq!("user_action".parse::<AudioPriority>().unwrap(), AudioPriority::UserAction);
        assert_eq!("Announcement".parse::<AudioPriority>().unwrap(), AudioPriority::Announcement);
        assert_eq!("voice-event".parse::<AudioPriority>().unwrap(), AudioPriority::VoiceEvent);
        assert_eq!("1".parse::<AudioPriority>().unwrap(), AudioPriority::Announcement);
        assert!("7".parse::<AudioPriority>().is_err());
        assert!("urgent".parse::<AudioPriority>().is_err());
    }

    #[test]
    fn test_lenient_priority_defaults_to_voice_event() {
        assert_eq!(AudioPriority::from_json_lenient(None), AudioPriority::VoiceEvent);
        assert_eq!(
            AudioPriority::from_json_lenient(Some(&json!(0))),
            AudioPriority::UserAction
        );
        assert_eq!(
            AudioPriority::from_json_lenient(Some(&json!("announcement"))),
            AudioPriority::Announcement
        );
        assert_eq!(
            AudioPriority::from_json_lenient(Some(&json!(42))),
            AudioPriority::VoiceEvent
        );
        assert_eq!(
            AudioPriority::from_json_lenient(Some(&json!(true))),
            AudioPriority::VoiceEvent
        );
    }

    #[test]
    fn test_media_ref_resolution() {
        let relative = MediaRef::new("/audio/voice_1.mp3");
        assert_eq!(
            relative.resolve_against("http://backend:8000/").as_str(),
            "http://backend:8000/audio/voice_1.mp3"
        );

        let absolute = MediaRef::new("https://cdn.example/clip.mp3");
        assert!(absolute.is_remote());
        assert_eq!(absolute.resolve_against("http://backend:8000"), absolute);
    }
}
