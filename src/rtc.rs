//! WebRTC configuration types exposed to clients
//!
//! Field names and shapes follow the W3C `RTCConfiguration` and
//! `RTCIceServer` dictionaries. Absent optional fields are left out of the
//! serialized form instead of being written as `null`.

use serde::{Deserialize, Serialize};

/// ICE server descriptor (STUN or TURN)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcIceServer {
    /// Server URLs, e.g. `stun:stun.example.com:3478`
    pub urls: Vec<String>,

    /// TURN username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// TURN credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl RtcIceServer {
    /// Create a descriptor without credentials
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            username: None,
            credential: None,
        }
    }

    /// Set the username
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the credential
    pub fn credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }
}

/// Configuration handed to a client before it creates its peer connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcConfiguration {
    /// Aggregated ICE servers
    #[serde(
        rename = "iceServers",
        default,
        skip_serializing_if = "no_ice_servers"
    )]
    pub ice_servers: Option<Vec<RtcIceServer>>,
}

fn no_ice_servers(servers: &Option<Vec<RtcIceServer>>) -> bool {
    servers.as_ref().map_or(true, Vec::is_empty)
}

impl RtcConfiguration {
    /// Build a configuration from a list of servers; an empty list means none
    pub fn from_servers(servers: Vec<RtcIceServer>) -> Self {
        Self {
            ice_servers: if servers.is_empty() {
                None
            } else {
                Some(servers)
            },
        }
    }

    /// Number of ICE servers
    pub fn server_count(&self) -> usize {
        self.ice_servers.as_ref().map_or(0, Vec::len)
    }

    /// Serialize into the JSON object sent to clients
    pub fn to_json(&self) -> serde_json::Value {
        // Only strings and string lists; serialization cannot fail.
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }
}

/// How the frontend streams a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    /// HTTP live streaming
    Hls,
    /// WebRTC negotiated through a registered provider
    WebRtc,
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamType::Hls => write!(f, "hls"),
            StreamType::WebRtc => write!(f, "web_rtc"),
        }
    }
}
