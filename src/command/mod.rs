//! WebRTC commands
//!
//! Request/response handling for the `camera/webrtc/get_config` command.
//! The transport that carries commands in and responses out is up to the
//! host; this module only decodes the JSON command and builds the JSON
//! response envelope.
//!
//! ```text
//! -> {"id": 5, "type": "camera/webrtc/get_config", "entity_id": "camera.porch"}
//! <- {"id": 5, "type": "result", "success": true, "result": {"iceServers": [...]}}
//! <- {"id": 5, "type": "result", "success": false,
//!     "error": {"code": "web_rtc_offer_failed", "message": "..."}}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::rtc::{RtcConfiguration, StreamType};
use crate::session::CameraComponent;

/// Command type for fetching a camera's WebRTC configuration
pub const GET_CONFIG: &str = "camera/webrtc/get_config";

/// Error codes carried in command error responses
pub mod codes {
    /// The camera does not stream over WebRTC
    pub const WEB_RTC_OFFER_FAILED: &str = "web_rtc_offer_failed";
    /// No camera with the requested entity id
    pub const NOT_FOUND: &str = "not_found";
    /// The command could not be decoded
    pub const INVALID_FORMAT: &str = "invalid_format";
    /// Anything else
    pub const UNKNOWN_ERROR: &str = "unknown_error";
}

/// Incoming command
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// Fetch the WebRTC configuration for a camera
    #[serde(rename = "camera/webrtc/get_config")]
    GetConfig(GetConfigRequest),
}

/// Body of a `camera/webrtc/get_config` command
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GetConfigRequest {
    /// Message id echoed back in the response
    pub id: u64,
    /// Target camera
    pub entity_id: String,
}

/// Error payload of a failed command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandError {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable reason
    pub message: String,
}

impl CommandError {
    /// Create an error payload
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<&Error> for CommandError {
    fn from(err: &Error) -> Self {
        let code = match err {
            Error::Unsupported { .. } => codes::WEB_RTC_OFFER_FAILED,
            Error::EntityNotFound(_) => codes::NOT_FOUND,
            Error::InvalidCommand(_) => codes::INVALID_FORMAT,
            _ => codes::UNKNOWN_ERROR,
        };
        Self::new(code, err.to_string())
    }
}

/// Response envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResponse {
    /// Id of the command this answers
    pub id: u64,

    /// Always `"result"`
    #[serde(rename = "type")]
    pub kind: &'static str,

    /// Whether the command succeeded
    pub success: bool,

    /// Result payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Error payload on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
}

impl CommandResponse {
    /// Successful response
    pub fn result(id: u64, result: serde_json::Value) -> Self {
        Self {
            id,
            kind: "result",
            success: true,
            result: Some(result),
            error: None,
        }
    }

    /// Failed response
    pub fn error(id: u64, error: CommandError) -> Self {
        Self {
            id,
            kind: "result",
            success: false,
            result: None,
            error: Some(error),
        }
    }

    /// Serialize to a JSON string
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(id = self.id, error = %e, "Failed to serialize command response");
            format!(
                r#"{{"id":{},"type":"result","success":false,"error":{{"code":"{}","message":"serialization failed"}}}}"#,
                self.id,
                codes::UNKNOWN_ERROR
            )
        })
    }
}

/// WebRTC configuration for a camera
///
/// Fails with [`Error::EntityNotFound`] for unknown cameras and with
/// [`Error::Unsupported`] when the camera does not stream over WebRTC.
pub async fn get_config(component: &CameraComponent, entity_id: &str) -> Result<RtcConfiguration> {
    let camera = component
        .get(entity_id)
        .ok_or_else(|| Error::EntityNotFound(entity_id.to_string()))?;

    let stream_type = camera.frontend_stream_type();
    if stream_type != StreamType::WebRtc {
        return Err(Error::Unsupported {
            entity_id: entity_id.to_string(),
            stream_type,
        });
    }

    Ok(camera.webrtc_configuration().await)
}

/// Handle a decoded `camera/webrtc/get_config` command
pub async fn handle_get_config(
    component: &CameraComponent,
    request: &GetConfigRequest,
) -> CommandResponse {
    match get_config(component, &request.entity_id).await {
        Ok(config) => CommandResponse::result(request.id, config.to_json()),
        Err(e) => {
            tracing::debug!(
                id = request.id,
                entity_id = %request.entity_id,
                error = %e,
                "get_config failed"
            );
            CommandResponse::error(request.id, CommandError::from(&e))
        }
    }
}

/// Handle a decoded command
pub async fn handle_command(component: &CameraComponent, command: &Command) -> CommandResponse {
    match command {
        Command::GetConfig(request) => handle_get_config(component, request).await,
    }
}

/// Decode a raw JSON command, run it and encode the response
///
/// Undecodable input gets an `invalid_format` error, echoing the message id
/// when one could be read.
pub async fn dispatch(component: &CameraComponent, raw: &str) -> String {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            let err = Error::from(e);
            return CommandResponse::error(0, CommandError::from(&err)).to_json_string();
        }
    };
    let id = value.get("id").and_then(serde_json::Value::as_u64).unwrap_or(0);

    let response = match serde_json::from_value::<Command>(value) {
        Ok(command) => handle_command(component, &command).await,
        Err(e) => {
            let err = Error::from(e);
            CommandResponse::error(id, CommandError::from(&err))
        }
    };
    response.to_json_string()
}
