//! RTSP-to-WebRTC bridge demo
//!
//! Wires a registry to two cameras, registers a bridge callback and a STUN
//! server, then negotiates an offer and answers a `get_config` command.
//!
//! Run with: `RUST_LOG=webrtc_registry=debug cargo run --example rtsp_bridge`

use std::sync::Arc;

use async_trait::async_trait;
use tracing_subscriber::EnvFilter;

use webrtc_registry::command::{self, GET_CONFIG};
use webrtc_registry::{
    BoxError, CameraComponent, CameraSession, CameraSource, RtcIceServer, WebRtcRegistry,
};

struct IpCamera {
    entity_id: String,
    url: Option<String>,
}

#[async_trait]
impl CameraSource for IpCamera {
    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    async fn stream_source(&self) -> Option<String> {
        self.url.clone()
    }
}

/// Stand-in for a call to an RTSP-to-WebRTC server
async fn bridge_offer(
    stream_source: String,
    offer_sdp: String,
    stream_id: String,
) -> Result<Option<String>, BoxError> {
    tracing::info!(
        stream_source = %stream_source,
        stream_id = %stream_id,
        offer_len = offer_sdp.len(),
        "Bridging offer"
    );
    Ok(Some(format!("v=0\r\ns={stream_id}\r\n")))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let registry = WebRtcRegistry::new();
    let component = Arc::new(CameraComponent::new());
    registry.load(&component);

    for (entity_id, url) in [
        ("camera.driveway", Some("rtsp://192.168.1.20:554/stream1")),
        ("camera.doorbell", Some("https://doorbell.local/snapshot.jpg")),
    ] {
        let camera = IpCamera {
            entity_id: entity_id.to_string(),
            url: url.map(str::to_string),
        };
        component
            .add_camera(Arc::new(CameraSession::new(
                Arc::new(camera),
                registry.clone(),
            )))
            .await;
    }

    let bridge = registry.register_rtsp_to_webrtc_provider("bridge", bridge_offer)?;
    let stun = registry.register_ice_server(Arc::new(|| async {
        RtcIceServer::new(["stun:stun.l.google.com:19302"])
    }))?;

    // Registration only schedules the refresh; run one now so the demo is deterministic
    registry.refresh_sessions().await;

    for camera in component.sessions() {
        let answer = camera.handle_offer("v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\n").await?;
        println!(
            "{} ({}): {:?}",
            camera.entity_id(),
            camera.frontend_stream_type(),
            answer
        );

        let request = serde_json::json!({
            "id": 1,
            "type": GET_CONFIG,
            "entity_id": camera.entity_id(),
        });
        println!("{}", command::dispatch(&component, &request.to_string()).await);
    }

    stun.unregister();
    bridge.unregister();
    Ok(())
}
