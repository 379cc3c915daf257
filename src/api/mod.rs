//! HTTP API handlers

use crate::adapters::{NuvoController, ZoneSnapshot};
use crate::bus::{BusEvent, SharedBus};
use crate::error::{NuvoError, NuvoResult};
use crate::registry::{DeviceRegistry, ZoneDrivers};
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use nuvo_events::{CommandRequest, ZoneAddress};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::warn;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<NuvoController>,
    pub registry: Arc<DeviceRegistry>,
    pub bus: SharedBus,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        controller: Arc<NuvoController>,
        registry: Arc<DeviceRegistry>,
        bus: SharedBus,
    ) -> Self {
        Self {
            controller,
            registry,
            bus,
            started_at: Instant::now(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/zones", get(zones_handler))
        .route("/zones/{address}/drivers", get(zone_drivers_handler))
        .route("/zones/{address}/command", post(zone_command_handler))
        .route("/command", post(controller_command_handler))
        .route("/events", get(events_handler))
        .with_state(state)
}

/// General status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub gateway: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub success: bool,
}

/// GET /status - Service health check
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        service: "nuvo-bridge",
        version: env!("CARGO_PKG_VERSION"),
        gateway: state.controller.gateway_addr(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// GET /zones - Every zone with its cached status
pub async fn zones_handler(State(state): State<AppState>) -> Json<Vec<ZoneSnapshot>> {
    Json(state.controller.snapshots().await)
}

/// GET /zones/{address}/drivers - Last reported driver values
pub async fn zone_drivers_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> NuvoResult<Json<ZoneDrivers>> {
    let zone: ZoneAddress = address
        .parse()
        .map_err(|_| NuvoError::UnknownZone(address.clone()))?;
    Ok(Json(state.registry.drivers(zone).await.unwrap_or_default()))
}

/// POST /zones/{address}/command
pub async fn zone_command_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(request): Json<CommandRequest>,
) -> NuvoResult<Json<CommandResponse>> {
    let success = state.controller.dispatch_zone(&address, &request).await?;
    Ok(Json(CommandResponse { success }))
}

/// POST /command - Controller commands (DISCOVER, ALLON, ALLOFF)
pub async fn controller_command_handler(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> NuvoResult<Json<CommandResponse>> {
    let success = state.controller.dispatch_controller(&request).await?;
    Ok(Json(CommandResponse { success }))
}

/// GET /events - Host events as Server-Sent Events
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.bus.subscribe();
    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                // Ends the stream so graceful shutdown is not held open
                Ok(BusEvent::ShuttingDown { .. }) => return None,
                Ok(event) => {
                    let Some(host_event) = event.to_host_event() else {
                        continue;
                    };
                    match Event::default()
                        .event(host_event.event_type())
                        .json_data(&host_event)
                    {
                        Ok(sse_event) => return Some((Ok(sse_event), rx)),
                        Err(e) => warn!("Failed to encode SSE event: {}", e),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE client lagged behind bus");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::{FakeGateway, Reply};
    use crate::adapters::GatewayClient;
    use crate::bus::create_bus;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use nuvo_events::{Driver, DriverUpdate};
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state_for(gateway: &FakeGateway) -> AppState {
        let bus = create_bus();
        let client = GatewayClient::new(
            "127.0.0.1",
            gateway.port(),
            Duration::from_millis(500),
            Duration::from_millis(200),
        );
        let controller =
            NuvoController::with_client(Arc::new(client), &Config::default(), bus.clone(), None);
        AppState::new(Arc::new(controller), Arc::new(DeviceRegistry::new()), bus)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_status() {
        let gateway = FakeGateway::start(vec![]).await;
        let app = router(state_for(&gateway));

        let response = app
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["service"], "nuvo-bridge");
        assert_eq!(body["gateway"], format!("127.0.0.1:{}", gateway.port()));
    }

    #[tokio::test]
    async fn test_zone_command_success() {
        let gateway =
            FakeGateway::start(vec![Reply::line("#Z01PWRON,SRC2,GRP0,VOL-39,POFF")]).await;
        let app = router(state_for(&gateway));

        let response = app
            .clone()
            .oneshot(post_json(
                "/zones/z01/command",
                r#"{"command":"SET_VOL","value":50}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"success": true}));
        assert_eq!(gateway.received().await, vec!["*Z01VOL39\r\n".to_string()]);

        let response = app
            .oneshot(Request::get("/zones").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let zones = body_json(response).await;
        assert_eq!(zones.as_array().unwrap().len(), 6);
        assert_eq!(zones[0]["status"]["volume"], 51);
        assert!(zones[1]["status"].is_null());
    }

    #[tokio::test]
    async fn test_gateway_failure_is_not_an_http_error() {
        let gateway = FakeGateway::start(vec![Reply::Silent]).await;
        let app = router(state_for(&gateway));

        let response = app
            .oneshot(post_json("/zones/z02/command", r#"{"command":"DON"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_unknown_zone_and_command() {
        let gateway = FakeGateway::start(vec![]).await;
        let app = router(state_for(&gateway));

        let response = app
            .clone()
            .oneshot(post_json("/zones/z07/command", r#"{"command":"DON"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "zone_not_found");

        let response = app
            .oneshot(post_json("/command", r#"{"command":"REBOOT"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "unknown_command");
    }

    #[tokio::test]
    async fn test_zone_drivers_from_registry() {
        let gateway = FakeGateway::start(vec![]).await;
        let state = state_for(&gateway);
        let zone = ZoneAddress::new(4).unwrap();
        state
            .registry
            .apply(&BusEvent::DriverReported(DriverUpdate::new(zone, Driver::Source, 3)))
            .await;
        let app = router(state);

        let response = app
            .oneshot(Request::get("/zones/z04/drivers").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["drivers"]["GV3"]["value"], 3);
        assert_eq!(body["drivers"]["GV3"]["uom"], 25);
    }
}
