use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;
use uuid::Uuid;

use fleetscope::config::Config;
use fleetscope::models::{AttributeValue, Attributes, Position, TelemetryEvent};
use fleetscope::state::AppState;
use fleetscope::sync::SyncQueue;
use fleetscope::telemetry::{TelemetryError, TelemetryGateway, UnavailableGateway};

/// Identity headers sent with a request, as the upstream gateway would forward them.
#[derive(Debug, Clone)]
pub struct Caller {
    pub actor_id: Uuid,
    pub tenant_id: Uuid,
    pub role: &'static str,
    pub extra: Vec<(&'static str, String)>,
}

impl Caller {
    pub fn operator(tenant_id: Uuid) -> Self {
        Self {
            actor_id: Uuid::now_v7(),
            tenant_id,
            role: "operator",
            extra: vec![],
        }
    }

    pub fn admin(tenant_id: Uuid) -> Self {
        Self {
            role: "admin",
            ..Self::operator(tenant_id)
        }
    }

    pub fn scoped_to(mut self, tenant_id: Uuid) -> Self {
        self.extra.push(("x-scope-tenant", tenant_id.to_string()));
        self
    }

    pub fn mirroring(mut self, owner_tenant_id: Uuid) -> Self {
        self.extra.push(("x-mirror-owner", owner_tenant_id.to_string()));
        self
    }
}

/// In-memory tracking backend seeded by the tests.
#[derive(Default)]
pub struct FakeTelemetry {
    positions: Mutex<Vec<Position>>,
    events: Mutex<Vec<TelemetryEvent>>,
}

impl FakeTelemetry {
    pub fn add_position(&self, position: Position) {
        self.positions.lock().unwrap().push(position);
    }

    pub fn add_event(&self, event: TelemetryEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl TelemetryGateway for FakeTelemetry {
    async fn latest_positions(&self, device_ids: &[i64]) -> Result<Vec<Position>, TelemetryError> {
        let positions = self.positions.lock().unwrap();
        let mut latest: Vec<Position> = Vec::new();
        for p in positions.iter().filter(|p| device_ids.contains(&p.device_id)) {
            match latest.iter_mut().find(|l| l.device_id == p.device_id) {
                Some(current) if current.fix_time < p.fix_time => *current = p.clone(),
                Some(_) => {}
                None => latest.push(p.clone()),
            }
        }
        Ok(latest)
    }

    async fn positions(
        &self,
        device_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Position>, TelemetryError> {
        let mut positions: Vec<Position> = self
            .positions
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.device_id == device_id && p.fix_time >= from && p.fix_time <= to)
            .cloned()
            .collect();
        positions.sort_by_key(|p| p.fix_time);
        Ok(positions)
    }

    async fn events(
        &self,
        device_ids: &[i64],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<TelemetryEvent>, TelemetryError> {
        let mut events: Vec<TelemetryEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| device_ids.contains(&e.device_id))
            .filter(|e| e.event_time.is_some_and(|t| t >= from && t <= to))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.event_time.cmp(&a.event_time));
        events.truncate(limit as usize);
        Ok(events)
    }
}

/// A running test server backed by its own snapshot directory.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub data_dir: TempDir,
    pub telemetry: Arc<FakeTelemetry>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Send a request with the caller's identity headers and return the raw response.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        caller: &Caller,
        body: Option<&Value>,
    ) -> Response {
        let mut req = self
            .client
            .request(method, self.url(path))
            .header("x-actor-id", caller.actor_id.to_string())
            .header("x-tenant-id", caller.tenant_id.to_string())
            .header("x-actor-role", caller.role);
        for (name, value) in &caller.extra {
            req = req.header(*name, value);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        req.send().await.expect("request failed")
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        caller: &Caller,
        body: Option<&Value>,
    ) -> (Value, StatusCode) {
        let resp = self.send(method, path, caller, body).await;
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn get(&self, path: &str, caller: &Caller) -> (Value, StatusCode) {
        self.call(Method::GET, path, caller, None).await
    }

    pub async fn post(&self, path: &str, caller: &Caller, body: &Value) -> (Value, StatusCode) {
        self.call(Method::POST, path, caller, Some(body)).await
    }

    pub async fn put(&self, path: &str, caller: &Caller, body: &Value) -> (Value, StatusCode) {
        self.call(Method::PUT, path, caller, Some(body)).await
    }

    pub async fn delete(&self, path: &str, caller: &Caller) -> (Value, StatusCode) {
        self.call(Method::DELETE, path, caller, None).await
    }

    /// Create a vehicle, return the vehicle JSON.
    pub async fn create_vehicle(&self, caller: &Caller, plate: &str) -> Value {
        let (body, status) = self
            .post(
                "/api/v1/vehicles",
                caller,
                &json!({ "plate": plate, "model": "Actros", "vehicle_type": "truck" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create vehicle failed: {body}");
        body
    }

    /// Create a device, return the device JSON.
    pub async fn create_device(
        &self,
        caller: &Caller,
        unique_id: &str,
        traccar_id: Option<i64>,
        protocol: &str,
    ) -> Value {
        let (body, status) = self
            .post(
                "/api/v1/devices",
                caller,
                &json!({
                    "unique_id": unique_id,
                    "traccar_id": traccar_id,
                    "attributes": { "protocol": protocol },
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create device failed: {body}");
        body
    }

    /// Create a vehicle with a device installed on it, return `(vehicle_id, device_id)`.
    pub async fn linked_vehicle(
        &self,
        caller: &Caller,
        plate: &str,
        traccar_id: i64,
        protocol: &str,
    ) -> (String, String) {
        let vehicle = self.create_vehicle(caller, plate).await;
        let vehicle_id = vehicle["id"].as_str().unwrap().to_string();
        let device = self
            .create_device(caller, &format!("imei-{traccar_id}"), Some(traccar_id), protocol)
            .await;
        let device_id = device["id"].as_str().unwrap().to_string();

        let (body, status) = self
            .post(
                &format!("/api/v1/devices/{device_id}/link"),
                caller,
                &json!({ "vehicle_id": vehicle_id }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "link failed: {body}");
        (vehicle_id, device_id)
    }

    /// Register a tenant profile through the admin API.
    pub async fn put_tenant(&self, tenant_id: Uuid, client_type: &str) {
        let admin = Caller::admin(Uuid::now_v7());
        let (body, status) = self
            .put(
                &format!("/api/v1/admin/tenants/{tenant_id}"),
                &admin,
                &json!({ "name": format!("tenant {tenant_id}"), "client_type": client_type }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "put tenant failed: {body}");
    }
}

pub fn position(
    device_id: i64,
    fix_time: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    speed_knots: f64,
    odometer: Option<f64>,
) -> Position {
    let mut attributes = Attributes::new();
    if let Some(odometer) = odometer {
        attributes.insert("odometer", AttributeValue::Float(odometer));
    }
    Position {
        id: fix_time.timestamp(),
        device_id,
        protocol: Some("gt06".to_string()),
        fix_time,
        server_time: fix_time,
        device_time: fix_time,
        latitude,
        longitude,
        speed: speed_knots,
        course: 0.0,
        address: None,
        attributes,
    }
}

/// An `alarm` event raised `minutes_ago` minutes before now.
pub fn alarm(id: i64, device_id: i64, alarm: &str, minutes_ago: i64) -> TelemetryEvent {
    let mut attributes = Attributes::new();
    attributes.insert("alarm", AttributeValue::Text(alarm.to_string()));
    TelemetryEvent {
        id,
        event_type: "alarm".to_string(),
        event_time: Some(Utc::now() - TimeDelta::minutes(minutes_ago)),
        device_id,
        position_id: Some(id * 10),
        geofence_id: None,
        attributes,
    }
}

/// Spawn a test app with a fresh snapshot directory and an in-memory tracking backend.
pub async fn spawn_app() -> TestApp {
    let telemetry = Arc::new(FakeTelemetry::default());
    start(telemetry.clone(), telemetry).await
}

/// Spawn a test app with no tracking backend configured.
pub async fn spawn_app_without_telemetry() -> TestApp {
    start(Arc::new(UnavailableGateway), Arc::new(FakeTelemetry::default())).await
}

async fn start(gateway: Arc<dyn TelemetryGateway>, telemetry: Arc<FakeTelemetry>) -> TestApp {
    let data_dir = tempfile::tempdir().expect("Failed to create data dir");

    let config = Config::local(data_dir.path());
    let state = AppState::open(config, SyncQueue::disabled(), gateway)
        .expect("Failed to open app state");
    let app = fleetscope::build_app(Arc::new(state));

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    TestApp {
        addr,
        client: Client::new(),
        data_dir,
        telemetry,
    }
}

/// Remove the snapshot directory after a test completes.
pub async fn cleanup(app: TestApp) {
    let _ = app.data_dir.close();
}
