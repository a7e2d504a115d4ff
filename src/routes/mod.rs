pub mod access;
pub mod admin;
pub mod alerts;
pub mod devices;
pub mod event_config;
pub mod mirrors;
pub mod telemetry;
pub mod vehicles;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Vehicles
        .route("/api/v1/vehicles", get(vehicles::list).post(vehicles::create))
        .route("/api/v1/vehicles/by-plate/{plate}", get(vehicles::by_plate))
        .route(
            "/api/v1/vehicles/{id}",
            get(vehicles::get)
                .put(vehicles::update)
                .delete(vehicles::delete),
        )
        // Devices
        .route("/api/v1/devices", get(devices::list).post(devices::create))
        .route("/api/v1/devices/lookup", get(devices::lookup))
        .route(
            "/api/v1/devices/{id}",
            get(devices::get)
                .put(devices::update)
                .delete(devices::delete),
        )
        .route("/api/v1/devices/{id}/link", post(devices::link))
        .route("/api/v1/devices/{id}/unlink", post(devices::unlink))
        // Access
        .route("/api/v1/access/scope", get(access::scope))
        // Mirrors
        .route("/api/v1/mirrors", get(mirrors::list).post(mirrors::create))
        .route("/api/v1/mirrors/{id}", delete(mirrors::revoke))
        // Event configuration
        .route(
            "/api/v1/event-config/{protocol}",
            get(event_config::get).put(event_config::update),
        )
        // Alerts
        .route("/api/v1/alerts", get(alerts::list))
        .route("/api/v1/alerts/{id}/handle", post(alerts::handle))
        // Telemetry
        .route(
            "/api/v1/telemetry/positions/latest",
            get(telemetry::latest_positions),
        )
        .route("/api/v1/telemetry/events", get(telemetry::events))
        .route("/api/v1/devices/{id}/trips", get(telemetry::trips))
        // Admin
        .route("/api/v1/admin/tenants", get(admin::list_tenants))
        .route("/api/v1/admin/tenants/{id}", put(admin::put_tenant))
}
