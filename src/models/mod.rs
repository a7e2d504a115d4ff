pub mod alert;
pub mod attributes;
pub mod device;
pub mod event_config;
pub mod mirror;
pub mod position;
pub mod tenant;
pub mod trip;
pub mod vehicle;

pub use alert::{Alert, AlertFilters, AlertLinkage, AlertResolution, AlertStatus};
pub use attributes::{AttributeValue, Attributes};
pub use device::{Device, DeviceChanges, NewDevice};
pub use event_config::{
    ClassifiedEvent, EventConfigEntry, EventConfigUpdate, EventConfigView, Severity,
    TenantEventConfig,
};
pub use mirror::{Mirror, MirrorContext, NewMirror};
pub use position::{Position, TelemetryEvent};
pub use tenant::{ClientType, TenantProfile};
pub use trip::{Trip, TripPoint};
pub use vehicle::{NewVehicle, Vehicle, VehicleChanges, VehicleStatus};
