//! Relational persistence layer. Only the directory sync worker and the
//! startup reconcile talk to it; request paths read the in-memory stores.

pub mod devices;
pub mod tenants;
pub mod vehicles;
