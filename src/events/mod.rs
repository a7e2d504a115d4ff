//! Event Classification Engine: raw protocol event codes to tenant-configurable classifications.

pub mod catalog;
mod engine;
pub mod normalize;

pub use engine::{EventConfigStore, EventSource};
