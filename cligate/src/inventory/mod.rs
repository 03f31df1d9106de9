//! Device inventory: records, caller identity and the mtime-cached store.
//!
//! The internal [`DeviceRecord`] keeps credentials so the pool can open
//! sessions; the [`DevicePublic`] view strips them for anything that leaves
//! the gateway.

mod model;
mod store;

pub use model::{Caller, DevicePublic, DeviceRecord};
pub use store::InventoryStore;
