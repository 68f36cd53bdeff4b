//! Device trust - which client devices may act for an identity

pub mod fingerprint;
pub mod models;
pub mod registry;
pub mod store;

pub use fingerprint::{derive_device_identifier, is_valid_device_identifier};
pub use models::{Device, DeviceClass};
pub use registry::{ChangeProof, DeviceError, DeviceRegistry, Recognition};
pub use store::DeviceStore;
