//! Data models for the package-tracking API.
//!
//! - `Package`, `NewPackage`, `PackageUpdate`: tracked shipments
//! - `TrackingInfo`, `TrackingEvent`: carrier tracking data and timeline
//! - `Carrier`: supported shipping providers

pub mod carrier;
pub mod package;
pub mod tracking;

pub use carrier::{Carrier, CarriersResponse};
pub use package::{NewPackage, Package, PackageUpdate};
pub use tracking::{sort_history, sorted_history, TrackingEvent, TrackingInfo};
