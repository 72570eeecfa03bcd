//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the recorder.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - CARLA simulation timestamp (seconds, f64) travels with each packet
//! - `frame` is the simulator frame number and names every file on disk

mod blueprint;
mod error;
mod runtime;
mod sensor;
mod sensor_source;
mod writer;

pub use blueprint::*;
pub use error::*;
pub use runtime::*;
pub use sensor::*;
pub use sensor_source::{SensorDataCallback, SensorSource};
pub use writer::*;
