//! # CARLA Recorder
//!
//! Session orchestration shared by the `carla-recorder` binary and the
//! end-to-end tests.

pub mod session;

pub use session::{Session, SessionStats};
